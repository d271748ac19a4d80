//! Runner registry and orchestrator.
//!
//! Every map runner is registered into a `RunnerRegistry` at startup;
//! `MapTester` launches all of them concurrently and waits for them.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::GlobalConfig;
use crate::id::ClientIdentity;
use crate::status::{ReadinessSignal, StatusRegistry};
use crate::store::MapStore;

/// Everything a runner needs from the surrounding process.
pub struct RunnerContext {
    pub cluster_name: String,
    pub members: Vec<String>,
    pub client: ClientIdentity,
    pub config: Arc<GlobalConfig>,
    pub map_store: Arc<dyn MapStore>,
    pub status: StatusRegistry,
    pub readiness: Arc<dyn ReadinessSignal>,
    pub cancel: CancellationToken,
}

/// A self-contained workload driving one test loop.
#[async_trait]
pub trait MapRunner: Send + Sync {
    fn name(&self) -> &str;

    /// Resolve configuration, signal readiness and run the test loop.
    ///
    /// Failures are handled and logged by the runner itself.
    async fn run_map_tests(&self, ctx: Arc<RunnerContext>);
}

/// Runners known to this process.
#[derive(Default)]
pub struct RunnerRegistry {
    runners: Vec<Arc<dyn MapRunner>>,
}

impl RunnerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, runner: Arc<dyn MapRunner>) {
        log::debug!("Registering map runner '{}'", runner.name());
        self.runners.push(runner);
    }

    pub fn len(&self) -> usize {
        self.runners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runners.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.runners.iter().map(|r| r.name().to_string()).collect()
    }
}

/// Launches all registered map runners.
pub struct MapTester {
    registry: RunnerRegistry,
}

impl MapTester {
    pub fn new(registry: RunnerRegistry) -> Self {
        Self { registry }
    }

    /// Run every registered runner concurrently, returning once all finished.
    pub async fn test_maps(&self, ctx: Arc<RunnerContext>) {
        log::info!(
            "Starting {} map runner(s) against cluster '{}'",
            self.registry.len(),
            ctx.cluster_name
        );

        let handles: Vec<_> = self
            .registry
            .runners
            .iter()
            .map(|runner| {
                let runner = runner.clone();
                let ctx = ctx.clone();
                tokio::spawn(async move { runner.run_map_tests(ctx).await })
            })
            .collect();

        let results = futures::future::join_all(handles).await;
        for (runner, result) in self.registry.runners.iter().zip(results) {
            if let Err(e) = result {
                log::error!("Map runner '{}' panicked: {}", runner.name(), e);
            }
        }

        log::info!("All map runners finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Readiness;
    use crate::store::InMemoryMapStore;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingRunner {
        name: String,
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl MapRunner for CountingRunner {
        fn name(&self) -> &str {
            &self.name
        }

        async fn run_map_tests(&self, ctx: Arc<RunnerContext>) {
            assert_eq!(ctx.cluster_name, "dev");
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct PanickingRunner;

    #[async_trait]
    impl MapRunner for PanickingRunner {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn run_map_tests(&self, _ctx: Arc<RunnerContext>) {
            panic!("runner blew up");
        }
    }

    fn context() -> Arc<RunnerContext> {
        Arc::new(RunnerContext {
            cluster_name: "dev".to_string(),
            members: vec!["127.0.0.1:5701".to_string()],
            client: ClientIdentity::generate(),
            config: Arc::new(GlobalConfig::default()),
            map_store: Arc::new(InMemoryMapStore::new()),
            status: StatusRegistry::new(),
            readiness: Arc::new(Readiness::new()),
            cancel: CancellationToken::new(),
        })
    }

    #[test]
    fn test_registry_register() {
        let mut registry = RunnerRegistry::new();
        assert!(registry.is_empty());

        registry.register(Arc::new(PanickingRunner));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.names(), vec!["panicking".to_string()]);
    }

    #[tokio::test]
    async fn test_all_runners_run() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut registry = RunnerRegistry::new();
        for i in 0..3 {
            registry.register(Arc::new(CountingRunner {
                name: format!("r{i}"),
                calls: calls.clone(),
            }));
        }

        MapTester::new(registry).test_maps(context()).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_panicking_runner_does_not_abort_siblings() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut registry = RunnerRegistry::new();
        registry.register(Arc::new(PanickingRunner));
        registry.register(Arc::new(CountingRunner {
            name: "counting".to_string(),
            calls: calls.clone(),
        }));

        MapTester::new(registry).test_maps(context()).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_registry_returns() {
        MapTester::new(RunnerRegistry::new()).test_maps(context()).await;
    }
}
