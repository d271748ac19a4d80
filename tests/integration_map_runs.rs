//! Map run integration tests
//!
//! Drives the test loop and the load runner end to end against the
//! in-memory map store.

use std::collections::HashSet;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gridload::config::{GlobalConfig, RunnerConfigBuilder, RunnerSection};
use gridload::error::Result;
use gridload::id::ClientIdentity;
use gridload::runner::{
    LOAD_RUNNER_SOURCE, LoadElement, LoadRunner, Looper, MapRunner, MapTester, RunnerContext, RunnerRegistry,
    RunnerState, TestLoop, TestLoopConfig, completed_runs_key, failed_runs_key, populate_load_elements,
};
use gridload::status::{Readiness, StatusGatherer, StatusRegistry, TestLoopKind};
use gridload::store::{InMemoryMapStore, MapHandle, MapStore};
use serde_json::json;
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

fn load_loop_config(
    store: &InMemoryMapStore,
    num_maps: u32,
    num_runs: u32,
    entries: u32,
) -> Result<TestLoopConfig<LoadElement>> {
    let section = RunnerSection {
        num_maps,
        num_runs,
        ..Default::default()
    };
    let runner_config = RunnerConfigBuilder::new("map-tests.load", "load").populate_config(&section)?;
    Ok(TestLoopConfig {
        id: Uuid::new_v4(),
        source: LOAD_RUNNER_SOURCE.to_string(),
        map_store: Arc::new(store.clone()),
        runner_config: Arc::new(runner_config),
        elements: Arc::new(populate_load_elements(entries, 64)),
        cancel: CancellationToken::new(),
        client: ClientIdentity::from_configured("client-a"),
        get_map_timeout: Duration::from_secs(5),
    })
}

fn context(config: GlobalConfig, store: &InMemoryMapStore) -> Arc<RunnerContext> {
    Arc::new(RunnerContext {
        cluster_name: config.client.cluster_name.clone(),
        members: config.client.members.clone(),
        client: ClientIdentity::generate(),
        config: Arc::new(config),
        map_store: Arc::new(store.clone()),
        status: StatusRegistry::new(),
        readiness: Arc::new(Readiness::new()),
        cancel: CancellationToken::new(),
    })
}

/// Integration test: two partitions, three runs, five elements
#[tokio::test]
async fn test_two_partitions_complete_with_disjoint_keys() -> Result<()> {
    let store = InMemoryMapStore::new();
    let registry = StatusRegistry::new();
    let gatherer = StatusGatherer::new();
    let table = gatherer.table();

    let mut test_loop: TestLoop<LoadElement> = TestLoop::new();
    test_loop.init(load_loop_config(&store, 2, 3, 5)?, gatherer, &registry);
    test_loop.run().await?;

    assert_eq!(table.get("numMaps"), Some(json!(2)));
    assert_eq!(table.get("numRuns"), Some(json!(3)));
    assert_eq!(table.get("totalRuns"), Some(json!(6)));
    assert_eq!(table.get("runnerFinished"), Some(json!(true)));

    assert_eq!(store.map_names(), vec!["ht_load-0".to_string(), "ht_load-1".to_string()]);

    let keys_0: HashSet<_> = store.keys_of("ht_load-0").into_iter().collect();
    let keys_1: HashSet<_> = store.keys_of("ht_load-1").into_iter().collect();
    assert!(!keys_0.is_empty());
    assert!(!keys_1.is_empty());
    assert!(keys_0.is_disjoint(&keys_1));
    assert!(keys_0.iter().all(|k| k.starts_with("client-a-0-")));
    assert!(keys_1.iter().all(|k| k.starts_with("client-a-1-")));

    let document = registry.assemble_test_loop_status();
    assert_eq!(document["maps"][LOAD_RUNNER_SOURCE]["runnerFinished"], json!(true));
    assert_eq!(document["queues"], json!({}));
    Ok(())
}

/// Integration test: an evicted value fails one iteration, the run still finishes
#[tokio::test]
async fn test_eviction_is_recovered_per_iteration() -> Result<()> {
    let store = InMemoryMapStore::new();
    store.faults().evict_next_gets(1);
    let gatherer = StatusGatherer::new();
    let table = gatherer.table();

    let mut test_loop: TestLoop<LoadElement> = TestLoop::new();
    test_loop.init(load_loop_config(&store, 1, 4, 5)?, gatherer, &StatusRegistry::new());
    test_loop.run().await?;

    assert_eq!(table.get(&failed_runs_key(0)), Some(json!(1)));
    assert_eq!(table.get(&completed_runs_key(0)), Some(json!(3)));
    assert_eq!(table.get("runnerFinished"), Some(json!(true)));
    Ok(())
}

/// Integration test: a rejected write fails exactly one iteration across partitions
#[tokio::test]
async fn test_failed_set_is_recovered_per_iteration() -> Result<()> {
    let store = InMemoryMapStore::new();
    store.faults().fail_next_sets(1);
    let gatherer = StatusGatherer::new();
    let table = gatherer.table();

    let mut test_loop: TestLoop<LoadElement> = TestLoop::new();
    test_loop.init(load_loop_config(&store, 2, 3, 5)?, gatherer, &StatusRegistry::new());
    test_loop.run().await?;

    let failed: u64 = (0..2)
        .filter_map(|p| table.get(&failed_runs_key(p)))
        .filter_map(|v| v.as_u64())
        .sum();
    let completed: u64 = (0..2)
        .filter_map(|p| table.get(&completed_runs_key(p)))
        .filter_map(|v| v.as_u64())
        .sum();
    assert_eq!(failed, 1);
    assert_eq!(completed, 5);
    Ok(())
}

/// Integration test: a run cancelled before start aborts every acquire but still finalizes
#[tokio::test]
async fn test_cancelled_run_still_finalizes() -> Result<()> {
    let store = InMemoryMapStore::new();
    let config = load_loop_config(&store, 2, 2, 3)?;
    config.cancel.cancel();
    let gatherer = StatusGatherer::new();
    let table = gatherer.table();

    let mut test_loop: TestLoop<LoadElement> = TestLoop::new();
    test_loop.init(config, gatherer, &StatusRegistry::new());
    test_loop.run().await?;

    assert_eq!(table.get("runnerFinished"), Some(json!(true)));
    assert_eq!(store.calls().set, 0);
    Ok(())
}

/// Store that cancels the run right after handing out a map.
struct CancellingStore {
    inner: InMemoryMapStore,
    cancel: CancellationToken,
}

#[async_trait]
impl MapStore for CancellingStore {
    async fn get_map(&self, name: &str) -> Result<Arc<dyn MapHandle>> {
        let map = self.inner.get_map(name).await?;
        self.cancel.cancel();
        Ok(map)
    }
}

/// Integration test: cancelling mid-run fails each remaining iteration, then releases the map
#[tokio::test]
async fn test_cancel_after_acquire_fails_iterations_and_releases_map() -> Result<()> {
    let store = InMemoryMapStore::new();
    let mut config = load_loop_config(&store, 1, 4, 3)?;
    config.map_store = Arc::new(CancellingStore {
        inner: store.clone(),
        cancel: config.cancel.clone(),
    });
    let gatherer = StatusGatherer::new();
    let table = gatherer.table();

    let mut test_loop: TestLoop<LoadElement> = TestLoop::new();
    test_loop.init(config, gatherer, &StatusRegistry::new());
    test_loop.run().await?;

    assert_eq!(table.get(&failed_runs_key(0)), Some(json!(4)));
    assert_eq!(table.get(&completed_runs_key(0)), None);
    assert_eq!(table.get("runnerFinished"), Some(json!(true)));

    let calls = store.calls();
    assert_eq!(calls.get_map, 1);
    assert_eq!(calls.set, 0);
    assert_eq!(calls.destroy, 1);
    Ok(())
}

/// Integration test: orchestrator runs the load runner from a config file
#[tokio::test]
async fn test_orchestrator_runs_load_runner_from_config_file() -> eyre::Result<()> {
    let mut file = NamedTempFile::new()?;
    writeln!(
        file,
        r#"
client:
  cluster-name: grid-test
map-tests:
  load:
    num-maps: 3
    num-runs: 2
    num-entries-per-map: 4
    payload-size-bytes: 8
    map-prefix:
      enabled: false
    sleeps:
      between-runs:
        enabled: true
        duration-ms: 5
        enable-randomness: true
"#
    )?;
    let config = GlobalConfig::load_from_file(file.path())?;

    let store = InMemoryMapStore::new();
    let ctx = context(config, &store);
    let mut registry = RunnerRegistry::new();
    registry.register(Arc::new(LoadRunner::new()));

    MapTester::new(registry).test_maps(ctx.clone()).await;

    assert_eq!(ctx.cluster_name, "grid-test");
    assert_eq!(
        store.map_names(),
        vec!["load-0".to_string(), "load-1".to_string(), "load-2".to_string()]
    );
    let runs = ctx.status.registered_runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].0, TestLoopKind::Maps);
    assert_eq!(runs[0].1, LOAD_RUNNER_SOURCE);

    let progress = ctx
        .status
        .status_of(TestLoopKind::Maps, LOAD_RUNNER_SOURCE)
        .ok_or_else(|| eyre::eyre!("load runner status missing"))?;
    assert_eq!(progress.get("totalRuns"), Some(&json!(6)));
    assert_eq!(progress.get("runnerFinished"), Some(&json!(true)));
    Ok(())
}

/// Integration test: a disabled runner makes no remote calls and registers nothing
#[tokio::test]
async fn test_disabled_runner_stays_idle() {
    let mut config = GlobalConfig::default();
    config.map_tests.load.runner.enabled = false;
    let store = InMemoryMapStore::new();
    let ctx = context(config, &store);
    let runner = LoadRunner::new();

    runner.run_map_tests(ctx.clone()).await;

    assert_eq!(runner.states().latest(), Some(RunnerState::PopulateConfigComplete));
    assert_eq!(store.calls().total(), 0);
    assert!(ctx.status.registered_runs().is_empty());
    assert_eq!(
        ctx.status.assemble_test_loop_status(),
        json!({"maps": {}, "queues": {}})
    );
}
