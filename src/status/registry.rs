//! Registry of test loop status accessors.
//!
//! A status surface enumerates every registered run and serializes its
//! progress. Each test loop registers a callback returning a point-in-time
//! copy of its progress table.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Kind of data structure a test loop exercises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestLoopKind {
    Maps,
    Queues,
}

impl TestLoopKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestLoopKind::Maps => "maps",
            TestLoopKind::Queues => "queues",
        }
    }

    pub fn all() -> [TestLoopKind; 2] {
        [TestLoopKind::Maps, TestLoopKind::Queues]
    }
}

impl fmt::Display for TestLoopKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Callback returning a copy of one run's progress, if available.
pub type StatusAccessor = Arc<dyn Fn() -> Option<Map<String, Value>> + Send + Sync>;

#[derive(Clone)]
struct Registration {
    run_id: Uuid,
    accessor: StatusAccessor,
}

/// Shared registry of status accessors, keyed by loop kind and source.
#[derive(Clone, Default)]
pub struct StatusRegistry {
    loops: Arc<DashMap<(TestLoopKind, String), Registration>>,
}

impl fmt::Debug for StatusRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusRegistry")
            .field("registered", &self.loops.len())
            .finish()
    }
}

impl StatusRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the accessor of a source's run.
    pub fn register_test_loop(&self, kind: TestLoopKind, source: &str, run_id: Uuid, accessor: StatusAccessor) {
        log::debug!("Registering {} test loop '{}' (run {})", kind, source, run_id);
        self.loops
            .insert((kind, source.to_string()), Registration { run_id, accessor });
    }

    /// Every registered run as `(kind, source, run_id)`.
    pub fn registered_runs(&self) -> Vec<(TestLoopKind, String, Uuid)> {
        let mut runs: Vec<_> = self
            .loops
            .iter()
            .map(|entry| (entry.key().0, entry.key().1.clone(), entry.value().run_id))
            .collect();
        runs.sort_by(|a, b| (a.0.as_str(), &a.1).cmp(&(b.0.as_str(), &b.1)));
        runs
    }

    /// Status of a single source, if registered.
    pub fn status_of(&self, kind: TestLoopKind, source: &str) -> Option<Map<String, Value>> {
        let accessor = self
            .loops
            .get(&(kind, source.to_string()))
            .map(|entry| entry.value().accessor.clone())?;
        Some(accessor().unwrap_or_default())
    }

    /// Assemble `{ "maps": { source: {...} }, "queues": { ... } }`.
    ///
    /// Both top-level keys are always present; an accessor yielding nothing
    /// contributes an empty object.
    pub fn assemble_test_loop_status(&self) -> Value {
        let mut assembled = Map::new();
        for kind in TestLoopKind::all() {
            assembled.insert(kind.as_str().to_string(), Value::Object(Map::new()));
        }

        // Accessors are collected first so none runs while a shard lock is held
        let registrations: Vec<_> = self
            .loops
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().accessor.clone()))
            .collect();

        for ((kind, source), accessor) in registrations {
            let status = accessor().unwrap_or_default();
            if let Some(Value::Object(by_source)) = assembled.get_mut(kind.as_str()) {
                by_source.insert(source, Value::Object(status));
            }
        }

        Value::Object(assembled)
    }
}
