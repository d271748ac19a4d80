//! Progress status aggregation and publication.
//!
//! This module provides:
//! - StatusGatherer, the single-writer actor owning a run's ProgressTable
//! - StatusRegistry, through which status surfaces enumerate running loops
//! - Readiness, tracking runner readiness for health checks

mod gatherer;
mod readiness;
mod registry;

pub use gatherer::{ProgressTable, StatusGatherer, StatusUpdate};
pub use readiness::{Readiness, ReadinessSignal};
pub use registry::{StatusAccessor, StatusRegistry, TestLoopKind};

pub const STATUS_KEY_NUM_MAPS: &str = "numMaps";
pub const STATUS_KEY_NUM_RUNS: &str = "numRuns";
pub const STATUS_KEY_TOTAL_RUNS: &str = "totalRuns";
pub const STATUS_KEY_RUNNER_FINISHED: &str = "runnerFinished";
