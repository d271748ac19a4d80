//! Map runner module - test loop engine, runners and orchestration.
//!
//! This module provides:
//! - TestLoop, the generic engine driving partition workers
//! - LoadRunner, the synthetic-payload workload
//! - RunnerRegistry and MapTester for launching all runners

mod load_runner;
mod map_tester;
mod state;
mod test_loop;

pub use load_runner::{
    LOAD_RUNNER_NAME, LOAD_RUNNER_SOURCE, LoadConfig, LoadElement, LoadRunner, generate_random_payload,
    populate_load_config, populate_load_elements,
};
pub use map_tester::{MapRunner, MapTester, RunnerContext, RunnerRegistry};
pub use state::{RunnerState, StateList, StateTransition};
pub use test_loop::{
    LoopElement, Looper, TestLoop, TestLoopConfig, completed_runs_key, failed_runs_key, removal_count, sleep,
    sleep_duration_ms,
};
