//! Synthetic-payload map runner.
//!
//! Writes `num-entries-per-map` elements per map, all sharing one random
//! payload so memory use on this side stays flat however large the
//! payload gets.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};

use super::map_tester::{MapRunner, RunnerContext};
use super::state::{RunnerState, StateList};
use super::test_loop::{LoopElement, Looper, TestLoop, TestLoopConfig};
use crate::config::{LoadRunnerSection, MAP_TESTS_KEY_PATH, RunnerConfig, RunnerConfigBuilder};
use crate::error::{GridloadError, Result};
use crate::id::generate_run_id;
use crate::status::StatusGatherer;

pub const LOAD_RUNNER_NAME: &str = "maps-loadrunner";
pub const LOAD_RUNNER_SOURCE: &str = "loadrunner";
const LOAD_MAP_BASE_NAME: &str = "load";

/// One entry written by the load runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadElement {
    pub key: String,
    pub payload: String,
}

impl LoopElement for LoadElement {
    fn element_id(&self) -> String {
        self.key.clone()
    }
}

/// Settings of the load runner: common runner settings plus the payload shape.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadConfig {
    pub runner: RunnerConfig,
    pub num_entries_per_map: u32,
    pub payload_size_bytes: u32,
}

/// Validate and resolve the load runner's section.
pub fn populate_load_config(section: &LoadRunnerSection) -> Result<LoadConfig> {
    let key_path = format!("{}.load", MAP_TESTS_KEY_PATH);

    if section.num_entries_per_map == 0 {
        return Err(GridloadError::Config(format!(
            "{key_path}.num-entries-per-map must be at least 1"
        )));
    }
    if section.payload_size_bytes == 0 {
        return Err(GridloadError::Config(format!(
            "{key_path}.payload-size-bytes must be at least 1"
        )));
    }

    let runner = RunnerConfigBuilder::new(key_path, LOAD_MAP_BASE_NAME).populate_config(&section.runner)?;
    Ok(LoadConfig {
        runner,
        num_entries_per_map: section.num_entries_per_map,
        payload_size_bytes: section.payload_size_bytes,
    })
}

/// Random alphanumeric string of `size_bytes` characters.
pub fn generate_random_payload(size_bytes: u32) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(size_bytes as usize)
        .map(char::from)
        .collect()
}

/// Elements keyed `"0".."n-1"` sharing one payload.
pub fn populate_load_elements(num_entries: u32, payload_size_bytes: u32) -> Vec<LoadElement> {
    let payload = generate_random_payload(payload_size_bytes);
    (0..num_entries)
        .map(|i| LoadElement {
            key: i.to_string(),
            payload: payload.clone(),
        })
        .collect()
}

/// Runner putting synthetic load on maps.
#[derive(Debug, Default)]
pub struct LoadRunner {
    states: StateList,
}

impl LoadRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// States reached during the last run.
    pub fn states(&self) -> &StateList {
        &self.states
    }
}

#[async_trait]
impl MapRunner for LoadRunner {
    fn name(&self) -> &str {
        LOAD_RUNNER_NAME
    }

    async fn run_map_tests(&self, ctx: Arc<RunnerContext>) {
        self.states.append(RunnerState::Start);

        let config = match populate_load_config(&ctx.config.map_tests.load) {
            Ok(config) => config,
            Err(e) => {
                log::error!("{}: unable to populate config, aborting: {}", LOAD_RUNNER_SOURCE, e);
                return;
            }
        };
        self.states.append(RunnerState::PopulateConfigComplete);

        if !config.runner.enabled {
            log::info!("{}: runner not enabled, won't run", LOAD_RUNNER_SOURCE);
            return;
        }
        self.states.append(RunnerState::CheckEnabledComplete);

        ctx.readiness.raise_not_ready();

        let loop_config = TestLoopConfig {
            id: generate_run_id(),
            source: LOAD_RUNNER_SOURCE.to_string(),
            map_store: ctx.map_store.clone(),
            runner_config: Arc::new(config.runner),
            elements: Arc::new(populate_load_elements(
                config.num_entries_per_map,
                config.payload_size_bytes,
            )),
            cancel: ctx.cancel.clone(),
            client: ctx.client.clone(),
            get_map_timeout: Duration::from_millis(ctx.config.client.get_map_timeout_ms),
        };
        let mut test_loop: TestLoop<LoadElement> = TestLoop::new();
        test_loop.init(loop_config, StatusGatherer::new(), &ctx.status);
        self.states.append(RunnerState::AssignTestLoopComplete);

        ctx.readiness.raise_ready();
        self.states.append(RunnerState::RaiseReadyComplete);

        log::info!(
            "{}: starting load test loop against cluster '{}' ({} member(s))",
            LOAD_RUNNER_SOURCE,
            ctx.cluster_name,
            ctx.members.len()
        );

        self.states.append(RunnerState::TestLoopStart);
        if let Err(e) = test_loop.run().await {
            log::error!("{}: test loop failed: {}", LOAD_RUNNER_SOURCE, e);
        }
        self.states.append(RunnerState::TestLoopComplete);

        log::info!("{}: finished map load test loop", LOAD_RUNNER_SOURCE);
    }
}
