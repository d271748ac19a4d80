//! Runner configuration (file section and resolved form).
//!
//! A `RunnerSection` is what the YAML file holds for one runner; the
//! `RunnerConfigBuilder` validates it into the immutable `RunnerConfig`
//! that a test loop executes against.

use serde::{Deserialize, Serialize};

use super::loop_type::{BatchTestLoopConfig, BoundaryTestLoopConfig, LoopType, TestLoopSection};
use crate::error::{GridloadError, Result};

/// A pause policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SleepConfig {
    pub enabled: bool,
    pub duration_ms: u64,
    pub enable_randomness: bool,
}

impl SleepConfig {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn fixed(duration_ms: u64) -> Self {
        Self {
            enabled: true,
            duration_ms,
            enable_randomness: false,
        }
    }

    pub fn random(max_duration_ms: u64) -> Self {
        Self {
            enabled: true,
            duration_ms: max_duration_ms,
            enable_randomness: true,
        }
    }
}

/// Settings shared by every map runner, as they appear in the config file.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RunnerSection {
    pub enabled: bool,

    #[serde(rename = "num-maps")]
    pub num_maps: u32,

    #[serde(rename = "num-runs")]
    pub num_runs: u32,

    #[serde(rename = "append-map-index-to-map-name")]
    pub append_map_index_to_map_name: bool,

    #[serde(rename = "append-client-id-to-map-name")]
    pub append_client_id_to_map_name: bool,

    #[serde(rename = "map-prefix")]
    pub map_prefix: MapPrefixSection,

    pub sleeps: RunnerSleeps,

    #[serde(rename = "test-loop")]
    pub test_loop: TestLoopSection,
}

impl Default for RunnerSection {
    fn default() -> Self {
        Self {
            enabled: true,
            num_maps: 10,
            num_runs: 100,
            append_map_index_to_map_name: true,
            append_client_id_to_map_name: false,
            map_prefix: MapPrefixSection::default(),
            sleeps: RunnerSleeps::default(),
            test_loop: TestLoopSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MapPrefixSection {
    pub enabled: bool,
    pub prefix: String,
}

impl Default for MapPrefixSection {
    fn default() -> Self {
        Self {
            enabled: true,
            prefix: "ht_".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RunnerSleeps {
    #[serde(rename = "between-runs")]
    pub between_runs: SleepConfig,
}

/// Fully resolved settings for one runner's run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerConfig {
    pub enabled: bool,
    pub num_maps: u16,
    pub num_runs: u32,
    pub map_base_name: String,
    pub use_map_prefix: bool,
    pub map_prefix: String,
    pub append_map_index_to_map_name: bool,
    pub append_client_id_to_map_name: bool,
    pub sleep_between_runs: SleepConfig,
    pub loop_type: LoopType,
    pub batch: BatchTestLoopConfig,
    pub boundary: BoundaryTestLoopConfig,
}

impl RunnerConfig {
    /// Number of iterations across all partitions.
    pub fn total_runs(&self) -> u64 {
        u64::from(self.num_maps) * u64::from(self.num_runs)
    }
}

/// Resolves a runner's file section into a validated `RunnerConfig`.
#[derive(Debug, Clone)]
pub struct RunnerConfigBuilder {
    runner_key_path: String,
    map_base_name: String,
}

impl RunnerConfigBuilder {
    pub fn new(runner_key_path: impl Into<String>, map_base_name: impl Into<String>) -> Self {
        Self {
            runner_key_path: runner_key_path.into(),
            map_base_name: map_base_name.into(),
        }
    }

    pub fn populate_config(&self, section: &RunnerSection) -> Result<RunnerConfig> {
        let key_path = &self.runner_key_path;

        if section.num_maps == 0 {
            return Err(GridloadError::Config(format!("{key_path}.num-maps must be at least 1")));
        }
        let num_maps = u16::try_from(section.num_maps).map_err(|_| {
            GridloadError::Config(format!(
                "{key_path}.num-maps must not exceed {}, got {}",
                u16::MAX,
                section.num_maps
            ))
        })?;
        if section.num_runs == 0 {
            return Err(GridloadError::Config(format!("{key_path}.num-runs must be at least 1")));
        }
        if self.map_base_name.is_empty() {
            return Err(GridloadError::Config(format!("map base name for {key_path} must not be empty")));
        }

        let loop_type = section.test_loop.loop_type;
        let boundary = BoundaryTestLoopConfig::from_section(
            key_path,
            &section.test_loop.boundary,
            loop_type == LoopType::Boundary,
        )?;

        Ok(RunnerConfig {
            enabled: section.enabled,
            num_maps,
            num_runs: section.num_runs,
            map_base_name: self.map_base_name.clone(),
            use_map_prefix: section.map_prefix.enabled,
            map_prefix: section.map_prefix.prefix.clone(),
            append_map_index_to_map_name: section.append_map_index_to_map_name,
            append_client_id_to_map_name: section.append_client_id_to_map_name,
            sleep_between_runs: section.sleeps.between_runs.clone(),
            loop_type,
            batch: BatchTestLoopConfig::from_section(&section.test_loop.batch),
            boundary,
        })
    }
}
