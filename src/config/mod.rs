//! Configuration system for gridload.
//!
//! Two layers:
//! 1. Global config (~/.config/gridload/gridload.yml or .gridload.yml)
//! 2. Per-runner resolution into an immutable `RunnerConfig`

use eyre::Result;
use std::path::PathBuf;

pub use self::global::{ClientConfig, GlobalConfig, LoadRunnerSection, MapTestsConfig};
pub use self::loop_type::{
    BatchSection, BatchSleeps, BatchTestLoopConfig, BoundaryDefinition, BoundaryDefinitionSection, BoundarySection,
    BoundarySleeps, BoundaryTestLoopConfig, LoopType, OperationChainSection, TestLoopSection,
};
pub use self::runner_config::{
    MapPrefixSection, RunnerConfig, RunnerConfigBuilder, RunnerSection, RunnerSleeps, SleepConfig,
};

mod global;
mod loop_type;
mod runner_config;

/// Key path of the map runner sections in the config file.
pub const MAP_TESTS_KEY_PATH: &str = "map-tests";

/// Load configuration from the standard search paths.
///
/// Search order:
/// 1. Explicit path if provided
/// 2. .gridload.yml in current directory (project config)
/// 3. ~/.config/gridload/gridload.yml (user config)
/// 4. Default values
pub fn load_config(explicit_path: Option<&PathBuf>) -> Result<GlobalConfig> {
    GlobalConfig::load(explicit_path)
}
