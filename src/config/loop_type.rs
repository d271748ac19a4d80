//! Test loop type selection and per-type tuning.
//!
//! A runner picks its loop type with `test-loop.type`; only the matching
//! sub-section is meaningfully populated for a run.

use serde::{Deserialize, Serialize};

use super::SleepConfig;
use crate::error::{GridloadError, Result};

/// Which operation cycle a runner's test loop executes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopType {
    /// Simple repeated ingest/read/remove batches.
    #[default]
    Batch,
    /// Boundary-seeking operation chains.
    Boundary,
}

impl std::fmt::Display for LoopType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoopType::Batch => write!(f, "batch"),
            LoopType::Boundary => write!(f, "boundary"),
        }
    }
}

/// `test-loop` section of a runner.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TestLoopSection {
    #[serde(rename = "type")]
    pub loop_type: LoopType,
    pub batch: BatchSection,
    pub boundary: BoundarySection,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct BatchSection {
    pub sleeps: BatchSleeps,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct BatchSleeps {
    #[serde(rename = "between-action-batches")]
    pub between_action_batches: SleepConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct BoundarySection {
    pub sleeps: BoundarySleeps,
    #[serde(rename = "operation-chain")]
    pub operation_chain: OperationChainSection,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct BoundarySleeps {
    #[serde(rename = "between-operation-chains")]
    pub between_operation_chains: SleepConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OperationChainSection {
    pub length: u32,
    pub reset_after_chain: bool,
    pub boundary_definition: BoundaryDefinitionSection,
}

impl Default for OperationChainSection {
    fn default() -> Self {
        Self {
            length: 1000,
            reset_after_chain: true,
            boundary_definition: BoundaryDefinitionSection::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct BoundaryDefinitionSection {
    pub upper: BoundaryDefinition,
}

/// One boundary of a boundary-seeking chain.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BoundaryDefinition {
    pub map_fill_percentage: f32,
    pub enable_randomness: bool,
}

impl Default for BoundaryDefinition {
    fn default() -> Self {
        Self {
            map_fill_percentage: 0.8,
            enable_randomness: false,
        }
    }
}

/// Resolved tuning for the batch loop type.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchTestLoopConfig {
    pub sleep_between_action_batches: SleepConfig,
}

/// Resolved tuning for the boundary loop type.
///
/// `lower` and `action_towards_boundary_probability` are not configurable
/// yet and always carry their defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryTestLoopConfig {
    pub sleep_between_operation_chains: SleepConfig,
    pub operation_chain_length: u32,
    pub reset_after_chain: bool,
    pub upper: BoundaryDefinition,
    pub lower: Option<BoundaryDefinition>,
    pub action_towards_boundary_probability: f32,
}

impl BatchTestLoopConfig {
    pub fn from_section(section: &BatchSection) -> Self {
        Self {
            sleep_between_action_batches: section.sleeps.between_action_batches.clone(),
        }
    }
}

impl BoundaryTestLoopConfig {
    /// Resolve the boundary section; `strict` is set when boundary is the selected loop type.
    pub fn from_section(key_path: &str, section: &BoundarySection, strict: bool) -> Result<Self> {
        let chain = &section.operation_chain;
        let upper = chain.boundary_definition.upper.clone();

        if strict {
            if chain.length == 0 {
                return Err(GridloadError::Config(format!(
                    "{key_path}.test-loop.boundary.operation-chain.length must be at least 1"
                )));
            }
            if !(upper.map_fill_percentage > 0.0 && upper.map_fill_percentage <= 1.0) {
                return Err(GridloadError::Config(format!(
                    "{key_path}.test-loop.boundary.operation-chain.boundary-definition.upper.map-fill-percentage \
                     must be in (0, 1], got {}",
                    upper.map_fill_percentage
                )));
            }
        }

        Ok(Self {
            sleep_between_operation_chains: section.sleeps.between_operation_chains.clone(),
            operation_chain_length: chain.length,
            reset_after_chain: chain.reset_after_chain,
            upper,
            lower: None,
            action_towards_boundary_probability: 0.0,
        })
    }
}
