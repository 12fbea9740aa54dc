//! harvest.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::types::{NodeId, OpTable, PrepThresholds};

/// Top-level configuration for a HarvestGrid scheduler.
///
/// Every section is optional in the file; missing sections fall back to
/// their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    pub fleet: FleetConfig,
    pub strategy: StrategyConfig,
    pub timing: TimingConfig,
    pub batches: BatchConfig,
    pub prepare: PrepareConfig,
    pub scheduler: LoopConfig,
    pub ops: OpTable,
}

/// Fleet-wide capacity policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    /// Distinguished node that keeps a capacity floor reserved for other
    /// workloads. `None` disables the reservation.
    pub home_node: Option<NodeId>,
    /// Capacity units withheld on the home node.
    pub home_reserved: f64,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            home_node: None,
            home_reserved: 0.0,
        }
    }
}

/// Strategy calculation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Desired fraction of the target's resource to extract per batch.
    pub extraction_ratio: f64,
    /// Hard cap on the extracted fraction regardless of the requested ratio.
    pub max_extract_fraction: f64,
    /// Iteration cap for the ratio feasibility search.
    pub max_search_iters: u32,
    /// Wall-clock cap for the ratio feasibility search, in milliseconds.
    pub search_timeout_ms: u64,
}

impl StrategyConfig {
    pub fn search_timeout(&self) -> Duration {
        Duration::from_millis(self.search_timeout_ms)
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            extraction_ratio: 0.10,
            max_extract_fraction: 0.25,
            max_search_iters: 16,
            search_timeout_ms: 250,
        }
    }
}

/// Batch timing parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Minimum gap between consecutive stage completions, in milliseconds.
    pub spacing_ms: u64,
    /// Anchor offset between successive batches for one target, in
    /// milliseconds.
    pub batch_spacing_ms: u64,
}

impl TimingConfig {
    pub fn spacing(&self) -> Duration {
        Duration::from_millis(self.spacing_ms)
    }

    pub fn batch_spacing(&self) -> Duration {
        Duration::from_millis(self.batch_spacing_ms)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            spacing_ms: 50,
            batch_spacing_ms: 200,
        }
    }
}

/// Batch concurrency throttles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// In-flight batch ceiling per target.
    pub max_per_target: u32,
    /// Batches launched per cycle across all targets.
    pub max_per_cycle: u32,
    /// Lifecycle counters are reset every this many cycles.
    pub prune_interval: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_per_target: 5,
            max_per_cycle: 8,
            prune_interval: 25,
        }
    }
}

/// Target preparation thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrepareConfig {
    /// Allowed pressure above the target's floor before counter-work runs.
    pub pressure_tolerance: f64,
    /// Fraction of `max_resource` a target must hold to count as prepared.
    pub resource_floor: f64,
}

impl PrepareConfig {
    pub fn thresholds(&self) -> PrepThresholds {
        PrepThresholds {
            pressure_tolerance: self.pressure_tolerance,
            resource_floor: self.resource_floor,
        }
    }
}

impl Default for PrepareConfig {
    fn default() -> Self {
        let defaults = PrepThresholds::default();
        Self {
            pressure_tolerance: defaults.pressure_tolerance,
            resource_floor: defaults.resource_floor,
        }
    }
}

/// Scheduling loop cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Sleep between cycles, in milliseconds.
    pub cycle_interval_ms: u64,
    /// Longer sleep after a failed cycle, in milliseconds.
    pub failure_backoff_ms: u64,
}

impl LoopConfig {
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_millis(self.cycle_interval_ms)
    }

    pub fn failure_backoff(&self) -> Duration {
        Duration::from_millis(self.failure_backoff_ms)
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            cycle_interval_ms: 4000,
            failure_backoff_ms: 20_000,
        }
    }
}

impl HarvestConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: HarvestConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
