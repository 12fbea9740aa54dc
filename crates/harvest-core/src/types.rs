//! Shared domain types for HarvestGrid.
//!
//! These types flow between the capacity pool, the strategy calculator,
//! the timing planner, and the dispatcher. Batch-level values
//! (`BatchStrategy`, `StageTiming`, `BatchPlan`) are created fresh per
//! scheduling attempt and never mutated after creation.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Unique identifier for a worker node in the fleet.
pub type NodeId = String;

/// Unique identifier for an extraction target.
pub type TargetId = String;

/// Milliseconds since the Unix epoch.
///
/// Signed because backward-computed stage starts can precede the batch
/// anchor, and subtracting two timestamps must not wrap.
pub fn epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

// ── Nodes ─────────────────────────────────────────────────────────

/// Raw capacity report for a node, as delivered by a
/// [`NodeCapacityProvider`](crate::providers::NodeCapacityProvider).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeCapacity {
    pub id: NodeId,
    /// Total capacity on this node, in abstract capacity units.
    pub max_capacity: f64,
    /// Capacity currently consumed by running work.
    pub used_capacity: f64,
}

impl NodeCapacity {
    /// Capacity left on this node, clamped at zero.
    pub fn free(&self) -> f64 {
        (self.max_capacity - self.used_capacity).max(0.0)
    }
}

/// A node as tracked by the capacity pool.
///
/// Owned exclusively by `CapacityPool`; mutated only through its
/// reserve/release calls. Invariant: `0 ≤ free_capacity ≤ max_capacity`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub max_capacity: f64,
    pub free_capacity: f64,
}

// ── Targets ───────────────────────────────────────────────────────

/// Read-only view of a target's state, as delivered by a
/// [`TargetStateProvider`](crate::providers::TargetStateProvider).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TargetSnapshot {
    pub id: TargetId,
    /// Resource currently extractable from the target.
    pub current_resource: f64,
    /// Resource ceiling the target replenishes toward.
    pub max_resource: f64,
    /// Pressure level; rises when the target is acted upon.
    pub current_pressure: f64,
    /// Pressure floor the target cannot drop below.
    pub min_pressure: f64,
    /// Replenishment rate metadata (higher grows back faster).
    pub growth_rate: f64,
    /// Access level a node needs before work against this target succeeds.
    pub required_access_level: u32,
}

/// Thresholds for deriving a target's [`PrepState`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PrepThresholds {
    /// Allowed pressure above the floor before counter-work is required.
    pub pressure_tolerance: f64,
    /// Fraction of `max_resource` the target must hold to count as full.
    pub resource_floor: f64,
}

impl Default for PrepThresholds {
    fn default() -> Self {
        Self {
            pressure_tolerance: 3.0,
            resource_floor: 0.90,
        }
    }
}

/// Readiness classification of a target, recomputed every cycle from the
/// latest snapshot and never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrepState {
    /// Pressure is above the floor plus tolerance; needs counter-work.
    Relieving,
    /// Resource level is below the floor; needs replenishment.
    Replenishing,
    /// Within both thresholds; eligible for batch scheduling.
    Ready,
}

impl PrepState {
    /// Derive the prep state for a target. Pressure wins over resource
    /// level: relieving first makes subsequent replenishment cheaper.
    pub fn classify(target: &TargetSnapshot, thresholds: &PrepThresholds) -> Self {
        if target.current_pressure > target.min_pressure + thresholds.pressure_tolerance {
            PrepState::Relieving
        } else if target.current_resource < target.max_resource * thresholds.resource_floor {
            PrepState::Replenishing
        } else {
            PrepState::Ready
        }
    }
}

// ── Operations ────────────────────────────────────────────────────

/// The three kinds of work that can be dispatched against a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    /// Pull resource out of the target; raises pressure.
    Extract,
    /// Counter-operation that lowers pressure.
    Relieve,
    /// Restore the target's resource level; raises pressure.
    Replenish,
}

impl OpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpKind::Extract => "extract",
            OpKind::Relieve => "relieve",
            OpKind::Replenish => "replenish",
        }
    }
}

/// Execution profile for one operation kind: which remote job implements
/// it and how much node capacity one unit consumes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpProfile {
    /// Job reference handed to the remote executor.
    pub job: String,
    /// Node capacity consumed per unit of this operation.
    pub cost_per_unit: f64,
}

/// Lookup table from operation kind to its execution profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpTable {
    pub extract: OpProfile,
    pub relieve: OpProfile,
    pub replenish: OpProfile,
}

impl OpTable {
    pub fn profile(&self, kind: OpKind) -> &OpProfile {
        match kind {
            OpKind::Extract => &self.extract,
            OpKind::Relieve => &self.relieve,
            OpKind::Replenish => &self.replenish,
        }
    }

    pub fn cost_per_unit(&self, kind: OpKind) -> f64 {
        self.profile(kind).cost_per_unit
    }
}

impl Default for OpTable {
    fn default() -> Self {
        Self {
            extract: OpProfile {
                job: "extract".to_string(),
                cost_per_unit: 1.70,
            },
            relieve: OpProfile {
                job: "relieve".to_string(),
                cost_per_unit: 1.75,
            },
            replenish: OpProfile {
                job: "replenish".to_string(),
                cost_per_unit: 1.75,
            },
        }
    }
}

/// How much pressure each unit of work adds or removes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PressureModel {
    /// Pressure added per extract unit.
    pub extract_rise_per_unit: f64,
    /// Pressure added per replenish unit.
    pub replenish_rise_per_unit: f64,
    /// Pressure removed per relieve unit.
    pub relieve_drop_per_unit: f64,
}

impl Default for PressureModel {
    fn default() -> Self {
        Self {
            extract_rise_per_unit: 0.002,
            replenish_rise_per_unit: 0.004,
            relieve_drop_per_unit: 0.05,
        }
    }
}

// ── Batches ───────────────────────────────────────────────────────

/// The four stages of a batch, in required completion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStage {
    Extract,
    RelieveAfterExtract,
    Replenish,
    RelieveAfterReplenish,
}

impl BatchStage {
    /// All stages in completion order.
    pub const ALL: [BatchStage; 4] = [
        BatchStage::Extract,
        BatchStage::RelieveAfterExtract,
        BatchStage::Replenish,
        BatchStage::RelieveAfterReplenish,
    ];

    /// The operation kind dispatched for this stage.
    pub fn op_kind(&self) -> OpKind {
        match self {
            BatchStage::Extract => OpKind::Extract,
            BatchStage::RelieveAfterExtract | BatchStage::RelieveAfterReplenish => OpKind::Relieve,
            BatchStage::Replenish => OpKind::Replenish,
        }
    }
}

/// Unit counts for one batch against one target.
///
/// Created fresh per scheduling attempt; a zero strategy means no batch
/// should be scheduled this cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStrategy {
    pub extract_units: u32,
    pub relieve_units: u32,
    pub replenish_units: u32,
    pub relieve_after_replenish_units: u32,
}

impl BatchStrategy {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn total_units(&self) -> u32 {
        self.extract_units
            + self.relieve_units
            + self.replenish_units
            + self.relieve_after_replenish_units
    }

    pub fn is_zero(&self) -> bool {
        self.total_units() == 0
    }

    pub fn units_for(&self, stage: BatchStage) -> u32 {
        match stage {
            BatchStage::Extract => self.extract_units,
            BatchStage::RelieveAfterExtract => self.relieve_units,
            BatchStage::Replenish => self.replenish_units,
            BatchStage::RelieveAfterReplenish => self.relieve_after_replenish_units,
        }
    }
}

/// One timed stage of a batch. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageTiming {
    pub stage: BatchStage,
    pub kind: OpKind,
    pub units: u32,
    pub start_ms: i64,
    pub end_ms: i64,
}

/// A fully timed batch against one target.
///
/// Produced by the timing planner, consumed exactly once by the
/// dispatcher, then discarded; only a lifecycle counter survives it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchPlan {
    pub batch_id: u64,
    pub target: TargetId,
    /// All four stages in completion order, including zero-unit stages —
    /// those are skipped at dispatch, not in the timing skeleton.
    pub stages: [StageTiming; 4],
    pub overall_start_ms: i64,
    pub overall_end_ms: i64,
}

impl BatchPlan {
    /// Stages that actually dispatch work (nonzero units).
    pub fn live_stages(&self) -> impl Iterator<Item = &StageTiming> {
        self.stages.iter().filter(|s| s.units > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(pressure: f64, resource: f64) -> TargetSnapshot {
        TargetSnapshot {
            id: "alpha".to_string(),
            current_resource: resource,
            max_resource: 1000.0,
            current_pressure: pressure,
            min_pressure: 5.0,
            growth_rate: 20.0,
            required_access_level: 1,
        }
    }

    #[test]
    fn classify_relieving_when_pressure_high() {
        // Pressure 10 > floor 5 + tolerance 3.
        let state = PrepState::classify(&snapshot(10.0, 1000.0), &PrepThresholds::default());
        assert_eq!(state, PrepState::Relieving);
    }

    #[test]
    fn classify_replenishing_when_resource_low() {
        let state = PrepState::classify(&snapshot(5.0, 500.0), &PrepThresholds::default());
        assert_eq!(state, PrepState::Replenishing);
    }

    #[test]
    fn classify_ready_within_thresholds() {
        let state = PrepState::classify(&snapshot(7.0, 950.0), &PrepThresholds::default());
        assert_eq!(state, PrepState::Ready);
    }

    #[test]
    fn pressure_wins_over_resource() {
        // Both out of range — relieving takes precedence.
        let state = PrepState::classify(&snapshot(20.0, 100.0), &PrepThresholds::default());
        assert_eq!(state, PrepState::Relieving);
    }

    #[test]
    fn node_capacity_free_clamps_at_zero() {
        let node = NodeCapacity {
            id: "n1".to_string(),
            max_capacity: 8.0,
            used_capacity: 10.0,
        };
        assert_eq!(node.free(), 0.0);
    }

    #[test]
    fn op_table_lookup_matches_kind() {
        let table = OpTable::default();
        assert_eq!(table.profile(OpKind::Extract).job, "extract");
        assert_eq!(table.cost_per_unit(OpKind::Relieve), 1.75);
        assert_eq!(table.cost_per_unit(OpKind::Extract), 1.70);
    }

    #[test]
    fn stage_order_and_kinds() {
        let kinds: Vec<OpKind> = BatchStage::ALL.iter().map(|s| s.op_kind()).collect();
        assert_eq!(
            kinds,
            vec![OpKind::Extract, OpKind::Relieve, OpKind::Replenish, OpKind::Relieve]
        );
    }

    #[test]
    fn strategy_totals_and_stage_units() {
        let strategy = BatchStrategy {
            extract_units: 10,
            relieve_units: 1,
            replenish_units: 8,
            relieve_after_replenish_units: 2,
        };
        assert_eq!(strategy.total_units(), 21);
        assert!(!strategy.is_zero());
        assert_eq!(strategy.units_for(BatchStage::Extract), 10);
        assert_eq!(strategy.units_for(BatchStage::RelieveAfterReplenish), 2);
        assert!(BatchStrategy::zero().is_zero());
    }

    #[test]
    fn op_kind_serializes_snake_case() {
        let json = serde_json::to_string(&OpKind::Replenish).unwrap();
        assert_eq!(json, "\"replenish\"");
    }
}
