//! Collaborator traits consumed by the scheduling core.
//!
//! The core never talks to the outside world directly: node discovery,
//! target state reads, and job launches all go through these traits. The
//! daemon wires in real implementations; tests and standalone mode use
//! the simulated fleet.

use std::time::Duration;

use crate::types::{NodeCapacity, NodeId, OpKind, PressureModel, TargetId, TargetSnapshot};

/// Reports the current capacity of every reachable worker node.
///
/// Called once per cycle when the capacity pool refreshes; the pool drops
/// nodes that stop appearing in the report.
pub trait NodeCapacityProvider: Send + Sync {
    fn list_nodes(&self) -> anyhow::Result<Vec<NodeCapacity>>;
}

/// Supplies target state and the numeric oracles the strategy and timing
/// calculations depend on.
pub trait TargetStateProvider: Send + Sync {
    /// Ids of all known targets.
    fn list_targets(&self) -> anyhow::Result<Vec<TargetId>>;

    /// Current state of one target.
    fn state(&self, id: &str) -> anyhow::Result<TargetSnapshot>;

    /// Fraction of the target's current resource one extract unit yields.
    fn extraction_per_unit(&self, target: &TargetSnapshot) -> f64;

    /// Units of replenish work needed to multiply the target's resource
    /// level by `factor`. Monotonic in `factor`.
    fn replenish_units_for(&self, target: &TargetSnapshot, factor: f64) -> f64;

    /// Predicted wall-clock duration of one operation of `kind` against
    /// the target, given its current state.
    fn duration_of(&self, kind: OpKind, target: &TargetSnapshot) -> Duration;

    /// Pressure deltas per unit of work. The default model matches the
    /// standard fleet; providers with unusual targets override it.
    fn pressure_model(&self) -> PressureModel {
        PressureModel::default()
    }
}

/// One job launch request against a specific node.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchRequest {
    pub kind: OpKind,
    pub node: NodeId,
    pub units: u32,
    pub target: TargetId,
    /// Scheduled start, epoch milliseconds. A start in the past means
    /// "start immediately".
    pub start_ms: i64,
    /// Predicted end, epoch milliseconds.
    pub end_ms: i64,
}

/// Opaque handle to a launched remote process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessHandle(pub u64);

/// Launches jobs on worker nodes. Fire-and-forget: there is no completion
/// callback anywhere in the system, so the scheduler only ever learns
/// about finished work indirectly, through the next capacity refresh.
pub trait RemoteExecutor: Send + Sync {
    /// Launch `req.units` units of work on `req.node`. An `Err` means the
    /// node rejected the job; the caller treats that as zero progress on
    /// that node.
    fn dispatch(&self, req: &DispatchRequest) -> anyhow::Result<ProcessHandle>;
}
