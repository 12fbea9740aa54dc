//! The batch lifecycle manager.

use std::collections::HashMap;

use tracing::debug;

use harvest_core::types::TargetId;

/// Tracks how many batches are believed to be in flight per target.
///
/// Owned exclusively by the scheduling loop; counters only ever move
/// inside a cycle, so no synchronization is needed.
#[derive(Debug)]
pub struct BatchLifecycleManager {
    active: HashMap<TargetId, u32>,
    max_per_target: u32,
    /// Batches recorded since construction (survives pruning).
    started_total: u64,
    /// Number of prune passes performed.
    prune_count: u64,
}

impl BatchLifecycleManager {
    pub fn new(max_per_target: u32) -> Self {
        Self {
            active: HashMap::new(),
            max_per_target,
            started_total: 0,
            prune_count: 0,
        }
    }

    /// Batches currently counted in flight for a target.
    pub fn active_count(&self, target: &str) -> u32 {
        self.active.get(target).copied().unwrap_or(0)
    }

    /// Whether another batch may start for this target.
    pub fn can_schedule(&self, target: &str) -> bool {
        self.active_count(target) < self.max_per_target
    }

    /// Record a successfully dispatched batch.
    ///
    /// Refuses (returns false, counts nothing) at the ceiling, so the
    /// per-target invariant holds no matter what the caller does.
    pub fn record_batch_start(&mut self, target: &str) -> bool {
        let count = self.active.entry(target.to_string()).or_insert(0);
        if *count >= self.max_per_target {
            return false;
        }
        *count += 1;
        self.started_total += 1;
        true
    }

    /// Forget all in-flight counts.
    ///
    /// Run periodically: batches the scheduler can no longer verify are
    /// assumed done, and the ceiling starts over. Idempotent.
    pub fn prune(&mut self) {
        let forgotten: u32 = self.active.values().sum();
        self.active.clear();
        self.prune_count += 1;
        debug!(forgotten, "lifecycle counters pruned");
    }

    /// Per-target counts, for the status surface.
    pub fn targets(&self) -> HashMap<TargetId, u32> {
        self.active.clone()
    }

    pub fn started_total(&self) -> u64 {
        self.started_total
    }

    pub fn prune_count(&self) -> u64 {
        self.prune_count
    }

    pub fn max_per_target(&self) -> u32 {
        self.max_per_target
    }
}
