//! The task distributor.

use tracing::{debug, warn};

use harvest_core::providers::{DispatchRequest, RemoteExecutor};
use harvest_core::types::{BatchPlan, OpKind, OpTable, TargetId};
use harvestgrid_capacity::CapacityPool;

use crate::error::{DispatchError, DispatchResult};

/// Maps required unit counts onto concrete nodes and launches the work.
pub struct TaskDistributor {
    ops: OpTable,
}

impl TaskDistributor {
    pub fn new(ops: OpTable) -> Self {
        Self { ops }
    }

    /// Place `units` of one operation onto nodes, all-or-nothing.
    ///
    /// Returns the number of nodes used. Fails with
    /// [`DispatchError::Partial`] when the walk exhausts the pool first;
    /// units dispatched before the failure stay launched and their
    /// capacity stays reserved until the next refresh.
    pub fn distribute(
        &self,
        kind: OpKind,
        target: &TargetId,
        units: u32,
        window: (i64, i64),
        pool: &mut CapacityPool,
        executor: &dyn RemoteExecutor,
    ) -> DispatchResult<u32> {
        let (placed, remaining, nodes_used) =
            self.walk(kind, target, units, window, pool, executor);
        if remaining > 0 {
            return Err(DispatchError::Partial {
                kind,
                placed,
                remaining,
            });
        }
        Ok(nodes_used)
    }

    /// Best-effort variant for preparation work: place as many units as
    /// currently fit and report how many were launched.
    pub fn distribute_up_to(
        &self,
        kind: OpKind,
        target: &TargetId,
        units: u32,
        window: (i64, i64),
        pool: &mut CapacityPool,
        executor: &dyn RemoteExecutor,
    ) -> u32 {
        let (placed, _, _) = self.walk(kind, target, units, window, pool, executor);
        placed
    }

    /// Dispatch every live stage of a batch plan.
    ///
    /// A quick pre-check rejects plans the whole pool cannot hold, so the
    /// common insufficient-capacity case launches nothing. After that,
    /// the first stage that fails to place completely abandons the rest
    /// of the plan; the caller must not record the batch as started.
    pub fn dispatch_batch(
        &self,
        plan: &BatchPlan,
        pool: &mut CapacityPool,
        executor: &dyn RemoteExecutor,
    ) -> DispatchResult<u32> {
        let needed: f64 = plan
            .live_stages()
            .map(|s| f64::from(s.units) * self.ops.cost_per_unit(s.kind))
            .sum();
        let free = pool.total_free();
        if needed > free {
            return Err(DispatchError::InsufficientCapacity { needed, free });
        }

        let mut launched = 0;
        for stage in plan.live_stages() {
            self.distribute(
                stage.kind,
                &plan.target,
                stage.units,
                (stage.start_ms, stage.end_ms),
                pool,
                executor,
            )?;
            launched += stage.units;
        }

        debug!(
            batch_id = plan.batch_id,
            target_id = %plan.target,
            units = launched,
            "batch dispatched"
        );
        Ok(launched)
    }

    /// Greedy walk over the snapshot: `(placed, remaining, nodes_used)`.
    fn walk(
        &self,
        kind: OpKind,
        target: &TargetId,
        units: u32,
        window: (i64, i64),
        pool: &mut CapacityPool,
        executor: &dyn RemoteExecutor,
    ) -> (u32, u32, u32) {
        let cost = self.ops.cost_per_unit(kind);
        let mut remaining = units;
        let mut nodes_used = 0;

        for node in pool.snapshot() {
            if remaining == 0 {
                break;
            }
            let fits = (node.free_capacity / cost).floor() as u32;
            let take = fits.min(remaining);
            if take == 0 {
                continue;
            }

            let request = DispatchRequest {
                kind,
                node: node.id.clone(),
                units: take,
                target: target.clone(),
                start_ms: window.0,
                end_ms: window.1,
            };
            match executor.dispatch(&request) {
                Ok(handle) => {
                    pool.reserve(&node.id, f64::from(take) * cost);
                    remaining -= take;
                    nodes_used += 1;
                    debug!(
                        ?kind,
                        node = %node.id,
                        units = take,
                        pid = handle.0,
                        "units dispatched"
                    );
                }
                Err(e) => {
                    // Rejection is zero progress on this node only.
                    warn!(?kind, node = %node.id, error = %e, "dispatch rejected");
                }
            }
        }

        (units - remaining, remaining, nodes_used)
    }
}
