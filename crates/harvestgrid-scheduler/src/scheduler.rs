//! The scheduling loop and its control surface.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use harvest_core::config::HarvestConfig;
use harvest_core::providers::{NodeCapacityProvider, RemoteExecutor, TargetStateProvider};
use harvest_core::types::{epoch_ms, OpKind, PrepState, TargetId, TargetSnapshot};
use harvestgrid_capacity::{CapacityPool, ReservePolicy};
use harvestgrid_dispatch::{DispatchError, TaskDistributor};
use harvestgrid_lifecycle::BatchLifecycleManager;
use harvestgrid_strategy::{strategy_cost, StrategyCalculator};
use harvestgrid_timing::{BatchTimingPlanner, StageDurations};

use crate::error::SchedulerResult;

/// Point-in-time view of the scheduler, the only surface a surrounding
/// CLI or dashboard reads.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub cycle: u64,
    /// In-flight batch counts per target.
    pub active_batches: HashMap<TargetId, u32>,
    pub nodes: usize,
    pub total_free: f64,
    pub utilization: f64,
    pub batches_started_total: u64,
    pub cycle_failures: u64,
}

/// The scheduling loop.
///
/// Owns the capacity pool and the lifecycle counters outright; the three
/// collaborators are the only connection to the outside world. All entry
/// points are `tick` and `status` — nothing else is callable from
/// surrounding layers.
pub struct Scheduler {
    config: HarvestConfig,
    reserve_policy: ReservePolicy,

    capacity_provider: Arc<dyn NodeCapacityProvider>,
    target_provider: Arc<dyn TargetStateProvider>,
    executor: Arc<dyn RemoteExecutor>,

    pool: CapacityPool,
    lifecycle: BatchLifecycleManager,
    calculator: StrategyCalculator,
    planner: BatchTimingPlanner,
    distributor: TaskDistributor,

    cycle: u64,
    next_batch_id: u64,
    cycle_failures: u64,
    last_cycle_failed: bool,
}

impl Scheduler {
    pub fn new(
        config: HarvestConfig,
        capacity_provider: Arc<dyn NodeCapacityProvider>,
        target_provider: Arc<dyn TargetStateProvider>,
        executor: Arc<dyn RemoteExecutor>,
    ) -> Self {
        let reserve_policy = ReservePolicy::from_config(&config.fleet);
        let calculator = StrategyCalculator::new(config.strategy.clone());
        let planner = BatchTimingPlanner::new(&config.timing);
        let distributor = TaskDistributor::new(config.ops.clone());
        let lifecycle = BatchLifecycleManager::new(config.batches.max_per_target);

        Self {
            config,
            reserve_policy,
            capacity_provider,
            target_provider,
            executor,
            pool: CapacityPool::new(),
            lifecycle,
            calculator,
            planner,
            distributor,
            cycle: 0,
            next_batch_id: 0,
            cycle_failures: 0,
            last_cycle_failed: false,
        }
    }

    /// Run one scheduling cycle. Returns the number of batches launched.
    ///
    /// Never fails: a cycle-fatal error is logged and counted, and the
    /// next cycle starts from a fresh refresh anyway.
    pub fn tick(&mut self) -> u32 {
        let launched = match self.run_cycle() {
            Ok(launched) => {
                self.last_cycle_failed = false;
                launched
            }
            Err(e) => {
                self.cycle_failures += 1;
                self.last_cycle_failed = true;
                error!(cycle = self.cycle, error = %e, "cycle failed");
                0
            }
        };
        self.cycle += 1;
        launched
    }

    /// Current status counters.
    pub fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            cycle: self.cycle,
            active_batches: self.lifecycle.targets(),
            nodes: self.pool.len(),
            total_free: self.pool.total_free(),
            utilization: self.pool.utilization(),
            batches_started_total: self.lifecycle.started_total(),
            cycle_failures: self.cycle_failures,
        }
    }

    /// Drive `tick` on the configured cadence until shutdown.
    ///
    /// After a failed cycle the loop sleeps the (longer) failure backoff
    /// instead of the regular interval.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_ms = self.config.scheduler.cycle_interval_ms,
            "scheduler started"
        );

        loop {
            let sleep_for = if self.last_cycle_failed {
                self.config.scheduler.failure_backoff()
            } else {
                self.config.scheduler.cycle_interval()
            };

            tokio::select! {
                _ = tokio::time::sleep(sleep_for) => {
                    let launched = self.tick();
                    debug!(cycle = self.cycle, launched, "cycle complete");
                }
                _ = shutdown.changed() => {
                    info!("scheduler shutting down");
                    break;
                }
            }
        }
    }

    // ── One cycle ──────────────────────────────────────────────────

    fn run_cycle(&mut self) -> SchedulerResult<u32> {
        if self.config.batches.prune_interval > 0
            && self.cycle > 0
            && self.cycle % self.config.batches.prune_interval == 0
        {
            self.lifecycle.prune();
            let status = self.status();
            info!(
                cycle = status.cycle,
                started_total = status.batches_started_total,
                failures = status.cycle_failures,
                "periodic prune"
            );
        }

        self.pool
            .refresh(self.capacity_provider.as_ref(), &self.reserve_policy)?;
        let targets = self.refresh_targets()?;

        self.prepare(&targets);
        let launched = self.schedule(&targets);
        Ok(launched)
    }

    /// Snapshot every target, dropping ones whose state read fails, in
    /// descending long-run yield order.
    fn refresh_targets(&self) -> SchedulerResult<Vec<TargetSnapshot>> {
        let ids = self.target_provider.list_targets()?;
        let mut targets = Vec::with_capacity(ids.len());
        for id in ids {
            match self.target_provider.state(&id) {
                Ok(snapshot) => targets.push(snapshot),
                Err(e) => warn!(target_id = %id, error = %e, "target state read failed, skipping"),
            }
        }
        targets.sort_by(|a, b| {
            let yield_a = a.max_resource * a.growth_rate;
            let yield_b = b.max_resource * b.growth_rate;
            yield_b
                .partial_cmp(&yield_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(targets)
    }

    /// Drive unprepared targets toward `Ready` with best-effort
    /// counter-pressure or replenish work.
    fn prepare(&mut self, targets: &[TargetSnapshot]) {
        let thresholds = self.config.prepare.thresholds();

        for target in targets {
            let (kind, units) = match PrepState::classify(target, &thresholds) {
                PrepState::Ready => continue,
                PrepState::Relieving => (OpKind::Relieve, self.relieve_deficit(target)),
                PrepState::Replenishing => (OpKind::Replenish, self.replenish_deficit(target)),
            };
            if units == 0 {
                continue;
            }

            let now = epoch_ms();
            let duration = self.target_provider.duration_of(kind, target).as_millis() as i64;
            let placed = self.distributor.distribute_up_to(
                kind,
                &target.id,
                units,
                (now, now + duration),
                &mut self.pool,
                self.executor.as_ref(),
            );

            if placed == 0 {
                debug!(target_id = %target.id, "no capacity left for preparation, stopping phase");
                break;
            }
            debug!(
                target_id = %target.id,
                ?kind,
                requested = units,
                placed,
                "preparation dispatched"
            );
        }
    }

    /// Units of counter-pressure needed to push the target to its floor.
    fn relieve_deficit(&self, target: &TargetSnapshot) -> u32 {
        let model = self.target_provider.pressure_model();
        if model.relieve_drop_per_unit <= 0.0 {
            return 0;
        }
        let excess = (target.current_pressure - target.min_pressure).max(0.0);
        (excess / model.relieve_drop_per_unit).ceil() as u32
    }

    /// Units of replenish work needed to refill the target.
    fn replenish_deficit(&self, target: &TargetSnapshot) -> u32 {
        let current = target.current_resource.max(1.0);
        let factor = target.max_resource / current;
        if factor <= 1.0 {
            return 0;
        }
        self.target_provider
            .replenish_units_for(target, factor)
            .ceil()
            .max(0.0) as u32
    }

    /// Build and dispatch batches for prepared targets, within the
    /// per-target ceiling and the per-cycle launch limit.
    fn schedule(&mut self, targets: &[TargetSnapshot]) -> u32 {
        let thresholds = self.config.prepare.thresholds();
        let mut launched = 0u32;

        for target in targets {
            if launched >= self.config.batches.max_per_cycle {
                debug!(launched, "per-cycle batch limit reached");
                break;
            }
            if PrepState::classify(target, &thresholds) != PrepState::Ready {
                continue;
            }
            if !self.lifecycle.can_schedule(&target.id) {
                debug!(
                    target_id = %target.id,
                    active = self.lifecycle.active_count(&target.id),
                    "batch ceiling reached, skipping"
                );
                continue;
            }

            let (strategy, ratio) = self.calculator.feasible(
                target,
                self.pool.total_free(),
                &self.config.ops,
                self.target_provider.as_ref(),
            );
            if strategy.is_zero() {
                continue;
            }
            if strategy_cost(&strategy, &self.config.ops) > self.pool.total_free() {
                debug!(target_id = %target.id, "insufficient capacity for any batch, stopping phase");
                break;
            }

            let durations = StageDurations::predict(self.target_provider.as_ref(), target);
            let plan = self.planner.plan(
                self.next_batch_id,
                &target.id,
                &strategy,
                &durations,
                self.lifecycle.active_count(&target.id),
                epoch_ms(),
            );
            self.next_batch_id += 1;

            match self
                .distributor
                .dispatch_batch(&plan, &mut self.pool, self.executor.as_ref())
            {
                Ok(units) => {
                    self.lifecycle.record_batch_start(&target.id);
                    launched += 1;
                    info!(
                        batch_id = plan.batch_id,
                        target_id = %target.id,
                        units,
                        ratio,
                        "batch launched"
                    );
                }
                Err(DispatchError::InsufficientCapacity { needed, free }) => {
                    debug!(target_id = %target.id, needed, free, "capacity exhausted, stopping phase");
                    break;
                }
                Err(e @ DispatchError::Partial { .. }) => {
                    // Abandon the whole plan; nothing is recorded. The
                    // over-reserved capacity comes back at next refresh.
                    warn!(target_id = %target.id, error = %e, "batch abandoned after partial distribution");
                }
            }
        }

        launched
    }
}
