//! Strategy calculation and the capacity feasibility search.

use std::time::Instant;

use tracing::{debug, warn};

use harvest_core::config::StrategyConfig;
use harvest_core::providers::TargetStateProvider;
use harvest_core::types::{BatchStrategy, OpKind, OpTable, TargetSnapshot};

/// Total node capacity a strategy consumes, per the operation cost table.
pub fn strategy_cost(strategy: &BatchStrategy, ops: &OpTable) -> f64 {
    f64::from(strategy.extract_units) * ops.cost_per_unit(OpKind::Extract)
        + f64::from(strategy.relieve_units + strategy.relieve_after_replenish_units)
            * ops.cost_per_unit(OpKind::Relieve)
        + f64::from(strategy.replenish_units) * ops.cost_per_unit(OpKind::Replenish)
}

/// Computes batch unit counts for targets.
pub struct StrategyCalculator {
    config: StrategyConfig,
}

impl StrategyCalculator {
    pub fn new(config: StrategyConfig) -> Self {
        Self { config }
    }

    /// Unit counts needed to extract `ratio` of the target's resource and
    /// leave pressure and resource level where they started.
    ///
    /// Returns a zero strategy when the target yields nothing per unit,
    /// has no resource ceiling, or the ratio is out of range.
    pub fn compute(
        &self,
        target: &TargetSnapshot,
        ratio: f64,
        provider: &dyn TargetStateProvider,
    ) -> BatchStrategy {
        if ratio <= 0.0 || ratio >= 1.0 || target.max_resource <= 0.0 {
            return BatchStrategy::zero();
        }
        let per_unit = provider.extraction_per_unit(target);
        if per_unit <= 0.0 {
            return BatchStrategy::zero();
        }

        let pressure = provider.pressure_model();

        // Floor keeps the extracted fraction at or below the request; the
        // cap bounds it regardless of how large the request was.
        let requested = (ratio / per_unit).floor() as u32;
        let cap = (self.config.max_extract_fraction / per_unit).floor() as u32;
        let extract_units = requested.min(cap);

        let relieve_units = ceil_ratio(
            f64::from(extract_units) * pressure.extract_rise_per_unit,
            pressure.relieve_drop_per_unit,
        );

        // Restore the extracted fraction: multiply resource by 1/(1-ratio).
        let factor = 1.0 / (1.0 - ratio);
        let replenish_units = provider.replenish_units_for(target, factor).ceil().max(0.0) as u32;

        let relieve_after_replenish_units = ceil_ratio(
            f64::from(replenish_units) * pressure.replenish_rise_per_unit,
            pressure.relieve_drop_per_unit,
        );

        BatchStrategy {
            extract_units,
            relieve_units,
            replenish_units,
            relieve_after_replenish_units,
        }
    }

    /// Shrink the requested ratio until the strategy fits `budget`.
    ///
    /// Halves the ratio each round, bounded by the configured iteration
    /// cap and wall-clock timeout. On exhaustion the last computed
    /// strategy is returned as-is — the caller re-checks cost against its
    /// budget, so a still-infeasible result degrades into a skip, never a
    /// block.
    pub fn feasible(
        &self,
        target: &TargetSnapshot,
        budget: f64,
        ops: &OpTable,
        provider: &dyn TargetStateProvider,
    ) -> (BatchStrategy, f64) {
        let started = Instant::now();
        let mut ratio = self.config.extraction_ratio;
        let mut strategy = self.compute(target, ratio, provider);
        let mut iters = 0u32;

        while strategy_cost(&strategy, ops) > budget && !strategy.is_zero() {
            iters += 1;
            if iters >= self.config.max_search_iters
                || started.elapsed() >= self.config.search_timeout()
            {
                warn!(
                    target_id = %target.id,
                    iters,
                    budget,
                    cost = strategy_cost(&strategy, ops),
                    "strategy search budget exhausted, keeping last result"
                );
                break;
            }
            ratio /= 2.0;
            strategy = self.compute(target, ratio, provider);
        }

        debug!(
            target_id = %target.id,
            ratio,
            units = strategy.total_units(),
            cost = strategy_cost(&strategy, ops),
            "strategy computed"
        );
        (strategy, ratio)
    }
}

/// `ceil(numerator / denominator)` as a unit count; zero when the
/// denominator is not positive.
fn ceil_ratio(numerator: f64, denominator: f64) -> u32 {
    if denominator <= 0.0 {
        return 0;
    }
    (numerator / denominator).ceil().max(0.0) as u32
}
