//! The batch timing planner.

use std::time::Duration;

use tracing::debug;

use harvest_core::config::TimingConfig;
use harvest_core::providers::TargetStateProvider;
use harvest_core::types::{BatchPlan, BatchStage, BatchStrategy, OpKind, StageTiming, TargetSnapshot};

/// Predicted durations for each operation kind against one target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageDurations {
    pub extract: Duration,
    pub relieve: Duration,
    pub replenish: Duration,
}

impl StageDurations {
    /// Query the provider's duration oracle for all three kinds.
    pub fn predict(provider: &dyn TargetStateProvider, target: &TargetSnapshot) -> Self {
        Self {
            extract: provider.duration_of(OpKind::Extract, target),
            relieve: provider.duration_of(OpKind::Relieve, target),
            replenish: provider.duration_of(OpKind::Replenish, target),
        }
    }

    fn millis(&self, kind: OpKind) -> i64 {
        let d = match kind {
            OpKind::Extract => self.extract,
            OpKind::Relieve => self.relieve,
            OpKind::Replenish => self.replenish,
        };
        d.as_millis() as i64
    }
}

/// Computes the four-stage schedule for a batch.
pub struct BatchTimingPlanner {
    spacing_ms: i64,
    batch_spacing_ms: i64,
}

impl BatchTimingPlanner {
    pub fn new(config: &TimingConfig) -> Self {
        Self {
            spacing_ms: config.spacing().as_millis() as i64,
            batch_spacing_ms: config.batch_spacing().as_millis() as i64,
        }
    }

    /// Produce a timed plan for one batch.
    ///
    /// `active_count` is the number of batches already in flight for this
    /// target; each one pushes the anchor out by one batch spacing so
    /// concurrent batches interleave instead of colliding.
    ///
    /// All four stages appear in the skeleton even with zero units; such
    /// stages are skipped at dispatch, not in the timing math.
    pub fn plan(
        &self,
        batch_id: u64,
        target: &str,
        strategy: &BatchStrategy,
        durations: &StageDurations,
        active_count: u32,
        now_ms: i64,
    ) -> BatchPlan {
        let anchor = now_ms + self.batch_spacing_ms * i64::from(active_count);

        // Work backward from the final completion.
        let relieve2_end = anchor + durations.millis(OpKind::Relieve);
        let replenish_end = relieve2_end - self.spacing_ms;
        let relieve1_end = replenish_end - self.spacing_ms;
        let extract_end = relieve1_end - self.spacing_ms;

        let ends = [extract_end, relieve1_end, replenish_end, relieve2_end];
        let stages: [StageTiming; 4] = std::array::from_fn(|i| {
            let stage = BatchStage::ALL[i];
            let kind = stage.op_kind();
            let end_ms = ends[i];
            StageTiming {
                stage,
                kind,
                units: strategy.units_for(stage),
                start_ms: end_ms - durations.millis(kind),
                end_ms,
            }
        });

        let overall_start_ms = stages
            .iter()
            .map(|s| s.start_ms)
            .min()
            .unwrap_or(anchor);

        debug!(
            batch_id,
            target,
            anchor,
            overall_start_ms,
            overall_end_ms = relieve2_end,
            "batch plan timed"
        );

        BatchPlan {
            batch_id,
            target: target.to_string(),
            stages,
            overall_start_ms,
            overall_end_ms: relieve2_end,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    fn strategy() -> BatchStrategy {
        BatchStrategy {
            extract_units: 10,
            relieve_units: 1,
            replenish_units: 8,
            relieve_after_replenish_units: 1,
        }
    }

    fn planner() -> BatchTimingPlanner {
        BatchTimingPlanner::new(&TimingConfig::default())
    }

    #[test]
    fn worked_example_schedule() {
        // durations = (extract 20s, relieve 80s, replenish 64s), spacing 50ms.
        let durations = StageDurations {
            extract: secs(20),
            relieve: secs(80),
            replenish: secs(64),
        };
        let t0 = 1_000_000;
        let plan = planner().plan(7, "alpha", &strategy(), &durations, 0, t0);

        let [extract, relieve1, replenish, relieve2] = &plan.stages;
        assert_eq!(relieve2.end_ms, t0 + 80_000);
        assert_eq!(replenish.end_ms, t0 + 79_950);
        assert_eq!(relieve1.end_ms, t0 + 79_900);
        assert_eq!(extract.end_ms, t0 + 79_850);
        assert_eq!(extract.start_ms, t0 + 59_850);
        assert_eq!(replenish.start_ms, t0 + 79_950 - 64_000);
        assert_eq!(plan.overall_end_ms, t0 + 80_000);
    }

    #[test]
    fn completions_ordered_with_spacing() {
        let cases = [
            (secs(20), secs(80), secs(64)),
            (secs(1), secs(1), secs(1)),
            (secs(300), secs(2), secs(150)),
            (secs(5), secs(600), secs(30)),
        ];
        for (extract, relieve, replenish) in cases {
            let durations = StageDurations {
                extract,
                relieve,
                replenish,
            };
            let plan = planner().plan(1, "alpha", &strategy(), &durations, 0, 0);
            for pair in plan.stages.windows(2) {
                assert!(
                    pair[1].end_ms - pair[0].end_ms >= 50,
                    "completions out of order for durations {durations:?}"
                );
            }
        }
    }

    #[test]
    fn dominating_duration_starts_before_anchor() {
        // Extract takes far longer than relieve: its start lands in the
        // past relative to the anchor, which is legal.
        let durations = StageDurations {
            extract: secs(300),
            relieve: secs(2),
            replenish: secs(150),
        };
        let plan = planner().plan(1, "alpha", &strategy(), &durations, 0, 1_000_000);
        assert!(plan.stages[0].start_ms < 1_000_000);
        assert_eq!(plan.overall_start_ms, plan.stages[0].start_ms);
    }

    #[test]
    fn active_batches_push_the_anchor_out() {
        let durations = StageDurations {
            extract: secs(20),
            relieve: secs(80),
            replenish: secs(64),
        };
        let base = planner().plan(1, "alpha", &strategy(), &durations, 0, 0);
        let offset = planner().plan(2, "alpha", &strategy(), &durations, 3, 0);

        // batch_spacing 200ms × 3 in-flight batches.
        assert_eq!(offset.overall_end_ms - base.overall_end_ms, 600);
        for (a, b) in base.stages.iter().zip(offset.stages.iter()) {
            assert_eq!(b.end_ms - a.end_ms, 600);
            assert_eq!(b.start_ms - a.start_ms, 600);
        }
    }

    #[test]
    fn zero_unit_stage_stays_in_skeleton() {
        let durations = StageDurations {
            extract: secs(20),
            relieve: secs(80),
            replenish: secs(64),
        };
        let mut s = strategy();
        s.replenish_units = 0;
        let plan = planner().plan(1, "alpha", &s, &durations, 0, 0);

        assert_eq!(plan.stages.len(), 4);
        assert_eq!(plan.stages[2].units, 0);
        let live: Vec<_> = plan.live_stages().map(|st| st.stage).collect();
        assert_eq!(
            live,
            vec![
                BatchStage::Extract,
                BatchStage::RelieveAfterExtract,
                BatchStage::RelieveAfterReplenish
            ]
        );
    }

    #[test]
    fn stage_kinds_follow_fixed_order() {
        let durations = StageDurations {
            extract: secs(10),
            relieve: secs(10),
            replenish: secs(10),
        };
        let plan = planner().plan(1, "alpha", &strategy(), &durations, 0, 0);
        let kinds: Vec<_> = plan.stages.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![OpKind::Extract, OpKind::Relieve, OpKind::Replenish, OpKind::Relieve]
        );
    }
}
