//! harvestgrid-timing — absolute stage schedules for batches.
//!
//! A batch is four operations whose *completions* must land in a fixed
//! order — extract, relieve, replenish, relieve — each at least one
//! spacing interval after the previous. Because dispatch is
//! fire-and-forget, the planner works open-loop: it predicts durations at
//! planning time, computes the schedule backward from the last
//! completion, and commits to it. Nothing later verifies the real
//! completion times.
//!
//! ```text
//! relieve2_end    = anchor + d_relieve        (ends last)
//! replenish_end   = relieve2_end − spacing
//! relieve1_end    = replenish_end − spacing
//! extract_end     = relieve1_end − spacing
//! ```
//!
//! Stage starts follow from the per-kind durations; a stage whose
//! duration dominates may start before the anchor, which the executor
//! treats as "start immediately".

pub mod planner;

pub use planner::{BatchTimingPlanner, StageDurations};
