//! harvestgrid-strategy — turns a target's state into batch unit counts.
//!
//! # Calculation
//!
//! ```text
//! extract_units  = floor(ratio / extraction_per_unit)
//!                  clamped so extract_units × extraction_per_unit ≤ max_extract_fraction
//! relieve_units  = ceil(extract_units × extract_rise / relieve_drop)
//! replenish_units = ceil(replenish_units_for(target, 1 / (1 − ratio)))
//! relieve_after  = ceil(replenish_units × replenish_rise / relieve_drop)
//! ```
//!
//! Rounding is floor for extraction and ceil for everything else, so the
//! real effect of a batch never exceeds its planned effect.
//!
//! The feasibility search halves the requested ratio until the strategy's
//! total capacity cost fits the given budget, bounded by both an
//! iteration cap and a wall-clock cap.

pub mod calculator;

pub use calculator::{strategy_cost, StrategyCalculator};
