//! Scheduler error types.

use thiserror::Error;

/// Result type alias for cycle-level operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Errors that abort one scheduling cycle.
///
/// These are caught at the `tick` boundary — they never propagate to the
/// caller and never terminate the loop.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("capacity refresh failed: {0}")]
    Capacity(#[from] harvestgrid_capacity::CapacityError),

    #[error("target provider failed: {0}")]
    Provider(#[from] anyhow::Error),
}
