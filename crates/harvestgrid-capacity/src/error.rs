//! Error types for the capacity pool.

use thiserror::Error;

/// Result type alias for capacity pool operations.
pub type CapacityResult<T> = Result<T, CapacityError>;

/// Errors that can occur while maintaining the capacity pool.
#[derive(Debug, Error)]
pub enum CapacityError {
    #[error("node capacity provider failed: {0}")]
    Provider(String),
}
