//! Error types for task distribution.

use harvest_core::types::OpKind;
use thiserror::Error;

/// Result type alias for distribution operations.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Errors that can occur while distributing work onto nodes.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The batch needs more free capacity than the whole pool currently
    /// has; nothing was dispatched.
    #[error("batch needs {needed:.2} capacity units but only {free:.2} are free")]
    InsufficientCapacity { needed: f64, free: f64 },

    /// Nodes were exhausted with units still unplaced. Units placed
    /// earlier in the walk stay dispatched and their capacity stays
    /// reserved.
    #[error("placed only {placed} units of a {kind:?} operation, {remaining} remain")]
    Partial {
        kind: OpKind,
        placed: u32,
        remaining: u32,
    },
}
