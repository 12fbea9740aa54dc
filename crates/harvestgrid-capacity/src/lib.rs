//! harvestgrid-capacity — free-capacity tracking across the worker fleet.
//!
//! The `CapacityPool` is the single shared mutable resource of a
//! scheduling cycle. It is rebuilt from the `NodeCapacityProvider` at the
//! start of every cycle (discarding all prior reservations — that refresh
//! is the only mechanism reconciling predicted against actual capacity)
//! and then consumed by the preparation and scheduling phases through
//! `reserve` calls.

pub mod error;
pub mod pool;

pub use error::{CapacityError, CapacityResult};
pub use pool::{CapacityPool, ReservePolicy};
