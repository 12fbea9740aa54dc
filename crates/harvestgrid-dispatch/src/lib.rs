//! harvestgrid-dispatch — places work units onto concrete nodes.
//!
//! The distributor walks the capacity pool's snapshot in descending
//! free-capacity order and greedily assigns as many units to each node as
//! its free capacity holds, splitting one operation across nodes when
//! needed. Placement stays best-effort greedy; the walk order is part of
//! the observable contract.
//!
//! Dispatch failures on one node cost no progress there and the walk
//! continues. When the nodes run out before all units are placed, the
//! operation fails as a whole; capacity reserved earlier in that walk is
//! not rolled back and comes back only with the next pool refresh.

pub mod distributor;
pub mod error;

pub use distributor::TaskDistributor;
pub use error::{DispatchError, DispatchResult};
