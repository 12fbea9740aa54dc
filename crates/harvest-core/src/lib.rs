//! harvest-core — shared foundation for the HarvestGrid workspace.
//!
//! Holds the domain model (nodes, targets, operation kinds, batch plans),
//! the collaborator traits the scheduling core consumes, and the
//! `harvest.toml` configuration parser. Every other crate in the workspace
//! depends on this one and nothing else outside the workspace.

pub mod config;
pub mod providers;
pub mod types;

pub use config::HarvestConfig;
pub use providers::{DispatchRequest, NodeCapacityProvider, ProcessHandle, RemoteExecutor, TargetStateProvider};
pub use types::*;
