//! harvestgrid-lifecycle — in-flight batch accounting.
//!
//! There is no completion feedback channel, so the manager cannot know
//! when a batch actually finishes. It counts batch starts per target,
//! enforces the per-target ceiling, and periodically forgets everything
//! (`prune`) — trading staleness for simplicity, exactly as the
//! open-loop design demands.

pub mod manager;

pub use manager::BatchLifecycleManager;
