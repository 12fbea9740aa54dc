//! CapacityPool — per-node free capacity with in-cycle reservations.

use std::collections::HashMap;

use tracing::{debug, warn};

use harvest_core::providers::NodeCapacityProvider;
use harvest_core::types::{Node, NodeId};

use crate::error::{CapacityError, CapacityResult};

/// Capacity withheld from the pool before any scheduling happens.
///
/// A distinguished home node usually runs the scheduler itself plus other
/// workloads; a fixed floor of its capacity is never handed out.
#[derive(Debug, Clone, Default)]
pub struct ReservePolicy {
    pub home_node: Option<NodeId>,
    pub home_reserved: f64,
}

impl ReservePolicy {
    /// No reservation anywhere.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn from_config(fleet: &harvest_core::config::FleetConfig) -> Self {
        Self {
            home_node: fleet.home_node.clone(),
            home_reserved: fleet.home_reserved,
        }
    }
}

/// Tracks free and maximum capacity per node for one scheduling cycle.
///
/// Owned exclusively by the scheduling loop; collaborators receive it by
/// reference for the duration of a cycle. Reservations made during a
/// cycle are visible to all subsequent calls in that cycle and are
/// discarded wholesale by the next [`refresh`](CapacityPool::refresh).
#[derive(Debug, Default)]
pub struct CapacityPool {
    nodes: HashMap<NodeId, Node>,
}

impl CapacityPool {
    /// Create an empty pool. Call `refresh` before first use.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the pool from the provider's current report.
    ///
    /// Nodes absent from the report are dropped; prior reservations are
    /// discarded. The reserve policy's home floor is subtracted from the
    /// home node's free capacity before it enters the pool.
    pub fn refresh(
        &mut self,
        provider: &dyn NodeCapacityProvider,
        policy: &ReservePolicy,
    ) -> CapacityResult<()> {
        let reports = provider
            .list_nodes()
            .map_err(|e| CapacityError::Provider(e.to_string()))?;

        self.nodes.clear();
        for report in reports {
            let mut free = report.free();
            if policy.home_node.as_deref() == Some(report.id.as_str()) {
                free = (free - policy.home_reserved).max(0.0);
            }
            self.nodes.insert(
                report.id.clone(),
                Node {
                    id: report.id,
                    max_capacity: report.max_capacity,
                    free_capacity: free,
                },
            );
        }

        debug!(
            nodes = self.nodes.len(),
            total_free = self.total_free(),
            "capacity pool refreshed"
        );
        Ok(())
    }

    /// All nodes ordered by descending free capacity.
    ///
    /// Ties break on node id so the walk order is deterministic within a
    /// cycle.
    pub fn snapshot(&self) -> Vec<Node> {
        let mut nodes: Vec<Node> = self.nodes.values().cloned().collect();
        nodes.sort_by(|a, b| {
            b.free_capacity
                .partial_cmp(&a.free_capacity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        nodes
    }

    /// Reserve `amount` capacity on a node.
    ///
    /// Returns false (and reserves nothing) if the node is unknown or the
    /// amount exceeds its current free capacity.
    pub fn reserve(&mut self, node_id: &str, amount: f64) -> bool {
        let Some(node) = self.nodes.get_mut(node_id) else {
            warn!(node = node_id, "reserve against unknown node");
            return false;
        };
        if amount > node.free_capacity {
            return false;
        }
        node.free_capacity = (node.free_capacity - amount).max(0.0);
        true
    }

    /// Return previously reserved capacity to a node, clamped so free
    /// never exceeds max. Unknown nodes are ignored.
    pub fn release(&mut self, node_id: &str, amount: f64) {
        if let Some(node) = self.nodes.get_mut(node_id) {
            node.free_capacity = (node.free_capacity + amount).min(node.max_capacity);
        }
    }

    /// Free capacity on one node, if it is in the pool.
    pub fn free_on(&self, node_id: &str) -> Option<f64> {
        self.nodes.get(node_id).map(|n| n.free_capacity)
    }

    /// Sum of free capacity across all nodes.
    pub fn total_free(&self) -> f64 {
        self.nodes.values().map(|n| n.free_capacity).sum()
    }

    /// Sum of maximum capacity across all nodes.
    pub fn total_max(&self) -> f64 {
        self.nodes.values().map(|n| n.max_capacity).sum()
    }

    /// Fraction of fleet capacity currently in use, in `[0, 1]`.
    pub fn utilization(&self) -> f64 {
        let max = self.total_max();
        if max <= 0.0 {
            return 0.0;
        }
        (1.0 - self.total_free() / max).clamp(0.0, 1.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harvest_core::types::NodeCapacity;

    struct StaticProvider {
        nodes: Vec<NodeCapacity>,
    }

    impl NodeCapacityProvider for StaticProvider {
        fn list_nodes(&self) -> anyhow::Result<Vec<NodeCapacity>> {
            Ok(self.nodes.clone())
        }
    }

    fn report(id: &str, max: f64, used: f64) -> NodeCapacity {
        NodeCapacity {
            id: id.to_string(),
            max_capacity: max,
            used_capacity: used,
        }
    }

    fn pool_with(nodes: Vec<NodeCapacity>) -> CapacityPool {
        let mut pool = CapacityPool::new();
        pool.refresh(&StaticProvider { nodes }, &ReservePolicy::none())
            .unwrap();
        pool
    }

    #[test]
    fn refresh_builds_nodes_with_free_capacity() {
        let pool = pool_with(vec![report("a", 100.0, 30.0), report("b", 50.0, 0.0)]);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.free_on("a"), Some(70.0));
        assert_eq!(pool.total_free(), 120.0);
        assert_eq!(pool.total_max(), 150.0);
    }

    #[test]
    fn snapshot_orders_by_descending_free() {
        let pool = pool_with(vec![
            report("small", 100.0, 90.0),
            report("big", 100.0, 0.0),
            report("mid", 100.0, 50.0),
        ]);
        let ids: Vec<_> = pool.snapshot().into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec!["big", "mid", "small"]);
    }

    #[test]
    fn snapshot_tie_breaks_on_id() {
        let pool = pool_with(vec![report("b", 10.0, 0.0), report("a", 10.0, 0.0)]);
        let ids: Vec<_> = pool.snapshot().into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn reserve_decrements_and_is_visible() {
        let mut pool = pool_with(vec![report("a", 100.0, 0.0)]);
        assert!(pool.reserve("a", 70.0));
        assert_eq!(pool.free_on("a"), Some(30.0));
        // Second reservation sees the first.
        assert!(!pool.reserve("a", 31.0));
        assert!(pool.reserve("a", 30.0));
        assert_eq!(pool.free_on("a"), Some(0.0));
    }

    #[test]
    fn reserve_rejects_overcommit_and_unknown_nodes() {
        let mut pool = pool_with(vec![report("a", 10.0, 0.0)]);
        assert!(!pool.reserve("a", 10.5));
        assert_eq!(pool.free_on("a"), Some(10.0));
        assert!(!pool.reserve("ghost", 1.0));
    }

    #[test]
    fn release_clamps_at_max() {
        let mut pool = pool_with(vec![report("a", 10.0, 0.0)]);
        assert!(pool.reserve("a", 4.0));
        pool.release("a", 100.0);
        assert_eq!(pool.free_on("a"), Some(10.0));
        // Unknown node release is a no-op.
        pool.release("ghost", 1.0);
    }

    #[test]
    fn capacity_conservation_under_reserve_release() {
        let mut pool = pool_with(vec![report("a", 100.0, 20.0), report("b", 40.0, 0.0)]);
        let total_max = pool.total_max();

        for amount in [10.0, 25.0, 3.5, 41.0] {
            pool.reserve("a", amount);
            pool.reserve("b", amount / 2.0);
        }
        pool.release("a", 10.0);
        pool.release("b", 200.0);

        for node in pool.snapshot() {
            assert!(node.free_capacity >= 0.0);
            assert!(node.free_capacity <= node.max_capacity);
        }
        assert!(pool.total_free() <= total_max);
    }

    #[test]
    fn refresh_discards_reservations_and_stale_nodes() {
        let mut pool = pool_with(vec![report("a", 100.0, 0.0), report("gone", 10.0, 0.0)]);
        assert!(pool.reserve("a", 50.0));

        pool.refresh(
            &StaticProvider {
                nodes: vec![report("a", 100.0, 10.0)],
            },
            &ReservePolicy::none(),
        )
        .unwrap();

        // Reservation gone, stale node dropped, provider usage honored.
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.free_on("a"), Some(90.0));
        assert_eq!(pool.free_on("gone"), None);
    }

    #[test]
    fn home_reserve_floor_is_withheld() {
        let mut pool = CapacityPool::new();
        let policy = ReservePolicy {
            home_node: Some("home".to_string()),
            home_reserved: 32.0,
        };
        pool.refresh(
            &StaticProvider {
                nodes: vec![report("home", 64.0, 8.0), report("w1", 16.0, 0.0)],
            },
            &policy,
        )
        .unwrap();

        assert_eq!(pool.free_on("home"), Some(24.0));
        assert_eq!(pool.free_on("w1"), Some(16.0));
    }

    #[test]
    fn home_reserve_clamps_at_zero() {
        let mut pool = CapacityPool::new();
        let policy = ReservePolicy {
            home_node: Some("home".to_string()),
            home_reserved: 1000.0,
        };
        pool.refresh(
            &StaticProvider {
                nodes: vec![report("home", 64.0, 0.0)],
            },
            &policy,
        )
        .unwrap();
        assert_eq!(pool.free_on("home"), Some(0.0));
    }

    #[test]
    fn utilization_ranges() {
        let empty = CapacityPool::new();
        assert_eq!(empty.utilization(), 0.0);

        let mut pool = pool_with(vec![report("a", 100.0, 0.0)]);
        assert_eq!(pool.utilization(), 0.0);
        assert!(pool.reserve("a", 25.0));
        assert!((pool.utilization() - 0.25).abs() < 1e-9);
        assert!(pool.reserve("a", 75.0));
        assert_eq!(pool.utilization(), 1.0);
    }

    #[test]
    fn provider_failure_surfaces_as_capacity_error() {
        struct FailingProvider;
        impl NodeCapacityProvider for FailingProvider {
            fn list_nodes(&self) -> anyhow::Result<Vec<NodeCapacity>> {
                anyhow::bail!("fleet scan failed")
            }
        }

        let mut pool = CapacityPool::new();
        let err = pool
            .refresh(&FailingProvider, &ReservePolicy::none())
            .unwrap_err();
        assert!(matches!(err, CapacityError::Provider(_)));
    }
}
