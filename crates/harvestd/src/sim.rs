//! Simulated fleet for standalone mode and integration testing.
//!
//! Implements all three collaborator traits against in-memory state with
//! deterministic, seeded dynamics. Dispatched work occupies node
//! capacity until its scheduled end time passes, then its effect lands
//! on the target — the scheduler never hears about it directly, exactly
//! like a real fleet.

use std::sync::Mutex;
use std::time::Duration;

use harvest_core::providers::{
    DispatchRequest, NodeCapacityProvider, ProcessHandle, RemoteExecutor, TargetStateProvider,
};
use harvest_core::types::{
    epoch_ms, NodeCapacity, NodeId, OpKind, OpTable, PressureModel, TargetId, TargetSnapshot,
};

/// Work that has been dispatched but whose scheduled end has not passed.
struct Flight {
    kind: OpKind,
    node: NodeId,
    target: TargetId,
    units: u32,
    cost: f64,
    end_ms: i64,
}

/// A deterministic in-memory fleet.
pub struct SimFleet {
    ops: OpTable,
    model: PressureModel,
    nodes: Mutex<Vec<NodeCapacity>>,
    targets: Mutex<Vec<TargetSnapshot>>,
    flights: Mutex<Vec<Flight>>,
    next_handle: Mutex<u64>,
}

impl SimFleet {
    /// Build a seeded fleet of `node_count` workers and `target_count`
    /// targets. The same seed always produces the same fleet.
    pub fn generate(seed: u64, node_count: usize, target_count: usize, ops: OpTable) -> Self {
        let mut rng = XorShift::new(seed);

        let mut nodes = Vec::with_capacity(node_count);
        for i in 0..node_count {
            // Capacities between 16 and 1024, skewed small.
            let max_capacity = f64::from(1u32 << (4 + (rng.next() % 7) as u32));
            nodes.push(NodeCapacity {
                id: format!("node-{i}"),
                max_capacity,
                used_capacity: 0.0,
            });
        }

        let mut targets = Vec::with_capacity(target_count);
        for i in 0..target_count {
            let max_resource = 500.0 + (rng.next() % 4000) as f64;
            let min_pressure = 1.0 + (rng.next() % 9) as f64;
            targets.push(TargetSnapshot {
                id: format!("target-{i}"),
                current_resource: max_resource * 0.6,
                max_resource,
                current_pressure: min_pressure + (rng.next() % 10) as f64,
                min_pressure,
                growth_rate: 10.0 + (rng.next() % 40) as f64,
                required_access_level: 1 + (rng.next() % 3) as u32,
            });
        }

        Self {
            ops,
            model: PressureModel::default(),
            nodes: Mutex::new(nodes),
            targets: Mutex::new(targets),
            flights: Mutex::new(Vec::new()),
            next_handle: Mutex::new(0),
        }
    }

    /// Apply every flight whose scheduled end has passed: free its node
    /// capacity and land its effect on the target.
    fn settle(&self, now_ms: i64) {
        let mut flights = self.flights.lock().unwrap();
        let mut nodes = self.nodes.lock().unwrap();
        let mut targets = self.targets.lock().unwrap();

        flights.retain(|flight| {
            if flight.end_ms > now_ms {
                return true;
            }

            if let Some(node) = nodes.iter_mut().find(|n| n.id == flight.node) {
                node.used_capacity = (node.used_capacity - flight.cost).max(0.0);
            }
            if let Some(target) = targets.iter_mut().find(|t| t.id == flight.target) {
                apply_effect(target, flight.kind, flight.units, &self.model);
            }
            false
        });
    }
}

/// Land one completed operation on a target.
fn apply_effect(target: &mut TargetSnapshot, kind: OpKind, units: u32, model: &PressureModel) {
    let units = f64::from(units);
    match kind {
        OpKind::Extract => {
            let fraction = (units * extraction_rate(target)).min(1.0);
            target.current_resource = (target.current_resource * (1.0 - fraction)).max(0.0);
            target.current_pressure += units * model.extract_rise_per_unit;
        }
        OpKind::Relieve => {
            target.current_pressure = (target.current_pressure
                - units * model.relieve_drop_per_unit)
                .max(target.min_pressure);
        }
        OpKind::Replenish => {
            let growth = 1.0 + units * target.growth_rate / 400.0;
            target.current_resource = (target.current_resource * growth).min(target.max_resource);
            target.current_pressure += units * model.replenish_rise_per_unit;
        }
    }
}

/// Extractable fraction per unit; decays as pressure builds.
fn extraction_rate(target: &TargetSnapshot) -> f64 {
    0.01 / (1.0 + (target.current_pressure - target.min_pressure).max(0.0) * 0.05)
}

impl NodeCapacityProvider for SimFleet {
    fn list_nodes(&self) -> anyhow::Result<Vec<NodeCapacity>> {
        self.settle(epoch_ms());
        Ok(self.nodes.lock().unwrap().clone())
    }
}

impl TargetStateProvider for SimFleet {
    fn list_targets(&self) -> anyhow::Result<Vec<TargetId>> {
        Ok(self
            .targets
            .lock()
            .unwrap()
            .iter()
            .map(|t| t.id.clone())
            .collect())
    }

    fn state(&self, id: &str) -> anyhow::Result<TargetSnapshot> {
        self.settle(epoch_ms());
        self.targets
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("unknown target {id}"))
    }

    fn extraction_per_unit(&self, target: &TargetSnapshot) -> f64 {
        extraction_rate(target)
    }

    fn replenish_units_for(&self, target: &TargetSnapshot, factor: f64) -> f64 {
        (factor - 1.0).max(0.0) * 400.0 / target.growth_rate.max(1.0)
    }

    fn duration_of(&self, kind: OpKind, target: &TargetSnapshot) -> Duration {
        let base_ms = match kind {
            OpKind::Extract => 20_000.0,
            OpKind::Relieve => 80_000.0,
            OpKind::Replenish => 64_000.0,
        };
        let pressure_drag =
            1.0 + (target.current_pressure - target.min_pressure).max(0.0) * 0.02;
        Duration::from_millis((base_ms * pressure_drag) as u64)
    }
}

impl RemoteExecutor for SimFleet {
    fn dispatch(&self, req: &DispatchRequest) -> anyhow::Result<ProcessHandle> {
        let cost = f64::from(req.units) * self.ops.cost_per_unit(req.kind);

        let mut nodes = self.nodes.lock().unwrap();
        let node = nodes
            .iter_mut()
            .find(|n| n.id == req.node)
            .ok_or_else(|| anyhow::anyhow!("unknown node {}", req.node))?;
        if node.used_capacity + cost > node.max_capacity {
            anyhow::bail!("node {} cannot hold {cost:.2} more capacity", req.node);
        }
        node.used_capacity += cost;

        self.flights.lock().unwrap().push(Flight {
            kind: req.kind,
            node: req.node.clone(),
            target: req.target.clone(),
            units: req.units,
            cost,
            end_ms: req.end_ms,
        });

        let mut next = self.next_handle.lock().unwrap();
        *next += 1;
        Ok(ProcessHandle(*next))
    }
}

/// Small deterministic PRNG; good enough for fleet generation.
struct XorShift {
    state: u64,
}

impl XorShift {
    fn new(seed: u64) -> Self {
        Self {
            state: seed.max(1),
        }
    }

    fn next(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }
}
