//! Process-wide node collection: the arena that owns every node, mints ids
//! and addresses, and hands candidate snapshots to discovery.
//!
//! Nodes refer to each other by id only; every reference is resolved through
//! the arena, which avoids cyclic ownership entirely. The arena sits behind
//! a `tokio::sync::RwLock`; a tick holds the write guard for its full
//! duration and never across a suspension point, which makes the two-phase
//! linkage atomic with respect to every other node's tick.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tokio::sync::RwLock;

use crate::config;
use crate::error::EngineError;
use crate::history::{self, NeighborSummary};
use crate::identity;
use crate::node::{Node, NodeId, NodeKind};
use crate::payload::PayloadValue;
use crate::scheduler::Scheduler;
use crate::Vec3;

/// Optional per-node parameter overrides accepted at creation.
#[derive(Debug, Clone, Default)]
pub struct NodeOverrides {
    /// Override the admission threshold.
    pub connection_threshold: Option<f64>,
    /// Override the geometric reach.
    pub influence_radius: Option<f64>,
    /// Seed the attempts counter.
    pub attempts: Option<u32>,
    /// Override the initial velocity.
    pub velocity: Option<Vec3>,
    /// Override the initial gravity scalar (clamped into range).
    pub gravity: Option<f64>,
    /// Explicitly set anchor status.
    pub is_anchor: Option<bool>,
    /// Override the stability window.
    pub stability_window: Option<usize>,
    /// Override the tick interval in seconds.
    pub tick_interval: Option<f64>,
}

/// The node arena. All engine mutation happens through this type while its
/// owner holds the registry lock.
#[derive(Default)]
pub struct RegistryCore {
    nodes: Vec<Node>,
}

impl RegistryCore {
    /// Empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Candidate ids for discovery: a snapshot of the node sequence at call
    /// time, in insertion order.
    pub fn candidates(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|n| n.id).collect()
    }

    fn index_of(&self, id: NodeId) -> Result<usize, EngineError> {
        // Ids are minted 1, 2, 3, ... under the registry lock, so the
        // arena index is always id - 1.
        let idx = (id as usize).wrapping_sub(1);
        if idx < self.nodes.len() {
            Ok(idx)
        } else {
            Err(EngineError::UnknownNode(id))
        }
    }

    /// Borrow a node by id.
    pub fn node(&self, id: NodeId) -> Result<&Node, EngineError> {
        let idx = self.index_of(id)?;
        Ok(&self.nodes[idx])
    }

    /// Mutably borrow a node by id.
    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, EngineError> {
        let idx = self.index_of(id)?;
        Ok(&mut self.nodes[idx])
    }

    /// Mutably borrow two distinct nodes at once, in argument order.
    pub fn pair_mut(
        &mut self,
        a: NodeId,
        b: NodeId,
    ) -> Result<(&mut Node, &mut Node), EngineError> {
        let ia = self.index_of(a)?;
        let ib = self.index_of(b)?;
        if ia == ib {
            return Err(EngineError::UnknownNode(b));
        }
        if ia < ib {
            let (left, right) = self.nodes.split_at_mut(ib);
            Ok((&mut left[ia], &mut right[0]))
        } else {
            let (left, right) = self.nodes.split_at_mut(ia);
            Ok((&mut right[0], &mut left[ib]))
        }
    }

    /// Append a freshly created node.
    pub(crate) fn push(&mut self, node: Node) {
        self.nodes.push(node);
    }

    /// Resolved `{id, kind, addr}` summaries of a node's neighbors, in
    /// adjacency order.
    pub fn neighbor_summaries(&self, id: NodeId) -> Result<Vec<NeighborSummary>, EngineError> {
        let node = self.node(id)?;
        node.neighbors
            .iter()
            .map(|&nb| {
                let peer = self.node(nb)?;
                Ok(NeighborSummary {
                    id: peer.id,
                    kind: peer.kind,
                    addr: peer.addr.clone(),
                })
            })
            .collect()
    }

    /// Current positions of a node's neighbors, in adjacency order.
    pub fn neighbor_positions(&self, id: NodeId) -> Result<Vec<Vec3>, EngineError> {
        let node = self.node(id)?;
        node.neighbors
            .iter()
            .map(|&nb| Ok(self.node(nb)?.pos))
            .collect()
    }

    /// Rehash a node's addr from its current state and neighborhood.
    pub fn refresh_addr(&mut self, id: NodeId) -> Result<(), EngineError> {
        let node = self.node(id)?;
        let mut by_id: Vec<NodeId> = node.neighbors.clone();
        by_id.sort_unstable();
        let addrs: Result<Vec<String>, EngineError> = by_id
            .iter()
            .map(|&nb| Ok(self.node(nb)?.addr.clone()))
            .collect();
        let addrs = addrs?;

        let node = self.node(id)?;
        let addr = identity::content_addr(
            node.id,
            &node.payload.canonical_string(),
            node.pos,
            &addrs,
        );
        self.node_mut(id)?.addr = addr;
        Ok(())
    }

    /// Append a snapshot of the node's current state unconditionally.
    pub fn snapshot(&mut self, id: NodeId) -> Result<(), EngineError> {
        let summaries = self.neighbor_summaries(id)?;
        history::push_snapshot(self.node_mut(id)?, summaries);
        Ok(())
    }

    /// Snapshot the node if its observable state moved since the last
    /// entry, rehashing the addr first. An empty history snapshots
    /// unconditionally without a rehash.
    pub fn record_if_changed(&mut self, id: NodeId) -> Result<(), EngineError> {
        if self.node(id)?.history.is_empty() {
            return self.snapshot(id);
        }
        let summaries = self.neighbor_summaries(id)?;
        if history::differs_from_last(self.node(id)?, &summaries) {
            self.refresh_addr(id)?;
            self.snapshot(id)?;
        }
        Ok(())
    }
}

/// Shared handle over the arena: id minting, node creation, task lifecycle.
pub struct Registry {
    /// The node arena. Ticks take the write guard; external readers take
    /// the read guard and snapshot.
    pub core: RwLock<RegistryCore>,
    next_id: AtomicU64,
    scheduler: Option<Scheduler>,
}

impl Registry {
    /// Registry without a scheduler: nodes are created but never self-tick.
    /// Drive ticks manually through [`crate::engine::tick_node`].
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            core: RwLock::new(RegistryCore::new()),
            next_id: AtomicU64::new(0),
            scheduler: None,
        })
    }

    /// Registry bound to a scheduler: every created node gets a tick task.
    pub fn with_scheduler() -> Arc<Self> {
        Arc::new(Self {
            core: RwLock::new(RegistryCore::new()),
            next_id: AtomicU64::new(0),
            scheduler: Some(Scheduler::new()),
        })
    }

    /// Whether a scheduler is bound and has not been cancelled.
    pub fn is_running(&self) -> bool {
        self.scheduler.as_ref().is_some_and(Scheduler::is_running)
    }

    /// Create a node: assign the next id, mint the birth addr, apply kind
    /// defaults then overrides, register, emit the initial snapshot, and
    /// spawn the tick task when a scheduler is bound.
    pub async fn create(
        self: &Arc<Self>,
        kind: NodeKind,
        payload: PayloadValue,
        pos: Option<Vec3>,
        overrides: NodeOverrides,
    ) -> Result<NodeId, EngineError> {
        if let Some(p) = &pos {
            if !p.is_finite() {
                return Err(EngineError::InvalidVector("pos"));
            }
        }
        if let Some(v) = &overrides.velocity {
            if !v.is_finite() {
                return Err(EngineError::InvalidVector("velocity"));
            }
        }

        let mut params = config::kind_defaults(kind);
        if let Some(t) = overrides.connection_threshold {
            params.connection_threshold = t;
        }
        if let Some(r) = overrides.influence_radius {
            params.influence_radius = r;
        }
        if let Some(w) = overrides.stability_window {
            params.stability_window = w;
        }
        if let Some(i) = overrides.tick_interval {
            params.tick_interval = i;
        }
        let tick_interval = params.tick_interval;

        let pos = pos.unwrap_or_else(random_position);
        let birth = Utc::now().to_rfc3339();

        let mut core = self.core.write().await;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;

        let mut node = Node {
            id,
            kind,
            addr: identity::mint_addr(&birth),
            pos,
            velocity: overrides.velocity.unwrap_or_else(Vec3::zero),
            gravity: overrides
                .gravity
                .unwrap_or(0.0)
                .clamp(0.0, crate::physics::GRAVITY_MAX),
            payload,
            neighbors: Vec::new(),
            neighbors_by_score: Vec::new(),
            is_anchor: overrides.is_anchor.unwrap_or_else(|| kind.default_anchor()),
            attempts: overrides.attempts.unwrap_or(0),
            permissive_mode: false,
            history: Vec::new(),
            params,
        };
        // A seeded attempts counter behaves like one accrued live.
        node.update_permissive_state();

        core.push(node);
        core.snapshot(id)?;
        drop(core);

        tracing::info!(id, kind = %kind, "node registered");

        if let Some(scheduler) = &self.scheduler {
            scheduler.spawn(Arc::clone(self), id, tick_interval);
        }
        Ok(id)
    }

    /// Cancel every tick task and await quiescence, bounded by `grace`.
    /// Returns the number of tasks that failed to exit in time.
    pub async fn cancel_all(&self, grace: Duration) -> usize {
        match &self.scheduler {
            Some(scheduler) => scheduler.cancel_all(grace).await,
            None => 0,
        }
    }
}

/// Default placement: uniform in [0, 10) on each axis.
fn random_position() -> Vec3 {
    let mut rng = rand::thread_rng();
    Vec3::new(
        rng.gen::<f64>() * 10.0,
        rng.gen::<f64>() * 10.0,
        rng.gen::<f64>() * 10.0,
    )
}
