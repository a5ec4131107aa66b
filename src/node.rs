//! The node record, its kind discriminator, and per-kind parameters.
//!
//! The original inheritance-shaped design (a neighbor base with one subclass
//! per role) is collapsed into a single record plus a [`NodeKind`] enum and a
//! parameter table; polymorphic behavior is a pattern match.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::history::SnapshotEntry;
use crate::payload::PayloadValue;
use crate::Vec3;

/// Registry-minted node identifier, unique and strictly increasing.
pub type NodeId = u64;

/// The role a node plays in the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Regular node: six canonical neighbor slots, free to move.
    Block,
    /// Leaf node: a single parent link, selective, fast-ticking.
    Point,
    /// Hub node: unlimited degree, anchored in place.
    Sphere,
}

impl NodeKind {
    /// Canonical name, as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Block => "Block",
            NodeKind::Point => "Point",
            NodeKind::Sphere => "Sphere",
        }
    }

    /// Whether this kind is anchored by default.
    pub fn default_anchor(&self) -> bool {
        matches!(self, NodeKind::Sphere)
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Block" => Ok(NodeKind::Block),
            "Point" => Ok(NodeKind::Point),
            "Sphere" => Ok(NodeKind::Sphere),
            other => Err(EngineError::InvalidKind(other.to_string())),
        }
    }
}

/// Tunable per-kind parameters; defaults come from [`crate::config`],
/// individual nodes may carry overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct KindParams {
    /// Maximum simultaneous neighbors; `None` means unlimited.
    pub max_degree: Option<usize>,
    /// Combined score required to admit a neighbor.
    pub connection_threshold: f64,
    /// Geometric reach used to normalize distance in proximity scoring.
    pub influence_radius: f64,
    /// History samples considered by the stability metric.
    pub stability_window: usize,
    /// Seconds between autonomous ticks.
    pub tick_interval: f64,
}

/// A node in the spatial network.
#[derive(Debug, Clone)]
pub struct Node {
    /// Registry-assigned identifier.
    pub id: NodeId,
    /// Role discriminator.
    pub kind: NodeKind,
    /// Content digest: 64 lowercase hex chars. Minted from the birth
    /// timestamp, rehashed from state + neighborhood on every change.
    pub addr: String,
    /// Position in 3-space.
    pub pos: Vec3,
    /// Displacement per unit time from the latest movement.
    pub velocity: Vec3,
    /// Gravity scalar in [0, 20].
    pub gravity: f64,
    /// Data payload.
    pub payload: PayloadValue,
    /// Linked peers, in admission order. No duplicates, never `self`.
    pub neighbors: Vec<NodeId>,
    /// The same peers keyed by admission-time score, ascending.
    pub neighbors_by_score: Vec<(f64, NodeId)>,
    /// Anchored nodes never move under physics.
    pub is_anchor: bool,
    /// Consecutive failed linkage attempts; reset on any admission.
    pub attempts: u32,
    /// Once set, the node evicts its weakest neighbor for a strictly
    /// stronger candidate. Cleared on any admission.
    pub permissive_mode: bool,
    /// Append-only snapshot log; entry 0 is taken at registration.
    pub history: Vec<SnapshotEntry>,
    /// Effective per-kind parameters (defaults plus overrides).
    pub params: KindParams,
}

impl Node {
    /// Maximum allowable neighbors; `None` means unlimited.
    pub fn degree_limit(&self) -> Option<usize> {
        self.params.max_degree
    }

    /// Whether the node has room for another neighbor.
    pub fn can_accept(&self) -> bool {
        match self.degree_limit() {
            Some(limit) => self.neighbors.len() < limit,
            None => true,
        }
    }

    /// Whether `other` is currently linked.
    pub fn is_neighbor(&self, other: NodeId) -> bool {
        self.neighbors.contains(&other)
    }

    /// Euclidean distance to another node.
    pub fn distance_to(&self, other: &Node) -> f64 {
        self.pos.distance_to(&other.pos)
    }

    /// Attempts count at which permissive mode engages; `None` disables it
    /// (unlimited-degree nodes never evict).
    pub fn permissive_threshold(&self) -> Option<u32> {
        self.degree_limit().map(|limit| 2 * limit as u32)
    }

    /// Flip into permissive mode once attempts reach the threshold.
    pub fn update_permissive_state(&mut self) {
        if self.permissive_mode {
            return;
        }
        if let Some(threshold) = self.permissive_threshold() {
            if self.attempts >= threshold {
                self.permissive_mode = true;
            }
        }
    }

    /// Count a failed linkage attempt and re-evaluate permissive mode.
    pub fn register_attempt_failure(&mut self) {
        self.attempts += 1;
        self.update_permissive_state();
    }
}

/// Bare node for unit tests: kind defaults, no history, empty addr.
#[cfg(test)]
pub(crate) fn test_node(id: NodeId, kind: NodeKind) -> Node {
    Node {
        id,
        kind,
        addr: String::new(),
        pos: Vec3::zero(),
        velocity: Vec3::zero(),
        gravity: 0.0,
        payload: PayloadValue::None,
        neighbors: Vec::new(),
        neighbors_by_score: Vec::new(),
        is_anchor: kind.default_anchor(),
        attempts: 0,
        permissive_mode: false,
        history: Vec::new(),
        params: crate::config::kind_defaults(kind),
    }
}
