//! Append-only snapshot log and change detection.
//!
//! Each node keeps an ordered history of state snapshots, indexed from 0.
//! Entry 0 is taken at registration; later entries are appended only when
//! the observable state moved since the previous one.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::node::{Node, NodeId, NodeKind};
use crate::Vec3;

/// Per-neighbor digest stored inside a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NeighborSummary {
    /// Neighbor id.
    pub id: NodeId,
    /// Neighbor kind.
    pub kind: NodeKind,
    /// Neighbor addr at snapshot time.
    pub addr: String,
}

/// Negotiation outcome annotated onto the latest snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct LinkEvent {
    /// Event tag; currently always `"connected"`.
    pub event: &'static str,
    /// The peer gained.
    pub peer: NodeId,
    /// Admission score of the new link.
    pub score: f64,
}

impl LinkEvent {
    /// A successful reciprocal linkage.
    pub fn connected(peer: NodeId, score: f64) -> Self {
        Self {
            event: "connected",
            peer,
            score,
        }
    }
}

/// One state snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotEntry {
    /// Position in the log: 0, 1, 2, ...
    pub idx: usize,
    /// UTC timestamp with zone.
    pub timestamp: DateTime<Utc>,
    /// addr at snapshot time.
    pub addr: String,
    /// Position copy.
    pub pos: Vec3,
    /// Velocity copy.
    pub velocity: Vec3,
    /// Gravity scalar.
    pub gravity: f64,
    /// Node kind.
    pub kind: NodeKind,
    /// Neighborhood at snapshot time, in adjacency order.
    pub neighbors: Vec<NeighborSummary>,
    /// Human-readable payload description (bounded length).
    pub payload_summary: String,
    /// Payload variant tag.
    pub payload_type: &'static str,
    /// Set when a negotiation connected a peer during this entry's tick.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<LinkEvent>,
}

/// Append a snapshot of the node's current state. `neighbors` is the
/// resolved summary of the node's adjacency, in list order.
pub fn push_snapshot(node: &mut Node, neighbors: Vec<NeighborSummary>) {
    let entry = SnapshotEntry {
        idx: node.history.len(),
        timestamp: Utc::now(),
        addr: node.addr.clone(),
        pos: node.pos,
        velocity: node.velocity,
        gravity: node.gravity,
        kind: node.kind,
        neighbors,
        payload_summary: node.payload.summary(),
        payload_type: node.payload.type_name(),
        event: None,
    };
    node.history.push(entry);
}

/// Whether the node's observable state differs from its latest snapshot on
/// any of: neighbor summaries (order-sensitive), position, gravity, kind,
/// velocity. An empty history always counts as changed.
pub fn differs_from_last(node: &Node, current_neighbors: &[NeighborSummary]) -> bool {
    let Some(last) = node.history.last() else {
        return true;
    };
    last.neighbors != current_neighbors
        || last.pos != node.pos
        || last.gravity != node.gravity
        || last.kind != node.kind
        || last.velocity != node.velocity
}
