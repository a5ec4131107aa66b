//! Adjacency bookkeeping: the ordered neighbor list plus a score-ordered
//! index, and the link-level operations discovery builds on.
//!
//! Single-sided operations live on [`Node`]; the operations that touch both
//! ends of a link resolve the pair through the registry arena.

use crate::error::EngineError;
use crate::node::{Node, NodeId};
use crate::registry::RegistryCore;

impl Node {
    /// Attempt to add `other` as a neighbor with its admission score.
    ///
    /// Rejects self, duplicates, and saturated receivers; saturation also
    /// counts a failed attempt. On success the score index stays ascending
    /// and the attempts counter and permissive flag are cleared.
    pub fn add_neighbor(&mut self, other: NodeId, score: f64) -> bool {
        if other == self.id {
            return false;
        }
        if self.is_neighbor(other) {
            return false;
        }
        if !self.can_accept() {
            self.register_attempt_failure();
            return false;
        }
        self.neighbors.push(other);
        self.insert_scored(score, other);
        self.attempts = 0;
        self.permissive_mode = false;
        true
    }

    /// Remove `other` from both adjacency structures. Idempotent.
    pub fn remove_neighbor(&mut self, other: NodeId) -> bool {
        let before = self.neighbors.len();
        self.neighbors.retain(|&id| id != other);
        self.neighbors_by_score.retain(|&(_, id)| id != other);
        self.neighbors.len() != before
    }

    /// The `(score, neighbor)` entry with the lowest admission score.
    pub fn weakest_neighbor(&self) -> Option<(f64, NodeId)> {
        self.neighbors_by_score.first().copied()
    }

    /// Re-insert a previously evicted link entry without touching the
    /// attempts counter or permissive flag; rollback must restore the
    /// pre-state exactly.
    pub(crate) fn restore_neighbor(&mut self, other: NodeId, score: f64) {
        if other == self.id || self.is_neighbor(other) {
            return;
        }
        self.neighbors.push(other);
        self.insert_scored(score, other);
    }

    fn insert_scored(&mut self, score: f64, other: NodeId) {
        let at = self
            .neighbors_by_score
            .partition_point(|&(s, _)| s <= score);
        self.neighbors_by_score.insert(at, (score, other));
    }
}

/// Remove the link between `a` and `b` on both sides. Idempotent.
pub fn unlink(core: &mut RegistryCore, a: NodeId, b: NodeId) -> Result<(), EngineError> {
    let (na, nb) = core.pair_mut(a, b)?;
    na.remove_neighbor(b);
    nb.remove_neighbor(a);
    Ok(())
}

/// Drop `id`'s weakest neighbor to make room for a strictly stronger
/// candidate. Only valid in permissive mode; returns the removed
/// `(score, neighbor)` pair so the caller can roll the eviction back.
pub fn evict_weakest(
    core: &mut RegistryCore,
    id: NodeId,
    incoming_score: f64,
) -> Result<Option<(f64, NodeId)>, EngineError> {
    let node = core.node(id)?;
    if !node.permissive_mode {
        return Ok(None);
    }
    let Some((weakest_score, weakest)) = node.weakest_neighbor() else {
        return Ok(None);
    };
    if incoming_score <= weakest_score {
        return Ok(None);
    }
    unlink(core, id, weakest)?;
    Ok(Some((weakest_score, weakest)))
}

/// Re-add an evicted link on both sides with its saved score.
pub fn restore(
    core: &mut RegistryCore,
    a: NodeId,
    b: NodeId,
    score: f64,
) -> Result<(), EngineError> {
    let (na, nb) = core.pair_mut(a, b)?;
    na.restore_neighbor(b, score);
    nb.restore_neighbor(a, score);
    Ok(())
}
