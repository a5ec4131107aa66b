//! Neighbor discovery: a single pass over the registry's candidates with
//! two-phase reciprocal linkage and transactional rollback.
//!
//! Both ends of a link mutate inside one tick while the caller holds the
//! registry write guard, so the eviction/rollback sequence is atomic with
//! respect to every other node's tick.

use crate::error::EngineError;
use crate::history::LinkEvent;
use crate::neighbors;
use crate::node::NodeId;
use crate::registry::RegistryCore;
use crate::scoring;

/// Scan the current candidate sequence once and negotiate links for `id`.
///
/// Per candidate: skip self and existing neighbors; a saturated,
/// non-permissive node only counts the failed attempt; otherwise score the
/// pair and, when admitted, run the two-phase swap. Refusals increment the
/// refusing side and the pass continues.
pub fn discover_and_negotiate(core: &mut RegistryCore, id: NodeId) -> Result<(), EngineError> {
    let candidates = core.candidates();
    for cand in candidates {
        if cand == id {
            continue;
        }
        if core.node(id)?.is_neighbor(cand) {
            continue;
        }

        let self_full = !core.node(id)?.can_accept();
        if self_full && !core.node(id)?.permissive_mode {
            core.node_mut(id)?.register_attempt_failure();
            tracing::debug!(node = id, candidate = cand, "saturated, attempt counted");
            continue;
        }

        let (admit, score) = {
            let node = core.node(id)?;
            let other = core.node(cand)?;
            scoring::score(node, other)
        };
        if !admit {
            tracing::debug!(node = id, candidate = cand, score, "candidate rejected");
            continue;
        }

        match negotiate(core, id, cand, score, self_full) {
            Ok(true) => {
                if let Some(entry) = core.node_mut(id)?.history.last_mut() {
                    entry.event = Some(LinkEvent::connected(cand, score));
                }
                tracing::info!(node = id, peer = cand, score, "connected");
            }
            // Candidate too weak to displace the weakest incumbent.
            Ok(false) => {}
            Err(EngineError::LinkageFailed { refused, peer }) => {
                tracing::debug!(refused, peer, "linkage refused");
            }
            Err(other) => return Err(other),
        }
    }
    Ok(())
}

/// The two-phase swap: make room on either saturated side by evicting its
/// weakest link, then add reciprocally. Any failure unwinds the eviction
/// stack in reverse so both nodes return to their exact pre-state, with the
/// refusal counted on the side that refused.
fn negotiate(
    core: &mut RegistryCore,
    id: NodeId,
    cand: NodeId,
    score: f64,
    self_full: bool,
) -> Result<bool, EngineError> {
    // (owner, evicted neighbor, saved score), consumed in reverse.
    let mut evictions: Vec<(NodeId, NodeId, f64)> = Vec::new();

    if self_full {
        match neighbors::evict_weakest(core, id, score)? {
            Some((saved, evicted)) => evictions.push((id, evicted, saved)),
            None => return Ok(false),
        }
    }

    let cand_full = !core.node(cand)?.can_accept();
    if cand_full && !core.node(cand)?.permissive_mode {
        rollback(core, &mut evictions)?;
        core.node_mut(cand)?.register_attempt_failure();
        return Err(EngineError::LinkageFailed {
            refused: cand,
            peer: id,
        });
    }
    if cand_full {
        match neighbors::evict_weakest(core, cand, score)? {
            Some((saved, evicted)) => evictions.push((cand, evicted, saved)),
            None => {
                rollback(core, &mut evictions)?;
                core.node_mut(cand)?.register_attempt_failure();
                return Err(EngineError::LinkageFailed {
                    refused: cand,
                    peer: id,
                });
            }
        }
    }

    if !core.node_mut(id)?.add_neighbor(cand, score) {
        rollback(core, &mut evictions)?;
        return Err(EngineError::LinkageFailed {
            refused: id,
            peer: cand,
        });
    }
    if !core.node_mut(cand)?.add_neighbor(id, score) {
        core.node_mut(id)?.remove_neighbor(cand);
        rollback(core, &mut evictions)?;
        return Err(EngineError::LinkageFailed {
            refused: cand,
            peer: id,
        });
    }

    Ok(true)
}

fn rollback(
    core: &mut RegistryCore,
    evictions: &mut Vec<(NodeId, NodeId, f64)>,
) -> Result<(), EngineError> {
    while let Some((owner, evicted, saved)) = evictions.pop() {
        neighbors::restore(core, owner, evicted, saved)?;
    }
    Ok(())
}
