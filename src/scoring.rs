//! Connection scoring: payload similarity blended with spatial proximity.

use crate::config::DISTANCE_WEIGHT;
use crate::node::Node;
use crate::payload;
use crate::clamp01;

/// Decide whether `node` should attempt to link `other`.
///
/// The combined value is
/// `(1 − distance_weight)·data_sim + distance_weight·proximity`, clamped to
/// [0, 1], admitted against the caller's own `connection_threshold`.
///
/// Proximity decays over twice the effective influence radius when one is
/// available; with no radius it falls back to `1/(1+dist)`. A non-finite
/// distance scores zero proximity.
pub fn score(node: &Node, other: &Node) -> (bool, f64) {
    let value = score_value(node, other, DISTANCE_WEIGHT);
    (value >= node.params.connection_threshold, value)
}

/// The raw combined score with an explicit distance weight.
pub fn score_value(node: &Node, other: &Node, distance_weight: f64) -> f64 {
    let data_sim = payload::similarity(&node.payload, &other.payload);

    let dist = node.distance_to(other);
    let radius = effective_radius(
        node.params.influence_radius,
        other.params.influence_radius,
    );

    let proximity = if dist.is_finite() {
        match radius {
            Some(r) => (1.0 - dist / (2.0 * r)).max(0.0),
            None => 1.0 / (1.0 + dist),
        }
    } else {
        0.0
    };

    clamp01((1.0 - distance_weight) * data_sim + distance_weight * proximity)
}

/// Normalization radius for proximity: the mean when both sides are finite,
/// else whichever side is, clamped to at least 1. `None` when neither is.
fn effective_radius(a: f64, b: f64) -> Option<f64> {
    match (a.is_finite(), b.is_finite()) {
        (true, true) => Some(((a + b) / 2.0).max(1.0)),
        (true, false) => Some(a.max(1.0)),
        (false, true) => Some(b.max(1.0)),
        (false, false) => None,
    }
}
