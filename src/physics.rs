//! Stability and competition metrics, the gravity scalar, and movement.
//!
//! Gravity pulls an under-connected or contested node toward the centroid
//! of its neighborhood; a node that has stopped moving (high stability)
//! feels less of it. Anchored nodes are exempt from all movement.

use crate::node::{Node, NodeKind};
use crate::Vec3;

/// Gravity is clamped into this range.
pub const GRAVITY_MAX: f64 = 20.0;

/// Mean step length over the last `stability_window` recorded positions.
/// Lower = more stable. Fewer than two positions yield 0.
pub fn stability(node: &Node) -> f64 {
    let positions: Vec<Vec3> = node.history.iter().map(|entry| entry.pos).collect();
    if positions.len() < 2 {
        return 0.0;
    }
    let start = positions.len().saturating_sub(node.params.stability_window);
    let window = &positions[start..];
    if window.len() < 2 {
        return 0.0;
    }
    let total: f64 = window
        .windows(2)
        .map(|pair| pair[1].distance_to(&pair[0]))
        .sum();
    total / (window.len() - 1) as f64
}

/// Excess of failed connection pressure over the degree limit:
/// `max(0, attempts − max_degree)`. Zero for unlimited degree.
pub fn competition(node: &Node) -> f64 {
    match node.degree_limit() {
        Some(limit) => (node.attempts as f64 - limit as f64).max(0.0),
        None => 0.0,
    }
}

/// How far the node is below its desired degree. Hubs want 10 links,
/// leaves want their single link, everything else wants up to 5.
pub fn deficit(node: &Node) -> f64 {
    let desired = match node.degree_limit() {
        None => 10,
        Some(_) if node.kind == NodeKind::Point => 1,
        Some(limit) => limit.min(5),
    };
    (desired as f64 - node.neighbors.len() as f64).max(0.0)
}

/// The gravity scalar: `competition − 0.5·stability + 0.5·deficit`,
/// clamped into [0, GRAVITY_MAX].
pub fn compute_gravity(node: &Node) -> f64 {
    let g = competition(node) - 0.5 * stability(node) + 0.5 * deficit(node);
    g.clamp(0.0, GRAVITY_MAX)
}

/// Unit vector from the node toward the centroid of its neighbors' given
/// positions. Zero when there are no neighbors or the centroid coincides.
pub fn centroid_direction(node: &Node, neighbor_positions: &[Vec3]) -> Vec3 {
    if neighbor_positions.is_empty() {
        return Vec3::zero();
    }
    let centroid = Vec3::centroid(neighbor_positions);
    (centroid - node.pos).normalized()
}

/// Recompute gravity and move the node one step toward its neighborhood
/// centroid. Anchored nodes are left untouched, gravity included.
pub fn apply_gravity(node: &mut Node, neighbor_positions: &[Vec3], dt: f64) {
    if node.is_anchor {
        return;
    }

    node.gravity = compute_gravity(node);

    let direction = centroid_direction(node, neighbor_positions);
    if direction.norm() == 0.0 {
        return;
    }

    let delta = direction * (node.gravity * dt);
    node.pos = node.pos + delta;
    node.velocity = delta * (1.0 / dt);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::push_snapshot;
    use crate::node::test_node;

    fn node_with_positions(positions: &[Vec3]) -> Node {
        let mut node = test_node(1, NodeKind::Block);
        for &pos in positions {
            node.pos = pos;
            push_snapshot(&mut node, Vec::new());
        }
        node
    }

    #[test]
    fn test_stability_needs_two_positions() {
        assert_eq!(stability(&node_with_positions(&[])), 0.0);
        assert_eq!(stability(&node_with_positions(&[Vec3::zero()])), 0.0);
    }

    #[test]
    fn test_stability_is_mean_step_length() {
        let node = node_with_positions(&[
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 3.0, 0.0),
        ]);
        assert!((stability(&node) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_stability_window_limits_lookback() {
        // Large early jumps fall outside a window of 2.
        let mut node = node_with_positions(&[
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(100.0, 0.0, 0.0),
            Vec3::new(100.0, 1.0, 0.0),
        ]);
        node.params.stability_window = 2;
        assert!((stability(&node) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_competition_attempts_over_limit() {
        let mut block = test_node(1, NodeKind::Block);
        block.attempts = 4;
        assert_eq!(competition(&block), 0.0);
        block.attempts = 9;
        assert_eq!(competition(&block), 3.0);

        let mut sphere = test_node(2, NodeKind::Sphere);
        sphere.attempts = 1000;
        assert_eq!(competition(&sphere), 0.0);
    }

    #[test]
    fn test_deficit_by_kind() {
        let block = test_node(1, NodeKind::Block);
        assert_eq!(deficit(&block), 5.0);

        let mut block = test_node(1, NodeKind::Block);
        block.neighbors = vec![2, 3, 4, 5, 6, 7];
        assert_eq!(deficit(&block), 0.0);

        let point = test_node(2, NodeKind::Point);
        assert_eq!(deficit(&point), 1.0);

        let mut sphere = test_node(3, NodeKind::Sphere);
        assert_eq!(deficit(&sphere), 10.0);
        sphere.neighbors = (10..40).collect();
        assert_eq!(deficit(&sphere), 0.0);
    }

    #[test]
    fn test_gravity_clamped() {
        let mut block = test_node(1, NodeKind::Block);
        block.attempts = 1000;
        assert_eq!(compute_gravity(&block), GRAVITY_MAX);

        // High stability cannot push gravity below zero.
        let mut still = node_with_positions(&[
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(50.0, 0.0, 0.0),
        ]);
        still.neighbors = vec![2, 3, 4, 5, 6];
        assert!(compute_gravity(&still) >= 0.0);
    }

    #[test]
    fn test_centroid_direction() {
        let node = test_node(1, NodeKind::Block);
        assert_eq!(centroid_direction(&node, &[]), Vec3::zero());

        let dir = centroid_direction(&node, &[Vec3::new(4.0, 0.0, 0.0)]);
        assert!((dir.x - 1.0).abs() < 1e-12);

        // Coincident centroid has no preferred direction.
        assert_eq!(centroid_direction(&node, &[Vec3::zero()]), Vec3::zero());
    }

    #[test]
    fn test_apply_gravity_moves_toward_centroid() {
        let mut node = test_node(1, NodeKind::Block);
        let targets = [Vec3::new(10.0, 0.0, 0.0)];
        apply_gravity(&mut node, &targets, 1.0);
        assert!(node.pos.x > 0.0);
        assert!(node.velocity.x > 0.0);
        assert_eq!(node.pos.y, 0.0);
        assert!(node.gravity > 0.0);
    }

    #[test]
    fn test_apply_gravity_skips_anchor() {
        let mut sphere = test_node(1, NodeKind::Sphere);
        sphere.gravity = 3.0;
        let targets = [Vec3::new(10.0, 0.0, 0.0)];
        apply_gravity(&mut sphere, &targets, 1.0);
        assert_eq!(sphere.pos, Vec3::zero());
        assert_eq!(sphere.velocity, Vec3::zero());
        assert_eq!(sphere.gravity, 3.0);
    }

    #[test]
    fn test_apply_gravity_no_neighbors_no_motion() {
        let mut node = test_node(1, NodeKind::Block);
        apply_gravity(&mut node, &[], 1.0);
        assert_eq!(node.pos, Vec3::zero());
        // Gravity is still recomputed from the deficit.
        assert!(node.gravity > 0.0);
    }
}
