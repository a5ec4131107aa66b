//! Per-kind configuration defaults and simulation tunables.

use crate::node::{KindParams, NodeKind};

/// Per-kind connection thresholds (lower = more permissive).
pub const BLOCK_CONNECTION_THRESHOLD: f64 = 0.4;
/// Point threshold is high: leaves are selective about their single link.
pub const POINT_CONNECTION_THRESHOLD: f64 = 0.8;
/// Sphere threshold is low: hubs accept almost everything.
pub const SPHERE_CONNECTION_THRESHOLD: f64 = 0.2;

/// Per-kind influence radii (geometric reach for proximity scoring).
/// Ordering by node importance: Sphere (hub) > Block (regular) > Point (leaf).
pub const SPHERE_INFLUENCE_RADIUS: f64 = 15.0;
/// Regular nodes: medium reach.
pub const BLOCK_INFLUENCE_RADIUS: f64 = 8.0;
/// Leaf nodes: minimal reach.
pub const POINT_INFLUENCE_RADIUS: f64 = 3.0;

/// History samples considered by the stability calculation, all kinds.
pub const STABILITY_WINDOW: usize = 10;

/// Seconds between simulation steps for each kind.
pub const BLOCK_TICK_INTERVAL: f64 = 10.0;
/// Points tick fastest.
pub const POINT_TICK_INTERVAL: f64 = 2.0;
/// Spheres tick slowest.
pub const SPHERE_TICK_INTERVAL: f64 = 30.0;

/// Canonical degree limits. `None` means unlimited.
pub const BLOCK_MAX_DEGREE: Option<usize> = Some(6);
/// A Point holds a single parent link.
pub const POINT_MAX_DEGREE: Option<usize> = Some(1);
/// Spheres are unlimited hubs.
pub const SPHERE_MAX_DEGREE: Option<usize> = None;

/// Seconds between websocket pushes to connected visualizers.
pub const STREAM_UPDATE_INTERVAL: f64 = 0.25;

/// Weight of spatial proximity in the combined connection score.
pub const DISTANCE_WEIGHT: f64 = 0.4;

/// Authoritative per-kind parameter defaults.
pub fn kind_defaults(kind: NodeKind) -> KindParams {
    match kind {
        NodeKind::Block => KindParams {
            max_degree: BLOCK_MAX_DEGREE,
            connection_threshold: BLOCK_CONNECTION_THRESHOLD,
            influence_radius: BLOCK_INFLUENCE_RADIUS,
            stability_window: STABILITY_WINDOW,
            tick_interval: BLOCK_TICK_INTERVAL,
        },
        NodeKind::Point => KindParams {
            max_degree: POINT_MAX_DEGREE,
            connection_threshold: POINT_CONNECTION_THRESHOLD,
            influence_radius: POINT_INFLUENCE_RADIUS,
            stability_window: STABILITY_WINDOW,
            tick_interval: POINT_TICK_INTERVAL,
        },
        NodeKind::Sphere => KindParams {
            max_degree: SPHERE_MAX_DEGREE,
            connection_threshold: SPHERE_CONNECTION_THRESHOLD,
            influence_radius: SPHERE_INFLUENCE_RADIUS,
            stability_window: STABILITY_WINDOW,
            tick_interval: SPHERE_TICK_INTERVAL,
        },
    }
}
