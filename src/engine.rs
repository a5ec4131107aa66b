//! The per-node tick pipeline.
//!
//! One tick runs history, discovery, then physics, start to finish, while
//! the caller holds the registry write guard. Nothing in here suspends.

use crate::discovery;
use crate::error::EngineError;
use crate::physics;
use crate::registry::RegistryCore;
use crate::node::NodeId;

/// Run one tick for `id` with time-step `dt` (normally the node's
/// `tick_interval`): snapshot on change, negotiate links against the
/// current candidates, then move under gravity.
pub fn tick_node(core: &mut RegistryCore, id: NodeId, dt: f64) -> Result<(), EngineError> {
    core.record_if_changed(id)?;

    discovery::discover_and_negotiate(core, id)?;

    let neighbor_positions = core.neighbor_positions(id)?;
    physics::apply_gravity(core.node_mut(id)?, &neighbor_positions, dt);

    Ok(())
}
