//! Error taxonomy for the node engine.
//!
//! Programmatic operations return these kinds explicitly; the HTTP adapter
//! maps them to status codes. No kind ever terminates the scheduler.

use thiserror::Error;

use crate::node::NodeId;

/// Errors produced by the engine and its adapters.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A creation request named an unknown node kind.
    #[error("invalid node kind '{0}', expected Block, Point or Sphere")]
    InvalidKind(String),

    /// A position or velocity override is not a finite length-3 vector.
    #[error("{0} must be a finite 3-dimensional vector")]
    InvalidVector(&'static str),

    /// Payload decoding failed (bad base64, ragged ndarray, wrong shape).
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// Lookup by id failed.
    #[error("node {0} not found")]
    UnknownNode(NodeId),

    /// A discovery step could not complete; never surfaced to callers.
    /// The refusing side's attempts counter has already been incremented.
    #[error("node {refused} refused linkage with node {peer}")]
    LinkageFailed {
        /// The side that refused the link.
        refused: NodeId,
        /// The peer it refused.
        peer: NodeId,
    },

    /// A failure inside one node's tick. Logged; the loop continues.
    #[error("tick failed for node {id}: {source}")]
    TickFault {
        /// The ticking node.
        id: NodeId,
        /// The underlying failure.
        #[source]
        source: Box<EngineError>,
    },

    /// Cancellation observed during the inter-tick sleep; absorbed silently.
    #[error("scheduler shut down")]
    SchedulerShutdown,
}
