//! Content-addressable identity.
//!
//! Every node carries a 256-bit digest (`addr`, 64 lowercase hex chars).
//! The initial addr is minted from the creation timestamp alone; afterwards
//! it is rehashed from the node's state and the digests of its neighborhood,
//! so identity is hash-chained through the link graph.

use sha2::{Digest, Sha256};

use crate::node::NodeId;
use crate::Vec3;

/// Digest the UTF-8 of an ISO-8601 birth timestamp. Used as the initial
/// addr before any neighbors exist.
pub fn mint_addr(birth: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(birth.as_bytes());
    to_hex(&hasher.finalize())
}

/// Digest a node's state: the ASCII decimal of its id, the UTF-8 of the
/// canonical payload string, the little-endian IEEE-754 bytes of its
/// position, and each neighbor's addr. `neighbor_addrs` must already be
/// ordered by ascending neighbor id.
pub fn content_addr(
    id: NodeId,
    payload_canonical: &str,
    pos: Vec3,
    neighbor_addrs: &[String],
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(id.to_string().as_bytes());
    hasher.update(payload_canonical.as_bytes());
    hasher.update(pos.to_le_bytes());
    for addr in neighbor_addrs {
        hasher.update(addr.as_bytes());
    }
    to_hex(&hasher.finalize())
}

fn to_hex(digest: &[u8]) -> String {
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
