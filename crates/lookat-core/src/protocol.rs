//! Request and reply payloads exchanged between client and server.
//!
//! Both carry opaque byte strings produced by the registry; the transport
//! only needs to move them intact.

use serde::{Deserialize, Serialize};

/// Client → server: "tell me about this target".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestData {
    /// Correlation id echoed in the reply.
    pub nonce: u32,
    /// `[type index: varint][type payload]`.
    pub target: Vec<u8>,
}

/// Server → client: facts computed for an accepted request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataUpdate {
    /// Nonce of the request this answers.
    pub nonce: u32,
    /// `[count: varint]([provider index: varint][value])*`.
    pub results: Vec<u8>,
}

/// Whether nonce `a` was issued before nonce `b`, tolerating wrap-around.
pub fn nonce_precedes(a: u32, b: u32) -> bool {
    (a.wrapping_sub(b) as i32) < 0
}
