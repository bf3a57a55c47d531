//! Messages exchanged over a look-at connection.
//!
//! Every message is serialized with [`postcard`] and prefixed with a protocol
//! version byte:
//!
//! ```text
//! [version: u8] [postcard-encoded Message]
//! ```

use lookat_core::{DataUpdate, RequestData};
use serde::{Deserialize, Serialize};

/// Current wire-protocol version. Prepended to every serialized message.
pub const PROTOCOL_VERSION: u8 = 1;

/// Top-level network message. The enum discriminant is the type tag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Message {
    /// First message on every connection, client → server.
    Hello(Hello),
    /// Client asks for facts about its current target.
    RequestData(RequestData),
    /// Server answers an accepted request.
    DataUpdate(DataUpdate),
}

/// Handshake carrying the sender's registry digest.
///
/// Provider and target type indices only mean the same thing on both sides
/// when the digests match.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Hello {
    /// [`lookat_core::Registry::digest`] of the client.
    pub registry_digest: u64,
}

/// Errors that can occur during message deserialization.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    /// The payload was empty (no version byte).
    #[error("empty payload, no version byte")]
    EmptyPayload,

    /// The version byte does not match [`PROTOCOL_VERSION`].
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// Postcard deserialization failed.
    #[error("deserialization error: {0}")]
    Postcard(#[from] postcard::Error),
}

/// Serialize a [`Message`] into a versioned binary payload.
pub fn serialize_message(msg: &Message) -> Result<Vec<u8>, postcard::Error> {
    let body = postcard::to_allocvec(msg)?;
    let mut out = Vec::with_capacity(1 + body.len());
    out.push(PROTOCOL_VERSION);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Deserialize a versioned binary payload into a [`Message`].
pub fn deserialize_message(data: &[u8]) -> Result<Message, MessageError> {
    let Some((&version, body)) = data.split_first() else {
        return Err(MessageError::EmptyPayload);
    };
    if version != PROTOCOL_VERSION {
        return Err(MessageError::UnsupportedVersion(version));
    }
    Ok(postcard::from_bytes(body)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_roundtrip() {
        let msg = Message::RequestData(RequestData {
            nonce: 7,
            target: vec![0, 0x80, 0x01],
        });
        let bytes = serialize_message(&msg).unwrap();
        assert_eq!(deserialize_message(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_update_roundtrip() {
        let msg = Message::DataUpdate(DataUpdate {
            nonce: u32::MAX,
            results: vec![2, 0, 1, 3, 5],
        });
        let bytes = serialize_message(&msg).unwrap();
        assert_eq!(deserialize_message(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_hello_is_compact() {
        let msg = Message::Hello(Hello {
            registry_digest: 0x0123_4567_89ab_cdef,
        });
        let bytes = serialize_message(&msg).unwrap();
        assert!(bytes.len() <= 12, "Hello should be compact, got {} bytes", bytes.len());
        assert_eq!(deserialize_message(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_version_byte_is_first_byte() {
        let msg = Message::Hello(Hello { registry_digest: 1 });
        let bytes = serialize_message(&msg).unwrap();
        assert_eq!(bytes[0], PROTOCOL_VERSION);
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let msg = Message::Hello(Hello { registry_digest: 1 });
        let mut bytes = serialize_message(&msg).unwrap();
        bytes[0] = 255;
        assert!(matches!(
            deserialize_message(&bytes),
            Err(MessageError::UnsupportedVersion(255))
        ));
    }

    #[test]
    fn test_empty_payload_rejected() {
        assert!(matches!(deserialize_message(&[]), Err(MessageError::EmptyPayload)));
    }

    #[test]
    fn test_corrupted_payload_rejected() {
        let result = deserialize_message(&[PROTOCOL_VERSION, 0xFF, 0xFF, 0xFF]);
        assert!(matches!(result, Err(MessageError::Postcard(_))));
    }
}
