//! Byte-level codec shared by target descriptors and provider results.
//!
//! Integers are written as LEB128 varints and structured values with
//! [`postcard`], so the wire layout of a results payload is:
//!
//! ```text
//! [count: varint] ( [provider index: varint] [postcard value] )*
//! ```

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Errors raised while encoding or decoding wire payloads.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// Postcard failed to encode or decode a value.
    #[error("postcard error: {0}")]
    Postcard(#[from] postcard::Error),

    /// A target type index outside the registered range.
    #[error("unknown target type index {0}")]
    UnknownTargetType(u32),

    /// A provider index outside the registered range.
    #[error("unknown provider index {0}")]
    UnknownProvider(u32),

    /// A value handed to a codec of a different type.
    #[error("value does not match the type registered at index {0}")]
    TypeMismatch(u32),

    /// The payload had bytes left over after a complete decode.
    #[error("{0} trailing bytes after payload")]
    TrailingBytes(usize),
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Append-only output buffer.
#[derive(Debug, Default, Clone)]
pub struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Append an unsigned varint.
    pub fn write_varint(&mut self, value: u32) -> Result<(), WireError> {
        self.write(&value)
    }

    /// Append a postcard-encoded value.
    pub fn write<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), WireError> {
        let bytes = postcard::to_allocvec(value)?;
        self.buf.extend_from_slice(&bytes);
        Ok(())
    }

    /// Append raw bytes produced by another writer.
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns `true` if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Consume the writer and return its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Cursor over a borrowed payload.
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    remaining: &'a [u8],
}

impl<'a> WireReader<'a> {
    /// Start reading at the beginning of `bytes`.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { remaining: bytes }
    }

    /// Read an unsigned varint.
    pub fn read_varint(&mut self) -> Result<u32, WireError> {
        self.read()
    }

    /// Read a postcard-encoded value.
    pub fn read<T: DeserializeOwned>(&mut self) -> Result<T, WireError> {
        let (value, rest) = postcard::take_from_bytes::<T>(self.remaining)?;
        self.remaining = rest;
        Ok(value)
    }

    /// Bytes not consumed yet.
    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }

    /// Succeeds only if the whole payload was consumed.
    pub fn finish(self) -> Result<(), WireError> {
        if self.remaining.is_empty() {
            Ok(())
        } else {
            Err(WireError::TrailingBytes(self.remaining.len()))
        }
    }
}
