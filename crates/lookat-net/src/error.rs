use crate::framing::FrameError;
use crate::tcp_server::ConnectionId;

/// Errors raised when sending over a look-at connection.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// Socket setup failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Writing or reading a frame failed.
    #[error("framing error: {0}")]
    Frame(#[from] FrameError),

    /// A message could not be serialized.
    #[error("failed to encode message: {0}")]
    Encode(#[from] postcard::Error),

    /// The connection is not (or no longer) registered.
    #[error("unknown connection {0:?}")]
    UnknownConnection(ConnectionId),

    /// The connection's outgoing queue is full; the message was dropped.
    #[error("send queue full for connection {0:?}")]
    QueueFull(ConnectionId),

    /// The client has been disconnected.
    #[error("not connected")]
    Disconnected,
}
