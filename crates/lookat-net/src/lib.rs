//! TCP transport for the look-at exchange: versioned messages, length-prefixed
//! framing, a server that feeds a single game-tick task and a client.

pub mod error;
pub mod framing;
pub mod messages;
pub mod tcp_client;
pub mod tcp_server;

pub use error::NetError;
pub use framing::{FrameConfig, FrameError, read_frame, write_frame};
pub use messages::{
    Hello, Message, MessageError, PROTOCOL_VERSION, deserialize_message, serialize_message,
};
pub use tcp_client::{ConnectionState, ConnectionStateWatch, InfoClient};
pub use tcp_server::{
    ConnectionId, ConnectionLimitReached, ConnectionMap, IdGenerator, InfoServer, ServerConfig,
    ServerEvent,
};
