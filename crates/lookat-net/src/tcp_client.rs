//! TCP client for a look-at server.
//!
//! [`InfoClient::connect`] performs the [`Hello`] handshake and spawns a
//! reader task that forwards every [`DataUpdate`] over a channel. State
//! changes are broadcast via a [`watch`] channel so any number of consumers
//! can react without polling.

use std::net::SocketAddr;
use std::sync::Arc;

use lookat_core::{DataUpdate, RequestData};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex, mpsc, watch};

use crate::error::NetError;
use crate::framing::{FrameConfig, FrameError, read_frame, write_frame};
use crate::messages::{Hello, Message, deserialize_message, serialize_message};

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Attempting to establish a TCP connection.
    Connecting,
    /// Handshake sent, ready for requests.
    Connected,
    /// Connection lost or intentionally closed.
    Disconnected,
}

/// Observable connection state backed by a [`watch`] channel.
pub struct ConnectionStateWatch {
    tx: watch::Sender<ConnectionState>,
    rx: watch::Receiver<ConnectionState>,
}

impl Default for ConnectionStateWatch {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionStateWatch {
    /// Create a new watch initialized to [`ConnectionState::Disconnected`].
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(ConnectionState::Disconnected);
        Self { tx, rx }
    }

    /// Set the current connection state, notifying all subscribers.
    pub fn set(&self, state: ConnectionState) {
        let _ = self.tx.send(state);
    }

    /// Return a new subscriber receiver.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.rx.clone()
    }

    /// Return the current state without blocking.
    pub fn current(&self) -> ConnectionState {
        *self.rx.borrow()
    }
}

/// Handle to a connected look-at server.
pub struct InfoClient {
    writer: Arc<Mutex<OwnedWriteHalf>>,
    state: Arc<ConnectionStateWatch>,
    frame: FrameConfig,
    /// Sending `true` causes the reader task to exit.
    shutdown_tx: watch::Sender<bool>,
}

impl InfoClient {
    /// Connect to `addr` and announce `registry_digest`.
    ///
    /// Returns the client and the stream of replies.
    pub async fn connect(
        addr: SocketAddr,
        registry_digest: u64,
        frame: FrameConfig,
    ) -> Result<(Self, mpsc::Receiver<DataUpdate>), NetError> {
        let state = Arc::new(ConnectionStateWatch::new());
        state.set(ConnectionState::Connecting);

        let stream = match TcpStream::connect(addr).await {
            Ok(stream) => stream,
            Err(e) => {
                state.set(ConnectionState::Disconnected);
                return Err(e.into());
            }
        };
        stream.set_nodelay(true)?;

        let (reader, mut writer) = stream.into_split();
        let hello = serialize_message(&Message::Hello(Hello { registry_digest }))?;
        write_frame(&mut writer, &hello, &frame).await?;
        state.set(ConnectionState::Connected);
        tracing::debug!("Connected to {addr}, registry digest {registry_digest:016x}");

        let (updates_tx, updates_rx) = mpsc::channel(64);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let reader_state = Arc::clone(&state);
        let reader_frame = frame.clone();
        let mut reader_shutdown = shutdown_rx;
        tokio::spawn(async move {
            Self::read_loop(
                reader,
                &reader_frame,
                &updates_tx,
                &reader_state,
                &mut reader_shutdown,
            )
            .await;
        });

        let client = Self {
            writer: Arc::new(Mutex::new(writer)),
            state,
            frame,
            shutdown_tx,
        };
        Ok((client, updates_rx))
    }

    /// Return the connection state watch.
    pub fn state(&self) -> &Arc<ConnectionStateWatch> {
        &self.state
    }

    /// Send one request.
    pub async fn send_request(&self, request: RequestData) -> Result<(), NetError> {
        if self.state.current() != ConnectionState::Connected {
            return Err(NetError::Disconnected);
        }
        let payload = serialize_message(&Message::RequestData(request))?;
        let mut writer = self.writer.lock().await;
        if let Err(e) = write_frame(&mut *writer, &payload, &self.frame).await {
            self.state.set(ConnectionState::Disconnected);
            return Err(e.into());
        }
        Ok(())
    }

    /// Disconnect from the server.
    ///
    /// Signals the reader task to exit and transitions state to
    /// [`ConnectionState::Disconnected`] immediately.
    pub fn disconnect(&self) {
        let _ = self.shutdown_tx.send(true);
        self.state.set(ConnectionState::Disconnected);
    }

    /// Forward replies until the connection closes or shutdown is signalled.
    async fn read_loop(
        mut reader: OwnedReadHalf,
        frame: &FrameConfig,
        updates: &mpsc::Sender<DataUpdate>,
        state: &ConnectionStateWatch,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) {
        loop {
            let result = tokio::select! {
                result = read_frame(&mut reader, frame) => result,
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                    continue;
                }
            };

            let payload = match result {
                Ok(payload) => payload,
                Err(FrameError::ConnectionClosed) => {
                    tracing::debug!("Server closed the connection");
                    break;
                }
                Err(e) => {
                    tracing::debug!("Framing error: {e}");
                    break;
                }
            };
            match deserialize_message(&payload) {
                Ok(Message::DataUpdate(update)) => {
                    if updates.send(update).await.is_err() {
                        break;
                    }
                }
                Ok(other) => tracing::debug!("Ignoring unexpected message {other:?}"),
                Err(e) => tracing::debug!("Dropping undecodable message: {e}"),
            }
        }
        state.set(ConnectionState::Disconnected);
    }
}

impl Drop for InfoClient {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}
