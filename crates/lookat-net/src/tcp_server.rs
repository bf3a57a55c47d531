//! TCP server that accepts look-at clients and hands their messages to the
//! game-tick task.
//!
//! Each connection gets a reader task. After a successful [`Hello`] handshake
//! every decoded [`Message`] is forwarded as a [`ServerEvent`] over a bounded
//! channel, so all requests are processed serially by one consumer. Replies
//! go back through [`ConnectionMap::send`], which only queues them: a writer
//! task per connection owns the socket, so a peer that stops reading never
//! stalls the caller.

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::net::{TcpListener, TcpStream};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{RwLock, mpsc, watch};

use crate::error::NetError;
use crate::framing::{FrameConfig, FrameError, read_frame, write_frame};
use crate::messages::{Hello, Message, deserialize_message, serialize_message};

/// Unique identifier for a TCP connection within a server session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

/// Atomic generator for monotonically increasing [`ConnectionId`]s.
pub struct IdGenerator {
    next: AtomicU64,
}

impl IdGenerator {
    /// Create a new generator starting at 1.
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Return the next unique [`ConnectionId`].
    pub fn next_id(&self) -> ConnectionId {
        ConnectionId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Error returned when the connection map is at capacity.
#[derive(Debug)]
pub struct ConnectionLimitReached;

/// Outgoing queues of the active connections keyed by [`ConnectionId`].
pub struct ConnectionMap {
    inner: RwLock<HashMap<ConnectionId, mpsc::Sender<Vec<u8>>>>,
    max_connections: usize,
}

impl ConnectionMap {
    /// Create a new map with the given capacity limit.
    pub fn new(max_connections: usize) -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            max_connections,
        }
    }

    /// Insert a connection's outgoing queue. Returns `Err` if the map is at
    /// capacity.
    pub async fn insert(
        &self,
        id: ConnectionId,
        outgoing: mpsc::Sender<Vec<u8>>,
    ) -> Result<(), ConnectionLimitReached> {
        let mut map = self.inner.write().await;
        if map.len() >= self.max_connections {
            return Err(ConnectionLimitReached);
        }
        map.insert(id, outgoing);
        Ok(())
    }

    /// Remove a connection by ID. Its writer task exits once the queue drains.
    pub async fn remove(&self, id: &ConnectionId) -> bool {
        self.inner.write().await.remove(id).is_some()
    }

    /// Return the number of active connections.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Return whether the map is empty.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Serialize `msg` and queue it for connection `id`.
    ///
    /// Never waits on the socket. A full queue drops the message and
    /// reports [`NetError::QueueFull`].
    pub async fn send(&self, id: ConnectionId, msg: &Message) -> Result<(), NetError> {
        let payload = serialize_message(msg)?;
        let map = self.inner.read().await;
        let outgoing = map.get(&id).ok_or(NetError::UnknownConnection(id))?;
        match outgoing.try_send(payload) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(NetError::QueueFull(id)),
            Err(TrySendError::Closed(_)) => Err(NetError::UnknownConnection(id)),
        }
    }
}

/// Source of incoming connections for the accept loop.
trait Acceptor: Send {
    fn accept(&mut self) -> impl Future<Output = std::io::Result<(TcpStream, SocketAddr)>> + Send;
}

impl Acceptor for TcpListener {
    fn accept(&mut self) -> impl Future<Output = std::io::Result<(TcpStream, SocketAddr)>> + Send {
        TcpListener::accept(self)
    }
}

/// What the game-tick task learns about connections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// A client completed the handshake.
    Connected(ConnectionId, SocketAddr),
    /// A client sent a message after the handshake.
    Message(ConnectionId, Message),
    /// A client that had completed the handshake went away.
    Disconnected(ConnectionId),
}

/// Configuration for [`InfoServer`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to. Default: `0.0.0.0:7777`.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections. Default: 64.
    pub max_connections: usize,
    /// Frame size limit.
    pub frame: FrameConfig,
    /// Digest clients must present in their [`Hello`].
    pub registry_digest: u64,
    /// Capacity of the event channel. Default: 256.
    pub event_capacity: usize,
    /// Frames queued per connection before replies are dropped. Default: 32.
    pub send_queue_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 7777)),
            max_connections: 64,
            frame: FrameConfig::default(),
            registry_digest: 0,
            event_capacity: 256,
            send_queue_capacity: 32,
        }
    }
}

/// Shared state handed to every connection task.
#[derive(Clone)]
struct ConnectionContext {
    connections: Arc<ConnectionMap>,
    events: mpsc::Sender<ServerEvent>,
    frame: FrameConfig,
    registry_digest: u64,
}

/// TCP server for look-at clients.
pub struct InfoServer {
    config: ServerConfig,
    /// Active connection map, also used to send replies.
    pub connections: Arc<ConnectionMap>,
    id_gen: Arc<IdGenerator>,
    events: mpsc::Sender<ServerEvent>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl InfoServer {
    /// Create a server and the receiving end of its event channel.
    pub fn new(config: ServerConfig) -> (Self, mpsc::Receiver<ServerEvent>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (events, events_rx) = mpsc::channel(config.event_capacity.max(1));
        let server = Self {
            connections: Arc::new(ConnectionMap::new(config.max_connections)),
            id_gen: Arc::new(IdGenerator::new()),
            events,
            config,
            shutdown_tx,
            shutdown_rx,
        };
        (server, events_rx)
    }

    /// Bind to the configured address and run the accept loop.
    pub async fn run(&self) -> std::io::Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!("Server listening on {}", self.config.bind_addr);
        self.run_with_listener(listener).await
    }

    /// Run the accept loop with a pre-bound listener.
    pub async fn run_with_listener(&self, listener: TcpListener) -> std::io::Result<()> {
        self.accept_loop(listener).await;
        Ok(())
    }

    /// Accept until shutdown. Failed accepts are logged and skipped.
    async fn accept_loop<A: Acceptor>(&self, mut listener: A) {
        let mut shutdown_rx = self.shutdown_rx.clone();
        let ctx = ConnectionContext {
            connections: Arc::clone(&self.connections),
            events: self.events.clone(),
            frame: self.config.frame.clone(),
            registry_digest: self.config.registry_digest,
        };

        loop {
            tokio::select! {
                result = listener.accept() => {
                    let (stream, peer_addr) = match result {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            tracing::warn!("Failed to accept a connection: {e}");
                            continue;
                        }
                    };
                    if let Err(e) = stream.set_nodelay(true) {
                        tracing::debug!("Could not set TCP_NODELAY for {peer_addr}: {e}");
                    }

                    let id = self.id_gen.next_id();
                    let (reader, writer) = stream.into_split();
                    let (outgoing, queued) =
                        mpsc::channel(self.config.send_queue_capacity.max(1));

                    if self.connections.insert(id, outgoing).await.is_err() {
                        tracing::warn!("Connection limit reached, rejecting {peer_addr}");
                        continue;
                    }
                    tracing::debug!("Accepted connection {id:?} from {peer_addr}");

                    tokio::spawn(Self::write_loop(
                        id,
                        writer,
                        queued,
                        ctx.frame.clone(),
                        self.shutdown_rx.clone(),
                    ));

                    let ctx = ctx.clone();
                    let mut task_shutdown = self.shutdown_rx.clone();
                    tokio::spawn(async move {
                        let greeted = Self::handle_connection(id, peer_addr, reader, &ctx, &mut task_shutdown).await;
                        ctx.connections.remove(&id).await;
                        if greeted {
                            let _ = ctx.events.send(ServerEvent::Disconnected(id)).await;
                        }
                        tracing::debug!("Connection {id:?} closed");
                    });
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("Server shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Signal the server to shut down gracefully.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Per-connection writer loop. Owns the write half until the queue
    /// closes, a write fails or the server shuts down.
    async fn write_loop(
        id: ConnectionId,
        mut writer: OwnedWriteHalf,
        mut queued: mpsc::Receiver<Vec<u8>>,
        frame: FrameConfig,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        loop {
            let payload = tokio::select! {
                payload = queued.recv() => match payload {
                    Some(payload) => payload,
                    None => break,
                },
                _ = shutdown_rx.changed() => break,
            };
            tokio::select! {
                result = write_frame(&mut writer, &payload, &frame) => {
                    if let Err(e) = result {
                        tracing::debug!("Connection {id:?} write failed: {e}");
                        break;
                    }
                }
                _ = shutdown_rx.changed() => break,
            }
        }
    }

    /// Per-connection reader loop. Returns whether the handshake succeeded.
    async fn handle_connection(
        id: ConnectionId,
        peer_addr: SocketAddr,
        mut reader: OwnedReadHalf,
        ctx: &ConnectionContext,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) -> bool {
        let mut greeted = false;
        loop {
            let frame = tokio::select! {
                result = read_frame(&mut reader, &ctx.frame) => result,
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                    continue;
                }
            };

            let payload = match frame {
                Ok(payload) => payload,
                Err(FrameError::ConnectionClosed) => break,
                Err(e) => {
                    tracing::debug!("Connection {id:?} framing error: {e}");
                    break;
                }
            };
            let msg = match deserialize_message(&payload) {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::debug!("Connection {id:?} sent an undecodable message: {e}");
                    continue;
                }
            };

            match (greeted, msg) {
                (false, Message::Hello(Hello { registry_digest })) => {
                    if registry_digest != ctx.registry_digest {
                        tracing::warn!(
                            "Connection {id:?} registry mismatch: client {registry_digest:016x}, server {:016x}",
                            ctx.registry_digest
                        );
                        break;
                    }
                    greeted = true;
                    if ctx.events.send(ServerEvent::Connected(id, peer_addr)).await.is_err() {
                        break;
                    }
                }
                (false, _) => {
                    tracing::debug!("Connection {id:?} sent a message before Hello");
                    break;
                }
                (true, Message::Hello(_)) => {
                    tracing::debug!("Connection {id:?} sent a second Hello, ignoring it");
                }
                (true, msg) => {
                    if ctx.events.send(ServerEvent::Message(id, msg)).await.is_err() {
                        break;
                    }
                }
            }
        }
        greeted
    }
}
