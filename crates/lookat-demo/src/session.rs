//! Loopback session: one server and one client in the same process, driven
//! by a fixed-rate game tick.
//!
//! Each tick the client resolves the scripted aim and sends a request, the
//! server answers whatever requests have arrived, and the client merges the
//! replies that came back. When a config directory is given, the file is
//! polled for changes to the disabled providers and the update delay.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use lookat_config::Config;
use lookat_core::{ClientDispatcher, FactSource, ServerDispatcher, TargetInfo};
use lookat_net::{
    ConnectionId, FrameConfig, InfoClient, InfoServer, Message, NetError, ServerConfig,
    ServerEvent,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::DemoError;
use crate::game::Demo;
use crate::scene::{demo_actor, demo_world};
use crate::world::{Actor, World};
use crate::{Content, build_registry};

/// Ticks between checks of the config file.
pub const RELOAD_CHECK_TICKS: u64 = 10;

/// What happened during a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionReport {
    /// Requests the client sent.
    pub requests_sent: u64,
    /// Replies the server sent.
    pub replies_sent: u64,
    /// Replies the client merged.
    pub replies_accepted: u64,
    /// Names of every provider that contributed a fact.
    pub providers_seen: BTreeSet<String>,
    /// Config changes picked up from disk.
    pub reloads_applied: u64,
    /// Providers that contributed a fact after the last applied reload.
    pub providers_seen_since_reload: BTreeSet<String>,
}

/// Run a loopback session for `ticks` game ticks.
///
/// The server binds to the configured endpoint; port `0` picks a free port.
/// With `config_dir` set, `config.ron` there is re-read every
/// [`RELOAD_CHECK_TICKS`] ticks.
pub async fn run_session(
    config: &Config,
    config_dir: Option<&Path>,
    ticks: u64,
) -> Result<SessionReport, DemoError> {
    let Content { registry, .. } = build_registry(config.general.include_fluids)?;

    let mut server_dispatcher = ServerDispatcher::<Demo, ConnectionId>::new(
        Arc::clone(&registry),
        config.general.update_delay_ticks,
    )?;
    let mut client_dispatcher = ClientDispatcher::new(Arc::clone(&registry))?;
    let disabled = server_dispatcher.set_disabled_providers(&config.providers.disabled)?;
    client_dispatcher.set_disabled_providers(&config.providers.disabled)?;
    if disabled > 0 {
        info!("{disabled} provider(s) disabled by configuration");
    }

    let frame = frame_config(config);
    let listener = TcpListener::bind(config.server_endpoint()).await?;
    let addr = listener.local_addr()?;
    let (server, mut events) = InfoServer::new(ServerConfig {
        bind_addr: addr,
        max_connections: config.network.max_connections,
        frame: frame.clone(),
        registry_digest: registry.digest(),
        ..ServerConfig::default()
    });
    let server = Arc::new(server);
    let accept_loop = {
        let server = Arc::clone(&server);
        tokio::spawn(async move { server.run_with_listener(listener).await })
    };
    info!("Server listening on {addr}, registry digest {:016x}", registry.digest());

    let (client, mut updates) = InfoClient::connect(addr, registry.digest(), frame).await?;

    // Compared against the file, not `config`, so CLI overrides survive
    // until the file itself changes.
    let mut on_disk = config_dir.map(Config::load_or_create).transpose()?;

    let (mut world, scene) = demo_world();
    let mut actor = demo_actor();
    let mut report = SessionReport::default();

    let tick_hz = config.network.tick_rate_hz.max(1);
    let mut interval = tokio::time::interval(Duration::from_secs(1) / tick_hz);

    for tick in 0..ticks {
        interval.tick().await;
        if tick > 0
            && tick % RELOAD_CHECK_TICKS == 0
            && let Some(dir) = config_dir
            && let Some(last) = &mut on_disk
            && apply_reload(dir, last, &mut server_dispatcher, &mut client_dispatcher)?
        {
            report.reloads_applied += 1;
            report.providers_seen_since_reload.clear();
        }
        world.advance();
        world.breaking = scene.breaking(tick);
        actor.sneaking = scene.sneaking(tick);

        let hit = scene.aim(tick);
        if let Some(request) = client_dispatcher.tick(&actor, &world, &hit, actor.sneaking) {
            client.send_request(request).await?;
            report.requests_sent += 1;
        }

        report.replies_sent +=
            serve_pending(&server, &mut server_dispatcher, &mut events, &actor, &world).await;

        while let Ok(update) = updates.try_recv() {
            if client_dispatcher.receive(&update) {
                report.replies_accepted += 1;
            }
        }

        if let Some(view) = client_dispatcher.view() {
            for fact in view.facts() {
                if let Some(name) = registry.provider_name(fact.provider()) {
                    report.providers_seen.insert(name.to_string());
                    report.providers_seen_since_reload.insert(name.to_string());
                }
            }
            if scene.is_stop_end(tick) {
                log_view(&client_dispatcher, &view);
            }
        }
    }

    client.disconnect();
    server.shutdown();
    match accept_loop.await {
        Ok(result) => result?,
        Err(e) => warn!("Accept loop task failed: {e}"),
    }

    info!(
        requests = report.requests_sent,
        replies = report.replies_sent,
        accepted = report.replies_accepted,
        "Session finished"
    );
    Ok(report)
}

/// Answer every request queued by the server's connection tasks. Returns the
/// number of replies sent.
async fn serve_pending(
    server: &InfoServer,
    dispatcher: &mut ServerDispatcher<Demo, ConnectionId>,
    events: &mut mpsc::Receiver<ServerEvent>,
    actor: &Actor,
    world: &World,
) -> u64 {
    let mut sent = 0;
    while let Ok(event) = events.try_recv() {
        match event {
            ServerEvent::Connected(id, peer) => {
                debug!("Client {id:?} connected from {peer}");
                dispatcher.connect(id);
            }
            ServerEvent::Disconnected(id) => {
                dispatcher.disconnect(&id);
            }
            ServerEvent::Message(id, Message::RequestData(request)) => {
                let Some(update) =
                    dispatcher.handle_request(&id, actor, world, world.tick(), &request)
                else {
                    continue;
                };
                match server.connections.send(id, &Message::DataUpdate(update)).await {
                    Ok(()) => sent += 1,
                    Err(NetError::QueueFull(_)) => debug!("Reply to {id:?} dropped, queue full"),
                    Err(e) => warn!("Failed to reply to {id:?}: {e}"),
                }
            }
            ServerEvent::Message(id, other) => {
                debug!("Ignoring {other:?} from {id:?}");
            }
        }
    }
    sent
}

/// Frame limits shared by both ends of the session.
pub fn frame_config(config: &Config) -> FrameConfig {
    FrameConfig {
        max_payload_size: config.network.max_frame_bytes,
    }
}

/// Re-read the config file and push changed settings into the dispatchers.
/// Returns whether anything was applied.
///
/// A file that fails to parse is logged and skipped; the previous settings
/// stay in effect.
fn apply_reload(
    dir: &Path,
    last: &mut Config,
    server: &mut ServerDispatcher<Demo, ConnectionId>,
    client: &mut ClientDispatcher<Demo>,
) -> Result<bool, DemoError> {
    let fresh = match last.reload(dir) {
        Ok(Some(fresh)) => fresh,
        Ok(None) => return Ok(false),
        Err(e) => {
            warn!("Ignoring config reload: {e}");
            return Ok(false);
        }
    };

    let mut applied = false;
    if fresh.providers.disabled != last.providers.disabled {
        let disabled = server.set_disabled_providers(&fresh.providers.disabled)?;
        client.set_disabled_providers(&fresh.providers.disabled)?;
        info!("{disabled} provider(s) disabled after reload");
        applied = true;
    }
    if fresh.general.update_delay_ticks != last.general.update_delay_ticks {
        server.set_update_delay(fresh.general.update_delay_ticks);
        info!(
            "Update delay changed to {} ticks",
            fresh.general.update_delay_ticks
        );
        applied = true;
    }
    *last = fresh;
    Ok(applied)
}

fn log_view(dispatcher: &ClientDispatcher<Demo>, view: &TargetInfo) {
    let registry = dispatcher.registry();
    let target_type = registry
        .target_type_name(view.target().type_index())
        .unwrap_or("?");
    info!(
        target_type,
        value = ?view.target(),
        server_nonce = ?view.server_nonce(),
        "Looking at"
    );
    for fact in view.facts() {
        let provider = registry.provider_name(fact.provider()).unwrap_or("?");
        let source = match fact.source() {
            FactSource::Client => "client",
            FactSource::Server => "server",
        };
        info!(provider, source, value = ?fact.value(), "  fact");
    }
}
