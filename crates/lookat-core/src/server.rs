//! Server-side dispatch: rate limiting and evaluation of server providers.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::game::{DecodeContext, Game};
use crate::protocol::{DataUpdate, RequestData};
use crate::provider::guarded;
use crate::rate_limit::RateLimitTracker;
use crate::registry::{Registry, RegistryError};
use crate::view::ProviderView;
use crate::wire::WireWriter;

/// Per-connection throttle state.
#[derive(Debug, Clone)]
pub struct ClientConnectionState {
    last_fingerprint: Option<u64>,
    rate_limiter: RateLimitTracker,
}

impl ClientConnectionState {
    fn new(update_delay: u64) -> Self {
        Self {
            last_fingerprint: None,
            rate_limiter: RateLimitTracker::new(update_delay),
        }
    }

    /// Fingerprint of the last requested target.
    pub fn last_fingerprint(&self) -> Option<u64> {
        self.last_fingerprint
    }

    /// The connection's throttle.
    pub fn rate_limiter(&self) -> &RateLimitTracker {
        &self.rate_limiter
    }
}

/// Answers [`RequestData`] for every connected client.
///
/// `K` identifies a connection. The dispatcher is meant to be owned by the
/// single task running the game tick, so it takes `&mut self` and needs no
/// locking.
pub struct ServerDispatcher<G: Game, K> {
    registry: Arc<Registry<G>>,
    view: ProviderView,
    update_delay: u64,
    connections: FxHashMap<K, ClientConnectionState>,
}

impl<G, K> ServerDispatcher<G, K>
where
    G: Game,
    K: Eq + Hash + Clone + fmt::Debug,
{
    /// Create a dispatcher with no providers disabled.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFrozen`] if `registry` is not frozen.
    pub fn new(registry: Arc<Registry<G>>, update_delay: u64) -> Result<Self, RegistryError> {
        let view = ProviderView::new(&registry, std::iter::empty::<&str>())?;
        Ok(Self {
            registry,
            view,
            update_delay,
            connections: FxHashMap::default(),
        })
    }

    /// The shared registry.
    pub fn registry(&self) -> &Arc<Registry<G>> {
        &self.registry
    }

    /// The current applicable view.
    pub fn view(&self) -> &ProviderView {
        &self.view
    }

    /// Register a connection, resetting any previous state for `key`.
    pub fn connect(&mut self, key: K) {
        tracing::debug!(connection = ?key, "client connected");
        self.connections
            .insert(key, ClientConnectionState::new(self.update_delay));
    }

    /// Forget a connection. Returns whether it was known.
    pub fn disconnect(&mut self, key: &K) -> bool {
        let known = self.connections.remove(key).is_some();
        if known {
            tracing::debug!(connection = ?key, "client disconnected");
        }
        known
    }

    /// Number of tracked connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// State of one connection.
    pub fn connection(&self, key: &K) -> Option<&ClientConnectionState> {
        self.connections.get(key)
    }

    /// Steady-state interval between accepted requests, in ticks.
    pub fn update_delay(&self) -> u64 {
        self.update_delay
    }

    /// Change the steady-state interval for new and existing connections.
    pub fn set_update_delay(&mut self, ticks: u64) {
        self.update_delay = ticks;
        for state in self.connections.values_mut() {
            state.rate_limiter.set_interval(ticks);
        }
    }

    /// Replace the disabled provider set and rebuild the view. Returns the
    /// number of providers now disabled.
    pub fn set_disabled_providers<I, S>(&mut self, names: I) -> Result<usize, RegistryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.view = ProviderView::new(&self.registry, names)?;
        Ok(self.view.disabled_count())
    }

    /// Handle one request from `key` at tick `now`.
    ///
    /// Returns `None` when the request is throttled or cannot be decoded;
    /// neither case is reported to the client.
    pub fn handle_request(
        &mut self,
        key: &K,
        actor: &G::Actor,
        world: &G::World,
        now: u64,
        request: &RequestData,
    ) -> Option<DataUpdate> {
        let ctx = DecodeContext::new(actor, world);
        let target = match self.registry.decode_target(&ctx, &request.target) {
            Ok(Some(target)) => target,
            Ok(None) => {
                tracing::trace!(connection = ?key, nonce = request.nonce, "target no longer exists");
                return None;
            }
            Err(e) => {
                tracing::debug!(connection = ?key, nonce = request.nonce, error = %e, "dropping malformed request");
                return None;
            }
        };

        let update_delay = self.update_delay;
        let state = self
            .connections
            .entry(key.clone())
            .or_insert_with(|| ClientConnectionState::new(update_delay));

        let fingerprint = target.fingerprint();
        if state.last_fingerprint != Some(fingerprint) {
            state.last_fingerprint = Some(fingerprint);
            state.rate_limiter.set_override(update_delay / 2);
        }
        if !state.rate_limiter.update(now) {
            tracing::trace!(connection = ?key, nonce = request.nonce, now, "request throttled");
            return None;
        }
        state.rate_limiter.clear_override();

        let alt_mode = G::is_alt_mode(actor);
        let mut count = 0u32;
        let mut body = WireWriter::new();
        for &index in self.view.applicable(target.type_index(), alt_mode) {
            let Some(provider) = self.registry.provider(index) else {
                continue;
            };
            if !provider.side().runs_on_server() {
                continue;
            }
            let Some(scoped) = self.registry.upcast(&target, provider.target_type()) else {
                continue;
            };
            let Some(value) = guarded(provider.name(), || {
                provider.compute(actor, world, scoped.value())
            }) else {
                continue;
            };

            let mut entry = WireWriter::new();
            match self.registry.encode_entry(index, value.as_ref(), &mut entry) {
                Ok(()) => {
                    body.write_raw(&entry.into_bytes());
                    count += 1;
                }
                Err(e) => {
                    tracing::error!(provider = provider.name(), error = %e, "failed to encode provider value, skipping it");
                }
            }
        }

        let mut results = WireWriter::new();
        if let Err(e) = results.write_varint(count) {
            tracing::error!(error = %e, "failed to encode result count");
            return None;
        }
        results.write_raw(&body.into_bytes());

        tracing::trace!(connection = ?key, nonce = request.nonce, entries = count, "answered request");
        Some(DataUpdate {
            nonce: request.nonce,
            results: results.into_bytes(),
        })
    }
}

impl<G: Game, K> fmt::Debug for ServerDispatcher<G, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerDispatcher")
            .field("registry", &self.registry)
            .field("update_delay", &self.update_delay)
            .field("connections", &self.connections.len())
            .finish()
    }
}
