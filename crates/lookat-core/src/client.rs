//! Client-side dispatch: resolve the aim every tick, evaluate local
//! providers, issue requests and merge the server's replies.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::game::Game;
use crate::protocol::{DataUpdate, RequestData, nonce_precedes};
use crate::provider::{AnyValue, ProviderId, ProviderValue, guarded};
use crate::registry::{Registry, RegistryError};
use crate::target::Target;
use crate::view::ProviderView;

/// Where a fact was computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactSource {
    /// Evaluated locally this tick.
    Client,
    /// Received in a server reply.
    Server,
}

/// One provider's value for the current target.
#[derive(Debug, Clone)]
pub struct Fact {
    provider: u32,
    source: FactSource,
    value: Arc<dyn AnyValue>,
}

impl Fact {
    /// Wire index of the provider.
    pub fn provider(&self) -> u32 {
        self.provider
    }

    /// Where the value came from.
    pub fn source(&self) -> FactSource {
        self.source
    }

    /// The value, type-erased.
    pub fn value(&self) -> &dyn AnyValue {
        &*self.value
    }

    /// The value, if this fact belongs to `id`.
    pub fn get<V: ProviderValue>(&self, id: ProviderId<V>) -> Option<&V> {
        if id.index() != self.provider {
            return None;
        }
        self.value.as_any().downcast_ref::<V>()
    }
}

/// Everything known about the current target, ready for display.
#[derive(Debug, Clone)]
pub struct TargetInfo {
    target: Target,
    server_nonce: Option<u32>,
    facts: Vec<Fact>,
}

impl TargetInfo {
    /// The target being described.
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Nonce of the server reply merged in, if any arrived.
    pub fn server_nonce(&self) -> Option<u32> {
        self.server_nonce
    }

    /// Facts in display order.
    pub fn facts(&self) -> &[Fact] {
        &self.facts
    }

    /// Value of one provider.
    pub fn get<V: ProviderValue>(&self, id: ProviderId<V>) -> Option<&V> {
        self.facts.iter().find_map(|fact| fact.get(id))
    }
}

struct ServerFacts {
    nonce: u32,
    values: FxHashMap<u32, Arc<dyn AnyValue>>,
}

struct Current {
    target: Target,
    fingerprint: u64,
    first_nonce: u32,
    alt_mode: bool,
    local: FxHashMap<u32, Arc<dyn AnyValue>>,
    server: Option<ServerFacts>,
}

/// Drives the client half of the exchange.
pub struct ClientDispatcher<G: Game> {
    registry: Arc<Registry<G>>,
    view: ProviderView,
    next_nonce: u32,
    current: Option<Current>,
}

impl<G: Game> ClientDispatcher<G> {
    /// Create a dispatcher with no providers disabled.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFrozen`] if `registry` is not frozen.
    pub fn new(registry: Arc<Registry<G>>) -> Result<Self, RegistryError> {
        let view = ProviderView::new(&registry, std::iter::empty::<&str>())?;
        Ok(Self {
            registry,
            view,
            next_nonce: 0,
            current: None,
        })
    }

    /// The shared registry.
    pub fn registry(&self) -> &Arc<Registry<G>> {
        &self.registry
    }

    /// The current applicable view.
    pub fn provider_view(&self) -> &ProviderView {
        &self.view
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

    /// Run one client tick.
    ///
    /// Resolves `hit`, evaluates client providers and returns the request to
    /// send, or `None` when nothing is targeted.
    pub fn tick(
        &mut self,
        actor: &G::Actor,
        world: &G::World,
        hit: &G::Hit,
        alt_mode: bool,
    ) -> Option<RequestData> {
        let Some(target) = self.registry.resolve(world, hit) else {
            self.current = None;
            return None;
        };
        let encoded = match self.registry.encode_target(&target) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(target_type = target.type_index(), error = %e, "failed to encode target");
                self.current = None;
                return None;
            }
        };

        let nonce = self.next_nonce;
        self.next_nonce = self.next_nonce.wrapping_add(1);

        let fingerprint = target.fingerprint();
        let local = self.evaluate_local(actor, world, &target, alt_mode);
        match &mut self.current {
            Some(current) if current.fingerprint == fingerprint => {
                current.target = target;
                current.alt_mode = alt_mode;
                current.local = local;
            }
            _ => {
                tracing::trace!(nonce, ?target, "target changed");
                self.current = Some(Current {
                    target,
                    fingerprint,
                    first_nonce: nonce,
                    alt_mode,
                    local,
                    server: None,
                });
            }
        }

        Some(RequestData {
            nonce,
            target: encoded,
        })
    }

    fn evaluate_local(
        &self,
        actor: &G::Actor,
        world: &G::World,
        target: &Target,
        alt_mode: bool,
    ) -> FxHashMap<u32, Arc<dyn AnyValue>> {
        let mut local = FxHashMap::default();
        for &index in self.view.applicable(target.type_index(), alt_mode) {
            let Some(provider) = self.registry.provider(index) else {
                continue;
            };
            if !provider.side().runs_on_client() {
                continue;
            }
            let Some(scoped) = self.registry.upcast(target, provider.target_type()) else {
                continue;
            };
            if let Some(value) =
                guarded(provider.name(), || provider.compute(actor, world, scoped.value()))
            {
                local.insert(index, Arc::from(value));
            }
        }
        local
    }

    /// Merge a server reply. Returns whether it was accepted.
    ///
    /// Replies for an earlier target, replies older than the facts already
    /// held and undecodable payloads are dropped.
    pub fn receive(&mut self, update: &DataUpdate) -> bool {
        let Some(current) = &mut self.current else {
            tracing::trace!(nonce = update.nonce, "reply without a target");
            return false;
        };
        let last_issued = self.next_nonce.wrapping_sub(1);
        if nonce_precedes(update.nonce, current.first_nonce)
            || nonce_precedes(last_issued, update.nonce)
        {
            tracing::trace!(nonce = update.nonce, "stale reply dropped");
            return false;
        }
        if current
            .server
            .as_ref()
            .is_some_and(|server| nonce_precedes(update.nonce, server.nonce))
        {
            tracing::trace!(nonce = update.nonce, "out-of-order reply dropped");
            return false;
        }

        let entries = match self.registry.decode_results(&update.results) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(nonce = update.nonce, error = %e, "dropping undecodable reply");
                return false;
            }
        };
        current.server = Some(ServerFacts {
            nonce: update.nonce,
            values: entries
                .into_iter()
                .map(|(index, value)| (index, Arc::from(value)))
                .collect(),
        });
        true
    }

    /// Facts for the current target, in applicable-view order.
    pub fn view(&self) -> Option<TargetInfo> {
        let current = self.current.as_ref()?;
        let mut facts = Vec::new();
        for &index in self
            .view
            .applicable(current.target.type_index(), current.alt_mode)
        {
            let local = current.local.get(&index);
            let remote = current
                .server
                .as_ref()
                .and_then(|server| server.values.get(&index));
            let fact = match (local, remote) {
                (Some(value), _) => (FactSource::Client, value),
                (None, Some(value)) => (FactSource::Server, value),
                (None, None) => continue,
            };
            facts.push(Fact {
                provider: index,
                source: fact.0,
                value: Arc::clone(fact.1),
            });
        }
        Some(TargetInfo {
            target: current.target.clone(),
            server_nonce: current.server.as_ref().map(|server| server.nonce),
            facts,
        })
    }

    /// Drop the current target and everything known about it.
    pub fn clear(&mut self) {
        self.current = None;
    }
}

impl<G: Game> fmt::Debug for ClientDispatcher<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientDispatcher")
            .field("registry", &self.registry)
            .field("next_nonce", &self.next_nonce)
            .field(
                "target",
                &self.current.as_ref().map(|current| &current.target),
            )
            .finish()
    }
}
