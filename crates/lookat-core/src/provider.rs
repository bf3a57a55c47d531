//! Information providers: pure functions producing one fact about a target.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::panic::{AssertUnwindSafe, catch_unwind};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::game::Game;
use crate::target::{AnyTarget, TargetTypeId, TargetValue};
use crate::wire::{WireError, WireReader, WireWriter};

/// Which side evaluates a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderSide {
    /// Evaluated locally by the client every tick.
    Client,
    /// Evaluated by the server when a request passes the rate limiter.
    Server,
    /// Evaluated on both sides; the client's own value wins when present.
    Both,
}

impl ProviderSide {
    /// Whether the client evaluates this provider.
    pub fn runs_on_client(self) -> bool {
        matches!(self, Self::Client | Self::Both)
    }

    /// Whether the server evaluates this provider.
    pub fn runs_on_server(self) -> bool {
        matches!(self, Self::Server | Self::Both)
    }
}

/// Bound for values produced by a provider.
pub trait ProviderValue: Serialize + DeserializeOwned + fmt::Debug + Send + Sync + 'static {}

impl<V> ProviderValue for V where V: Serialize + DeserializeOwned + fmt::Debug + Send + Sync + 'static
{}

/// Type-erased provider value, as held by the client after decoding.
pub trait AnyValue: Any + fmt::Debug + Send + Sync {
    /// Upcast for downcasting to the concrete value type.
    fn as_any(&self) -> &dyn Any;
}

impl<V: ProviderValue> AnyValue for V {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Typed handle to a registered provider. Carries the wire index.
pub struct ProviderId<V> {
    index: u32,
    _marker: PhantomData<fn() -> V>,
}

impl<V> ProviderId<V> {
    pub(crate) fn new(index: u32) -> Self {
        Self {
            index,
            _marker: PhantomData,
        }
    }

    /// Wire index of this provider.
    pub fn index(&self) -> u32 {
        self.index
    }
}

impl<V> Clone for ProviderId<V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V> Copy for ProviderId<V> {}

impl<V> PartialEq for ProviderId<V> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<V> Eq for ProviderId<V> {}

impl<V> fmt::Debug for ProviderId<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ProviderId").field(&self.index).finish()
    }
}

type ComputeFn<G, K, V> = Box<
    dyn Fn(&<G as Game>::Actor, &<G as Game>::World, &K) -> Option<V> + Send + Sync,
>;

/// A fact producer scoped to one target type.
pub struct InformationProvider<G: Game, K, V> {
    name: String,
    target_type: TargetTypeId<K>,
    side: ProviderSide,
    priority: i32,
    alt_mode_only: bool,
    compute: ComputeFn<G, K, V>,
}

impl<G: Game, K: TargetValue, V: ProviderValue> InformationProvider<G, K, V> {
    /// Create a provider with priority 0.
    ///
    /// `compute` returns `None` when the fact does not apply to the target
    /// instance. It runs inside the tick and must not block.
    pub fn new<F>(
        name: impl Into<String>,
        target_type: TargetTypeId<K>,
        side: ProviderSide,
        compute: F,
    ) -> Self
    where
        F: Fn(&G::Actor, &G::World, &K) -> Option<V> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            target_type,
            side,
            priority: 0,
            alt_mode_only: false,
            compute: Box::new(compute),
        }
    }

    /// Ordering key; lower values come first.
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Only apply while the requester is in alternate mode.
    pub fn alt_mode_only(mut self) -> Self {
        self.alt_mode_only = true;
        self
    }

    /// Registry name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Object-safe view of an [`InformationProvider`] used by the registry.
pub(crate) trait ErasedProvider<G: Game>: Send + Sync {
    fn name(&self) -> &str;
    fn target_type(&self) -> u32;
    fn side(&self) -> ProviderSide;
    fn priority(&self) -> i32;
    fn alt_mode_only(&self) -> bool;
    fn compute(
        &self,
        actor: &G::Actor,
        world: &G::World,
        target: &dyn AnyTarget,
    ) -> Option<Box<dyn AnyValue>>;
    /// `None` if `value` is not this provider's value type.
    fn encode(&self, value: &dyn AnyValue, out: &mut WireWriter) -> Option<Result<(), WireError>>;
    fn decode(&self, input: &mut WireReader<'_>) -> Result<Box<dyn AnyValue>, WireError>;
}

impl<G: Game, K: TargetValue, V: ProviderValue> ErasedProvider<G> for InformationProvider<G, K, V> {
    fn name(&self) -> &str {
        &self.name
    }

    fn target_type(&self) -> u32 {
        self.target_type.index()
    }

    fn side(&self) -> ProviderSide {
        self.side
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn alt_mode_only(&self) -> bool {
        self.alt_mode_only
    }

    fn compute(
        &self,
        actor: &G::Actor,
        world: &G::World,
        target: &dyn AnyTarget,
    ) -> Option<Box<dyn AnyValue>> {
        let target = target.as_any().downcast_ref::<K>()?;
        (self.compute)(actor, world, target).map(|value| Box::new(value) as Box<dyn AnyValue>)
    }

    fn encode(&self, value: &dyn AnyValue, out: &mut WireWriter) -> Option<Result<(), WireError>> {
        let value = value.as_any().downcast_ref::<V>()?;
        Some(out.write(value))
    }

    fn decode(&self, input: &mut WireReader<'_>) -> Result<Box<dyn AnyValue>, WireError> {
        Ok(Box::new(input.read::<V>()?))
    }
}

/// Run provider code, turning a panic into a logged skip.
pub(crate) fn guarded<R>(provider: &str, f: impl FnOnce() -> Option<R>) -> Option<R> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(_) => {
            tracing::error!(provider, "information provider panicked, skipping it");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_flags() {
        assert!(ProviderSide::Client.runs_on_client());
        assert!(!ProviderSide::Client.runs_on_server());
        assert!(ProviderSide::Server.runs_on_server());
        assert!(!ProviderSide::Server.runs_on_client());
        assert!(ProviderSide::Both.runs_on_client());
        assert!(ProviderSide::Both.runs_on_server());
    }

    #[test]
    fn test_guarded_passes_values_through() {
        assert_eq!(guarded("ok", || Some(3)), Some(3));
        assert_eq!(guarded::<u8>("absent", || None), None);
    }

    #[test]
    fn test_guarded_swallows_panics() {
        let result = guarded::<u8>("broken", || panic!("provider bug"));
        assert_eq!(result, None);
    }

    #[test]
    fn test_any_value_downcasts_to_concrete_type() {
        let boxed: Box<dyn AnyValue> = Box::new(1.5f32);
        assert_eq!(boxed.as_ref().as_any().downcast_ref::<f32>(), Some(&1.5));
        assert!(boxed.as_ref().as_any().downcast_ref::<u32>().is_none());
    }
}
