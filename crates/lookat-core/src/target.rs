//! Target types: classify a raw aim result into a typed, prioritized target.
//!
//! A [`TargetTypeDef`] bundles a classifier, a wire codec and a priority. The
//! registry erases the value type so that targets of every kind can travel
//! through the same pipeline as a [`Target`].

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;

use rustc_hash::FxHasher;

use crate::game::{DecodeContext, Game};
use crate::wire::{WireError, WireReader, WireWriter};

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// Bound for values produced by a target type.
///
/// Equality and hashing drive the rate limiter's "same target as before"
/// check, so two values that describe the same thing must compare equal.
pub trait TargetValue: Any + Clone + Eq + Hash + fmt::Debug + Send + Sync {}

impl<T> TargetValue for T where T: Any + Clone + Eq + Hash + fmt::Debug + Send + Sync {}

/// Object-safe view of a [`TargetValue`].
pub(crate) trait AnyTarget: Any + fmt::Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn dyn_eq(&self, other: &dyn AnyTarget) -> bool;
    fn dyn_hash(&self, state: &mut dyn Hasher);
}

impl<T: TargetValue> AnyTarget for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn AnyTarget) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| other == self)
    }

    fn dyn_hash(&self, mut state: &mut dyn Hasher) {
        self.hash(&mut state);
    }
}

/// Typed handle to a registered target type. Carries the wire index.
pub struct TargetTypeId<T> {
    index: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> TargetTypeId<T> {
    pub(crate) fn new(index: u32) -> Self {
        Self {
            index,
            _marker: PhantomData,
        }
    }

    /// Wire index of this target type.
    pub fn index(&self) -> u32 {
        self.index
    }
}

impl<T> Clone for TargetTypeId<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for TargetTypeId<T> {}

impl<T> PartialEq for TargetTypeId<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for TargetTypeId<T> {}

impl<T> fmt::Debug for TargetTypeId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TargetTypeId").field(&self.index).finish()
    }
}

/// A resolved target: the winning target type plus its value.
#[derive(Clone)]
pub struct Target {
    type_index: u32,
    value: Arc<dyn AnyTarget>,
}

impl Target {
    pub(crate) fn from_erased(type_index: u32, value: Arc<dyn AnyTarget>) -> Self {
        Self { type_index, value }
    }

    /// Wire index of the target type this value belongs to.
    pub fn type_index(&self) -> u32 {
        self.type_index
    }

    /// Borrow the value if this target is of the given type.
    ///
    /// Returns `None` for targets of any other type, including subtypes; use
    /// the registry to upcast a child target to its parent's value.
    pub fn downcast<T: TargetValue>(&self, id: TargetTypeId<T>) -> Option<&T> {
        if id.index != self.type_index {
            return None;
        }
        self.value.as_any().downcast_ref::<T>()
    }

    /// Stable 64-bit hash of the type and value.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = FxHasher::default();
        self.hash(&mut hasher);
        hasher.finish()
    }

    pub(crate) fn value(&self) -> &dyn AnyTarget {
        &*self.value
    }
}

impl PartialEq for Target {
    fn eq(&self, other: &Self) -> bool {
        self.type_index == other.type_index && self.value.dyn_eq(&*other.value)
    }
}

impl Eq for Target {}

impl Hash for Target {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_index.hash(state);
        self.value.dyn_hash(state);
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("type_index", &self.type_index)
            .field("value", &self.value)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Definitions
// ---------------------------------------------------------------------------

type ResolveFn<G, T> =
    Box<dyn Fn(&<G as Game>::World, &<G as Game>::Hit) -> Option<T> + Send + Sync>;
type EncodeFn<T> = Box<dyn Fn(&T, &mut WireWriter) -> Result<(), WireError> + Send + Sync>;
type DecodeFn<G, T> = Box<
    dyn Fn(&DecodeContext<'_, G>, &mut WireReader<'_>) -> Result<Option<T>, WireError>
        + Send
        + Sync,
>;
type UpcastFn<T> = Box<dyn Fn(&T) -> Arc<dyn AnyTarget> + Send + Sync>;

struct ParentLink<T> {
    index: u32,
    upcast: UpcastFn<T>,
}

/// Descriptor of one class of targets (block, fluid, entity, player, ...).
pub struct TargetTypeDef<G: Game, T> {
    name: String,
    priority: i32,
    parent: Option<ParentLink<T>>,
    resolve: ResolveFn<G, T>,
    encode: EncodeFn<T>,
    decode: DecodeFn<G, T>,
}

impl<G: Game, T: TargetValue> TargetTypeDef<G, T> {
    /// Describe a target type.
    ///
    /// * `resolve` classifies a raw hit; it must be free of side effects.
    /// * `encode` / `decode` form the wire codec for the value. `decode` may
    ///   return `Ok(None)` when the value no longer exists on the receiving
    ///   side (e.g. the entity despawned).
    pub fn new<R, E, D>(
        name: impl Into<String>,
        priority: i32,
        resolve: R,
        encode: E,
        decode: D,
    ) -> Self
    where
        R: Fn(&G::World, &G::Hit) -> Option<T> + Send + Sync + 'static,
        E: Fn(&T, &mut WireWriter) -> Result<(), WireError> + Send + Sync + 'static,
        D: Fn(&DecodeContext<'_, G>, &mut WireReader<'_>) -> Result<Option<T>, WireError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            priority,
            parent: None,
            resolve: Box::new(resolve),
            encode: Box::new(encode),
            decode: Box::new(decode),
        }
    }

    /// Declare `parent` as the more general type; `upcast` converts a value of
    /// this type into the parent's value.
    ///
    /// The parent's priority must be strictly lower, which the registry checks.
    pub fn with_parent<P, U>(mut self, parent: TargetTypeId<P>, upcast: U) -> Self
    where
        P: TargetValue,
        U: Fn(&T) -> P + Send + Sync + 'static,
    {
        self.parent = Some(ParentLink {
            index: parent.index,
            upcast: Box::new(move |value| Arc::new(upcast(value))),
        });
        self
    }

    /// Registry name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolution priority.
    pub fn priority(&self) -> i32 {
        self.priority
    }
}

/// Object-safe view of a [`TargetTypeDef`] used by the registry.
pub(crate) trait ErasedTargetType<G: Game>: Send + Sync {
    fn name(&self) -> &str;
    fn priority(&self) -> i32;
    fn parent(&self) -> Option<u32>;
    fn resolve(&self, world: &G::World, hit: &G::Hit) -> Option<Arc<dyn AnyTarget>>;
    /// `None` if `value` is not of this type.
    fn encode(&self, value: &dyn AnyTarget, out: &mut WireWriter)
    -> Option<Result<(), WireError>>;
    fn decode(
        &self,
        ctx: &DecodeContext<'_, G>,
        input: &mut WireReader<'_>,
    ) -> Result<Option<Arc<dyn AnyTarget>>, WireError>;
    fn upcast(&self, value: &dyn AnyTarget) -> Option<Arc<dyn AnyTarget>>;
}

impl<G: Game, T: TargetValue> ErasedTargetType<G> for TargetTypeDef<G, T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn parent(&self) -> Option<u32> {
        self.parent.as_ref().map(|link| link.index)
    }

    fn resolve(&self, world: &G::World, hit: &G::Hit) -> Option<Arc<dyn AnyTarget>> {
        (self.resolve)(world, hit).map(|value| Arc::new(value) as Arc<dyn AnyTarget>)
    }

    fn encode(
        &self,
        value: &dyn AnyTarget,
        out: &mut WireWriter,
    ) -> Option<Result<(), WireError>> {
        let value = value.as_any().downcast_ref::<T>()?;
        Some((self.encode)(value, out))
    }

    fn decode(
        &self,
        ctx: &DecodeContext<'_, G>,
        input: &mut WireReader<'_>,
    ) -> Result<Option<Arc<dyn AnyTarget>>, WireError> {
        Ok((self.decode)(ctx, input)?.map(|value| Arc::new(value) as Arc<dyn AnyTarget>))
    }

    fn upcast(&self, value: &dyn AnyTarget) -> Option<Arc<dyn AnyTarget>> {
        let link = self.parent.as_ref()?;
        let value = value.as_any().downcast_ref::<T>()?;
        Some((link.upcast)(value))
    }
}
