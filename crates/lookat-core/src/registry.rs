//! Registry of target types and information providers.
//!
//! Built once at startup and frozen before any request is processed.
//! Registration order defines the wire indices, so both peers must register
//! the same content in the same order; [`Registry::digest`] lets them check.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHasher};
use thiserror::Error;

use crate::game::{DecodeContext, Game};
use crate::provider::{AnyValue, ErasedProvider, InformationProvider, ProviderId, ProviderValue};
use crate::target::{ErasedTargetType, Target, TargetTypeDef, TargetTypeId, TargetValue};
use crate::wire::{WireError, WireReader, WireWriter};

/// Errors raised by registration and view construction.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Registration attempted after [`Registry::freeze`].
    #[error("registry is frozen, cannot register {0}")]
    Frozen(String),
    /// The registry has not been frozen yet.
    #[error("registry must be frozen before it can serve requests")]
    NotFrozen,
    /// A target type with the same name exists.
    #[error("duplicate target type name: {0}")]
    DuplicateTargetType(String),
    /// A provider with the same name exists.
    #[error("duplicate provider name: {0}")]
    DuplicateProvider(String),
    /// A target type's priority does not exceed its parent's.
    #[error(
        "target type {name} has priority {priority}, which must exceed parent {parent}'s priority {parent_priority}"
    )]
    ParentPriority {
        /// The offending type.
        name: String,
        /// Its priority.
        priority: i32,
        /// The declared parent.
        parent: String,
        /// The parent's priority.
        parent_priority: i32,
    },
    /// A handle that does not belong to this registry.
    #[error("unknown target type index {0}")]
    UnknownTargetType(u32),
}

/// Owns every target type and provider for the lifetime of the process.
pub struct Registry<G: Game> {
    target_types: Vec<Box<dyn ErasedTargetType<G>>>,
    target_names: FxHashMap<String, u32>,
    providers: Vec<Box<dyn ErasedProvider<G>>>,
    provider_names: FxHashMap<String, u32>,
    digest: u64,
    frozen: bool,
}

impl<G: Game> Registry<G> {
    /// Create an empty, unfrozen registry.
    pub fn new() -> Self {
        Self {
            target_types: Vec::new(),
            target_names: FxHashMap::default(),
            providers: Vec::new(),
            provider_names: FxHashMap::default(),
            digest: 0,
            frozen: false,
        }
    }

    // -- registration -------------------------------------------------------

    /// Register a target type and return its handle.
    ///
    /// # Errors
    ///
    /// Fails if the registry is frozen, the name is taken, the parent is
    /// unknown, or the parent's priority is not strictly lower.
    pub fn register_target_type<T: TargetValue>(
        &mut self,
        def: TargetTypeDef<G, T>,
    ) -> Result<TargetTypeId<T>, RegistryError> {
        if self.frozen {
            return Err(RegistryError::Frozen(def.name().to_string()));
        }
        if self.target_names.contains_key(def.name()) {
            return Err(RegistryError::DuplicateTargetType(def.name().to_string()));
        }
        if let Some(parent_index) = ErasedTargetType::parent(&def) {
            let parent = self
                .target_types
                .get(parent_index as usize)
                .ok_or(RegistryError::UnknownTargetType(parent_index))?;
            if parent.priority() >= def.priority() {
                return Err(RegistryError::ParentPriority {
                    name: def.name().to_string(),
                    priority: def.priority(),
                    parent: parent.name().to_string(),
                    parent_priority: parent.priority(),
                });
            }
        }

        let index = self.target_types.len() as u32;
        tracing::debug!(name = def.name(), index, priority = def.priority(), "registered target type");
        self.target_names.insert(def.name().to_string(), index);
        self.target_types.push(Box::new(def));
        Ok(TargetTypeId::new(index))
    }

    /// Register a provider and return its handle.
    ///
    /// # Errors
    ///
    /// Fails if the registry is frozen, the name is taken, or the provider's
    /// target type does not belong to this registry.
    pub fn register_provider<K: TargetValue, V: ProviderValue>(
        &mut self,
        provider: InformationProvider<G, K, V>,
    ) -> Result<ProviderId<V>, RegistryError> {
        if self.frozen {
            return Err(RegistryError::Frozen(provider.name().to_string()));
        }
        if self.provider_names.contains_key(provider.name()) {
            return Err(RegistryError::DuplicateProvider(provider.name().to_string()));
        }
        let target_type = ErasedProvider::target_type(&provider);
        if target_type as usize >= self.target_types.len() {
            return Err(RegistryError::UnknownTargetType(target_type));
        }

        let index = self.providers.len() as u32;
        tracing::debug!(name = provider.name(), index, target_type, "registered provider");
        self.provider_names.insert(provider.name().to_string(), index);
        self.providers.push(Box::new(provider));
        Ok(ProviderId::new(index))
    }

    /// End registration. Idempotent.
    pub fn freeze(&mut self) {
        if self.frozen {
            return;
        }
        let mut hasher = FxHasher::default();
        self.target_types.len().hash(&mut hasher);
        for ty in &self.target_types {
            ty.name().hash(&mut hasher);
            ty.priority().hash(&mut hasher);
            ty.parent().hash(&mut hasher);
        }
        self.providers.len().hash(&mut hasher);
        for provider in &self.providers {
            provider.name().hash(&mut hasher);
            provider.target_type().hash(&mut hasher);
        }
        self.digest = hasher.finish();
        self.frozen = true;
        tracing::info!(
            target_types = self.target_types.len(),
            providers = self.providers.len(),
            digest = format_args!("{:016x}", self.digest),
            "registry frozen"
        );
    }

    /// Freeze and wrap in an [`Arc`] for sharing with dispatchers.
    pub fn into_shared(mut self) -> Arc<Self> {
        self.freeze();
        Arc::new(self)
    }

    /// Whether [`Registry::freeze`] has been called.
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Fingerprint of the registration order. Zero until frozen.
    pub fn digest(&self) -> u64 {
        self.digest
    }

    // -- lookups ------------------------------------------------------------

    /// Number of registered target types.
    pub fn target_type_count(&self) -> usize {
        self.target_types.len()
    }

    /// Number of registered providers.
    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Name of the target type at `index`.
    pub fn target_type_name(&self, index: u32) -> Option<&str> {
        self.target_types.get(index as usize).map(|ty| ty.name())
    }

    /// Index of the provider called `name`.
    pub fn provider_index(&self, name: &str) -> Option<u32> {
        self.provider_names.get(name).copied()
    }

    /// Name of the provider at `index`.
    pub fn provider_name(&self, index: u32) -> Option<&str> {
        self.providers.get(index as usize).map(|p| p.name())
    }

    pub(crate) fn provider(&self, index: u32) -> Option<&dyn ErasedProvider<G>> {
        self.providers.get(index as usize).map(|p| p.as_ref())
    }

    pub(crate) fn providers(&self) -> impl Iterator<Item = (u32, &dyn ErasedProvider<G>)> {
        self.providers
            .iter()
            .enumerate()
            .map(|(index, p)| (index as u32, p.as_ref()))
    }

    /// `index` followed by its ancestors, most specific first.
    pub fn lineage(&self, index: u32) -> impl Iterator<Item = u32> + '_ {
        std::iter::successors(Some(index), move |&current| {
            self.target_types
                .get(current as usize)
                .and_then(|ty| ty.parent())
        })
        .take_while(move |&i| (i as usize) < self.target_types.len())
    }

    // -- resolution ---------------------------------------------------------

    /// Classify a raw hit into the most specific target.
    ///
    /// Every target type is evaluated; the match with the highest priority
    /// wins and ties go to the earliest registered type.
    pub fn resolve(&self, world: &G::World, hit: &G::Hit) -> Option<Target> {
        let mut best: Option<(i32, u32, _)> = None;
        for (index, ty) in self.target_types.iter().enumerate() {
            let Some(value) = ty.resolve(world, hit) else {
                continue;
            };
            if best
                .as_ref()
                .is_none_or(|(priority, ..)| ty.priority() > *priority)
            {
                best = Some((ty.priority(), index as u32, value));
            }
        }
        best.map(|(_, index, value)| Target::from_erased(index, value))
    }

    /// Convert `target` into the value of its ancestor type `ancestor`.
    ///
    /// Returns the target unchanged when it already has that type and `None`
    /// when `ancestor` is not in its lineage.
    pub fn upcast(&self, target: &Target, ancestor: u32) -> Option<Target> {
        let mut current = target.clone();
        while current.type_index() != ancestor {
            let ty = self.target_types.get(current.type_index() as usize)?;
            let parent = ty.parent()?;
            let value = ty.upcast(current.value())?;
            current = Target::from_erased(parent, value);
        }
        Some(current)
    }

    // -- wire ---------------------------------------------------------------

    /// Encode a target as `[type index: varint][type payload]`.
    pub fn encode_target(&self, target: &Target) -> Result<Vec<u8>, WireError> {
        let ty = self
            .target_types
            .get(target.type_index() as usize)
            .ok_or(WireError::UnknownTargetType(target.type_index()))?;
        let mut out = WireWriter::new();
        out.write_varint(target.type_index())?;
        ty.encode(target.value(), &mut out)
            .ok_or(WireError::TypeMismatch(target.type_index()))??;
        Ok(out.into_bytes())
    }

    /// Decode a target descriptor produced by [`Registry::encode_target`].
    ///
    /// `Ok(None)` means the descriptor was well formed but names something
    /// that does not exist on this side.
    pub fn decode_target(
        &self,
        ctx: &DecodeContext<'_, G>,
        bytes: &[u8],
    ) -> Result<Option<Target>, WireError> {
        let mut input = WireReader::new(bytes);
        let index = input.read_varint()?;
        let ty = self
            .target_types
            .get(index as usize)
            .ok_or(WireError::UnknownTargetType(index))?;
        let value = ty.decode(ctx, &mut input)?;
        input.finish()?;
        Ok(value.map(|value| Target::from_erased(index, value)))
    }

    /// Append `[provider index][value]` for one computed value.
    pub(crate) fn encode_entry(
        &self,
        index: u32,
        value: &dyn AnyValue,
        out: &mut WireWriter,
    ) -> Result<(), WireError> {
        let provider = self
            .provider(index)
            .ok_or(WireError::UnknownProvider(index))?;
        out.write_varint(index)?;
        provider
            .encode(value, out)
            .ok_or(WireError::TypeMismatch(index))?
    }

    /// Decode a results payload. Any out-of-range index fails the whole
    /// payload.
    pub(crate) fn decode_results(
        &self,
        bytes: &[u8],
    ) -> Result<Vec<(u32, Box<dyn AnyValue>)>, WireError> {
        let mut input = WireReader::new(bytes);
        let count = input.read_varint()?;
        let mut entries = Vec::with_capacity((count as usize).min(self.providers.len()));
        for _ in 0..count {
            let index = input.read_varint()?;
            let provider = self
                .provider(index)
                .ok_or(WireError::UnknownProvider(index))?;
            entries.push((index, provider.decode(&mut input)?));
        }
        input.finish()?;
        Ok(entries)
    }
}

impl<G: Game> Default for Registry<G> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G: Game> fmt::Debug for Registry<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("target_types", &self.target_types.len())
            .field("providers", &self.providers.len())
            .field("frozen", &self.frozen)
            .field("digest", &format_args!("{:016x}", self.digest))
            .finish()
    }
}
