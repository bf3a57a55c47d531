//! Cached list of applicable providers per target type.

use rustc_hash::FxHashSet;

use crate::game::Game;
use crate::registry::{Registry, RegistryError};

/// Materialised provider ordering for one disabled set.
///
/// For every `(target type, alt mode)` pair this holds the enabled providers
/// scoped to the type or any of its ancestors, sorted by ascending priority
/// and then registration order. Rebuild it whenever the disabled set changes.
#[derive(Debug, Clone, Default)]
pub struct ProviderView {
    /// Indexed by target type; `[normal, alt_mode]`.
    lists: Vec<[Vec<u32>; 2]>,
    disabled: FxHashSet<u32>,
}

impl ProviderView {
    /// Build the view for a frozen registry.
    ///
    /// Names in `disabled` that match no provider are logged and ignored.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFrozen`] if registration is still open.
    pub fn new<G, I, S>(registry: &Registry<G>, disabled: I) -> Result<Self, RegistryError>
    where
        G: Game,
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if !registry.is_frozen() {
            return Err(RegistryError::NotFrozen);
        }

        let mut disabled_set = FxHashSet::default();
        for name in disabled {
            let name = name.as_ref();
            match registry.provider_index(name) {
                Some(index) => {
                    disabled_set.insert(index);
                }
                None => tracing::warn!(provider = name, "cannot disable unknown provider"),
            }
        }

        let mut lists = Vec::with_capacity(registry.target_type_count());
        for type_index in 0..registry.target_type_count() as u32 {
            let lineage: Vec<u32> = registry.lineage(type_index).collect();
            let mut normal = Vec::new();
            let mut alt = Vec::new();
            for (index, provider) in registry.providers() {
                if disabled_set.contains(&index) || !lineage.contains(&provider.target_type()) {
                    continue;
                }
                alt.push((provider.priority(), index));
                if !provider.alt_mode_only() {
                    normal.push((provider.priority(), index));
                }
            }
            // Stable sort keeps registration order among equal priorities.
            normal.sort_by_key(|&(priority, _)| priority);
            alt.sort_by_key(|&(priority, _)| priority);
            lists.push([
                normal.into_iter().map(|(_, index)| index).collect(),
                alt.into_iter().map(|(_, index)| index).collect(),
            ]);
        }

        tracing::debug!(
            target_types = lists.len(),
            disabled = disabled_set.len(),
            "materialised provider view"
        );
        Ok(Self {
            lists,
            disabled: disabled_set,
        })
    }

    /// Providers applicable to a target of type `type_index`, in display
    /// order. Empty for unknown types.
    pub fn applicable(&self, type_index: u32, alt_mode: bool) -> &[u32] {
        self.lists
            .get(type_index as usize)
            .map(|lists| lists[usize::from(alt_mode)].as_slice())
            .unwrap_or(&[])
    }

    /// Whether the provider at `index` is administratively disabled.
    pub fn is_disabled(&self, index: u32) -> bool {
        self.disabled.contains(&index)
    }

    /// Number of providers disabled in this view.
    pub fn disabled_count(&self) -> usize {
        self.disabled.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::*;

    fn names(fx: &Fixture, indices: &[u32]) -> Vec<String> {
        indices
            .iter()
            .map(|&i| fx.registry.provider_name(i).unwrap_or("?").to_string())
            .collect()
    }

    #[test]
    fn test_unfrozen_registry_is_rejected() {
        let registry = Registry::<TestGame>::new();
        let result = ProviderView::new(&registry, std::iter::empty::<&str>());
        assert!(matches!(result, Err(RegistryError::NotFrozen)));
    }

    #[test]
    fn test_block_providers_sorted_by_priority() {
        let fx = fixture();
        let view = ProviderView::new(&fx.registry, std::iter::empty::<&str>()).unwrap();
        assert_eq!(
            names(&fx, view.applicable(fx.block.index(), false)),
            vec!["test:name", "test:hardness", "test:inventory"]
        );
    }

    #[test]
    fn test_alt_mode_adds_alt_only_providers() {
        let fx = fixture();
        let view = ProviderView::new(&fx.registry, std::iter::empty::<&str>()).unwrap();
        assert_eq!(
            names(&fx, view.applicable(fx.block.index(), true)),
            vec!["test:name", "test:hardness", "test:inventory", "test:position"]
        );
    }

    #[test]
    fn test_child_type_inherits_parent_providers() {
        let fx = fixture();
        let view = ProviderView::new(&fx.registry, std::iter::empty::<&str>()).unwrap();
        assert_eq!(
            names(&fx, view.applicable(fx.player.index(), false)),
            vec!["test:health", "test:ping"]
        );
        assert_eq!(
            names(&fx, view.applicable(fx.entity.index(), false)),
            vec!["test:health"]
        );
    }

    #[test]
    fn test_disabled_provider_is_removed() {
        let fx = fixture();
        let view = ProviderView::new(&fx.registry, ["test:hardness", "test:missing"]).unwrap();
        assert_eq!(view.disabled_count(), 1);
        assert!(view.is_disabled(fx.hardness.index()));
        assert_eq!(
            names(&fx, view.applicable(fx.block.index(), false)),
            vec!["test:name", "test:inventory"]
        );
    }

    #[test]
    fn test_unknown_type_has_no_providers() {
        let fx = fixture();
        let view = ProviderView::new(&fx.registry, std::iter::empty::<&str>()).unwrap();
        assert!(view.applicable(99, false).is_empty());
    }
}
