//! Demo content for the look-at core: an in-memory world, the built-in target
//! types and providers, and a loopback session that runs a server and a
//! client over TCP.

pub mod error;
pub mod game;
pub mod providers;
pub mod scene;
pub mod session;
pub mod targets;
pub mod world;

use std::sync::Arc;

use lookat_core::{Registry, RegistryError};

pub use error::DemoError;
pub use game::Demo;
pub use providers::{Harvestability, Providers, register_providers};
pub use session::{SessionReport, run_session};
pub use targets::{TargetTypes, register_target_types};

/// A frozen registry with the built-in content and handles into it.
#[derive(Debug, Clone)]
pub struct Content {
    pub registry: Arc<Registry<Demo>>,
    pub targets: TargetTypes,
    pub providers: Providers,
}

/// Register every built-in target type and provider and freeze the result.
pub fn build_registry(include_fluids: bool) -> Result<Content, RegistryError> {
    let mut registry = Registry::new();
    let targets = register_target_types(&mut registry, include_fluids)?;
    let providers = register_providers(&mut registry, &targets)?;
    Ok(Content {
        registry: registry.into_shared(),
        targets,
        providers,
    })
}
