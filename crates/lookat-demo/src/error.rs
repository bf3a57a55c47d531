use lookat_config::ConfigError;
use lookat_core::RegistryError;
use lookat_net::NetError;

/// Errors that end a demo session.
#[derive(Debug, thiserror::Error)]
pub enum DemoError {
    /// Building the registry or a dispatcher failed.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Connecting or talking to the server failed.
    #[error("network error: {0}")]
    Net(#[from] NetError),

    /// Reading the config directory failed.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Binding the listener failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
