//! Configuration for the look-at server and client.
//!
//! Settings persist to disk as `config.ron`, can be hot-reloaded and are
//! overridden by command-line arguments.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    Config, DebugConfig, GeneralConfig, NetworkConfig, ProvidersConfig, default_config_dir,
};
pub use error::ConfigError;
