//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Look-at demo command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug)]
#[command(name = "lookat", about = "Look-at information server and client")]
pub struct CliArgs {
    /// Ticks between answered requests for an unchanged target.
    #[arg(long)]
    pub update_delay: Option<u64>,

    /// Make fluids targetable.
    #[arg(long)]
    pub include_fluids: Option<bool>,

    /// Disable a provider by name. Repeatable.
    #[arg(long = "disable", value_name = "PROVIDER")]
    pub disable: Vec<String>,

    /// Server address.
    #[arg(long)]
    pub server: Option<String>,

    /// Server port.
    #[arg(long)]
    pub port: Option<u16>,

    /// Number of ticks to simulate before exiting.
    #[arg(long, default_value_t = 200)]
    pub ticks: u64,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    ///
    /// `--disable` adds to the configured disabled set.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(delay) = args.update_delay {
            self.general.update_delay_ticks = delay;
        }
        if let Some(fluids) = args.include_fluids {
            self.general.include_fluids = fluids;
        }
        self.providers.disabled.extend(args.disable.iter().cloned());
        if let Some(ref addr) = args.server {
            self.network.server_address = addr.clone();
        }
        if let Some(port) = args.port {
            self.network.server_port = port;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs::parse_from([
            "lookat",
            "--update-delay",
            "4",
            "--server",
            "192.168.1.1",
            "--disable",
            "lookat:block_hardness",
            "--disable",
            "lookat:player_ping",
        ]);
        config.apply_cli_overrides(&args);
        assert_eq!(config.general.update_delay_ticks, 4);
        assert_eq!(config.network.server_address, "192.168.1.1");
        assert_eq!(config.providers.disabled.len(), 2);
        // Non-overridden fields retain defaults
        assert_eq!(config.network.server_port, 7777);
        assert!(!config.general.include_fluids);
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        config.apply_cli_overrides(&CliArgs::parse_from(["lookat"]));
        assert_eq!(config, original);
    }

    #[test]
    fn test_default_tick_count() {
        assert_eq!(CliArgs::parse_from(["lookat"]).ticks, 200);
    }
}
