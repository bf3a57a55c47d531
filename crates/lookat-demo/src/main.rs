//! Look-at demo: runs a loopback server and client over the demo world and
//! logs what the client learns about each thing it looks at.
//!
//! Run with: `cargo run -p lookat-demo -- --ticks 400 --include-fluids true`

use clap::Parser;
use lookat_config::{CliArgs, Config, default_config_dir};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    let config_dir = match args.config.clone() {
        Some(dir) => dir,
        None => match default_config_dir() {
            Ok(dir) => dir,
            Err(e) => {
                eprintln!("lookat-demo: {e}");
                std::process::exit(1);
            }
        },
    };

    let mut config = match Config::load_or_create(&config_dir) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("lookat-demo: {e}");
            std::process::exit(1);
        }
    };
    config.apply_cli_overrides(&args);

    lookat_log::init_logging(
        Some(&config_dir.join("logs")),
        cfg!(debug_assertions),
        Some(&config),
    );

    info!(
        "Look-at demo: {} ticks at {} Hz, update delay {} ticks, fluids {}",
        args.ticks,
        config.network.tick_rate_hz,
        config.general.update_delay_ticks,
        if config.general.include_fluids { "on" } else { "off" },
    );

    match lookat_demo::run_session(&config, Some(&config_dir), args.ticks).await {
        Ok(report) => info!(
            "Done: {} requests, {} replies accepted, {} providers seen",
            report.requests_sent,
            report.replies_accepted,
            report.providers_seen.len(),
        ),
        Err(e) => {
            error!("Session failed: {e}");
            std::process::exit(1);
        }
    }
}
