//! Meshport: converts uploaded STEP files into web-ready meshes.
//!
//! Main entry point: parses the CLI, loads and validates configuration,
//! initializes logging, and dispatches to the selected deployment shape.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use meshport_core::config::AppConfig;

mod commands;

use commands::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // ── Step 1: Load and validate configuration ─────────────────
    let config = match cli.load_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    // ── Step 2: Logging ─────────────────────────────────────────
    init_logging(&config);

    // ── Step 3: Run the selected command ────────────────────────
    match cli.execute(config).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Meshport failed");
            ExitCode::FAILURE
        }
    }
}

/// Initialize tracing. Output goes to stderr so `handle` can print its
/// response on stdout.
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_writer(std::io::stderr)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}
