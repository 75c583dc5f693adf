//! CLI command definitions and dispatch.

pub mod config;
pub mod handle;
pub mod poll;
pub mod serve;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::watch;

use meshport_converter::{ConversionPipeline, StageRegistry};
use meshport_core::config::AppConfig;
use meshport_core::error::AppError;
use meshport_worker::JobRunner;

/// Meshport: STEP upload conversion pipeline
#[derive(Debug, Parser)]
#[command(name = "meshport", version, about, long_about = None)]
pub struct Cli {
    /// Path to a configuration file
    #[arg(short, long, env = "MESHPORT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Long-poll the queue and convert until interrupted
    Poll,
    /// Process one push-event payload and print the handler response
    Handle(handle::HandleArgs),
    /// Serve the push-event webhook
    Serve(serve::ServeArgs),
    /// Print the effective configuration
    Config,
}

impl Cli {
    /// Load and validate the configuration.
    pub fn load_config(&self) -> Result<AppConfig, AppError> {
        let config = AppConfig::load(self.config.as_deref())?;
        config.validate_all()?;
        Ok(config)
    }

    /// Execute the CLI command
    pub async fn execute(&self, config: AppConfig) -> Result<ExitCode, AppError> {
        match &self.command {
            Commands::Poll => poll::execute(&config).await,
            Commands::Handle(args) => handle::execute(args, &config).await,
            Commands::Serve(args) => serve::execute(args, config).await,
            Commands::Config => config::execute(&config),
        }
    }
}

/// Build the gateways, the stage registry, and the pipeline, once.
pub async fn build_runner(config: &AppConfig) -> Result<Arc<JobRunner>, AppError> {
    tracing::info!(
        storage = ?config.storage.provider,
        metadata = ?config.metadata.provider,
        "Initializing gateways"
    );
    let storage = meshport_storage::build_storage(&config.storage).await?;
    let metadata = meshport_metadata::build_metadata(&config.metadata).await?;

    let stages = StageRegistry::with_defaults(&config.converter);
    let pipeline = ConversionPipeline::from_config(config, &stages, storage, metadata)?;
    tracing::info!(
        chains = ?config.pipeline.chains,
        output_prefix = %config.pipeline.output_prefix,
        "Conversion pipeline ready"
    );

    Ok(Arc::new(JobRunner::new(
        Arc::new(pipeline),
        config.worker.clone(),
    )))
}

/// Watch channel flipped to `true` on Ctrl+C or SIGTERM.
pub fn shutdown_channel() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received");
        let _ = tx.send(true);
    });
    rx
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
