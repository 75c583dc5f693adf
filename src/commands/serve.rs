//! `meshport serve`: push-event webhook.

use std::process::ExitCode;

use clap::Args;

use meshport_core::config::AppConfig;
use meshport_core::error::AppError;
use meshport_worker::ServerState;

/// Arguments for `serve`
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Port to listen on (overrides `server.port`)
    #[arg(short, long)]
    pub port: Option<u16>,
}

/// Serve until shutdown.
pub async fn execute(args: &ServeArgs, mut config: AppConfig) -> Result<ExitCode, AppError> {
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let runner = super::build_runner(&config).await?;
    let state = ServerState {
        runner,
        default_bucket: config.storage.bucket.clone(),
        layout: config.pipeline.key_layout,
    };

    meshport_worker::server::serve(state, &config.server, super::shutdown_channel()).await?;
    Ok(ExitCode::SUCCESS)
}
