//! `meshport handle`: one push-event payload per invocation.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Args;
use tokio::io::AsyncReadExt;

use meshport_core::config::AppConfig;
use meshport_core::error::AppError;
use meshport_worker::PushEventSource;

/// Arguments for `handle`
#[derive(Debug, Args)]
pub struct HandleArgs {
    /// Event payload file, or `-` for stdin
    #[arg(short, long, default_value = "-")]
    pub event: PathBuf,
}

/// Process the payload and print the handler response. Exits non-zero
/// when any record failed.
pub async fn execute(args: &HandleArgs, config: &AppConfig) -> Result<ExitCode, AppError> {
    let payload = read_payload(&args.event).await?;
    let runner = super::build_runner(config).await?;

    let mut source = PushEventSource::from_json(
        &payload,
        &config.storage.bucket,
        config.pipeline.key_layout,
    );
    let report = runner.run_once(&mut source).await?;
    let response = report.to_response();

    println!("{}", serde_json::to_string_pretty(&response)?);

    Ok(if response.status_code == 200 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn read_payload(path: &Path) -> Result<String, AppError> {
    if path.as_os_str() == "-" {
        let mut payload = String::new();
        tokio::io::stdin().read_to_string(&mut payload).await?;
        return Ok(payload);
    }
    tokio::fs::read_to_string(path).await.map_err(|e| {
        AppError::validation(format!("Failed to read event file {}: {e}", path.display()))
    })
}
