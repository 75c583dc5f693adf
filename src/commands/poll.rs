//! `meshport poll`: long-poll deployment.

use std::process::ExitCode;
use std::sync::Arc;

use meshport_core::config::AppConfig;
use meshport_core::error::AppError;
use meshport_worker::QueueEventSource;
use meshport_worker::queue::SqsQueue;

/// Run the poll loop until shutdown.
pub async fn execute(config: &AppConfig) -> Result<ExitCode, AppError> {
    config.require_queue()?;
    let runner = super::build_runner(config).await?;

    let queue = SqsQueue::new(
        &config.queue.url,
        &config.queue.region,
        config.queue.endpoint.as_deref(),
    )
    .await?;

    let mut source = QueueEventSource::new(
        Arc::new(queue),
        config.queue.clone(),
        config.storage.bucket.clone(),
        config.pipeline.key_layout,
    );

    tracing::info!(
        queue_url = %config.queue.url,
        max_messages = config.queue.max_messages,
        wait_time_seconds = config.queue.wait_time_seconds,
        "Polling for upload events"
    );

    runner.run(&mut source, super::shutdown_channel()).await;
    Ok(ExitCode::SUCCESS)
}
