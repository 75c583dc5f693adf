//! Job runner: event source → pipeline → acknowledgment.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;
use tracing::{debug, error, info, warn};

use meshport_converter::ConversionPipeline;
use meshport_core::config::worker::WorkerConfig;
use meshport_core::error::JobError;
use meshport_core::result::AppResult;

use crate::report::{BatchReport, RecordOutcome};
use crate::source::{Delivery, EventSource};

/// Drives deliveries through the conversion pipeline, one at a time.
#[derive(Debug, Clone)]
pub struct JobRunner {
    pipeline: Arc<ConversionPipeline>,
    config: WorkerConfig,
}

impl JobRunner {
    /// Create a new runner.
    pub fn new(pipeline: Arc<ConversionPipeline>, config: WorkerConfig) -> Self {
        Self { pipeline, config }
    }

    /// The pipeline jobs run through.
    pub fn pipeline(&self) -> &ConversionPipeline {
        &self.pipeline
    }

    /// Process one batch sequentially.
    ///
    /// A failing delivery never aborts its siblings. Successful deliveries
    /// are acknowledged after the full pipeline completed; permanent
    /// failures are quarantined; transient failures are left for
    /// redelivery.
    pub async fn process_batch(&self, source: &dyn EventSource, batch: Vec<Delivery>) -> BatchReport {
        let mut report = BatchReport::default();
        for delivery in &batch {
            report.outcomes.push(self.process_delivery(source, delivery).await);
        }

        info!(
            source = source.name(),
            processed = report.processed(),
            succeeded = report.succeeded(),
            failed = report.failed(),
            "Batch complete"
        );
        report
    }

    async fn process_delivery(&self, source: &dyn EventSource, delivery: &Delivery) -> RecordOutcome {
        let job = match &delivery.job {
            Ok(job) => job,
            Err(err) => {
                let metrics = self.pipeline.metrics();
                metrics.record_started();
                metrics.record_failure(err.is_permanent());
                warn!(index = delivery.index, key = %delivery.key, error = %err, "Rejected delivery");
                self.settle_failure(source, delivery, err).await;
                return RecordOutcome::failed(delivery.index, &delivery.key, err);
            }
        };

        match self.pipeline.run(job).await {
            Ok(result) => {
                if let Err(e) = source.acknowledge(delivery).await {
                    error!(key = %delivery.key, error = %e, "Failed to acknowledge delivery; it will be redelivered");
                }
                RecordOutcome::succeeded(delivery.index, &delivery.key, result)
            }
            Err(err) => {
                error!(
                    index = delivery.index,
                    key = %delivery.key,
                    owner_id = %job.owner_id,
                    code = err.code(),
                    permanent = err.is_permanent(),
                    error = %err,
                    "Conversion job failed"
                );
                self.settle_failure(source, delivery, &err).await;
                RecordOutcome::failed(delivery.index, &delivery.key, &err)
            }
        }
    }

    async fn settle_failure(&self, source: &dyn EventSource, delivery: &Delivery, err: &JobError) {
        if !err.is_permanent() {
            debug!(key = %delivery.key, "Leaving delivery for redelivery");
            return;
        }
        match source.quarantine(delivery).await {
            Ok(true) => info!(key = %delivery.key, "Quarantined permanently failing delivery"),
            Ok(false) => {}
            Err(e) => error!(key = %delivery.key, error = %e, "Failed to quarantine delivery"),
        }
    }

    /// Receive and process a single batch. An exhausted source yields an
    /// empty report.
    pub async fn run_once(&self, source: &mut dyn EventSource) -> AppResult<BatchReport> {
        match source.receive().await? {
            Some(batch) => Ok(self.process_batch(&*source, batch).await),
            None => Ok(BatchReport::default()),
        }
    }

    /// Poll `source` until shutdown is signalled or the source is exhausted.
    ///
    /// Shutdown is honoured between batches; an in-flight batch always
    /// completes.
    pub async fn run(&self, source: &mut dyn EventSource, mut shutdown: watch::Receiver<bool>) {
        info!(source = source.name(), "Job runner started");
        let backoff = Duration::from_secs(self.config.error_backoff_seconds);

        loop {
            if *shutdown.borrow() {
                break;
            }

            let received = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Job runner received shutdown signal");
                        break;
                    }
                    continue;
                }
                received = source.receive() => received,
            };

            match received {
                Ok(Some(batch)) if batch.is_empty() => {}
                Ok(Some(batch)) => {
                    self.process_batch(&*source, batch).await;
                    self.log_metrics();
                }
                Ok(None) => {
                    info!("Event source exhausted");
                    break;
                }
                Err(e) => {
                    error!(error = %e, backoff_seconds = backoff.as_secs(), "Receive failed, backing off");
                    tokio::select! {
                        _ = shutdown.changed() => {}
                        _ = time::sleep(backoff) => {}
                    }
                }
            }
        }

        self.log_metrics();
        info!("Job runner stopped");
    }

    fn log_metrics(&self) {
        let s = self.pipeline.metrics().snapshot();
        info!(
            jobs_started = s.jobs_started,
            jobs_succeeded = s.jobs_succeeded,
            jobs_failed = s.jobs_failed,
            jobs_failed_permanently = s.jobs_failed_permanently,
            stage_timeouts = s.stage_timeouts,
            bytes_downloaded = s.bytes_downloaded,
            bytes_uploaded = s.bytes_uploaded,
            duration_p50_ms = ?s.duration_p50_ms,
            duration_p95_ms = ?s.duration_p95_ms,
            duration_p99_ms = ?s.duration_p99_ms,
            "Pipeline metrics"
        );
    }
}
