//! Pipeline metrics.
//!
//! Tracks job counts, stage timeouts, transferred bytes and job durations.
//! Thread-safe via atomics for counters and a mutex for duration samples.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Maximum number of duration samples to keep in memory.
const MAX_DURATION_SAMPLES: usize = 1000;

/// Pipeline metrics collector.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    jobs_started: AtomicU64,
    jobs_succeeded: AtomicU64,
    jobs_failed: AtomicU64,
    jobs_failed_permanently: AtomicU64,
    stage_timeouts: AtomicU64,
    bytes_downloaded: AtomicU64,
    bytes_uploaded: AtomicU64,
    duration_samples: Mutex<VecDeque<Duration>>,
}

impl PipelineMetrics {
    /// Create a new empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a job start.
    pub fn record_started(&self) {
        self.jobs_started.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful job and its duration.
    pub fn record_success(&self, duration: Duration) {
        self.jobs_succeeded.fetch_add(1, Ordering::Relaxed);
        self.add_duration_sample(duration);
    }

    /// Record a failed job.
    pub fn record_failure(&self, permanent: bool) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
        if permanent {
            self.jobs_failed_permanently.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a stage that hit its timeout.
    pub fn record_stage_timeout(&self) {
        self.stage_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Record bytes fetched from storage.
    pub fn record_download(&self, bytes: u64) {
        self.bytes_downloaded.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record bytes pushed to storage.
    pub fn record_upload(&self, bytes: u64) {
        self.bytes_uploaded.fetch_add(bytes, Ordering::Relaxed);
    }

    fn add_duration_sample(&self, duration: Duration) {
        if let Ok(mut samples) = self.duration_samples.lock() {
            if samples.len() >= MAX_DURATION_SAMPLES {
                samples.pop_front();
            }
            samples.push_back(duration);
        }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut durations: Vec<Duration> = self
            .duration_samples
            .lock()
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();
        durations.sort();

        let percentile = |p: usize| -> Option<u64> {
            if durations.is_empty() {
                return None;
            }
            let idx = ((durations.len() - 1) * p) / 100;
            durations.get(idx).map(|d| d.as_millis() as u64)
        };

        MetricsSnapshot {
            jobs_started: self.jobs_started.load(Ordering::Relaxed),
            jobs_succeeded: self.jobs_succeeded.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            jobs_failed_permanently: self.jobs_failed_permanently.load(Ordering::Relaxed),
            stage_timeouts: self.stage_timeouts.load(Ordering::Relaxed),
            bytes_downloaded: self.bytes_downloaded.load(Ordering::Relaxed),
            bytes_uploaded: self.bytes_uploaded.load(Ordering::Relaxed),
            duration_p50_ms: percentile(50),
            duration_p95_ms: percentile(95),
            duration_p99_ms: percentile(99),
            sample_count: durations.len() as u64,
        }
    }
}

/// A point-in-time snapshot of pipeline metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Jobs that entered the pipeline.
    pub jobs_started: u64,
    /// Jobs that completed fully.
    pub jobs_succeeded: u64,
    /// Jobs that failed (any cause).
    pub jobs_failed: u64,
    /// Failed jobs whose failure is permanent.
    pub jobs_failed_permanently: u64,
    /// Stage executions killed by the timeout.
    pub stage_timeouts: u64,
    /// Bytes fetched from storage.
    pub bytes_downloaded: u64,
    /// Bytes pushed to storage.
    pub bytes_uploaded: u64,
    /// P50 job duration in milliseconds.
    pub duration_p50_ms: Option<u64>,
    /// P95 job duration in milliseconds.
    pub duration_p95_ms: Option<u64>,
    /// P99 job duration in milliseconds.
    pub duration_p99_ms: Option<u64>,
    /// Number of duration samples collected.
    pub sample_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counting() {
        let m = PipelineMetrics::new();
        m.record_started();
        m.record_started();
        m.record_started();
        m.record_success(Duration::from_secs(5));
        m.record_failure(false);
        m.record_failure(true);
        m.record_download(2048);
        m.record_upload(512);

        let snap = m.snapshot();
        assert_eq!(snap.jobs_started, 3);
        assert_eq!(snap.jobs_succeeded, 1);
        assert_eq!(snap.jobs_failed, 2);
        assert_eq!(snap.jobs_failed_permanently, 1);
        assert_eq!(snap.bytes_downloaded, 2048);
        assert_eq!(snap.bytes_uploaded, 512);
    }

    #[test]
    fn test_percentiles() {
        let m = PipelineMetrics::new();
        for i in 1..=100 {
            m.record_success(Duration::from_millis(i * 10));
        }
        let snap = m.snapshot();
        assert_eq!(snap.duration_p50_ms, Some(500));
        assert_eq!(snap.duration_p99_ms, Some(990));
        assert!(snap.duration_p95_ms > snap.duration_p50_ms);
        assert_eq!(snap.sample_count, 100);
    }

    #[test]
    fn test_empty_percentiles() {
        let snap = PipelineMetrics::new().snapshot();
        assert_eq!(snap.duration_p50_ms, None);
        assert_eq!(snap.sample_count, 0);
    }

    #[test]
    fn test_samples_bounded() {
        let m = PipelineMetrics::new();
        for _ in 0..(MAX_DURATION_SAMPLES + 10) {
            m.record_success(Duration::from_millis(1));
        }
        assert_eq!(m.snapshot().sample_count, MAX_DURATION_SAMPLES as u64);
    }
}
