//! Per-batch outcomes and the handler response contract.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use meshport_core::error::JobError;
use meshport_core::types::ConversionResult;

/// Result of one delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordStatus {
    /// The pipeline ran to completion.
    Succeeded {
        /// What was produced.
        result: ConversionResult,
    },
    /// The job was abandoned.
    Failed {
        /// Machine-readable error code.
        code: String,
        /// Error description.
        error: String,
        /// Whether retrying can never succeed.
        permanent: bool,
    },
}

/// Outcome of one delivery in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordOutcome {
    /// Position within the batch.
    pub index: usize,
    /// Object key of the record.
    pub key: String,
    /// What happened.
    #[serde(flatten)]
    pub status: RecordStatus,
}

impl RecordOutcome {
    /// Successful outcome.
    pub fn succeeded(index: usize, key: impl Into<String>, result: ConversionResult) -> Self {
        Self {
            index,
            key: key.into(),
            status: RecordStatus::Succeeded { result },
        }
    }

    /// Failed outcome.
    pub fn failed(index: usize, key: impl Into<String>, error: &JobError) -> Self {
        Self {
            index,
            key: key.into(),
            status: RecordStatus::Failed {
                code: error.code().to_string(),
                error: error.to_string(),
                permanent: error.is_permanent(),
            },
        }
    }

    /// Whether the record succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self.status, RecordStatus::Succeeded { .. })
    }
}

/// All outcomes of one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Outcomes in delivery order.
    pub outcomes: Vec<RecordOutcome>,
}

impl BatchReport {
    /// Records processed.
    pub fn processed(&self) -> usize {
        self.outcomes.len()
    }

    /// Records that succeeded.
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    /// Records that failed.
    pub fn failed(&self) -> usize {
        self.processed() - self.succeeded()
    }

    /// Whether every record succeeded. An empty batch counts as success.
    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }

    /// Build the handler response: 200 when every record succeeded, 500
    /// otherwise.
    pub fn to_response(&self) -> HandlerResponse {
        let failures: Vec<FailureEntry> = self
            .outcomes
            .iter()
            .filter_map(|o| match &o.status {
                RecordStatus::Failed {
                    error, permanent, ..
                } => Some(FailureEntry {
                    index: o.index,
                    key: o.key.clone(),
                    error: error.clone(),
                    permanent: *permanent,
                }),
                RecordStatus::Succeeded { .. } => None,
            })
            .collect();

        let (status_code, message) = if failures.is_empty() {
            (200, "All records converted")
        } else {
            (500, "One or more records failed")
        };

        let body = ResponseBody {
            message: message.to_string(),
            processed: self.processed(),
            succeeded: self.succeeded(),
            failed: failures.len(),
            failures,
        };

        HandlerResponse {
            status_code,
            headers: BTreeMap::from([(
                "Content-Type".to_string(),
                "application/json".to_string(),
            )]),
            // Serializing plain strings and integers cannot fail.
            body: serde_json::to_string(&body).unwrap_or_default(),
            is_base64_encoded: false,
        }
    }
}

/// HTTP-shaped handler result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerResponse {
    /// 200 or 500.
    pub status_code: u16,
    /// Response headers.
    pub headers: BTreeMap<String, String>,
    /// JSON-encoded [`ResponseBody`].
    pub body: String,
    /// Always `false`.
    pub is_base64_encoded: bool,
}

/// Decoded handler response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseBody {
    /// Summary line.
    pub message: String,
    /// Records processed.
    pub processed: usize,
    /// Records that succeeded.
    pub succeeded: usize,
    /// Records that failed.
    pub failed: usize,
    /// One entry per failed record.
    pub failures: Vec<FailureEntry>,
}

/// A failed record in the response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureEntry {
    /// Position within the batch.
    pub index: usize,
    /// Object key.
    pub key: String,
    /// Error description.
    pub error: String,
    /// Whether the failure is permanent.
    pub permanent: bool,
}
