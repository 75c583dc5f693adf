//! S3 event notification payloads.
//!
//! The same envelope arrives as an SQS message body (poll deployment) and
//! as a pushed event (handler deployments). Only the fields the pipeline
//! consumes are modelled; everything else is ignored.

use serde::{Deserialize, Serialize};

use crate::error::JobError;

/// Top-level notification envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3EventNotification {
    /// Event records, one per object.
    #[serde(rename = "Records", default)]
    pub records: Vec<S3EventRecord>,
}

/// One record of a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3EventRecord {
    /// Event name (`ObjectCreated:Put`, ...), when present.
    #[serde(rename = "eventName", default, skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
    /// The S3 entity the event describes.
    pub s3: S3Entity,
}

/// Bucket and object of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Entity {
    /// Bucket holding the object. Older queue payloads omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<S3Bucket>,
    /// The object itself.
    pub object: S3Object,
}

/// Bucket descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Bucket {
    /// Bucket name.
    pub name: String,
}

/// Object descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Object {
    /// URL-encoded object key.
    pub key: String,
    /// Object size in bytes, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl S3EventNotification {
    /// Parse a notification from a JSON string.
    pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }

    /// Build a notification for a single object (used by tests and tooling).
    pub fn single(bucket: &str, key: &str) -> Self {
        Self {
            records: vec![S3EventRecord {
                event_name: Some("ObjectCreated:Put".to_string()),
                s3: S3Entity {
                    bucket: Some(S3Bucket {
                        name: bucket.to_string(),
                    }),
                    object: S3Object {
                        key: urlencoding::encode(key).replace("%2F", "/"),
                        size: None,
                    },
                },
            }],
        }
    }
}

impl S3EventRecord {
    /// Bucket name, if the record carries one.
    pub fn bucket_name(&self) -> Option<&str> {
        self.s3.bucket.as_ref().map(|b| b.name.as_str())
    }

    /// The object key with S3's URL encoding removed (`+` is a space).
    pub fn object_key(&self) -> Result<String, JobError> {
        decode_key(&self.s3.object.key)
    }
}

/// Decode an S3 notification key.
pub fn decode_key(raw: &str) -> Result<String, JobError> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.into_owned())
        .map_err(|e| JobError::malformed_key(raw, format!("key is not valid UTF-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "Records": [{
            "eventVersion": "2.1",
            "eventSource": "aws:s3",
            "eventName": "ObjectCreated:Put",
            "s3": {
                "s3SchemaVersion": "1.0",
                "bucket": {"name": "unnamed-client-files", "arn": "arn:aws:s3:::unnamed-client-files"},
                "object": {"key": "user123/My+Part%281%29.step", "size": 1024, "eTag": "abc"}
            }
        }]
    }"#;

    #[test]
    fn test_parse_notification() {
        let event = S3EventNotification::from_json(SAMPLE).expect("parse");
        assert_eq!(event.records.len(), 1);
        let record = &event.records[0];
        assert_eq!(record.bucket_name(), Some("unnamed-client-files"));
        assert_eq!(record.object_key().expect("decode"), "user123/My Part(1).step");
        assert_eq!(record.s3.object.size, Some(1024));
    }

    #[test]
    fn test_missing_bucket_tolerated() {
        let body = r#"{"Records":[{"s3":{"object":{"key":"u/a.step"}}}]}"#;
        let event = S3EventNotification::from_json(body).expect("parse");
        assert_eq!(event.records[0].bucket_name(), None);
    }

    #[test]
    fn test_test_event_has_no_records() {
        let body = r#"{"Service":"Amazon S3","Event":"s3:TestEvent","Bucket":"b"}"#;
        let event = S3EventNotification::from_json(body).expect("parse");
        assert!(event.records.is_empty());
    }

    #[test]
    fn test_single_roundtrips_key() {
        let event = S3EventNotification::single("b", "user 1/part A.step");
        assert_eq!(
            event.records[0].object_key().expect("decode"),
            "user 1/part A.step"
        );
    }

    #[test]
    fn test_invalid_utf8_escape() {
        assert!(matches!(
            decode_key("u/%FF.step"),
            Err(JobError::MalformedKey { .. })
        ));
    }
}
