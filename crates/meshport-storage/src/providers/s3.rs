//! S3-compatible object storage gateway (requires the `s3` feature).

use std::path::Path;
use std::time::Instant;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_config::meta::region::RegionProviderChain;
use aws_config::retry::{RetryConfig, RetryMode};
use aws_sdk_s3::Client;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{error, info};

use meshport_core::error::{AppError, ErrorKind};
use meshport_core::result::AppResult;
use meshport_core::traits::storage::ObjectStorage;

/// S3-compatible object storage gateway.
///
/// The bucket is chosen per call, so one client serves both the source and
/// the output bucket.
#[derive(Debug, Clone)]
pub struct S3ObjectStorage {
    client: Client,
}

impl S3ObjectStorage {
    /// Create a new S3 gateway.
    ///
    /// `endpoint` selects an S3-compatible service (MinIO, LocalStack) and
    /// switches to path-style addressing.
    pub async fn new(region: &str, endpoint: Option<&str>) -> AppResult<Self> {
        let region_provider =
            RegionProviderChain::first_try(aws_config::Region::new(region.to_string()));

        let retry_config = RetryConfig::standard()
            .with_max_attempts(5)
            .with_retry_mode(RetryMode::Adaptive);

        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .retry_config(retry_config)
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        info!(region, endpoint = ?endpoint, "Initialized S3 storage gateway");

        Ok(Self {
            client: Client::from_conf(builder.build()),
        })
    }

    /// Wrap an existing client.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStorage for S3ObjectStorage {
    fn provider_type(&self) -> &str {
        "s3"
    }

    async fn fetch(&self, bucket: &str, key: &str, dest: &Path) -> AppResult<u64> {
        let start = Instant::now();

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| match &e {
                SdkError::ServiceError(service_err)
                    if matches!(service_err.err(), GetObjectError::NoSuchKey(_)) =>
                {
                    AppError::not_found(format!("Object not found: s3://{bucket}/{key}"))
                }
                _ => {
                    error!(error = %e, bucket, key, "S3 download failed");
                    AppError::with_source(
                        ErrorKind::Storage,
                        format!("GetObject s3://{bucket}/{key} failed"),
                        e,
                    )
                }
            })?;

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = fs::File::create(dest).await?;
        let mut body = response.body.into_async_read();
        let bytes = tokio::io::copy(&mut body, &mut file).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Streaming s3://{bucket}/{key} to disk failed"),
                e,
            )
        })?;
        file.flush().await?;

        info!(
            bucket,
            key,
            size_bytes = bytes,
            duration_ms = start.elapsed().as_millis() as u64,
            "S3 download successful"
        );

        Ok(bytes)
    }

    async fn push(
        &self,
        bucket: &str,
        key: &str,
        src: &Path,
        content_type: &str,
    ) -> AppResult<u64> {
        let start = Instant::now();
        let size = fs::metadata(src).await?.len();

        let body = ByteStream::from_path(src).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to open {} for upload", src.display()),
                e,
            )
        })?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, bucket, key, size_bytes = size, "S3 upload failed");
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("PutObject s3://{bucket}/{key} failed"),
                    e,
                )
            })?;

        info!(
            bucket,
            key,
            size_bytes = size,
            duration_ms = start.elapsed().as_millis() as u64,
            "S3 upload successful"
        );

        Ok(size)
    }
}
