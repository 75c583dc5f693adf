//! Conversion pipeline: one job end to end.
//!
//! size check → fetch → size check → stages (in chain order, with retry)
//! → push (with the material library of an OBJ artifact) → metadata
//! update. The run's workspace is removed on every exit path.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use meshport_core::config::AppConfig;
use meshport_core::error::{AppError, JobError};
use meshport_core::traits::{MetadataGateway, ObjectStorage};
use meshport_core::types::{ConversionJob, ConversionResult, MeshFormat};

use crate::chain::ChainRegistry;
use crate::error::ConversionError;
use crate::metrics::PipelineMetrics;
use crate::stages::{ConversionStage, StageIo, StageRegistry};
use crate::workspace::{Workspace, commit_output, discard_partial, partial_path};

/// Pipeline settings, extracted from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Prefix of every output key.
    pub output_prefix: String,
    /// Root directory for run workspaces.
    pub scratch_root: PathBuf,
    /// Bucket for outputs; `None` writes back to the source bucket.
    pub output_bucket: Option<String>,
    /// Metadata attribute receiving the artifact reference.
    pub metadata_field: String,
    /// Largest accepted input.
    pub max_input_bytes: u64,
    /// Smallest accepted stage output.
    pub min_output_bytes: u64,
    /// Extra attempts for a stage whose tool failed.
    pub max_retries: u32,
    /// Pause between attempts.
    pub retry_delay: Duration,
}

impl PipelineSettings {
    /// Extract settings from the application configuration.
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            output_prefix: config.pipeline.output_prefix.clone(),
            scratch_root: config.pipeline.effective_scratch_root(),
            output_bucket: config
                .storage
                .output_bucket
                .clone()
                .filter(|b| !b.is_empty()),
            metadata_field: config.metadata.field.clone(),
            max_input_bytes: config.converter.max_input_bytes,
            min_output_bytes: config.converter.min_output_bytes,
            max_retries: config.converter.max_retries,
            retry_delay: Duration::from_secs(config.converter.retry_delay_seconds),
        }
    }
}

/// Runs conversion jobs against the configured chains.
#[derive(Debug, Clone)]
pub struct ConversionPipeline {
    storage: Arc<dyn ObjectStorage>,
    metadata: Option<Arc<dyn MetadataGateway>>,
    chains: ChainRegistry,
    settings: PipelineSettings,
    metrics: Arc<PipelineMetrics>,
}

impl ConversionPipeline {
    /// Create a pipeline from explicit parts.
    pub fn new(
        settings: PipelineSettings,
        chains: ChainRegistry,
        storage: Arc<dyn ObjectStorage>,
        metadata: Option<Arc<dyn MetadataGateway>>,
    ) -> Self {
        Self {
            storage,
            metadata,
            chains,
            settings,
            metrics: Arc::new(PipelineMetrics::new()),
        }
    }

    /// Create a pipeline from configuration, resolving chains against
    /// `stages`.
    pub fn from_config(
        config: &AppConfig,
        stages: &StageRegistry,
        storage: Arc<dyn ObjectStorage>,
        metadata: Option<Arc<dyn MetadataGateway>>,
    ) -> Result<Self, AppError> {
        let chains = ChainRegistry::from_config(&config.pipeline, stages)?;
        Ok(Self::new(
            PipelineSettings::from_config(config),
            chains,
            storage,
            metadata,
        ))
    }

    /// Shared metrics collector.
    pub fn metrics(&self) -> Arc<PipelineMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Pipeline settings.
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run one job.
    ///
    /// Unsupported formats fail before any I/O: no workspace is created and
    /// storage is not touched.
    #[instrument(skip(self, job), fields(job_key = %job.source_key, owner_id = %job.owner_id))]
    pub async fn run(&self, job: &ConversionJob) -> Result<ConversionResult, JobError> {
        let start = Instant::now();
        self.metrics.record_started();

        let result = match self.chains.resolve(&job.source_format) {
            Some(chain) => self.run_chain(job, chain, start).await,
            None => Err(JobError::UnsupportedFormat {
                format: job.source_format.clone(),
            }),
        };

        match &result {
            Ok(done) => {
                self.metrics.record_success(start.elapsed());
                info!(
                    output_key = %done.output_key,
                    stages = ?done.stages,
                    elapsed_ms = done.duration_ms,
                    "Conversion job completed"
                );
            }
            Err(e) => self.metrics.record_failure(e.is_permanent()),
        }
        result
    }

    async fn run_chain(
        &self,
        job: &ConversionJob,
        chain: &[Arc<dyn ConversionStage>],
        start: Instant,
    ) -> Result<ConversionResult, JobError> {
        // The event's declared size rejects oversized objects before the
        // download; the measured size below remains the authority.
        if let Some(size) = job.declared_size {
            if size > self.settings.max_input_bytes {
                return Err(JobError::InputTooLarge {
                    size,
                    limit: self.settings.max_input_bytes,
                });
            }
        }

        let scope = job.workspace_scope();
        let workspace = Workspace::create(&self.settings.scratch_root, &scope)
            .await
            .map_err(|source| JobError::Workspace {
                path: self.settings.scratch_root.join(&scope),
                source,
            })?;

        let result = self.run_in_workspace(job, chain, &workspace, start).await;
        workspace.cleanup().await;
        result
    }

    async fn run_in_workspace(
        &self,
        job: &ConversionJob,
        chain: &[Arc<dyn ConversionStage>],
        workspace: &Workspace,
        start: Instant,
    ) -> Result<ConversionResult, JobError> {
        // Download
        let source_path = workspace.path(&job.source_file_name());
        let size = self
            .storage
            .fetch(&job.source_bucket, &job.source_key, &source_path)
            .await
            .map_err(|source| JobError::DownloadFailed {
                bucket: job.source_bucket.clone(),
                key: job.source_key.clone(),
                source,
            })?;
        self.metrics.record_download(size);

        if size > self.settings.max_input_bytes {
            return Err(JobError::InputTooLarge {
                size,
                limit: self.settings.max_input_bytes,
            });
        }

        // Stages
        let mut current = source_path;
        let mut format = MeshFormat::Step;
        let mut stages = Vec::with_capacity(chain.len());
        for stage in chain {
            let kind = stage.kind();
            let output = workspace.path(&job.output_name(kind.output()));
            let io = StageIo {
                input: current,
                partial: partial_path(&output),
                output,
                workspace: workspace.dir().to_path_buf(),
            };

            self.run_stage(stage.as_ref(), &io).await.map_err(|e| {
                if matches!(e, ConversionError::ToolTimeout { .. }) {
                    self.metrics.record_stage_timeout();
                }
                JobError::ConversionFailed {
                    stage: kind.name().to_string(),
                    source: Box::new(e),
                }
            })?;

            stages.push(kind.name().to_string());
            current = io.output;
            format = kind.output();
        }

        // Upload
        let bucket = self
            .settings
            .output_bucket
            .clone()
            .unwrap_or_else(|| job.source_bucket.clone());
        if format == MeshFormat::Obj {
            self.push_material_library(job, &bucket, &current).await?;
        }

        let output_key = job.output_key(&self.settings.output_prefix, format);
        let uploaded = self
            .storage
            .push(&bucket, &output_key, &current, format.content_type())
            .await
            .map_err(|source| JobError::UploadFailed {
                bucket: bucket.clone(),
                key: output_key.clone(),
                source,
            })?;
        self.metrics.record_upload(uploaded);

        let mut result = ConversionResult {
            output_bucket: bucket,
            output_key,
            output_name: job.output_name(format),
            output_format: format,
            byte_size: Some(uploaded),
            stages,
            duration_ms: 0,
        };

        // Metadata
        if let Some(metadata) = &self.metadata {
            match &job.entity_id {
                Some(entity_id) => {
                    metadata
                        .update_record(
                            &job.owner_id,
                            entity_id,
                            &self.settings.metadata_field,
                            &result.file_ref(),
                        )
                        .await
                        .map_err(|source| JobError::MetadataUpdateFailed {
                            owner_id: job.owner_id.clone(),
                            entity_id: entity_id.clone(),
                            source,
                        })?;
                }
                None => debug!("Job has no entity id, skipping metadata update"),
            }
        }

        result.duration_ms = start.elapsed().as_millis() as u64;
        Ok(result)
    }

    /// Publish the `.mtl` an OBJ artifact references, next to where the OBJ
    /// will land. Runs before the OBJ upload so a published OBJ never
    /// points at a missing library.
    async fn push_material_library(
        &self,
        job: &ConversionJob,
        bucket: &str,
        obj_path: &Path,
    ) -> Result<(), JobError> {
        let mtl_path = obj_path.with_extension(MeshFormat::Mtl.extension());
        if !tokio::fs::try_exists(&mtl_path).await.unwrap_or(false) {
            warn!(obj = %obj_path.display(), "OBJ artifact has no material library to publish");
            return Ok(());
        }

        let key = job.output_key(&self.settings.output_prefix, MeshFormat::Mtl);
        let uploaded = self
            .storage
            .push(bucket, &key, &mtl_path, MeshFormat::Mtl.content_type())
            .await
            .map_err(|source| JobError::UploadFailed {
                bucket: bucket.to_string(),
                key: key.clone(),
                source,
            })?;
        self.metrics.record_upload(uploaded);
        debug!(key = %key, "Published material library");
        Ok(())
    }

    /// Run one stage, retrying tool failures.
    async fn run_stage(
        &self,
        stage: &dyn ConversionStage,
        io: &StageIo,
    ) -> Result<u64, ConversionError> {
        let name = stage.kind().name();
        let mut attempt = 0;

        loop {
            discard_partial(&io.partial).await;
            let started = Instant::now();

            let outcome = match stage.execute(io).await {
                Ok(()) => commit_output(&io.partial, &io.output, self.settings.min_output_bytes).await,
                Err(e) => Err(e),
            };

            match outcome {
                Ok(size) => {
                    info!(
                        stage = name,
                        attempt,
                        size_bytes = size,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Stage completed"
                    );
                    return Ok(size);
                }
                Err(e) => {
                    discard_partial(&io.partial).await;
                    if e.is_retryable() && attempt < self.settings.max_retries {
                        attempt += 1;
                        warn!(
                            stage = name,
                            attempt,
                            max_retries = self.settings.max_retries,
                            error = %e,
                            "Stage failed, retrying"
                        );
                        tokio::time::sleep(self.settings.retry_delay).await;
                        continue;
                    }
                    warn!(stage = name, error = %e, "Stage failed");
                    return Err(e);
                }
            }
        }
    }
}
