//! Shared fixtures for the runner and server tests.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use meshport_converter::{ConversionError, ConversionPipeline, ConversionStage, StageIo, StageRegistry};
use meshport_core::config::AppConfig;
use meshport_core::config::worker::WorkerConfig;
use meshport_core::types::{S3EventNotification, StageKind};
use meshport_storage::providers::local::LocalObjectStorage;

use crate::runner::JobRunner;

/// Writes a one-facet STL instead of tessellating.
#[derive(Debug)]
pub struct FakeStlStage;

#[async_trait]
impl ConversionStage for FakeStlStage {
    fn kind(&self) -> StageKind {
        StageKind::StepToStl
    }

    async fn execute(&self, io: &StageIo) -> Result<(), ConversionError> {
        tokio::fs::write(
            &io.partial,
            "solid t\nfacet normal 0 0 1\nouter loop\nvertex 0 0 0\nvertex 1 0 0\nvertex 0 1 0\nendloop\nendfacet\nendsolid t\n",
        )
        .await?;
        Ok(())
    }
}

pub struct Harness {
    _dir: tempfile::TempDir,
    root: PathBuf,
    pipeline: Arc<ConversionPipeline>,
}

impl Harness {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalObjectStorage::new(dir.path().join("buckets"))
            .await
            .unwrap();
        let root = storage.root().to_path_buf();

        let mut config = AppConfig::default();
        config.pipeline.scratch_root = Some(dir.path().join("scratch"));
        config.pipeline.chains = BTreeMap::from([("step".to_string(), vec![StageKind::StepToStl])]);
        config.converter.max_retries = 0;

        let mut stages = StageRegistry::new();
        stages.register(Arc::new(FakeStlStage));
        let pipeline =
            ConversionPipeline::from_config(&config, &stages, Arc::new(storage), None).unwrap();

        Self {
            _dir: dir,
            root,
            pipeline: Arc::new(pipeline),
        }
    }

    pub async fn upload(&self, key: &str) {
        let path = self.root.join("uploads").join(key);
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(path, "ISO-10303-21;").await.unwrap();
    }

    pub fn output_exists(&self, key: &str) -> bool {
        self.root.join("uploads").join(key).is_file()
    }

    pub fn runner(&self) -> JobRunner {
        JobRunner::new(self.pipeline.clone(), WorkerConfig::default())
    }
}

pub fn notification_body(bucket: &str, key: &str) -> String {
    serde_json::to_string(&S3EventNotification::single(bucket, key)).unwrap()
}
