//! Shared fixtures for the workspace-level scenario tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use meshport_converter::material::MaterialDescriptor;
use meshport_converter::stages::tessellate::attach_material;
use meshport_converter::{ConversionError, ConversionPipeline, ConversionStage, StageIo, StageRegistry};
use meshport_core::config::AppConfig;
use meshport_core::config::metadata::MetadataProviderKind;
use meshport_core::traits::MetadataGateway;
use meshport_core::types::{KeyLayout, S3EventNotification, StageKind};
use meshport_metadata::memory::InMemoryMetadataGateway;
use meshport_storage::providers::local::LocalObjectStorage;

pub const BUCKET: &str = "unnamed-client-files";

pub const STEP_SOURCE: &str = "ISO-10303-21;\nHEADER;\nENDSEC;\nDATA;\nENDSEC;\nEND-ISO-10303-21;\n";

pub const MINIMAL_STL: &str = "solid part\n\
 facet normal 0 0 1\n  outer loop\n   vertex 0 0 0\n   vertex 1 0 0\n   vertex 0 1 0\n  endloop\n endfacet\n\
 facet normal 0 0 1\n  outer loop\n   vertex 1 0 0\n   vertex 1 1 0\n   vertex 0 1 0\n  endloop\n endfacet\n\
endsolid part\n";

pub const MINIMAL_OBJ: &str = "# tessellated\n\
v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\n\
vn 0 0 1\n\
f 1//1 2//1 3//1 4//1\n";

/// Stands in for FreeCAD tessellation to STL.
#[derive(Debug)]
pub struct FakeStepToStl;

#[async_trait]
impl ConversionStage for FakeStepToStl {
    fn kind(&self) -> StageKind {
        StageKind::StepToStl
    }

    async fn execute(&self, io: &StageIo) -> Result<(), ConversionError> {
        tokio::fs::write(&io.partial, MINIMAL_STL).await?;
        Ok(())
    }
}

/// Stands in for FreeCAD tessellation to OBJ; the material synthesis is
/// the real one.
#[derive(Debug)]
pub struct FakeStepToObj;

#[async_trait]
impl ConversionStage for FakeStepToObj {
    fn kind(&self) -> StageKind {
        StageKind::StepToObj
    }

    async fn execute(&self, io: &StageIo) -> Result<(), ConversionError> {
        tokio::fs::write(&io.partial, MINIMAL_OBJ).await?;
        attach_material(io, &MaterialDescriptor::white()).await
    }
}

/// Always fails like a crashing tool.
#[derive(Debug)]
pub struct CrashingStage(pub StageKind);

#[async_trait]
impl ConversionStage for CrashingStage {
    fn kind(&self) -> StageKind {
        self.0
    }

    async fn execute(&self, io: &StageIo) -> Result<(), ConversionError> {
        tokio::fs::write(&io.partial, "trunc").await?;
        Err(ConversionError::ToolFailed {
            code: 139,
            stderr: "Segmentation fault".into(),
        })
    }
}

/// Real stages with the tessellating ones replaced by fakes.
pub fn fake_stages(config: &AppConfig) -> StageRegistry {
    let mut stages = StageRegistry::with_defaults(&config.converter);
    stages.register(Arc::new(FakeStepToStl));
    stages.register(Arc::new(FakeStepToObj));
    stages
}

pub struct TestEnv {
    dir: TempDir,
    pub storage_root: PathBuf,
    pub scratch: PathBuf,
    pub metadata: Arc<InMemoryMetadataGateway>,
}

impl TestEnv {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage_root = dir.path().join("s3");
        let scratch = dir.path().join("scratch");
        Self {
            dir,
            storage_root,
            scratch,
            metadata: Arc::new(InMemoryMetadataGateway::new()),
        }
    }

    /// Configuration with one chain for `step`.
    pub fn config(&self, chain: &[StageKind], layout: KeyLayout) -> AppConfig {
        let mut config = AppConfig::default();
        config.storage.bucket = BUCKET.to_string();
        config.pipeline.key_layout = layout;
        config.pipeline.scratch_root = Some(self.scratch.clone());
        config.pipeline.chains = BTreeMap::from([("step".to_string(), chain.to_vec())]);
        config.converter.max_retries = 0;
        config.converter.retry_delay_seconds = 0;
        config
    }

    pub async fn pipeline_with(&self, config: &AppConfig, stages: &StageRegistry) -> Arc<ConversionPipeline> {
        let storage = LocalObjectStorage::new(&self.storage_root)
            .await
            .expect("storage");
        let metadata: Option<Arc<dyn MetadataGateway>> = match config.metadata.provider {
            MetadataProviderKind::None => None,
            _ => Some(self.metadata.clone()),
        };
        Arc::new(
            ConversionPipeline::from_config(config, stages, Arc::new(storage), metadata)
                .expect("pipeline"),
        )
    }

    pub async fn pipeline(&self, config: &AppConfig) -> Arc<ConversionPipeline> {
        self.pipeline_with(config, &fake_stages(config)).await
    }

    pub async fn upload(&self, key: &str, contents: &[u8]) {
        let path = self.storage_root.join(BUCKET).join(key);
        tokio::fs::create_dir_all(path.parent().expect("parent"))
            .await
            .expect("mkdir");
        tokio::fs::write(path, contents).await.expect("write");
    }

    pub fn read_output(&self, key: &str) -> Option<Vec<u8>> {
        std::fs::read(self.storage_root.join(BUCKET).join(key)).ok()
    }

    pub fn scratch_is_empty(&self) -> bool {
        match std::fs::read_dir(&self.scratch) {
            Ok(mut entries) => entries.next().is_none(),
            Err(_) => true,
        }
    }

    pub fn path(&self) -> &std::path::Path {
        self.dir.path()
    }
}

pub fn event_body(key: &str) -> String {
    serde_json::to_string(&S3EventNotification::single(BUCKET, key)).expect("serialize")
}

/// Check the binary glTF container header.
pub fn assert_valid_glb(bytes: &[u8]) {
    assert!(bytes.len() >= 12, "GLB too short");
    assert_eq!(&bytes[0..4], b"glTF");
    let version = u32::from_le_bytes(bytes[4..8].try_into().expect("version"));
    let length = u32::from_le_bytes(bytes[8..12].try_into().expect("length"));
    assert_eq!(version, 2);
    assert_eq!(length as usize, bytes.len());
}
