//! Conversion stages and the stage registry.
//!
//! A stage turns one input file into one output file of a fixed format.
//! Stages write to a `*.partial.<ext>` path; the pipeline validates that
//! file and renames it to the final name, so a failed stage never leaves a
//! usable-looking output behind.

pub mod obj_to_glb;
pub mod tessellate;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use meshport_core::config::converter::ConverterConfig;
use meshport_core::types::StageKind;

use crate::error::ConversionError;
use crate::executor::ToolExecutor;

pub use obj_to_glb::ObjToGlbStage;
pub use tessellate::{FreecadTessellator, StepToObjStage, StepToStlStage};

/// File locations for one stage execution.
#[derive(Debug, Clone)]
pub struct StageIo {
    /// File produced by the previous stage (or the download).
    pub input: PathBuf,
    /// Final output path; published by the pipeline after validation.
    pub output: PathBuf,
    /// Where the stage must write its output.
    pub partial: PathBuf,
    /// Run directory for auxiliary files (scripts).
    pub workspace: PathBuf,
}

/// One named format transformation.
#[async_trait]
pub trait ConversionStage: Send + Sync + std::fmt::Debug + 'static {
    /// Which stage this is; fixes its input and output formats.
    fn kind(&self) -> StageKind;

    /// Produce `io.partial` from `io.input`.
    async fn execute(&self, io: &StageIo) -> Result<(), ConversionError>;
}

/// Stage implementations keyed by kind.
#[derive(Debug, Clone, Default)]
pub struct StageRegistry {
    stages: HashMap<StageKind, Arc<dyn ConversionStage>>,
}

impl StageRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the production binding of every stage.
    pub fn with_defaults(config: &ConverterConfig) -> Self {
        let timeout = Duration::from_secs(config.stage_timeout_seconds);
        let tessellator = FreecadTessellator::new(
            config.freecad_path.clone(),
            ToolExecutor::new(timeout, config.capture_output),
            config.tessellation_deflection,
        );

        let mut registry = Self::new();
        registry.register(Arc::new(StepToStlStage::new(tessellator.clone())));
        registry.register(Arc::new(StepToObjStage::new(tessellator)));
        registry.register(Arc::new(ObjToGlbStage::new(timeout)));
        registry
    }

    /// Register a stage, replacing any stage of the same kind.
    pub fn register(&mut self, stage: Arc<dyn ConversionStage>) {
        self.stages.insert(stage.kind(), stage);
    }

    /// Look up the stage for `kind`.
    pub fn get(&self, kind: StageKind) -> Option<Arc<dyn ConversionStage>> {
        self.stages.get(&kind).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Noop(StageKind);

    #[async_trait]
    impl ConversionStage for Noop {
        fn kind(&self) -> StageKind {
            self.0
        }

        async fn execute(&self, _io: &StageIo) -> Result<(), ConversionError> {
            Ok(())
        }
    }

    #[test]
    fn test_defaults_cover_every_stage() {
        let registry = StageRegistry::with_defaults(&ConverterConfig::default());
        for kind in StageKind::ALL {
            assert_eq!(registry.get(kind).expect("registered").kind(), kind);
        }
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = StageRegistry::with_defaults(&ConverterConfig::default());
        registry.register(Arc::new(Noop(StageKind::StepToStl)));
        let stage = registry.get(StageKind::StepToStl).expect("registered");
        assert!(format!("{stage:?}").starts_with("Noop"));
    }
}
