//! Stage chain and output layout configuration.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::types::format::{MeshFormat, StageKind};
use crate::types::job::KeyLayout;

/// Pipeline layout configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// How source keys encode owner and entity.
    #[serde(default)]
    pub key_layout: KeyLayout,
    /// Prefix prepended to every output key.
    #[serde(default = "default_output_prefix")]
    pub output_prefix: String,
    /// Root directory for per-run scratch workspaces.
    #[serde(default)]
    pub scratch_root: Option<PathBuf>,
    /// Source extension → ordered stage list.
    #[serde(default = "default_chains")]
    pub chains: BTreeMap<String, Vec<StageKind>>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            key_layout: KeyLayout::default(),
            output_prefix: default_output_prefix(),
            scratch_root: None,
            chains: default_chains(),
        }
    }
}

impl PipelineConfig {
    /// Resolve the effective scratch root directory.
    pub fn effective_scratch_root(&self) -> PathBuf {
        self.scratch_root
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("meshport"))
    }

    /// Check that every chain is non-empty, each stage consumes what the
    /// previous one produced, and source keys are unique ignoring case.
    pub fn validate_chains(&self) -> Result<(), AppError> {
        if self.chains.is_empty() {
            return Err(AppError::configuration("pipeline.chains is empty"));
        }

        let mut seen = BTreeSet::new();
        for (source, stages) in &self.chains {
            if !seen.insert(source.to_ascii_lowercase()) {
                return Err(AppError::configuration(format!(
                    "pipeline.chains.{source}: duplicates another chain key (keys are case-insensitive)"
                )));
            }

            let Some(mut current) = MeshFormat::from_extension(source) else {
                return Err(AppError::configuration(format!(
                    "pipeline.chains.{source}: '{source}' is not a known source format"
                )));
            };

            if stages.is_empty() {
                return Err(AppError::configuration(format!(
                    "pipeline.chains.{source}: chain has no stages"
                )));
            }

            for stage in stages {
                if stage.input() != current {
                    return Err(AppError::configuration(format!(
                        "pipeline.chains.{source}: stage '{stage}' expects {} input but receives {current}",
                        stage.input()
                    )));
                }
                current = stage.output();
            }
        }

        Ok(())
    }
}

fn default_output_prefix() -> String {
    "parts/web_ready/".to_string()
}

fn default_chains() -> BTreeMap<String, Vec<StageKind>> {
    let web = vec![StageKind::StepToObj, StageKind::ObjToGlb];
    BTreeMap::from([("step".to_string(), web.clone()), ("stp".to_string(), web)])
}
