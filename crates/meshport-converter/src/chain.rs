//! Source format → stage chain registry.

use std::collections::BTreeMap;
use std::sync::Arc;

use meshport_core::config::pipeline::PipelineConfig;
use meshport_core::error::AppError;
use meshport_core::types::MeshFormat;

use crate::stages::{ConversionStage, StageRegistry};

/// Resolved stage chains, validated at construction.
#[derive(Debug, Clone)]
pub struct ChainRegistry {
    chains: BTreeMap<String, Vec<Arc<dyn ConversionStage>>>,
}

impl ChainRegistry {
    /// Resolve the configured chains against `stages`.
    ///
    /// Fails when a chain is not format-continuous or names a stage with
    /// no registered implementation.
    pub fn from_config(config: &PipelineConfig, stages: &StageRegistry) -> Result<Self, AppError> {
        config.validate_chains()?;

        let mut chains = BTreeMap::new();
        for (source, kinds) in &config.chains {
            let resolved = kinds
                .iter()
                .map(|kind| {
                    stages.get(*kind).ok_or_else(|| {
                        AppError::configuration(format!(
                            "pipeline.chains.{source}: no implementation for stage '{kind}'"
                        ))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            chains.insert(source.to_ascii_lowercase(), resolved);
        }

        Ok(Self { chains })
    }

    /// The stage chain for a (lowercased) source extension.
    pub fn resolve(&self, source_format: &str) -> Option<&[Arc<dyn ConversionStage>]> {
        self.chains.get(source_format).map(Vec::as_slice)
    }

    /// Format the chain for `source_format` ends in.
    pub fn output_format(&self, source_format: &str) -> Option<MeshFormat> {
        self.resolve(source_format)
            .and_then(|chain| chain.last())
            .map(|stage| stage.kind().output())
    }

    /// Source formats with a configured chain.
    pub fn source_formats(&self) -> impl Iterator<Item = &str> {
        self.chains.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshport_core::config::converter::ConverterConfig;
    use meshport_core::types::StageKind;

    #[test]
    fn test_default_chains_resolve() {
        let stages = StageRegistry::with_defaults(&ConverterConfig::default());
        let chains = ChainRegistry::from_config(&PipelineConfig::default(), &stages).unwrap();

        let step: Vec<_> = chains
            .resolve("step")
            .unwrap()
            .iter()
            .map(|s| s.kind())
            .collect();
        assert_eq!(step, vec![StageKind::StepToObj, StageKind::ObjToGlb]);
        assert_eq!(chains.output_format("stp"), Some(MeshFormat::Glb));
        assert!(chains.resolve("dwg").is_none());
        assert_eq!(chains.source_formats().collect::<Vec<_>>(), vec!["step", "stp"]);
    }

    #[test]
    fn test_missing_implementation_rejected() {
        let err = ChainRegistry::from_config(&PipelineConfig::default(), &StageRegistry::new())
            .unwrap_err();
        assert!(err.message.contains("no implementation"));
    }
}
