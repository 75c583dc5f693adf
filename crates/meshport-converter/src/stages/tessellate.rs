//! STEP tessellation stages backed by FreeCAD.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, instrument};

use meshport_core::types::StageKind;

use crate::error::ConversionError;
use crate::executor::{ToolExecutor, path_str};
use crate::material::{MaterialDescriptor, patch_obj_header, write_mtl};
use crate::scripting::{EMPTY_MESH_EXIT_CODE, ScriptingEngine};
use crate::stages::{ConversionStage, StageIo};
use crate::workspace::{commit_output, partial_path};

/// Runs `freecadcmd` on a generated tessellation script.
#[derive(Debug, Clone)]
pub struct FreecadTessellator {
    freecad_path: PathBuf,
    executor: ToolExecutor,
    deflection: f64,
}

impl FreecadTessellator {
    /// Create a tessellator.
    pub fn new(freecad_path: PathBuf, executor: ToolExecutor, deflection: f64) -> Self {
        Self {
            freecad_path,
            executor,
            deflection,
        }
    }

    /// Tessellate `io.input` into the mesh file `io.partial`.
    pub async fn tessellate(&self, io: &StageIo) -> Result<(), ConversionError> {
        let script = ScriptingEngine::write_tessellation_script(
            &io.input,
            &io.partial,
            self.deflection,
            &io.workspace,
        )
        .await?;
        let args = vec![path_str(&script)?.to_string()];

        let result = self
            .executor
            .run(&self.freecad_path, &args, Some(&io.workspace))
            .await;

        // Scripts are removed regardless of outcome.
        let _ = tokio::fs::remove_file(&script).await;

        match result {
            Ok(output) => {
                debug!(elapsed_ms = output.duration_ms, "Tessellation finished");
                Ok(())
            }
            Err(ConversionError::ToolFailed { code, .. }) if code == EMPTY_MESH_EXIT_CODE => {
                Err(ConversionError::EmptyMesh)
            }
            Err(e) => Err(e),
        }
    }
}

/// `step_to_stl`: tessellate and serialize as STL.
#[derive(Debug, Clone)]
pub struct StepToStlStage {
    tessellator: FreecadTessellator,
}

impl StepToStlStage {
    /// Create the stage.
    pub fn new(tessellator: FreecadTessellator) -> Self {
        Self { tessellator }
    }
}

#[async_trait]
impl ConversionStage for StepToStlStage {
    fn kind(&self) -> StageKind {
        StageKind::StepToStl
    }

    #[instrument(skip_all, fields(stage = "step_to_stl"))]
    async fn execute(&self, io: &StageIo) -> Result<(), ConversionError> {
        self.tessellator.tessellate(io).await
    }
}

/// `step_to_obj`: tessellate into OBJ, then attach the white material.
#[derive(Debug, Clone)]
pub struct StepToObjStage {
    tessellator: FreecadTessellator,
    material: MaterialDescriptor,
}

impl StepToObjStage {
    /// Create the stage with the standard white material.
    pub fn new(tessellator: FreecadTessellator) -> Self {
        Self {
            tessellator,
            material: MaterialDescriptor::white(),
        }
    }
}

#[async_trait]
impl ConversionStage for StepToObjStage {
    fn kind(&self) -> StageKind {
        StageKind::StepToObj
    }

    #[instrument(skip_all, fields(stage = "step_to_obj"))]
    async fn execute(&self, io: &StageIo) -> Result<(), ConversionError> {
        self.tessellator.tessellate(io).await?;
        attach_material(io, &self.material).await
    }
}

/// Write the material library beside the final OBJ name and point the
/// partial OBJ at it.
pub async fn attach_material(
    io: &StageIo,
    material: &MaterialDescriptor,
) -> Result<(), ConversionError> {
    let mtl_path = io.output.with_extension("mtl");
    let mtl_name = mtl_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| ConversionError::OutputNotCreated {
            path: mtl_path.clone(),
        })?;

    let mtl_partial = partial_path(&mtl_path);
    write_mtl(&mtl_partial, material).await?;
    commit_output(&mtl_partial, &mtl_path, 1).await?;

    patch_obj_header(&io.partial, &mtl_name, &material.name).await
}
