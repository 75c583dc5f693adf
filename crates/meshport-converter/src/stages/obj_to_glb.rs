//! `obj_to_glb`: re-export an OBJ+MTL pair as binary glTF.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use meshport_core::types::StageKind;

use crate::error::ConversionError;
use crate::glb::{GlbOutput, encode_glb};
use crate::material::MaterialDescriptor;
use crate::obj::ObjModel;
use crate::stages::{ConversionStage, StageIo};

/// Native OBJ → GLB exporter.
///
/// Parsing and encoding run on the blocking pool under the stage timeout.
/// On timeout the export is cancelled at its next checkpoint and the stage
/// returns only once the blocking task has finished.
#[derive(Debug, Clone)]
pub struct ObjToGlbStage {
    timeout: Duration,
}

impl ObjToGlbStage {
    /// Create the stage.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ConversionStage for ObjToGlbStage {
    fn kind(&self) -> StageKind {
        StageKind::ObjToGlb
    }

    #[instrument(skip_all, fields(stage = "obj_to_glb"))]
    async fn execute(&self, io: &StageIo) -> Result<(), ConversionError> {
        let input = io.input.clone();
        let partial = io.partial.clone();
        let cancel = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&cancel);
        let mut task = tokio::task::spawn_blocking(move || convert(&input, &partial, &flag));

        let output = match tokio::time::timeout(self.timeout, &mut task).await {
            Ok(joined) => joined??,
            Err(_) => {
                // The blocking task cannot be aborted; it stops at its next
                // checkpoint. Wait for it so nothing writes into the
                // workspace after this stage has returned.
                cancel.store(true, Ordering::Relaxed);
                let _ = task.await;
                let _ = tokio::fs::remove_file(&io.partial).await;
                warn!(
                    timeout_s = self.timeout.as_secs_f64(),
                    "GLB export timed out, abandoned"
                );
                return Err(ConversionError::ToolTimeout {
                    timeout_seconds: self.timeout.as_secs(),
                });
            }
        };

        let Some(output) = output else {
            return Err(ConversionError::ToolTimeout {
                timeout_seconds: self.timeout.as_secs(),
            });
        };

        if !output.unresolved_materials.is_empty() {
            warn!(
                materials = ?output.unresolved_materials,
                "Materials not found in library, exported with default material"
            );
        }
        info!(bytes = output.bytes.len(), "GLB export completed");
        Ok(())
    }
}

/// Parse, encode and write. Returns `None` without writing anything once
/// `cancel` is set.
fn convert(
    input: &Path,
    partial: &Path,
    cancel: &AtomicBool,
) -> Result<Option<GlbOutput>, ConversionError> {
    let cancelled = || cancel.load(Ordering::Relaxed);

    let text = std::fs::read(input)?;
    if cancelled() {
        return Ok(None);
    }
    let model = ObjModel::parse(&String::from_utf8_lossy(&text))?;
    drop(text);
    if cancelled() {
        return Ok(None);
    }

    let materials = load_materials(input, &model.material_libraries);
    if materials.is_empty() {
        warn!(
            obj = %input.display(),
            libraries = ?model.material_libraries,
            "No material data resolved for OBJ, using default material"
        );
    }

    let output = encode_glb(&model, &materials)?;
    drop(model);
    if cancelled() {
        return Ok(None);
    }
    std::fs::write(partial, &output.bytes)?;
    Ok(Some(output))
}

/// Read every referenced material library that exists beside the OBJ.
fn load_materials(obj_path: &Path, libraries: &[String]) -> Vec<MaterialDescriptor> {
    let base = obj_path.parent().map(Path::to_path_buf).unwrap_or_default();
    libraries
        .iter()
        .map(|lib| base.join(lib))
        .filter_map(|path: PathBuf| match std::fs::read_to_string(&path) {
            Ok(text) => Some(MaterialDescriptor::parse_library(&text)),
            Err(e) => {
                warn!(mtl = %path.display(), error = %e, "Material library unreadable");
                None
            }
        })
        .flatten()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glb::GLB_MAGIC;
    use crate::workspace::partial_path;

    const OBJ: &str = "mtllib part1.mtl\nusemtl WhiteMaterial\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";

    fn io_in(dir: &Path) -> StageIo {
        let output = dir.join("part1.glb");
        StageIo {
            input: dir.join("part1.obj"),
            partial: partial_path(&output),
            output,
            workspace: dir.to_path_buf(),
        }
    }

    #[tokio::test]
    async fn test_exports_glb_with_material() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("part1.obj"), OBJ).unwrap();
        std::fs::write(
            dir.path().join("part1.mtl"),
            MaterialDescriptor::white().to_mtl(),
        )
        .unwrap();
        let io = io_in(dir.path());

        ObjToGlbStage::new(Duration::from_secs(10))
            .execute(&io)
            .await
            .unwrap();

        let bytes = std::fs::read(&io.partial).unwrap();
        assert_eq!(u32::from_le_bytes(bytes[0..4].try_into().unwrap()), GLB_MAGIC);
        let json_len = u32::from_le_bytes(bytes[12..16].try_into().unwrap()) as usize;
        let doc: serde_json::Value = serde_json::from_slice(&bytes[20..20 + json_len]).unwrap();
        assert_eq!(doc["materials"][0]["name"], "WhiteMaterial");
    }

    #[tokio::test]
    async fn test_missing_mtl_still_exports() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("part1.obj"), OBJ).unwrap();
        let io = io_in(dir.path());

        ObjToGlbStage::new(Duration::from_secs(10))
            .execute(&io)
            .await
            .unwrap();
        assert!(io.partial.exists());
    }

    /// An `n` x `n` quad grid, large enough that export outlasts a
    /// millisecond budget.
    fn grid_obj(n: usize) -> String {
        let mut out = String::from("mtllib part1.mtl\nusemtl WhiteMaterial\n");
        for y in 0..=n {
            for x in 0..=n {
                out.push_str(&format!("v {x} {y} 0\n"));
            }
        }
        let row = n + 1;
        for y in 0..n {
            for x in 0..n {
                let a = y * row + x + 1;
                out.push_str(&format!("f {} {} {} {}\n", a, a + 1, a + row + 1, a + row));
            }
        }
        out
    }

    #[tokio::test]
    async fn test_timeout_leaves_no_partial_behind() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("part1.obj"), grid_obj(300)).unwrap();
        let io = io_in(dir.path());

        let err = ObjToGlbStage::new(Duration::from_millis(1))
            .execute(&io)
            .await
            .unwrap_err();
        assert!(matches!(err, ConversionError::ToolTimeout { .. }));

        // The export has been stopped, not detached: nothing appears later.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!io.partial.exists());
        assert!(!io.output.exists());
    }

    #[test]
    fn test_cancelled_convert_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("part1.obj");
        std::fs::write(&input, OBJ).unwrap();
        let partial = dir.path().join("part1.partial.glb");

        let output = convert(&input, &partial, &AtomicBool::new(true)).unwrap();
        assert!(output.is_none());
        assert!(!partial.exists());

        let output = convert(&input, &partial, &AtomicBool::new(false)).unwrap();
        assert!(output.is_some());
        assert!(partial.exists());
    }

    #[tokio::test]
    async fn test_invalid_obj_fails_without_output() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("part1.obj"), "v 0 0\n").unwrap();
        let io = io_in(dir.path());

        let err = ObjToGlbStage::new(Duration::from_secs(10))
            .execute(&io)
            .await
            .unwrap_err();
        assert!(matches!(err, ConversionError::ObjParse { line: 1, .. }));
        assert!(!io.partial.exists());
    }
}
