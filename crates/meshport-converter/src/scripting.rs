//! Python script generation for FreeCAD batch mode.
//!
//! Each tessellation stage writes a small script into the job workspace and
//! runs it with `freecadcmd <script>`. Paths are embedded as JSON string
//! literals, which are valid Python string literals.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::error::ConversionError;
use crate::executor::path_str;

/// Exit code the scripts use when tessellation yields no facets.
pub const EMPTY_MESH_EXIT_CODE: i32 = 3;

/// Generates FreeCAD Python scripts.
pub struct ScriptingEngine;

impl ScriptingEngine {
    /// Write a tessellation script converting `input` into the mesh file
    /// `output`. FreeCAD picks the mesh format from the output extension.
    pub async fn write_tessellation_script(
        input: &Path,
        output: &Path,
        deflection: f64,
        script_dir: &Path,
    ) -> Result<PathBuf, ConversionError> {
        let content = Self::tessellation_content(input, output, deflection)?;
        let ext = output
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mesh");
        let script_path = script_dir.join(format!("tessellate_{ext}.py"));

        let mut file = tokio::fs::File::create(&script_path).await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;

        Ok(script_path)
    }

    /// Script body: read the STEP shape, tessellate, write the mesh.
    fn tessellation_content(
        input: &Path,
        output: &Path,
        deflection: f64,
    ) -> Result<String, ConversionError> {
        let input = python_literal(path_str(input)?);
        let output = python_literal(path_str(output)?);

        Ok(format!(
            "import sys\n\
             import Part\n\
             import Mesh\n\
             \n\
             INPUT = {input}\n\
             OUTPUT = {output}\n\
             DEFLECTION = {deflection:?}\n\
             \n\
             shape = Part.read(INPUT)\n\
             vertices, facets = shape.tessellate(DEFLECTION)\n\
             if not facets:\n    \
                 sys.exit({EMPTY_MESH_EXIT_CODE})\n\
             mesh = Mesh.Mesh([[vertices[a], vertices[b], vertices[c]] for a, b, c in facets])\n\
             mesh.write(OUTPUT)\n"
        ))
    }
}

fn python_literal(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_embeds_paths_and_deflection() {
        let content = ScriptingEngine::tessellation_content(
            Path::new("/tmp/u1/run/part1.step"),
            Path::new("/tmp/u1/run/part1.partial.stl"),
            2.0,
        )
        .expect("script");

        assert!(content.contains("INPUT = \"/tmp/u1/run/part1.step\""));
        assert!(content.contains("OUTPUT = \"/tmp/u1/run/part1.partial.stl\""));
        assert!(content.contains("DEFLECTION = 2.0"));
        assert!(content.contains("shape.tessellate(DEFLECTION)"));
        assert!(content.contains("    sys.exit(3)"));
    }

    #[test]
    fn test_quotes_are_escaped() {
        let content = ScriptingEngine::tessellation_content(
            Path::new("/tmp/it's \"odd\".step"),
            Path::new("/tmp/out.stl"),
            0.5,
        )
        .expect("script");
        assert!(content.contains(r#"INPUT = "/tmp/it's \"odd\".step""#));
    }

    #[tokio::test]
    async fn test_script_written_to_workspace() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = ScriptingEngine::write_tessellation_script(
            &dir.path().join("a.step"),
            &dir.path().join("a.partial.obj"),
            2.0,
            dir.path(),
        )
        .await
        .expect("write");
        assert_eq!(script.file_name().unwrap(), "tessellate_obj.py");
        let body = std::fs::read_to_string(script).expect("read");
        assert!(body.starts_with("import sys\n"));
    }
}
