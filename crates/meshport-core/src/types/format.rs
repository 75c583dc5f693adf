//! Mesh/CAD formats and the conversion stages that connect them.

use serde::{Deserialize, Serialize};

/// Every file format the pipeline reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeshFormat {
    /// STEP (ISO 10303-21) boundary-representation solid.
    Step,
    /// STL triangle mesh.
    Stl,
    /// Wavefront OBJ mesh.
    Obj,
    /// Wavefront material library (companion of OBJ).
    Mtl,
    /// Binary glTF 2.0.
    Glb,
}

impl MeshFormat {
    /// Determine the format from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "step" | "stp" | "p21" => Some(Self::Step),
            "stl" => Some(Self::Stl),
            "obj" => Some(Self::Obj),
            "mtl" => Some(Self::Mtl),
            "glb" => Some(Self::Glb),
            _ => None,
        }
    }

    /// Canonical file extension written for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Step => "step",
            Self::Stl => "stl",
            Self::Obj => "obj",
            Self::Mtl => "mtl",
            Self::Glb => "glb",
        }
    }

    /// Content type sent with uploads.
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Step => "model/step",
            Self::Stl => "model/stl",
            Self::Obj => "model/obj",
            Self::Mtl => "model/mtl",
            Self::Glb => "model/gltf-binary",
        }
    }
}

impl std::fmt::Display for MeshFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// Identifier of a single conversion stage.
///
/// Chains are declared in configuration as ordered lists of these
/// identifiers (`step = ["step_to_obj", "obj_to_glb"]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Tessellate STEP geometry and serialize it as STL.
    StepToStl,
    /// Tessellate STEP geometry into OBJ with a synthesized material library.
    StepToObj,
    /// Re-export an OBJ+MTL pair as binary glTF.
    ObjToGlb,
}

impl StageKind {
    /// All known stages.
    pub const ALL: [StageKind; 3] = [Self::StepToStl, Self::StepToObj, Self::ObjToGlb];

    /// Stable stage name used in logs, errors, and configuration.
    pub fn name(&self) -> &'static str {
        match self {
            Self::StepToStl => "step_to_stl",
            Self::StepToObj => "step_to_obj",
            Self::ObjToGlb => "obj_to_glb",
        }
    }

    /// Format consumed by the stage.
    pub fn input(&self) -> MeshFormat {
        match self {
            Self::StepToStl | Self::StepToObj => MeshFormat::Step,
            Self::ObjToGlb => MeshFormat::Obj,
        }
    }

    /// Format produced by the stage.
    pub fn output(&self) -> MeshFormat {
        match self {
            Self::StepToStl => MeshFormat::Stl,
            Self::StepToObj => MeshFormat::Obj,
            Self::ObjToGlb => MeshFormat::Glb,
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_aliases() {
        assert_eq!(MeshFormat::from_extension("STEP"), Some(MeshFormat::Step));
        assert_eq!(MeshFormat::from_extension("stp"), Some(MeshFormat::Step));
        assert_eq!(MeshFormat::from_extension("dwg"), None);
    }

    #[test]
    fn test_stage_formats_chain() {
        assert_eq!(StageKind::StepToObj.output(), StageKind::ObjToGlb.input());
        assert_eq!(StageKind::StepToStl.output(), MeshFormat::Stl);
    }

    #[test]
    fn test_stage_serde_names() {
        let json = serde_json::to_string(&StageKind::ObjToGlb).expect("serialize");
        assert_eq!(json, "\"obj_to_glb\"");
        for stage in StageKind::ALL {
            let parsed: StageKind =
                serde_json::from_str(&format!("\"{}\"", stage.name())).expect("deserialize");
            assert_eq!(parsed, stage);
        }
    }
}
