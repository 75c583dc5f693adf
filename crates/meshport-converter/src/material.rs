//! Material library synthesis for OBJ output.
//!
//! Tessellated OBJ files carry no shading information. The STEP→OBJ stage
//! writes a fixed white material next to the mesh and patches the mesh
//! header to reference it.

use std::fmt::Write as _;
use std::path::Path;

use crate::error::ConversionError;

/// A Wavefront material definition.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialDescriptor {
    /// Material name (`newmtl`).
    pub name: String,
    /// Ambient color (`Ka`).
    pub ambient: [f32; 3],
    /// Diffuse color (`Kd`).
    pub diffuse: [f32; 3],
    /// Specular color (`Ks`).
    pub specular: [f32; 3],
    /// Specular exponent (`Ns`).
    pub shininess: f32,
    /// Opacity (`d`).
    pub dissolve: f32,
    /// Illumination model (`illum`).
    pub illumination: u8,
}

/// Name of the synthesized material.
pub const WHITE_MATERIAL: &str = "WhiteMaterial";

impl MaterialDescriptor {
    /// The fixed material attached to every tessellated OBJ.
    pub fn white() -> Self {
        Self {
            name: WHITE_MATERIAL.to_string(),
            ambient: [1.0, 1.0, 1.0],
            diffuse: [1.0, 1.0, 1.0],
            specular: [0.5, 0.5, 0.5],
            shininess: 10.0,
            dissolve: 1.0,
            illumination: 2,
        }
    }

    /// Render as an `.mtl` file body.
    pub fn to_mtl(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "newmtl {}", self.name);
        let _ = writeln!(out, "Ka {}", rgb(self.ambient));
        let _ = writeln!(out, "Kd {}", rgb(self.diffuse));
        let _ = writeln!(out, "Ks {}", rgb(self.specular));
        let _ = writeln!(out, "Ns {:.1}", self.shininess);
        let _ = writeln!(out, "d {:.1}", self.dissolve);
        let _ = writeln!(out, "illum {}", self.illumination);
        out
    }

    /// Parse every material of an `.mtl` body. Unknown statements are
    /// ignored; missing properties keep the Wavefront defaults.
    pub fn parse_library(text: &str) -> Vec<MaterialDescriptor> {
        let mut materials = Vec::new();
        let mut current: Option<MaterialDescriptor> = None;

        for line in text.lines() {
            let mut parts = line.split_whitespace();
            let Some(keyword) = parts.next() else {
                continue;
            };
            let values: Vec<f32> = parts.clone().filter_map(|v| v.parse().ok()).collect();

            if keyword == "newmtl" {
                if let Some(done) = current.take() {
                    materials.push(done);
                }
                let name = parts.collect::<Vec<_>>().join(" ");
                current = Some(MaterialDescriptor::wavefront_default(name));
                continue;
            }

            let Some(material) = current.as_mut() else {
                continue;
            };
            match (keyword, values.as_slice()) {
                ("Ka", [r, g, b, ..]) => material.ambient = [*r, *g, *b],
                ("Kd", [r, g, b, ..]) => material.diffuse = [*r, *g, *b],
                ("Ks", [r, g, b, ..]) => material.specular = [*r, *g, *b],
                ("Ns", [ns, ..]) => material.shininess = *ns,
                ("d", [d, ..]) => material.dissolve = *d,
                ("Tr", [tr, ..]) => material.dissolve = 1.0 - *tr,
                ("illum", [i, ..]) => material.illumination = *i as u8,
                _ => {}
            }
        }

        if let Some(done) = current {
            materials.push(done);
        }
        materials
    }

    fn wavefront_default(name: String) -> Self {
        Self {
            name,
            ambient: [0.2, 0.2, 0.2],
            diffuse: [0.8, 0.8, 0.8],
            specular: [1.0, 1.0, 1.0],
            shininess: 0.0,
            dissolve: 1.0,
            illumination: 2,
        }
    }
}

fn rgb(c: [f32; 3]) -> String {
    format!("{:.1} {:.1} {:.1}", c[0], c[1], c[2])
}

/// Write `material` as an `.mtl` file at `path`.
pub async fn write_mtl(path: &Path, material: &MaterialDescriptor) -> Result<(), ConversionError> {
    tokio::fs::write(path, material.to_mtl()).await?;
    Ok(())
}

/// Prefix the OBJ at `obj_path` with `mtllib` and `usemtl` lines.
///
/// The whole file is read before it is rewritten, so the caller must run
/// this on a not-yet-published (partial) file.
pub async fn patch_obj_header(
    obj_path: &Path,
    mtl_file_name: &str,
    material_name: &str,
) -> Result<(), ConversionError> {
    let body = tokio::fs::read(obj_path).await?;
    let header = format!("mtllib {mtl_file_name}\nusemtl {material_name}\n");

    let mut patched = Vec::with_capacity(header.len() + body.len());
    patched.extend_from_slice(header.as_bytes());
    patched.extend_from_slice(&body);

    tokio::fs::write(obj_path, patched).await?;
    Ok(())
}
