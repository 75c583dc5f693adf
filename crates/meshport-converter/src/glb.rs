//! Binary glTF 2.0 (GLB) export.
//!
//! Writes one mesh with one primitive per material group. Positions (and
//! normals, when every face corner has one) are shared by all primitives;
//! each primitive has its own `u32` index accessor. The output contains no
//! timestamps or random ids, so identical input yields identical bytes.

use std::collections::HashMap;

use serde_json::{Value, json};

use crate::error::ConversionError;
use crate::material::MaterialDescriptor;
use crate::obj::{Corner, ObjModel};

/// `glTF` magic, little-endian.
pub const GLB_MAGIC: u32 = 0x4654_6C67;
/// GLB container version.
pub const GLB_VERSION: u32 = 2;
const CHUNK_JSON: u32 = 0x4E4F_534A;
const CHUNK_BIN: u32 = 0x004E_4942;

const COMPONENT_FLOAT: u32 = 5126;
const COMPONENT_UNSIGNED_INT: u32 = 5125;
const TARGET_ARRAY_BUFFER: u32 = 34962;
const TARGET_ELEMENT_ARRAY_BUFFER: u32 = 34963;

/// Name given to the fallback material.
pub const DEFAULT_MATERIAL: &str = "DefaultMaterial";

/// Result of an export.
#[derive(Debug, Clone)]
pub struct GlbOutput {
    /// The complete GLB file.
    pub bytes: Vec<u8>,
    /// Materials referenced by the mesh that the library did not define.
    pub unresolved_materials: Vec<String>,
}

/// Encode `model` as GLB, resolving `usemtl` names against `materials`.
///
/// Faces without a resolvable material use a white default material.
pub fn encode_glb(
    model: &ObjModel,
    materials: &[MaterialDescriptor],
) -> Result<GlbOutput, ConversionError> {
    if model.triangle_count() == 0 {
        return Err(ConversionError::EmptyMesh);
    }

    let with_normals = model
        .groups
        .iter()
        .flat_map(|g| g.triangles.iter().flatten())
        .all(|c| c.normal.is_some());

    // De-index corners into a flat vertex list.
    let mut vertex_ids: HashMap<Corner, u32> = HashMap::new();
    let mut positions: Vec<[f32; 3]> = Vec::new();
    let mut normals: Vec<[f32; 3]> = Vec::new();
    let mut primitive_indices: Vec<Vec<u32>> = Vec::with_capacity(model.groups.len());

    for group in &model.groups {
        let mut indices = Vec::with_capacity(group.triangles.len() * 3);
        for corner in group.triangles.iter().flatten() {
            let key = if with_normals {
                *corner
            } else {
                Corner {
                    position: corner.position,
                    normal: None,
                }
            };
            let id = match vertex_ids.get(&key) {
                Some(id) => *id,
                None => {
                    let id = positions.len() as u32;
                    positions.push(model.positions[key.position as usize]);
                    if let Some(n) = key.normal {
                        normals.push(model.normals[n as usize]);
                    }
                    vertex_ids.insert(key, id);
                    id
                }
            };
            indices.push(id);
        }
        primitive_indices.push(indices);
    }

    // Materials in order of first use; unresolved names share one default.
    let mut gltf_materials: Vec<Value> = Vec::new();
    let mut material_slots: HashMap<String, usize> = HashMap::new();
    let mut default_slot: Option<usize> = None;
    let mut unresolved = Vec::new();
    let mut primitive_materials = Vec::with_capacity(model.groups.len());

    for group in &model.groups {
        let resolved = group
            .material
            .as_deref()
            .and_then(|name| materials.iter().find(|m| m.name == name));

        let slot = match resolved {
            Some(material) => *material_slots
                .entry(material.name.clone())
                .or_insert_with(|| {
                    gltf_materials.push(material_json(material));
                    gltf_materials.len() - 1
                }),
            None => {
                if let Some(name) = &group.material {
                    if !unresolved.contains(name) {
                        unresolved.push(name.clone());
                    }
                }
                *default_slot.get_or_insert_with(|| {
                    let mut fallback = MaterialDescriptor::white();
                    fallback.name = DEFAULT_MATERIAL.to_string();
                    gltf_materials.push(material_json(&fallback));
                    gltf_materials.len() - 1
                })
            }
        };
        primitive_materials.push(slot);
    }

    // Binary buffer: positions, normals, then one index block per primitive.
    let mut bin: Vec<u8> = Vec::new();
    let mut buffer_views: Vec<Value> = Vec::new();
    let mut accessors: Vec<Value> = Vec::new();

    let (min, max) = bounds(&positions);
    let position_accessor = push_vec3(&mut bin, &mut buffer_views, &mut accessors, &positions);
    accessors[position_accessor]["min"] = json!(min);
    accessors[position_accessor]["max"] = json!(max);

    let normal_accessor = if with_normals {
        Some(push_vec3(&mut bin, &mut buffer_views, &mut accessors, &normals))
    } else {
        None
    };

    let mut primitives = Vec::with_capacity(primitive_indices.len());
    for (indices, material) in primitive_indices.iter().zip(&primitive_materials) {
        let offset = bin.len();
        for index in indices {
            bin.extend_from_slice(&index.to_le_bytes());
        }
        buffer_views.push(json!({
            "buffer": 0,
            "byteOffset": offset,
            "byteLength": indices.len() * 4,
            "target": TARGET_ELEMENT_ARRAY_BUFFER,
        }));
        accessors.push(json!({
            "bufferView": buffer_views.len() - 1,
            "componentType": COMPONENT_UNSIGNED_INT,
            "count": indices.len(),
            "type": "SCALAR",
        }));

        let mut attributes = json!({ "POSITION": position_accessor });
        if let Some(normal) = normal_accessor {
            attributes["NORMAL"] = json!(normal);
        }
        primitives.push(json!({
            "attributes": attributes,
            "indices": accessors.len() - 1,
            "material": material,
            "mode": 4,
        }));
    }

    let document = json!({
        "asset": { "version": "2.0", "generator": "meshport" },
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "mesh": 0 }],
        "meshes": [{ "primitives": primitives }],
        "materials": gltf_materials,
        "accessors": accessors,
        "bufferViews": buffer_views,
        "buffers": [{ "byteLength": bin.len() }],
    });

    let json_bytes = serde_json::to_vec(&document)
        .map_err(|e| ConversionError::Io(std::io::Error::other(e)))?;

    Ok(GlbOutput {
        bytes: assemble(json_bytes, bin),
        unresolved_materials: unresolved,
    })
}

fn material_json(material: &MaterialDescriptor) -> Value {
    let [r, g, b] = material.diffuse;
    let alpha = material.dissolve.clamp(0.0, 1.0);
    // Blinn-Phong exponent to perceptual roughness.
    let roughness = (2.0 / (material.shininess.max(0.0) + 2.0)).sqrt();

    let mut value = json!({
        "name": material.name,
        "pbrMetallicRoughness": {
            "baseColorFactor": [r, g, b, alpha],
            "metallicFactor": 0.0,
            "roughnessFactor": roughness,
        },
        "doubleSided": true,
    });
    if alpha < 1.0 {
        value["alphaMode"] = json!("BLEND");
    }
    value
}

fn push_vec3(
    bin: &mut Vec<u8>,
    buffer_views: &mut Vec<Value>,
    accessors: &mut Vec<Value>,
    data: &[[f32; 3]],
) -> usize {
    let offset = bin.len();
    for v in data {
        for c in v {
            bin.extend_from_slice(&c.to_le_bytes());
        }
    }
    buffer_views.push(json!({
        "buffer": 0,
        "byteOffset": offset,
        "byteLength": data.len() * 12,
        "target": TARGET_ARRAY_BUFFER,
    }));
    accessors.push(json!({
        "bufferView": buffer_views.len() - 1,
        "componentType": COMPONENT_FLOAT,
        "count": data.len(),
        "type": "VEC3",
    }));
    accessors.len() - 1
}

fn bounds(positions: &[[f32; 3]]) -> ([f32; 3], [f32; 3]) {
    let mut min = [f32::MAX; 3];
    let mut max = [f32::MIN; 3];
    for p in positions {
        for axis in 0..3 {
            min[axis] = min[axis].min(p[axis]);
            max[axis] = max[axis].max(p[axis]);
        }
    }
    (min, max)
}

/// Wrap the JSON and BIN chunks in a GLB container.
fn assemble(mut json_chunk: Vec<u8>, mut bin_chunk: Vec<u8>) -> Vec<u8> {
    while json_chunk.len() % 4 != 0 {
        json_chunk.push(b' ');
    }
    while bin_chunk.len() % 4 != 0 {
        bin_chunk.push(0);
    }

    let total = 12 + 8 + json_chunk.len() + 8 + bin_chunk.len();
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&GLB_MAGIC.to_le_bytes());
    out.extend_from_slice(&GLB_VERSION.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());

    out.extend_from_slice(&(json_chunk.len() as u32).to_le_bytes());
    out.extend_from_slice(&CHUNK_JSON.to_le_bytes());
    out.extend_from_slice(&json_chunk);

    out.extend_from_slice(&(bin_chunk.len() as u32).to_le_bytes());
    out.extend_from_slice(&CHUNK_BIN.to_le_bytes());
    out.extend_from_slice(&bin_chunk);
    out
}
