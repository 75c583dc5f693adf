//! Minimal Wavefront OBJ reader.
//!
//! Reads vertex positions, normals, polygonal faces (fan-triangulated) and
//! material references. Texture coordinates, groups and smoothing are
//! accepted and ignored.

use crate::error::ConversionError;

/// One triangle corner: indices into the model's position/normal arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Corner {
    /// 0-based position index.
    pub position: u32,
    /// 0-based normal index, if the face gave one.
    pub normal: Option<u32>,
}

/// Triangles sharing one material.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaceGroup {
    /// Material selected with `usemtl`, if any.
    pub material: Option<String>,
    /// Triangles in file order.
    pub triangles: Vec<[Corner; 3]>,
}

/// A parsed OBJ file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjModel {
    /// Vertex positions.
    pub positions: Vec<[f32; 3]>,
    /// Vertex normals.
    pub normals: Vec<[f32; 3]>,
    /// Material libraries named by `mtllib`.
    pub material_libraries: Vec<String>,
    /// Faces grouped by material, in order of first use.
    pub groups: Vec<FaceGroup>,
}

impl ObjModel {
    /// Parse OBJ text.
    pub fn parse(text: &str) -> Result<Self, ConversionError> {
        let mut model = ObjModel::default();
        let mut current_group: Option<usize> = None;

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.split('#').next().unwrap_or("").trim();
            let Some((keyword, rest)) = split_keyword(line) else {
                continue;
            };

            match keyword {
                "v" => model.positions.push(parse_vec3(rest, line_no)?),
                "vn" => model.normals.push(parse_vec3(rest, line_no)?),
                "f" => {
                    let corners = rest
                        .split_whitespace()
                        .map(|token| model.parse_corner(token, line_no))
                        .collect::<Result<Vec<_>, _>>()?;
                    if corners.len() < 3 {
                        return Err(parse_error(line_no, "face has fewer than 3 vertices"));
                    }

                    let group = match current_group {
                        Some(group) => group,
                        None => {
                            model.groups.push(FaceGroup::default());
                            let group = model.groups.len() - 1;
                            current_group = Some(group);
                            group
                        }
                    };
                    let triangles = &mut model.groups[group].triangles;
                    for i in 1..corners.len() - 1 {
                        triangles.push([corners[0], corners[i], corners[i + 1]]);
                    }
                }
                "usemtl" => {
                    let name = rest.to_string();
                    let existing = model
                        .groups
                        .iter()
                        .position(|g| g.material.as_deref() == Some(name.as_str()));
                    current_group = Some(existing.unwrap_or_else(|| {
                        model.groups.push(FaceGroup {
                            material: Some(name),
                            triangles: Vec::new(),
                        });
                        model.groups.len() - 1
                    }));
                }
                "mtllib" => {
                    if !rest.is_empty() {
                        model.material_libraries.push(rest.to_string());
                    }
                }
                _ => {}
            }
        }

        model.groups.retain(|g| !g.triangles.is_empty());
        if model.groups.is_empty() {
            return Err(ConversionError::EmptyMesh);
        }

        Ok(model)
    }

    /// Total number of triangles.
    pub fn triangle_count(&self) -> usize {
        self.groups.iter().map(|g| g.triangles.len()).sum()
    }

    fn parse_corner(&self, token: &str, line_no: usize) -> Result<Corner, ConversionError> {
        let mut fields = token.split('/');
        let position = fields
            .next()
            .ok_or_else(|| parse_error(line_no, "empty face vertex"))?;
        let _texcoord = fields.next();
        let normal = fields.next().filter(|n| !n.is_empty());

        Ok(Corner {
            position: resolve_index(position, self.positions.len(), line_no)?,
            normal: normal
                .map(|n| resolve_index(n, self.normals.len(), line_no))
                .transpose()?,
        })
    }
}

fn split_keyword(line: &str) -> Option<(&str, &str)> {
    if line.is_empty() {
        return None;
    }
    match line.split_once(char::is_whitespace) {
        Some((keyword, rest)) => Some((keyword, rest.trim())),
        None => Some((line, "")),
    }
}

fn parse_vec3(rest: &str, line_no: usize) -> Result<[f32; 3], ConversionError> {
    let mut values = [0.0f32; 3];
    let mut fields = rest.split_whitespace();
    for value in values.iter_mut() {
        let field = fields
            .next()
            .ok_or_else(|| parse_error(line_no, "expected 3 coordinates"))?;
        let parsed: f32 = field
            .parse()
            .map_err(|_| parse_error(line_no, format!("invalid number '{field}'")))?;
        if !parsed.is_finite() {
            return Err(parse_error(line_no, format!("non-finite number '{field}'")));
        }
        *value = parsed;
    }
    Ok(values)
}

/// Resolve a 1-based (or negative, relative) OBJ index to a 0-based one.
fn resolve_index(field: &str, len: usize, line_no: usize) -> Result<u32, ConversionError> {
    let index: i64 = field
        .parse()
        .map_err(|_| parse_error(line_no, format!("invalid index '{field}'")))?;

    let resolved = if index > 0 {
        index - 1
    } else if index < 0 {
        len as i64 + index
    } else {
        return Err(parse_error(line_no, "index 0 is not valid"));
    };

    if resolved < 0 || resolved >= len as i64 {
        return Err(parse_error(
            line_no,
            format!("index {index} out of range ({len} defined)"),
        ));
    }
    u32::try_from(resolved).map_err(|_| parse_error(line_no, "index exceeds u32"))
}

fn parse_error(line: usize, reason: impl Into<String>) -> ConversionError {
    ConversionError::ObjParse {
        line,
        reason: reason.into(),
    }
}
