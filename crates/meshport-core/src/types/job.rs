//! Conversion job model and storage-key parsing.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::JobError;
use crate::types::format::MeshFormat;

/// How uploaded object keys encode ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyLayout {
    /// `.../{owner_id}/{file}.{ext}`
    #[default]
    OwnerFile,
    /// `.../{owner_id}/{entity_id}/{file}.{ext}`
    OwnerEntityFile,
}

impl KeyLayout {
    /// Number of trailing key segments the layout consumes.
    pub fn segments(&self) -> usize {
        match self {
            Self::OwnerFile => 2,
            Self::OwnerEntityFile => 3,
        }
    }
}

/// One unit of work: a single uploaded file to convert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionJob {
    /// Owner of the upload (user / customer id).
    pub owner_id: String,
    /// Entity the upload belongs to (part id), for three-segment layouts.
    pub entity_id: Option<String>,
    /// Bucket the source object lives in.
    pub source_bucket: String,
    /// Full (decoded) key of the source object.
    pub source_key: String,
    /// File stem, without extension.
    pub file_name: String,
    /// Lowercased source extension.
    pub source_format: String,
    /// Object size announced by the event, when it carried one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declared_size: Option<u64>,
}

impl ConversionJob {
    /// Parse a decoded storage key according to `layout`.
    ///
    /// Leading prefix segments beyond what the layout consumes are ignored,
    /// so `uploads/user123/part.step` yields owner `user123`.
    pub fn from_key(bucket: &str, key: &str, layout: KeyLayout) -> Result<Self, JobError> {
        let segments: Vec<&str> = key.split('/').collect();
        let needed = layout.segments();

        if segments.len() < needed {
            return Err(JobError::malformed_key(
                key,
                format!(
                    "expected at least {needed} path segments, found {}",
                    segments.len()
                ),
            ));
        }

        let tail = &segments[segments.len() - needed..];
        let file_segment = tail[needed - 1];

        let (stem, ext) = file_segment
            .rsplit_once('.')
            .ok_or_else(|| JobError::malformed_key(key, "file name has no extension"))?;

        if stem.is_empty() {
            return Err(JobError::malformed_key(key, "file name is empty"));
        }
        if ext.is_empty() {
            return Err(JobError::malformed_key(key, "file extension is empty"));
        }

        let owner_id = tail[0];
        check_scope_segment(key, owner_id, "owner")?;

        let entity_id = match layout {
            KeyLayout::OwnerFile => None,
            KeyLayout::OwnerEntityFile => {
                let entity = tail[1];
                check_scope_segment(key, entity, "entity")?;
                Some(entity.to_string())
            }
        };

        Ok(Self {
            owner_id: owner_id.to_string(),
            entity_id,
            source_bucket: bucket.to_string(),
            source_key: key.to_string(),
            file_name: stem.to_string(),
            source_format: ext.to_ascii_lowercase(),
            declared_size: None,
        })
    }

    /// Attach the object size announced by the event.
    pub fn with_declared_size(mut self, size: Option<u64>) -> Self {
        self.declared_size = size;
        self
    }

    /// Name of the source file as uploaded (`part1.step`).
    pub fn source_file_name(&self) -> String {
        format!("{}.{}", self.file_name, self.source_format)
    }

    /// Name of the converted artifact (`part1.glb`).
    pub fn output_name(&self, format: MeshFormat) -> String {
        format!("{}.{}", self.file_name, format.extension())
    }

    /// Destination key: `{prefix}{owner}/[{entity}/]{file}.{ext}`.
    pub fn output_key(&self, prefix: &str, format: MeshFormat) -> String {
        let mut key = String::from(prefix);
        if !key.is_empty() && !key.ends_with('/') {
            key.push('/');
        }
        key.push_str(&self.owner_id);
        key.push('/');
        if let Some(entity) = &self.entity_id {
            key.push_str(entity);
            key.push('/');
        }
        key.push_str(&self.output_name(format));
        key
    }

    /// Relative scratch directory scope for this job's owner/entity.
    pub fn workspace_scope(&self) -> PathBuf {
        let mut scope = PathBuf::from(&self.owner_id);
        if let Some(entity) = &self.entity_id {
            scope.push(entity);
        }
        scope
    }
}

/// Owner/entity segments become scratch directory names, so they must be
/// plain path components.
fn check_scope_segment(key: &str, segment: &str, what: &str) -> Result<(), JobError> {
    if segment.is_empty() {
        return Err(JobError::malformed_key(key, format!("{what} segment is empty")));
    }
    if segment == "." || segment == ".." || segment.contains('\\') {
        return Err(JobError::malformed_key(
            key,
            format!("{what} segment '{segment}' is not a valid identifier"),
        ));
    }
    Ok(())
}

/// A reference to a stored file, as written into metadata records.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FileRef {
    /// File name shown to users.
    pub name: String,
    /// Object key in storage.
    pub key: String,
}

impl FileRef {
    /// Create a new file reference.
    pub fn new(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
        }
    }
}

/// Outcome of a successful pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionResult {
    /// Bucket the artifact was uploaded to.
    pub output_bucket: String,
    /// Key the artifact was uploaded under.
    pub output_key: String,
    /// File name of the artifact.
    pub output_name: String,
    /// Format of the artifact.
    pub output_format: MeshFormat,
    /// Size of the artifact in bytes.
    pub byte_size: Option<u64>,
    /// Stages that ran, in order.
    pub stages: Vec<String>,
    /// Wall-clock duration of the run in milliseconds.
    pub duration_ms: u64,
}

impl ConversionResult {
    /// The artifact as a metadata file reference.
    pub fn file_ref(&self) -> FileRef {
        FileRef::new(&self.output_name, &self.output_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_segment_key() {
        let job = ConversionJob::from_key("bucket", "user123/part1.step", KeyLayout::OwnerFile)
            .expect("parse");
        assert_eq!(job.owner_id, "user123");
        assert_eq!(job.entity_id, None);
        assert_eq!(job.file_name, "part1");
        assert_eq!(job.source_format, "step");
        assert_eq!(job.source_bucket, "bucket");
    }

    #[test]
    fn test_three_segment_key() {
        let job = ConversionJob::from_key(
            "bucket",
            "user123/partA/model.step",
            KeyLayout::OwnerEntityFile,
        )
        .expect("parse");
        assert_eq!(job.owner_id, "user123");
        assert_eq!(job.entity_id.as_deref(), Some("partA"));
        assert_eq!(job.file_name, "model");
        assert_eq!(job.source_format, "step");
    }

    #[test]
    fn test_prefix_segments_ignored() {
        let job = ConversionJob::from_key(
            "bucket",
            "parts/uploads/user9/housing.STP",
            KeyLayout::OwnerFile,
        )
        .expect("parse");
        assert_eq!(job.owner_id, "user9");
        assert_eq!(job.source_format, "stp");
        assert_eq!(job.source_file_name(), "housing.stp");
    }

    #[test]
    fn test_dotted_stem_uses_last_extension() {
        let job = ConversionJob::from_key("b", "u/bracket.v2.step", KeyLayout::OwnerFile)
            .expect("parse");
        assert_eq!(job.file_name, "bracket.v2");
        assert_eq!(job.source_format, "step");
    }

    #[test]
    fn test_malformed_keys() {
        let cases = [
            ("part1.step", KeyLayout::OwnerFile),
            ("user123/part1", KeyLayout::OwnerFile),
            ("user123/part1.", KeyLayout::OwnerFile),
            ("user123/.step", KeyLayout::OwnerFile),
            ("/part1.step", KeyLayout::OwnerFile),
            ("user123/part1.step", KeyLayout::OwnerEntityFile),
            ("user123//model.step", KeyLayout::OwnerEntityFile),
            ("../part1.step", KeyLayout::OwnerFile),
        ];
        for (key, layout) in cases {
            let err = ConversionJob::from_key("b", key, layout).expect_err(key);
            assert!(
                matches!(err, JobError::MalformedKey { .. }),
                "{key} should be malformed"
            );
        }
    }

    #[test]
    fn test_output_key_layouts() {
        let job = ConversionJob::from_key("b", "user123/part1.step", KeyLayout::OwnerFile)
            .expect("parse");
        assert_eq!(
            job.output_key("parts/web_ready/", MeshFormat::Stl),
            "parts/web_ready/user123/part1.stl"
        );
        assert_eq!(
            job.output_key("parts/web_ready", MeshFormat::Glb),
            "parts/web_ready/user123/part1.glb"
        );

        let job = ConversionJob::from_key(
            "b",
            "user123/partA/model.step",
            KeyLayout::OwnerEntityFile,
        )
        .expect("parse");
        assert_eq!(
            job.output_key("parts/web_ready/", MeshFormat::Stl),
            "parts/web_ready/user123/partA/model.stl"
        );
        assert_eq!(job.workspace_scope(), PathBuf::from("user123").join("partA"));
    }
}
