//! Per-run scratch workspace.
//!
//! Layout: `{scratch_root}/{owner_id}/[{entity_id}/]{run_id}/`. The run id
//! is a fresh UUIDv7, so two runs never share a directory even for the same
//! key. The directory is removed on every exit path: explicitly through
//! [`Workspace::cleanup`], or by `Drop` if the run future is abandoned.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ConversionError;

/// Scratch directory owned by one pipeline run.
#[derive(Debug)]
pub struct Workspace {
    scratch_root: PathBuf,
    dir: PathBuf,
    run_id: Uuid,
    removed: bool,
}

impl Workspace {
    /// Create the workspace for `scope` (owner or owner/entity) under
    /// `scratch_root`.
    pub async fn create(scratch_root: &Path, scope: &Path) -> std::io::Result<Self> {
        let run_id = Uuid::now_v7();
        let dir = scratch_root.join(scope).join(run_id.simple().to_string());
        tokio::fs::create_dir_all(&dir).await?;
        debug!(workspace = %dir.display(), "Created workspace");

        Ok(Self {
            scratch_root: scratch_root.to_path_buf(),
            dir,
            run_id,
            removed: false,
        })
    }

    /// The run directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Identifier of this run.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Path of a file inside the workspace.
    pub fn path(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    /// Remove the workspace and any scope directories it leaves empty.
    ///
    /// Failures are logged and swallowed; cleanup never fails a job.
    pub async fn cleanup(mut self) {
        self.removed = true;
        if let Err(e) = tokio::fs::remove_dir_all(&self.dir).await {
            warn!(workspace = %self.dir.display(), error = %e, "Failed to clean up workspace");
            return;
        }
        self.prune_scope_dirs();
        debug!(workspace = %self.dir.display(), "Removed workspace");
    }

    /// Remove now-empty owner/entity directories up to the scratch root.
    /// `remove_dir` refuses non-empty directories, so a concurrent run for
    /// the same scope is unaffected.
    fn prune_scope_dirs(&self) {
        let mut current = self.dir.parent();
        while let Some(dir) = current {
            if dir == self.scratch_root || !dir.starts_with(&self.scratch_root) {
                break;
            }
            if std::fs::remove_dir(dir).is_err() {
                break;
            }
            current = dir.parent();
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.dir) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(workspace = %self.dir.display(), error = %e, "Failed to clean up workspace on drop");
            }
        }
        self.prune_scope_dirs();
    }
}

/// Sibling path a stage writes to before its output is validated:
/// `part1.stl` → `part1.partial.stl`.
pub fn partial_path(final_path: &Path) -> PathBuf {
    let stem = final_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match final_path.extension() {
        Some(ext) => format!("{stem}.partial.{}", ext.to_string_lossy()),
        None => format!("{stem}.partial"),
    };
    final_path.with_file_name(name)
}

/// Validate a partial output and rename it to its final name.
///
/// On failure the partial file is removed, so nothing usable-looking is
/// left behind.
pub async fn commit_output(
    partial: &Path,
    final_path: &Path,
    min_bytes: u64,
) -> Result<u64, ConversionError> {
    let size = match tokio::fs::metadata(partial).await {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConversionError::OutputNotCreated {
                path: final_path.to_path_buf(),
            });
        }
        Err(e) => return Err(e.into()),
    };

    if size < min_bytes.max(1) {
        let _ = tokio::fs::remove_file(partial).await;
        return Err(ConversionError::OutputEmpty {
            path: final_path.to_path_buf(),
            size,
        });
    }

    tokio::fs::rename(partial, final_path).await?;
    Ok(size)
}

/// Remove a partial output left by a failed attempt.
pub async fn discard_partial(partial: &Path) {
    match tokio::fs::remove_file(partial).await {
        Ok(()) => debug!(path = %partial.display(), "Discarded partial output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %partial.display(), error = %e, "Failed to discard partial output"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_runs_get_distinct_directories() {
        let root = tempfile::tempdir().unwrap();
        let scope = Path::new("user123").join("partA");
        let a = Workspace::create(root.path(), &scope).await.unwrap();
        let b = Workspace::create(root.path(), &scope).await.unwrap();

        assert_ne!(a.dir(), b.dir());
        assert!(a.dir().starts_with(root.path().join("user123/partA")));
        assert!(a.dir().is_dir() && b.dir().is_dir());
    }

    #[tokio::test]
    async fn test_cleanup_removes_run_and_empty_scope() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::create(root.path(), Path::new("user123"))
            .await
            .unwrap();
        std::fs::write(ws.path("part1.step"), b"data").unwrap();
        let dir = ws.dir().to_path_buf();

        ws.cleanup().await;

        assert!(!dir.exists());
        assert!(!root.path().join("user123").exists());
        assert!(root.path().exists());
    }

    #[tokio::test]
    async fn test_cleanup_keeps_sibling_run() {
        let root = tempfile::tempdir().unwrap();
        let a = Workspace::create(root.path(), Path::new("u")).await.unwrap();
        let b = Workspace::create(root.path(), Path::new("u")).await.unwrap();
        a.cleanup().await;
        assert!(b.dir().is_dir());
    }

    #[tokio::test]
    async fn test_drop_removes_directory() {
        let root = tempfile::tempdir().unwrap();
        let dir = {
            let ws = Workspace::create(root.path(), Path::new("u")).await.unwrap();
            ws.dir().to_path_buf()
        };
        assert!(!dir.exists());
    }

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path(Path::new("/w/part1.stl")),
            PathBuf::from("/w/part1.partial.stl")
        );
        assert_eq!(
            partial_path(Path::new("/w/bracket.v2.obj")),
            PathBuf::from("/w/bracket.v2.partial.obj")
        );
    }

    #[tokio::test]
    async fn test_commit_output() {
        let dir = tempfile::tempdir().unwrap();
        let final_path = dir.path().join("a.stl");
        let partial = partial_path(&final_path);

        let err = commit_output(&partial, &final_path, 1).await.unwrap_err();
        assert!(matches!(err, ConversionError::OutputNotCreated { .. }));

        std::fs::write(&partial, b"").unwrap();
        let err = commit_output(&partial, &final_path, 1).await.unwrap_err();
        assert!(matches!(err, ConversionError::OutputEmpty { size: 0, .. }));
        assert!(!partial.exists());
        assert!(!final_path.exists());

        std::fs::write(&partial, b"solid a\nendsolid a\n").unwrap();
        let size = commit_output(&partial, &final_path, 1).await.unwrap();
        assert_eq!(size, 19);
        assert!(final_path.exists());
        assert!(!partial.exists());
    }
}
