// Artifact staging directory shared between the host and the isolate
//
// Every run gets its own `<root>/<run-id>/` directory, so concurrent runs
// never touch the same path. The directory (source plus anything the
// compiler emits next to it) is removed when the run ends.

use crate::error::IsolateError;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Workspace {
    host_root: PathBuf,
    sandbox_root: PathBuf,
}

impl Workspace {
    /// `host_root` is where files are written; `sandbox_root` is the same
    /// directory as mounted inside the isolate.
    pub fn new(host_root: impl Into<PathBuf>, sandbox_root: impl Into<PathBuf>) -> Self {
        Self {
            host_root: host_root.into(),
            sandbox_root: sandbox_root.into(),
        }
    }

    /// A workspace whose host and sandbox views are the same directory.
    pub fn local(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self::new(root.clone(), root)
    }

    pub fn host_root(&self) -> &Path {
        &self.host_root
    }

    pub fn sandbox_root(&self) -> &Path {
        &self.sandbox_root
    }

    /// Create the root and remove run directories left behind by a crash.
    pub async fn prepare_root(&self) -> Result<usize, IsolateError> {
        tokio::fs::create_dir_all(&self.host_root)
            .await
            .map_err(|source| IsolateError::ArtifactWrite {
                path: self.host_root.clone(),
                source,
            })?;

        let mut swept = 0;
        let mut entries = tokio::fs::read_dir(&self.host_root)
            .await
            .map_err(|source| IsolateError::ArtifactWrite {
                path: self.host_root.clone(),
                source,
            })?;

        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            let is_run_dir = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| Uuid::parse_str(n).is_ok());
            if !is_run_dir {
                continue;
            }
            match tokio::fs::remove_dir_all(&path).await {
                Ok(()) => swept += 1,
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to sweep stale run directory"),
            }
        }

        if swept > 0 {
            info!(swept, root = %self.host_root.display(), "Removed stale run directories");
        }
        Ok(swept)
    }

    /// Write `source` as `file_name` into a fresh run directory.
    pub async fn stage(&self, file_name: &str, source: &str) -> Result<StagedArtifact, IsolateError> {
        let run_id = Uuid::new_v4();
        let host_dir = self.host_root.join(run_id.to_string());
        let host_file = host_dir.join(file_name);

        let write_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| IsolateError::ArtifactWrite { path, source }
        };

        // Never write over leftovers, even though run ids are unique
        if tokio::fs::try_exists(&host_dir).await.unwrap_or(false) {
            tokio::fs::remove_dir_all(&host_dir)
                .await
                .map_err(write_err(&host_dir))?;
        }
        tokio::fs::create_dir_all(&host_dir)
            .await
            .map_err(write_err(&host_dir))?;

        // Armed before the write so a failed write still cleans up
        let staged = StagedArtifact {
            run_id,
            host_dir: host_dir.clone(),
            sandbox_dir: self.sandbox_root.join(run_id.to_string()),
            file_name: file_name.to_string(),
            released: false,
        };

        open_for_isolate(&host_dir).await.map_err(write_err(&host_dir))?;
        tokio::fs::write(&host_file, source)
            .await
            .map_err(write_err(&host_file))?;

        debug!(run_id = %run_id, path = %host_file.display(), bytes = source.len(), "Artifact staged");
        Ok(staged)
    }
}

/// Processes inside the container may run as a different user and need to
/// write compiler output into the run directory.
#[cfg(unix)]
async fn open_for_isolate(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o777)).await
}

#[cfg(not(unix))]
async fn open_for_isolate(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

/// A staged source file, owned by exactly one run.
///
/// Call [`StagedArtifact::release`] when the run ends. If the owning future
/// is dropped first, `Drop` removes the directory synchronously.
#[derive(Debug)]
pub struct StagedArtifact {
    pub run_id: Uuid,
    host_dir: PathBuf,
    sandbox_dir: PathBuf,
    file_name: String,
    released: bool,
}

impl StagedArtifact {
    pub fn host_dir(&self) -> &Path {
        &self.host_dir
    }

    /// Path of the source file inside the isolate.
    pub fn sandbox_file(&self) -> PathBuf {
        self.sandbox_dir.join(&self.file_name)
    }

    pub fn sandbox_dir(&self) -> &Path {
        &self.sandbox_dir
    }

    pub async fn release(mut self) -> std::io::Result<()> {
        self.released = true;
        match tokio::fs::remove_dir_all(&self.host_dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl Drop for StagedArtifact {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.host_dir) {
            if e.kind() != std::io::ErrorKind::NotFound {
                eprintln!("⚠ Failed to remove run directory {}: {}", self.host_dir.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stage_writes_into_unique_run_dir() {
        let root = tempfile::tempdir().unwrap();
        let workspace = Workspace::new(root.path(), "/code-tmp");

        let first = workspace.stage("code.py", "print(1)").await.unwrap();
        let second = workspace.stage("code.py", "print(2)").await.unwrap();

        assert_ne!(first.run_id, second.run_id);
        assert_eq!(std::fs::read_to_string(first.host_dir().join("code.py")).unwrap(), "print(1)");
        assert_eq!(std::fs::read_to_string(second.host_dir().join("code.py")).unwrap(), "print(2)");
        assert_eq!(
            first.sandbox_file(),
            PathBuf::from(format!("/code-tmp/{}/code.py", first.run_id))
        );
    }

    #[tokio::test]
    async fn test_release_removes_whole_run_dir() {
        let root = tempfile::tempdir().unwrap();
        let workspace = Workspace::local(root.path());

        let staged = workspace.stage("Main.java", "class Main {}").await.unwrap();
        let dir = staged.host_dir().to_path_buf();
        std::fs::write(dir.join("Main.class"), b"compiled").unwrap();

        staged.release().await.unwrap();
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_drop_removes_unreleased_artifact() {
        let root = tempfile::tempdir().unwrap();
        let workspace = Workspace::local(root.path());

        let staged = workspace.stage("code.js", "1").await.unwrap();
        let dir = staged.host_dir().to_path_buf();
        drop(staged);

        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_prepare_root_sweeps_only_run_dirs() {
        let root = tempfile::tempdir().unwrap();
        let stale = root.path().join(Uuid::new_v4().to_string());
        std::fs::create_dir_all(&stale).unwrap();
        std::fs::write(stale.join("code.py"), "old").unwrap();
        let unrelated = root.path().join("keep-me");
        std::fs::create_dir_all(&unrelated).unwrap();

        let workspace = Workspace::local(root.path());
        let swept = workspace.prepare_root().await.unwrap();

        assert_eq!(swept, 1);
        assert!(!stale.exists());
        assert!(unrelated.exists());
    }

    #[tokio::test]
    async fn test_stage_fails_when_root_is_unwritable() {
        let root = tempfile::tempdir().unwrap();
        let blocker = root.path().join("not-a-dir");
        std::fs::write(&blocker, "file").unwrap();

        let workspace = Workspace::local(&blocker);
        let err = workspace.stage("code.py", "print(1)").await.unwrap_err();
        assert!(matches!(err, IsolateError::ArtifactWrite { .. }));
    }
}
