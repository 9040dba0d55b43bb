//! Per-render temporary file scope.
//!
//! Every artifact a render writes to disk (subtitle track, extracted
//! sticker images, probe frames) is allocated through a [`TempScope`].
//! The scope owns a unique-suffixed directory and a registry of the paths it
//! handed out; [`TempScope::cleanup`] drains both, and `Drop` runs the same
//! drain so error returns and dropped (cancelled) futures are covered too.

use std::path::{Path, PathBuf};

use crate::error::{ReelcutError, ReelcutResult};

/// Scoped registry of temporary files for a single render.
#[derive(Debug)]
pub struct TempScope {
    dir: Option<tempfile::TempDir>,
    root: PathBuf,
    files: Vec<PathBuf>,
    next_id: u32,
}

impl TempScope {
    /// Create a scope under the system temp directory.
    pub fn new() -> ReelcutResult<Self> {
        Self::new_in(std::env::temp_dir())
    }

    /// Create a scope under `parent`, which must exist.
    pub fn new_in(parent: impl AsRef<Path>) -> ReelcutResult<Self> {
        let dir = tempfile::Builder::new()
            .prefix("reelcut-render-")
            .tempdir_in(parent.as_ref())?;
        let root = dir.path().to_path_buf();
        tracing::debug!(root = %root.display(), "Allocated render temp scope");
        Ok(Self {
            dir: Some(dir),
            root,
            files: Vec::new(),
            next_id: 0,
        })
    }

    /// Directory that holds this scope's files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reserve a fresh path inside the scope and register it for removal.
    ///
    /// The file itself is not created.
    pub fn allocate(&mut self, stem: &str, extension: &str) -> PathBuf {
        let path = self
            .root
            .join(format!("{stem}-{:03}.{extension}", self.next_id));
        self.next_id += 1;
        self.files.push(path.clone());
        path
    }

    /// Write `contents` to a freshly allocated path.
    pub fn write(
        &mut self,
        stem: &str,
        extension: &str,
        contents: impl AsRef<[u8]>,
    ) -> ReelcutResult<PathBuf> {
        let path = self.allocate(stem, extension);
        std::fs::write(&path, contents)?;
        Ok(path)
    }

    /// Paths registered so far.
    pub fn registered(&self) -> &[PathBuf] {
        &self.files
    }

    /// Remove every registered file and the scope directory.
    ///
    /// Failures are logged and never returned. Calling this twice is a no-op.
    pub fn cleanup(&mut self) {
        for path in self.files.drain(..) {
            if let Err(source) = remove_if_present(&path) {
                let err = ReelcutError::Cleanup { path, source };
                tracing::warn!(error = %err, "Temp cleanup failed");
            }
        }

        if let Some(dir) = self.dir.take() {
            let root = dir.path().to_path_buf();
            if let Err(source) = dir.close() {
                let err = ReelcutError::Cleanup { path: root, source };
                tracing::warn!(error = %err, "Temp scope removal failed");
            }
        }
    }
}

impl Drop for TempScope {
    fn drop(&mut self) {
        self.cleanup();
    }
}

fn remove_if_present(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocated_paths_are_unique() {
        let parent = tempfile::tempdir().unwrap();
        let mut scope = TempScope::new_in(parent.path()).unwrap();
        let a = scope.allocate("frame", "jpg");
        let b = scope.allocate("frame", "jpg");
        assert_ne!(a, b);
        assert!(a.starts_with(scope.root()));
    }

    #[test]
    fn test_cleanup_removes_written_and_unwritten_files() {
        let parent = tempfile::tempdir().unwrap();
        let mut scope = TempScope::new_in(parent.path()).unwrap();
        let written = scope.write("captions", "ass", "[Script Info]").unwrap();
        let reserved = scope.allocate("frame", "jpg");
        assert!(written.exists());

        scope.cleanup();
        assert!(!written.exists());
        assert!(!reserved.exists());
        assert_eq!(std::fs::read_dir(parent.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_drop_drains_scope() {
        let parent = tempfile::tempdir().unwrap();
        let written = {
            let mut scope = TempScope::new_in(parent.path()).unwrap();
            scope.write("sticker", "png", [0u8; 8]).unwrap()
        };
        assert!(!written.exists());
        assert_eq!(std::fs::read_dir(parent.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_unregistered_files_in_root_are_removed() {
        let parent = tempfile::tempdir().unwrap();
        let mut scope = TempScope::new_in(parent.path()).unwrap();
        std::fs::write(scope.root().join("stray.log"), "x").unwrap();
        scope.cleanup();
        assert_eq!(std::fs::read_dir(parent.path()).unwrap().count(), 0);
    }
}
