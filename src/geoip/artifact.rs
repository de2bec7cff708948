//! Ownership of the decompressed sibling file.

use std::path::{Path, PathBuf};

/// A file created by the stage that must be removed when the stage stops.
///
/// Removal happens exactly once: on an explicit `release`, or on drop if
/// `release` was never called. Failure to remove is logged, never fatal.
#[derive(Debug)]
pub struct TempArtifact {
    path: PathBuf,
    released: bool,
}

impl TempArtifact {
    /// Takes ownership of the file at `path`.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            released: false,
        }
    }

    /// Path of the owned file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Deletes the file. Subsequent calls do nothing.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        match std::fs::remove_file(&self.path) {
            Ok(()) => log::info!("Removed decompressed database {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!(
                "Failed to remove decompressed database {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        self.release();
    }
}
