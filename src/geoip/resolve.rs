//! Database resource resolution.
//!
//! A configured path wins outright. Without one, an ordered list of
//! well-known locations is probed and the first existing file is used.

use std::path::{Path, PathBuf};

use crate::config::{GEOIP_DB_FILE_NAME, SYSTEM_GEOIP_DIRS, VENDOR_DATA_DIR};
use crate::error_handling::ConfigurationError;

/// Where a candidate location is anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// Process working directory
    WorkingDir,
    /// Installation directory of the running binary
    InstallDir,
    /// Absolute system path
    System(&'static str),
}

/// One entry of the probe list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    /// Base directory
    pub anchor: Anchor,
    /// Probe the `.gz` variant of the file name
    pub compressed: bool,
}

/// Probe order when no database path is configured.
pub const CANDIDATES: [Candidate; 6] = [
    Candidate {
        anchor: Anchor::WorkingDir,
        compressed: false,
    },
    Candidate {
        anchor: Anchor::WorkingDir,
        compressed: true,
    },
    Candidate {
        anchor: Anchor::InstallDir,
        compressed: false,
    },
    Candidate {
        anchor: Anchor::InstallDir,
        compressed: true,
    },
    Candidate {
        anchor: Anchor::System(SYSTEM_GEOIP_DIRS[0]),
        compressed: false,
    },
    Candidate {
        anchor: Anchor::System(SYSTEM_GEOIP_DIRS[1]),
        compressed: false,
    },
];

/// Base directories candidates are resolved against.
#[derive(Debug, Clone)]
pub struct SearchRoots {
    /// Process working directory
    pub working_dir: PathBuf,
    /// Installation directory of the binary
    pub install_dir: PathBuf,
}

impl SearchRoots {
    /// Roots for the running process.
    ///
    /// The install directory is the parent of the directory holding the
    /// executable (so `<prefix>/bin/geoip_filter` searches `<prefix>/vendor`),
    /// falling back to the crate's manifest directory.
    pub fn current() -> Self {
        let working_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let install_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().and_then(Path::parent).map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")));
        Self {
            working_dir,
            install_dir,
        }
    }
}

impl Candidate {
    /// Concrete path this candidate points at.
    pub fn path(&self, roots: &SearchRoots) -> PathBuf {
        let mut file_name = GEOIP_DB_FILE_NAME.to_string();
        if self.compressed {
            file_name.push_str(".gz");
        }
        match self.anchor {
            Anchor::WorkingDir => roots.working_dir.join(VENDOR_DATA_DIR).join(file_name),
            Anchor::InstallDir => roots.install_dir.join(VENDOR_DATA_DIR).join(file_name),
            Anchor::System(dir) => Path::new(dir).join(file_name),
        }
    }
}

/// Resolves the database resource for the current process.
pub fn resolve_database(configured: Option<&str>) -> Result<PathBuf, ConfigurationError> {
    resolve_with(configured, &SearchRoots::current(), |p| p.is_file())
}

/// Resolves the database resource against explicit roots and an existence probe.
///
/// A non-empty `configured` path is returned without checking it exists; the
/// loader reports unreadable resources.
pub fn resolve_with<F>(
    configured: Option<&str>,
    roots: &SearchRoots,
    exists: F,
) -> Result<PathBuf, ConfigurationError>
where
    F: Fn(&Path) -> bool,
{
    if let Some(path) = configured.filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(path));
    }

    let mut searched = Vec::with_capacity(CANDIDATES.len());
    for candidate in CANDIDATES.iter() {
        let path = candidate.path(roots);
        log::debug!("Probing GeoIP database location {}", path.display());
        if exists(&path) {
            return Ok(path);
        }
        searched.push(path);
    }

    Err(ConfigurationError::DatabaseNotFound { searched })
}
