//! JSON persistence of projects and overlay exchange files.
//!
//! # Responsibility
//! - Write files atomically (temporary file in the target directory, then rename).
//! - Load and validate `project.json` and `overlays/overlay_<slug>.json`.
//!
//! # Invariants
//! - A crash mid-write never leaves a half-written file in place.
//! - Project files carry `version`; unknown versions are rejected.
//! - A failed load never affects already loaded projects.
//!
//! # See also
//! - `project` for the aggregate being persisted.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

mod atomic;
mod project_file;

pub use atomic::{read_json, write_json_atomic};
pub use project_file::{
    load_any, load_project, overlay_file_path, read_overlay_file, save_project,
    write_overlay_file, OVERLAY_DIR_NAME, PROJECT_FILE_NAME, PROJECT_FORMAT_VERSION,
};

pub type PersistResult<T> = Result<T, PersistenceError>;

#[derive(Debug)]
pub enum PersistenceError {
    /// Filesystem failure on `path`.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Value could not be encoded.
    Serialize {
        path: PathBuf,
        source: serde_json::Error,
    },
    /// File content is not valid JSON for the expected shape.
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    /// File declares a format version this build does not read.
    UnsupportedVersion {
        path: PathBuf,
        found: u64,
        supported: u32,
    },
    /// File parses but violates a model invariant.
    InvalidContent { path: PathBuf, message: String },
}

impl Display for PersistenceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "i/o error on `{}`: {source}", path.display()),
            Self::Serialize { path, source } => {
                write!(f, "cannot encode `{}`: {source}", path.display())
            }
            Self::Corrupt { path, source } => {
                write!(f, "corrupted file `{}`: {source}", path.display())
            }
            Self::UnsupportedVersion {
                path,
                found,
                supported,
            } => write!(
                f,
                "file `{}` has format version {found}, supported is {supported}",
                path.display()
            ),
            Self::InvalidContent { path, message } => {
                write!(f, "invalid content in `{}`: {message}", path.display())
            }
        }
    }
}

impl Error for PersistenceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Serialize { source, .. } | Self::Corrupt { source, .. } => Some(source),
            Self::UnsupportedVersion { .. } | Self::InvalidContent { .. } => None,
        }
    }
}

impl PersistenceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Stable short code used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io { .. } => "io_failed",
            Self::Serialize { .. } => "serialize_failed",
            Self::Corrupt { .. } => "corrupt_file",
            Self::UnsupportedVersion { .. } => "unsupported_version",
            Self::InvalidContent { .. } => "invalid_content",
        }
    }
}
