//! Project-level overlay registry.
//!
//! # Responsibility
//! - Capture a document's marks as a reusable overlay draft.
//! - Register, replace, list and delete named overlays.
//! - Replay an overlay onto another document store.
//!
//! # Invariants
//! - Registry keys are overlay name slugs; two names with the same slug collide.
//! - `apply` is all-or-nothing on the target store.
//!
//! # See also
//! - `model::overlay` for the template types.

pub mod registry;

pub use registry::{ApplyReport, OverlayRegistry};

use crate::model::mark::InvalidLinkError;
use crate::model::overlay::GeometryMismatchError;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Overlay registry error.
#[derive(Debug)]
pub enum OverlayError {
    /// Name produces an empty slug.
    InvalidName(String),
    /// `save` target already registered.
    AlreadyExists(String),
    /// No overlay registered under this name.
    NotFound(String),
    /// Target layout differs from the recorded fingerprint.
    GeometryMismatch(GeometryMismatchError),
    /// A templated mark references a node missing from the target rubric.
    InvalidLink(InvalidLinkError),
    /// A templated mark carries unusable data (for example a bad color).
    InvalidTemplate(String),
}

impl Display for OverlayError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName(name) => write!(f, "invalid overlay name `{name}`"),
            Self::AlreadyExists(name) => write!(f, "overlay already exists: `{name}`"),
            Self::NotFound(name) => write!(f, "overlay not found: `{name}`"),
            Self::GeometryMismatch(err) => write!(f, "{err}"),
            Self::InvalidLink(err) => write!(f, "{err}"),
            Self::InvalidTemplate(message) => write!(f, "invalid overlay template: {message}"),
        }
    }
}

impl Error for OverlayError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::GeometryMismatch(err) => Some(err),
            Self::InvalidLink(err) => Some(err),
            Self::InvalidName(_)
            | Self::AlreadyExists(_)
            | Self::NotFound(_)
            | Self::InvalidTemplate(_) => None,
        }
    }
}

impl From<GeometryMismatchError> for OverlayError {
    fn from(value: GeometryMismatchError) -> Self {
        Self::GeometryMismatch(value)
    }
}

impl From<InvalidLinkError> for OverlayError {
    fn from(value: InvalidLinkError) -> Self {
        Self::InvalidLink(value)
    }
}

pub type OverlayResult<T> = Result<T, OverlayError>;
