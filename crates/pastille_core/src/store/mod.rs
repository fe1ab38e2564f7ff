//! Per-document mark storage and gesture handling.
//!
//! # Responsibility
//! - Own a document's marks keyed by page (`annotation_store`).
//! - Turn pointer event streams into store mutations (`gesture`).
//!
//! # Invariants
//! - Every failed operation leaves the store unchanged.
//! - Regeneration is signalled once per completed gesture, never mid-drag.

pub mod annotation_store;
pub mod gesture;

use crate::model::mark::{InvalidLinkError, MarkId};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Store-layer error for mark edits.
#[derive(Debug)]
pub enum StoreError {
    /// Rubric link missing, unknown or value out of range.
    InvalidLink(InvalidLinkError),
    /// Mark id is not present in this store.
    UnknownMark(MarkId),
    /// Page index exceeds the document page count.
    PageOutOfRange { page: u32, page_count: usize },
    /// Color or size attribute is not accepted.
    InvalidStyle(String),
    /// Stroke without any point, image without size, or similar.
    InvalidGeometry(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLink(err) => write!(f, "{err}"),
            Self::UnknownMark(id) => write!(f, "mark not found: {id}"),
            Self::PageOutOfRange { page, page_count } => write!(
                f,
                "page {page} is out of range for a {page_count}-page document"
            ),
            Self::InvalidStyle(value) => write!(f, "invalid mark style `{value}`"),
            Self::InvalidGeometry(message) => write!(f, "invalid mark geometry: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidLink(err) => Some(err),
            Self::UnknownMark(_)
            | Self::PageOutOfRange { .. }
            | Self::InvalidStyle(_)
            | Self::InvalidGeometry(_) => None,
        }
    }
}

impl From<InvalidLinkError> for StoreError {
    fn from(value: InvalidLinkError) -> Self {
        Self::InvalidLink(value)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
