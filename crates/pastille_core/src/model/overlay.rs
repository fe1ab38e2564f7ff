//! Reusable mark templates and page-layout fingerprints.
//!
//! # Responsibility
//! - Describe a document page layout coarsely enough to compare documents.
//! - Hold identifier-free copies of marks grouped by page.
//!
//! # Invariants
//! - A templated mark has no identifier; applying mints fresh ones.
//! - A fingerprint's `page_count` equals `pages.len()`.
//! - An overlay holds at most one manual-points template per rubric node.
//! - Overlay names map to one non-empty slug used as registry key and file name.

use crate::model::mark::{AnnotationMark, MarkBody, MarkStyle, NormPoint};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Page size rounded to whole points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageSizeClass {
    pub width: u32,
    pub height: u32,
}

impl PageSizeClass {
    pub fn from_points(width: f64, height: f64) -> Self {
        Self {
            width: round_points(width),
            height: round_points(height),
        }
    }
}

impl Display for PageSizeClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}pt", self.width, self.height)
    }
}

fn round_points(value: f64) -> u32 {
    if value.is_finite() && value > 0.0 {
        value.round().min(f64::from(u32::MAX)) as u32
    } else {
        0
    }
}

/// Page count plus per-page size class of one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutFingerprint {
    pub page_count: usize,
    pub pages: Vec<PageSizeClass>,
}

impl LayoutFingerprint {
    pub fn new(pages: Vec<PageSizeClass>) -> Self {
        Self {
            page_count: pages.len(),
            pages,
        }
    }

    /// Succeeds when `actual` has the same page count and size classes.
    pub fn check_compatible(&self, actual: &LayoutFingerprint) -> Result<(), GeometryMismatchError> {
        if self.page_count != actual.page_count || self.pages.len() != actual.pages.len() {
            return Err(GeometryMismatchError::PageCount {
                expected: self.page_count,
                actual: actual.page_count,
            });
        }
        match self
            .pages
            .iter()
            .zip(&actual.pages)
            .position(|(expected, actual)| expected != actual)
        {
            Some(page) => Err(GeometryMismatchError::PageSize {
                page: page as u32,
                expected: self.pages[page],
                actual: actual.pages[page],
            }),
            None => Ok(()),
        }
    }
}

/// Overlay and target document layouts are incompatible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeometryMismatchError {
    PageCount {
        expected: usize,
        actual: usize,
    },
    PageSize {
        page: u32,
        expected: PageSizeClass,
        actual: PageSizeClass,
    },
    /// A templated mark sits on a page the layout does not have.
    PageOutOfRange { page: u32, page_count: usize },
}

impl Display for GeometryMismatchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PageCount { expected, actual } => {
                write!(f, "page count mismatch: expected {expected}, got {actual}")
            }
            Self::PageSize {
                page,
                expected,
                actual,
            } => write!(
                f,
                "page {page} size mismatch: expected {expected}, got {actual}"
            ),
            Self::PageOutOfRange { page, page_count } => write!(
                f,
                "templated mark on page {page} but layout has {page_count} pages"
            ),
        }
    }
}

impl Error for GeometryMismatchError {}

/// Mark data stripped of its identifier. The page is the grouping key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplatedMark {
    pub position: NormPoint,
    pub style: MarkStyle,
    #[serde(flatten)]
    pub body: MarkBody,
}

impl From<&AnnotationMark> for TemplatedMark {
    fn from(mark: &AnnotationMark) -> Self {
        Self {
            position: mark.position,
            style: mark.style.clone(),
            body: mark.body.clone(),
        }
    }
}

/// Captured but not yet registered overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayDraft {
    pub fingerprint: LayoutFingerprint,
    pub source_document: Option<Uuid>,
    pub pages: BTreeMap<u32, Vec<TemplatedMark>>,
}

impl OverlayDraft {
    pub fn with_source(mut self, document_id: Uuid) -> Self {
        self.source_document = Some(document_id);
        self
    }

    pub fn mark_count(&self) -> usize {
        self.pages.values().map(Vec::len).sum()
    }
}

/// Named overlay registered in a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overlay {
    /// Name as typed by the user.
    pub name: String,
    /// Unix epoch milliseconds of the last save or update.
    pub created_at_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_document: Option<Uuid>,
    pub fingerprint: LayoutFingerprint,
    #[serde(default)]
    pub pages: BTreeMap<u32, Vec<TemplatedMark>>,
}

impl Overlay {
    pub fn from_draft(name: impl Into<String>, draft: OverlayDraft, created_at_ms: i64) -> Self {
        Self {
            name: name.into(),
            created_at_ms,
            source_document: draft.source_document,
            fingerprint: draft.fingerprint,
            pages: draft.pages,
        }
    }

    pub fn mark_count(&self) -> usize {
        self.pages.values().map(Vec::len).sum()
    }

    /// Registry key of this overlay.
    pub fn slug(&self) -> String {
        slugify(&self.name)
    }

    /// Rejects templates that cannot coexist, such as two manual-points
    /// marks for one rubric node.
    pub fn check_templates(&self) -> Result<(), String> {
        let mut manual_nodes = HashSet::new();
        for template in self.pages.values().flatten() {
            if let MarkBody::ManualPoints { rubric_id, .. } = &template.body {
                if !manual_nodes.insert(rubric_id.as_str()) {
                    return Err(format!(
                        "several manual-points templates for rubric node `{rubric_id}`"
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Turns an overlay name into a file-safe key.
///
/// ASCII alphanumerics are kept, spaces, `-` and `_` become `_`, runs of `_`
/// collapse, leading and trailing `_` are dropped. Other characters vanish.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for ch in name.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch);
        } else if matches!(ch, ' ' | '-' | '_') && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    slug.trim_matches('_').to_string()
}
