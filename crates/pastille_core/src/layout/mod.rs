//! Page geometry consumed by placement, alignment and overlay checks.
//!
//! # Responsibility
//! - Define the `PageTransform` seam supplied by the rendering side.
//! - Provide `MarginLayout`, the geometry of pages widened by import margins.
//! - Provide the margin alignment (snap) rule for score markers.
//!
//! # Invariants
//! - Raw points are in the widened page space, origin top-left, unit = point.
//! - Normalized points are fractions of the widened page size.

mod alignment;
mod margin;

pub use alignment::{AlignmentEdge, AlignmentSettings, MarginAlignment, MAX_ALIGNMENT_CM};
pub use margin::{cm_to_pt, MarginLayout, PageSize};

use crate::model::mark::{NormPoint, RawPoint};
use crate::model::overlay::{LayoutFingerprint, PageSizeClass};

/// Page-space to normalized-space mapping of one document.
pub trait PageTransform {
    /// Number of pages in the document.
    fn page_count(&self) -> usize;

    /// Final (widened) size of `page`, or `None` when out of range.
    fn page_size(&self, page: u32) -> Option<PageSize>;

    /// Width in points of the margin band along `edge` on `page`.
    fn margin_band(&self, page: u32, edge: AlignmentEdge) -> f64;

    /// Converts a document-space point into page fractions.
    fn to_normalized(&self, page: u32, raw: RawPoint) -> Option<NormPoint> {
        let size = self.page_size(page)?;
        if size.width <= 0.0 || size.height <= 0.0 {
            return None;
        }
        Some(NormPoint::new(raw.x / size.width, raw.y / size.height).clamped())
    }

    /// Converts page fractions back into document space.
    fn to_raw(&self, page: u32, point: NormPoint) -> Option<RawPoint> {
        let size = self.page_size(page)?;
        Some(RawPoint::new(point.x * size.width, point.y * size.height))
    }

    /// Page count plus size class of every page.
    fn fingerprint(&self) -> LayoutFingerprint {
        let pages = (0..self.page_count() as u32)
            .filter_map(|page| self.page_size(page))
            .map(|size| PageSizeClass::from_points(size.width, size.height))
            .collect();
        LayoutFingerprint::new(pages)
    }
}
