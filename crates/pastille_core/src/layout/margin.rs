use super::{AlignmentEdge, PageTransform};
use serde::{Deserialize, Serialize};

const POINTS_PER_INCH: f64 = 72.0;
const CM_PER_INCH: f64 = 2.54;

/// Converts centimeters to PDF points.
pub fn cm_to_pt(cm: f64) -> f64 {
    cm / CM_PER_INCH * POINTS_PER_INCH
}

/// Page size in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

impl PageSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// ISO A4 portrait.
    pub fn a4() -> Self {
        Self::new(595.0, 842.0)
    }
}

/// Geometry of a document whose pages were widened at import time.
///
/// Every page keeps its source height and gains `left_margin_pt` and
/// `right_margin_pt` of horizontal space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarginLayout {
    pub source_pages: Vec<PageSize>,
    #[serde(default)]
    pub left_margin_pt: f64,
    #[serde(default)]
    pub right_margin_pt: f64,
}

impl MarginLayout {
    pub fn new(source_pages: Vec<PageSize>, left_margin_cm: f64, right_margin_cm: f64) -> Self {
        Self {
            source_pages,
            left_margin_pt: cm_to_pt(left_margin_cm.max(0.0)),
            right_margin_pt: cm_to_pt(right_margin_cm.max(0.0)),
        }
    }

    /// Layout without inserted margins.
    pub fn unmargined(source_pages: Vec<PageSize>) -> Self {
        Self::new(source_pages, 0.0, 0.0)
    }
}

impl PageTransform for MarginLayout {
    fn page_count(&self) -> usize {
        self.source_pages.len()
    }

    fn page_size(&self, page: u32) -> Option<PageSize> {
        let source = self.source_pages.get(page as usize)?;
        Some(PageSize::new(
            source.width + self.left_margin_pt + self.right_margin_pt,
            source.height,
        ))
    }

    fn margin_band(&self, _page: u32, edge: AlignmentEdge) -> f64 {
        match edge {
            AlignmentEdge::Left => self.left_margin_pt,
            AlignmentEdge::Right => self.right_margin_pt,
        }
    }
}
