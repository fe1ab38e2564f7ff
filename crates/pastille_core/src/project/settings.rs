use crate::layout::{AlignmentSettings, MarginLayout, MarginAlignment, PageSize};
use serde::{Deserialize, Serialize};

const DEFAULT_LEFT_MARGIN_CM: f64 = 5.0;
const DEFAULT_GRADE_OUT_OF: f64 = 20.0;

/// Per-project configuration persisted with the project file.
///
/// Every field has a default so files written before a field existed load.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSettings {
    /// Margin band inserted on the left of every imported page.
    pub left_margin_cm: f64,
    /// Margin band inserted on the right of every imported page.
    pub right_margin_cm: f64,
    pub alignment: AlignmentSettings,
    /// Scale of the recap grade.
    pub grade_out_of: f64,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            left_margin_cm: DEFAULT_LEFT_MARGIN_CM,
            right_margin_cm: 0.0,
            alignment: AlignmentSettings::default(),
            grade_out_of: DEFAULT_GRADE_OUT_OF,
        }
    }
}

impl ProjectSettings {
    /// Geometry of a newly imported document with these margins.
    pub fn margin_layout(&self, source_pages: Vec<PageSize>) -> MarginLayout {
        MarginLayout::new(
            source_pages,
            non_negative(self.left_margin_cm),
            non_negative(self.right_margin_cm),
        )
    }

    /// Active snap rule for score markers.
    pub fn alignment_rule(&self) -> Option<MarginAlignment> {
        self.alignment.rule()
    }

    /// Grade scale, falling back to 20 when unusable.
    pub fn out_of(&self) -> f64 {
        if self.grade_out_of.is_finite() && self.grade_out_of > 0.0 {
            self.grade_out_of
        } else {
            DEFAULT_GRADE_OUT_OF
        }
    }
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}
