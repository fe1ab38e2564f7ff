use super::{cm_to_pt, PageTransform};
use crate::model::mark::NormPoint;
use serde::{Deserialize, Serialize};

/// Upper bound accepted for the alignment distance.
pub const MAX_ALIGNMENT_CM: f64 = 10.0;
const DEFAULT_ALIGNMENT_CM: f64 = 0.5;

/// Page edge carrying the margin band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentEdge {
    #[default]
    Left,
    Right,
}

/// Persisted alignment configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentSettings {
    pub enabled: bool,
    pub distance_cm: f64,
    pub edge: AlignmentEdge,
}

impl Default for AlignmentSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            distance_cm: DEFAULT_ALIGNMENT_CM,
            edge: AlignmentEdge::Left,
        }
    }
}

impl AlignmentSettings {
    /// Distance clamped to `[0, MAX_ALIGNMENT_CM]`; NaN falls back to the default.
    pub fn clamped_distance_cm(&self) -> f64 {
        if self.distance_cm.is_nan() {
            return DEFAULT_ALIGNMENT_CM;
        }
        self.distance_cm.clamp(0.0, MAX_ALIGNMENT_CM)
    }

    /// Active snap rule, or `None` when alignment is off.
    pub fn rule(&self) -> Option<MarginAlignment> {
        self.enabled.then(|| MarginAlignment {
            edge: self.edge,
            distance_pt: cm_to_pt(self.clamped_distance_cm()),
        })
    }
}

/// Snap rule for score markers: fixed distance inside the margin band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarginAlignment {
    pub edge: AlignmentEdge,
    pub distance_pt: f64,
}

impl MarginAlignment {
    /// Moves `point` horizontally so it sits `distance_pt` inside the edge.
    ///
    /// The distance is capped by the band width when the page has a band.
    /// The vertical coordinate is preserved.
    pub fn snap<G: PageTransform + ?Sized>(&self, geometry: &G, page: u32, point: NormPoint) -> NormPoint {
        let Some(size) = geometry.page_size(page) else {
            return point;
        };
        if size.width <= 0.0 {
            return point;
        }
        let band = geometry.margin_band(page, self.edge);
        let inset = if band > 0.0 {
            self.distance_pt.min(band)
        } else {
            self.distance_pt
        };
        let x_pt = match self.edge {
            AlignmentEdge::Left => inset,
            AlignmentEdge::Right => size.width - inset,
        };
        NormPoint::new(x_pt / size.width, point.y).clamped()
    }
}

#[cfg(test)]
mod tests {
    use super::{AlignmentEdge, AlignmentSettings, MarginAlignment};
    use crate::layout::{MarginLayout, PageSize};
    use crate::model::mark::NormPoint;

    #[test]
    fn distance_is_clamped() {
        let settings = AlignmentSettings {
            enabled: true,
            distance_cm: 42.0,
            edge: AlignmentEdge::Left,
        };
        assert_eq!(settings.clamped_distance_cm(), 10.0);
        assert!(AlignmentSettings::default().rule().is_none());
    }

    #[test]
    fn snap_keeps_vertical_axis() {
        let layout = MarginLayout {
            source_pages: vec![PageSize::new(300.0, 800.0)],
            left_margin_pt: 100.0,
            right_margin_pt: 0.0,
        };
        let rule = MarginAlignment {
            edge: AlignmentEdge::Left,
            distance_pt: 40.0,
        };
        let snapped = rule.snap(&layout, 0, NormPoint::new(0.75, 0.5));
        assert_eq!(snapped, NormPoint::new(0.1, 0.5));
    }

    #[test]
    fn snap_is_capped_by_band_width() {
        let layout = MarginLayout {
            source_pages: vec![PageSize::new(300.0, 800.0)],
            left_margin_pt: 0.0,
            right_margin_pt: 100.0,
        };
        let rule = MarginAlignment {
            edge: AlignmentEdge::Right,
            distance_pt: 200.0,
        };
        let snapped = rule.snap(&layout, 0, NormPoint::new(0.1, 0.25));
        assert_eq!(snapped, NormPoint::new(0.75, 0.25));
    }
}
