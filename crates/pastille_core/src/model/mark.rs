//! Positioned annotation marks.
//!
//! # Responsibility
//! - Define the tagged mark payloads (score marker, text, arrow, freehand,
//!   image, manual points) and their shared style attributes.
//! - Define the raw (document space) and normalized (page fraction) points.
//! - Validate rubric links and point values before a mark enters a store.
//!
//! # Invariants
//! - Score-marker and manual-points marks always carry a rubric link and a value.
//! - Visual kinds never carry a rubric link.
//! - Normalized coordinates are stored clamped to `[0, 1]`.
//!
//! # See also
//! - `store::annotation_store` for the owning collection.

use crate::model::rubric::{Grade, RubricId, RubricTree};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

static HEX_COLOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#[0-9A-Fa-f]{6}$").expect("valid hex color regex"));

const VALUE_TOLERANCE: f64 = 1e-9;

/// Stable identifier of one mark inside a document store.
pub type MarkId = Uuid;

/// Named colors accepted in addition to `#RRGGBB`.
pub const PALETTE: [(&str, &str); 6] = [
    ("black", "#111827"),
    ("red", "#EF4444"),
    ("blue", "#3B82F6"),
    ("green", "#22C55E"),
    ("violet", "#8B5CF6"),
    ("brown", "#8B5E3C"),
];

/// Returns the canonical `#RRGGBB` form of a color, or `None` when unknown.
pub fn normalize_color(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if HEX_COLOR_RE.is_match(trimmed) {
        return Some(trimmed.to_ascii_uppercase());
    }
    let lowered = trimmed.to_ascii_lowercase();
    PALETTE
        .iter()
        .find(|(name, _)| *name == lowered)
        .map(|(_, hex)| (*hex).to_string())
}

/// Default color of a score marker for each grade.
pub fn grade_color(grade: Grade) -> &'static str {
    match grade {
        Grade::Good => "#1F9D55",
        Grade::Partial => "#F59E0B",
        Grade::Bad => "#EF4444",
    }
}

/// Position on a page in document space (points, origin top-left).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawPoint {
    pub x: f64,
    pub y: f64,
}

impl RawPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(self, other: RawPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Position as a fraction of page width and height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormPoint {
    pub x: f64,
    pub y: f64,
}

impl NormPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Keeps the point inside the page.
    pub fn clamped(self) -> Self {
        Self {
            x: clamp_unit(self.x),
            y: clamp_unit(self.y),
        }
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Discriminant of a mark payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkKind {
    ScoreMarker,
    Text,
    Arrow,
    Freehand,
    Image,
    ManualPoints,
}

impl MarkKind {
    /// Whether marks of this kind must link to a rubric node.
    pub fn requires_link(self) -> bool {
        matches!(self, Self::ScoreMarker | Self::ManualPoints)
    }
}

impl Display for MarkKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::ScoreMarker => "score_marker",
            Self::Text => "text",
            Self::Arrow => "arrow",
            Self::Freehand => "freehand",
            Self::Image => "image",
            Self::ManualPoints => "manual_points",
        };
        f.write_str(name)
    }
}

/// Kind-specific payload of a mark. Extra points are normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MarkBody {
    ScoreMarker {
        rubric_id: RubricId,
        grade: Grade,
        value: f64,
    },
    ManualPoints {
        rubric_id: RubricId,
        value: f64,
    },
    Text {
        text: String,
    },
    /// Arrow from the mark position to `end`.
    Arrow {
        end: NormPoint,
    },
    /// Stroke whose first point is the mark position.
    Freehand {
        path: Vec<NormPoint>,
    },
    Image {
        image_ref: String,
        width: f64,
        height: f64,
    },
}

impl MarkBody {
    pub fn kind(&self) -> MarkKind {
        match self {
            Self::ScoreMarker { .. } => MarkKind::ScoreMarker,
            Self::ManualPoints { .. } => MarkKind::ManualPoints,
            Self::Text { .. } => MarkKind::Text,
            Self::Arrow { .. } => MarkKind::Arrow,
            Self::Freehand { .. } => MarkKind::Freehand,
            Self::Image { .. } => MarkKind::Image,
        }
    }

    pub fn rubric_link(&self) -> Option<&str> {
        match self {
            Self::ScoreMarker { rubric_id, .. } | Self::ManualPoints { rubric_id, .. } => {
                Some(rubric_id)
            }
            Self::Text { .. } | Self::Arrow { .. } | Self::Freehand { .. } | Self::Image { .. } => {
                None
            }
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Self::ScoreMarker { value, .. } | Self::ManualPoints { value, .. } => Some(*value),
            Self::Text { .. } | Self::Arrow { .. } | Self::Freehand { .. } | Self::Image { .. } => {
                None
            }
        }
    }

    /// Secondary points of strokes: the arrow end or every freehand point.
    pub fn stroke_points(&self) -> &[NormPoint] {
        match self {
            Self::Arrow { end } => std::slice::from_ref(end),
            Self::Freehand { path } => path,
            Self::ScoreMarker { .. }
            | Self::ManualPoints { .. }
            | Self::Text { .. }
            | Self::Image { .. } => &[],
        }
    }

    /// Shifts the secondary points of strokes. No clamping.
    pub(crate) fn translate(&mut self, dx: f64, dy: f64) {
        match self {
            Self::Arrow { end } => *end = NormPoint::new(end.x + dx, end.y + dy),
            Self::Freehand { path } => {
                for point in path.iter_mut() {
                    *point = NormPoint::new(point.x + dx, point.y + dy);
                }
            }
            Self::ScoreMarker { .. }
            | Self::ManualPoints { .. }
            | Self::Text { .. }
            | Self::Image { .. } => {}
        }
    }

    /// Checks the rubric link and value against `rubric`.
    pub fn validate_link(&self, rubric: &RubricTree) -> Result<(), InvalidLinkError> {
        match (self.rubric_link(), self.value()) {
            (Some(rubric_id), Some(value)) => validate_value(rubric, rubric_id, value),
            _ => Ok(()),
        }
    }
}

/// Checks that `rubric_id` exists and that `value` fits in `[0, max]`.
pub fn validate_value(rubric: &RubricTree, rubric_id: &str, value: f64) -> Result<(), InvalidLinkError> {
    let max = rubric
        .total_at(rubric_id)
        .map_err(|_| InvalidLinkError::UnknownNode {
            rubric_id: rubric_id.to_string(),
        })?;
    if !value.is_finite() || value < 0.0 || value > max + VALUE_TOLERANCE {
        return Err(InvalidLinkError::ValueOutOfRange {
            rubric_id: rubric_id.to_string(),
            value,
            max,
        });
    }
    Ok(())
}

/// Visual attributes of a mark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkStyle {
    /// `#RRGGBB`.
    pub color: String,
    /// Background fill behind text, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
    pub line_width: f64,
    pub font_size: f64,
}

impl Default for MarkStyle {
    fn default() -> Self {
        Self {
            color: "#EF4444".to_string(),
            fill: None,
            line_width: 2.0,
            font_size: 12.0,
        }
    }
}

impl MarkStyle {
    pub fn with_color(color: impl Into<String>) -> Self {
        Self {
            color: color.into(),
            ..Self::default()
        }
    }

    /// Default style of a freshly placed mark of the given kind.
    pub fn default_for(body: &MarkBody) -> Self {
        match body {
            MarkBody::ScoreMarker { grade, .. } => Self::with_color(grade_color(*grade)),
            MarkBody::ManualPoints { .. } => Self {
                fill: Some("#FFFFFF".to_string()),
                font_size: 14.0,
                ..Self::default()
            },
            MarkBody::Text { .. }
            | MarkBody::Arrow { .. }
            | MarkBody::Freehand { .. }
            | MarkBody::Image { .. } => Self::default(),
        }
    }

    /// Returns the style with canonical colors, or the offending input.
    pub fn normalized(&self) -> Result<Self, String> {
        let color = normalize_color(&self.color).ok_or_else(|| self.color.clone())?;
        let fill = match &self.fill {
            Some(fill) => Some(normalize_color(fill).ok_or_else(|| fill.clone())?),
            None => None,
        };
        if !self.line_width.is_finite() || self.line_width <= 0.0 {
            return Err(format!("line_width={}", self.line_width));
        }
        if !self.font_size.is_finite() || self.font_size <= 0.0 {
            return Err(format!("font_size={}", self.font_size));
        }
        Ok(Self {
            color,
            fill,
            line_width: self.line_width,
            font_size: self.font_size,
        })
    }
}

/// One positioned mark owned by a document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationMark {
    pub id: MarkId,
    /// Zero-based page index.
    pub page: u32,
    /// Anchor of the mark.
    pub position: NormPoint,
    pub style: MarkStyle,
    #[serde(flatten)]
    pub body: MarkBody,
}

impl AnnotationMark {
    pub fn kind(&self) -> MarkKind {
        self.body.kind()
    }

    pub fn rubric_link(&self) -> Option<&str> {
        self.body.rubric_link()
    }

    pub fn value(&self) -> Option<f64> {
        self.body.value()
    }

    /// Moves the anchor and stroke points together by `(dx, dy)`.
    ///
    /// The shift is cut short so every point stays on the page; the shape
    /// itself is never deformed. Returns whether anything moved.
    pub(crate) fn shift_within_page(&mut self, dx: f64, dy: f64) -> bool {
        let points = std::iter::once(&self.position).chain(self.body.stroke_points());
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (1.0_f64, 1.0_f64, 0.0_f64, 0.0_f64);
        for point in points {
            min_x = min_x.min(point.x);
            min_y = min_y.min(point.y);
            max_x = max_x.max(point.x);
            max_y = max_y.max(point.y);
        }
        let dx = dx.max(-min_x).min(1.0 - max_x);
        let dy = dy.max(-min_y).min(1.0 - max_y);
        if dx == 0.0 && dy == 0.0 {
            return false;
        }
        self.position = NormPoint::new(self.position.x + dx, self.position.y + dy);
        self.body.translate(dx, dy);
        true
    }
}

/// Placement request expressed in document space.
///
/// Link and value are optional here so a missing rubric link is reported as
/// an error instead of being unrepresentable at the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum MarkDraft {
    /// When `value` is `None` the value follows `grade`.
    ScoreMarker {
        rubric_id: Option<RubricId>,
        grade: Grade,
        value: Option<f64>,
    },
    ManualPoints {
        rubric_id: Option<RubricId>,
        value: Option<f64>,
    },
    Text {
        text: String,
    },
    Arrow {
        end: RawPoint,
    },
    /// Remaining stroke points after the anchor.
    Freehand {
        path: Vec<RawPoint>,
    },
    Image {
        image_ref: String,
        width_pt: f64,
        height_pt: f64,
    },
}

impl MarkDraft {
    pub fn score(rubric_id: impl Into<RubricId>, grade: Grade) -> Self {
        Self::ScoreMarker {
            rubric_id: Some(rubric_id.into()),
            grade,
            value: None,
        }
    }

    pub fn kind(&self) -> MarkKind {
        match self {
            Self::ScoreMarker { .. } => MarkKind::ScoreMarker,
            Self::ManualPoints { .. } => MarkKind::ManualPoints,
            Self::Text { .. } => MarkKind::Text,
            Self::Arrow { .. } => MarkKind::Arrow,
            Self::Freehand { .. } => MarkKind::Freehand,
            Self::Image { .. } => MarkKind::Image,
        }
    }
}

/// A mark references a rubric node that cannot accept it.
#[derive(Debug, Clone, PartialEq)]
pub enum InvalidLinkError {
    /// Kind requires a rubric link but none was given.
    MissingLink { kind: MarkKind },
    /// Kind requires a point value but none was given.
    MissingValue { kind: MarkKind },
    /// Linked node does not exist in the current rubric.
    UnknownNode { rubric_id: RubricId },
    /// Value is negative, non-finite or above the node maximum.
    ValueOutOfRange {
        rubric_id: RubricId,
        value: f64,
        max: f64,
    },
}

impl Display for InvalidLinkError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingLink { kind } => write!(f, "{kind} mark requires a rubric link"),
            Self::MissingValue { kind } => write!(f, "{kind} mark requires a point value"),
            Self::UnknownNode { rubric_id } => {
                write!(f, "mark links to unknown rubric node `{rubric_id}`")
            }
            Self::ValueOutOfRange {
                rubric_id,
                value,
                max,
            } => write!(
                f,
                "value {value} for rubric node `{rubric_id}` is outside [0, {max}]"
            ),
        }
    }
}

impl Error for InvalidLinkError {}
