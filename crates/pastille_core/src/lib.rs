//! Core domain logic for Pastille, a margin-annotation grading tool.
//! This crate is the single source of truth for rubric, mark and score invariants.

pub mod layout;
pub mod logging;
pub mod model;
pub mod overlay;
pub mod persist;
pub mod project;
pub mod score;
pub mod session;
pub mod store;

pub use layout::{
    AlignmentEdge, AlignmentSettings, MarginAlignment, MarginLayout, PageSize, PageTransform,
};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::mark::{
    AnnotationMark, InvalidLinkError, MarkBody, MarkDraft, MarkId, MarkKind, MarkStyle,
    NormPoint, RawPoint,
};
pub use model::overlay::{GeometryMismatchError, LayoutFingerprint, Overlay, OverlayDraft};
pub use model::rubric::{
    Grade, GradeScale, RubricDoc, RubricDocNode, RubricId, RubricNode, RubricResult,
    RubricTree, RubricValidationError,
};
pub use overlay::{ApplyReport, OverlayError, OverlayRegistry, OverlayResult};
pub use persist::{load_any, load_project, save_project, PersistResult, PersistenceError};
pub use project::{Document, DocumentId, Project, ProjectSettings};
pub use score::{format_points, Recap, RecapRow, ScoreAggregator, ScoreLine};
pub use session::{Session, SessionError, SessionResult};
pub use store::annotation_store::{AnnotationStore, EditContext};
pub use store::gesture::{ActiveTool, GesturePhase, NoopSink, PointerEvent, RegenerateSink};
pub use store::{StoreError, StoreResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
