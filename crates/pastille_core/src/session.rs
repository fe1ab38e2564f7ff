//! Explicit editing context for one grader.
//!
//! # Responsibility
//! - Hold the open project, the current document, the active tool, the
//!   overlay selection and the gesture machine.
//! - Route document-scoped operations to the current document and signal the
//!   rendering side once per completed action.
//!
//! # Invariants
//! - No operation reads global mutable state; everything goes through `Session`.
//! - Failed operations do not signal regeneration.
//! - Closing or removing the current document clears the selection.

use crate::layout::{MarginLayout, PageTransform};
use crate::model::mark::{MarkDraft, MarkId, MarkStyle, RawPoint};
use crate::model::overlay::{slugify, Overlay, OverlayDraft};
use crate::model::rubric::RubricValidationError;
use crate::overlay::{ApplyReport, OverlayError, OverlayRegistry};
use crate::persist::{PersistResult, PersistenceError};
use crate::project::{Document, DocumentId, Project};
use crate::score::{Recap, ScoreLine};
use crate::store::annotation_store::{AnnotationStore, EditContext};
use crate::store::gesture::{ActiveTool, GestureMachine, GesturePhase, PointerEvent, RegenerateSink};
use crate::store::StoreError;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum SessionError {
    /// Operation needs an open document.
    NoCurrentDocument,
    /// Document id is not part of the project.
    UnknownDocument(DocumentId),
    /// Operation needs a selected overlay.
    NoOverlaySelected,
    Store(StoreError),
    Overlay(OverlayError),
    Rubric(RubricValidationError),
    Persistence(PersistenceError),
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoCurrentDocument => write!(f, "no document is open"),
            Self::UnknownDocument(id) => write!(f, "document not found: {id}"),
            Self::NoOverlaySelected => write!(f, "no overlay is selected"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Overlay(err) => write!(f, "{err}"),
            Self::Rubric(err) => write!(f, "{err}"),
            Self::Persistence(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NoCurrentDocument | Self::UnknownDocument(_) | Self::NoOverlaySelected => None,
            Self::Store(err) => Some(err),
            Self::Overlay(err) => Some(err),
            Self::Rubric(err) => Some(err),
            Self::Persistence(err) => Some(err),
        }
    }
}

impl From<StoreError> for SessionError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<OverlayError> for SessionError {
    fn from(value: OverlayError) -> Self {
        Self::Overlay(value)
    }
}

impl From<RubricValidationError> for SessionError {
    fn from(value: RubricValidationError) -> Self {
        Self::Rubric(value)
    }
}

impl From<PersistenceError> for SessionError {
    fn from(value: PersistenceError) -> Self {
        Self::Persistence(value)
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Grader session over one project.
pub struct Session<S: RegenerateSink> {
    project: Project,
    current: Option<DocumentId>,
    tool: ActiveTool,
    overlay_selection: Option<String>,
    gesture: GestureMachine,
    sink: S,
}

impl<S: RegenerateSink> Session<S> {
    pub fn new(project: Project, sink: S) -> Self {
        Self {
            project,
            current: None,
            tool: ActiveTool::default(),
            overlay_selection: None,
            gesture: GestureMachine::new(),
            sink,
        }
    }

    /// Opens the project stored at `path` (directory or project file).
    pub fn open(path: &Path, sink: S) -> SessionResult<Self> {
        Ok(Self::new(Project::load(path)?, sink))
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    /// Mutable project access for rubric and settings edits.
    pub fn project_mut(&mut self) -> &mut Project {
        &mut self.project
    }

    pub fn into_project(self) -> Project {
        self.project
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn save(&self, root: &Path) -> PersistResult<PathBuf> {
        self.project.save(root)
    }

    pub fn open_document(&mut self, id: DocumentId) -> SessionResult<()> {
        if self.project.document(id).is_none() {
            return Err(SessionError::UnknownDocument(id));
        }
        self.current = Some(id);
        self.gesture = GestureMachine::new();
        Ok(())
    }

    pub fn close_document(&mut self) {
        self.current = None;
        self.gesture = GestureMachine::new();
    }

    pub fn current_document(&self) -> Option<&Document> {
        self.current.and_then(|id| self.project.document(id))
    }

    /// Removes a document and its marks; closes it when it was current.
    pub fn remove_document(&mut self, id: DocumentId) -> SessionResult<Document> {
        let removed = self
            .project
            .remove_document(id)
            .ok_or(SessionError::UnknownDocument(id))?;
        if self.current == Some(id) {
            self.close_document();
        }
        Ok(removed)
    }

    pub fn tool(&self) -> &ActiveTool {
        &self.tool
    }

    pub fn set_tool(&mut self, tool: ActiveTool) {
        self.tool = tool;
    }

    pub fn gesture_phase(&self) -> GesturePhase {
        self.gesture.phase()
    }

    pub fn selected_overlay(&self) -> Option<&str> {
        self.overlay_selection.as_deref()
    }

    /// Selects the overlay used by `apply_selected_overlay`.
    pub fn select_overlay(&mut self, name: Option<&str>) -> SessionResult<()> {
        match name {
            Some(name) if !self.project.overlays.contains(name) => {
                Err(OverlayError::NotFound(name.to_string()).into())
            }
            Some(name) => {
                self.overlay_selection = Some(name.to_string());
                Ok(())
            }
            None => {
                self.overlay_selection = None;
                Ok(())
            }
        }
    }

    /// Feeds one pointer event to the gesture machine.
    pub fn pointer(&mut self, event: PointerEvent) -> SessionResult<Option<MarkId>> {
        let id = self.current.ok_or(SessionError::NoCurrentDocument)?;
        let Self {
            project,
            tool,
            gesture,
            sink,
            ..
        } = self;
        let parts = project
            .document_parts(id)
            .ok_or(SessionError::UnknownDocument(id))?;
        let Document {
            layout,
            annotations,
            ..
        } = parts.document;
        let ctx = EditContext::new(parts.rubric, &*layout)
            .with_alignment(parts.settings.alignment_rule());
        Ok(gesture.handle(event, tool, annotations, &ctx, sink)?)
    }

    /// Places a mark on the current document.
    pub fn place(
        &mut self,
        page: u32,
        raw: RawPoint,
        draft: MarkDraft,
        style: Option<MarkStyle>,
    ) -> SessionResult<MarkId> {
        self.edit(|ctx, store| store.place(ctx, page, raw, draft, style))
    }

    /// Moves a mark of the current document. Returns whether it moved.
    pub fn move_mark(&mut self, id: MarkId, raw: RawPoint) -> SessionResult<bool> {
        self.edit(|ctx, store| store.move_mark(ctx, id, raw))
    }

    pub fn restyle_mark(&mut self, id: MarkId, style: &MarkStyle) -> SessionResult<()> {
        self.edit(|_, store| store.restyle(id, style))
    }

    /// Deletes a mark; returns `false` when it was already absent.
    pub fn remove_mark(&mut self, id: MarkId) -> SessionResult<bool> {
        let document_id = self.current.ok_or(SessionError::NoCurrentDocument)?;
        let Self { project, sink, .. } = self;
        let document = project
            .document_mut(document_id)
            .ok_or(SessionError::UnknownDocument(document_id))?;
        let removed = document.annotations.remove(id);
        if removed {
            sink.regenerate(&document.annotations);
        }
        Ok(removed)
    }

    pub fn set_manual_points(
        &mut self,
        rubric_id: &str,
        page: u32,
        value: f64,
    ) -> SessionResult<MarkId> {
        self.edit(|ctx, store| store.set_manual_points(ctx, rubric_id, page, value))
    }

    fn edit<T>(
        &mut self,
        op: impl FnOnce(&EditContext<'_, MarginLayout>, &mut AnnotationStore) -> Result<T, StoreError>,
    ) -> SessionResult<T> {
        let id = self.current.ok_or(SessionError::NoCurrentDocument)?;
        let Self { project, sink, .. } = self;
        let parts = project
            .document_parts(id)
            .ok_or(SessionError::UnknownDocument(id))?;
        let Document {
            layout,
            annotations,
            ..
        } = parts.document;
        let ctx = EditContext::new(parts.rubric, &*layout)
            .with_alignment(parts.settings.alignment_rule());
        let value = op(&ctx, &mut *annotations)?;
        sink.regenerate(annotations);
        Ok(value)
    }

    /// Captures the current document's marks as an overlay draft.
    pub fn capture_overlay(&self) -> SessionResult<OverlayDraft> {
        let document = self
            .current_document()
            .ok_or(SessionError::NoCurrentDocument)?;
        Ok(
            OverlayRegistry::capture_from(&document.annotations, document.layout.fingerprint())
                .with_source(document.id),
        )
    }

    /// Captures the current document and registers it under a new name.
    pub fn save_overlay(&mut self, name: &str) -> SessionResult<Overlay> {
        let draft = self.capture_overlay()?;
        let overlay = self.project.overlays.save(name, draft)?.clone();
        self.overlay_selection = Some(overlay.name.clone());
        Ok(overlay)
    }

    /// Captures the current document and replaces an existing overlay.
    pub fn update_overlay(&mut self, name: &str) -> SessionResult<Overlay> {
        let draft = self.capture_overlay()?;
        Ok(self.project.overlays.update(name, draft)?.clone())
    }

    pub fn delete_overlay(&mut self, name: &str) -> SessionResult<Overlay> {
        let removed = self.project.overlays.delete(name)?;
        if self
            .overlay_selection
            .as_deref()
            .is_some_and(|selected| slugify(selected) == removed.slug())
        {
            self.overlay_selection = None;
        }
        Ok(removed)
    }

    /// Replays overlay `name` onto the current document.
    pub fn apply_overlay(&mut self, name: &str) -> SessionResult<ApplyReport> {
        let id = self.current.ok_or(SessionError::NoCurrentDocument)?;
        let Self { project, sink, .. } = self;
        let parts = project
            .document_parts(id)
            .ok_or(SessionError::UnknownDocument(id))?;
        let fingerprint = parts.document.fingerprint();
        let report = parts.overlays.apply(
            name,
            &mut parts.document.annotations,
            &fingerprint,
            parts.rubric,
            sink,
        )?;
        Ok(report)
    }

    /// Replays the selected overlay onto the current document.
    pub fn apply_selected_overlay(&mut self) -> SessionResult<ApplyReport> {
        let name = self
            .overlay_selection
            .clone()
            .ok_or(SessionError::NoOverlaySelected)?;
        self.apply_overlay(&name)
    }

    /// Removes a rubric subtree and the marks linked to it in every document.
    pub fn remove_rubric_node(&mut self, rubric_id: &str) -> SessionResult<usize> {
        let removed = self.project.remove_rubric_node(rubric_id)?;
        if let Some(document) = self.current.and_then(|id| self.project.document(id)) {
            self.sink.regenerate(&document.annotations);
        }
        info!(
            "event=session_rubric_edit module=session status=ok marks_removed={}",
            removed
        );
        Ok(removed)
    }

    pub fn exercise_points(&self, rubric_id: &str) -> SessionResult<f64> {
        let document = self
            .current_document()
            .ok_or(SessionError::NoCurrentDocument)?;
        Ok(document.score(&self.project.rubric).exercise_points(rubric_id))
    }

    pub fn document_total(&self) -> SessionResult<f64> {
        let document = self
            .current_document()
            .ok_or(SessionError::NoCurrentDocument)?;
        Ok(document.score(&self.project.rubric).document_total())
    }

    pub fn max_possible(&self) -> f64 {
        self.project.rubric.total()
    }

    pub fn breakdown(&self) -> SessionResult<Vec<ScoreLine>> {
        let document = self
            .current_document()
            .ok_or(SessionError::NoCurrentDocument)?;
        Ok(document.score(&self.project.rubric).breakdown())
    }

    pub fn recap(&self) -> SessionResult<Recap> {
        let document = self
            .current_document()
            .ok_or(SessionError::NoCurrentDocument)?;
        Ok(document.recap(&self.project.rubric, self.project.settings.out_of()))
    }
}
