//! Project aggregate: rubric, documents, overlays and settings.
//!
//! # Responsibility
//! - Own the rubric tree, the ordered document list and the overlay registry.
//! - Keep document marks consistent with rubric edits.
//! - Expose disjoint borrows so one document can be edited against the rubric.
//!
//! # Invariants
//! - Document ids are unique and never nil.
//! - Removing a document destroys its marks.
//! - Removing a rubric node removes the marks linked to its subtree.
//!
//! # See also
//! - `persist` for the on-disk shape.

mod document;
mod settings;

pub use document::{Document, DocumentId};
pub use settings::ProjectSettings;

use crate::layout::PageSize;
use crate::model::rubric::{RubricResult, RubricTree};
use crate::overlay::OverlayRegistry;
use crate::persist::{self, PersistResult};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Grading project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    #[serde(default)]
    pub settings: ProjectSettings,
    #[serde(default)]
    pub rubric: RubricTree,
    #[serde(default)]
    documents: Vec<Document>,
    #[serde(default)]
    pub overlays: OverlayRegistry,
}

/// Disjoint borrows of one document and the project data it is edited against.
pub struct DocumentParts<'a> {
    pub rubric: &'a RubricTree,
    pub settings: &'a ProjectSettings,
    pub overlays: &'a mut OverlayRegistry,
    pub document: &'a mut Document,
}

impl Project {
    pub fn new(name: impl Into<String>, rubric: RubricTree) -> Self {
        Self {
            name: name.into(),
            settings: ProjectSettings::default(),
            rubric,
            documents: Vec::new(),
            overlays: OverlayRegistry::new(),
        }
    }

    /// Documents in import order.
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn document(&self, id: DocumentId) -> Option<&Document> {
        self.documents.iter().find(|document| document.id == id)
    }

    pub fn document_mut(&mut self, id: DocumentId) -> Option<&mut Document> {
        self.documents.iter_mut().find(|document| document.id == id)
    }

    /// Adds a document whose pages get the configured margins.
    pub fn add_document(
        &mut self,
        original_name: impl Into<String>,
        source_pages: Vec<PageSize>,
    ) -> DocumentId {
        let layout = self.settings.margin_layout(source_pages);
        let document = Document::new(original_name, layout);
        let id = document.id;
        info!(
            "event=document_add module=project status=ok document_id={} pages={}",
            id,
            document.page_count()
        );
        self.documents.push(document);
        id
    }

    /// Removes a document together with all its marks.
    pub fn remove_document(&mut self, id: DocumentId) -> Option<Document> {
        let index = self.documents.iter().position(|document| document.id == id)?;
        let removed = self.documents.remove(index);
        info!(
            "event=document_remove module=project status=ok document_id={} marks={}",
            id,
            removed.annotations.len()
        );
        Some(removed)
    }

    pub fn document_parts(&mut self, id: DocumentId) -> Option<DocumentParts<'_>> {
        let Self {
            settings,
            rubric,
            documents,
            overlays,
            ..
        } = self;
        let document = documents.iter_mut().find(|document| document.id == id)?;
        Some(DocumentParts {
            rubric,
            settings,
            overlays,
            document,
        })
    }

    /// Removes a rubric subtree and every mark linked to it.
    ///
    /// Returns the number of marks removed across all documents.
    pub fn remove_rubric_node(&mut self, rubric_id: &str) -> RubricResult<usize> {
        let removed: HashSet<String> = self.rubric.remove_node(rubric_id)?.into_iter().collect();
        let marks = self
            .documents
            .iter_mut()
            .map(|document| document.annotations.remove_linked(&removed))
            .sum();
        info!(
            "event=rubric_node_remove module=project status=ok nodes={} marks={}",
            removed.len(),
            marks
        );
        Ok(marks)
    }

    /// Writes `<root>/project.json` and the overlay files atomically.
    pub fn save(&self, root: &Path) -> PersistResult<PathBuf> {
        persist::save_project(self, root)
    }

    /// Loads a project from a directory or a project file path.
    pub fn load(path: &Path) -> PersistResult<Self> {
        persist::load_any(path)
    }

    /// Checks loaded data: unique non-nil document ids, sane stores, overlay keys.
    pub(crate) fn check_integrity(&self) -> Result<(), String> {
        let mut seen = HashSet::new();
        for document in &self.documents {
            document.check_integrity()?;
            if !seen.insert(document.id) {
                return Err(format!("duplicate document id {}", document.id));
            }
        }
        self.overlays.check_integrity()
    }
}
