use crate::layout::{MarginLayout, PageTransform};
use crate::model::overlay::LayoutFingerprint;
use crate::model::rubric::RubricTree;
use crate::score::{Recap, ScoreAggregator};
use crate::store::annotation_store::AnnotationStore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of a document inside a project.
pub type DocumentId = Uuid;

/// One imported student copy with its marks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    /// File name the copy was imported from.
    pub original_name: String,
    pub layout: MarginLayout,
    #[serde(default)]
    pub annotations: AnnotationStore,
}

impl Document {
    pub fn new(original_name: impl Into<String>, layout: MarginLayout) -> Self {
        Self {
            id: Uuid::new_v4(),
            original_name: original_name.into(),
            layout,
            annotations: AnnotationStore::new(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.layout.page_count()
    }

    pub fn fingerprint(&self) -> LayoutFingerprint {
        self.layout.fingerprint()
    }

    pub fn score<'a>(&'a self, rubric: &'a RubricTree) -> ScoreAggregator<'a> {
        ScoreAggregator::new(rubric, &self.annotations)
    }

    pub fn recap(&self, rubric: &RubricTree, out_of: f64) -> Recap {
        Recap::build(rubric, &self.annotations, out_of)
    }

    /// Checks loaded data: non-nil id, sane marks on existing pages.
    pub(crate) fn check_integrity(&self) -> Result<(), String> {
        if self.id.is_nil() {
            return Err(format!("document `{}` has a nil id", self.original_name));
        }
        self.annotations
            .check_integrity()
            .map_err(|message| format!("document {}: {message}", self.id))?;
        let page_count = self.page_count();
        if let Some(page) = self.annotations.pages().find(|page| *page as usize >= page_count) {
            return Err(format!(
                "document {} has marks on page {page} of {page_count}",
                self.id
            ));
        }
        Ok(())
    }
}
