//! Per-exercise recap and scaled grade of one document.

use super::aggregator::{format_points, round2, ScoreAggregator};
use crate::model::rubric::RubricTree;
use crate::store::annotation_store::AnnotationStore;
use serde::Serialize;
use std::fmt::Write;

/// One top-level exercise of the recap.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecapRow {
    pub rubric_id: String,
    pub label: String,
    pub earned: f64,
    pub max: f64,
    /// Score comes from a manual-points mark.
    pub manual: bool,
}

/// Final note of a document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recap {
    pub rows: Vec<RecapRow>,
    pub total: f64,
    /// Graded maximum: optional exercises without marks are left out.
    pub max: f64,
    pub out_of: f64,
    /// `total / max * out_of` rounded to two decimals; `None` when `max` is 0.
    pub grade: Option<f64>,
}

impl Recap {
    pub fn build(tree: &RubricTree, store: &AnnotationStore, out_of: f64) -> Self {
        let aggregator = ScoreAggregator::new(tree, store);
        let rows = tree
            .roots()
            .iter()
            .filter_map(|root| tree.get(root))
            .map(|node| RecapRow {
                rubric_id: node.id.clone(),
                label: node.label.clone(),
                earned: aggregator.exercise_points(&node.id),
                max: aggregator.graded_max_at(&node.id),
                manual: aggregator.manual_override(&node.id).is_some(),
            })
            .collect();
        let total = aggregator.document_total();
        let max = aggregator.graded_max();
        let grade = (max > 0.0).then(|| round2(total / max * out_of));
        Self {
            rows,
            total,
            max,
            out_of,
            grade,
        }
    }

    /// Multi-line summary, one `Ex` line per exercise then total and grade.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for row in &self.rows {
            let flag = if row.manual { " (M)" } else { "" };
            let _ = writeln!(
                out,
                "Ex {}{} : {}/{}",
                row.rubric_id,
                flag,
                format_points(row.earned),
                format_points(row.max)
            );
        }
        let _ = writeln!(
            out,
            "Total : {}/{}",
            format_points(self.total),
            format_points(self.max)
        );
        if let Some(grade) = self.grade {
            let _ = writeln!(
                out,
                "Grade : {}/{}",
                format_points(grade),
                format_points(self.out_of)
            );
        }
        out
    }
}
