//! Scores derived from a rubric and one document's marks.
//!
//! # Responsibility
//! - Sum score-marker values per rubric node and apply manual overrides.
//! - Roll node scores up the rubric tree into a document total.
//!
//! # Invariants
//! - A manual-points mark replaces the whole subtree score of its node; it is
//!   never added to score-marker values.
//! - Marks linked to nodes absent from the rubric do not reach the total.
//! - Values are plain `f64` sums; display rounding happens in `format_points`.

use crate::model::mark::{MarkBody, MarkId};
use crate::model::rubric::{RubricNode, RubricTree};
use crate::store::annotation_store::AnnotationStore;
use std::collections::HashMap;

/// Score view over one rubric and one document store.
pub struct ScoreAggregator<'a> {
    tree: &'a RubricTree,
    direct: HashMap<&'a str, f64>,
    manual: HashMap<&'a str, (MarkId, f64)>,
}

/// One rubric node in a score breakdown.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreLine {
    pub rubric_id: String,
    pub label: String,
    pub depth: usize,
    pub earned: f64,
    pub max: f64,
    /// Set when a manual-points mark overrides this node.
    pub manual: Option<MarkId>,
}

impl<'a> ScoreAggregator<'a> {
    /// Indexes score-marker sums and manual overrides of `store`.
    pub fn new(tree: &'a RubricTree, store: &'a AnnotationStore) -> Self {
        let mut direct: HashMap<&str, f64> = HashMap::new();
        let mut manual = HashMap::new();
        for mark in store.iter() {
            match &mark.body {
                MarkBody::ScoreMarker {
                    rubric_id, value, ..
                } => *direct.entry(rubric_id.as_str()).or_default() += value,
                MarkBody::ManualPoints { rubric_id, value } => {
                    manual.insert(rubric_id.as_str(), (mark.id, *value));
                }
                MarkBody::Text { .. }
                | MarkBody::Arrow { .. }
                | MarkBody::Freehand { .. }
                | MarkBody::Image { .. } => {}
            }
        }
        Self {
            tree,
            direct,
            manual,
        }
    }

    /// Score of one rubric node.
    ///
    /// The manual value when one exists; otherwise the score markers linked to
    /// the node plus the scores of its children.
    pub fn exercise_points(&self, rubric_id: &str) -> f64 {
        if let Some((_, value)) = self.manual.get(rubric_id) {
            return *value;
        }
        let own = self.direct.get(rubric_id).copied().unwrap_or(0.0);
        let children: f64 = self
            .tree
            .children(rubric_id)
            .map(|child| self.exercise_points(&child.id))
            .sum();
        own + children
    }

    /// Sum of every top-level exercise score.
    pub fn document_total(&self) -> f64 {
        self.tree
            .roots()
            .iter()
            .map(|root| self.exercise_points(root))
            .sum()
    }

    /// Maximum of the whole rubric.
    pub fn max_possible(&self) -> f64 {
        self.tree.total()
    }

    /// Maximum counting optional subtrees only when they carry marks.
    pub fn graded_max(&self) -> f64 {
        self.tree
            .roots()
            .iter()
            .filter_map(|root| self.tree.get(root))
            .map(|node| self.node_graded_max(node))
            .sum()
    }

    /// Graded maximum of one node.
    pub fn graded_max_at(&self, rubric_id: &str) -> f64 {
        self.tree
            .get(rubric_id)
            .map_or(0.0, |node| self.node_graded_max(node))
    }

    fn node_graded_max(&self, node: &RubricNode) -> f64 {
        if node.optional && !self.is_graded(node) {
            return 0.0;
        }
        if node.is_leaf() || self.manual.contains_key(node.id.as_str()) {
            return self.tree.total_at(&node.id).unwrap_or(0.0);
        }
        self.tree
            .children(&node.id)
            .map(|child| self.node_graded_max(child))
            .sum()
    }

    fn is_graded(&self, node: &RubricNode) -> bool {
        self.manual.contains_key(node.id.as_str())
            || self.direct.contains_key(node.id.as_str())
            || self.tree.children(&node.id).any(|child| self.is_graded(child))
    }

    /// Manual override of a node, if any.
    pub fn manual_override(&self, rubric_id: &str) -> Option<(MarkId, f64)> {
        self.manual.get(rubric_id).copied()
    }

    /// Every rubric node in depth-first order with its score.
    pub fn breakdown(&self) -> Vec<ScoreLine> {
        self.tree
            .walk()
            .into_iter()
            .map(|node| ScoreLine {
                rubric_id: node.id.clone(),
                label: node.label.clone(),
                depth: node.depth(),
                earned: self.exercise_points(&node.id),
                max: self.tree.total_at(&node.id).unwrap_or(0.0),
                manual: self.manual_override(&node.id).map(|(id, _)| id),
            })
            .collect()
    }
}

/// Formats points with at most two decimals and no trailing zeros.
pub fn format_points(value: f64) -> String {
    let rounded = round2(value);
    let text = format!("{rounded:.2}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "-0" {
        "0".to_string()
    } else {
        text.to_string()
    }
}

/// Rounds half away from zero to two decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::{format_points, round2};

    #[test]
    fn format_points_trims_trailing_zeros() {
        assert_eq!(format_points(3.0), "3");
        assert_eq!(format_points(2.5), "2.5");
        assert_eq!(format_points(20.0 / 3.0), "6.67");
        assert_eq!(format_points(-0.001), "0");
    }

    #[test]
    fn round2_keeps_two_decimals() {
        assert_eq!(round2(6.666_666), 6.67);
        assert_eq!(round2(1.0), 1.0);
    }
}
