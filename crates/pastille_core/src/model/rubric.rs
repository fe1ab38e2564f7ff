//! Hierarchical grading scheme (rubric tree).
//!
//! # Responsibility
//! - Own every rubric node in an arena keyed by its dot-path identifier.
//! - Compute node maxima bottom-up and grade values for leaves.
//! - Import/export the nested document shape and the flat `{"1.1": 3}` shape.
//!
//! # Invariants
//! - Identifiers are unique and `a.b.c` always has parent `a.b`.
//! - Depth never exceeds three levels (`n.X.Y`).
//! - Leaves carry an explicit non-negative maximum; an internal node's maximum
//!   is the sum of its children and is never stored.
//! - Nodes store child identifiers only; a parent is derived from the id path.
//! - `ordinal` always equals the node position among its siblings.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

static RUBRIC_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]+(\.[0-9]+)*$").expect("valid rubric id regex"));

/// Deepest supported level (`n.X.Y`).
pub const MAX_DEPTH: usize = 3;
/// Version written into exported rubric documents.
pub const RUBRIC_FORMAT_VERSION: u32 = 1;
/// Maximum assigned to leaves created by editing operations.
pub const DEFAULT_LEAF_MAX: f64 = 1.0;

const SUM_TOLERANCE: f64 = 1e-9;

/// Dot-path rubric identifier such as `2.3.1`.
pub type RubricId = String;

/// Outcome chosen when placing a score marker on a leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grade {
    /// Full credit, worth the leaf maximum.
    Good,
    /// Partial credit.
    Partial,
    /// No credit by default.
    Bad,
}

impl Display for Grade {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Good => write!(f, "good"),
            Self::Partial => write!(f, "partial"),
            Self::Bad => write!(f, "bad"),
        }
    }
}

/// Values awarded for the non-full grades of one leaf.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradeScale {
    pub partial: f64,
    pub bad: f64,
}

impl GradeScale {
    /// Half credit for partial, nothing for bad.
    pub fn default_for(max_points: f64) -> Self {
        Self {
            partial: max_points * 0.5,
            bad: 0.0,
        }
    }
}

/// Errors raised while building or editing a rubric tree.
#[derive(Debug, Clone, PartialEq)]
pub enum RubricValidationError {
    /// Identifier is not a dot-separated list of numbers.
    MalformedId(String),
    /// Identifier appears more than once.
    DuplicateId(String),
    /// Identifier's ancestor chain does not match its position.
    MissingParent { id: RubricId, parent: RubricId },
    /// Identifier is deeper than `n.X.Y`.
    DepthExceeded(RubricId),
    /// Point value is below zero.
    NegativePoints { id: RubricId, value: f64 },
    /// Point value is NaN or infinite.
    NonFinitePoints(RubricId),
    /// Leaf declared without a maximum.
    MissingMaximum(RubricId),
    /// Internal node declares a maximum different from its children's sum.
    AmbiguousMaximum {
        id: RubricId,
        declared: f64,
        children_sum: f64,
    },
    /// Grade value lies outside `[0, max]`.
    ScaleOutOfRange {
        id: RubricId,
        grade: Grade,
        value: f64,
        max: f64,
    },
    /// Operation requires a leaf.
    NotALeaf(RubricId),
    /// Operation targets a node at the wrong level.
    WrongLevel { id: RubricId, expected_depth: usize },
    /// Identifier does not exist in the tree.
    UnknownNode(RubricId),
    /// Input document is not a recognized rubric shape.
    InvalidDocument(String),
}

impl Display for RubricValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedId(id) => write!(f, "malformed rubric id `{id}`"),
            Self::DuplicateId(id) => write!(f, "duplicate rubric id `{id}`"),
            Self::MissingParent { id, parent } => {
                write!(f, "rubric node `{id}` requires parent `{parent}`")
            }
            Self::DepthExceeded(id) => write!(
                f,
                "rubric node `{id}` is deeper than {MAX_DEPTH} levels"
            ),
            Self::NegativePoints { id, value } => {
                write!(f, "rubric node `{id}` has negative points {value}")
            }
            Self::NonFinitePoints(id) => write!(f, "rubric node `{id}` has non-finite points"),
            Self::MissingMaximum(id) => write!(f, "rubric leaf `{id}` has no maximum"),
            Self::AmbiguousMaximum {
                id,
                declared,
                children_sum,
            } => write!(
                f,
                "rubric node `{id}` declares {declared} points but its children sum to {children_sum}"
            ),
            Self::ScaleOutOfRange {
                id,
                grade,
                value,
                max,
            } => write!(
                f,
                "rubric leaf `{id}` {grade} value {value} is outside [0, {max}]"
            ),
            Self::NotALeaf(id) => write!(f, "rubric node `{id}` has children"),
            Self::WrongLevel { id, expected_depth } => write!(
                f,
                "rubric node `{id}` is not at level {expected_depth}"
            ),
            Self::UnknownNode(id) => write!(f, "rubric node not found: `{id}`"),
            Self::InvalidDocument(message) => write!(f, "invalid rubric document: {message}"),
        }
    }
}

impl Error for RubricValidationError {}

pub type RubricResult<T> = Result<T, RubricValidationError>;

/// One node of the grading scheme.
#[derive(Debug, Clone, PartialEq)]
pub struct RubricNode {
    /// Dot-path identifier.
    pub id: RubricId,
    /// User-facing label.
    pub label: String,
    /// Position among siblings.
    pub ordinal: usize,
    /// Explicit maximum. Meaningful only for leaves; `0.0` on internal nodes.
    pub max_points: f64,
    /// Explicit grade scale for leaves. `None` means the default scale.
    pub scale: Option<GradeScale>,
    /// Optional nodes count toward the graded maximum only when marked.
    pub optional: bool,
    /// Child identifiers in ordinal order.
    pub children: Vec<RubricId>,
}

impl RubricNode {
    fn leaf(id: RubricId, label: String, ordinal: usize, max_points: f64) -> Self {
        Self {
            id,
            label,
            ordinal,
            max_points,
            scale: None,
            optional: false,
            children: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// `1` for exercises, `2` for `n.X`, `3` for `n.X.Y`.
    pub fn depth(&self) -> usize {
        depth_of(&self.id)
    }

    pub fn parent_id(&self) -> Option<&str> {
        parent_of(&self.id)
    }

    /// Grade scale in effect for this node.
    pub fn effective_scale(&self) -> GradeScale {
        self.scale
            .unwrap_or_else(|| GradeScale::default_for(self.max_points))
    }
}

/// Returns the parent identifier derived from the path, if any.
pub fn parent_of(id: &str) -> Option<&str> {
    id.rfind('.').map(|pos| &id[..pos])
}

/// Returns the top-level exercise identifier of a path.
pub fn exercise_of(id: &str) -> &str {
    id.split('.').next().unwrap_or(id)
}

fn depth_of(id: &str) -> usize {
    id.split('.').count()
}

fn default_label(id: &str) -> String {
    if depth_of(id) == 1 {
        format!("Exercise {id}")
    } else {
        format!("Ex {id}")
    }
}

/// Numeric sort key so that `10` sorts after `2`.
fn path_key(id: &str) -> Vec<u64> {
    id.split('.')
        .map(|part| part.parse::<u64>().unwrap_or(u64::MAX))
        .collect()
}

fn check_points(id: &str, value: f64) -> RubricResult<f64> {
    if !value.is_finite() {
        return Err(RubricValidationError::NonFinitePoints(id.to_string()));
    }
    if value < 0.0 {
        return Err(RubricValidationError::NegativePoints {
            id: id.to_string(),
            value,
        });
    }
    Ok(value)
}

fn check_id(id: &str) -> RubricResult<()> {
    if !RUBRIC_ID_RE.is_match(id) {
        return Err(RubricValidationError::MalformedId(id.to_string()));
    }
    if depth_of(id) > MAX_DEPTH {
        return Err(RubricValidationError::DepthExceeded(id.to_string()));
    }
    Ok(())
}

fn check_scale(id: &str, scale: GradeScale, max: f64) -> RubricResult<GradeScale> {
    for (grade, value) in [(Grade::Partial, scale.partial), (Grade::Bad, scale.bad)] {
        if !value.is_finite() || value < 0.0 || value > max + SUM_TOLERANCE {
            return Err(RubricValidationError::ScaleOutOfRange {
                id: id.to_string(),
                grade,
                value,
                max,
            });
        }
    }
    Ok(scale)
}

/// Nested wire shape of one rubric node.
///
/// `code` is accepted as an alias of `id` for files written by older tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubricDocNode {
    #[serde(alias = "code")]
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bad: Option<f64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<RubricDocNode>,
}

impl RubricDocNode {
    /// Convenience constructor for a leaf declaration.
    pub fn leaf(id: impl Into<String>, max: f64) -> Self {
        Self {
            id: id.into(),
            label: String::new(),
            max: Some(max),
            partial: None,
            bad: None,
            optional: false,
            children: Vec::new(),
        }
    }

    /// Convenience constructor for an internal node declaration.
    pub fn group(id: impl Into<String>, children: Vec<RubricDocNode>) -> Self {
        Self {
            id: id.into(),
            label: String::new(),
            max: None,
            partial: None,
            bad: None,
            optional: false,
            children,
        }
    }
}

fn default_format_version() -> u32 {
    RUBRIC_FORMAT_VERSION
}

/// Nested rubric document, also the export shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubricDoc {
    #[serde(default = "default_format_version")]
    pub version: u32,
    #[serde(default)]
    pub exercises: Vec<RubricDocNode>,
}

impl RubricDoc {
    pub fn new(exercises: Vec<RubricDocNode>) -> Self {
        Self {
            version: RUBRIC_FORMAT_VERSION,
            exercises,
        }
    }
}

/// Arena-backed grading scheme.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RubricDoc", into = "RubricDoc")]
pub struct RubricTree {
    nodes: HashMap<RubricId, RubricNode>,
    roots: Vec<RubricId>,
}

impl TryFrom<RubricDoc> for RubricTree {
    type Error = RubricValidationError;

    fn try_from(value: RubricDoc) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RubricTree> for RubricDoc {
    fn from(value: RubricTree) -> Self {
        value.to_doc()
    }
}

impl RubricTree {
    /// Creates an empty tree (maximum 0).
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds `n` exercises, each with two one-point leaves `.1` and `.2`.
    pub fn default_scheme(exercise_count: usize) -> Self {
        let mut tree = Self::new();
        for _ in 0..exercise_count {
            tree.add_exercise();
        }
        tree
    }

    /// Builds a tree from the nested document.
    ///
    /// # Errors
    /// - Malformed, duplicate or too-deep identifiers.
    /// - A child whose id is not `<parent>.<n>`.
    /// - Negative or non-finite points, leaves without maximum, grade values
    ///   outside `[0, max]`.
    /// - An internal node whose declared maximum differs from its children's sum.
    pub fn parse(doc: &RubricDoc) -> RubricResult<Self> {
        let mut tree = Self::new();
        let mut seen = HashSet::new();
        for (ordinal, node) in doc.exercises.iter().enumerate() {
            let id = tree.insert_doc_node(node, None, ordinal, &mut seen)?;
            tree.roots.push(id);
        }
        Ok(tree)
    }

    fn insert_doc_node(
        &mut self,
        doc: &RubricDocNode,
        parent: Option<&str>,
        ordinal: usize,
        seen: &mut HashSet<RubricId>,
    ) -> RubricResult<RubricId> {
        let id = doc.id.trim().to_string();
        check_id(&id)?;
        if parent_of(&id) != parent {
            return Err(RubricValidationError::MissingParent {
                parent: parent_of(&id).unwrap_or_default().to_string(),
                id,
            });
        }
        if !seen.insert(id.clone()) {
            return Err(RubricValidationError::DuplicateId(id));
        }

        let mut children = Vec::with_capacity(doc.children.len());
        for (child_ordinal, child) in doc.children.iter().enumerate() {
            children.push(self.insert_doc_node(child, Some(&id), child_ordinal, seen)?);
        }

        let label = if doc.label.trim().is_empty() {
            default_label(&id)
        } else {
            doc.label.clone()
        };

        let mut node = RubricNode::leaf(id.clone(), label, ordinal, 0.0);
        node.optional = doc.optional;

        if children.is_empty() {
            let max = doc
                .max
                .ok_or_else(|| RubricValidationError::MissingMaximum(id.clone()))?;
            node.max_points = check_points(&id, max)?;
            if doc.partial.is_some() || doc.bad.is_some() {
                let defaults = GradeScale::default_for(node.max_points);
                let scale = GradeScale {
                    partial: doc.partial.unwrap_or(defaults.partial),
                    bad: doc.bad.unwrap_or(defaults.bad),
                };
                node.scale = Some(check_scale(&id, scale, node.max_points)?);
            }
        } else {
            node.children = children;
            if let Some(declared) = doc.max {
                let declared = check_points(&id, declared)?;
                let children_sum = self.sum_children(&node);
                if (declared - children_sum).abs() > SUM_TOLERANCE {
                    return Err(RubricValidationError::AmbiguousMaximum {
                        id,
                        declared,
                        children_sum,
                    });
                }
            }
        }

        self.nodes.insert(id.clone(), node);
        Ok(id)
    }

    /// Builds a tree from flat `(id, points)` entries.
    ///
    /// Entries may come in any order; siblings are ordered numerically. A value
    /// given for a node that has children must equal the children's sum.
    pub fn parse_flat<I, S>(entries: I) -> RubricResult<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut declared: HashMap<RubricId, f64> = HashMap::new();
        for (raw_id, value) in entries {
            let id = raw_id.into().trim().to_string();
            check_id(&id)?;
            let value = check_points(&id, value)?;
            if declared.insert(id.clone(), value).is_some() {
                return Err(RubricValidationError::DuplicateId(id));
            }
        }

        let mut ids: Vec<RubricId> = declared.keys().cloned().collect();
        ids.sort_by_key(|id| path_key(id));

        for id in &ids {
            if let Some(parent) = parent_of(id) {
                if !declared.contains_key(parent) {
                    return Err(RubricValidationError::MissingParent {
                        id: id.clone(),
                        parent: parent.to_string(),
                    });
                }
            }
        }

        let mut tree = Self::new();
        for id in &ids {
            let ordinal = tree.sibling_ids(parent_of(id)).len();
            let node = RubricNode::leaf(id.clone(), default_label(id), ordinal, declared[id]);
            match parent_of(id) {
                Some(parent) => {
                    if let Some(parent_node) = tree.nodes.get_mut(parent) {
                        parent_node.children.push(id.clone());
                    }
                }
                None => tree.roots.push(id.clone()),
            }
            tree.nodes.insert(id.clone(), node);
        }

        // Deepest first so a parent is checked against finalized children.
        let mut internal: Vec<RubricId> = ids
            .iter()
            .filter(|id| tree.nodes.get(*id).is_some_and(|node| !node.is_leaf()))
            .cloned()
            .collect();
        internal.sort_by_key(|id| std::cmp::Reverse(depth_of(id)));
        for id in internal {
            let children_sum = tree.total_at(&id)?;
            let declared_value = declared[&id];
            if (declared_value - children_sum).abs() > SUM_TOLERANCE {
                return Err(RubricValidationError::AmbiguousMaximum {
                    id,
                    declared: declared_value,
                    children_sum,
                });
            }
            if let Some(node) = tree.nodes.get_mut(&id) {
                node.max_points = 0.0;
            }
        }

        Ok(tree)
    }

    /// Imports either the nested document or the flat map shape.
    pub fn import_json(json: &str) -> RubricResult<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|err| RubricValidationError::InvalidDocument(err.to_string()))?;
        let Value::Object(map) = value else {
            return Err(RubricValidationError::InvalidDocument(
                "expected a JSON object".to_string(),
            ));
        };

        if map.contains_key("exercises") {
            let doc: RubricDoc = serde_json::from_value(Value::Object(map))
                .map_err(|err| RubricValidationError::InvalidDocument(err.to_string()))?;
            return Self::parse(&doc);
        }

        let mut entries = Vec::with_capacity(map.len());
        for (id, value) in map {
            let points = value.as_f64().ok_or_else(|| {
                RubricValidationError::InvalidDocument(format!(
                    "value for `{id}` must be a number"
                ))
            })?;
            entries.push((id, points));
        }
        Self::parse_flat(entries)
    }

    /// Exports the nested document shape. Re-importing reproduces this tree.
    pub fn export_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.to_doc())
    }

    /// Converts the tree into its nested document.
    pub fn to_doc(&self) -> RubricDoc {
        RubricDoc::new(
            self.roots
                .iter()
                .filter_map(|id| self.nodes.get(id))
                .map(|node| self.doc_of(node))
                .collect(),
        )
    }

    fn doc_of(&self, node: &RubricNode) -> RubricDocNode {
        let leaf = node.is_leaf();
        RubricDocNode {
            id: node.id.clone(),
            label: node.label.clone(),
            max: leaf.then_some(node.max_points),
            partial: node.scale.filter(|_| leaf).map(|scale| scale.partial),
            bad: node.scale.filter(|_| leaf).map(|scale| scale.bad),
            optional: node.optional,
            children: self
                .children(&node.id)
                .map(|child| self.doc_of(child))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn get(&self, id: &str) -> Option<&RubricNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Top-level exercise identifiers in ordinal order.
    pub fn roots(&self) -> &[RubricId] {
        &self.roots
    }

    /// Children of one node in ordinal order. Empty for unknown ids.
    pub fn children<'a>(&'a self, id: &str) -> impl Iterator<Item = &'a RubricNode> + 'a {
        self.nodes
            .get(id)
            .map(|node| node.children.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(move |child| self.nodes.get(child))
    }

    /// Every node in depth-first, ordinal order.
    pub fn walk(&self) -> Vec<&RubricNode> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<&RubricId> = self.roots.iter().rev().collect();
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get(id) {
                out.push(node);
                stack.extend(node.children.iter().rev());
            }
        }
        out
    }

    /// Leaves in depth-first, ordinal order.
    pub fn leaves(&self) -> Vec<&RubricNode> {
        self.walk().into_iter().filter(|node| node.is_leaf()).collect()
    }

    /// Maximum points of one node, computed recursively.
    pub fn total_at(&self, id: &str) -> RubricResult<f64> {
        let node = self
            .nodes
            .get(id)
            .ok_or_else(|| RubricValidationError::UnknownNode(id.to_string()))?;
        Ok(self.subtree_total(node))
    }

    /// Maximum points of the whole scheme.
    pub fn total(&self) -> f64 {
        self.roots
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .map(|node| self.subtree_total(node))
            .sum()
    }

    fn subtree_total(&self, node: &RubricNode) -> f64 {
        if node.is_leaf() {
            node.max_points
        } else {
            self.sum_children(node)
        }
    }

    fn sum_children(&self, node: &RubricNode) -> f64 {
        node.children
            .iter()
            .filter_map(|child| self.nodes.get(child))
            .map(|child| self.subtree_total(child))
            .sum()
    }

    /// Points awarded for `grade` on node `id`.
    ///
    /// Leaves use their own scale; internal nodes use the default scale of
    /// their subtree total.
    pub fn points_for(&self, id: &str, grade: Grade) -> RubricResult<f64> {
        let node = self
            .nodes
            .get(id)
            .ok_or_else(|| RubricValidationError::UnknownNode(id.to_string()))?;
        let max = self.subtree_total(node);
        let scale = if node.is_leaf() {
            node.effective_scale()
        } else {
            GradeScale::default_for(max)
        };
        Ok(match grade {
            Grade::Good => max,
            Grade::Partial => scale.partial,
            Grade::Bad => scale.bad,
        })
    }

    /// Appends a new exercise with two default leaves and returns its id.
    pub fn add_exercise(&mut self) -> RubricId {
        let next = next_index(self.roots.iter());
        let id = next.to_string();
        let node = RubricNode::leaf(id.clone(), default_label(&id), self.roots.len(), 0.0);
        self.nodes.insert(id.clone(), node);
        self.roots.push(id.clone());
        for _ in 0..2 {
            self.push_child(&id);
        }
        id
    }

    /// Appends a leaf `n.X` under exercise `exercise_id`.
    pub fn add_sublevel(&mut self, exercise_id: &str) -> RubricResult<RubricId> {
        self.require_depth(exercise_id, 1)?;
        Ok(self.push_child(exercise_id))
    }

    /// Appends a leaf `n.X.Y` under sublevel `sublevel_id`.
    ///
    /// The sublevel stops being a leaf: its maximum and scale are dropped.
    pub fn add_subsublevel(&mut self, sublevel_id: &str) -> RubricResult<RubricId> {
        self.require_depth(sublevel_id, 2)?;
        Ok(self.push_child(sublevel_id))
    }

    fn require_depth(&self, id: &str, expected_depth: usize) -> RubricResult<()> {
        let node = self
            .nodes
            .get(id)
            .ok_or_else(|| RubricValidationError::UnknownNode(id.to_string()))?;
        if node.depth() != expected_depth {
            return Err(RubricValidationError::WrongLevel {
                id: id.to_string(),
                expected_depth,
            });
        }
        Ok(())
    }

    fn push_child(&mut self, parent_id: &str) -> RubricId {
        let siblings = self.sibling_ids(Some(parent_id));
        let ordinal = siblings.len();
        let id = format!("{parent_id}.{}", next_index(siblings.iter()));
        if let Some(parent) = self.nodes.get_mut(parent_id) {
            parent.children.push(id.clone());
            parent.max_points = 0.0;
            parent.scale = None;
        }
        self.nodes.insert(
            id.clone(),
            RubricNode::leaf(id.clone(), default_label(&id), ordinal, DEFAULT_LEAF_MAX),
        );
        id
    }

    fn sibling_ids(&self, parent: Option<&str>) -> Vec<RubricId> {
        match parent {
            Some(parent) => self
                .nodes
                .get(parent)
                .map(|node| node.children.clone())
                .unwrap_or_default(),
            None => self.roots.clone(),
        }
    }

    pub fn set_label(&mut self, id: &str, label: impl Into<String>) -> RubricResult<()> {
        let node = self.node_mut(id)?;
        node.label = label.into();
        Ok(())
    }

    /// Sets a leaf maximum. An explicit scale must still fit under it.
    pub fn set_max(&mut self, id: &str, max_points: f64) -> RubricResult<()> {
        let max_points = check_points(id, max_points)?;
        let node = self.node_mut(id)?;
        if !node.is_leaf() {
            return Err(RubricValidationError::NotALeaf(id.to_string()));
        }
        if let Some(scale) = node.scale {
            check_scale(id, scale, max_points)?;
        }
        node.max_points = max_points;
        Ok(())
    }

    /// Sets or clears the explicit grade scale of a leaf.
    pub fn set_scale(&mut self, id: &str, scale: Option<GradeScale>) -> RubricResult<()> {
        let node = self.node_mut(id)?;
        if !node.is_leaf() {
            return Err(RubricValidationError::NotALeaf(id.to_string()));
        }
        if let Some(scale) = scale {
            check_scale(id, scale, node.max_points)?;
        }
        node.scale = scale;
        Ok(())
    }

    pub fn set_optional(&mut self, id: &str, optional: bool) -> RubricResult<()> {
        self.node_mut(id)?.optional = optional;
        Ok(())
    }

    /// Removes a node and its entire subtree. Returns the removed ids.
    ///
    /// A parent left without children becomes a leaf worth 0 points.
    pub fn remove_node(&mut self, id: &str) -> RubricResult<Vec<RubricId>> {
        if !self.nodes.contains_key(id) {
            return Err(RubricValidationError::UnknownNode(id.to_string()));
        }

        let mut removed = Vec::new();
        let mut stack = vec![id.to_string()];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(&current) {
                stack.extend(node.children);
                removed.push(current);
            }
        }

        match parent_of(id) {
            Some(parent_id) => {
                let mut reindex = Vec::new();
                if let Some(parent) = self.nodes.get_mut(parent_id) {
                    parent.children.retain(|child| child != id);
                    reindex = parent.children.clone();
                }
                self.reindex(&reindex);
            }
            None => {
                self.roots.retain(|root| root != id);
                let reindex = self.roots.clone();
                self.reindex(&reindex);
            }
        }

        Ok(removed)
    }

    fn reindex(&mut self, siblings: &[RubricId]) {
        for (ordinal, sibling) in siblings.iter().enumerate() {
            if let Some(node) = self.nodes.get_mut(sibling) {
                node.ordinal = ordinal;
            }
        }
    }

    fn node_mut(&mut self, id: &str) -> RubricResult<&mut RubricNode> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| RubricValidationError::UnknownNode(id.to_string()))
    }
}

fn next_index<'a>(ids: impl Iterator<Item = &'a RubricId>) -> u64 {
    ids.filter_map(|id| id.rsplit('.').next()?.parse::<u64>().ok())
        .max()
        .map_or(1, |max| max + 1)
}

#[cfg(test)]
mod tests {
    use super::{parent_of, path_key, RubricTree, RubricValidationError};

    #[test]
    fn parent_of_strips_last_segment() {
        assert_eq!(parent_of("2.3.1"), Some("2.3"));
        assert_eq!(parent_of("2"), None);
    }

    #[test]
    fn path_key_orders_numerically() {
        let mut ids = vec!["10", "2", "2.10", "2.9"];
        ids.sort_by_key(|id| path_key(id));
        assert_eq!(ids, vec!["2", "2.9", "2.10", "10"]);
    }

    #[test]
    fn default_scheme_has_two_leaves_per_exercise() {
        let tree = RubricTree::default_scheme(2);
        assert_eq!(tree.roots(), ["1", "2"]);
        assert_eq!(tree.total_at("1").expect("exercise exists"), 2.0);
        assert_eq!(tree.total(), 4.0);
        assert_eq!(tree.get("2.2").expect("leaf exists").label, "Ex 2.2");
    }

    #[test]
    fn add_subsublevel_turns_sublevel_into_group() {
        let mut tree = RubricTree::default_scheme(1);
        tree.set_max("1.1", 4.0).expect("leaf max should update");
        let child = tree.add_subsublevel("1.1").expect("sublevel accepts children");
        assert_eq!(child, "1.1.1");
        assert_eq!(tree.total_at("1.1").expect("node exists"), 1.0);
        assert!(matches!(
            tree.set_max("1.1", 3.0),
            Err(RubricValidationError::NotALeaf(_))
        ));
    }

    #[test]
    fn add_sublevel_rejects_wrong_level() {
        let mut tree = RubricTree::default_scheme(1);
        let err = tree.add_sublevel("1.1").expect_err("only exercises take sublevels");
        assert_eq!(
            err,
            RubricValidationError::WrongLevel {
                id: "1.1".to_string(),
                expected_depth: 1
            }
        );
    }
}
