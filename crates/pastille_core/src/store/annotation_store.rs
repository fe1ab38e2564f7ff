//! Positioned marks of one document.
//!
//! # Responsibility
//! - Convert document-space placements into normalized marks.
//! - Keep page sequences in insertion order for deterministic redraw/export.
//! - Enforce the single manual-points mark per rubric node.
//!
//! # Invariants
//! - Mark ids are fresh UUIDs, never reused inside one store.
//! - At most one manual-points mark exists per rubric node.
//! - Score-marker and manual-points values lie within `[0, node max]` when placed.
//! - Failed operations leave the store untouched.
//!
//! # See also
//! - `store::gesture` for drag handling and regeneration.

use crate::layout::{MarginAlignment, PageTransform};
use crate::model::mark::{
    validate_value, AnnotationMark, InvalidLinkError, MarkBody, MarkDraft, MarkId, MarkKind,
    MarkStyle, NormPoint, RawPoint,
};
use crate::model::rubric::{Grade, RubricId, RubricTree};
use crate::store::{StoreError, StoreResult};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;

/// Marker radius plus click slack, in points.
pub const DEFAULT_HIT_TOLERANCE_PT: f64 = 19.0;

/// Anchor given to a manual-points mark created without a position.
pub const MANUAL_POINTS_ANCHOR: NormPoint = NormPoint { x: 0.02, y: 0.02 };

/// Everything an edit needs besides the store itself.
pub struct EditContext<'a, G: PageTransform + ?Sized> {
    pub rubric: &'a RubricTree,
    pub geometry: &'a G,
    pub alignment: Option<MarginAlignment>,
}

impl<'a, G: PageTransform + ?Sized> EditContext<'a, G> {
    pub fn new(rubric: &'a RubricTree, geometry: &'a G) -> Self {
        Self {
            rubric,
            geometry,
            alignment: None,
        }
    }

    pub fn with_alignment(mut self, alignment: Option<MarginAlignment>) -> Self {
        self.alignment = alignment;
        self
    }

    fn check_page(&self, page: u32) -> StoreResult<()> {
        let page_count = self.geometry.page_count();
        if (page as usize) < page_count {
            Ok(())
        } else {
            Err(StoreError::PageOutOfRange { page, page_count })
        }
    }

    fn normalize(&self, page: u32, raw: RawPoint) -> StoreResult<NormPoint> {
        self.check_page(page)?;
        if !raw.x.is_finite() || !raw.y.is_finite() {
            return Err(StoreError::InvalidGeometry(format!(
                "non-finite position ({}, {})",
                raw.x, raw.y
            )));
        }
        self.geometry
            .to_normalized(page, raw)
            .ok_or_else(|| StoreError::InvalidGeometry(format!("page {page} has no size")))
    }

    fn snap(&self, page: u32, kind: MarkKind, position: NormPoint) -> NormPoint {
        match (kind, self.alignment) {
            (MarkKind::ScoreMarker, Some(rule)) => rule.snap(self.geometry, page, position),
            _ => position,
        }
    }
}

/// Marks of one document, keyed by zero-based page index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationStore {
    pages: BTreeMap<u32, Vec<AnnotationMark>>,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pages.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.values().all(Vec::is_empty)
    }

    /// Marks of one page in insertion order.
    pub fn marks_on(&self, page: u32) -> &[AnnotationMark] {
        self.pages.get(&page).map(Vec::as_slice).unwrap_or_default()
    }

    /// Pages that currently hold at least one mark.
    pub fn pages(&self) -> impl Iterator<Item = u32> + '_ {
        self.pages
            .iter()
            .filter(|(_, marks)| !marks.is_empty())
            .map(|(page, _)| *page)
    }

    /// Every mark, page by page, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &AnnotationMark> {
        self.pages.values().flatten()
    }

    pub fn get(&self, id: MarkId) -> Option<&AnnotationMark> {
        self.iter().find(|mark| mark.id == id)
    }

    pub fn contains(&self, id: MarkId) -> bool {
        self.get(id).is_some()
    }

    /// The manual-points mark of `rubric_id`, if any.
    pub fn manual_for(&self, rubric_id: &str) -> Option<&AnnotationMark> {
        self.iter().find(|mark| {
            mark.kind() == MarkKind::ManualPoints && mark.rubric_link() == Some(rubric_id)
        })
    }

    /// Places a new mark at a document-space position.
    ///
    /// A manual-points draft replaces the existing manual mark of its node
    /// (keeping that mark's id) instead of adding a second one.
    ///
    /// # Errors
    /// - `InvalidLink` when a score/manual draft has no link, no value, an
    ///   unknown node or a value outside `[0, node max]`.
    /// - `PageOutOfRange`, `InvalidStyle`, `InvalidGeometry` for bad input.
    pub fn place<G: PageTransform + ?Sized>(
        &mut self,
        ctx: &EditContext<'_, G>,
        page: u32,
        raw: RawPoint,
        draft: MarkDraft,
        style: Option<MarkStyle>,
    ) -> StoreResult<MarkId> {
        let kind = draft.kind();
        let position = ctx.normalize(page, raw)?;

        let body = match draft {
            MarkDraft::ManualPoints { rubric_id, value } => {
                let rubric_id = rubric_id.ok_or(InvalidLinkError::MissingLink { kind })?;
                let value = value.ok_or(InvalidLinkError::MissingValue { kind })?;
                validate_value(ctx.rubric, &rubric_id, value)?;
                let style = style.as_ref().map(normalize_style).transpose()?;
                let (id, _) = self.upsert_manual(page, Some(position), style, rubric_id, value);
                return Ok(id);
            }
            MarkDraft::ScoreMarker {
                rubric_id,
                grade,
                value,
            } => score_body(ctx, rubric_id, grade, value)?,
            MarkDraft::Text { text } => MarkBody::Text { text },
            MarkDraft::Arrow { end } => MarkBody::Arrow {
                end: ctx.normalize(page, end)?,
            },
            MarkDraft::Freehand { path } => {
                let mut points = Vec::with_capacity(path.len() + 1);
                points.push(position);
                for raw in path {
                    points.push(ctx.normalize(page, raw)?);
                }
                MarkBody::Freehand { path: points }
            }
            MarkDraft::Image {
                image_ref,
                width_pt,
                height_pt,
            } => image_body(ctx, page, image_ref, width_pt, height_pt)?,
        };
        let style = normalize_style(&style.unwrap_or_else(|| MarkStyle::default_for(&body)))?;
        let position = ctx.snap(page, kind, position);
        let id = self.append(page, position, style, body);
        debug!(
            "event=mark_place module=store status=ok kind={} page={} mark_id={}",
            kind, page, id
        );
        Ok(id)
    }

    /// Moves a mark anchor to a new document-space position on its page.
    ///
    /// Arrow ends and freehand points follow the anchor; the move stops at
    /// the page edge instead of squashing the stroke. Score markers snap to
    /// the alignment distance when a rule is configured. Returns whether the
    /// mark actually moved.
    pub fn move_mark<G: PageTransform + ?Sized>(
        &mut self,
        ctx: &EditContext<'_, G>,
        id: MarkId,
        raw: RawPoint,
    ) -> StoreResult<bool> {
        let (page, kind) = self
            .get(id)
            .map(|mark| (mark.page, mark.kind()))
            .ok_or(StoreError::UnknownMark(id))?;
        let position = ctx.snap(page, kind, ctx.normalize(page, raw)?);

        let mark = self.find_mut(id).ok_or(StoreError::UnknownMark(id))?;
        let dx = position.x - mark.position.x;
        let dy = position.y - mark.position.y;
        Ok(mark.shift_within_page(dx, dy))
    }

    /// Replaces the style of a mark.
    pub fn restyle(&mut self, id: MarkId, style: &MarkStyle) -> StoreResult<()> {
        let style = normalize_style(style)?;
        let mark = self.find_mut(id).ok_or(StoreError::UnknownMark(id))?;
        mark.style = style;
        Ok(())
    }

    /// Deletes a mark. Returns `false` when it was already absent.
    pub fn remove(&mut self, id: MarkId) -> bool {
        let mut removed_from = None;
        for (page, marks) in self.pages.iter_mut() {
            if let Some(index) = marks.iter().position(|mark| mark.id == id) {
                marks.remove(index);
                removed_from = Some(*page);
                break;
            }
        }
        match removed_from {
            Some(page) => {
                if self.pages.get(&page).is_some_and(Vec::is_empty) {
                    self.pages.remove(&page);
                }
                debug!(
                    "event=mark_remove module=store status=ok page={} mark_id={}",
                    page, id
                );
                true
            }
            None => false,
        }
    }

    /// Removes every mark linked to one of `rubric_ids`. Returns the count.
    pub fn remove_linked(&mut self, rubric_ids: &HashSet<RubricId>) -> usize {
        let before = self.len();
        for marks in self.pages.values_mut() {
            marks.retain(|mark| {
                mark.rubric_link()
                    .map_or(true, |rubric_id| !rubric_ids.contains(rubric_id))
            });
        }
        self.pages.retain(|_, marks| !marks.is_empty());
        before - self.len()
    }

    /// Creates or replaces the manual-points mark of `rubric_id`.
    ///
    /// An existing mark keeps its id and anchor; when `page` differs it moves
    /// to the end of the new page sequence.
    pub fn set_manual_points<G: PageTransform + ?Sized>(
        &mut self,
        ctx: &EditContext<'_, G>,
        rubric_id: &str,
        page: u32,
        value: f64,
    ) -> StoreResult<MarkId> {
        ctx.check_page(page)?;
        validate_value(ctx.rubric, rubric_id, value)?;
        let (id, replaced) = self.upsert_manual(page, None, None, rubric_id.to_string(), value);
        debug!(
            "event=manual_points_set module=store status=ok page={} mark_id={} replaced={}",
            page, id, replaced
        );
        Ok(id)
    }

    /// Nearest mark on `page` whose anchor lies within `tolerance_pt`.
    ///
    /// Ties go to the most recently placed mark, which is drawn on top.
    pub fn hit_test<G: PageTransform + ?Sized>(
        &self,
        geometry: &G,
        page: u32,
        raw: RawPoint,
        tolerance_pt: f64,
    ) -> Option<MarkId> {
        let mut best: Option<(f64, MarkId)> = None;
        for mark in self.marks_on(page) {
            let Some(anchor) = geometry.to_raw(page, mark.position) else {
                continue;
            };
            let distance = anchor.distance_to(raw);
            if distance > tolerance_pt {
                continue;
            }
            if best.map_or(true, |(best_distance, _)| distance <= best_distance) {
                best = Some((distance, mark.id));
            }
        }
        best.map(|(_, id)| id)
    }

    /// Appends an already validated mark with a fresh id.
    pub(crate) fn append(
        &mut self,
        page: u32,
        position: NormPoint,
        style: MarkStyle,
        body: MarkBody,
    ) -> MarkId {
        let id = self.mint_id();
        self.pages.entry(page).or_default().push(AnnotationMark {
            id,
            page,
            position,
            style,
            body,
        });
        id
    }

    /// Creates or updates the manual mark of a node. Inputs are pre-validated.
    ///
    /// Returns the mark id and whether an existing mark was replaced.
    pub(crate) fn upsert_manual(
        &mut self,
        page: u32,
        position: Option<NormPoint>,
        style: Option<MarkStyle>,
        rubric_id: RubricId,
        value: f64,
    ) -> (MarkId, bool) {
        let existing = self.manual_for(&rubric_id).map(|mark| (mark.id, mark.page));
        let Some((id, old_page)) = existing else {
            let body = MarkBody::ManualPoints { rubric_id, value };
            let style = style.unwrap_or_else(|| MarkStyle::default_for(&body));
            let id = self.append(page, position.unwrap_or(MANUAL_POINTS_ANCHOR), style, body);
            return (id, false);
        };

        if old_page != page {
            if let Some(mut mark) = self.take(id) {
                mark.page = page;
                self.pages.entry(page).or_default().push(mark);
            }
        }
        if let Some(mark) = self.find_mut(id) {
            mark.body = MarkBody::ManualPoints { rubric_id, value };
            if let Some(position) = position {
                mark.position = position;
            }
            if let Some(style) = style {
                mark.style = style;
            }
        }
        (id, true)
    }

    /// Checks loaded data: non-nil unique ids and consistent page keys.
    pub(crate) fn check_integrity(&self) -> Result<(), String> {
        let mut seen = HashSet::new();
        let mut manual_nodes = HashSet::new();
        for (page, marks) in &self.pages {
            for mark in marks {
                if mark.id.is_nil() {
                    return Err("mark id must not be nil".to_string());
                }
                if !seen.insert(mark.id) {
                    return Err(format!("duplicate mark id {}", mark.id));
                }
                if mark.page != *page {
                    return Err(format!("mark {} stored under page {page}", mark.id));
                }
                if let MarkBody::ManualPoints { rubric_id, .. } = &mark.body {
                    if !manual_nodes.insert(rubric_id.clone()) {
                        return Err(format!("several manual marks for rubric node `{rubric_id}`"));
                    }
                }
            }
        }
        Ok(())
    }

    fn take(&mut self, id: MarkId) -> Option<AnnotationMark> {
        let (page, index) = self.pages.iter().find_map(|(page, marks)| {
            marks
                .iter()
                .position(|mark| mark.id == id)
                .map(|index| (*page, index))
        })?;
        let marks = self.pages.get_mut(&page)?;
        let mark = marks.remove(index);
        if marks.is_empty() {
            self.pages.remove(&page);
        }
        Some(mark)
    }

    fn find_mut(&mut self, id: MarkId) -> Option<&mut AnnotationMark> {
        self.pages.values_mut().flatten().find(|mark| mark.id == id)
    }

    fn mint_id(&self) -> MarkId {
        loop {
            let id = Uuid::new_v4();
            if !self.contains(id) {
                return id;
            }
        }
    }
}

fn normalize_style(style: &MarkStyle) -> StoreResult<MarkStyle> {
    style.normalized().map_err(StoreError::InvalidStyle)
}

fn score_body<G: PageTransform + ?Sized>(
    ctx: &EditContext<'_, G>,
    rubric_id: Option<RubricId>,
    grade: Grade,
    value: Option<f64>,
) -> StoreResult<MarkBody> {
    let rubric_id = rubric_id.ok_or(InvalidLinkError::MissingLink {
        kind: MarkKind::ScoreMarker,
    })?;
    let value = match value {
        Some(value) => value,
        None => ctx
            .rubric
            .points_for(&rubric_id, grade)
            .map_err(|_| InvalidLinkError::UnknownNode {
                rubric_id: rubric_id.clone(),
            })?,
    };
    validate_value(ctx.rubric, &rubric_id, value)?;
    Ok(MarkBody::ScoreMarker {
        rubric_id,
        grade,
        value,
    })
}

fn image_body<G: PageTransform + ?Sized>(
    ctx: &EditContext<'_, G>,
    page: u32,
    image_ref: String,
    width_pt: f64,
    height_pt: f64,
) -> StoreResult<MarkBody> {
    let valid = |value: f64| value.is_finite() && value > 0.0;
    if image_ref.trim().is_empty() || !valid(width_pt) || !valid(height_pt) {
        return Err(StoreError::InvalidGeometry(format!(
            "image needs a reference and a positive size, got {width_pt}x{height_pt}"
        )));
    }
    let size = ctx
        .geometry
        .page_size(page)
        .ok_or(StoreError::PageOutOfRange {
            page,
            page_count: ctx.geometry.page_count(),
        })?;
    Ok(MarkBody::Image {
        image_ref,
        width: width_pt / size.width,
        height: height_pt / size.height,
    })
}

#[cfg(test)]
mod tests {
    use super::{AnnotationStore, EditContext};
    use crate::layout::{AlignmentEdge, MarginAlignment, MarginLayout, PageSize};
    use crate::model::mark::{MarkBody, MarkDraft, NormPoint, RawPoint};
    use crate::model::rubric::{Grade, RubricTree};

    fn layout() -> MarginLayout {
        MarginLayout::unmargined(vec![PageSize::new(400.0, 800.0); 2])
    }

    #[test]
    fn freehand_path_starts_at_anchor() {
        let rubric = RubricTree::default_scheme(1);
        let geometry = layout();
        let ctx = EditContext::new(&rubric, &geometry);
        let mut store = AnnotationStore::new();

        let id = store
            .place(
                &ctx,
                0,
                RawPoint::new(100.0, 200.0),
                MarkDraft::Freehand {
                    path: vec![RawPoint::new(200.0, 400.0)],
                },
                None,
            )
            .unwrap();

        assert_eq!(
            store.get(id).unwrap().body,
            MarkBody::Freehand {
                path: vec![NormPoint::new(0.25, 0.25), NormPoint::new(0.5, 0.5)]
            }
        );
    }

    #[test]
    fn dragging_a_stroke_past_the_edge_and_back_keeps_its_shape() {
        let rubric = RubricTree::default_scheme(1);
        let geometry = layout();
        let ctx = EditContext::new(&rubric, &geometry);
        let mut store = AnnotationStore::new();
        let id = store
            .place(
                &ctx,
                0,
                RawPoint::new(100.0, 200.0),
                MarkDraft::Freehand {
                    path: vec![RawPoint::new(200.0, 200.0)],
                },
                None,
            )
            .unwrap();
        let original = store.get(id).unwrap().body.clone();

        assert!(store.move_mark(&ctx, id, RawPoint::new(360.0, 200.0)).unwrap());
        let pinned = store.get(id).unwrap();
        assert_eq!(pinned.position, NormPoint::new(0.75, 0.25));
        assert_eq!(
            pinned.body.stroke_points(),
            [NormPoint::new(0.75, 0.25), NormPoint::new(1.0, 0.25)]
        );

        assert!(store.move_mark(&ctx, id, RawPoint::new(100.0, 200.0)).unwrap());
        let back = store.get(id).unwrap();
        assert_eq!(back.position, NormPoint::new(0.25, 0.25));
        assert_eq!(back.body, original);
        assert!(!store.move_mark(&ctx, id, RawPoint::new(100.0, 200.0)).unwrap());
    }

    #[test]
    fn manual_draft_placement_upserts_one_mark_per_node() {
        let rubric = RubricTree::default_scheme(1);
        let geometry = layout();
        let ctx = EditContext::new(&rubric, &geometry);
        let mut store = AnnotationStore::new();
        let manual = |value| MarkDraft::ManualPoints {
            rubric_id: Some("1".to_string()),
            value,
        };

        let first = store
            .place(&ctx, 0, RawPoint::new(40.0, 40.0), manual(Some(1.0)), None)
            .unwrap();
        let second = store
            .place(&ctx, 1, RawPoint::new(80.0, 80.0), manual(Some(1.5)), None)
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(first).unwrap().page, 1);
        assert_eq!(store.get(first).unwrap().value(), Some(1.5));

        assert!(store
            .place(&ctx, 0, RawPoint::new(40.0, 40.0), manual(None), None)
            .is_err());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn score_marker_snaps_on_placement() {
        let rubric = RubricTree::default_scheme(1);
        let geometry = layout();
        let ctx = EditContext::new(&rubric, &geometry).with_alignment(Some(MarginAlignment {
            edge: AlignmentEdge::Left,
            distance_pt: 40.0,
        }));
        let mut store = AnnotationStore::new();

        let id = store
            .place(
                &ctx,
                1,
                RawPoint::new(300.0, 200.0),
                MarkDraft::score("1.1", Grade::Good),
                None,
            )
            .unwrap();

        let mark = store.get(id).unwrap();
        assert_eq!(mark.position, NormPoint::new(0.1, 0.25));
        assert_eq!(mark.style.color, "#1F9D55");
        assert_eq!(mark.value(), Some(1.0));
    }

    #[test]
    fn integrity_rejects_two_manual_marks_for_one_node() {
        let rubric = RubricTree::default_scheme(1);
        let geometry = layout();
        let ctx = EditContext::new(&rubric, &geometry);
        let mut store = AnnotationStore::new();
        store.set_manual_points(&ctx, "1", 0, 1.5).unwrap();
        assert!(store.check_integrity().is_ok());

        let mut doubled = store.clone();
        let first = store.iter().next().unwrap().clone();
        doubled.append(
            1,
            first.position,
            first.style.clone(),
            first.body.clone(),
        );
        assert!(doubled.check_integrity().is_err());
    }
}
