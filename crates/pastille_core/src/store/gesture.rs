//! Pointer gesture state machine.
//!
//! # Responsibility
//! - Consume press/move/release events and apply them to an `AnnotationStore`.
//! - Signal the rendering side exactly once per completed gesture.
//!
//! # Invariants
//! - Phases go `Idle -> Dragging -> Released -> Idle`.
//! - `RegenerateSink::regenerate` runs only on `Released -> Idle`, and only when
//!   the gesture changed the store.
//! - Intermediate drag positions are stored but never trigger regeneration.

use crate::layout::PageTransform;
use crate::model::mark::{MarkDraft, MarkId, RawPoint};
use crate::model::rubric::{Grade, RubricId};
use crate::store::annotation_store::{AnnotationStore, EditContext, DEFAULT_HIT_TOLERANCE_PT};
use crate::store::StoreResult;
use log::debug;

/// Minimum spacing between consecutive freehand points, in points.
pub const MIN_STROKE_SPACING_PT: f64 = 1.2;

/// Rendering-side consumer of "rebuild the corrected variant" signals.
pub trait RegenerateSink {
    fn regenerate(&mut self, store: &AnnotationStore);
}

impl<F: FnMut(&AnnotationStore)> RegenerateSink for F {
    fn regenerate(&mut self, store: &AnnotationStore) {
        self(store)
    }
}

/// Sink that ignores signals, for headless use.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl RegenerateSink for NoopSink {
    fn regenerate(&mut self, _store: &AnnotationStore) {}
}

/// Tool selected by the grader.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ActiveTool {
    /// Press on a mark and drag to move it.
    #[default]
    Select,
    Score {
        rubric_id: RubricId,
        grade: Grade,
    },
    Text {
        text: String,
    },
    Arrow,
    Freehand,
    ManualPoints {
        rubric_id: RubricId,
        value: f64,
    },
}

impl ActiveTool {
    fn placement_draft(&self) -> Option<MarkDraft> {
        match self {
            Self::Score { rubric_id, grade } => Some(MarkDraft::score(rubric_id.clone(), *grade)),
            Self::Text { text } => Some(MarkDraft::Text { text: text.clone() }),
            Self::ManualPoints { rubric_id, value } => Some(MarkDraft::ManualPoints {
                rubric_id: Some(rubric_id.clone()),
                value: Some(*value),
            }),
            Self::Select | Self::Arrow | Self::Freehand => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GesturePhase {
    #[default]
    Idle,
    Dragging,
    Released,
}

/// Pointer input in document space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Press { page: u32, at: RawPoint },
    Move { at: RawPoint },
    Release { at: RawPoint },
}

#[derive(Debug, Clone, PartialEq, Default)]
enum Pending {
    #[default]
    Nothing,
    Move(Grab),
    Stroke {
        page: u32,
        arrow: bool,
        points: Vec<RawPoint>,
    },
    Place {
        page: u32,
        at: RawPoint,
    },
}

/// Mark held by the select tool.
#[derive(Debug, Clone, PartialEq)]
struct Grab {
    id: MarkId,
    /// Pointer position at press time.
    press: RawPoint,
    /// Mark anchor at press time, in document space.
    origin: RawPoint,
    moved: bool,
}

impl Grab {
    /// Moves the mark by the pointer travel since the press, keeping the
    /// offset between the grab point and the anchor.
    fn follow<G: PageTransform + ?Sized>(
        &mut self,
        at: RawPoint,
        store: &mut AnnotationStore,
        ctx: &EditContext<'_, G>,
    ) -> StoreResult<bool> {
        if !self.moved && at == self.press {
            return Ok(false);
        }
        self.moved = true;
        let target = RawPoint::new(
            self.origin.x + (at.x - self.press.x),
            self.origin.y + (at.y - self.press.y),
        );
        store.move_mark(ctx, self.id, target)
    }
}

/// Gesture state of one session.
#[derive(Debug, Default)]
pub struct GestureMachine {
    phase: GesturePhase,
    pending: Pending,
    changed: bool,
}

impl GestureMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> GesturePhase {
        self.phase
    }

    /// Feeds one pointer event.
    ///
    /// Returns the mark created or moved when the event completes a gesture.
    /// A press while dragging supersedes the unfinished gesture.
    ///
    /// # Errors
    /// Store errors from the underlying placement or move. The machine is back
    /// to `Idle` after a failed release.
    pub fn handle<G, S>(
        &mut self,
        event: PointerEvent,
        tool: &ActiveTool,
        store: &mut AnnotationStore,
        ctx: &EditContext<'_, G>,
        sink: &mut S,
    ) -> StoreResult<Option<MarkId>>
    where
        G: PageTransform + ?Sized,
        S: RegenerateSink + ?Sized,
    {
        match (self.phase, event) {
            (_, PointerEvent::Press { page, at }) => {
                self.begin(page, at, tool, store, ctx);
                Ok(None)
            }
            (GesturePhase::Dragging, PointerEvent::Move { at }) => {
                self.drag(at, store, ctx)?;
                Ok(None)
            }
            (GesturePhase::Dragging, PointerEvent::Release { at }) => {
                let result = self.complete(at, tool, store, ctx);
                self.phase = GesturePhase::Released;
                self.settle(store, sink);
                result
            }
            (GesturePhase::Idle | GesturePhase::Released, PointerEvent::Move { .. })
            | (GesturePhase::Idle | GesturePhase::Released, PointerEvent::Release { .. }) => {
                Ok(None)
            }
        }
    }

    fn begin<G: PageTransform + ?Sized>(
        &mut self,
        page: u32,
        at: RawPoint,
        tool: &ActiveTool,
        store: &AnnotationStore,
        ctx: &EditContext<'_, G>,
    ) {
        self.phase = GesturePhase::Dragging;
        self.pending = match tool {
            ActiveTool::Select => store
                .hit_test(ctx.geometry, page, at, DEFAULT_HIT_TOLERANCE_PT)
                .and_then(|id| {
                    let origin = ctx.geometry.to_raw(page, store.get(id)?.position)?;
                    Some(Pending::Move(Grab {
                        id,
                        press: at,
                        origin,
                        moved: false,
                    }))
                })
                .unwrap_or_default(),
            ActiveTool::Arrow | ActiveTool::Freehand => Pending::Stroke {
                page,
                arrow: matches!(tool, ActiveTool::Arrow),
                points: vec![at],
            },
            ActiveTool::Score { .. } | ActiveTool::Text { .. } | ActiveTool::ManualPoints { .. } => {
                Pending::Place { page, at }
            }
        };
    }

    fn drag<G: PageTransform + ?Sized>(
        &mut self,
        at: RawPoint,
        store: &mut AnnotationStore,
        ctx: &EditContext<'_, G>,
    ) -> StoreResult<()> {
        match &mut self.pending {
            Pending::Move(grab) => {
                if grab.follow(at, store, ctx)? {
                    self.changed = true;
                }
            }
            Pending::Stroke { arrow, points, .. } => push_stroke_point(points, *arrow, at),
            Pending::Place { at: target, .. } => *target = at,
            Pending::Nothing => {}
        }
        Ok(())
    }

    fn complete<G: PageTransform + ?Sized>(
        &mut self,
        at: RawPoint,
        tool: &ActiveTool,
        store: &mut AnnotationStore,
        ctx: &EditContext<'_, G>,
    ) -> StoreResult<Option<MarkId>> {
        match std::mem::take(&mut self.pending) {
            Pending::Nothing => Ok(None),
            Pending::Move(mut grab) => {
                if grab.follow(at, store, ctx)? {
                    self.changed = true;
                }
                Ok(self.changed.then_some(grab.id))
            }
            Pending::Stroke {
                page,
                arrow,
                mut points,
            } => {
                push_stroke_point(&mut points, arrow, at);
                let anchor = points.first().copied().unwrap_or(at);
                if arrow && anchor.distance_to(at) < MIN_STROKE_SPACING_PT {
                    return Ok(None);
                }
                let draft = if arrow {
                    MarkDraft::Arrow { end: at }
                } else {
                    MarkDraft::Freehand {
                        path: points.split_off(1),
                    }
                };
                let id = store.place(ctx, page, anchor, draft, None)?;
                self.changed = true;
                Ok(Some(id))
            }
            Pending::Place { page, .. } => {
                let Some(draft) = tool.placement_draft() else {
                    return Ok(None);
                };
                let id = store.place(ctx, page, at, draft, None)?;
                self.changed = true;
                Ok(Some(id))
            }
        }
    }

    fn settle<S: RegenerateSink + ?Sized>(&mut self, store: &AnnotationStore, sink: &mut S) {
        if self.phase != GesturePhase::Released {
            return;
        }
        self.phase = GesturePhase::Idle;
        self.pending = Pending::Nothing;
        if std::mem::take(&mut self.changed) {
            debug!("event=regenerate module=gesture status=ok marks={}", store.len());
            sink.regenerate(store);
        }
    }
}

fn push_stroke_point(points: &mut Vec<RawPoint>, arrow: bool, at: RawPoint) {
    if arrow {
        points.truncate(1);
        points.push(at);
        return;
    }
    let far_enough = points
        .last()
        .map_or(true, |last| last.distance_to(at) >= MIN_STROKE_SPACING_PT);
    if far_enough {
        points.push(at);
    }
}
