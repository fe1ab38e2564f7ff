use pastille_core::{
    AnnotationStore, EditContext, Grade, InvalidLinkError, MarginLayout, MarkDraft, PageSize,
    RawPoint, Recap, RubricTree, ScoreAggregator, StoreError,
};

fn sample_rubric() -> RubricTree {
    RubricTree::parse_flat([("1", 5.0), ("1.1", 3.0), ("1.2", 2.0), ("2", 4.0)]).unwrap()
}

fn two_page_layout() -> MarginLayout {
    MarginLayout::new(vec![PageSize::a4(); 2], 5.0, 0.0)
}

fn score(rubric_id: &str, value: f64) -> MarkDraft {
    MarkDraft::ScoreMarker {
        rubric_id: Some(rubric_id.to_string()),
        grade: Grade::Partial,
        value: Some(value),
    }
}

#[test]
fn subtree_scores_add_up_from_markers() {
    let rubric = sample_rubric();
    let layout = two_page_layout();
    let ctx = EditContext::new(&rubric, &layout);
    let mut store = AnnotationStore::new();

    store
        .place(&ctx, 0, RawPoint::new(40.0, 120.0), score("1.1", 1.0), None)
        .unwrap();
    store
        .place(&ctx, 1, RawPoint::new(40.0, 300.0), score("1.1", 2.0), None)
        .unwrap();

    let aggregator = ScoreAggregator::new(&rubric, &store);
    assert_eq!(aggregator.exercise_points("1.1"), 3.0);
    assert_eq!(aggregator.exercise_points("1.2"), 0.0);
    assert_eq!(aggregator.exercise_points("1"), 3.0);
    assert_eq!(aggregator.exercise_points("2"), 0.0);
    assert_eq!(aggregator.document_total(), 3.0);
    assert_eq!(aggregator.max_possible(), 9.0);
}

#[test]
fn manual_points_override_marker_sum() {
    let rubric = sample_rubric();
    let layout = two_page_layout();
    let ctx = EditContext::new(&rubric, &layout);
    let mut store = AnnotationStore::new();
    store
        .place(&ctx, 0, RawPoint::new(40.0, 120.0), score("1.1", 3.0), None)
        .unwrap();
    store
        .place(&ctx, 0, RawPoint::new(40.0, 220.0), score("1.2", 2.0), None)
        .unwrap();

    let manual_id = store.set_manual_points(&ctx, "1", 0, 4.5).unwrap();

    let aggregator = ScoreAggregator::new(&rubric, &store);
    assert_eq!(aggregator.exercise_points("1"), 4.5);
    assert_eq!(aggregator.document_total(), 4.5);
    assert_eq!(aggregator.manual_override("1"), Some((manual_id, 4.5)));

    let again = store.set_manual_points(&ctx, "1", 1, 2.0).unwrap();
    assert_eq!(again, manual_id);
    assert_eq!(store.len(), 3);
    assert_eq!(ScoreAggregator::new(&rubric, &store).exercise_points("1"), 2.0);
}

#[test]
fn grade_drafts_take_their_value_from_the_scale() {
    let rubric = sample_rubric();
    let layout = two_page_layout();
    let ctx = EditContext::new(&rubric, &layout);
    let mut store = AnnotationStore::new();

    store
        .place(&ctx, 0, RawPoint::new(40.0, 80.0), MarkDraft::score("1.1", Grade::Good), None)
        .unwrap();
    store
        .place(&ctx, 0, RawPoint::new(40.0, 160.0), MarkDraft::score("1.2", Grade::Partial), None)
        .unwrap();
    store
        .place(&ctx, 0, RawPoint::new(40.0, 240.0), MarkDraft::score("2", Grade::Bad), None)
        .unwrap();

    let aggregator = ScoreAggregator::new(&rubric, &store);
    assert_eq!(aggregator.exercise_points("1"), 4.0);
    assert_eq!(aggregator.exercise_points("2"), 0.0);
}

#[test]
fn invalid_links_leave_store_unchanged() {
    let rubric = sample_rubric();
    let layout = two_page_layout();
    let ctx = EditContext::new(&rubric, &layout);
    let mut store = AnnotationStore::new();

    let unknown = store
        .place(&ctx, 0, RawPoint::new(10.0, 10.0), score("7", 1.0), None)
        .unwrap_err();
    assert!(matches!(
        unknown,
        StoreError::InvalidLink(InvalidLinkError::UnknownNode { .. })
    ));

    let missing = store
        .place(
            &ctx,
            0,
            RawPoint::new(10.0, 10.0),
            MarkDraft::ScoreMarker {
                rubric_id: None,
                grade: Grade::Good,
                value: Some(1.0),
            },
            None,
        )
        .unwrap_err();
    assert!(matches!(
        missing,
        StoreError::InvalidLink(InvalidLinkError::MissingLink { .. })
    ));

    let too_high = store.set_manual_points(&ctx, "1.1", 0, 3.5).unwrap_err();
    assert!(matches!(
        too_high,
        StoreError::InvalidLink(InvalidLinkError::ValueOutOfRange { .. })
    ));

    let page = store
        .place(&ctx, 2, RawPoint::new(10.0, 10.0), score("1.1", 1.0), None)
        .unwrap_err();
    assert!(matches!(page, StoreError::PageOutOfRange { page: 2, page_count: 2 }));

    assert!(store.is_empty());
}

#[test]
fn score_of_every_node_reflects_marker_moves_and_removals() {
    let rubric = sample_rubric();
    let layout = two_page_layout();
    let ctx = EditContext::new(&rubric, &layout);
    let mut store = AnnotationStore::new();
    let id = store
        .place(&ctx, 0, RawPoint::new(40.0, 120.0), score("2", 4.0), None)
        .unwrap();

    store.move_mark(&ctx, id, RawPoint::new(60.0, 500.0)).unwrap();
    assert_eq!(ScoreAggregator::new(&rubric, &store).document_total(), 4.0);

    assert!(store.remove(id));
    assert!(!store.remove(id));
    assert_eq!(ScoreAggregator::new(&rubric, &store).document_total(), 0.0);
}

#[test]
fn recap_scales_total_and_skips_unmarked_optional_exercises() {
    let mut rubric = sample_rubric();
    rubric.set_optional("2", true).unwrap();
    let layout = two_page_layout();
    let ctx = EditContext::new(&rubric, &layout);
    let mut store = AnnotationStore::new();
    store
        .place(&ctx, 0, RawPoint::new(40.0, 120.0), score("1.1", 2.5), None)
        .unwrap();

    let recap = Recap::build(&rubric, &store, 20.0);
    assert_eq!(recap.total, 2.5);
    assert_eq!(recap.max, 5.0);
    assert_eq!(recap.grade, Some(10.0));
    assert_eq!(
        recap.to_text(),
        "Ex 1 : 2.5/5\nEx 2 : 0/0\nTotal : 2.5/5\nGrade : 10/20\n"
    );

    store.set_manual_points(&ctx, "2", 1, 1.0).unwrap();
    let recap = Recap::build(&rubric, &store, 20.0);
    assert_eq!(recap.max, 9.0);
    assert!(recap.rows[1].manual);
    assert!(recap.to_text().contains("Ex 2 (M) : 1/4"));
}

#[test]
fn empty_rubric_has_no_grade() {
    let rubric = RubricTree::new();
    let recap = Recap::build(&rubric, &AnnotationStore::new(), 20.0);
    assert_eq!(recap.total, 0.0);
    assert_eq!(recap.grade, None);
    assert_eq!(recap.to_text(), "Total : 0/0\n");
}
