use pastille_core::{
    AnnotationStore, EditContext, Grade, MarginLayout, MarkDraft, PageSize, RawPoint, RubricTree,
    ScoreAggregator,
};
use proptest::prelude::*;

/// Exercise: own points (used when it has no sublevels) and sublevels.
/// Sublevel: own points (used when it has no sub-sublevels) and leaf points.
type Shape = Vec<(u32, Vec<(u32, Vec<u32>)>)>;

fn shape() -> impl Strategy<Value = Shape> {
    prop::collection::vec(
        (
            0u32..40,
            prop::collection::vec((0u32..40, prop::collection::vec(0u32..40, 0..3)), 0..4),
        ),
        1..5,
    )
}

fn quarters(value: u32) -> f64 {
    f64::from(value) / 4.0
}

/// Flat `(id, points)` entries with internal nodes declaring their children's sum.
fn flat_entries(shape: &Shape) -> (Vec<(String, f64)>, f64) {
    let mut entries = Vec::new();
    let mut grand_total = 0.0;
    for (e, (own, sublevels)) in shape.iter().enumerate() {
        let exercise_id = (e + 1).to_string();
        let mut exercise_total = 0.0;
        if sublevels.is_empty() {
            exercise_total = quarters(*own);
        }
        for (s, (sub_own, leaves)) in sublevels.iter().enumerate() {
            let sub_id = format!("{exercise_id}.{}", s + 1);
            let mut sub_total = 0.0;
            if leaves.is_empty() {
                sub_total = quarters(*sub_own);
            }
            for (l, points) in leaves.iter().enumerate() {
                entries.push((format!("{sub_id}.{}", l + 1), quarters(*points)));
                sub_total += quarters(*points);
            }
            entries.push((sub_id, sub_total));
            exercise_total += sub_total;
        }
        entries.push((exercise_id, exercise_total));
        grand_total += exercise_total;
    }
    (entries, grand_total)
}

proptest! {
    #[test]
    fn root_totals_equal_the_sum_of_their_leaves(shape in shape()) {
        let (entries, grand_total) = flat_entries(&shape);
        let tree = RubricTree::parse_flat(entries).unwrap();

        for root in tree.roots() {
            let leaves_sum: f64 = tree
                .leaves()
                .into_iter()
                .filter(|leaf| leaf.id == *root || leaf.id.starts_with(&format!("{root}.")))
                .map(|leaf| leaf.max_points)
                .sum();
            prop_assert!((tree.total_at(root).unwrap() - leaves_sum).abs() < 1e-9);
        }
        prop_assert!((tree.total() - grand_total).abs() < 1e-9);
    }

    #[test]
    fn entry_order_does_not_matter(shape in shape()) {
        let (entries, _) = flat_entries(&shape);
        let mut reversed = entries.clone();
        reversed.reverse();

        prop_assert_eq!(
            RubricTree::parse_flat(entries).unwrap(),
            RubricTree::parse_flat(reversed).unwrap()
        );
    }

    #[test]
    fn export_then_import_is_identity(shape in shape()) {
        let (entries, _) = flat_entries(&shape);
        let tree = RubricTree::parse_flat(entries).unwrap();

        let json = tree.export_json().unwrap();
        prop_assert_eq!(RubricTree::import_json(&json).unwrap(), tree);
    }

    #[test]
    fn graded_total_never_exceeds_maximum(shape in shape(), grades in prop::collection::vec(0u8..3, 64)) {
        let (entries, _) = flat_entries(&shape);
        let tree = RubricTree::parse_flat(entries).unwrap();
        let layout = MarginLayout::unmargined(vec![PageSize::a4()]);
        let ctx = EditContext::new(&tree, &layout);
        let mut store = AnnotationStore::new();

        for (index, leaf) in tree.leaves().into_iter().enumerate() {
            let grade = match grades[index % grades.len()] {
                0 => Grade::Good,
                1 => Grade::Partial,
                _ => Grade::Bad,
            };
            store
                .place(&ctx, 0, RawPoint::new(20.0, 20.0), MarkDraft::score(leaf.id.clone(), grade), None)
                .unwrap();
        }

        let aggregator = ScoreAggregator::new(&tree, &store);
        prop_assert!(aggregator.document_total() <= aggregator.max_possible() + 1e-9);
        prop_assert!(aggregator.document_total() >= 0.0);
    }
}
