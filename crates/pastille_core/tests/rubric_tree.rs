use pastille_core::{Grade, RubricDoc, RubricDocNode, RubricTree, RubricValidationError};

fn sample_flat() -> RubricTree {
    RubricTree::parse_flat([("1", 5.0), ("1.1", 3.0), ("1.2", 2.0), ("2", 4.0)]).unwrap()
}

#[test]
fn flat_parse_builds_ordered_hierarchy() {
    let tree = sample_flat();

    assert_eq!(tree.roots(), ["1".to_string(), "2".to_string()]);
    let children: Vec<&str> = tree.children("1").map(|node| node.id.as_str()).collect();
    assert_eq!(children, vec!["1.1", "1.2"]);
    assert_eq!(tree.total_at("1").unwrap(), 5.0);
    assert_eq!(tree.total_at("2").unwrap(), 4.0);
    assert_eq!(tree.total(), 9.0);
    assert!(!tree.get("1").unwrap().is_leaf());
    assert_eq!(tree.get("1.2").unwrap().parent_id(), Some("1"));
}

#[test]
fn flat_parse_orders_siblings_numerically() {
    let tree =
        RubricTree::parse_flat([("10", 1.0), ("2", 1.0), ("1", 2.0), ("1.10", 1.0), ("1.9", 1.0)])
            .unwrap();

    assert_eq!(
        tree.roots(),
        ["1".to_string(), "2".to_string(), "10".to_string()]
    );
    let children: Vec<&str> = tree.children("1").map(|node| node.id.as_str()).collect();
    assert_eq!(children, vec!["1.9", "1.10"]);
}

#[test]
fn flat_parse_rejects_orphan_child() {
    let err = RubricTree::parse_flat([("1.1", 2.0)]).unwrap_err();
    assert_eq!(
        err,
        RubricValidationError::MissingParent {
            id: "1.1".to_string(),
            parent: "1".to_string(),
        }
    );
}

#[test]
fn flat_parse_rejects_malformed_and_negative_entries() {
    assert!(matches!(
        RubricTree::parse_flat([("1.a", 1.0)]).unwrap_err(),
        RubricValidationError::MalformedId(_)
    ));
    assert!(matches!(
        RubricTree::parse_flat([("1", -1.0)]).unwrap_err(),
        RubricValidationError::NegativePoints { .. }
    ));
    assert!(matches!(
        RubricTree::parse_flat([("1", f64::NAN)]).unwrap_err(),
        RubricValidationError::NonFinitePoints(_)
    ));
}

#[test]
fn flat_parse_rejects_fourth_level() {
    let err = RubricTree::parse_flat([
        ("1", 1.0),
        ("1.1", 1.0),
        ("1.1.1", 1.0),
        ("1.1.1.1", 1.0),
    ])
    .unwrap_err();
    assert!(matches!(err, RubricValidationError::DepthExceeded(_)));
}

#[test]
fn internal_maximum_must_match_children_sum() {
    let err = RubricTree::parse_flat([("1", 6.0), ("1.1", 3.0), ("1.2", 2.0)]).unwrap_err();
    assert!(matches!(
        err,
        RubricValidationError::AmbiguousMaximum { ref id, .. } if id == "1"
    ));
}

#[test]
fn nested_parse_reads_scales_and_optional_flags() {
    let doc = RubricDoc::new(vec![
        RubricDocNode::group(
            "1",
            vec![
                RubricDocNode {
                    partial: Some(1.5),
                    ..RubricDocNode::leaf("1.1", 4.0)
                },
                RubricDocNode::leaf("1.2", 2.0),
            ],
        ),
        RubricDocNode {
            optional: true,
            ..RubricDocNode::leaf("2", 3.0)
        },
    ]);

    let tree = RubricTree::parse(&doc).unwrap();

    assert_eq!(tree.points_for("1.1", Grade::Good).unwrap(), 4.0);
    assert_eq!(tree.points_for("1.1", Grade::Partial).unwrap(), 1.5);
    assert_eq!(tree.points_for("1.1", Grade::Bad).unwrap(), 0.0);
    assert_eq!(tree.points_for("1.2", Grade::Partial).unwrap(), 1.0);
    assert!(tree.get("2").unwrap().optional);
    assert_eq!(tree.total(), 9.0);
}

#[test]
fn nested_parse_rejects_child_under_wrong_parent() {
    let doc = RubricDoc::new(vec![RubricDocNode::group(
        "1",
        vec![RubricDocNode::leaf("2.1", 1.0)],
    )]);
    assert!(matches!(
        RubricTree::parse(&doc).unwrap_err(),
        RubricValidationError::MissingParent { .. }
    ));
}

#[test]
fn nested_parse_rejects_scale_above_maximum() {
    let doc = RubricDoc::new(vec![RubricDocNode {
        partial: Some(5.0),
        ..RubricDocNode::leaf("1", 2.0)
    }]);
    assert!(matches!(
        RubricTree::parse(&doc).unwrap_err(),
        RubricValidationError::ScaleOutOfRange { .. }
    ));
}

#[test]
fn import_accepts_both_document_shapes() {
    let flat = RubricTree::import_json(r#"{"1": 2, "1.1": 2, "2": 3}"#).unwrap();
    assert_eq!(flat.total(), 5.0);

    let nested = RubricTree::import_json(
        r#"{"version": 1, "exercises": [
            {"id": "1", "label": "Limits", "children": [{"id": "1.1", "max": 2}]},
            {"code": "2", "max": 3}
        ]}"#,
    )
    .unwrap();
    assert_eq!(nested.total(), 5.0);
    assert_eq!(nested.get("1").unwrap().label, "Limits");
    assert_eq!(nested.get("2").unwrap().max_points, 3.0);

    assert!(matches!(
        RubricTree::import_json("[1, 2]").unwrap_err(),
        RubricValidationError::InvalidDocument(_)
    ));
    assert!(matches!(
        RubricTree::import_json(r#"{"1": "three"}"#).unwrap_err(),
        RubricValidationError::InvalidDocument(_)
    ));
}

#[test]
fn export_then_import_reproduces_tree() {
    let mut tree = sample_flat();
    tree.set_label("2", "Bonus").unwrap();
    tree.set_optional("2", true).unwrap();

    let json = tree.export_json().unwrap();
    let reloaded = RubricTree::import_json(&json).unwrap();

    assert_eq!(reloaded, tree);
}

#[test]
fn editing_keeps_parent_totals_consistent() {
    let mut tree = RubricTree::default_scheme(2);
    assert_eq!(tree.total(), 4.0);

    let sub = tree.add_sublevel("1").unwrap();
    assert_eq!(sub, "1.3");
    let subsub = tree.add_subsublevel("1.1").unwrap();
    assert_eq!(subsub, "1.1.1");
    assert!(!tree.get("1.1").unwrap().is_leaf());

    tree.set_max("1.1.1", 2.5).unwrap();
    assert_eq!(tree.total_at("1.1").unwrap(), 2.5);
    assert!(matches!(
        tree.set_max("1", 10.0).unwrap_err(),
        RubricValidationError::NotALeaf(_)
    ));

    let removed = tree.remove_node("1.1").unwrap();
    assert!(removed.contains(&"1.1".to_string()));
    assert!(removed.contains(&"1.1.1".to_string()));
    assert!(!tree.contains("1.1.1"));
}

#[test]
fn sublevels_are_only_added_at_the_right_depth() {
    let mut tree = RubricTree::default_scheme(1);
    assert!(matches!(
        tree.add_sublevel("1.1").unwrap_err(),
        RubricValidationError::WrongLevel { .. }
    ));
    assert!(matches!(
        tree.add_subsublevel("1").unwrap_err(),
        RubricValidationError::WrongLevel { .. }
    ));
    assert!(matches!(
        tree.add_sublevel("9").unwrap_err(),
        RubricValidationError::UnknownNode(_)
    ));
}
