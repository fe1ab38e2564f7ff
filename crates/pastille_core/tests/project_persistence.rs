use pastille_core::persist::{
    overlay_file_path, read_overlay_file, OVERLAY_DIR_NAME, PROJECT_FILE_NAME,
};
use pastille_core::{
    load_any, EditContext, Grade, MarkDraft, OverlayRegistry, PageSize, PageTransform,
    PersistenceError, Project, RawPoint, RubricTree,
};
use std::fs;

fn graded_project() -> Project {
    let rubric =
        RubricTree::parse_flat([("1", 4.0), ("1.1", 3.0), ("1.2", 1.0), ("2", 2.0)]).unwrap();
    let mut project = Project::new("Midterm", rubric);
    let id = project.add_document("alice.pdf", vec![PageSize::a4(); 2]);
    project.add_document("bob.pdf", vec![PageSize::a4(); 2]);

    let parts = project.document_parts(id).unwrap();
    let ctx = EditContext::new(parts.rubric, &parts.document.layout);
    let store = &mut parts.document.annotations;
    store
        .place(&ctx, 0, RawPoint::new(40.0, 90.0), MarkDraft::score("1.1", Grade::Partial), None)
        .unwrap();
    store
        .place(
            &ctx,
            1,
            RawPoint::new(300.0, 400.0),
            MarkDraft::Arrow {
                end: RawPoint::new(350.0, 420.0),
            },
            None,
        )
        .unwrap();
    store.set_manual_points(&ctx, "2", 1, 1.5).unwrap();

    let draft = OverlayRegistry::capture_from(store, parts.document.layout.fingerprint());
    parts.overlays.save("Common remarks", draft).unwrap();
    project
}

#[test]
fn save_then_load_restores_everything() {
    let dir = tempfile::tempdir().unwrap();
    let project = graded_project();

    let path = project.save(dir.path()).unwrap();
    assert_eq!(path, dir.path().join(PROJECT_FILE_NAME));

    let loaded = load_any(dir.path()).unwrap();
    assert_eq!(loaded, project);
    let by_file = load_any(&path).unwrap();
    assert_eq!(by_file, project);

    let alice = &loaded.documents()[0];
    assert_eq!(alice.annotations.len(), 3);
    assert_eq!(alice.score(&loaded.rubric).document_total(), 3.0);
}

#[test]
fn overlay_files_mirror_the_registry() {
    let dir = tempfile::tempdir().unwrap();
    let mut project = graded_project();
    project.save(dir.path()).unwrap();

    let overlay = project.overlays.get("Common remarks").unwrap().clone();
    let file = overlay_file_path(dir.path(), &overlay);
    assert!(file.ends_with("overlays/overlay_Common_remarks.json"));
    assert_eq!(read_overlay_file(&file).unwrap(), overlay);

    project.overlays.delete("Common remarks").unwrap();
    project.save(dir.path()).unwrap();
    assert!(!file.exists());
    assert!(dir.path().join(OVERLAY_DIR_NAME).is_dir());
}

#[test]
fn corrupted_project_file_fails_only_that_load() {
    let dir = tempfile::tempdir().unwrap();
    let project = graded_project();
    project.save(dir.path()).unwrap();

    let broken = tempfile::tempdir().unwrap();
    fs::write(broken.path().join(PROJECT_FILE_NAME), b"{\"version\": 1, \"name\": ").unwrap();

    let err = load_any(broken.path()).unwrap_err();
    assert!(matches!(err, PersistenceError::Corrupt { .. }));
    assert_eq!(load_any(dir.path()).unwrap(), project);
}

#[test]
fn unsupported_version_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join(PROJECT_FILE_NAME),
        br#"{"version": 99, "name": "Future"}"#,
    )
    .unwrap();

    let err = load_any(dir.path()).unwrap_err();
    assert!(matches!(
        err,
        PersistenceError::UnsupportedVersion {
            found: 99,
            supported: 1,
            ..
        }
    ));

    fs::write(dir.path().join(PROJECT_FILE_NAME), br#"{"name": "Unversioned"}"#).unwrap();
    assert!(matches!(
        load_any(dir.path()).unwrap_err(),
        PersistenceError::UnsupportedVersion { found: 0, .. }
    ));
}

#[test]
fn minimal_file_loads_with_defaults() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join(PROJECT_FILE_NAME),
        br#"{"version": 1, "name": "Empty"}"#,
    )
    .unwrap();

    let project = load_any(dir.path()).unwrap();
    assert_eq!(project.name, "Empty");
    assert!(project.rubric.is_empty());
    assert!(project.documents().is_empty());
    assert!(project.overlays.is_empty());
    assert_eq!(project.settings.out_of(), 20.0);
}

#[test]
fn marks_beyond_the_last_page_are_invalid_content() {
    let dir = tempfile::tempdir().unwrap();
    let project = graded_project();
    let path = project.save(dir.path()).unwrap();

    let mut value: serde_json::Value =
        serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
    let annotations = value["documents"][0]["annotations"].as_object_mut().unwrap();
    let marks = annotations.remove("1").unwrap();
    annotations.insert("7".to_string(), marks);
    fs::write(&path, serde_json::to_vec(&value).unwrap()).unwrap();

    assert!(matches!(
        load_any(dir.path()).unwrap_err(),
        PersistenceError::InvalidContent { .. }
    ));
}

#[test]
fn missing_project_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        load_any(&dir.path().join("nowhere")).unwrap_err(),
        PersistenceError::Io { .. }
    ));
}
