use super::atomic::{read_json, write_json_atomic};
use super::{PersistResult, PersistenceError};
use crate::model::overlay::Overlay;
use crate::project::Project;
use log::{error, info, warn};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

pub const PROJECT_FILE_NAME: &str = "project.json";
pub const OVERLAY_DIR_NAME: &str = "overlays";
pub const PROJECT_FORMAT_VERSION: u32 = 1;

const OVERLAY_FILE_PREFIX: &str = "overlay_";
const OVERLAY_FILE_SUFFIX: &str = ".json";

#[derive(Serialize)]
struct ProjectFileRef<'a> {
    version: u32,
    #[serde(flatten)]
    project: &'a Project,
}

/// Writes `<root>/project.json`, then mirrors overlays into `<root>/overlays/`.
///
/// Overlay files whose overlay is no longer registered are removed.
///
/// # Side effects
/// - Emits `project_save` logging events with duration and status.
pub fn save_project(project: &Project, root: &Path) -> PersistResult<PathBuf> {
    let started_at = Instant::now();
    info!("event=project_save module=persist status=start");

    let path = root.join(PROJECT_FILE_NAME);
    let result = write_json_atomic(
        &path,
        &ProjectFileRef {
            version: PROJECT_FORMAT_VERSION,
            project,
        },
    )
    .and_then(|()| sync_overlay_files(project, root));

    match result {
        Ok(()) => {
            info!(
                "event=project_save module=persist status=ok duration_ms={} documents={} overlays={}",
                started_at.elapsed().as_millis(),
                project.documents().len(),
                project.overlays.len()
            );
            Ok(path)
        }
        Err(err) => {
            error!(
                "event=project_save module=persist status=error duration_ms={} error_code={} error={}",
                started_at.elapsed().as_millis(),
                err.code(),
                err
            );
            Err(err)
        }
    }
}

/// Loads a project from its `project.json` path.
///
/// # Errors
/// - `Io` when the file cannot be read.
/// - `Corrupt` when it is not valid JSON or misses required fields.
/// - `UnsupportedVersion` for any version other than the current one.
/// - `InvalidContent` when ids or pages violate model invariants.
pub fn load_project(path: &Path) -> PersistResult<Project> {
    let started_at = Instant::now();
    info!("event=project_load module=persist status=start");

    match decode_project(path) {
        Ok(project) => {
            info!(
                "event=project_load module=persist status=ok duration_ms={} documents={} overlays={}",
                started_at.elapsed().as_millis(),
                project.documents().len(),
                project.overlays.len()
            );
            Ok(project)
        }
        Err(err) => {
            error!(
                "event=project_load module=persist status=error duration_ms={} error_code={} error={}",
                started_at.elapsed().as_millis(),
                err.code(),
                err
            );
            Err(err)
        }
    }
}

/// Loads from a project directory or directly from the project file.
pub fn load_any(path: &Path) -> PersistResult<Project> {
    if path.is_dir() {
        load_project(&path.join(PROJECT_FILE_NAME))
    } else {
        load_project(path)
    }
}

fn decode_project(path: &Path) -> PersistResult<Project> {
    let value: Value = read_json(path)?;
    let found = value.get("version").and_then(Value::as_u64).unwrap_or(0);
    if found != u64::from(PROJECT_FORMAT_VERSION) {
        return Err(PersistenceError::UnsupportedVersion {
            path: path.to_path_buf(),
            found,
            supported: PROJECT_FORMAT_VERSION,
        });
    }
    let project: Project =
        serde_json::from_value(value).map_err(|source| PersistenceError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;
    project
        .check_integrity()
        .map_err(|message| PersistenceError::InvalidContent {
            path: path.to_path_buf(),
            message,
        })?;
    Ok(project)
}

/// `<root>/overlays/overlay_<slug>.json`.
pub fn overlay_file_path(root: &Path, overlay: &Overlay) -> PathBuf {
    root.join(OVERLAY_DIR_NAME).join(format!(
        "{OVERLAY_FILE_PREFIX}{}{OVERLAY_FILE_SUFFIX}",
        overlay.slug()
    ))
}

/// Writes one overlay exchange file atomically.
pub fn write_overlay_file(root: &Path, overlay: &Overlay) -> PersistResult<PathBuf> {
    let path = overlay_file_path(root, overlay);
    write_json_atomic(&path, overlay)?;
    Ok(path)
}

/// Reads one overlay exchange file.
pub fn read_overlay_file(path: &Path) -> PersistResult<Overlay> {
    let overlay: Overlay = read_json(path)?;
    if overlay.slug().is_empty() {
        return Err(PersistenceError::InvalidContent {
            path: path.to_path_buf(),
            message: format!("overlay name `{}` is unusable", overlay.name),
        });
    }
    if overlay.fingerprint.page_count != overlay.fingerprint.pages.len() {
        return Err(PersistenceError::InvalidContent {
            path: path.to_path_buf(),
            message: "fingerprint page_count does not match its pages".to_string(),
        });
    }
    if let Err(message) = overlay.check_templates() {
        return Err(PersistenceError::InvalidContent {
            path: path.to_path_buf(),
            message,
        });
    }
    Ok(overlay)
}

fn sync_overlay_files(project: &Project, root: &Path) -> PersistResult<()> {
    let mut expected = Vec::with_capacity(project.overlays.len());
    for overlay in project.overlays.iter() {
        expected.push(write_overlay_file(root, overlay)?);
    }

    let dir = root.join(OVERLAY_DIR_NAME);
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(PersistenceError::io(&dir, err)),
    };
    for entry in entries {
        let entry = entry.map_err(|err| PersistenceError::io(&dir, err))?;
        let path = entry.path();
        let is_overlay_file = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| {
                name.starts_with(OVERLAY_FILE_PREFIX) && name.ends_with(OVERLAY_FILE_SUFFIX)
            });
        if is_overlay_file && !expected.contains(&path) {
            if let Err(err) = fs::remove_file(&path) {
                warn!(
                    "event=overlay_file_prune module=persist status=error error={}",
                    err
                );
            }
        }
    }
    Ok(())
}
