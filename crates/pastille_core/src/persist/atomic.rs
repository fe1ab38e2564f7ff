use super::{PersistResult, PersistenceError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Serializes `value` as pretty JSON and atomically replaces `path`.
///
/// The temporary file is created in the destination directory so the final
/// rename never crosses filesystems.
///
/// # Errors
/// - `Serialize` when encoding fails (nothing touches the disk).
/// - `Io` when the directory cannot be created or the write/rename fails;
///   the previous file content is kept.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> PersistResult<()> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|source| PersistenceError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|err| PersistenceError::io(dir, err))?;

    let mut temp = NamedTempFile::new_in(dir).map_err(|err| PersistenceError::io(dir, err))?;
    temp.write_all(&bytes)
        .and_then(|()| temp.write_all(b"\n"))
        .and_then(|()| temp.as_file().sync_all())
        .map_err(|err| PersistenceError::io(temp.path(), err))?;
    temp.persist(path)
        .map_err(|err| PersistenceError::io(path, err.error))?;
    Ok(())
}

/// Reads and decodes a JSON file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> PersistResult<T> {
    let bytes = fs::read(path).map_err(|err| PersistenceError::io(path, err))?;
    serde_json::from_slice(&bytes).map_err(|source| PersistenceError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::{read_json, write_json_atomic};
    use crate::persist::PersistenceError;
    use serde_json::{json, Value};

    #[test]
    fn write_replaces_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("data.json");

        write_json_atomic(&path, &json!({ "a": 1 })).unwrap();
        write_json_atomic(&path, &json!({ "a": 2 })).unwrap();

        let value: Value = read_json(&path).unwrap();
        assert_eq!(value, json!({ "a": 2 }));
        let leftovers = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn read_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_json::<Value>(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, PersistenceError::Io { .. }));
    }
}
