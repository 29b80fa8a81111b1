//! Atomic file operations for sync.
//!
//! Snapshots are whole-file JSON arrays, so every write replaces the file:
//! write to a temp file, sync to disk, then rename over the target.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tempfile::NamedTempFile;

use crate::sync::types::{SyncError, SyncResult};

/// Snapshot file extension.
pub const SNAPSHOT_EXT: &str = "json";

/// Path of the snapshot for `collection` inside `dir`.
#[must_use]
pub fn snapshot_path(dir: &Path, collection: &str) -> PathBuf {
    dir.join(format!("{collection}.{SNAPSHOT_EXT}"))
}

/// Create the sync directory and any missing parents (`0o755` on unix).
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn ensure_dir(dir: &Path) -> SyncResult<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }
    builder.create(dir)?;
    Ok(())
}

/// Write content to a file atomically.
///
/// This function:
/// 1. Writes content to a uniquely named temporary file in the target's directory
/// 2. Calls `fsync` to ensure data is on disk
/// 3. Atomically renames the temp file to the target path
///
/// Concurrent writers to the same path each use their own temp file; the
/// last rename wins. If any step fails, the original file (if any) remains
/// untouched.
///
/// # Errors
///
/// Returns an error if any file operation fails.
pub fn atomic_write(path: &Path, content: &str) -> SyncResult<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut temp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(temp.as_file_mut());
        writer.write_all(content.as_bytes())?;
        writer.flush()?;
    }
    temp.as_file().sync_all()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp.as_file()
            .set_permissions(fs::Permissions::from_mode(0o644))?;
    }

    temp.persist(path).map_err(|e| e.error)?;

    Ok(())
}

/// Serialize records as a 2-space indented JSON array. Empty input gives `[]`.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn render_snapshot(records: &[Map<String, Value>]) -> SyncResult<String> {
    Ok(serde_json::to_string_pretty(records)?)
}

/// Replace the snapshot at `path` with `records`.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_snapshot(path: &Path, records: &[Map<String, Value>]) -> SyncResult<()> {
    atomic_write(path, &render_snapshot(records)?)
}

/// Read a snapshot file.
///
/// `null` reads as an empty snapshot. Anything other than an array of
/// objects is an [`SyncError::InvalidSnapshot`].
///
/// # Errors
///
/// Returns an error if the file is missing, unreadable or malformed.
pub fn read_snapshot(path: &Path) -> SyncResult<Vec<Map<String, Value>>> {
    if !path.exists() {
        return Err(SyncError::FileNotFound(path.display().to_string()));
    }

    let content = fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&content)?;

    let items = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Array(items) => items,
        other => {
            return Err(SyncError::InvalidSnapshot {
                path: path.display().to_string(),
                message: format!("expected an array, found {}", json_kind(&other)),
            });
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(map) => Ok(map),
            other => Err(SyncError::InvalidSnapshot {
                path: path.display().to_string(),
                message: format!("item {index} is {}, expected an object", json_kind(&other)),
            }),
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Get the size of a file in bytes.
///
/// Returns 0 if the file doesn't exist.
pub fn file_size(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_atomic_write_creates_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("lecture.json");

        atomic_write(&path, "[]").unwrap();

        assert!(path.exists());
        assert_eq!(fs::read_to_string(&path).unwrap(), "[]");
        let names: Vec<_> = fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, ["lecture.json"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_atomic_write_is_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("lecture.json");
        atomic_write(&path, "[]").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[test]
    fn test_atomic_write_concurrent_writers() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("lecture.json");

        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let path = &path;
                    scope.spawn(move || {
                        for j in 0..25 {
                            atomic_write(path, &format!("[{}]", i * 100 + j)).unwrap();
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }
        });

        let value: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 1);
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_atomic_write_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("lecture.json");

        atomic_write(&path, "first").unwrap();
        atomic_write(&path, "second").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
    }

    #[test]
    fn test_snapshot_layout() {
        let rendered = render_snapshot(&[obj(json!({"title": "Intro", "id": "abc"}))]).unwrap();
        assert_eq!(rendered, "[\n  {\n    \"id\": \"abc\",\n    \"title\": \"Intro\"\n  }\n]");
        assert_eq!(render_snapshot(&[]).unwrap(), "[]");
    }

    #[test]
    fn test_read_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("chapters.json");
        let records = vec![obj(json!({"id": "a"})), obj(json!({"id": "b"}))];

        write_snapshot(&path, &records).unwrap();
        assert_eq!(read_snapshot(&path).unwrap(), records);
    }

    #[test]
    fn test_read_snapshot_null_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("chapters.json");
        fs::write(&path, "null").unwrap();

        assert!(read_snapshot(&path).unwrap().is_empty());
    }

    #[test]
    fn test_read_snapshot_rejects_non_arrays() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("chapters.json");

        fs::write(&path, r#"{"id": "a"}"#).unwrap();
        assert!(matches!(
            read_snapshot(&path),
            Err(SyncError::InvalidSnapshot { .. })
        ));

        fs::write(&path, "[1, 2]").unwrap();
        assert!(matches!(
            read_snapshot(&path),
            Err(SyncError::InvalidSnapshot { .. })
        ));

        fs::write(&path, "not json").unwrap();
        assert!(matches!(read_snapshot(&path), Err(SyncError::Json(_))));
    }

    #[test]
    fn test_read_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = snapshot_path(temp_dir.path(), "mc_questions");
        assert!(matches!(read_snapshot(&path), Err(SyncError::FileNotFound(_))));
    }

    #[test]
    fn test_ensure_dir_nested() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("a").join("b");
        ensure_dir(&dir).unwrap();
        ensure_dir(&dir).unwrap();
        assert!(dir.is_dir());
    }
}
