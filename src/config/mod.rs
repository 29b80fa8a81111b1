//! Configuration management.
//!
//! This module resolves where quizbase keeps its data and its sync snapshots,
//! and decides whether pending migrations run automatically at startup.
//!
//! # Layout
//!
//! - **Database**: `<data dir>/data.db` (data dir defaults to `./pb_data`)
//! - **Sync snapshots**: `<sync dir>/<collection>.json`, git-friendly
//!
//! Nothing here is cached: the sync directory is resolved again on every
//! call, so changing `PB_SYNC_DIR` or creating `./pb_sync` takes effect
//! without a restart.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Default data directory, relative to the working directory.
pub const DEFAULT_DATA_DIR: &str = "pb_data";

/// Database file name inside the data directory.
pub const DB_FILE_NAME: &str = "data.db";

/// Environment variable overriding the sync directory.
pub const SYNC_DIR_ENV: &str = "PB_SYNC_DIR";

/// Default sync directory name.
pub const SYNC_DIR_NAME: &str = "pb_sync";

/// Environment variable enabling automatic migrations (`1` to enable).
pub const AUTOMIGRATE_ENV: &str = "AUTOMIGRATE";

/// Runtime configuration of an [`App`](crate::app::App).
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory holding `data.db`.
    pub data_dir: PathBuf,
    /// Explicit sync directory, consulted before the environment.
    pub sync_dir: Option<PathBuf>,
    /// Run pending migrations when serving.
    pub automigrate: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            sync_dir: None,
            automigrate: false,
        }
    }
}

impl AppConfig {
    /// Build a config from the data dir and optional sync dir override,
    /// reading the automigrate setting from the environment.
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>, sync_dir: Option<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            sync_dir,
            automigrate: is_automigrate(),
        }
    }

    /// Path of the SQLite database file.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        resolve_db_path(&self.data_dir)
    }

    /// Current sync directory. Re-resolved on every call.
    #[must_use]
    pub fn sync_dir(&self) -> PathBuf {
        resolve_sync_dir(self.sync_dir.as_deref())
    }
}

/// Resolve the database path inside a data directory.
#[must_use]
pub fn resolve_db_path(data_dir: &Path) -> PathBuf {
    data_dir.join(DB_FILE_NAME)
}

/// Resolve the sync directory.
///
/// Priority:
/// 1. `explicit` override (CLI `--sync-dir`)
/// 2. `PB_SYNC_DIR` environment variable, trimmed, if non-empty
/// 3. `./pb_sync` if it is an existing directory
/// 4. `<executable dir>/pb_sync` if it is an existing directory
/// 5. `./pb_sync`
///
/// Never fails and has no side effects; the directory is not created here.
#[must_use]
pub fn resolve_sync_dir(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    let cwd_candidate = std::env::current_dir()
        .map(|cwd| cwd.join(SYNC_DIR_NAME))
        .unwrap_or_else(|_| PathBuf::from(SYNC_DIR_NAME));

    resolve_sync_dir_from(
        std::env::var(SYNC_DIR_ENV).ok(),
        &cwd_candidate,
        std::env::current_exe().ok(),
    )
}

/// Precedence logic of [`resolve_sync_dir`] without touching the process
/// environment.
///
/// `cwd_candidate` is `<cwd>/pb_sync`; `exe` is the executable path.
#[must_use]
pub fn resolve_sync_dir_from(
    env_value: Option<String>,
    cwd_candidate: &Path,
    exe: Option<PathBuf>,
) -> PathBuf {
    if let Some(value) = env_value {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }

    if cwd_candidate.is_dir() {
        return cwd_candidate.to_path_buf();
    }

    if let Some(exe_candidate) = exe
        .as_deref()
        .and_then(Path::parent)
        .map(|dir| dir.join(SYNC_DIR_NAME))
        .filter(|p| p.is_dir())
    {
        return exe_candidate;
    }

    cwd_candidate.to_path_buf()
}

/// Load `.env` from the working directory into the process environment.
///
/// A missing file is fine; a malformed one is logged and otherwise ignored.
/// Variables already set in the environment win.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => debug!(path = %path.display(), "Loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => warn!(error = %e, "Failed to load .env"),
    }
}

/// Whether pending migrations should run automatically.
///
/// True when `AUTOMIGRATE=1` or when the binary is run from a cargo build
/// directory (`cargo run` during development).
#[must_use]
pub fn is_automigrate() -> bool {
    let env_enabled = std::env::var(AUTOMIGRATE_ENV).is_ok_and(|v| v.trim() == "1");
    env_enabled || std::env::current_exe().is_ok_and(|exe| is_cargo_target_path(&exe))
}

/// Whether `exe` lives under a cargo `target` directory, i.e. a `target`
/// ancestor whose parent holds a `Cargo.toml`.
#[must_use]
pub fn is_cargo_target_path(exe: &Path) -> bool {
    exe.ancestors()
        .filter(|dir| dir.file_name().is_some_and(|name| name == "target"))
        .any(|target| {
            target
                .parent()
                .is_some_and(|root| root.join("Cargo.toml").is_file())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_db_path_inside_data_dir() {
        let config = AppConfig {
            data_dir: PathBuf::from("/srv/pb_data"),
            ..AppConfig::default()
        };
        assert_eq!(config.db_path(), PathBuf::from("/srv/pb_data/data.db"));
    }

    #[test]
    fn test_env_value_wins() {
        let temp = TempDir::new().unwrap();
        let cwd_candidate = temp.path().join(SYNC_DIR_NAME);
        std::fs::create_dir(&cwd_candidate).unwrap();

        let dir = resolve_sync_dir_from(Some("  /data/sync  ".into()), &cwd_candidate, None);
        assert_eq!(dir, PathBuf::from("/data/sync"));
    }

    #[test]
    fn test_blank_env_value_ignored() {
        let temp = TempDir::new().unwrap();
        let cwd_candidate = temp.path().join(SYNC_DIR_NAME);
        std::fs::create_dir(&cwd_candidate).unwrap();

        let dir = resolve_sync_dir_from(Some("   ".into()), &cwd_candidate, None);
        assert_eq!(dir, cwd_candidate);
    }

    #[test]
    fn test_existing_cwd_dir_beats_exe_dir() {
        let cwd = TempDir::new().unwrap();
        let exe_dir = TempDir::new().unwrap();
        let cwd_candidate = cwd.path().join(SYNC_DIR_NAME);
        std::fs::create_dir(&cwd_candidate).unwrap();
        std::fs::create_dir(exe_dir.path().join(SYNC_DIR_NAME)).unwrap();

        let exe = exe_dir.path().join("quizbase");
        let dir = resolve_sync_dir_from(None, &cwd_candidate, Some(exe));
        assert_eq!(dir, cwd_candidate);
    }

    #[test]
    fn test_exe_dir_used_when_cwd_missing() {
        let cwd = TempDir::new().unwrap();
        let exe_dir = TempDir::new().unwrap();
        let exe_candidate = exe_dir.path().join(SYNC_DIR_NAME);
        std::fs::create_dir(&exe_candidate).unwrap();

        let dir = resolve_sync_dir_from(
            None,
            &cwd.path().join(SYNC_DIR_NAME),
            Some(exe_dir.path().join("quizbase")),
        );
        assert_eq!(dir, exe_candidate);
    }

    #[test]
    fn test_falls_back_to_cwd_candidate() {
        let cwd = TempDir::new().unwrap();
        let cwd_candidate = cwd.path().join(SYNC_DIR_NAME);

        let dir = resolve_sync_dir_from(None, &cwd_candidate, None);
        assert_eq!(dir, cwd_candidate);
        assert!(!cwd_candidate.exists(), "resolver must not create the dir");
    }

    #[test]
    fn test_explicit_override_short_circuits() {
        let dir = resolve_sync_dir(Some(Path::new("/tmp/override")));
        assert_eq!(dir, PathBuf::from("/tmp/override"));
    }

    #[test]
    fn test_cargo_target_detection() {
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("Cargo.toml"), "[package]\n").unwrap();
        let exe = root.path().join("target").join("debug").join("quizbase");
        assert!(is_cargo_target_path(&exe));

        let other = TempDir::new().unwrap();
        let exe = other.path().join("target").join("quizbase");
        assert!(!is_cargo_target_path(&exe));
    }
}
