//! Sync types for JSON snapshot export/import.

use std::collections::BTreeMap;

use serde::Serialize;

/// Statistics for an export operation: records written per collection.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ExportStats {
    pub collections: BTreeMap<String, usize>,
}

impl ExportStats {
    /// Total number of records written.
    #[must_use]
    pub fn total(&self) -> usize {
        self.collections.values().sum()
    }

    /// Returns true if no snapshot was written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}

/// Statistics for an import operation, in import order.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ImportStats {
    pub collections: Vec<(String, EntityStats)>,
}

impl ImportStats {
    /// Total number of records saved.
    #[must_use]
    pub fn total_saved(&self) -> usize {
        self.collections.iter().map(|(_, s)| s.saved).sum()
    }

    /// Total number of records that failed to save.
    #[must_use]
    pub fn total_failed(&self) -> usize {
        self.collections.iter().map(|(_, s)| s.failed).sum()
    }
}

/// Per-collection import statistics.
#[derive(Debug, Default, Clone, Serialize)]
pub struct EntityStats {
    /// Records saved (created or updated).
    pub saved: usize,
    /// Records rejected by validation or storage; logged and skipped.
    pub failed: usize,
    /// Whether the snapshot file was skipped (missing, malformed, empty or
    /// unknown collection).
    pub skipped_file: bool,
}

impl EntityStats {
    /// Total records processed.
    #[must_use]
    pub fn total(&self) -> usize {
        self.saved + self.failed
    }
}

/// Sync status of the snapshot directory.
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    /// Resolved sync directory.
    pub sync_dir: String,
    /// Whether the directory exists.
    pub dir_exists: bool,
    /// One entry per collection.
    pub collections: Vec<CollectionSyncInfo>,
}

impl SyncStatus {
    /// Collections whose snapshot does not match the database.
    #[must_use]
    pub fn out_of_sync(&self) -> usize {
        self.collections.iter().filter(|c| !c.in_sync).count()
    }
}

/// Snapshot state of one collection.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionSyncInfo {
    /// Collection name.
    pub name: String,
    /// Records in the database.
    pub records: usize,
    /// Snapshot file name (e.g., "chapters.json").
    pub file: String,
    /// Whether the snapshot file exists.
    pub file_exists: bool,
    /// File size in bytes.
    pub size: u64,
    /// Records in the snapshot file, if it parses.
    pub file_records: Option<usize>,
    /// Whether the snapshot content equals a fresh export.
    pub in_sync: bool,
}

/// Sync-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Snapshot file not found.
    #[error("Snapshot file not found: {0}")]
    FileNotFound(String),

    /// File parsed as JSON but is not an array of objects.
    #[error("Invalid snapshot {path}: {message}")]
    InvalidSnapshot {
        /// Snapshot path.
        path: String,
        /// What was wrong with it.
        message: String,
    },
}

/// Result type for sync operations.
pub type SyncResult<T> = std::result::Result<T, SyncError>;
