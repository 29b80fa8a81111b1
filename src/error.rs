//! Error types for quizbase.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=db, 3=not_found, 4=validation, etc.)
//! - Per-field validation details shared by the CLI and the HTTP API
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use crate::sync::SyncError;

/// Result type alias for quizbase operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Database (exit 2)
    DatabaseError,

    // Not Found (exit 3)
    CollectionNotFound,
    RecordNotFound,

    // Validation (exit 4)
    ValidationFailed,
    InvalidArgument,

    // Migration (exit 5)
    MigrationFailed,

    // Sync (exit 6)
    SyncError,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::DatabaseError => "DATABASE_ERROR",
            Self::CollectionNotFound => "COLLECTION_NOT_FOUND",
            Self::RecordNotFound => "RECORD_NOT_FOUND",
            Self::ValidationFailed => "VALIDATION_FAILED",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::MigrationFailed => "MIGRATION_FAILED",
            Self::SyncError => "SYNC_ERROR",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-8).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::DatabaseError => 2,
            Self::CollectionNotFound | Self::RecordNotFound => 3,
            Self::ValidationFailed | Self::InvalidArgument => 4,
            Self::MigrationFailed => 5,
            Self::SyncError => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether a caller should retry with corrected input.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ValidationFailed | Self::InvalidArgument)
    }
}

// ── Validation details ────────────────────────────────────────

/// A single field validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub code: String,
    pub message: String,
}

impl FieldError {
    #[must_use]
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn required() -> Self {
        Self::new("validation_required", "Cannot be blank.")
    }

    #[must_use]
    pub fn not_unique() -> Self {
        Self::new("validation_not_unique", "Value must be unique.")
    }
}

/// Field name → failure, ordered for stable output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(pub BTreeMap<String, FieldError>);

impl ValidationErrors {
    pub fn add(&mut self, field: &str, error: FieldError) {
        // first failure per field wins
        self.0.entry(field.to_string()).or_insert(error);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FieldError> {
        self.0.get(field)
    }

    /// `Ok(())` when nothing was collected, otherwise [`Error::Validation`].
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(self))
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, err)| format!("{field}: {}", err.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in quizbase operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Collection not found: {id}")]
    CollectionNotFound { id: String },

    #[error("Record not found: {collection}/{id}")]
    RecordNotFound { collection: String, id: String },

    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("Migration {version} failed: {message}")]
    Migration { version: String, message: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::CollectionNotFound { .. } => ErrorCode::CollectionNotFound,
            Self::RecordNotFound { .. } => ErrorCode::RecordNotFound,
            Self::Validation(_) => ErrorCode::ValidationFailed,
            Self::Migration { .. } => ErrorCode::MigrationFailed,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Sync(_) => ErrorCode::SyncError,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Shorthand for a single-field validation failure.
    #[must_use]
    pub fn field(field: &str, error: FieldError) -> Self {
        let mut errors = ValidationErrors::default();
        errors.add(field, error);
        Self::Validation(errors)
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::CollectionNotFound { id } => Some(format!(
                "No collection named or with ID '{id}'. Use `quizbase collection list`, \
                 or run `quizbase migrate up` if the database is new."
            )),
            Self::RecordNotFound { collection, .. } => Some(format!(
                "Use `quizbase record list {collection}` to see available records."
            )),
            Self::Migration { .. } => Some(
                "Inspect applied versions with `quizbase migrate history`.".to_string(),
            ),
            Self::Sync(_) => Some(
                "Check the sync directory (PB_SYNC_DIR or ./pb_sync) is writable.".to_string(),
            ),
            Self::Validation(_)
            | Self::Database(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::InvalidArgument(_)
            | Self::Config(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Self::Validation(errors) = self {
            obj["error"]["fields"] = serde_json::to_value(errors).unwrap_or_default();
        }
        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}
