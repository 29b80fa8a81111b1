//! Record and collection validation.
//!
//! Failures are collected per field into [`ValidationErrors`] so a single
//! response can report every bad field. The codes and messages match what the
//! HTTP API returns to clients.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::error::{FieldError, Result, ValidationErrors};
use crate::model::{Collection, Field, FieldKind, Record};
use crate::storage::SqliteStorage;

/// Minimum password length when the field sets no `min`.
pub const DEFAULT_PASSWORD_MIN: usize = 8;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid regex")
});

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://[^\s/$.?#].\S*$").expect("valid regex"));

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"));

// ── Records ──────────────────────────────────────────────────

/// Validate a record against its collection before it is written.
///
/// `is_new` controls the password rule: a new auth record must carry one.
///
/// # Errors
///
/// Returns [`Error::Validation`](crate::error::Error::Validation) with one
/// entry per failing field, or a storage error if a relation or uniqueness
/// lookup fails.
pub fn validate_record(storage: &SqliteStorage, record: &Record, is_new: bool) -> Result<()> {
    let collection = record.collection();
    let mut errors = ValidationErrors::default();

    for field in &collection.fields {
        if field.kind == FieldKind::Autodate {
            continue;
        }

        if field.kind == FieldKind::Password {
            if let Some(err) = check_password(field, record, is_new) {
                errors.add(&field.name, err);
            }
            continue;
        }

        let value = if field.name == "id" {
            Value::String(record.id().to_string())
        } else {
            record.get(&field.name).cloned().unwrap_or(Value::Null)
        };

        if is_blank(&value) {
            if field.required {
                errors.add(&field.name, FieldError::required());
            }
            continue;
        }

        let result = match field.kind {
            FieldKind::Text | FieldKind::Editor => check_text(field, &value),
            FieldKind::Email => check_email(&value),
            FieldKind::Url => check_url(&value),
            FieldKind::Date => check_string(&value).map(|_| ()),
            FieldKind::Number => check_number(field, &value),
            FieldKind::Bool => check_bool(&value),
            FieldKind::Select => check_select(field, &value),
            FieldKind::Relation => check_relation(storage, field, &value)?,
            FieldKind::Json | FieldKind::Autodate | FieldKind::Password => Ok(()),
        };
        if let Err(err) = result {
            errors.add(&field.name, err);
        }
    }

    for name in &collection.unique {
        if errors.get(name).is_some() {
            continue;
        }
        let Some(value) = record.get(name).filter(|v| !is_blank(v)) else {
            continue;
        };
        if storage.field_value_taken(&collection.id, name, value, record.id())? {
            errors.add(name, FieldError::not_unique());
        }
    }

    errors.into_result()
}

/// Null, empty string and empty array count as blank.
#[must_use]
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::Bool(b) => !b,
        Value::Object(_) => false,
    }
}

fn check_string(value: &Value) -> std::result::Result<&str, FieldError> {
    value
        .as_str()
        .ok_or_else(|| FieldError::new("validation_invalid_value", "Must be a string."))
}

fn check_text(field: &Field, value: &Value) -> std::result::Result<(), FieldError> {
    let text = check_string(value)?;
    let len = text.chars().count();

    if let Some(min) = field.option_usize("min").filter(|min| len < *min) {
        return Err(FieldError::new(
            "validation_min_text_constraint",
            format!("Must be at least {min} character(s)."),
        ));
    }
    if let Some(max) = field.option_usize("max").filter(|max| len > *max) {
        return Err(FieldError::new(
            "validation_max_text_constraint",
            format!("Must be less than {max} character(s)."),
        ));
    }
    if let Some(pattern) = field.option_str("pattern") {
        let matches = Regex::new(pattern).map(|re| re.is_match(text)).unwrap_or_else(|e| {
            tracing::warn!(field = %field.name, error = %e, "Invalid field pattern");
            false
        });
        if !matches {
            return Err(FieldError::new(
                "validation_invalid_format",
                "Invalid value format.",
            ));
        }
    }
    Ok(())
}

fn check_email(value: &Value) -> std::result::Result<(), FieldError> {
    let email = check_string(value)?;
    if EMAIL_RE.is_match(email) {
        Ok(())
    } else {
        Err(FieldError::new(
            "validation_is_email",
            "Must be a valid email address.",
        ))
    }
}

fn check_url(value: &Value) -> std::result::Result<(), FieldError> {
    let url = check_string(value)?;
    if URL_RE.is_match(url) {
        Ok(())
    } else {
        Err(FieldError::new("validation_is_url", "Must be a valid url."))
    }
}

fn check_number(field: &Field, value: &Value) -> std::result::Result<(), FieldError> {
    let number = value
        .as_f64()
        .ok_or_else(|| FieldError::new("validation_invalid_number", "Must be a number."))?;

    if field.option_bool("onlyInt") && number.fract() != 0.0 {
        return Err(FieldError::new(
            "validation_only_int_constraint",
            "Decimal numbers are not allowed.",
        ));
    }
    if let Some(min) = field.option_f64("min").filter(|min| number < *min) {
        return Err(FieldError::new(
            "validation_min_number_constraint",
            format!("Must be larger than {min}."),
        ));
    }
    if let Some(max) = field.option_f64("max").filter(|max| number > *max) {
        return Err(FieldError::new(
            "validation_max_number_constraint",
            format!("Must be less than {max}."),
        ));
    }
    Ok(())
}

fn check_bool(value: &Value) -> std::result::Result<(), FieldError> {
    if value.is_boolean() {
        Ok(())
    } else {
        Err(FieldError::new("validation_invalid_bool", "Must be a boolean."))
    }
}

/// String or array of strings; anything else is rejected.
fn string_values(value: &Value) -> std::result::Result<Vec<&str>, FieldError> {
    let invalid = || FieldError::new("validation_invalid_value", "Invalid value.");
    match value {
        Value::String(s) => Ok(vec![s.as_str()]),
        Value::Array(items) => items
            .iter()
            .map(|v| v.as_str().ok_or_else(invalid))
            .collect(),
        _ => Err(invalid()),
    }
}

fn check_select_count(field: &Field, count: usize) -> std::result::Result<(), FieldError> {
    let max = field.option_usize("maxSelect").unwrap_or(1);
    if count > max {
        return Err(FieldError::new(
            "validation_too_many_values",
            format!("Select no more than {max}."),
        ));
    }
    if let Some(min) = field.option_usize("minSelect").filter(|min| count < *min) {
        return Err(FieldError::new(
            "validation_not_enough_values",
            format!("Select at least {min}."),
        ));
    }
    Ok(())
}

fn check_select(field: &Field, value: &Value) -> std::result::Result<(), FieldError> {
    let selected = string_values(value)?;
    check_select_count(field, selected.len())?;

    let allowed: HashSet<&str> = field
        .options
        .get("values")
        .and_then(Value::as_array)
        .map(|values| values.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    if selected.iter().any(|v| !allowed.contains(v)) {
        return Err(FieldError::new(
            "validation_invalid_value",
            "Invalid value.",
        ));
    }
    Ok(())
}

/// Outer `Result` carries storage failures, inner the field verdict.
fn check_relation(
    storage: &SqliteStorage,
    field: &Field,
    value: &Value,
) -> Result<std::result::Result<(), FieldError>> {
    let ids = match string_values(value) {
        Ok(ids) => ids,
        Err(err) => return Ok(Err(err)),
    };
    if let Err(err) = check_select_count(field, ids.len()) {
        return Ok(Err(err));
    }

    let Some(target) = field.option_str("collectionId") else {
        return Ok(Err(FieldError::new(
            "validation_missing_rel_collection",
            "Relation collection is not set.",
        )));
    };

    for id in ids {
        if !storage.record_exists(target, id)? {
            return Ok(Err(FieldError::new(
                "validation_missing_rel_records",
                "Failed to find all relation records with the provided ids.",
            )));
        }
    }
    Ok(Ok(()))
}

fn check_password(field: &Field, record: &Record, is_new: bool) -> Option<FieldError> {
    match record.pending_password() {
        Some(plain) => {
            let min = field.option_usize("min").unwrap_or(DEFAULT_PASSWORD_MIN);
            (plain.chars().count() < min).then(|| {
                FieldError::new(
                    "validation_length_out_of_range",
                    format!("The length must be between {min} and 71."),
                )
            })
        }
        None if field.required && (is_new || record.get_str(&field.name).is_empty()) => {
            Some(FieldError::required())
        }
        None => None,
    }
}

// ── Collections ──────────────────────────────────────────────

/// Validate a collection definition before it is saved.
///
/// # Errors
///
/// Returns [`Error::Validation`](crate::error::Error::Validation) for bad
/// names, duplicate fields or relation fields pointing at unknown collections.
pub fn validate_collection(storage: &SqliteStorage, collection: &Collection) -> Result<()> {
    let mut errors = ValidationErrors::default();

    if !NAME_RE.is_match(&collection.name) {
        errors.add(
            "name",
            FieldError::new("validation_invalid_name", "Invalid collection name."),
        );
    } else if let Some(existing) = storage.get_collection(&collection.name)? {
        if existing.id != collection.id {
            errors.add("name", FieldError::not_unique());
        }
    }

    let mut ids = HashSet::new();
    let mut names = HashSet::new();
    for field in &collection.fields {
        if field.id.is_empty() || !ids.insert(field.id.as_str()) {
            errors.add(
                "fields",
                FieldError::new(
                    "validation_duplicated_field_id",
                    format!("Duplicated or invalid field id {:?}.", field.id),
                ),
            );
        }
        if !NAME_RE.is_match(&field.name) || !names.insert(field.name.as_str()) {
            errors.add(
                "fields",
                FieldError::new(
                    "validation_duplicated_field_name",
                    format!("Duplicated or invalid field name {:?}.", field.name),
                ),
            );
        }
        if field.kind == FieldKind::Relation {
            let target = field.option_str("collectionId").unwrap_or_default();
            if target != collection.id && storage.get_collection(target)?.is_none() {
                errors.add(
                    "fields",
                    FieldError::new(
                        "validation_missing_rel_collection",
                        format!("Relation field {:?} points to a missing collection.", field.name),
                    ),
                );
            }
        }
    }

    if collection.fields.get_by_name("id").is_none() {
        errors.add("fields", FieldError::new("validation_missing_id", "Missing id field."));
    }

    for name in &collection.unique {
        if collection.fields.get_by_name(name).is_none() {
            errors.add(
                "unique",
                FieldError::new(
                    "validation_unknown_field",
                    format!("Unique field {name:?} does not exist."),
                ),
            );
        }
    }

    if !errors.is_empty() {
        tracing::debug!(collection = %collection.name, %errors, "Collection rejected");
    }
    errors.into_result()
}
