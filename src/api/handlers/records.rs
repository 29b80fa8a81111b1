//! Record CRUD handlers.
//!
//! Access rules are all-or-nothing: a public (`""`) rule lets everyone in, a
//! locked rule turns the request away. Requests are never authenticated, so
//! locked list/create answer 403 and locked view/update/delete answer 404.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use super::blocking;
use crate::api::error::ApiError;
use crate::app::App;
use crate::error::{FieldError, ValidationErrors};
use crate::model::{Collection, FieldKind, Record};

const CREATE_FAILED: &str = "Failed to create record.";
const UPDATE_FAILED: &str = "Failed to update record.";
const DELETE_FAILED: &str = "Failed to delete the record.";
const LOAD_FAILED: &str = "Failed to load the record.";

pub const DEFAULT_PER_PAGE: usize = 30;
pub const MAX_PER_PAGE: usize = 1000;

/// Auth keys the client may never write directly.
const AUTH_PROTECTED_KEYS: [&str; 2] = ["tokenKey", "verified"];

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListParams {
    pub page: Option<usize>,
    #[serde(rename = "perPage")]
    pub per_page: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    pub page: usize,
    pub per_page: usize,
    pub total_items: usize,
    pub total_pages: usize,
    pub items: Vec<Map<String, Value>>,
}

fn find_collection(app: &App, name: &str) -> Result<Arc<Collection>, ApiError> {
    app.find_collection_by_name_or_id(name)
        .map_err(|e| ApiError::from_app(e, LOAD_FAILED))
}

/// An empty body is an empty object.
fn parse_body(body: &[u8]) -> Result<Map<String, Value>, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    serde_json::from_slice(body).map_err(|_| ApiError::invalid_body())
}

/// Lay a request body over `record`.
///
/// Autodate values are dropped. On auth collections the password is staged
/// only when `passwordConfirm` matches, and protected keys are dropped.
fn apply_body(
    record: &mut Record,
    mut data: Map<String, Value>,
    failure: &str,
) -> Result<(), ApiError> {
    let collection = record.collection_arc();
    for field in collection.fields.iter().filter(|f| f.kind == FieldKind::Autodate) {
        data.remove(&field.name);
    }

    if collection.is_auth() {
        let password = data.remove("password");
        let confirm = data.remove("passwordConfirm");
        for key in AUTH_PROTECTED_KEYS {
            data.remove(key);
        }

        let plain = password.as_ref().and_then(Value::as_str).unwrap_or_default();
        if !plain.is_empty() {
            let confirm = confirm.as_ref().and_then(Value::as_str).unwrap_or_default();
            if confirm != plain {
                let mut errors = ValidationErrors::default();
                errors.add(
                    "passwordConfirm",
                    if confirm.is_empty() {
                        FieldError::required()
                    } else {
                        FieldError::new("validation_values_mismatch", "Values don't match.")
                    },
                );
                return Err(ApiError::validation(failure, &errors));
            }
            record.set_password(plain);
        }
    }

    record.load(data);
    Ok(())
}

#[instrument(skip(app))]
pub async fn list_records(
    State(app): State<App>,
    Path(collection): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse>, ApiError> {
    blocking(move || {
        let collection = find_collection(&app, &collection)?;
        if !collection.list_rule.is_public() {
            return Err(ApiError::forbidden());
        }

        let per_page = params.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE);
        let page = params.page.unwrap_or(1).max(1);

        let records = app
            .find_all_records(&collection.id)
            .map_err(|e| ApiError::from_app(e, LOAD_FAILED))?;
        let total_items = records.len();
        let items = records
            .iter()
            .skip((page - 1).saturating_mul(per_page))
            .take(per_page)
            .map(Record::public_export)
            .collect();

        Ok(Json(ListResponse {
            page,
            per_page,
            total_items,
            total_pages: total_items.div_ceil(per_page),
            items,
        }))
    })
    .await
}

#[instrument(skip(app))]
pub async fn view_record(
    State(app): State<App>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<Json<Map<String, Value>>, ApiError> {
    blocking(move || {
        let collection = find_collection(&app, &collection)?;
        if !collection.view_rule.is_public() {
            return Err(ApiError::not_found());
        }
        let record = app
            .find_record_by_id(&collection.id, &id)
            .map_err(|e| ApiError::from_app(e, LOAD_FAILED))?;
        Ok(Json(record.public_export()))
    })
    .await
}

#[instrument(skip(app, body))]
pub async fn create_record(
    State(app): State<App>,
    Path(collection): Path<String>,
    body: Bytes,
) -> Result<Json<Map<String, Value>>, ApiError> {
    let data = parse_body(&body)?;
    blocking(move || {
        let collection = find_collection(&app, &collection)?;
        if !collection.create_rule.is_public() {
            return Err(ApiError::forbidden());
        }

        let mut record = Record::new(collection);
        apply_body(&mut record, data, CREATE_FAILED)?;
        let saved = app
            .create_record(record)
            .map_err(|e| ApiError::from_app(e, CREATE_FAILED))?;

        debug!(collection = %saved.collection().name, id = saved.id(), "Created record via API");
        Ok(Json(saved.public_export()))
    })
    .await
}

#[instrument(skip(app, body))]
pub async fn update_record(
    State(app): State<App>,
    Path((collection, id)): Path<(String, String)>,
    body: Bytes,
) -> Result<Json<Map<String, Value>>, ApiError> {
    let mut data = parse_body(&body)?;
    data.remove("id");
    blocking(move || {
        let collection = find_collection(&app, &collection)?;
        if !collection.update_rule.is_public() {
            return Err(ApiError::not_found());
        }

        let mut record = app
            .find_record_by_id(&collection.id, &id)
            .map_err(|e| ApiError::from_app(e, UPDATE_FAILED))?;
        apply_body(&mut record, data, UPDATE_FAILED)?;
        let saved = app
            .update_record(record)
            .map_err(|e| ApiError::from_app(e, UPDATE_FAILED))?;
        Ok(Json(saved.public_export()))
    })
    .await
}

#[instrument(skip(app))]
pub async fn delete_record(
    State(app): State<App>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    blocking(move || {
        let collection = find_collection(&app, &collection)?;
        if !collection.delete_rule.is_public() {
            return Err(ApiError::not_found());
        }

        let record = app
            .find_record_by_id(&collection.id, &id)
            .map_err(|e| ApiError::from_app(e, DELETE_FAILED))?;
        app.delete_record(record)
            .map_err(|e| ApiError::from_app(e, DELETE_FAILED))?;
        Ok(StatusCode::NO_CONTENT)
    })
    .await
}
