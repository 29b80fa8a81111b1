//! HTTP error responses.
//!
//! Every failure is rendered as `{"status": .., "message": .., "data": {..}}`.
//! Only validation errors carry `data`: a map of field name to
//! `{"code", "message"}`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::error;

use crate::error::{Error, ValidationErrors};

pub const NOT_FOUND_MESSAGE: &str = "The requested resource wasn't found.";
pub const FORBIDDEN_MESSAGE: &str = "Only superusers can perform this action.";
pub const INTERNAL_MESSAGE: &str = "Something went wrong while processing your request.";
pub const INVALID_BODY_MESSAGE: &str =
    "Failed to load the submitted data due to invalid formatting.";

/// Error body returned by every endpoint.
#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(serialize_with = "serialize_status")]
    pub status: StatusCode,
    pub message: String,
    pub data: Value,
}

fn serialize_status<S: serde::Serializer>(status: &StatusCode, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u16(status.as_u16())
}

impl ApiError {
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            data: Value::Object(Map::new()),
        }
    }

    #[must_use]
    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE)
    }

    #[must_use]
    pub fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN, FORBIDDEN_MESSAGE)
    }

    #[must_use]
    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE)
    }

    #[must_use]
    pub fn invalid_body() -> Self {
        Self::new(StatusCode::BAD_REQUEST, INVALID_BODY_MESSAGE)
    }

    /// 400 with per-field details.
    #[must_use]
    pub fn validation(message: &str, errors: &ValidationErrors) -> Self {
        Self {
            data: serde_json::to_value(errors).unwrap_or_default(),
            ..Self::new(StatusCode::BAD_REQUEST, message)
        }
    }

    /// Map an app error. `failure` is the message used for validation
    /// errors, e.g. "Failed to create record.".
    #[must_use]
    pub fn from_app(err: Error, failure: &str) -> Self {
        match err {
            Error::Validation(errors) => Self::validation(failure, &errors),
            Error::CollectionNotFound { .. } | Error::RecordNotFound { .. } => Self::not_found(),
            other => {
                error!(error = %other, "Request failed");
                Self::internal()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}
