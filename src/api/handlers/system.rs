use axum::Json;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::instrument;

#[derive(Serialize)]
pub struct HealthResponse {
    pub code: u16,
    pub message: String,
    pub data: Map<String, Value>,
}

#[instrument]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        code: 200,
        message: "API is healthy.".to_string(),
        data: Map::new(),
    })
}
