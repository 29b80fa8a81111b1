//! HTTP API tests driving the router directly.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use quizbase::App;
use quizbase::api::create_router;
use quizbase::config::AppConfig;
use quizbase::migrations;

/// Migrated in-memory app exporting into `sync_dir`.
fn test_app(sync_dir: &TempDir) -> App {
    let config = AppConfig {
        sync_dir: Some(sync_dir.path().to_path_buf()),
        ..AppConfig::default()
    };
    let app = App::open_memory(config).expect("Failed to create test app");
    migrations::run_pending(&app).expect("Failed to run migrations");
    app.bind_sync_hooks();
    app
}

async fn send(app: &App, request: Request<Body>) -> (StatusCode, String) {
    let response = create_router(app.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

fn post(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn signup(email: &str) -> Value {
    json!({
        "email": email,
        "password": "1234567890",
        "passwordConfirm": "1234567890",
        "name": "test"
    })
}

fn signup_request(email: &str) -> Request<Body> {
    post("/api/collections/users/records", &signup(email))
}

// =============================================================================
// GET /api/health
// =============================================================================

#[tokio::test]
async fn health_reports_ok() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    let (status, body) = send(&app, get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body, json!({"code": 200, "message": "API is healthy.", "data": {}}));
}

// =============================================================================
// Users: signup and guarded delete
// =============================================================================

#[tokio::test]
async fn signup_succeeds() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    let (status, body) = send(&app, signup_request("test@example.com")).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body.contains(r#""name":"test""#));
    assert!(body.contains(r#""verified":false"#));
    assert!(!body.contains("password"));
    assert!(!body.contains("tokenKey"));
}

#[tokio::test]
async fn duplicate_signup_is_rejected() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    let (status, _) = send(&app, signup_request("dup@example.com")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, signup_request("dup@example.com")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains(r#""message":"Value must be unique.""#), "{body}");
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["message"], "Failed to create record.");
    assert_eq!(body["data"]["email"]["code"], "validation_not_unique");
}

#[tokio::test]
async fn signup_requires_matching_confirmation() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    let mut payload = signup("mismatch@example.com");
    payload["passwordConfirm"] = json!("0987654321");
    let (status, body) = send(&app, post("/api/collections/users/records", &payload)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["data"]["passwordConfirm"]["code"], "validation_values_mismatch");
}

#[tokio::test]
async fn signup_without_password_fails_validation() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    let (status, body) = send(
        &app,
        post("/api/collections/users/records", &json!({"email": "nopass@example.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["data"]["password"]["code"], "validation_required");
}

#[tokio::test]
async fn signup_cannot_set_verified() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    let mut payload = signup("sneaky@example.com");
    payload["verified"] = json!(true);
    let (status, body) = send(&app, post("/api/collections/users/records", &payload)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""verified":false"#));
}

#[tokio::test]
async fn guest_delete_is_not_found() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    let (_, body) = send(&app, signup_request("victim@example.com")).await;
    let created: Value = serde_json::from_str(&body).unwrap();
    let id = created["id"].as_str().unwrap();

    let uri = format!("/api/collections/users/records/{id}");
    let (status, body) = send(&app, delete(&uri)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains(r#""data":{}"#));
    assert!(app.find_record_by_id("users", id).is_ok());
}

#[tokio::test]
async fn guest_delete_of_missing_user_is_not_found() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    let request = delete("/api/collections/users/records/pb_record_users");
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains(r#""data":{}"#));
}

#[tokio::test]
async fn guest_list_of_users_is_forbidden() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    let (status, body) = send(&app, get("/api/collections/users/records")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.contains("Only superusers can perform this action."));
}

// =============================================================================
// Quiz content: public reads, locked writes
// =============================================================================

#[tokio::test]
async fn lecture_list_is_public_and_paginated() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    let lecture = app.find_collection_by_name_or_id("lecture").unwrap();
    for title in ["One", "Two", "Three"] {
        let mut record = quizbase::model::Record::new(lecture.clone());
        record.set("title", json!(title));
        app.create_record(record).unwrap();
    }

    let request = get("/api/collections/lecture/records?perPage=2&page=2");
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["page"], 2);
    assert_eq!(body["perPage"], 2);
    assert_eq!(body["totalItems"], 3);
    assert_eq!(body["totalPages"], 2);
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["items"][0]["collectionName"], "lecture");
}

#[tokio::test]
async fn lecture_view_and_missing_record() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    let lecture = app.find_collection_by_name_or_id("lecture").unwrap();
    let mut record = quizbase::model::Record::new(lecture);
    record.set("title", json!("Intro"));
    let saved = app.create_record(record).unwrap();

    let uri = format!("/api/collections/lecture/records/{}", saved.id());
    let (status, body) = send(&app, get(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""title":"Intro""#));

    let (status, body) = send(&app, get("/api/collections/lecture/records/doesnotexist123")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("The requested resource wasn't found."));
}

#[tokio::test]
async fn guest_create_on_locked_collection_is_forbidden() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    let request = post("/api/collections/lecture/records", &json!({"title": "x"}));
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(app.find_all_records("lecture").unwrap().is_empty());
    assert!(!dir.path().join("lecture.json").exists());
}

#[tokio::test]
async fn unknown_collection_is_not_found() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    let (status, _) = send(&app, get("/api/collections/nope/records")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_body_is_bad_request() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    let request = Request::builder()
        .method("POST")
        .uri("/api/collections/users/records")
        .header("content-type", "application/json")
        .body(Body::from("{ nope"))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("invalid formatting"));
}

#[tokio::test]
async fn signup_exports_users_snapshot() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    let (status, _) = send(&app, signup_request("snap@example.com")).await;
    assert_eq!(status, StatusCode::OK);

    let raw = std::fs::read_to_string(dir.path().join("users.json")).unwrap();
    let rows: Vec<Value> = serde_json::from_str(&raw).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["email"], "snap@example.com");
    assert!(rows[0].get("created").is_none());
}
