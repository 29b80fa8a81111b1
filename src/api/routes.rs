//! API route configuration.

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::app::App;

/// Create the API router.
pub fn create_router(app: App) -> Router {
    let records = Router::new()
        .route(
            "/api/collections/{collection}/records",
            get(handlers::list_records).post(handlers::create_record),
        )
        .route(
            "/api/collections/{collection}/records/{id}",
            get(handlers::view_record)
                .patch(handlers::update_record)
                .delete(handlers::delete_record),
        );

    Router::new()
        .route("/api/health", get(handlers::health))
        .merge(records)
        .with_state(app)
        .layer(TraceLayer::new_for_http())
}
