//! HTTP API.
//!
//! A small PocketBase-compatible surface: health and record CRUD under
//! `/api/collections/{collection}/records`. Handlers share the [`App`]
//! through router state; storage work runs on the blocking pool.

mod error;
mod handlers;
mod routes;

use std::net::SocketAddr;

use axum::Router;
use tracing::info;

use crate::app::App;
use crate::error::Result;
use crate::hooks::ServeEvent;

pub use error::ApiError;
pub use handlers::HealthResponse;
pub use routes::create_router;

/// Run the serve hook chain and build the router in its finalizer.
///
/// Returns `None` when a serve handler stopped the chain without calling
/// `next`.
///
/// # Errors
///
/// Returns whatever a serve handler returns.
pub fn prepare(app: &App, addr: SocketAddr) -> Result<Option<Router>> {
    let mut event = ServeEvent {
        app: app.clone(),
        addr,
        router: None,
    };
    app.hooks().on_serve.trigger(&mut event, |e| {
        e.router = Some(create_router(e.app.clone()));
        Ok(())
    })?;
    Ok(event.router)
}

/// Bind `addr` and serve `router` until the process is stopped.
///
/// # Errors
///
/// Returns an error if the address cannot be bound.
pub async fn run(router: Router, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server started at http://{}", listener.local_addr()?);

    axum::serve(listener, router).await?;
    Ok(())
}
