//! Serve command implementation.
//!
//! Startup order: pending migrations (when automigrate is on), the serve
//! hook chain (snapshot import runs here), then the listener.

use std::net::SocketAddr;

use tracing::{info, warn};

use crate::api;
use crate::app::App;
use crate::error::{Error, Result};
use crate::migrations;

/// Execute the serve command. Blocks until the server stops.
///
/// # Errors
///
/// Returns an error if a migration fails, a serve handler fails, or the
/// address cannot be bound.
pub fn execute(app: &App, addr: SocketAddr) -> Result<()> {
    let pending: Vec<&str> = migrations::pending(app)?.iter().map(|m| m.version).collect();
    if !pending.is_empty() {
        if app.config().automigrate {
            let applied = migrations::run_pending(app)?;
            info!(count = applied.len(), "Applied pending migrations");
        } else {
            warn!(
                ?pending,
                "Pending migrations not applied; run `quizbase migrate up` or set AUTOMIGRATE=1"
            );
        }
    }

    let Some(router) = api::prepare(app, addr)? else {
        warn!("Serve handler stopped startup");
        return Ok(());
    };

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| Error::Other(format!("Failed to create async runtime: {e}")))?;

    rt.block_on(api::run(router, addr))
}
