//! Lifecycle hooks.
//!
//! A [`Hook`] is an ordered list of handlers for one event type. Triggering a
//! hook runs the handlers in bind order; each handler receives the event and a
//! [`Next`] continuation and decides whether to proceed. The last
//! continuation runs the finalizer, which performs the operation the event
//! describes (insert a record, start serving). A handler that returns an error
//! or never calls `next` short-circuits the chain.
//!
//! ```ignore
//! app.hooks().on_record_create.bind(|e, next| {
//!     next.run(e)?;          // let the insert happen
//!     tracing::info!(id = e.record.id(), "created");
//!     Ok(())
//! });
//! ```

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::app::App;
use crate::error::Result;
use crate::model::Record;

/// Handler signature for events of type `E`.
pub type HandlerFn<E> = dyn Fn(&mut E, Next<'_, E>) -> Result<()> + Send + Sync;

/// Identifier returned by [`Hook::bind`], used to unbind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Continuation passed to each handler.
pub struct Next<'a, E> {
    handlers: &'a [Arc<HandlerFn<E>>],
    finalizer: &'a mut dyn FnMut(&mut E) -> Result<()>,
}

impl<E> Next<'_, E> {
    /// Run the remaining handlers, then the finalizer.
    ///
    /// # Errors
    ///
    /// Returns the first error produced further down the chain.
    pub fn run(self, event: &mut E) -> Result<()> {
        match self.handlers.split_first() {
            Some((handler, rest)) => handler(
                event,
                Next {
                    handlers: rest,
                    finalizer: self.finalizer,
                },
            ),
            None => (self.finalizer)(event),
        }
    }
}

/// Ordered handler list for one event type.
pub struct Hook<E> {
    handlers: RwLock<Vec<(HandlerId, Arc<HandlerFn<E>>)>>,
    next_id: AtomicU64,
}

impl<E> Default for Hook<E> {
    fn default() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl<E> std::fmt::Debug for Hook<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hook").field("handlers", &self.len()).finish()
    }
}

impl<E> Hook<E> {
    /// Append a handler.
    pub fn bind<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&mut E, Next<'_, E>) -> Result<()> + Send + Sync + 'static,
    {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut handlers = self
            .handlers
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        handlers.push((id, Arc::new(handler)));
        id
    }

    /// Remove a handler. Returns whether it was bound.
    pub fn unbind(&self, id: HandlerId) -> bool {
        let mut handlers = self
            .handlers
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let before = handlers.len();
        handlers.retain(|(h, _)| *h != id);
        handlers.len() != before
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run the handler chain with `finalizer` as the innermost step.
    ///
    /// Handlers are snapshotted first, so a handler may bind or unbind
    /// without deadlocking.
    ///
    /// # Errors
    ///
    /// Returns the first handler or finalizer error.
    pub fn trigger<F>(&self, event: &mut E, mut finalizer: F) -> Result<()>
    where
        F: FnMut(&mut E) -> Result<()>,
    {
        let handlers: Vec<Arc<HandlerFn<E>>> = self
            .handlers
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect();

        Next {
            handlers: &handlers,
            finalizer: &mut finalizer,
        }
        .run(event)
    }
}

/// Fired for record create, update and delete.
pub struct RecordEvent {
    pub app: App,
    pub record: Record,
}

/// Fired once when the server is about to start accepting connections.
///
/// The finalizer fills `router`; if a handler stops the chain the server does
/// not start.
pub struct ServeEvent {
    pub app: App,
    pub addr: SocketAddr,
    pub router: Option<axum::Router>,
}

/// All lifecycle hooks of an [`App`].
#[derive(Debug, Default)]
pub struct Hooks {
    pub on_serve: Hook<ServeEvent>,
    pub on_record_create: Hook<RecordEvent>,
    pub on_record_update: Hook<RecordEvent>,
    pub on_record_delete: Hook<RecordEvent>,
}
