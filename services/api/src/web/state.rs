//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use muneccim_core::context::ServiceContext;
use muneccim_core::ports::{DatabaseService, ObjectStorage};
use muneccim_core::registry::WorkspaceRegistry;
use muneccim_core::session::SessionEvents;
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub storage: Arc<dyn ObjectStorage>,
    pub ctx: ServiceContext,
    /// One live workspace per signed-in user.
    pub registry: Arc<WorkspaceRegistry>,
    pub events: SessionEvents,
}

impl AppState {
    /// Builds the state and starts evicting workspaces on sign-out.
    /// Must be called from within a tokio runtime.
    pub fn new(ctx: ServiceContext) -> Self {
        let events = SessionEvents::new();
        let registry = Arc::new(WorkspaceRegistry::new(ctx.clone()));
        registry.clone().evict_on_sign_out(&events);

        Self {
            db: ctx.db.clone(),
            storage: ctx.storage.clone(),
            ctx,
            registry,
            events,
        }
    }
}
