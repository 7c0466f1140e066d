//! HTTP API layer with Axum routes.
//!
//! This crate provides:
//! - REST routes over the posting service and the expiration sweep
//! - The approval workflow decision callback
//! - Mapping of engine errors onto JSON error bodies
//!
//! Authentication is owned by the platform gateway in front of the service.

pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use entitle_core::ledger::LedgerStore;
use entitle_core::policy::PassThroughPolicy;
use entitle_core::posting::PostingService;
use entitle_core::sweep::ExpirationSweep;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
pub struct AppState<S> {
    /// Posting service for holds, decisions, credits and reads.
    pub posting: Arc<PostingService<S, PassThroughPolicy>>,
    /// Expiration sweep, run on demand by the jobs routes.
    pub sweep: Arc<ExpirationSweep<S>>,
}

impl<S> AppState<S> {
    /// Creates the state from its services.
    #[must_use]
    pub const fn new(
        posting: Arc<PostingService<S, PassThroughPolicy>>,
        sweep: Arc<ExpirationSweep<S>>,
    ) -> Self {
        Self { posting, sweep }
    }
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            posting: Arc::clone(&self.posting),
            sweep: Arc::clone(&self.sweep),
        }
    }
}

/// Creates the main application router.
pub fn create_router<S: LedgerStore + 'static>(state: AppState<S>) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
