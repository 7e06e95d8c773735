//! Concierge API - HTTP server for the concierge booking service
//!
//! Serves the public landing page and the role-specific cabinets. Users sign
//! in with email and password; the resulting bearer token lives in a
//! server-side session and is resolved to a principal on every request.

pub mod audit;
pub mod auth;
pub mod data;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;
pub mod templates;

use auth::{authenticate, session_layer};
use axum::{middleware::from_fn_with_state, Router};
use state::AppState;
use std::sync::Arc;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tower_sessions::{MemoryStore, SessionStore};

/// Router with sessions kept in process memory
pub fn create_router(state: Arc<AppState>) -> Router {
    create_router_with_session_store(state, MemoryStore::default())
}

/// Router with sessions kept in `store`
///
/// Layers, outermost first: panic recovery, request tracing, session,
/// authentication. Route-level gates sit inside them.
pub fn create_router_with_session_store<S>(state: Arc<AppState>, store: S) -> Router
where
    S: SessionStore + Clone,
{
    routes::app_routes(state.clone())
        .layer(from_fn_with_state(state.clone(), authenticate))
        .layer(session_layer(store, &state.config.session))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(routes::handle_panic))
        .with_state(state)
}

/// Router over in-memory stores with cheap password hashing
///
/// Returns the state as well so tests can seed data.
#[cfg(any(test, feature = "test-utils"))]
pub fn create_router_for_testing() -> (Router, Arc<AppState>) {
    use auth::PasswordConfig;
    use concierge_core::AppConfig;
    use data::Models;

    let state = AppState::new(AppConfig::default(), Models::in_memory())
        .expect("embedded templates parse");
    let state = Arc::new(state.with_password_config(PasswordConfig {
        memory_cost: 4096,
        time_cost: 1,
        parallelism: 1,
        output_len: Some(32),
    }));

    (create_router(state.clone()), state)
}
