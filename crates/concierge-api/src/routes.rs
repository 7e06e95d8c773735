//! Route definitions
//!
//! Routes are grouped by cabinet. Every group carries its own gate; the
//! authentication middleware, session, tracing and panic recovery layers are
//! added on top of the merged router in [`crate::create_router_with_session_store`].

use crate::auth::{require_authenticated, require_role};
use crate::data::UserRole;
use crate::error::ApiError;
use crate::handlers::{admin, b2b, concierge, health, public};
use crate::state::AppState;
use axum::{
    http::{header, HeaderValue, StatusCode},
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use std::any::Any;
use std::sync::Arc;

/// All application routes
pub fn app_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Open to anonymous visitors
    let public_routes = Router::new()
        .route("/", get(public::index))
        .route("/registration", post(public::submit_registration))
        .route("/login", post(public::login))
        .route("/activate", post(public::activate))
        .route("/health", get(health::health_check));

    // Any signed-in user, activated or not
    let signed_in_routes = Router::new()
        .route("/logout", post(public::logout))
        .route_layer(from_fn_with_state(state.clone(), require_authenticated()));

    let admin_routes = Router::new()
        .route("/my-cabinet-admin/", get(admin::cabinet))
        .route("/my-cabinet-admin/registrations", get(admin::registrations))
        .route(
            "/my-cabinet-admin/services",
            get(admin::service_form).post(admin::create_service),
        )
        .route("/my-cabinet-admin/users", post(admin::create_user))
        .route("/my-cabinet-admin/users/:id", delete(admin::delete_user))
        .route_layer(from_fn_with_state(
            state.clone(),
            require_role(UserRole::Admin),
        ));

    let concierge_routes = Router::new()
        .route("/my-cabinet", get(concierge::cabinet))
        .route(
            "/my-cabinet/services",
            get(concierge::service_form).post(concierge::create_service),
        )
        .route("/my-cabinet/requests/:id", get(concierge::request))
        .route_layer(from_fn_with_state(
            state.clone(),
            require_role(UserRole::Concierge),
        ));

    let b2b_routes = Router::new()
        .route("/my-cabinet-b-client", get(b2b::cabinet))
        .route_layer(from_fn_with_state(state, require_role(UserRole::B2b)));

    Router::new()
        .merge(public_routes)
        .merge(signed_in_routes)
        .merge(admin_routes)
        .merge(concierge_routes)
        .merge(b2b_routes)
}

/// Turn a handler panic into a 500 and ask the client to drop the connection
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let details = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    tracing::error!(panic = %details, "request handler panicked");

    let mut response = (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiError::internal_error()),
    )
        .into_response();
    response
        .headers_mut()
        .insert(header::CONNECTION, HeaderValue::from_static("close"));
    response
}
