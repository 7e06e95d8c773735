//! Route authorization gates
//!
//! Each gate checks the principal attached by
//! [`authenticate`](super::middleware::authenticate) against one
//! [`Requirement`]. Requirements nest: a role implies an activated account,
//! which implies an authenticated one. A denied request is redirected to the
//! configured login page and never reaches the handler.

use super::principal::{principal_of, Principal};
use crate::audit::{audit_log, extract_ip_address, extract_user_agent, AuditEvent};
use crate::data::UserRole;
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Authenticated,
    Activated,
    Role(UserRole),
}

/// Why a principal was turned away
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Denial {
    #[error("not authenticated")]
    NotAuthenticated,

    #[error("account not activated")]
    NotActivated,

    #[error("role {actual} does not match required role {required}")]
    WrongRole { required: UserRole, actual: UserRole },
}

/// Decide whether `principal` satisfies `requirement`
pub fn check(principal: &Principal, requirement: &Requirement) -> Result<(), Denial> {
    let user = principal.user().ok_or(Denial::NotAuthenticated)?;
    if *requirement == Requirement::Authenticated {
        return Ok(());
    }

    if !user.activated {
        return Err(Denial::NotActivated);
    }

    match *requirement {
        Requirement::Role(required) if user.role != required => Err(Denial::WrongRole {
            required,
            actual: user.role,
        }),
        _ => Ok(()),
    }
}

/// Type alias for gate middleware future
pub type GateFuture = Pin<Box<dyn Future<Output = Response> + Send>>;

/// Middleware factory enforcing `requirement`
///
/// # Example
///
/// ```ignore
/// let admin = Router::new()
///     .route("/", get(cabinet))
///     .route_layer(middleware::from_fn_with_state(
///         state.clone(),
///         require(Requirement::Role(UserRole::Admin)),
///     ));
/// ```
pub fn require(
    requirement: Requirement,
) -> impl Fn(State<Arc<AppState>>, Request, Next) -> GateFuture + Clone {
    move |State(state): State<Arc<AppState>>, request: Request, next: Next| {
        Box::pin(async move {
            let Some(principal) = principal_of(request.extensions()) else {
                tracing::error!(
                    path = %request.uri().path(),
                    "authorization gate ran without authentication middleware"
                );
                return AppError::Internal("no principal attached to request".to_string())
                    .into_response();
            };

            let user_id = principal.user().map(|user| user.id);
            if let Err(denial) = check(principal, &requirement) {
                audit_log(&AuditEvent::AccessDenied {
                    user_id,
                    resource: request.uri().path().to_string(),
                    reason: denial.to_string(),
                    required_role: match requirement {
                        Requirement::Role(role) => Some(role.to_string()),
                        _ => None,
                    },
                    ip_address: extract_ip_address(request.headers()),
                    user_agent: extract_user_agent(request.headers()),
                });

                return Redirect::to(&state.config.auth.login_redirect).into_response();
            }

            next.run(request).await
        }) as GateFuture
    }
}

pub fn require_authenticated(
) -> impl Fn(State<Arc<AppState>>, Request, Next) -> GateFuture + Clone {
    require(Requirement::Authenticated)
}

pub fn require_activated() -> impl Fn(State<Arc<AppState>>, Request, Next) -> GateFuture + Clone
{
    require(Requirement::Activated)
}

pub fn require_role(
    role: UserRole,
) -> impl Fn(State<Arc<AppState>>, Request, Next) -> GateFuture + Clone {
    require(Requirement::Role(role))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::Password;
    use crate::auth::principal::attach_principal;
    use crate::data::{Models, Timestamps, User};
    use axum::{
        body::Body,
        http::{header, Request as HttpRequest, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use concierge_core::AppConfig;
    use tower::ServiceExt;

    fn user(role: UserRole, activated: bool) -> User {
        User {
            id: 7,
            first_name: "Grace".to_string(),
            last_name: "Hopper".to_string(),
            email: "grace@example.com".to_string(),
            username: "grace".to_string(),
            password: Password::from_hash("$argon2id$placeholder"),
            activated,
            role,
            preferences: String::new(),
            timestamps: Timestamps::created(chrono::Utc::now()),
        }
    }

    #[test]
    fn test_anonymous_fails_every_requirement() {
        for requirement in [
            Requirement::Authenticated,
            Requirement::Activated,
            Requirement::Role(UserRole::Admin),
        ] {
            assert_eq!(
                check(&Principal::Anonymous, &requirement),
                Err(Denial::NotAuthenticated)
            );
        }
    }

    #[test]
    fn test_inactive_user_is_authenticated_but_not_activated() {
        let principal = Principal::from(user(UserRole::Admin, false));

        assert_eq!(check(&principal, &Requirement::Authenticated), Ok(()));
        assert_eq!(
            check(&principal, &Requirement::Activated),
            Err(Denial::NotActivated)
        );
        assert_eq!(
            check(&principal, &Requirement::Role(UserRole::Admin)),
            Err(Denial::NotActivated)
        );
    }

    #[test]
    fn test_role_must_match_exactly() {
        let principal = Principal::from(user(UserRole::Admin, true));

        assert_eq!(check(&principal, &Requirement::Role(UserRole::Admin)), Ok(()));
        assert_eq!(
            check(&principal, &Requirement::Role(UserRole::B2b)),
            Err(Denial::WrongRole {
                required: UserRole::B2b,
                actual: UserRole::Admin,
            })
        );
    }

    fn gated(principal: Option<Principal>, requirement: Requirement) -> Router {
        let mut config = AppConfig::default();
        config.auth.login_redirect = "/login".to_string();
        let state = Arc::new(AppState::new(config, Models::in_memory()).unwrap());

        Router::new()
            .route("/inside", get(|| async { "inside" }))
            .route_layer(middleware::from_fn_with_state(
                state.clone(),
                require(requirement),
            ))
            .layer(middleware::from_fn(
                move |mut request: Request, next: Next| {
                    let principal = principal.clone();
                    async move {
                        if let Some(principal) = principal {
                            attach_principal(request.extensions_mut(), principal);
                        }
                        next.run(request).await
                    }
                },
            ))
            .with_state(state)
    }

    async fn call(app: Router) -> Response {
        app.oneshot(
            HttpRequest::builder()
                .uri("/inside")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_allowed_request_reaches_handler() {
        let principal = Principal::from(user(UserRole::Concierge, true));
        let response = call(gated(
            Some(principal),
            Requirement::Role(UserRole::Concierge),
        ))
        .await;

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_denied_request_is_redirected() {
        let response = call(gated(
            Some(Principal::Anonymous),
            Requirement::Authenticated,
        ))
        .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/login");
    }

    #[tokio::test]
    async fn test_missing_principal_is_internal_error() {
        let response = call(gated(None, Requirement::Authenticated)).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
