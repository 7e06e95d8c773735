//! Session-based authentication middleware
//!
//! Resolves the bearer token stored in the request's session to a user and
//! attaches the resulting [`Principal`] to the request extensions. Requests
//! without a session or without a bearer continue as [`Principal::Anonymous`];
//! deciding whether that is acceptable is left to the gates in
//! [`crate::auth::gate`].
//!
//! Must run inside the session layer. Outside it every request is anonymous.

use super::principal::{attach_principal, Principal};
use super::session::{clear_bearer, read_bearer};
use super::token::{validate_plaintext_format, TokenScope};
use crate::audit::{audit_log, extract_ip_address, extract_user_agent, AuditEvent};
use crate::data::TokenStore;
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use concierge_core::ConciergeError;
use std::sync::Arc;
use tower_sessions::Session;
use tracing::warn;

/// Authentication middleware
///
/// 1. Read the bearer from the session (a broken session counts as none)
/// 2. No bearer: continue as anonymous
/// 3. Malformed bearer: 401
/// 4. Bearer matching no live authentication token: 401; store failure: 500
/// 5. Attach the owning user and continue
///
/// A rejected bearer is removed from the session so the next request starts
/// out anonymous instead of failing again.
///
/// # Usage
///
/// ```ignore
/// let app = Router::new()
///     .route("/my-cabinet", get(handler))
///     .layer(middleware::from_fn_with_state(state.clone(), authenticate))
///     .layer(session_layer(MemoryStore::default(), &config.session));
/// ```
pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let session = request.extensions().get::<Session>().cloned();

    let bearer = match &session {
        Some(session) => read_bearer(session).await.unwrap_or_else(|e| {
            warn!(error = %e, "session unreadable, continuing anonymously");
            None
        }),
        None => None,
    };

    let Some(bearer) = bearer else {
        attach_principal(request.extensions_mut(), Principal::Anonymous);
        return next.run(request).await;
    };

    let ip_address = extract_ip_address(request.headers());
    let user_agent = extract_user_agent(request.headers());

    if !validate_plaintext_format(&bearer) {
        audit_log(&AuditEvent::InvalidToken {
            ip_address,
            user_agent,
            reason: "malformed token".to_string(),
        });
        return reject(session.as_ref()).await;
    }

    match state
        .models
        .tokens
        .lookup_user(TokenScope::Authentication, &bearer)
        .await
    {
        Ok(user) => {
            attach_principal(request.extensions_mut(), Principal::from(user));
            next.run(request).await
        }
        Err(ConciergeError::NotFound) => {
            audit_log(&AuditEvent::InvalidToken {
                ip_address,
                user_agent,
                reason: "unknown or expired token".to_string(),
            });
            reject(session.as_ref()).await
        }
        Err(e) => AppError::Internal(format!("token lookup failed: {e}")).into_response(),
    }
}

async fn reject(session: Option<&Session>) -> Response {
    if let Some(session) = session {
        if let Err(e) = clear_bearer(session).await {
            warn!(error = %e, "failed to clear rejected bearer from session");
        }
    }

    AppError::InvalidToken.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::Password;
    use crate::auth::principal::CurrentPrincipal;
    use crate::auth::session::{session_layer, store_bearer};
    use crate::auth::token::Token;
    use crate::data::{Gateway, Models, NewUser, User, UserRole};
    use axum::{
        body::Body,
        extract::Path,
        http::{header, Request as HttpRequest, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use concierge_core::AppConfig;
    use tower::ServiceExt;
    use tower_sessions::MemoryStore;

    fn state() -> Arc<AppState> {
        Arc::new(AppState::new(AppConfig::default(), Models::in_memory()).unwrap())
    }

    async fn whoami(CurrentPrincipal(principal): CurrentPrincipal) -> String {
        match principal.user() {
            Some(user) => user.email.clone(),
            None => "anonymous".to_string(),
        }
    }

    async fn plant(session: Session, Path(bearer): Path<String>) -> StatusCode {
        store_bearer(&session, &bearer).await.unwrap();
        StatusCode::NO_CONTENT
    }

    fn app(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/whoami", get(whoami))
            .route("/plant/:bearer", get(plant))
            .layer(middleware::from_fn_with_state(state.clone(), authenticate))
            .layer(session_layer(
                MemoryStore::default(),
                &state.config.session,
            ))
            .with_state(state)
    }

    fn get_with_cookie(uri: &str, cookie: Option<&str>) -> HttpRequest<Body> {
        let mut builder = HttpRequest::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn session_cookie(response: &Response) -> String {
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .expect("session cookie")
            .to_str()
            .unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_no_cookie_is_anonymous() {
        let response = app(state())
            .oneshot(get_with_cookie("/whoami", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "anonymous");
    }

    #[tokio::test]
    async fn test_without_session_layer_is_anonymous() {
        let state = state();
        let app = Router::new()
            .route("/whoami", get(whoami))
            .layer(middleware::from_fn_with_state(state.clone(), authenticate))
            .with_state(state);

        let response = app
            .oneshot(get_with_cookie("/whoami", None))
            .await
            .unwrap();
        assert_eq!(body_text(response).await, "anonymous");
    }

    #[tokio::test]
    async fn test_malformed_bearer_is_rejected_then_cleared() {
        let app = app(state());

        let planted = app
            .clone()
            .oneshot(get_with_cookie("/plant/not-a-token", None))
            .await
            .unwrap();
        let cookie = session_cookie(&planted);

        let rejected = app
            .clone()
            .oneshot(get_with_cookie("/whoami", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(rejected.status(), StatusCode::UNAUTHORIZED);

        let after = app
            .oneshot(get_with_cookie("/whoami", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(after.status(), StatusCode::OK);
        assert_eq!(body_text(after).await, "anonymous");
    }

    #[tokio::test]
    async fn test_unknown_well_formed_bearer_is_rejected() {
        let app = app(state());
        let unknown = "A".repeat(43);

        let planted = app
            .clone()
            .oneshot(get_with_cookie(&format!("/plant/{unknown}"), None))
            .await
            .unwrap();
        let cookie = session_cookie(&planted);

        let response = app
            .oneshot(get_with_cookie("/whoami", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_valid_bearer_attaches_user() {
        let state = state();
        let user = state
            .models
            .users
            .insert(NewUser {
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                email: "ada@example.com".to_string(),
                username: "ada".to_string(),
                password: Password::from_hash("$argon2id$placeholder"),
                activated: true,
                role: UserRole::B2b,
                preferences: String::new(),
            })
            .await
            .unwrap();
        let token = state
            .models
            .tokens
            .new_token(
                user.id,
                chrono::Duration::hours(1),
                TokenScope::Authentication,
            )
            .await
            .unwrap();

        let app = app(state);
        let planted = app
            .clone()
            .oneshot(get_with_cookie(&format!("/plant/{}", token.plaintext), None))
            .await
            .unwrap();
        let cookie = session_cookie(&planted);

        let response = app
            .oneshot(get_with_cookie("/whoami", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "ada@example.com");
    }

    /// Token store whose every lookup times out
    struct UnreachableTokens;

    #[async_trait::async_trait]
    impl TokenStore for UnreachableTokens {
        async fn insert_token(&self, _token: &Token) -> concierge_core::Result<()> {
            Ok(())
        }

        async fn lookup_user(
            &self,
            _scope: TokenScope,
            _plaintext: &str,
        ) -> concierge_core::Result<User> {
            Err(ConciergeError::Timeout(std::time::Duration::from_secs(3)))
        }

        async fn delete_all_for_user(
            &self,
            _scope: TokenScope,
            _user_id: i64,
        ) -> concierge_core::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_token_store_failure_is_500_without_principal() {
        let mut models = Models::in_memory();
        models.tokens = Arc::new(UnreachableTokens);
        let state = Arc::new(AppState::new(AppConfig::default(), models).unwrap());
        let app = app(state);

        let planted = app
            .clone()
            .oneshot(get_with_cookie(&format!("/plant/{}", "A".repeat(43)), None))
            .await
            .unwrap();
        let cookie = session_cookie(&planted);

        let response = app
            .oneshot(get_with_cookie("/whoami", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_text(response).await;
        assert!(!body.contains("anonymous"));
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["code"], "INTERNAL_ERROR");
    }

    #[tokio::test]
    async fn test_activation_token_does_not_authenticate() {
        let state = state();
        let user = state
            .models
            .users
            .insert(NewUser {
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                email: "ada@example.com".to_string(),
                username: "ada".to_string(),
                password: Password::from_hash("$argon2id$placeholder"),
                activated: false,
                role: UserRole::B2b,
                preferences: String::new(),
            })
            .await
            .unwrap();
        let token = state
            .models
            .tokens
            .new_token(user.id, chrono::Duration::hours(1), TokenScope::Activation)
            .await
            .unwrap();

        let app = app(state);
        let planted = app
            .clone()
            .oneshot(get_with_cookie(&format!("/plant/{}", token.plaintext), None))
            .await
            .unwrap();
        let cookie = session_cookie(&planted);

        let response = app
            .oneshot(get_with_cookie("/whoami", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
