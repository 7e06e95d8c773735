//! Cookie-keyed server-side sessions
//!
//! The only value kept in a session is the plaintext of the user's
//! authentication token, under [`BEARER_SESSION_KEY`].

use concierge_core::SessionConfig;
use tower_sessions::{
    cookie::{time::Duration, SameSite},
    Expiry, Session, SessionManagerLayer, SessionStore,
};

/// Session key holding the authentication token plaintext
pub const BEARER_SESSION_KEY: &str = "Bearer";

/// Session layer over any backend
pub fn session_layer<S>(store: S, config: &SessionConfig) -> SessionManagerLayer<S>
where
    S: SessionStore + Clone,
{
    SessionManagerLayer::new(store)
        .with_name(config.cookie_name.clone())
        .with_secure(config.secure)
        .with_http_only(true)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(Duration::minutes(
            config.idle_timeout_mins,
        )))
}

/// Store a freshly issued token; the session id is rotated first
pub async fn store_bearer(
    session: &Session,
    plaintext: &str,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(BEARER_SESSION_KEY, plaintext).await
}

/// Token plaintext held by the session, if any
pub async fn read_bearer(session: &Session) -> Result<Option<String>, tower_sessions::session::Error> {
    session.get::<String>(BEARER_SESSION_KEY).await
}

/// Forget the token without ending the session
pub async fn clear_bearer(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.remove::<String>(BEARER_SESSION_KEY).await?;
    Ok(())
}
