//! The actor behind a request
//!
//! The authentication middleware attaches exactly one [`Principal`] to
//! every request it lets through. Handlers and gates read it back with
//! [`principal_of`] or the [`CurrentPrincipal`] extractor.

use crate::data::{User, UserRole};
use crate::error::AppError;
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts, http::Extensions};
use std::sync::Arc;

/// Who is making the request
#[derive(Debug, Clone)]
pub enum Principal {
    /// No valid session
    Anonymous,
    User(Arc<User>),
}

impl Principal {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Principal::Anonymous)
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Principal::Anonymous => None,
            Principal::User(user) => Some(user),
        }
    }

    pub fn is_activated(&self) -> bool {
        self.user().is_some_and(|user| user.activated)
    }

    pub fn role(&self) -> Option<UserRole> {
        self.user().map(|user| user.role)
    }
}

impl From<User> for Principal {
    fn from(user: User) -> Self {
        Principal::User(Arc::new(user))
    }
}

// Private key type: nothing outside this module can insert or shadow it.
#[derive(Clone)]
struct PrincipalSlot(Principal);

pub fn attach_principal(extensions: &mut Extensions, principal: Principal) {
    extensions.insert(PrincipalSlot(principal));
}

/// `None` means the authentication middleware did not run for this route
pub fn principal_of(extensions: &Extensions) -> Option<&Principal> {
    extensions.get::<PrincipalSlot>().map(|slot| &slot.0)
}

/// Extractor for the request's principal
///
/// A missing principal is a router wiring bug and is answered with 500.
pub struct CurrentPrincipal(pub Principal);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentPrincipal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match principal_of(&parts.extensions) {
            Some(principal) => Ok(CurrentPrincipal(principal.clone())),
            None => {
                tracing::error!(path = %parts.uri.path(), "no principal attached to request");
                Err(AppError::Internal(
                    "authentication middleware did not run".to_string(),
                ))
            }
        }
    }
}
