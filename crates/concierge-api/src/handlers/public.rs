//! Landing page and account entry points
//!
//! Everything here is reachable without signing in, except logout which
//! sits behind the authenticated gate.

use super::page_context;
use crate::audit::{audit_log, extract_ip_address, extract_user_agent, AuditEvent};
use crate::auth::{clear_bearer, store_bearer, validate_plaintext_format, CurrentPrincipal, TokenScope};
use crate::data::{Gateway, NewRegForm, TokenStore, User, UserRole, UserStore};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::{Html, Redirect},
    Form, Json,
};
use concierge_core::{ConciergeError, FieldErrors};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_sessions::Session;
use validator::Validate;

/// Where each kind of user lands after signing in
pub fn landing_page(role: UserRole) -> &'static str {
    match role {
        UserRole::Admin => "/my-cabinet-admin/",
        UserRole::Concierge => "/my-cabinet",
        UserRole::B2b => "/my-cabinet-b-client",
        UserRole::B2c | UserRole::Partner => "/",
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct IndexParams {
    #[serde(default)]
    pub submitted: bool,
}

pub async fn index(
    State(state): State<Arc<AppState>>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Query(params): Query<IndexParams>,
) -> Result<Html<String>, AppError> {
    let mut context = page_context(&principal);
    context.insert("submitted", &params.submitted);
    Ok(state.templates.render("index.html", &context)?)
}

/// Company registration request from the landing page
#[derive(Debug, Deserialize, Validate)]
pub struct RegistrationForm {
    #[validate(length(max = 500, message = "must not be more than 500 characters long"))]
    pub company_name: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(max = 50, message = "must not be more than 50 characters long"))]
    pub phone_number: String,
}

pub async fn submit_registration(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<RegistrationForm>,
) -> Result<Redirect, AppError> {
    let mut errors = FieldErrors::new();
    errors.check(
        !form.company_name.trim().is_empty(),
        "company_name",
        "must be provided",
    );
    errors.check(!form.email.is_empty(), "email", "must be provided");
    errors.check(
        !form.phone_number.trim().is_empty(),
        "phone_number",
        "must be provided",
    );
    errors.merge(FieldErrors::from_validation(form.validate()));
    errors.into_result()?;

    let reg_form = state
        .models
        .reg_forms
        .insert(NewRegForm {
            company_name: form.company_name.trim().to_string(),
            email: form.email,
            phone_number: form.phone_number.trim().to_string(),
        })
        .await?;

    audit_log(&AuditEvent::RegistrationSubmitted {
        reg_form_id: reg_form.id,
        email: reg_form.email.clone(),
        ip_address: extract_ip_address(&headers),
        user_agent: extract_user_agent(&headers),
    });

    Ok(Redirect::to("/?submitted=true"))
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginForm {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    pub password: String,
}

/// Sign in with email and password
///
/// On success a fresh authentication token is stored in the session and the
/// user is sent to their cabinet. Unknown email and wrong password produce
/// the same 401.
pub async fn login(
    State(state): State<Arc<AppState>>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Result<Redirect, AppError> {
    let mut errors = FieldErrors::new();
    errors.check(!form.email.is_empty(), "email", "must be provided");
    errors.check(!form.password.is_empty(), "password", "must be provided");
    errors.merge(FieldErrors::from_validation(form.validate()));
    errors.into_result()?;

    let user = match state.models.users.get_by_email(&form.email).await {
        Ok(user) => user,
        Err(ConciergeError::NotFound) => {
            return Err(login_failure(&headers, &form.email, "unknown email"));
        }
        Err(e) => return Err(e.into()),
    };

    if !user.password.matches(&form.password)? {
        return Err(login_failure(&headers, &form.email, "wrong password"));
    }

    let token = state
        .models
        .tokens
        .new_token(user.id, state.authentication_ttl(), TokenScope::Authentication)
        .await?;
    store_bearer(&session, &token.plaintext).await?;

    audit_log(&AuditEvent::LoginSuccess {
        user_id: user.id,
        email: user.email.clone(),
        role: user.role.to_string(),
        ip_address: extract_ip_address(&headers),
        user_agent: extract_user_agent(&headers),
    });

    Ok(Redirect::to(landing_page(user.role)))
}

fn login_failure(headers: &HeaderMap, email: &str, reason: &str) -> AppError {
    audit_log(&AuditEvent::LoginFailure {
        email: email.to_string(),
        reason: reason.to_string(),
        ip_address: extract_ip_address(headers),
        user_agent: extract_user_agent(headers),
    });
    AppError::InvalidCredentials
}

/// Sign out everywhere: every authentication token of the user is deleted
pub async fn logout(
    State(state): State<Arc<AppState>>,
    CurrentPrincipal(principal): CurrentPrincipal,
    session: Session,
    headers: HeaderMap,
) -> Result<Redirect, AppError> {
    if let Some(user) = principal.user() {
        state
            .models
            .tokens
            .delete_all_for_user(TokenScope::Authentication, user.id)
            .await?;

        audit_log(&AuditEvent::Logout {
            user_id: user.id,
            email: user.email.clone(),
            ip_address: extract_ip_address(&headers),
        });
    }

    clear_bearer(&session).await?;
    Ok(Redirect::to("/"))
}

#[derive(Debug, Deserialize)]
pub struct ActivationRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct ActivationResponse {
    pub user: User,
}

/// Redeem an activation token
///
/// Any token problem (format, scope, expiry, unknown) is the same field
/// error so the response does not reveal which check failed.
pub async fn activate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<ActivationRequest>,
) -> Result<Json<ActivationResponse>, AppError> {
    let invalid = || {
        let mut errors = FieldErrors::new();
        errors.add("token", "invalid or expired activation token");
        AppError::Validation(errors)
    };

    if !validate_plaintext_format(&request.token) {
        return Err(invalid());
    }

    let mut user = match state
        .models
        .tokens
        .lookup_user(TokenScope::Activation, &request.token)
        .await
    {
        Ok(user) => user,
        Err(ConciergeError::NotFound) => return Err(invalid()),
        Err(e) => return Err(e.into()),
    };

    user.activated = true;
    let user = state.models.users.update(&user).await?;

    state
        .models
        .tokens
        .delete_all_for_user(TokenScope::Activation, user.id)
        .await?;

    audit_log(&AuditEvent::AccountActivated {
        user_id: user.id,
        email: user.email.clone(),
        ip_address: extract_ip_address(&headers),
    });

    Ok(Json(ActivationResponse { user }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landing_pages() {
        assert_eq!(landing_page(UserRole::Admin), "/my-cabinet-admin/");
        assert_eq!(landing_page(UserRole::Concierge), "/my-cabinet");
        assert_eq!(landing_page(UserRole::B2b), "/my-cabinet-b-client");
        assert_eq!(landing_page(UserRole::B2c), "/");
        assert_eq!(landing_page(UserRole::Partner), "/");
    }

    #[test]
    fn test_registration_form_rules() {
        let form = RegistrationForm {
            company_name: "Acme Travel".to_string(),
            email: "not-an-email".to_string(),
            phone_number: "1".repeat(51),
        };

        let errors = FieldErrors::from_validation(form.validate());
        assert_eq!(errors.get("company_name"), None);
        assert_eq!(errors.get("email"), Some("must be a valid email address"));
        assert_eq!(
            errors.get("phone_number"),
            Some("must not be more than 50 characters long")
        );
    }

    #[test]
    fn test_login_form_rules() {
        let form = LoginForm {
            email: "ada@example.com".to_string(),
            password: "pa55word!".to_string(),
        };
        assert!(form.validate().is_ok());

        let form = LoginForm {
            email: "ada".to_string(),
            password: String::new(),
        };
        let errors = FieldErrors::from_validation(form.validate());
        assert_eq!(errors.get("email"), Some("must be a valid email address"));
    }
}
