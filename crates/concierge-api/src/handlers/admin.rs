//! Admin cabinet (`/my-cabinet-admin`)

use super::{page_context, services};
use crate::audit::{audit_log, extract_ip_address, AuditEvent};
use crate::auth::password::validate_password_plaintext;
use crate::auth::{CurrentPrincipal, Password, Token, TokenScope};
use crate::data::{
    users::{validate_new_user, validate_profile},
    Gateway, NewUser, RegFormStore, TokenStore, User, UserRole, UserStore,
};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse},
    Form, Json,
};
use concierge_core::{ConciergeError, FieldErrors};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const SERVICES_PATH: &str = "/my-cabinet-admin/services";

pub async fn cabinet(
    State(state): State<Arc<AppState>>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<Html<String>, AppError> {
    let users = state.models.users.list().await?;

    let mut context = page_context(&principal);
    context.insert("users", &users);
    Ok(state.templates.render("admin.html", &context)?)
}

/// Company registration requests, newest first
pub async fn registrations(
    State(state): State<Arc<AppState>>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<Html<String>, AppError> {
    let forms = state.models.reg_forms.list_newest_first().await?;

    let mut context = page_context(&principal);
    context.insert("forms", &forms);
    Ok(state.templates.render("admin_registrations.html", &context)?)
}

pub async fn service_form(
    State(state): State<Arc<AppState>>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<Html<String>, AppError> {
    services::render_form(&state, &principal, SERVICES_PATH).await
}

pub async fn create_service(
    State(state): State<Arc<AppState>>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Form(fields): Form<Vec<(String, String)>>,
) -> Result<Html<String>, AppError> {
    services::create_and_render(&state, &principal, fields, SERVICES_PATH).await
}

/// New account submitted by an admin
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    #[serde(alias = "firstname")]
    pub first_name: String,
    #[serde(alias = "lastname")]
    pub last_name: String,
    pub email: String,
    pub username: String,
    pub password: String,
    pub user_type: UserRole,
    #[serde(default)]
    pub preferences: String,
}

#[derive(Debug, Serialize)]
pub struct CreateUserResponse {
    pub user: User,
    pub activation_token: Token,
}

/// Create an inactive account and issue its activation token
///
/// # Responses
///
/// * `201 Created` - Account stored, activation token returned
/// * `422 Unprocessable Entity` - Invalid fields or email/username taken
/// * `500 Internal Server Error` - Server error
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    CurrentPrincipal(principal): CurrentPrincipal,
    headers: HeaderMap,
    Json(request): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut new_user = NewUser {
        first_name: request.first_name,
        last_name: request.last_name,
        email: request.email,
        username: request.username,
        password: Password::default(),
        activated: false,
        role: request.user_type,
        preferences: request.preferences,
    };
    // Field checks run before the password is hashed
    let mut errors = FieldErrors::new();
    validate_profile(&mut errors, &new_user);
    validate_password_plaintext(&mut errors, &request.password);
    errors.into_result()?;

    new_user.password.set(&request.password, &state.password)?;
    let mut errors = FieldErrors::new();
    validate_new_user(&mut errors, &new_user)?;
    errors.into_result()?;
    new_user.password.forget_plaintext();

    let user = state
        .models
        .users
        .insert(new_user)
        .await
        .map_err(|e| match e {
            ConciergeError::DuplicateKey(constraint) => duplicate_user(&constraint),
            other => AppError::from(other),
        })?;

    let activation_token = state
        .models
        .tokens
        .new_token(user.id, state.activation_ttl(), TokenScope::Activation)
        .await?;

    audit_log(&AuditEvent::UserCreated {
        user_id: user.id,
        email: user.email.clone(),
        role: user.role.to_string(),
        created_by: principal.user().map(|admin| admin.id).unwrap_or_default(),
        ip_address: extract_ip_address(&headers),
    });

    Ok((
        StatusCode::CREATED,
        Json(CreateUserResponse {
            user,
            activation_token,
        }),
    ))
}

fn duplicate_user(constraint: &str) -> AppError {
    let mut errors = FieldErrors::new();
    if constraint.contains("email") {
        errors.add("email", "a user with this email address already exists");
    } else if constraint.contains("username") {
        errors.add("username", "a user with this username already exists");
    } else {
        return AppError::Conflict(format!("duplicate value violates {constraint}"));
    }
    AppError::Validation(errors)
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Soft-delete an account and revoke its tokens
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, AppError> {
    if principal.user().is_some_and(|admin| admin.id == id) {
        return Err(AppError::BadRequest(
            "you cannot delete your own account".to_string(),
        ));
    }

    state.models.users.soft_delete(id).await?;
    for scope in [TokenScope::Authentication, TokenScope::Activation] {
        state.models.tokens.delete_all_for_user(scope, id).await?;
    }

    tracing::info!(user_id = id, "user deleted");
    Ok(Json(MessageResponse {
        message: "user successfully deleted".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{PasswordConfig, Principal};
    use crate::data::Models;
    use concierge_core::AppConfig;

    /// State whose password hashing always fails
    fn state_without_hashing() -> Arc<AppState> {
        let state = AppState::new(AppConfig::default(), Models::in_memory()).unwrap();
        Arc::new(state.with_password_config(PasswordConfig {
            memory_cost: 1,
            time_cost: 0,
            parallelism: 1,
            output_len: Some(32),
        }))
    }

    fn request(first_name: &str, password: &str) -> CreateUserRequest {
        CreateUserRequest {
            first_name: first_name.to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            username: "ada".to_string(),
            password: password.to_string(),
            user_type: UserRole::B2b,
            preferences: String::new(),
        }
    }

    #[tokio::test]
    async fn test_create_user_rejects_fields_before_hashing() {
        let result = create_user(
            State(state_without_hashing()),
            CurrentPrincipal(Principal::Anonymous),
            HeaderMap::new(),
            Json(request("", "short")),
        )
        .await;

        match result {
            Err(AppError::Validation(errors)) => {
                assert_eq!(errors.get("firstname"), Some("must be provided"));
                assert_eq!(errors.get("password"), Some("must be at least 8 bytes long"));
            }
            Err(other) => panic!("unexpected error: {other:?}"),
            Ok(_) => panic!("invalid user was created"),
        }
    }

    #[tokio::test]
    async fn test_create_user_hashes_only_valid_input() {
        let result = create_user(
            State(state_without_hashing()),
            CurrentPrincipal(Principal::Anonymous),
            HeaderMap::new(),
            Json(request("Ada", "pa55word!")),
        )
        .await;

        assert!(matches!(result, Err(AppError::Internal(_))));
    }

    #[test]
    fn test_duplicate_user_maps_constraints_to_fields() {
        match duplicate_user("users_email_key") {
            AppError::Validation(errors) => assert_eq!(
                errors.get("email"),
                Some("a user with this email address already exists")
            ),
            other => panic!("unexpected error: {other:?}"),
        }

        match duplicate_user("users_username_key") {
            AppError::Validation(errors) => assert!(errors.get("username").is_some()),
            other => panic!("unexpected error: {other:?}"),
        }

        assert!(matches!(
            duplicate_user("companies_code_key"),
            AppError::Conflict(_)
        ));
    }

    #[test]
    fn test_create_user_request_accepts_short_names() {
        let request: CreateUserRequest = serde_json::from_value(serde_json::json!({
            "firstname": "Ada",
            "lastname": "Lovelace",
            "email": "ada@example.com",
            "username": "ada",
            "password": "pa55word!",
            "user_type": "cs_employee"
        }))
        .unwrap();

        assert_eq!(request.first_name, "Ada");
        assert_eq!(request.user_type, UserRole::Concierge);
        assert!(request.preferences.is_empty());
    }
}
