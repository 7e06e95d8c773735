//! Concierge employee cabinet (`/my-cabinet`)

use super::{page_context, services};
use crate::auth::CurrentPrincipal;
use crate::data::{CompanyStore, Gateway};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    response::Html,
    Form,
};
use std::sync::Arc;

const SERVICES_PATH: &str = "/my-cabinet/services";

pub async fn cabinet(
    State(state): State<Arc<AppState>>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<Html<String>, AppError> {
    let companies = state.models.companies.list().await?;

    let mut context = page_context(&principal);
    context.insert("companies", &companies);
    Ok(state.templates.render("concierge.html", &context)?)
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

/// A single client request
pub async fn request(
    State(state): State<Arc<AppState>>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<i64>,
) -> Result<Html<String>, AppError> {
    let request = state.models.requests.get_by_id(id).await?;

    let mut context = page_context(&principal);
    context.insert("request", &request);
    Ok(state.templates.render("request.html", &context)?)
}
