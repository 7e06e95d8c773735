//! Business client cabinet (`/my-cabinet-b-client`)

use super::page_context;
use crate::auth::CurrentPrincipal;
use crate::data::RequestStore;
use crate::error::AppError;
use crate::state::AppState;
use axum::{extract::State, response::Html};
use std::sync::Arc;

pub async fn cabinet(
    State(state): State<Arc<AppState>>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<Html<String>, AppError> {
    let requests = match principal.user() {
        Some(user) => state.models.requests.list_for_client(user.id).await?,
        None => Vec::new(),
    };

    let mut context = page_context(&principal);
    context.insert("requests", &requests);
    Ok(state.templates.render("b2b.html", &context)?)
}
