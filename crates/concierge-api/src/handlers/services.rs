//! Add-service form shared by the admin and concierge cabinets
//!
//! The form posts `name`, `description`, `service_type`, `company_id` and
//! any number of `user_type` / `price` pairs, one pair per client type.
//! Pairs with an empty price are skipped.

use super::page_context;
use crate::auth::Principal;
use crate::data::{CompanyStore, Models, NewPrice, NewService, Price, Service, UserRole};
use crate::error::AppError;
use crate::state::AppState;
use axum::response::Html;
use concierge_core::{ConciergeError, FieldErrors};
use serde::Serialize;

/// Client types a price can be set for
const PRICED_USER_TYPES: [UserRole; 3] = [UserRole::B2b, UserRole::B2c, UserRole::Partner];

/// A parsed and validated add-service submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSubmission {
    pub name: String,
    pub description: String,
    pub service_type: String,
    pub company_id: i64,
    pub prices: Vec<(UserRole, i32)>,
}

impl ServiceSubmission {
    /// Parse raw form pairs, keeping repeated keys in order
    pub fn from_fields(fields: Vec<(String, String)>) -> Result<Self, FieldErrors> {
        let mut name = String::new();
        let mut description = String::new();
        let mut service_type = String::new();
        let mut company_id = String::new();
        let mut user_types = Vec::new();
        let mut amounts = Vec::new();

        for (key, value) in fields {
            match key.as_str() {
                "name" => name = value.trim().to_string(),
                "description" => description = value.trim().to_string(),
                "service_type" => service_type = value.trim().to_string(),
                "company_id" => company_id = value,
                "user_type" => user_types.push(value),
                "price" => amounts.push(value),
                _ => {}
            }
        }

        let mut errors = FieldErrors::new();
        errors.check(!name.is_empty(), "name", "must be provided");
        errors.check(!service_type.is_empty(), "service_type", "must be provided");

        let company_id = company_id.trim().parse::<i64>().unwrap_or_else(|_| {
            errors.add("company_id", "must be a valid company id");
            0
        });

        errors.check(
            user_types.len() == amounts.len(),
            "price",
            "each price needs a user type",
        );

        let mut prices = Vec::new();
        for (user_type, amount) in user_types.iter().zip(&amounts) {
            let amount = amount.trim();
            if amount.is_empty() {
                continue;
            }

            let Ok(role) = user_type.parse::<UserRole>() else {
                errors.add("user_type", "must be a known user type");
                continue;
            };
            match amount.parse::<i32>() {
                Ok(value) if value >= 0 => prices.push((role, value)),
                _ => errors.add("price", "must be a whole number of at least 0"),
            }
        }

        errors.into_result()?;
        Ok(Self {
            name,
            description,
            service_type,
            company_id,
            prices,
        })
    }
}

/// Store the service, then one price row per pair
///
/// An unknown company is reported as a field error on `company_id`.
pub async fn save_service(
    models: &Models,
    created_by_id: i64,
    submission: ServiceSubmission,
) -> Result<(Service, Vec<Price>), AppError> {
    let service = models
        .insert_service_checked(NewService {
            name: submission.name,
            description: submission.description,
            service_type: submission.service_type,
            created_by_id,
            company_id: submission.company_id,
        })
        .await
        .map_err(|e| match e {
            ConciergeError::NotFound => {
                let mut errors = FieldErrors::new();
                errors.add("company_id", "no company with this id");
                AppError::Validation(errors)
            }
            other => AppError::from(other),
        })?;

    let mut prices = Vec::with_capacity(submission.prices.len());
    for (user_type, amount) in submission.prices {
        let price = models
            .insert_price_checked(NewPrice {
                service_id: service.id,
                amount,
                user_type: user_type.to_string(),
            })
            .await?;
        prices.push(price);
    }

    tracing::info!(
        service_id = service.id,
        company_id = service.company_id,
        prices = prices.len(),
        created_by = created_by_id,
        "service created"
    );

    Ok((service, prices))
}

#[derive(Serialize)]
struct CompanyOption {
    id: i64,
    name: String,
}

/// Render the empty form posting to `action`
pub async fn render_form(
    state: &AppState,
    principal: &Principal,
    action: &str,
) -> Result<Html<String>, AppError> {
    let companies: Vec<CompanyOption> = state
        .models
        .companies
        .list()
        .await?
        .into_iter()
        .map(|company| CompanyOption {
            id: company.id,
            name: company.name,
        })
        .collect();
    let user_types: Vec<&str> = PRICED_USER_TYPES.iter().map(|role| role.as_str()).collect();

    let mut context = page_context(principal);
    context.insert("action", action);
    context.insert("companies", &companies);
    context.insert("price_user_types", &user_types);
    Ok(state.templates.render("services_form.html", &context)?)
}

/// Validate, store and render the confirmation page linking back to `back`
pub async fn create_and_render(
    state: &AppState,
    principal: &Principal,
    fields: Vec<(String, String)>,
    back: &str,
) -> Result<Html<String>, AppError> {
    let created_by_id = principal
        .user()
        .map(|user| user.id)
        .ok_or_else(|| AppError::Internal("service submitted without a user".to_string()))?;

    let submission = ServiceSubmission::from_fields(fields)?;
    let (service, prices) = save_service(&state.models, created_by_id, submission).await?;

    let mut context = page_context(principal);
    context.insert("service", &service);
    context.insert("prices", &prices);
    context.insert("back", back);
    Ok(state.templates.render("service_created.html", &context)?)
}
