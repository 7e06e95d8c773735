//! HTTP handlers, grouped by the cabinet they serve

pub mod admin;
pub mod b2b;
pub mod concierge;
pub mod health;
pub mod public;
pub mod services;

use crate::auth::Principal;
use tera::Context;

/// Template context with the signed-in user (if any) under `user`
pub(crate) fn page_context(principal: &Principal) -> Context {
    let mut context = Context::new();
    if let Some(user) = principal.user() {
        context.insert("user", user);
    }
    context
}
