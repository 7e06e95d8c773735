//! User accounts
//!
//! Staff and clients share one table; `user_type` decides which cabinet a
//! user may enter.

use super::{Entity, Timestamps};
use crate::auth::password::{validate_password_plaintext, Password, PasswordError};
use concierge_core::FieldErrors;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use validator::ValidateEmail;

/// Longest accepted first/last name, in bytes
pub const MAX_NAME_BYTES: usize = 500;

/// Account type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UserRole {
    #[serde(rename = "admin")]
    Admin,
    #[serde(rename = "cs_employee")]
    Concierge,
    #[serde(rename = "b2b")]
    B2b,
    #[serde(rename = "b2c")]
    B2c,
    #[serde(rename = "partner")]
    Partner,
}

impl UserRole {
    /// Convert role to its stored representation
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Concierge => "cs_employee",
            UserRole::B2b => "b2b",
            UserRole::B2c => "b2c",
            UserRole::Partner => "partner",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown user type: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for UserRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(UserRole::Admin),
            "cs_employee" => Ok(UserRole::Concierge),
            "b2b" => Ok(UserRole::B2b),
            "b2c" => Ok(UserRole::B2c),
            "partner" => Ok(UserRole::Partner),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// A stored account
///
/// The password hash is never serialized.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub username: String,
    #[serde(skip)]
    pub password: Password,
    pub activated: bool,
    #[serde(rename = "user_type")]
    pub role: UserRole,
    pub preferences: String,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

/// Fields for a new account; `password` must already be set
#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub username: String,
    pub password: Password,
    pub activated: bool,
    pub role: UserRole,
    pub preferences: String,
}

impl Entity for User {
    const TABLE: &'static str = "users";
    type New = NewUser;

    fn id(&self) -> i64 {
        self.id
    }

    fn timestamps(&self) -> &Timestamps {
        &self.timestamps
    }

    fn timestamps_mut(&mut self) -> &mut Timestamps {
        &mut self.timestamps
    }
}

pub fn validate_email(errors: &mut FieldErrors, email: &str) {
    errors.check(!email.is_empty(), "email", "must be provided");
    errors.check(
        email.validate_email(),
        "email",
        "must be a valid email address",
    );
}

/// Check everything about a new account except its password
pub fn validate_profile(errors: &mut FieldErrors, user: &NewUser) {
    errors.check(!user.first_name.is_empty(), "firstname", "must be provided");
    errors.check(
        user.first_name.len() <= MAX_NAME_BYTES,
        "firstname",
        "must not be more than 500 bytes long",
    );

    errors.check(!user.last_name.is_empty(), "lastname", "must be provided");
    errors.check(
        user.last_name.len() <= MAX_NAME_BYTES,
        "lastname",
        "must not be more than 500 bytes long",
    );

    validate_email(errors, &user.email);
    errors.check(!user.username.is_empty(), "username", "must be provided");
}

/// Collect client-facing problems with a new account
///
/// A missing hash means the caller never set a password; that is a bug in
/// the caller and comes back as `Err`, not as a field error.
pub fn validate_new_user(errors: &mut FieldErrors, user: &NewUser) -> Result<(), PasswordError> {
    validate_profile(errors, user);

    if let Some(plaintext) = user.password.plaintext() {
        validate_password_plaintext(errors, plaintext);
    }

    if !user.password.is_set() {
        return Err(PasswordError::MissingHash);
    }
    Ok(())
}
