//! Authentication and authorization module
//!
//! This module provides session-based authentication with the following components:
//! - Password hashing with Argon2
//! - Opaque bearer tokens, stored only as SHA-256 hashes
//! - Server-side sessions holding the bearer
//! - Middleware resolving the bearer to a request principal
//! - Gates restricting routes to authenticated, activated or role-specific users

pub mod gate;
pub mod middleware;
pub mod password;
pub mod principal;
pub mod session;
pub mod token;

pub use gate::{
    check, require, require_activated, require_authenticated, require_role, Denial, Requirement,
};
pub use middleware::authenticate;
pub use password::{Password, PasswordConfig, PasswordError};
pub use principal::{attach_principal, principal_of, CurrentPrincipal, Principal};
pub use session::{clear_bearer, read_bearer, session_layer, store_bearer, BEARER_SESSION_KEY};
pub use token::{validate_plaintext_format, Token, TokenScope};
