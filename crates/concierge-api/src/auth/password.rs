/// Password credential hashing and verification using Argon2id
///
/// Implements the credential held by every user record:
/// - Algorithm: Argon2id (memory-hard, tunable cost)
/// - Salt: random per hash, embedded in the PHC string
/// - The plaintext is kept only for the lifetime of the value that set it,
///   so validation can inspect it; it is never serialized or persisted
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, Params,
};
use concierge_core::{FieldErrors, PasswordSettings};
use std::fmt;
use thiserror::Error;

/// Longest plaintext accepted from clients, in bytes
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Shortest plaintext accepted from clients, in bytes
pub const MIN_PASSWORD_BYTES: usize = 8;

/// Password hashing and verification errors
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashingFailed(String),

    #[error("Failed to verify password: {0}")]
    VerificationFailed(String),

    #[error("Invalid password hash format")]
    InvalidHashFormat,

    #[error("Password hash is missing")]
    MissingHash,
}

impl From<PasswordError> for concierge_core::ConciergeError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::MissingHash => Self::Internal("missing password hash for user".into()),
            other => Self::Hashing(other.to_string()),
        }
    }
}

/// Password hashing configuration
#[derive(Debug, Clone)]
pub struct PasswordConfig {
    /// Memory cost in KB (default: 65536 = 64 MB)
    pub memory_cost: u32,
    /// Time cost (iterations, default: 3)
    pub time_cost: u32,
    /// Parallelism (threads, default: 4)
    pub parallelism: u32,
    /// Output length in bytes (default: 32)
    pub output_len: Option<usize>,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self::from(&PasswordSettings::default())
    }
}

impl From<&PasswordSettings> for PasswordConfig {
    fn from(settings: &PasswordSettings) -> Self {
        Self {
            memory_cost: settings.memory_kib,
            time_cost: settings.iterations,
            parallelism: settings.parallelism,
            output_len: Some(32),
        }
    }
}

impl PasswordConfig {
    /// Create Argon2 parameters from this configuration
    fn to_params(&self) -> Result<Params, PasswordError> {
        Params::new(
            self.memory_cost,
            self.time_cost,
            self.parallelism,
            self.output_len,
        )
        .map_err(|e| PasswordError::HashingFailed(e.to_string()))
    }
}

/// A user's password credential
///
/// Holds the PHC-format hash. After [`Password::set`] it also holds the
/// plaintext it was derived from, which [`validate_password_plaintext`]
/// inspects before the record is stored.
#[derive(Clone, Default)]
pub struct Password {
    hash: String,
    plaintext: Option<String>,
}

impl Password {
    /// Wrap a hash loaded from storage
    pub fn from_hash(hash: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            plaintext: None,
        }
    }

    /// Hash `plaintext` with the given cost and keep both
    pub fn set(&mut self, plaintext: &str, config: &PasswordConfig) -> Result<(), PasswordError> {
        self.hash = hash_password_with_config(plaintext, config)?;
        self.plaintext = Some(plaintext.to_string());
        Ok(())
    }

    /// Convenience constructor around [`Password::set`]
    pub fn hashed(plaintext: &str, config: &PasswordConfig) -> Result<Self, PasswordError> {
        let mut password = Self::default();
        password.set(plaintext, config)?;
        Ok(password)
    }

    /// Check a candidate plaintext against the stored hash
    ///
    /// * `Ok(true)` - Password matches
    /// * `Ok(false)` - Wrong password
    /// * `Err(PasswordError)` - The hash itself is unusable; never a user error
    pub fn matches(&self, candidate: &str) -> Result<bool, PasswordError> {
        if self.hash.is_empty() {
            return Err(PasswordError::MissingHash);
        }
        verify_password(candidate, &self.hash)
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn plaintext(&self) -> Option<&str> {
        self.plaintext.as_deref()
    }

    pub fn is_set(&self) -> bool {
        !self.hash.is_empty()
    }

    /// Drop the transient plaintext
    pub fn forget_plaintext(&mut self) {
        self.plaintext = None;
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Password")
            .field("hash", &"**redacted**")
            .field("has_plaintext", &self.plaintext.is_some())
            .finish()
    }
}

/// Hash a password with custom configuration
///
/// # Returns
///
/// * `Ok(String)` - PHC string format hash
/// * `Err(PasswordError)` - If hashing fails
pub fn hash_password_with_config(
    password: &str,
    config: &PasswordConfig,
) -> Result<String, PasswordError> {
    // Generate a random salt
    let salt = SaltString::generate(&mut OsRng);

    let params = config.to_params()?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashingFailed(e.to_string()))?;

    Ok(password_hash.to_string())
}

/// Verify a plaintext password against a stored hash
///
/// Cost parameters are read back from the PHC string, so hashes produced
/// under an older configuration keep verifying.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| PasswordError::InvalidHashFormat)?;

    let argon2 = Argon2::default();

    match argon2.verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerificationFailed(e.to_string())),
    }
}

/// Record length problems with a client-supplied plaintext
pub fn validate_password_plaintext(errors: &mut FieldErrors, password: &str) {
    errors.check(!password.is_empty(), "password", "must be provided");
    errors.check(
        password.len() >= MIN_PASSWORD_BYTES,
        "password",
        "must be at least 8 bytes long",
    );
    errors.check(
        password.len() <= MAX_PASSWORD_BYTES,
        "password",
        "must not be more than 72 bytes long",
    );
}
