//! Opaque bearer tokens
//!
//! A token is 32 random bytes encoded as unpadded URL-safe base64. Only the
//! SHA-256 digest of the plaintext is stored; the plaintext is handed to
//! the client once, at creation.

use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Encoded length of a token plaintext
pub const TOKEN_PLAINTEXT_LEN: usize = 43;

const TOKEN_BYTES: usize = 32;

/// What a token may be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenScope {
    Authentication,
    Activation,
}

impl TokenScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenScope::Authentication => "authentication",
            TokenScope::Activation => "activation",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "authentication" => Some(TokenScope::Authentication),
            "activation" => Some(TokenScope::Activation),
            _ => None,
        }
    }
}

impl fmt::Display for TokenScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A freshly issued token
///
/// `plaintext` exists only on the value returned from [`Token::generate`];
/// nothing reads it back from storage.
#[derive(Clone, Serialize)]
pub struct Token {
    #[serde(rename = "token")]
    pub plaintext: String,
    #[serde(skip)]
    pub hash: Vec<u8>,
    #[serde(skip)]
    pub user_id: i64,
    pub expiry: DateTime<Utc>,
    #[serde(skip)]
    pub scope: TokenScope,
}

impl Token {
    /// Create a token for `user_id` that expires `ttl` from now
    pub fn generate(user_id: i64, ttl: Duration, scope: TokenScope) -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);

        let plaintext = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes);
        let hash = hash_token_plaintext(&plaintext);

        Self {
            plaintext,
            hash,
            user_id,
            expiry: Utc::now() + ttl,
            scope,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry <= now
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("plaintext", &"**redacted**")
            .field("user_id", &self.user_id)
            .field("expiry", &self.expiry)
            .field("scope", &self.scope)
            .finish()
    }
}

/// SHA-256 digest of a token plaintext, as stored
pub fn hash_token_plaintext(plaintext: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(plaintext.as_bytes());
    hasher.finalize().to_vec()
}

/// Cheap shape check run before any lookup
pub fn validate_plaintext_format(plaintext: &str) -> bool {
    plaintext.len() == TOKEN_PLAINTEXT_LEN
        && plaintext
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
