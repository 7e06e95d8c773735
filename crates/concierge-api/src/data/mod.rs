//! Persistence gateway
//!
//! Every entity gets the same contract ([`Gateway`]): insert with read-back,
//! fetch by id, update, hard delete, soft delete and an existence probe.
//! Reads never return soft-deleted rows. Entity-specific queries live on
//! small extension traits so handlers can depend on `Arc<dyn …>` and the
//! backend can be swapped for tests.
//!
//! Backends:
//! - [`postgres`]: `sqlx` against PostgreSQL, every call bounded by a timeout
//! - `memory`: the same contract over in-process maps (test builds only)

pub mod catalog;
pub mod intake;
pub mod postgres;
pub mod users;

#[cfg(any(test, feature = "test-utils"))]
pub mod memory;

pub use catalog::{Company, NewCompany, NewPrice, NewService, Price, Service};
pub use intake::{NewRegForm, NewRequest, RegForm, Request};
pub use users::{NewUser, User, UserRole};

use crate::auth::token::{Token, TokenScope};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use concierge_core::Result;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;

/// Bookkeeping columns shared by every table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Timestamps {
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Timestamps {
    pub fn created(now: DateTime<Utc>) -> Self {
        Self {
            created_at: now,
            updated_at: None,
            deleted_at: None,
        }
    }
}

/// A persisted record
pub trait Entity: Clone + Send + Sync + 'static {
    /// Table the record lives in
    const TABLE: &'static str;

    /// Fields a caller supplies on insert
    type New: Send + Sync + 'static;

    fn id(&self) -> i64;

    fn timestamps(&self) -> &Timestamps;

    fn timestamps_mut(&mut self) -> &mut Timestamps;

    fn is_deleted(&self) -> bool {
        self.timestamps().deleted_at.is_some()
    }
}

/// CRUD contract shared by every entity
///
/// Zero rows matched is never success: `get_by_id`, `delete`, `soft_delete`
/// and `exists` fail with `NotFound`, `update` with `EditConflict`.
#[async_trait]
pub trait Gateway<T: Entity>: Send + Sync {
    /// Insert and return the stored row; unique violations are `DuplicateKey`
    async fn insert(&self, new: T::New) -> Result<T>;

    async fn get_by_id(&self, id: i64) -> Result<T>;

    /// Overwrite a live row and return it with a fresh `updated_at`
    async fn update(&self, record: &T) -> Result<T>;

    /// Remove the row outright
    async fn delete(&self, id: i64) -> Result<()>;

    /// Stamp `deleted_at`; repeating it on the same row is `NotFound`
    async fn soft_delete(&self, id: i64) -> Result<()>;

    /// `Ok(())` when a live row exists
    async fn exists(&self, id: i64) -> Result<()>;
}

#[async_trait]
pub trait UserStore: Gateway<User> {
    async fn get_by_email(&self, email: &str) -> Result<User>;

    async fn get_by_username(&self, username: &str) -> Result<User>;

    async fn list(&self) -> Result<Vec<User>>;
}

/// Bearer token persistence
///
/// Only token hashes are stored. Lookups match on hash, scope and an
/// unexpired `expiry`; any mismatch is the same `NotFound`.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn insert_token(&self, token: &Token) -> Result<()>;

    /// Issue a token for `user_id` and store its hash
    async fn new_token(&self, user_id: i64, ttl: Duration, scope: TokenScope) -> Result<Token> {
        let token = Token::generate(user_id, ttl, scope);
        self.insert_token(&token).await?;
        Ok(token)
    }

    /// Resolve the live user owning `plaintext` in `scope`
    async fn lookup_user(&self, scope: TokenScope, plaintext: &str) -> Result<User>;

    async fn delete_all_for_user(&self, scope: TokenScope, user_id: i64) -> Result<()>;
}

#[async_trait]
pub trait CompanyStore: Gateway<Company> {
    async fn list(&self) -> Result<Vec<Company>>;
}

#[async_trait]
pub trait ServiceStore: Gateway<Service> {
    async fn list_for_company(&self, company_id: i64) -> Result<Vec<Service>>;
}

#[async_trait]
pub trait PriceStore: Gateway<Price> {
    async fn list_for_service(&self, service_id: i64) -> Result<Vec<Price>>;
}

#[async_trait]
pub trait RegFormStore: Gateway<RegForm> {
    async fn list_newest_first(&self) -> Result<Vec<RegForm>>;
}

#[async_trait]
pub trait RequestStore: Gateway<Request> {
    async fn list_for_client(&self, client_id: i64) -> Result<Vec<Request>>;
}

/// One store per entity, shared by every handler
#[derive(Clone)]
pub struct Models {
    pub users: Arc<dyn UserStore>,
    pub tokens: Arc<dyn TokenStore>,
    pub companies: Arc<dyn CompanyStore>,
    pub services: Arc<dyn ServiceStore>,
    pub prices: Arc<dyn PriceStore>,
    pub reg_forms: Arc<dyn RegFormStore>,
    pub requests: Arc<dyn RequestStore>,
}

impl Models {
    /// PostgreSQL-backed stores; each query is cut off after `query_timeout`
    pub fn postgres(pool: PgPool, query_timeout: std::time::Duration) -> Self {
        use self::postgres::{PgTable, PgTokens};

        Self {
            users: Arc::new(PgTable::<User>::new(pool.clone(), query_timeout)),
            tokens: Arc::new(PgTokens::new(pool.clone(), query_timeout)),
            companies: Arc::new(PgTable::<Company>::new(pool.clone(), query_timeout)),
            services: Arc::new(PgTable::<Service>::new(pool.clone(), query_timeout)),
            prices: Arc::new(PgTable::<Price>::new(pool.clone(), query_timeout)),
            reg_forms: Arc::new(PgTable::<RegForm>::new(pool.clone(), query_timeout)),
            requests: Arc::new(PgTable::<Request>::new(pool, query_timeout)),
        }
    }

    /// Process-local stores with the same semantics
    #[cfg(any(test, feature = "test-utils"))]
    pub fn in_memory() -> Self {
        use self::memory::{MemoryTable, MemoryTokens};

        let users = Arc::new(MemoryTable::<User>::new());
        Self {
            tokens: Arc::new(MemoryTokens::new(users.clone())),
            users,
            companies: Arc::new(MemoryTable::<Company>::new()),
            services: Arc::new(MemoryTable::<Service>::new()),
            prices: Arc::new(MemoryTable::<Price>::new()),
            reg_forms: Arc::new(MemoryTable::<RegForm>::new()),
            requests: Arc::new(MemoryTable::<Request>::new()),
        }
    }

    /// Insert a service after confirming its company exists
    pub async fn insert_service_checked(&self, new: NewService) -> Result<Service> {
        self.companies.exists(new.company_id).await?;
        self.services.insert(new).await
    }

    /// Insert a price after confirming its service exists
    pub async fn insert_price_checked(&self, new: NewPrice) -> Result<Price> {
        self.services.exists(new.service_id).await?;
        self.prices.insert(new).await
    }
}
