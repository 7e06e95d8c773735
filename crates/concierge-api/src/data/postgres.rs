//! PostgreSQL backend
//!
//! Parameterized `sqlx` queries with `RETURNING` read-back. Every call runs
//! under the configured query timeout and fails with `Timeout` when it
//! expires; the statement is dropped, not retried.

use super::{
    Company, CompanyStore, Entity, Gateway, NewCompany, NewPrice, NewRegForm, NewRequest,
    NewService, NewUser, Price, PriceStore, RegForm, RegFormStore, Request, RequestStore, Service,
    ServiceStore, Timestamps, TokenStore, User, UserRole, UserStore,
};
use crate::auth::password::Password;
use crate::auth::token::{hash_token_plaintext, Token, TokenScope};
use async_trait::async_trait;
use chrono::Utc;
use concierge_core::{ConciergeError, Result};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Row};
use std::future::Future;
use std::marker::PhantomData;
use std::time::Duration;

/// Run `fut`, mapping store errors and the deadline into the core taxonomy
async fn bounded<F, R>(limit: Duration, fut: F) -> Result<R>
where
    F: Future<Output = sqlx::Result<R>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(ConciergeError::from),
        Err(_) => {
            tracing::warn!(timeout = ?limit, "query timed out");
            Err(ConciergeError::Timeout(limit))
        }
    }
}

/// Per-entity SQL that cannot be derived from the table name
#[async_trait]
pub trait PgRecord: Entity + for<'r> FromRow<'r, PgRow> + Send + Unpin {
    /// Column list in the order `FromRow` expects
    const COLUMNS: &'static str;

    async fn insert_row(pool: &PgPool, new: Self::New) -> sqlx::Result<Self>;

    /// `None` when no live row has this id
    async fn update_row(pool: &PgPool, record: &Self) -> sqlx::Result<Option<Self>>;
}

/// Table-backed store for one entity
pub struct PgTable<T> {
    pool: PgPool,
    timeout: Duration,
    _entity: PhantomData<fn() -> T>,
}

impl<T> PgTable<T> {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self {
            pool,
            timeout,
            _entity: PhantomData,
        }
    }
}

impl<T: PgRecord> PgTable<T> {
    async fn select_where(&self, filter: &str, order: &str) -> Result<Vec<T>> {
        let query = format!(
            "SELECT {} FROM {} WHERE deleted_at IS NULL {filter} ORDER BY {order}",
            T::COLUMNS,
            T::TABLE
        );
        bounded(
            self.timeout,
            sqlx::query_as::<_, T>(&query).fetch_all(&self.pool),
        )
        .await
    }
}

#[async_trait]
impl<T: PgRecord> Gateway<T> for PgTable<T> {
    async fn insert(&self, new: T::New) -> Result<T> {
        bounded(self.timeout, T::insert_row(&self.pool, new)).await
    }

    async fn get_by_id(&self, id: i64) -> Result<T> {
        let query = format!(
            "SELECT {} FROM {} WHERE id = $1 AND deleted_at IS NULL",
            T::COLUMNS,
            T::TABLE
        );
        bounded(
            self.timeout,
            sqlx::query_as::<_, T>(&query).bind(id).fetch_one(&self.pool),
        )
        .await
    }

    async fn update(&self, record: &T) -> Result<T> {
        bounded(self.timeout, T::update_row(&self.pool, record))
            .await?
            .ok_or(ConciergeError::EditConflict)
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let query = format!("DELETE FROM {} WHERE id = $1", T::TABLE);
        let result = bounded(
            self.timeout,
            sqlx::query(&query).bind(id).execute(&self.pool),
        )
        .await?;

        if result.rows_affected() == 0 {
            return Err(ConciergeError::NotFound);
        }
        Ok(())
    }

    async fn soft_delete(&self, id: i64) -> Result<()> {
        let query = format!(
            "UPDATE {} SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
            T::TABLE
        );
        let result = bounded(
            self.timeout,
            sqlx::query(&query).bind(id).execute(&self.pool),
        )
        .await?;

        if result.rows_affected() == 0 {
            return Err(ConciergeError::NotFound);
        }
        Ok(())
    }

    async fn exists(&self, id: i64) -> Result<()> {
        let query = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1 AND deleted_at IS NULL)",
            T::TABLE
        );
        let found = bounded(
            self.timeout,
            sqlx::query_scalar::<_, bool>(&query)
                .bind(id)
                .fetch_one(&self.pool),
        )
        .await?;

        if found {
            Ok(())
        } else {
            Err(ConciergeError::NotFound)
        }
    }
}

// ============================================================================
// Users
// ============================================================================

const USER_COLUMNS: &str = "id, first_name, last_name, email, username, password_hash, \
     activated, user_type, preferences, created_at, updated_at, deleted_at";

impl<'r> FromRow<'r, PgRow> for User {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let user_type: String = row.try_get("user_type")?;
        let role = user_type
            .parse::<UserRole>()
            .map_err(|e| sqlx::Error::ColumnDecode {
                index: "user_type".to_string(),
                source: Box::new(e),
            })?;

        Ok(Self {
            id: row.try_get("id")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            email: row.try_get("email")?,
            username: row.try_get("username")?,
            password: Password::from_hash(row.try_get::<String, _>("password_hash")?),
            activated: row.try_get("activated")?,
            role,
            preferences: row.try_get("preferences")?,
            timestamps: Timestamps::from_row(row)?,
        })
    }
}

#[async_trait]
impl PgRecord for User {
    const COLUMNS: &'static str = USER_COLUMNS;

    async fn insert_row(pool: &PgPool, new: NewUser) -> sqlx::Result<Self> {
        let query = format!(
            "INSERT INTO users (first_name, last_name, email, username, password_hash, \
             activated, user_type, preferences, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW()) \
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(&new.first_name)
            .bind(&new.last_name)
            .bind(&new.email)
            .bind(&new.username)
            .bind(new.password.hash())
            .bind(new.activated)
            .bind(new.role.as_str())
            .bind(&new.preferences)
            .fetch_one(pool)
            .await
    }

    async fn update_row(pool: &PgPool, user: &Self) -> sqlx::Result<Option<Self>> {
        let query = format!(
            "UPDATE users SET first_name = $2, last_name = $3, email = $4, username = $5, \
             password_hash = $6, activated = $7, user_type = $8, preferences = $9, \
             updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL \
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(user.id)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(&user.email)
            .bind(&user.username)
            .bind(user.password.hash())
            .bind(user.activated)
            .bind(user.role.as_str())
            .bind(&user.preferences)
            .fetch_optional(pool)
            .await
    }
}

#[async_trait]
impl UserStore for PgTable<User> {
    async fn get_by_email(&self, email: &str) -> Result<User> {
        let query =
            format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND deleted_at IS NULL");
        bounded(
            self.timeout,
            sqlx::query_as::<_, User>(&query)
                .bind(email)
                .fetch_one(&self.pool),
        )
        .await
    }

    async fn get_by_username(&self, username: &str) -> Result<User> {
        let query =
            format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1 AND deleted_at IS NULL");
        bounded(
            self.timeout,
            sqlx::query_as::<_, User>(&query)
                .bind(username)
                .fetch_one(&self.pool),
        )
        .await
    }

    async fn list(&self) -> Result<Vec<User>> {
        self.select_where("", "id").await
    }
}

/// Token hashes, joined against `users` on lookup
pub struct PgTokens {
    pool: PgPool,
    timeout: Duration,
}

impl PgTokens {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[async_trait]
impl TokenStore for PgTokens {
    async fn insert_token(&self, token: &Token) -> Result<()> {
        bounded(
            self.timeout,
            sqlx::query("INSERT INTO tokens (hash, user_id, expiry, scope) VALUES ($1, $2, $3, $4)")
                .bind(token.hash.as_slice())
                .bind(token.user_id)
                .bind(token.expiry)
                .bind(token.scope.as_str())
                .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn lookup_user(&self, scope: TokenScope, plaintext: &str) -> Result<User> {
        let hash = hash_token_plaintext(plaintext);
        let query = "SELECT users.id, first_name, last_name, email, username, password_hash, \
             activated, user_type, preferences, created_at, updated_at, deleted_at \
             FROM users \
             INNER JOIN tokens ON users.id = tokens.user_id \
             WHERE tokens.hash = $1 AND tokens.scope = $2 AND tokens.expiry > $3 \
             AND users.deleted_at IS NULL";

        bounded(
            self.timeout,
            sqlx::query_as::<_, User>(query)
                .bind(hash.as_slice())
                .bind(scope.as_str())
                .bind(Utc::now())
                .fetch_one(&self.pool),
        )
        .await
    }

    async fn delete_all_for_user(&self, scope: TokenScope, user_id: i64) -> Result<()> {
        bounded(
            self.timeout,
            sqlx::query("DELETE FROM tokens WHERE scope = $1 AND user_id = $2")
                .bind(scope.as_str())
                .bind(user_id)
                .execute(&self.pool),
        )
        .await?;
        Ok(())
    }
}

// ============================================================================
// Catalog
// ============================================================================

#[async_trait]
impl PgRecord for Company {
    const COLUMNS: &'static str = "id, code, name, full_name, created_at, updated_at, deleted_at";

    async fn insert_row(pool: &PgPool, new: NewCompany) -> sqlx::Result<Self> {
        let query = format!(
            "INSERT INTO companies (code, name, full_name, created_at) \
             VALUES ($1, $2, $3, NOW()) RETURNING {}",
            Self::COLUMNS
        );
        sqlx::query_as::<_, Company>(&query)
            .bind(new.code)
            .bind(&new.name)
            .bind(&new.full_name)
            .fetch_one(pool)
            .await
    }

    async fn update_row(pool: &PgPool, company: &Self) -> sqlx::Result<Option<Self>> {
        let query = format!(
            "UPDATE companies SET code = $2, name = $3, full_name = $4, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {}",
            Self::COLUMNS
        );
        sqlx::query_as::<_, Company>(&query)
            .bind(company.id)
            .bind(company.code)
            .bind(&company.name)
            .bind(&company.full_name)
            .fetch_optional(pool)
            .await
    }
}

#[async_trait]
impl CompanyStore for PgTable<Company> {
    async fn list(&self) -> Result<Vec<Company>> {
        self.select_where("", "name, id").await
    }
}

#[async_trait]
impl PgRecord for Service {
    const COLUMNS: &'static str = "id, name, description, service_type, created_by_id, \
         company_id, created_at, updated_at, deleted_at";

    async fn insert_row(pool: &PgPool, new: NewService) -> sqlx::Result<Self> {
        let query = format!(
            "INSERT INTO services (name, description, service_type, created_by_id, company_id, \
             created_at) VALUES ($1, $2, $3, $4, $5, NOW()) RETURNING {}",
            Self::COLUMNS
        );
        sqlx::query_as::<_, Service>(&query)
            .bind(&new.name)
            .bind(&new.description)
            .bind(&new.service_type)
            .bind(new.created_by_id)
            .bind(new.company_id)
            .fetch_one(pool)
            .await
    }

    async fn update_row(pool: &PgPool, service: &Self) -> sqlx::Result<Option<Self>> {
        let query = format!(
            "UPDATE services SET name = $2, description = $3, service_type = $4, \
             created_by_id = $5, company_id = $6, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {}",
            Self::COLUMNS
        );
        sqlx::query_as::<_, Service>(&query)
            .bind(service.id)
            .bind(&service.name)
            .bind(&service.description)
            .bind(&service.service_type)
            .bind(service.created_by_id)
            .bind(service.company_id)
            .fetch_optional(pool)
            .await
    }
}

#[async_trait]
impl ServiceStore for PgTable<Service> {
    async fn list_for_company(&self, company_id: i64) -> Result<Vec<Service>> {
        let query = format!(
            "SELECT {} FROM services WHERE company_id = $1 AND deleted_at IS NULL ORDER BY id",
            Service::COLUMNS
        );
        bounded(
            self.timeout,
            sqlx::query_as::<_, Service>(&query)
                .bind(company_id)
                .fetch_all(&self.pool),
        )
        .await
    }
}

#[async_trait]
impl PgRecord for Price {
    const COLUMNS: &'static str =
        "id, service_id, amount, user_type, created_at, updated_at, deleted_at";

    async fn insert_row(pool: &PgPool, new: NewPrice) -> sqlx::Result<Self> {
        let query = format!(
            "INSERT INTO prices (service_id, amount, user_type, created_at) \
             VALUES ($1, $2, $3, NOW()) RETURNING {}",
            Self::COLUMNS
        );
        sqlx::query_as::<_, Price>(&query)
            .bind(new.service_id)
            .bind(new.amount)
            .bind(&new.user_type)
            .fetch_one(pool)
            .await
    }

    async fn update_row(pool: &PgPool, price: &Self) -> sqlx::Result<Option<Self>> {
        let query = format!(
            "UPDATE prices SET service_id = $2, amount = $3, user_type = $4, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {}",
            Self::COLUMNS
        );
        sqlx::query_as::<_, Price>(&query)
            .bind(price.id)
            .bind(price.service_id)
            .bind(price.amount)
            .bind(&price.user_type)
            .fetch_optional(pool)
            .await
    }
}

#[async_trait]
impl PriceStore for PgTable<Price> {
    async fn list_for_service(&self, service_id: i64) -> Result<Vec<Price>> {
        let query = format!(
            "SELECT {} FROM prices WHERE service_id = $1 AND deleted_at IS NULL ORDER BY id",
            Price::COLUMNS
        );
        bounded(
            self.timeout,
            sqlx::query_as::<_, Price>(&query)
                .bind(service_id)
                .fetch_all(&self.pool),
        )
        .await
    }
}

// ============================================================================
// Intake
// ============================================================================

#[async_trait]
impl PgRecord for RegForm {
    const COLUMNS: &'static str =
        "id, company_name, email, phone_number, created_at, updated_at, deleted_at";

    async fn insert_row(pool: &PgPool, new: NewRegForm) -> sqlx::Result<Self> {
        let query = format!(
            "INSERT INTO reg_forms (company_name, email, phone_number, created_at) \
             VALUES ($1, $2, $3, NOW()) RETURNING {}",
            Self::COLUMNS
        );
        sqlx::query_as::<_, RegForm>(&query)
            .bind(&new.company_name)
            .bind(&new.email)
            .bind(&new.phone_number)
            .fetch_one(pool)
            .await
    }

    async fn update_row(pool: &PgPool, form: &Self) -> sqlx::Result<Option<Self>> {
        let query = format!(
            "UPDATE reg_forms SET company_name = $2, email = $3, phone_number = $4, \
             updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL RETURNING {}",
            Self::COLUMNS
        );
        sqlx::query_as::<_, RegForm>(&query)
            .bind(form.id)
            .bind(&form.company_name)
            .bind(&form.email)
            .bind(&form.phone_number)
            .fetch_optional(pool)
            .await
    }
}

#[async_trait]
impl RegFormStore for PgTable<RegForm> {
    async fn list_newest_first(&self) -> Result<Vec<RegForm>> {
        self.select_where("", "created_at DESC, id DESC").await
    }
}

#[async_trait]
impl PgRecord for Request {
    const COLUMNS: &'static str = "id, client_id, request_type, description, status, \
         created_at, updated_at, deleted_at";

    async fn insert_row(pool: &PgPool, new: NewRequest) -> sqlx::Result<Self> {
        let query = format!(
            "INSERT INTO requests (client_id, request_type, description, status, created_at) \
             VALUES ($1, $2, $3, $4, NOW()) RETURNING {}",
            Self::COLUMNS
        );
        sqlx::query_as::<_, Request>(&query)
            .bind(new.client_id)
            .bind(&new.request_type)
            .bind(&new.description)
            .bind(&new.status)
            .fetch_one(pool)
            .await
    }

    async fn update_row(pool: &PgPool, request: &Self) -> sqlx::Result<Option<Self>> {
        let query = format!(
            "UPDATE requests SET request_type = $2, description = $3, status = $4, \
             updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL RETURNING {}",
            Self::COLUMNS
        );
        sqlx::query_as::<_, Request>(&query)
            .bind(request.id)
            .bind(&request.request_type)
            .bind(&request.description)
            .bind(&request.status)
            .fetch_optional(pool)
            .await
    }
}

#[async_trait]
impl RequestStore for PgTable<Request> {
    async fn list_for_client(&self, client_id: i64) -> Result<Vec<Request>> {
        let query = format!(
            "SELECT {} FROM requests WHERE client_id = $1 AND deleted_at IS NULL \
             ORDER BY created_at DESC, id DESC",
            Request::COLUMNS
        );
        bounded(
            self.timeout,
            sqlx::query_as::<_, Request>(&query)
                .bind(client_id)
                .fetch_all(&self.pool),
        )
        .await
    }
}
