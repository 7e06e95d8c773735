//! In-process backend with the PostgreSQL contract
//!
//! Used by unit and integration tests. Unique constraints, soft-delete
//! filtering and token expiry behave as they do against the database.

use super::{
    Company, CompanyStore, Entity, Gateway, NewCompany, NewPrice, NewRegForm, NewRequest,
    NewService, NewUser, Price, PriceStore, RegForm, RegFormStore, Request, RequestStore, Service,
    ServiceStore, Timestamps, TokenStore, User, UserStore,
};
use crate::auth::token::{hash_token_plaintext, Token, TokenScope};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use concierge_core::{ConciergeError, Result};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// How a record is built from its insert fields
pub trait MemoryRecord: Entity {
    fn from_new(id: i64, new: Self::New, now: DateTime<Utc>) -> Self;

    /// `(constraint, value)` pairs that must be unique across the table
    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }
}

struct Rows<T> {
    next_id: i64,
    rows: BTreeMap<i64, T>,
}

pub struct MemoryTable<T> {
    inner: Mutex<Rows<T>>,
}

impl<T: MemoryRecord> Default for MemoryTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: MemoryRecord> MemoryTable<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Rows {
                next_id: 1,
                rows: BTreeMap::new(),
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Rows<T>>> {
        self.inner
            .lock()
            .map_err(|_| ConciergeError::Internal(format!("{} table lock poisoned", T::TABLE)))
    }

    /// Live rows matching `keep`, in id order
    pub fn select(&self, keep: impl Fn(&T) -> bool) -> Result<Vec<T>> {
        let rows = self.lock()?;
        Ok(rows
            .rows
            .values()
            .filter(|row| !row.is_deleted() && keep(row))
            .cloned()
            .collect())
    }

    fn first(&self, keep: impl Fn(&T) -> bool) -> Result<T> {
        self.select(keep)?
            .into_iter()
            .next()
            .ok_or(ConciergeError::NotFound)
    }

    /// Unique constraints apply to soft-deleted rows too, as in the database
    fn check_unique(rows: &Rows<T>, candidate: &T) -> Result<()> {
        let keys = candidate.unique_keys();
        if keys.is_empty() {
            return Ok(());
        }

        for existing in rows.rows.values() {
            if existing.id() == candidate.id() {
                continue;
            }
            for (constraint, value) in existing.unique_keys() {
                if keys.iter().any(|(c, v)| *c == constraint && *v == value) {
                    return Err(ConciergeError::DuplicateKey(constraint.to_string()));
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<T: MemoryRecord> Gateway<T> for MemoryTable<T> {
    async fn insert(&self, new: T::New) -> Result<T> {
        let mut rows = self.lock()?;
        let record = T::from_new(rows.next_id, new, Utc::now());
        Self::check_unique(&rows, &record)?;

        rows.next_id += 1;
        rows.rows.insert(record.id(), record.clone());
        Ok(record)
    }

    async fn get_by_id(&self, id: i64) -> Result<T> {
        let rows = self.lock()?;
        rows.rows
            .get(&id)
            .filter(|row| !row.is_deleted())
            .cloned()
            .ok_or(ConciergeError::NotFound)
    }

    async fn update(&self, record: &T) -> Result<T> {
        let mut rows = self.lock()?;
        let created_at = match rows.rows.get(&record.id()) {
            Some(existing) if !existing.is_deleted() => existing.timestamps().created_at,
            _ => return Err(ConciergeError::EditConflict),
        };
        Self::check_unique(&rows, record)?;

        let mut updated = record.clone();
        *updated.timestamps_mut() = Timestamps {
            created_at,
            updated_at: Some(Utc::now()),
            deleted_at: None,
        };
        rows.rows.insert(updated.id(), updated.clone());
        Ok(updated)
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let mut rows = self.lock()?;
        rows.rows
            .remove(&id)
            .map(|_| ())
            .ok_or(ConciergeError::NotFound)
    }

    async fn soft_delete(&self, id: i64) -> Result<()> {
        let mut rows = self.lock()?;
        match rows.rows.get_mut(&id) {
            Some(row) if !row.is_deleted() => {
                row.timestamps_mut().deleted_at = Some(Utc::now());
                Ok(())
            }
            _ => Err(ConciergeError::NotFound),
        }
    }

    async fn exists(&self, id: i64) -> Result<()> {
        self.get_by_id(id).await.map(|_| ())
    }
}

impl MemoryRecord for User {
    fn from_new(id: i64, new: NewUser, now: DateTime<Utc>) -> Self {
        Self {
            id,
            first_name: new.first_name,
            last_name: new.last_name,
            email: new.email,
            username: new.username,
            password: new.password,
            activated: new.activated,
            role: new.role,
            preferences: new.preferences,
            timestamps: Timestamps::created(now),
        }
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![
            ("users_email_key", self.email.clone()),
            ("users_username_key", self.username.clone()),
        ]
    }
}

#[async_trait]
impl UserStore for MemoryTable<User> {
    async fn get_by_email(&self, email: &str) -> Result<User> {
        self.first(|user| user.email == email)
    }

    async fn get_by_username(&self, username: &str) -> Result<User> {
        self.first(|user| user.username == username)
    }

    async fn list(&self) -> Result<Vec<User>> {
        self.select(|_| true)
    }
}

struct StoredToken {
    hash: Vec<u8>,
    user_id: i64,
    expiry: DateTime<Utc>,
    scope: TokenScope,
}

/// Token hashes joined against a shared user table on lookup
pub struct MemoryTokens {
    tokens: Mutex<Vec<StoredToken>>,
    users: Arc<MemoryTable<User>>,
}

impl MemoryTokens {
    pub fn new(users: Arc<MemoryTable<User>>) -> Self {
        Self {
            tokens: Mutex::new(Vec::new()),
            users,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<StoredToken>>> {
        self.tokens
            .lock()
            .map_err(|_| ConciergeError::Internal("tokens table lock poisoned".to_string()))
    }
}

#[async_trait]
impl TokenStore for MemoryTokens {
    async fn insert_token(&self, token: &Token) -> Result<()> {
        self.lock()?.push(StoredToken {
            hash: token.hash.clone(),
            user_id: token.user_id,
            expiry: token.expiry,
            scope: token.scope,
        });
        Ok(())
    }

    async fn lookup_user(&self, scope: TokenScope, plaintext: &str) -> Result<User> {
        let hash = hash_token_plaintext(plaintext);
        let now = Utc::now();

        let user_id = self
            .lock()?
            .iter()
            .find(|t| t.hash == hash && t.scope == scope && t.expiry > now)
            .map(|t| t.user_id)
            .ok_or(ConciergeError::NotFound)?;

        self.users.get_by_id(user_id).await
    }

    async fn delete_all_for_user(&self, scope: TokenScope, user_id: i64) -> Result<()> {
        self.lock()?
            .retain(|t| !(t.scope == scope && t.user_id == user_id));
        Ok(())
    }
}

impl MemoryRecord for Company {
    fn from_new(id: i64, new: NewCompany, now: DateTime<Utc>) -> Self {
        Self {
            id,
            code: new.code,
            name: new.name,
            full_name: new.full_name,
            timestamps: Timestamps::created(now),
        }
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![("companies_code_key", self.code.to_string())]
    }
}

#[async_trait]
impl CompanyStore for MemoryTable<Company> {
    async fn list(&self) -> Result<Vec<Company>> {
        let mut companies = self.select(|_| true)?;
        companies.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(companies)
    }
}

impl MemoryRecord for Service {
    fn from_new(id: i64, new: NewService, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: new.name,
            description: new.description,
            service_type: new.service_type,
            created_by_id: new.created_by_id,
            company_id: new.company_id,
            timestamps: Timestamps::created(now),
        }
    }
}

#[async_trait]
impl ServiceStore for MemoryTable<Service> {
    async fn list_for_company(&self, company_id: i64) -> Result<Vec<Service>> {
        self.select(|service| service.company_id == company_id)
    }
}

impl MemoryRecord for Price {
    fn from_new(id: i64, new: NewPrice, now: DateTime<Utc>) -> Self {
        Self {
            id,
            service_id: new.service_id,
            amount: new.amount,
            user_type: new.user_type,
            timestamps: Timestamps::created(now),
        }
    }
}

#[async_trait]
impl PriceStore for MemoryTable<Price> {
    async fn list_for_service(&self, service_id: i64) -> Result<Vec<Price>> {
        self.select(|price| price.service_id == service_id)
    }
}

impl MemoryRecord for RegForm {
    fn from_new(id: i64, new: NewRegForm, now: DateTime<Utc>) -> Self {
        Self {
            id,
            company_name: new.company_name,
            email: new.email,
            phone_number: new.phone_number,
            timestamps: Timestamps::created(now),
        }
    }
}

#[async_trait]
impl RegFormStore for MemoryTable<RegForm> {
    async fn list_newest_first(&self) -> Result<Vec<RegForm>> {
        let mut forms = self.select(|_| true)?;
        forms.reverse();
        Ok(forms)
    }
}

impl MemoryRecord for Request {
    fn from_new(id: i64, new: NewRequest, now: DateTime<Utc>) -> Self {
        Self {
            id,
            client_id: new.client_id,
            request_type: new.request_type,
            description: new.description,
            status: new.status,
            timestamps: Timestamps::created(now),
        }
    }
}

#[async_trait]
impl RequestStore for MemoryTable<Request> {
    async fn list_for_client(&self, client_id: i64) -> Result<Vec<Request>> {
        let mut requests = self.select(|request| request.client_id == client_id)?;
        requests.reverse();
        Ok(requests)
    }
}
