//! Companies, the services they provide and per-user-type prices

use super::{Entity, Timestamps};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Company {
    pub id: i64,
    pub code: i32,
    pub name: String,
    pub full_name: String,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub timestamps: Timestamps,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCompany {
    pub code: i32,
    pub name: String,
    pub full_name: String,
}

/// A bookable service offered by a company
///
/// `company_id` and `created_by_id` are plain references; callers that
/// need the company to exist use `Models::insert_service_checked`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Service {
    pub id: i64,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub service_type: String,
    pub created_by_id: i64,
    pub company_id: i64,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub timestamps: Timestamps,
}

#[derive(Debug, Clone)]
pub struct NewService {
    pub name: String,
    pub description: String,
    pub service_type: String,
    pub created_by_id: i64,
    pub company_id: i64,
}

/// Price of a service for one kind of client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Price {
    pub id: i64,
    pub service_id: i64,
    pub amount: i32,
    pub user_type: String,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub timestamps: Timestamps,
}

#[derive(Debug, Clone)]
pub struct NewPrice {
    pub service_id: i64,
    pub amount: i32,
    pub user_type: String,
}

impl Entity for Company {
    const TABLE: &'static str = "companies";
    type New = NewCompany;

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

impl Entity for Service {
    const TABLE: &'static str = "services";
    type New = NewService;

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

impl Entity for Price {
    const TABLE: &'static str = "prices";
    type New = NewPrice;

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
