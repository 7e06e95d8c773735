//! Inbound traffic: company registration forms and client requests

use super::{Entity, Timestamps};
use serde::{Deserialize, Serialize};

/// A company asking to become a client, submitted from the landing page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RegForm {
    pub id: i64,
    pub company_name: String,
    pub email: String,
    pub phone_number: String,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub timestamps: Timestamps,
}

#[derive(Debug, Clone)]
pub struct NewRegForm {
    pub company_name: String,
    pub email: String,
    pub phone_number: String,
}

/// Something a client asked the concierge desk to arrange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Request {
    pub id: i64,
    pub client_id: i64,
    #[serde(rename = "type")]
    pub request_type: String,
    pub description: String,
    pub status: String,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub timestamps: Timestamps,
}

#[derive(Debug, Clone)]
pub struct NewRequest {
    pub client_id: i64,
    pub request_type: String,
    pub description: String,
    pub status: String,
}

impl Entity for RegForm {
    const TABLE: &'static str = "reg_forms";
    type New = NewRegForm;

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

impl Entity for Request {
    const TABLE: &'static str = "requests";
    type New = NewRequest;

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
