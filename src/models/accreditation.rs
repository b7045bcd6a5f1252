//! Accreditation model
//!
//! An accreditation always belongs to an existing program and disappears
//! with it.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::Program;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Accreditation {
    pub id: i64,
    pub program_id: i64,
    /// Name of the owning program (read-only, joined on load)
    pub program_name: String,
    pub name: String,
    pub organization: String,
    pub date_received: NaiveDate,
    pub expiration_date: NaiveDate,
    pub certificate_number: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An accreditation with its program embedded
#[derive(Debug, Clone, Serialize)]
pub struct AccreditationDetail {
    #[serde(flatten)]
    pub accreditation: Accreditation,
    pub program: Program,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAccreditationInput {
    pub program_id: i64,
    pub name: String,
    pub organization: String,
    pub date_received: NaiveDate,
    pub expiration_date: NaiveDate,
    pub certificate_number: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAccreditationInput {
    pub program_id: Option<i64>,
    pub name: Option<String>,
    pub organization: Option<String>,
    pub date_received: Option<NaiveDate>,
    pub expiration_date: Option<NaiveDate>,
    pub certificate_number: Option<String>,
    pub description: Option<String>,
}

impl From<CreateAccreditationInput> for UpdateAccreditationInput {
    fn from(input: CreateAccreditationInput) -> Self {
        Self {
            program_id: Some(input.program_id),
            name: Some(input.name),
            organization: Some(input.organization),
            date_received: Some(input.date_received),
            expiration_date: Some(input.expiration_date),
            certificate_number: Some(input.certificate_number),
            description: Some(input.description),
        }
    }
}
