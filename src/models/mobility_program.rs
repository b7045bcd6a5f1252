//! Mobility (exchange) program model

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::program::default_true;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MobilityProgram {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub host_institution: String,
    pub country: String,
    pub city: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub application_deadline: NaiveDate,
    pub requirements: String,
    pub benefits: String,
    pub contact_email: String,
    pub website: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateMobilityProgramInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub host_institution: String,
    pub country: String,
    pub city: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub application_deadline: NaiveDate,
    #[serde(default)]
    pub requirements: String,
    #[serde(default)]
    pub benefits: String,
    pub contact_email: String,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Partial update. An empty `website` clears the field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateMobilityProgramInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub host_institution: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub application_deadline: Option<NaiveDate>,
    pub requirements: Option<String>,
    pub benefits: Option<String>,
    pub contact_email: Option<String>,
    pub website: Option<String>,
    pub is_active: Option<bool>,
}

impl From<CreateMobilityProgramInput> for UpdateMobilityProgramInput {
    fn from(input: CreateMobilityProgramInput) -> Self {
        Self {
            name: Some(input.name),
            description: Some(input.description),
            host_institution: Some(input.host_institution),
            country: Some(input.country),
            city: Some(input.city),
            start_date: Some(input.start_date),
            end_date: Some(input.end_date),
            application_deadline: Some(input.application_deadline),
            requirements: Some(input.requirements),
            benefits: Some(input.benefits),
            contact_email: Some(input.contact_email),
            website: Some(input.website.unwrap_or_default()),
            is_active: Some(input.is_active),
        }
    }
}
