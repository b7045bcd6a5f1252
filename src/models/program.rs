//! Educational program model

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::Accreditation;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    pub id: i64,
    pub name: String,
    pub description: String,
    /// Length of the program in months
    pub duration_months: i32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A program together with its accreditations
#[derive(Debug, Clone, Serialize)]
pub struct ProgramDetail {
    #[serde(flatten)]
    pub program: Program,
    pub accreditations: Vec<Accreditation>,
}

/// Input for creating (or fully replacing) a program
#[derive(Debug, Clone, Deserialize)]
pub struct CreateProgramInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub duration_months: i32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Input for partially updating a program
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProgramInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub duration_months: Option<i32>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub is_active: Option<bool>,
}

impl From<CreateProgramInput> for UpdateProgramInput {
    fn from(input: CreateProgramInput) -> Self {
        Self {
            name: Some(input.name),
            description: Some(input.description),
            duration_months: Some(input.duration_months),
            start_date: Some(input.start_date),
            end_date: Some(input.end_date),
            is_active: Some(input.is_active),
        }
    }
}

pub(crate) fn default_true() -> bool {
    true
}
