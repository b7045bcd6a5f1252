//! Application model
//!
//! Messages submitted to the portal, optionally addressed to a university
//! account.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Processing status of an application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    #[default]
    Pending,
    Reviewing,
    Accepted,
    Rejected,
}

impl std::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Reviewing => write!(f, "reviewing"),
            Self::Accepted => write!(f, "accepted"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

impl std::str::FromStr for ApplicationStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "reviewing" => Ok(Self::Reviewing),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            _ => Err(anyhow::anyhow!("Invalid application status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: String,
    pub message: String,
    pub status: ApplicationStatus,
    /// Addressed university account
    pub university_id: Option<i64>,
    /// Authenticated submitter, if any
    pub submitted_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Submission input. Status and submitter are never read from the client.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateApplicationInput {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub subject: String,
    pub message: String,
    #[serde(default)]
    pub university_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateApplicationInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub subject: Option<String>,
    pub message: Option<String>,
    pub status: Option<ApplicationStatus>,
    pub university_id: Option<i64>,
}

impl UpdateApplicationInput {
    /// True when anything other than `status` is being changed
    pub fn touches_more_than_status(&self) -> bool {
        self.name.is_some()
            || self.email.is_some()
            || self.phone.is_some()
            || self.subject.is_some()
            || self.message.is_some()
            || self.university_id.is_some()
    }
}

/// Full replacement input for PUT
#[derive(Debug, Clone, Deserialize)]
pub struct ReplaceApplicationInput {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub subject: String,
    pub message: String,
    #[serde(default)]
    pub status: ApplicationStatus,
    #[serde(default)]
    pub university_id: Option<i64>,
}

impl From<ReplaceApplicationInput> for UpdateApplicationInput {
    fn from(input: ReplaceApplicationInput) -> Self {
        Self {
            name: Some(input.name),
            email: Some(input.email),
            phone: Some(input.phone.unwrap_or_default()),
            subject: Some(input.subject),
            message: Some(input.message),
            status: Some(input.status),
            university_id: input.university_id,
        }
    }
}
