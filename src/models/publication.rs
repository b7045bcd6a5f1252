//! Publication model

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::User;

/// Compact author reference embedded in publications
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorSummary {
    pub id: i64,
    pub email: String,
    pub full_name: String,
}

impl From<&User> for AuthorSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            full_name: user.full_name(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Publication {
    pub id: i64,
    pub title: String,
    pub authors: Vec<AuthorSummary>,
    pub publication_date: NaiveDate,
    pub journal_name: String,
    pub doi: Option<String>,
    pub url: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub keywords: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Publication {
    pub fn author_ids(&self) -> Vec<i64> {
        self.authors.iter().map(|a| a.id).collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePublicationInput {
    pub title: String,
    pub author_ids: Vec<i64>,
    pub publication_date: NaiveDate,
    pub journal_name: String,
    #[serde(default)]
    pub doi: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(rename = "abstract", default)]
    pub abstract_text: String,
    #[serde(default)]
    pub keywords: String,
}

/// Partial update. An empty `doi` or `url` clears the field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePublicationInput {
    pub title: Option<String>,
    pub author_ids: Option<Vec<i64>>,
    pub publication_date: Option<NaiveDate>,
    pub journal_name: Option<String>,
    pub doi: Option<String>,
    pub url: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub keywords: Option<String>,
}

impl From<CreatePublicationInput> for UpdatePublicationInput {
    fn from(input: CreatePublicationInput) -> Self {
        Self {
            title: Some(input.title),
            author_ids: Some(input.author_ids),
            publication_date: Some(input.publication_date),
            journal_name: Some(input.journal_name),
            doi: Some(input.doi.unwrap_or_default()),
            url: Some(input.url.unwrap_or_default()),
            abstract_text: Some(input.abstract_text),
            keywords: Some(input.keywords),
        }
    }
}

/// Row data written by the publication repository
#[derive(Debug, Clone)]
pub struct PublicationRecord {
    pub title: String,
    pub publication_date: NaiveDate,
    pub journal_name: String,
    pub doi: Option<String>,
    pub url: Option<String>,
    pub abstract_text: String,
    pub keywords: String,
    pub author_ids: Vec<i64>,
}
