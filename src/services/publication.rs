//! Publication service
//!
//! Authors are user accounts. `list_mine` filters by the caller's own
//! authorship; there is no client-side author filter.

use crate::db::repositories::{PublicationRepository, UserRepository};
use crate::models::{
    CreatePublicationInput, Publication, PublicationRecord, UpdatePublicationInput,
};
use crate::services::policy::{authorize, Action, Caller, Resource, Scope};
use crate::services::validation::{check_optional_url, optional_text, require_text};
use crate::services::{FieldErrors, ServiceError};
use anyhow::Context;
use std::sync::Arc;

pub struct PublicationService {
    publication_repo: Arc<dyn PublicationRepository>,
    user_repo: Arc<dyn UserRepository>,
}

impl PublicationService {
    pub fn new(
        publication_repo: Arc<dyn PublicationRepository>,
        user_repo: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            publication_repo,
            user_repo,
        }
    }

    /// All publications, most recent first
    pub async fn list(&self, caller: &Caller) -> Result<Vec<Publication>, ServiceError> {
        authorize(caller, Action::List, Resource::Publication, None)?;
        let publications = self
            .publication_repo
            .list()
            .await
            .context("Failed to list publications")?;
        Ok(publications)
    }

    /// Publications the caller co-authored
    pub async fn list_mine(&self, caller: &Caller) -> Result<Vec<Publication>, ServiceError> {
        let publications = match authorize(caller, Action::ListOwn, Resource::Publication, None)? {
            Scope::AuthoredBy(user_id) | Scope::SelfOnly(user_id) => self
                .publication_repo
                .list_by_author(user_id)
                .await
                .context("Failed to list publications by author")?,
            // Administrators also only see their own here
            _ => {
                let user_id = caller.user_id().ok_or(ServiceError::Unauthenticated)?;
                self.publication_repo
                    .list_by_author(user_id)
                    .await
                    .context("Failed to list publications by author")?
            }
        };
        Ok(publications)
    }

    pub async fn get(&self, caller: &Caller, id: i64) -> Result<Publication, ServiceError> {
        authorize(caller, Action::Retrieve, Resource::Publication, None)?;
        self.load(id).await
    }

    pub async fn create(
        &self,
        caller: &Caller,
        input: CreatePublicationInput,
    ) -> Result<Publication, ServiceError> {
        authorize(caller, Action::Create, Resource::Publication, None)?;

        let record = PublicationRecord {
            title: input.title.trim().to_string(),
            publication_date: input.publication_date,
            journal_name: input.journal_name.trim().to_string(),
            doi: optional_text(input.doi),
            url: optional_text(input.url),
            abstract_text: input.abstract_text,
            keywords: input.keywords,
            author_ids: dedup(input.author_ids),
        };
        self.validate(&record).await?;

        let created = self
            .publication_repo
            .create(&record)
            .await
            .context("Failed to create publication")?;
        tracing::info!(publication_id = created.id, "Publication created");
        Ok(created)
    }

    /// Apply changes. An empty `doi` or `url` clears it; `author_ids`
    /// replaces the whole author list.
    pub async fn update(
        &self,
        caller: &Caller,
        id: i64,
        input: UpdatePublicationInput,
    ) -> Result<Publication, ServiceError> {
        authorize(caller, Action::Update, Resource::Publication, None)?;
        let current = self.load(id).await?;

        let mut record = PublicationRecord {
            author_ids: current.author_ids(),
            title: current.title,
            publication_date: current.publication_date,
            journal_name: current.journal_name,
            doi: current.doi,
            url: current.url,
            abstract_text: current.abstract_text,
            keywords: current.keywords,
        };

        if let Some(title) = input.title {
            record.title = title.trim().to_string();
        }
        if let Some(author_ids) = input.author_ids {
            record.author_ids = dedup(author_ids);
        }
        if let Some(publication_date) = input.publication_date {
            record.publication_date = publication_date;
        }
        if let Some(journal_name) = input.journal_name {
            record.journal_name = journal_name.trim().to_string();
        }
        if input.doi.is_some() {
            record.doi = optional_text(input.doi);
        }
        if input.url.is_some() {
            record.url = optional_text(input.url);
        }
        if let Some(abstract_text) = input.abstract_text {
            record.abstract_text = abstract_text;
        }
        if let Some(keywords) = input.keywords {
            record.keywords = keywords;
        }
        self.validate(&record).await?;

        let updated = self
            .publication_repo
            .update(id, &record)
            .await
            .context("Failed to update publication")?;
        Ok(updated)
    }

    pub async fn delete(&self, caller: &Caller, id: i64) -> Result<(), ServiceError> {
        authorize(caller, Action::Delete, Resource::Publication, None)?;
        let deleted = self
            .publication_repo
            .delete(id)
            .await
            .context("Failed to delete publication")?;
        if !deleted {
            return Err(ServiceError::not_found("Publication"));
        }
        Ok(())
    }

    async fn load(&self, id: i64) -> Result<Publication, ServiceError> {
        self.publication_repo
            .get_by_id(id)
            .await
            .context("Failed to get publication")?
            .ok_or_else(|| ServiceError::not_found("Publication"))
    }

    async fn validate(&self, record: &PublicationRecord) -> Result<(), ServiceError> {
        let mut errors = FieldErrors::new();
        require_text(&mut errors, "title", &record.title);
        require_text(&mut errors, "journal_name", &record.journal_name);
        check_optional_url(&mut errors, "url", record.url.as_deref());

        if record.author_ids.is_empty() {
            errors.add("author_ids", "This list may not be empty.");
        }
        for author_id in &record.author_ids {
            let exists = self
                .user_repo
                .get_by_id(*author_id)
                .await
                .context("Failed to get author")?
                .is_some();
            if !exists {
                errors.add("author_ids", format!("User {} does not exist.", author_id));
            }
        }
        errors.into_result()
    }
}

/// Drop repeated ids, keeping first occurrences
fn dedup(ids: Vec<i64>) -> Vec<i64> {
    let mut seen = std::collections::HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxPublicationRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{Role, User};
    use chrono::NaiveDate;

    struct Harness {
        service: PublicationService,
        alice: User,
        bob: User,
    }

    async fn setup() -> Harness {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let users = SqlxUserRepository::boxed(pool.clone());
        let mut alice = User::new("alice@ex.edu".to_string(), "hash".to_string(), Role::Regular);
        alice.first_name = "Alice".to_string();
        alice.last_name = "Smith".to_string();
        let alice = users.create(&alice).await.expect("Failed to create user");
        let bob = users
            .create(&User::new("bob@ex.edu".to_string(), "hash".to_string(), Role::Regular))
            .await
            .expect("Failed to create user");

        Harness {
            service: PublicationService::new(SqlxPublicationRepository::boxed(pool), users),
            alice,
            bob,
        }
    }

    fn admin() -> Caller {
        let mut user = User::new("admin@ex.edu".to_string(), "hash".to_string(), Role::Administrator);
        user.id = 999;
        Caller::User(user)
    }

    fn input(title: &str, author_ids: Vec<i64>) -> CreatePublicationInput {
        CreatePublicationInput {
            title: title.to_string(),
            author_ids,
            publication_date: NaiveDate::from_ymd_opt(2024, 5, 20).unwrap(),
            journal_name: "Journal of Examples".to_string(),
            doi: Some("10.1000/182".to_string()),
            url: Some("https://doi.org/10.1000/182".to_string()),
            abstract_text: "We study examples.".to_string(),
            keywords: "examples, testing".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_with_authors() {
        let h = setup().await;
        let created = h
            .service
            .create(&admin(), input("On Examples", vec![h.alice.id, h.bob.id, h.alice.id]))
            .await
            .expect("Failed to create publication");

        assert_eq!(created.author_ids(), vec![h.alice.id, h.bob.id]);
        assert_eq!(created.authors[0].full_name, "Alice Smith");

        let json = serde_json::to_value(&created).unwrap();
        assert_eq!(json["abstract"], "We study examples.");
        assert_eq!(json["authors"][1]["email"], "bob@ex.edu");
    }

    #[tokio::test]
    async fn test_authors_must_exist() {
        let h = setup().await;
        let err = h
            .service
            .create(&admin(), input("Ghost", vec![h.alice.id, 4242]))
            .await
            .unwrap_err();
        match err {
            ServiceError::Validation(errors) => {
                assert_eq!(errors.messages("author_ids"), ["User 4242 does not exist."]);
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = h.service.create(&admin(), input("Nobody", vec![])).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(ref e) if e.contains("author_ids")));
    }

    #[tokio::test]
    async fn test_list_mine_uses_caller_identity() {
        let h = setup().await;
        h.service.create(&admin(), input("A", vec![h.alice.id])).await.unwrap();
        h.service.create(&admin(), input("B", vec![h.bob.id])).await.unwrap();
        h.service
            .create(&admin(), input("C", vec![h.alice.id, h.bob.id]))
            .await
            .unwrap();

        let mine = h.service.list_mine(&Caller::User(h.alice.clone())).await.unwrap();
        let titles: Vec<&str> = mine.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(mine.len(), 2);
        assert!(titles.contains(&"A") && titles.contains(&"C"));

        assert!(matches!(
            h.service.list_mine(&Caller::Anonymous).await,
            Err(ServiceError::Unauthenticated)
        ));
        assert_eq!(h.service.list(&Caller::Anonymous).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_partial_update_clears_optional_fields() {
        let h = setup().await;
        let created = h.service.create(&admin(), input("Draft", vec![h.alice.id])).await.unwrap();

        let updated = h
            .service
            .update(
                &admin(),
                created.id,
                UpdatePublicationInput {
                    doi: Some(String::new()),
                    author_ids: Some(vec![h.bob.id]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.doi, None);
        assert_eq!(updated.url.as_deref(), Some("https://doi.org/10.1000/182"));
        assert_eq!(updated.author_ids(), vec![h.bob.id]);
        assert_eq!(updated.title, "Draft");

        let err = h
            .service
            .update(
                &admin(),
                created.id,
                UpdatePublicationInput {
                    url: Some("not a url".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(ref e) if e.contains("url")));
    }

    #[tokio::test]
    async fn test_authors_cannot_edit() {
        let h = setup().await;
        let created = h.service.create(&admin(), input("Mine", vec![h.alice.id])).await.unwrap();
        let result = h
            .service
            .update(&Caller::User(h.alice.clone()), created.id, UpdatePublicationInput::default())
            .await;
        assert!(matches!(result, Err(ServiceError::Forbidden(_))));
    }
}
