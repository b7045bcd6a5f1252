//! Mobility program service

use crate::db::repositories::MobilityProgramRepository;
use crate::models::{
    CreateMobilityProgramInput, MobilityProgram, UpdateMobilityProgramInput,
};
use crate::services::policy::{authorize, Action, Caller, Resource};
use crate::services::validation::{
    check_date_order, check_email, check_optional_url, optional_text, require_text,
};
use crate::services::{FieldErrors, ServiceError};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

pub struct MobilityProgramService {
    repo: Arc<dyn MobilityProgramRepository>,
}

impl MobilityProgramService {
    pub fn new(repo: Arc<dyn MobilityProgramRepository>) -> Self {
        Self { repo }
    }

    /// All programs, latest application deadline first
    pub async fn list(&self, caller: &Caller) -> Result<Vec<MobilityProgram>, ServiceError> {
        authorize(caller, Action::List, Resource::MobilityProgram, None)?;
        let programs = self
            .repo
            .list()
            .await
            .context("Failed to list mobility programs")?;
        Ok(programs)
    }

    /// Only programs open for applications
    pub async fn list_active(&self, caller: &Caller) -> Result<Vec<MobilityProgram>, ServiceError> {
        authorize(caller, Action::List, Resource::MobilityProgram, None)?;
        let programs = self
            .repo
            .list_active()
            .await
            .context("Failed to list active mobility programs")?;
        Ok(programs)
    }

    pub async fn get(&self, caller: &Caller, id: i64) -> Result<MobilityProgram, ServiceError> {
        authorize(caller, Action::Retrieve, Resource::MobilityProgram, None)?;
        self.load(id).await
    }

    pub async fn create(
        &self,
        caller: &Caller,
        input: CreateMobilityProgramInput,
    ) -> Result<MobilityProgram, ServiceError> {
        authorize(caller, Action::Create, Resource::MobilityProgram, None)?;

        let now = Utc::now();
        let program = MobilityProgram {
            id: 0,
            name: input.name.trim().to_string(),
            description: input.description,
            host_institution: input.host_institution.trim().to_string(),
            country: input.country.trim().to_string(),
            city: input.city.trim().to_string(),
            start_date: input.start_date,
            end_date: input.end_date,
            application_deadline: input.application_deadline,
            requirements: input.requirements,
            benefits: input.benefits,
            contact_email: input.contact_email.trim().to_string(),
            website: optional_text(input.website),
            is_active: input.is_active,
            created_at: now,
            updated_at: now,
        };
        validate(&program)?;

        let created = self
            .repo
            .create(&program)
            .await
            .context("Failed to create mobility program")?;
        tracing::info!(mobility_program_id = created.id, "Mobility program created");
        Ok(created)
    }

    pub async fn update(
        &self,
        caller: &Caller,
        id: i64,
        input: UpdateMobilityProgramInput,
    ) -> Result<MobilityProgram, ServiceError> {
        authorize(caller, Action::Update, Resource::MobilityProgram, None)?;
        let mut program = self.load(id).await?;

        if let Some(name) = input.name {
            program.name = name.trim().to_string();
        }
        if let Some(description) = input.description {
            program.description = description;
        }
        if let Some(host_institution) = input.host_institution {
            program.host_institution = host_institution.trim().to_string();
        }
        if let Some(country) = input.country {
            program.country = country.trim().to_string();
        }
        if let Some(city) = input.city {
            program.city = city.trim().to_string();
        }
        if let Some(start_date) = input.start_date {
            program.start_date = start_date;
        }
        if let Some(end_date) = input.end_date {
            program.end_date = end_date;
        }
        if let Some(application_deadline) = input.application_deadline {
            program.application_deadline = application_deadline;
        }
        if let Some(requirements) = input.requirements {
            program.requirements = requirements;
        }
        if let Some(benefits) = input.benefits {
            program.benefits = benefits;
        }
        if let Some(contact_email) = input.contact_email {
            program.contact_email = contact_email.trim().to_string();
        }
        if input.website.is_some() {
            program.website = optional_text(input.website);
        }
        if let Some(is_active) = input.is_active {
            program.is_active = is_active;
        }
        validate(&program)?;

        let updated = self
            .repo
            .update(&program)
            .await
            .context("Failed to update mobility program")?;
        Ok(updated)
    }

    pub async fn delete(&self, caller: &Caller, id: i64) -> Result<(), ServiceError> {
        authorize(caller, Action::Delete, Resource::MobilityProgram, None)?;
        let deleted = self
            .repo
            .delete(id)
            .await
            .context("Failed to delete mobility program")?;
        if !deleted {
            return Err(ServiceError::not_found("Mobility program"));
        }
        Ok(())
    }

    async fn load(&self, id: i64) -> Result<MobilityProgram, ServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get mobility program")?
            .ok_or_else(|| ServiceError::not_found("Mobility program"))
    }
}

fn validate(program: &MobilityProgram) -> Result<(), ServiceError> {
    let mut errors = FieldErrors::new();
    require_text(&mut errors, "name", &program.name);
    require_text(&mut errors, "host_institution", &program.host_institution);
    require_text(&mut errors, "country", &program.country);
    require_text(&mut errors, "city", &program.city);
    check_email(&mut errors, "contact_email", &program.contact_email);
    check_optional_url(&mut errors, "website", program.website.as_deref());
    check_date_order(
        &mut errors,
        "start_date",
        program.start_date,
        "end_date",
        program.end_date,
    );
    check_date_order(
        &mut errors,
        "application_deadline",
        program.application_deadline,
        "end_date",
        program.end_date,
    );
    errors.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxMobilityProgramRepository;
    use crate::db::{create_test_pool, migrations};
    use crate::models::{Role, User};
    use chrono::NaiveDate;

    async fn setup_test_service() -> MobilityProgramService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        MobilityProgramService::new(SqlxMobilityProgramRepository::boxed(pool))
    }

    fn admin() -> Caller {
        let mut user = User::new("admin@ex.edu".to_string(), "hash".to_string(), Role::Administrator);
        user.id = 1;
        Caller::User(user)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn input(name: &str, is_active: bool) -> CreateMobilityProgramInput {
        CreateMobilityProgramInput {
            name: name.to_string(),
            description: "Semester abroad".to_string(),
            host_institution: "Universidad de Ejemplo".to_string(),
            country: "Spain".to_string(),
            city: "Valencia".to_string(),
            start_date: date(2026, 2, 1),
            end_date: date(2026, 7, 1),
            application_deadline: date(2025, 11, 15),
            requirements: "B2 Spanish".to_string(),
            benefits: "Monthly grant".to_string(),
            contact_email: "exchange@ex.edu".to_string(),
            website: Some("https://exchange.ex.edu".to_string()),
            is_active,
        }
    }

    #[tokio::test]
    async fn test_list_active() {
        let service = setup_test_service().await;
        service.create(&admin(), input("Open call", true)).await.unwrap();
        service.create(&admin(), input("Closed call", false)).await.unwrap();

        let active = service.list_active(&Caller::Anonymous).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "Open call");
        assert_eq!(service.list(&Caller::Anonymous).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_validation() {
        let service = setup_test_service().await;
        let mut bad = input("Bad", true);
        bad.contact_email = "exchange".to_string();
        bad.website = Some("exchange.ex.edu".to_string());
        bad.application_deadline = date(2026, 8, 1);

        match service.create(&admin(), bad).await.unwrap_err() {
            ServiceError::Validation(errors) => {
                assert!(errors.contains("contact_email"));
                assert!(errors.contains("website"));
                assert!(errors.contains("end_date"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_update_clears_website() {
        let service = setup_test_service().await;
        let created = service.create(&admin(), input("Call", true)).await.unwrap();

        let updated = service
            .update(
                &admin(),
                created.id,
                UpdateMobilityProgramInput {
                    website: Some(String::new()),
                    city: Some("Madrid".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.website, None);
        assert_eq!(updated.city, "Madrid");
        assert_eq!(updated.country, "Spain");
    }

    #[tokio::test]
    async fn test_anonymous_cannot_write() {
        let service = setup_test_service().await;
        assert!(matches!(
            service.create(&Caller::Anonymous, input("X", true)).await,
            Err(ServiceError::Unauthenticated)
        ));
        assert!(matches!(
            service.get(&Caller::Anonymous, 77).await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
