//! Accreditation service

use crate::db::repositories::{AccreditationRepository, ProgramRepository};
use crate::models::{
    Accreditation, AccreditationDetail, CreateAccreditationInput, Program,
    UpdateAccreditationInput,
};
use crate::services::policy::{authorize, Action, Caller, Resource};
use crate::services::validation::{check_date_order, require_text};
use crate::services::{FieldErrors, ServiceError};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

const UNKNOWN_PROGRAM: &str = "Program does not exist.";

pub struct AccreditationService {
    accreditation_repo: Arc<dyn AccreditationRepository>,
    program_repo: Arc<dyn ProgramRepository>,
}

impl AccreditationService {
    pub fn new(
        accreditation_repo: Arc<dyn AccreditationRepository>,
        program_repo: Arc<dyn ProgramRepository>,
    ) -> Self {
        Self {
            accreditation_repo,
            program_repo,
        }
    }

    pub async fn list(&self, caller: &Caller) -> Result<Vec<Accreditation>, ServiceError> {
        authorize(caller, Action::List, Resource::Accreditation, None)?;
        let accreditations = self
            .accreditation_repo
            .list()
            .await
            .context("Failed to list accreditations")?;
        Ok(accreditations)
    }

    /// Accreditations of one program; `program_id` is mandatory
    pub async fn list_by_program(
        &self,
        caller: &Caller,
        program_id: Option<i64>,
    ) -> Result<Vec<Accreditation>, ServiceError> {
        authorize(caller, Action::List, Resource::Accreditation, None)?;
        let program_id = program_id
            .ok_or_else(|| ServiceError::field("program_id", "This query parameter is required."))?;
        let accreditations = self
            .accreditation_repo
            .list_by_program(program_id)
            .await
            .context("Failed to list accreditations by program")?;
        Ok(accreditations)
    }

    pub async fn get(
        &self,
        caller: &Caller,
        id: i64,
    ) -> Result<AccreditationDetail, ServiceError> {
        authorize(caller, Action::Retrieve, Resource::Accreditation, None)?;
        let accreditation = self.load(id).await?;
        let program = self
            .find_program(accreditation.program_id)
            .await?
            .context("Accreditation references a missing program")?;
        Ok(AccreditationDetail {
            accreditation,
            program,
        })
    }

    pub async fn create(
        &self,
        caller: &Caller,
        input: CreateAccreditationInput,
    ) -> Result<Accreditation, ServiceError> {
        authorize(caller, Action::Create, Resource::Accreditation, None)?;

        let now = Utc::now();
        let accreditation = Accreditation {
            id: 0,
            program_id: input.program_id,
            program_name: String::new(),
            name: input.name.trim().to_string(),
            organization: input.organization.trim().to_string(),
            date_received: input.date_received,
            expiration_date: input.expiration_date,
            certificate_number: input.certificate_number.trim().to_string(),
            description: input.description,
            created_at: now,
            updated_at: now,
        };
        self.validate(&accreditation).await?;

        let created = self
            .accreditation_repo
            .create(&accreditation)
            .await
            .context("Failed to create accreditation")?;
        tracing::info!(
            accreditation_id = created.id,
            program_id = created.program_id,
            "Accreditation created"
        );
        Ok(created)
    }

    pub async fn update(
        &self,
        caller: &Caller,
        id: i64,
        input: UpdateAccreditationInput,
    ) -> Result<Accreditation, ServiceError> {
        authorize(caller, Action::Update, Resource::Accreditation, None)?;
        let mut accreditation = self.load(id).await?;

        if let Some(program_id) = input.program_id {
            accreditation.program_id = program_id;
        }
        if let Some(name) = input.name {
            accreditation.name = name.trim().to_string();
        }
        if let Some(organization) = input.organization {
            accreditation.organization = organization.trim().to_string();
        }
        if let Some(date_received) = input.date_received {
            accreditation.date_received = date_received;
        }
        if let Some(expiration_date) = input.expiration_date {
            accreditation.expiration_date = expiration_date;
        }
        if let Some(certificate_number) = input.certificate_number {
            accreditation.certificate_number = certificate_number.trim().to_string();
        }
        if let Some(description) = input.description {
            accreditation.description = description;
        }
        self.validate(&accreditation).await?;

        let updated = self
            .accreditation_repo
            .update(&accreditation)
            .await
            .context("Failed to update accreditation")?;
        Ok(updated)
    }

    pub async fn delete(&self, caller: &Caller, id: i64) -> Result<(), ServiceError> {
        authorize(caller, Action::Delete, Resource::Accreditation, None)?;
        let deleted = self
            .accreditation_repo
            .delete(id)
            .await
            .context("Failed to delete accreditation")?;
        if !deleted {
            return Err(ServiceError::not_found("Accreditation"));
        }
        Ok(())
    }

    async fn load(&self, id: i64) -> Result<Accreditation, ServiceError> {
        self.accreditation_repo
            .get_by_id(id)
            .await
            .context("Failed to get accreditation")?
            .ok_or_else(|| ServiceError::not_found("Accreditation"))
    }

    async fn find_program(&self, id: i64) -> Result<Option<Program>, ServiceError> {
        let program = self
            .program_repo
            .get_by_id(id)
            .await
            .context("Failed to get program")?;
        Ok(program)
    }

    async fn validate(&self, accreditation: &Accreditation) -> Result<(), ServiceError> {
        let mut errors = FieldErrors::new();
        require_text(&mut errors, "name", &accreditation.name);
        require_text(&mut errors, "organization", &accreditation.organization);
        require_text(
            &mut errors,
            "certificate_number",
            &accreditation.certificate_number,
        );
        check_date_order(
            &mut errors,
            "date_received",
            accreditation.date_received,
            "expiration_date",
            accreditation.expiration_date,
        );
        if self.find_program(accreditation.program_id).await?.is_none() {
            errors.add("program_id", UNKNOWN_PROGRAM);
        }
        errors.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxAccreditationRepository, SqlxProgramRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{Role, User};
    use chrono::NaiveDate;

    struct Harness {
        service: AccreditationService,
        program_id: i64,
        other_program_id: i64,
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn setup() -> Harness {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let programs = SqlxProgramRepository::boxed(pool.clone());
        let mut ids = Vec::new();
        for name in ["Engineering BEng", "Medicine MD"] {
            let now = Utc::now();
            let program = programs
                .create(&Program {
                    id: 0,
                    name: name.to_string(),
                    description: String::new(),
                    duration_months: 36,
                    start_date: date(2025, 9, 1),
                    end_date: date(2028, 6, 30),
                    is_active: true,
                    created_at: now,
                    updated_at: now,
                })
                .await
                .expect("Failed to create program");
            ids.push(program.id);
        }

        Harness {
            service: AccreditationService::new(
                SqlxAccreditationRepository::boxed(pool),
                programs,
            ),
            program_id: ids[0],
            other_program_id: ids[1],
        }
    }

    fn admin() -> Caller {
        let mut user = User::new("admin@ex.edu".to_string(), "hash".to_string(), Role::Administrator);
        user.id = 1;
        Caller::User(user)
    }

    fn input(program_id: i64, certificate: &str) -> CreateAccreditationInput {
        CreateAccreditationInput {
            program_id,
            name: "Quality label".to_string(),
            organization: "European Agency".to_string(),
            date_received: date(2024, 3, 1),
            expiration_date: date(2029, 3, 1),
            certificate_number: certificate.to_string(),
            description: String::new(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get_with_program() {
        let h = setup().await;
        let created = h
            .service
            .create(&admin(), input(h.program_id, "EA-1"))
            .await
            .expect("Failed to create accreditation");
        assert_eq!(created.program_name, "Engineering BEng");

        let detail = h.service.get(&Caller::Anonymous, created.id).await.unwrap();
        assert_eq!(detail.program.id, h.program_id);

        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["certificate_number"], "EA-1");
        assert_eq!(json["program"]["name"], "Engineering BEng");
    }

    #[tokio::test]
    async fn test_program_must_exist() {
        let h = setup().await;
        let err = h.service.create(&admin(), input(9999, "EA-2")).await.unwrap_err();
        match err {
            ServiceError::Validation(errors) => {
                assert_eq!(errors.messages("program_id"), [UNKNOWN_PROGRAM]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_list_by_program() {
        let h = setup().await;
        h.service.create(&admin(), input(h.program_id, "A")).await.unwrap();
        h.service.create(&admin(), input(h.program_id, "B")).await.unwrap();
        h.service.create(&admin(), input(h.other_program_id, "C")).await.unwrap();

        let listed = h
            .service
            .list_by_program(&Caller::Anonymous, Some(h.program_id))
            .await
            .unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|a| a.program_id == h.program_id));

        let err = h.service.list_by_program(&Caller::Anonymous, None).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(ref e) if e.contains("program_id")));

        assert_eq!(h.service.list(&Caller::Anonymous).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_update_moves_between_programs_and_checks_dates() {
        let h = setup().await;
        let created = h.service.create(&admin(), input(h.program_id, "EA-3")).await.unwrap();

        let moved = h
            .service
            .update(
                &admin(),
                created.id,
                UpdateAccreditationInput {
                    program_id: Some(h.other_program_id),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(moved.program_name, "Medicine MD");

        let err = h
            .service
            .update(
                &admin(),
                created.id,
                UpdateAccreditationInput {
                    expiration_date: Some(date(2020, 1, 1)),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(ref e) if e.contains("expiration_date")));
    }

    #[tokio::test]
    async fn test_writes_need_admin() {
        let h = setup().await;
        let mut user = User::new("u@ex.edu".to_string(), "hash".to_string(), Role::University);
        user.id = 2;
        let result = h
            .service
            .create(&Caller::User(user), input(h.program_id, "X"))
            .await;
        assert!(matches!(result, Err(ServiceError::Forbidden(_))));

        assert!(matches!(
            h.service.delete(&admin(), 12345).await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
