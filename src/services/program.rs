//! Program service
//!
//! Catalogue of educational programs. Reads are public, writes are reserved
//! for administrators.

use crate::db::repositories::{AccreditationRepository, ProgramRepository};
use crate::models::{CreateProgramInput, Program, ProgramDetail, UpdateProgramInput};
use crate::services::policy::{authorize, Action, Caller, Resource};
use crate::services::validation::{check_date_order, require_text};
use crate::services::{FieldErrors, ServiceError};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

pub struct ProgramService {
    program_repo: Arc<dyn ProgramRepository>,
    accreditation_repo: Arc<dyn AccreditationRepository>,
}

impl ProgramService {
    pub fn new(
        program_repo: Arc<dyn ProgramRepository>,
        accreditation_repo: Arc<dyn AccreditationRepository>,
    ) -> Self {
        Self {
            program_repo,
            accreditation_repo,
        }
    }

    /// All programs, newest first
    pub async fn list(&self, caller: &Caller) -> Result<Vec<Program>, ServiceError> {
        authorize(caller, Action::List, Resource::Program, None)?;
        let programs = self
            .program_repo
            .list()
            .await
            .context("Failed to list programs")?;
        Ok(programs)
    }

    /// A program with its accreditations
    pub async fn get(&self, caller: &Caller, id: i64) -> Result<ProgramDetail, ServiceError> {
        authorize(caller, Action::Retrieve, Resource::Program, None)?;
        let program = self.load(id).await?;
        let accreditations = self
            .accreditation_repo
            .list_by_program(id)
            .await
            .context("Failed to list accreditations")?;
        Ok(ProgramDetail {
            program,
            accreditations,
        })
    }

    pub async fn create(
        &self,
        caller: &Caller,
        input: CreateProgramInput,
    ) -> Result<Program, ServiceError> {
        authorize(caller, Action::Create, Resource::Program, None)?;

        let now = Utc::now();
        let program = Program {
            id: 0,
            name: input.name.trim().to_string(),
            description: input.description,
            duration_months: input.duration_months,
            start_date: input.start_date,
            end_date: input.end_date,
            is_active: input.is_active,
            created_at: now,
            updated_at: now,
        };
        validate(&program)?;

        let created = self
            .program_repo
            .create(&program)
            .await
            .context("Failed to create program")?;
        tracing::info!(program_id = created.id, "Program created");
        Ok(created)
    }

    /// Apply changes; `None` fields are left untouched
    pub async fn update(
        &self,
        caller: &Caller,
        id: i64,
        input: UpdateProgramInput,
    ) -> Result<Program, ServiceError> {
        authorize(caller, Action::Update, Resource::Program, None)?;
        let mut program = self.load(id).await?;

        if let Some(name) = input.name {
            program.name = name.trim().to_string();
        }
        if let Some(description) = input.description {
            program.description = description;
        }
        if let Some(duration_months) = input.duration_months {
            program.duration_months = duration_months;
        }
        if let Some(start_date) = input.start_date {
            program.start_date = start_date;
        }
        if let Some(end_date) = input.end_date {
            program.end_date = end_date;
        }
        if let Some(is_active) = input.is_active {
            program.is_active = is_active;
        }
        validate(&program)?;

        let updated = self
            .program_repo
            .update(&program)
            .await
            .context("Failed to update program")?;
        Ok(updated)
    }

    /// Delete a program and, by cascade, its accreditations
    pub async fn delete(&self, caller: &Caller, id: i64) -> Result<(), ServiceError> {
        authorize(caller, Action::Delete, Resource::Program, None)?;
        let deleted = self
            .program_repo
            .delete(id)
            .await
            .context("Failed to delete program")?;
        if !deleted {
            return Err(ServiceError::not_found("Program"));
        }
        tracing::info!(program_id = id, "Program deleted");
        Ok(())
    }

    async fn load(&self, id: i64) -> Result<Program, ServiceError> {
        self.program_repo
            .get_by_id(id)
            .await
            .context("Failed to get program")?
            .ok_or_else(|| ServiceError::not_found("Program"))
    }
}

fn validate(program: &Program) -> Result<(), ServiceError> {
    let mut errors = FieldErrors::new();
    require_text(&mut errors, "name", &program.name);
    if program.duration_months < 0 {
        errors.add(
            "duration_months",
            "Ensure this value is greater than or equal to 0.",
        );
    }
    check_date_order(
        &mut errors,
        "start_date",
        program.start_date,
        "end_date",
        program.end_date,
    );
    errors.into_result()
}
