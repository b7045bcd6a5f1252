//! Application service
//!
//! Anyone may submit an application. Status is always `pending` at
//! submission and the submitter is taken from the session, never from the
//! request body. A university account sees and triages only the
//! applications addressed to it.

use crate::db::repositories::{ApplicationFilter, ApplicationRepository, UserRepository};
use crate::models::{
    Application, ApplicationStatus, CreateApplicationInput, Role, UpdateApplicationInput,
};
use crate::services::policy::{authorize, Action, Caller, RecordOwnership, Resource, Scope};
use crate::services::validation::{check_email, optional_text, require_text};
use crate::services::{FieldErrors, ServiceError};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

const INVALID_UNIVERSITY: &str = "Select a valid university.";

pub struct ApplicationService {
    application_repo: Arc<dyn ApplicationRepository>,
    user_repo: Arc<dyn UserRepository>,
}

impl ApplicationService {
    pub fn new(
        application_repo: Arc<dyn ApplicationRepository>,
        user_repo: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            application_repo,
            user_repo,
        }
    }

    /// Submit an application
    pub async fn create(
        &self,
        caller: &Caller,
        input: CreateApplicationInput,
    ) -> Result<Application, ServiceError> {
        authorize(caller, Action::Create, Resource::Application, None)?;

        let now = Utc::now();
        let application = Application {
            id: 0,
            name: input.name.trim().to_string(),
            email: input.email.trim().to_string(),
            phone: optional_text(input.phone),
            subject: input.subject.trim().to_string(),
            message: input.message,
            status: ApplicationStatus::Pending,
            university_id: input.university_id,
            submitted_by: caller.user_id(),
            created_at: now,
            updated_at: now,
        };
        self.validate(&application).await?;

        let created = self
            .application_repo
            .create(&application)
            .await
            .context("Failed to create application")?;
        tracing::info!(
            application_id = created.id,
            university_id = ?created.university_id,
            "Application submitted"
        );
        Ok(created)
    }

    /// Applications visible to the caller: everything for administrators,
    /// the inbox for universities
    pub async fn list(&self, caller: &Caller) -> Result<Vec<Application>, ServiceError> {
        let scope = authorize(caller, Action::List, Resource::Application, None)?;
        self.list_scoped(scope).await
    }

    /// The caller's own applications: the inbox for universities, submissions
    /// for everyone else
    pub async fn list_mine(&self, caller: &Caller) -> Result<Vec<Application>, ServiceError> {
        let scope = match authorize(caller, Action::ListOwn, Resource::Application, None)? {
            Scope::All => {
                Scope::SubmittedBy(caller.user_id().ok_or(ServiceError::Unauthenticated)?)
            }
            scope => scope,
        };
        self.list_scoped(scope).await
    }

    pub async fn get(&self, caller: &Caller, id: i64) -> Result<Application, ServiceError> {
        if caller.is_anonymous() {
            return Err(ServiceError::Unauthenticated);
        }
        let application = self.load(id).await?;
        authorize(
            caller,
            Action::Retrieve,
            Resource::Application,
            Some(&ownership(&application)),
        )?;
        Ok(application)
    }

    /// Update an application.
    ///
    /// Administrators may change any field. The addressed university may only
    /// move the status.
    pub async fn update(
        &self,
        caller: &Caller,
        id: i64,
        input: UpdateApplicationInput,
    ) -> Result<Application, ServiceError> {
        if caller.is_anonymous() {
            return Err(ServiceError::Unauthenticated);
        }
        let mut application = self.load(id).await?;
        let scope = authorize(
            caller,
            Action::Update,
            Resource::Application,
            Some(&ownership(&application)),
        )?;
        if scope != Scope::All && input.touches_more_than_status() {
            return Err(ServiceError::Forbidden(
                "Only the status of an application can be changed.".to_string(),
            ));
        }

        let previous_status = application.status;
        if let Some(name) = input.name {
            application.name = name.trim().to_string();
        }
        if let Some(email) = input.email {
            application.email = email.trim().to_string();
        }
        if input.phone.is_some() {
            application.phone = optional_text(input.phone);
        }
        if let Some(subject) = input.subject {
            application.subject = subject.trim().to_string();
        }
        if let Some(message) = input.message {
            application.message = message;
        }
        if let Some(status) = input.status {
            application.status = status;
        }
        if let Some(university_id) = input.university_id {
            application.university_id = Some(university_id);
        }
        self.validate(&application).await?;

        let updated = self
            .application_repo
            .update(&application)
            .await
            .context("Failed to update application")?;

        if updated.status != previous_status {
            tracing::info!(
                application_id = updated.id,
                from = %previous_status,
                to = %updated.status,
                "Application status changed"
            );
        }
        Ok(updated)
    }

    pub async fn delete(&self, caller: &Caller, id: i64) -> Result<(), ServiceError> {
        authorize(caller, Action::Delete, Resource::Application, None)?;
        let deleted = self
            .application_repo
            .delete(id)
            .await
            .context("Failed to delete application")?;
        if !deleted {
            return Err(ServiceError::not_found("Application"));
        }
        Ok(())
    }

    async fn list_scoped(&self, scope: Scope) -> Result<Vec<Application>, ServiceError> {
        let filter = match scope {
            Scope::All => ApplicationFilter::All,
            Scope::UniversityInbox(id) => ApplicationFilter::University(id),
            Scope::SubmittedBy(id) => ApplicationFilter::SubmittedBy(id),
            Scope::AuthoredBy(_) | Scope::SelfOnly(_) => {
                return Err(ServiceError::Forbidden(
                    "You do not have permission to perform this action.".to_string(),
                ))
            }
        };
        let applications = self
            .application_repo
            .list(filter)
            .await
            .context("Failed to list applications")?;
        Ok(applications)
    }

    async fn load(&self, id: i64) -> Result<Application, ServiceError> {
        self.application_repo
            .get_by_id(id)
            .await
            .context("Failed to get application")?
            .ok_or_else(|| ServiceError::not_found("Application"))
    }

    async fn validate(&self, application: &Application) -> Result<(), ServiceError> {
        let mut errors = FieldErrors::new();
        require_text(&mut errors, "name", &application.name);
        check_email(&mut errors, "email", &application.email);
        require_text(&mut errors, "subject", &application.subject);
        require_text(&mut errors, "message", &application.message);

        if let Some(university_id) = application.university_id {
            let university = self
                .user_repo
                .get_by_id(university_id)
                .await
                .context("Failed to get university")?;
            let valid = university.is_some_and(|u| u.role == Role::University && u.is_active);
            if !valid {
                errors.add("university_id", INVALID_UNIVERSITY);
            }
        }
        errors.into_result()
    }
}

fn ownership(application: &Application) -> RecordOwnership {
    RecordOwnership::Application {
        university_id: application.university_id,
        submitted_by: application.submitted_by,
    }
}
