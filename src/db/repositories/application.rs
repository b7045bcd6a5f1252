//! Application repository
//!
//! Listing is split by audience: everything, one university's inbox, or one
//! submitter's own applications.

use crate::config::DatabaseDriver;
use crate::db::{mysql_pool, sqlite_pool, DynDatabasePool};
use crate::models::Application;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

const APPLICATION_COLUMNS: &str = "id, name, email, phone, subject, message, status, \
     university_id, submitted_by, created_at, updated_at";

/// Which applications a listing covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationFilter {
    All,
    University(i64),
    SubmittedBy(i64),
}

impl ApplicationFilter {
    fn where_clause(&self) -> (&'static str, Option<i64>) {
        match self {
            Self::All => ("", None),
            Self::University(id) => ("WHERE university_id = ? ", Some(*id)),
            Self::SubmittedBy(id) => ("WHERE submitted_by = ? ", Some(*id)),
        }
    }
}

#[async_trait]
pub trait ApplicationRepository: Send + Sync {
    async fn create(&self, application: &Application) -> Result<Application>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Application>>;

    /// Newest first
    async fn list(&self, filter: ApplicationFilter) -> Result<Vec<Application>>;

    async fn update(&self, application: &Application) -> Result<Application>;

    async fn delete(&self, id: i64) -> Result<bool>;
}

pub struct SqlxApplicationRepository {
    pool: DynDatabasePool,
}

impl SqlxApplicationRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ApplicationRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ApplicationRepository for SqlxApplicationRepository {
    async fn create(&self, application: &Application) -> Result<Application> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_application_sqlite(sqlite_pool(&self.pool)?, application).await
            }
            DatabaseDriver::Mysql => {
                create_application_mysql(mysql_pool(&self.pool)?, application).await
            }
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Application>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_application_sqlite(sqlite_pool(&self.pool)?, id).await,
            DatabaseDriver::Mysql => get_application_mysql(mysql_pool(&self.pool)?, id).await,
        }
    }

    async fn list(&self, filter: ApplicationFilter) -> Result<Vec<Application>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_applications_sqlite(sqlite_pool(&self.pool)?, filter).await,
            DatabaseDriver::Mysql => list_applications_mysql(mysql_pool(&self.pool)?, filter).await,
        }
    }

    async fn update(&self, application: &Application) -> Result<Application> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                update_application_sqlite(sqlite_pool(&self.pool)?, application).await
            }
            DatabaseDriver::Mysql => {
                update_application_mysql(mysql_pool(&self.pool)?, application).await
            }
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query("DELETE FROM applications WHERE id = ?")
                .bind(id)
                .execute(sqlite_pool(&self.pool)?)
                .await
                .context("Failed to delete application")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query("DELETE FROM applications WHERE id = ?")
                .bind(id)
                .execute(mysql_pool(&self.pool)?)
                .await
                .context("Failed to delete application")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }
}

fn list_sql(clause: &str) -> String {
    format!(
        "SELECT {} FROM applications {}ORDER BY created_at DESC, id DESC",
        APPLICATION_COLUMNS, clause
    )
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_application_sqlite(
    pool: &SqlitePool,
    application: &Application,
) -> Result<Application> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO applications (name, email, phone, subject, message, status,
                                  university_id, submitted_by, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&application.name)
    .bind(&application.email)
    .bind(&application.phone)
    .bind(&application.subject)
    .bind(&application.message)
    .bind(application.status.to_string())
    .bind(application.university_id)
    .bind(application.submitted_by)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create application")?;

    get_application_sqlite(pool, result.last_insert_rowid())
        .await?
        .context("Application not found after creation")
}

async fn get_application_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Application>> {
    let sql = format!("SELECT {} FROM applications WHERE id = ?", APPLICATION_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get application by ID")?;

    row.as_ref().map(row_to_application_sqlite).transpose()
}

async fn list_applications_sqlite(
    pool: &SqlitePool,
    filter: ApplicationFilter,
) -> Result<Vec<Application>> {
    let (clause, param) = filter.where_clause();
    let sql = list_sql(clause);
    let mut query = sqlx::query(&sql);
    if let Some(id) = param {
        query = query.bind(id);
    }
    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to list applications")?;

    rows.iter().map(row_to_application_sqlite).collect()
}

async fn update_application_sqlite(
    pool: &SqlitePool,
    application: &Application,
) -> Result<Application> {
    sqlx::query(
        r#"
        UPDATE applications
        SET name = ?, email = ?, phone = ?, subject = ?, message = ?, status = ?,
            university_id = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&application.name)
    .bind(&application.email)
    .bind(&application.phone)
    .bind(&application.subject)
    .bind(&application.message)
    .bind(application.status.to_string())
    .bind(application.university_id)
    .bind(Utc::now())
    .bind(application.id)
    .execute(pool)
    .await
    .context("Failed to update application")?;

    get_application_sqlite(pool, application.id)
        .await?
        .context("Application not found after update")
}

fn row_to_application_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Application> {
    let status: String = row.get("status");
    Ok(Application {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        phone: row.get("phone"),
        subject: row.get("subject"),
        message: row.get("message"),
        status: status.parse()?,
        university_id: row.get("university_id"),
        submitted_by: row.get("submitted_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_application_mysql(
    pool: &MySqlPool,
    application: &Application,
) -> Result<Application> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO applications (name, email, phone, subject, message, status,
                                  university_id, submitted_by, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&application.name)
    .bind(&application.email)
    .bind(&application.phone)
    .bind(&application.subject)
    .bind(&application.message)
    .bind(application.status.to_string())
    .bind(application.university_id)
    .bind(application.submitted_by)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create application")?;

    get_application_mysql(pool, result.last_insert_id() as i64)
        .await?
        .context("Application not found after creation")
}

async fn get_application_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Application>> {
    let sql = format!("SELECT {} FROM applications WHERE id = ?", APPLICATION_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get application by ID")?;

    row.as_ref().map(row_to_application_mysql).transpose()
}

async fn list_applications_mysql(
    pool: &MySqlPool,
    filter: ApplicationFilter,
) -> Result<Vec<Application>> {
    let (clause, param) = filter.where_clause();
    let sql = list_sql(clause);
    let mut query = sqlx::query(&sql);
    if let Some(id) = param {
        query = query.bind(id);
    }
    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to list applications")?;

    rows.iter().map(row_to_application_mysql).collect()
}

async fn update_application_mysql(
    pool: &MySqlPool,
    application: &Application,
) -> Result<Application> {
    sqlx::query(
        r#"
        UPDATE applications
        SET name = ?, email = ?, phone = ?, subject = ?, message = ?, status = ?,
            university_id = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&application.name)
    .bind(&application.email)
    .bind(&application.phone)
    .bind(&application.subject)
    .bind(&application.message)
    .bind(application.status.to_string())
    .bind(application.university_id)
    .bind(Utc::now())
    .bind(application.id)
    .execute(pool)
    .await
    .context("Failed to update application")?;

    get_application_mysql(pool, application.id)
        .await?
        .context("Application not found after update")
}

fn row_to_application_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Application> {
    let status: String = row.get("status");
    Ok(Application {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        phone: row.get("phone"),
        subject: row.get("subject"),
        message: row.get("message"),
        status: status.parse()?,
        university_id: row.get("university_id"),
        submitted_by: row.get("submitted_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
