//! Mobility program repository

use crate::config::DatabaseDriver;
use crate::db::{mysql_pool, sqlite_pool, DynDatabasePool};
use crate::models::MobilityProgram;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

const MOBILITY_COLUMNS: &str = "id, name, description, host_institution, country, city, \
     start_date, end_date, application_deadline, requirements, benefits, contact_email, website, \
     is_active, created_at, updated_at";

#[async_trait]
pub trait MobilityProgramRepository: Send + Sync {
    async fn create(&self, program: &MobilityProgram) -> Result<MobilityProgram>;

    async fn get_by_id(&self, id: i64) -> Result<Option<MobilityProgram>>;

    /// All mobility programs, latest application deadline first
    async fn list(&self) -> Result<Vec<MobilityProgram>>;

    /// Only programs flagged active
    async fn list_active(&self) -> Result<Vec<MobilityProgram>>;

    async fn update(&self, program: &MobilityProgram) -> Result<MobilityProgram>;

    async fn delete(&self, id: i64) -> Result<bool>;
}

pub struct SqlxMobilityProgramRepository {
    pool: DynDatabasePool,
}

impl SqlxMobilityProgramRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn MobilityProgramRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl MobilityProgramRepository for SqlxMobilityProgramRepository {
    async fn create(&self, program: &MobilityProgram) -> Result<MobilityProgram> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_mobility_sqlite(sqlite_pool(&self.pool)?, program).await,
            DatabaseDriver::Mysql => create_mobility_mysql(mysql_pool(&self.pool)?, program).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<MobilityProgram>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_mobility_sqlite(sqlite_pool(&self.pool)?, id).await,
            DatabaseDriver::Mysql => get_mobility_mysql(mysql_pool(&self.pool)?, id).await,
        }
    }

    async fn list(&self) -> Result<Vec<MobilityProgram>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_mobility_sqlite(sqlite_pool(&self.pool)?, false).await,
            DatabaseDriver::Mysql => list_mobility_mysql(mysql_pool(&self.pool)?, false).await,
        }
    }

    async fn list_active(&self) -> Result<Vec<MobilityProgram>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_mobility_sqlite(sqlite_pool(&self.pool)?, true).await,
            DatabaseDriver::Mysql => list_mobility_mysql(mysql_pool(&self.pool)?, true).await,
        }
    }

    async fn update(&self, program: &MobilityProgram) -> Result<MobilityProgram> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_mobility_sqlite(sqlite_pool(&self.pool)?, program).await,
            DatabaseDriver::Mysql => update_mobility_mysql(mysql_pool(&self.pool)?, program).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query("DELETE FROM mobility_programs WHERE id = ?")
                .bind(id)
                .execute(sqlite_pool(&self.pool)?)
                .await
                .context("Failed to delete mobility program")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query("DELETE FROM mobility_programs WHERE id = ?")
                .bind(id)
                .execute(mysql_pool(&self.pool)?)
                .await
                .context("Failed to delete mobility program")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }
}

fn list_sql(active_only: bool) -> String {
    let filter = if active_only { "WHERE is_active = 1 " } else { "" };
    format!(
        "SELECT {} FROM mobility_programs {}ORDER BY application_deadline DESC, id DESC",
        MOBILITY_COLUMNS, filter
    )
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_mobility_sqlite(
    pool: &SqlitePool,
    program: &MobilityProgram,
) -> Result<MobilityProgram> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO mobility_programs (name, description, host_institution, country, city,
                                       start_date, end_date, application_deadline, requirements,
                                       benefits, contact_email, website, is_active,
                                       created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&program.name)
    .bind(&program.description)
    .bind(&program.host_institution)
    .bind(&program.country)
    .bind(&program.city)
    .bind(program.start_date)
    .bind(program.end_date)
    .bind(program.application_deadline)
    .bind(&program.requirements)
    .bind(&program.benefits)
    .bind(&program.contact_email)
    .bind(&program.website)
    .bind(program.is_active)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create mobility program")?;

    get_mobility_sqlite(pool, result.last_insert_rowid())
        .await?
        .context("Mobility program not found after creation")
}

async fn get_mobility_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<MobilityProgram>> {
    let sql = format!("SELECT {} FROM mobility_programs WHERE id = ?", MOBILITY_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get mobility program by ID")?;

    Ok(row.as_ref().map(row_to_mobility_sqlite))
}

async fn list_mobility_sqlite(pool: &SqlitePool, active_only: bool) -> Result<Vec<MobilityProgram>> {
    let rows = sqlx::query(&list_sql(active_only))
        .fetch_all(pool)
        .await
        .context("Failed to list mobility programs")?;

    Ok(rows.iter().map(row_to_mobility_sqlite).collect())
}

async fn update_mobility_sqlite(
    pool: &SqlitePool,
    program: &MobilityProgram,
) -> Result<MobilityProgram> {
    sqlx::query(
        r#"
        UPDATE mobility_programs
        SET name = ?, description = ?, host_institution = ?, country = ?, city = ?,
            start_date = ?, end_date = ?, application_deadline = ?, requirements = ?,
            benefits = ?, contact_email = ?, website = ?, is_active = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&program.name)
    .bind(&program.description)
    .bind(&program.host_institution)
    .bind(&program.country)
    .bind(&program.city)
    .bind(program.start_date)
    .bind(program.end_date)
    .bind(program.application_deadline)
    .bind(&program.requirements)
    .bind(&program.benefits)
    .bind(&program.contact_email)
    .bind(&program.website)
    .bind(program.is_active)
    .bind(Utc::now())
    .bind(program.id)
    .execute(pool)
    .await
    .context("Failed to update mobility program")?;

    get_mobility_sqlite(pool, program.id)
        .await?
        .context("Mobility program not found after update")
}

fn row_to_mobility_sqlite(row: &sqlx::sqlite::SqliteRow) -> MobilityProgram {
    MobilityProgram {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        host_institution: row.get("host_institution"),
        country: row.get("country"),
        city: row.get("city"),
        start_date: row.get("start_date"),
        end_date: row.get("end_date"),
        application_deadline: row.get("application_deadline"),
        requirements: row.get("requirements"),
        benefits: row.get("benefits"),
        contact_email: row.get("contact_email"),
        website: row.get("website"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_mobility_mysql(
    pool: &MySqlPool,
    program: &MobilityProgram,
) -> Result<MobilityProgram> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO mobility_programs (name, description, host_institution, country, city,
                                       start_date, end_date, application_deadline, requirements,
                                       benefits, contact_email, website, is_active,
                                       created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&program.name)
    .bind(&program.description)
    .bind(&program.host_institution)
    .bind(&program.country)
    .bind(&program.city)
    .bind(program.start_date)
    .bind(program.end_date)
    .bind(program.application_deadline)
    .bind(&program.requirements)
    .bind(&program.benefits)
    .bind(&program.contact_email)
    .bind(&program.website)
    .bind(program.is_active)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create mobility program")?;

    get_mobility_mysql(pool, result.last_insert_id() as i64)
        .await?
        .context("Mobility program not found after creation")
}

async fn get_mobility_mysql(pool: &MySqlPool, id: i64) -> Result<Option<MobilityProgram>> {
    let sql = format!("SELECT {} FROM mobility_programs WHERE id = ?", MOBILITY_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get mobility program by ID")?;

    Ok(row.as_ref().map(row_to_mobility_mysql))
}

async fn list_mobility_mysql(pool: &MySqlPool, active_only: bool) -> Result<Vec<MobilityProgram>> {
    let rows = sqlx::query(&list_sql(active_only))
        .fetch_all(pool)
        .await
        .context("Failed to list mobility programs")?;

    Ok(rows.iter().map(row_to_mobility_mysql).collect())
}

async fn update_mobility_mysql(
    pool: &MySqlPool,
    program: &MobilityProgram,
) -> Result<MobilityProgram> {
    sqlx::query(
        r#"
        UPDATE mobility_programs
        SET name = ?, description = ?, host_institution = ?, country = ?, city = ?,
            start_date = ?, end_date = ?, application_deadline = ?, requirements = ?,
            benefits = ?, contact_email = ?, website = ?, is_active = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&program.name)
    .bind(&program.description)
    .bind(&program.host_institution)
    .bind(&program.country)
    .bind(&program.city)
    .bind(program.start_date)
    .bind(program.end_date)
    .bind(program.application_deadline)
    .bind(&program.requirements)
    .bind(&program.benefits)
    .bind(&program.contact_email)
    .bind(&program.website)
    .bind(program.is_active)
    .bind(Utc::now())
    .bind(program.id)
    .execute(pool)
    .await
    .context("Failed to update mobility program")?;

    get_mobility_mysql(pool, program.id)
        .await?
        .context("Mobility program not found after update")
}

fn row_to_mobility_mysql(row: &sqlx::mysql::MySqlRow) -> MobilityProgram {
    MobilityProgram {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        host_institution: row.get("host_institution"),
        country: row.get("country"),
        city: row.get("city"),
        start_date: row.get("start_date"),
        end_date: row.get("end_date"),
        application_deadline: row.get("application_deadline"),
        requirements: row.get("requirements"),
        benefits: row.get("benefits"),
        contact_email: row.get("contact_email"),
        website: row.get("website"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
