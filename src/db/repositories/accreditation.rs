//! Accreditation repository
//!
//! Rows are always loaded joined with their program so `program_name` is
//! filled in.

use crate::config::DatabaseDriver;
use crate::db::{mysql_pool, sqlite_pool, DynDatabasePool};
use crate::models::Accreditation;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

const SELECT_ACCREDITATIONS: &str = r#"
    SELECT a.id, a.program_id, p.name AS program_name, a.name, a.organization,
           a.date_received, a.expiration_date, a.certificate_number, a.description,
           a.created_at, a.updated_at
    FROM accreditations a
    INNER JOIN programs p ON p.id = a.program_id
"#;

const ORDER_BY: &str = "ORDER BY a.date_received DESC, a.id DESC";

#[async_trait]
pub trait AccreditationRepository: Send + Sync {
    async fn create(&self, accreditation: &Accreditation) -> Result<Accreditation>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Accreditation>>;

    /// All accreditations, most recently received first
    async fn list(&self) -> Result<Vec<Accreditation>>;

    /// Accreditations of one program, most recently received first
    async fn list_by_program(&self, program_id: i64) -> Result<Vec<Accreditation>>;

    async fn update(&self, accreditation: &Accreditation) -> Result<Accreditation>;

    async fn delete(&self, id: i64) -> Result<bool>;
}

pub struct SqlxAccreditationRepository {
    pool: DynDatabasePool,
}

impl SqlxAccreditationRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn AccreditationRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl AccreditationRepository for SqlxAccreditationRepository {
    async fn create(&self, accreditation: &Accreditation) -> Result<Accreditation> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_accreditation_sqlite(sqlite_pool(&self.pool)?, accreditation).await
            }
            DatabaseDriver::Mysql => {
                create_accreditation_mysql(mysql_pool(&self.pool)?, accreditation).await
            }
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Accreditation>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_accreditation_sqlite(sqlite_pool(&self.pool)?, id).await,
            DatabaseDriver::Mysql => get_accreditation_mysql(mysql_pool(&self.pool)?, id).await,
        }
    }

    async fn list(&self) -> Result<Vec<Accreditation>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_accreditations_sqlite(sqlite_pool(&self.pool)?, None).await
            }
            DatabaseDriver::Mysql => list_accreditations_mysql(mysql_pool(&self.pool)?, None).await,
        }
    }

    async fn list_by_program(&self, program_id: i64) -> Result<Vec<Accreditation>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_accreditations_sqlite(sqlite_pool(&self.pool)?, Some(program_id)).await
            }
            DatabaseDriver::Mysql => {
                list_accreditations_mysql(mysql_pool(&self.pool)?, Some(program_id)).await
            }
        }
    }

    async fn update(&self, accreditation: &Accreditation) -> Result<Accreditation> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                update_accreditation_sqlite(sqlite_pool(&self.pool)?, accreditation).await
            }
            DatabaseDriver::Mysql => {
                update_accreditation_mysql(mysql_pool(&self.pool)?, accreditation).await
            }
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query("DELETE FROM accreditations WHERE id = ?")
                .bind(id)
                .execute(sqlite_pool(&self.pool)?)
                .await
                .context("Failed to delete accreditation")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query("DELETE FROM accreditations WHERE id = ?")
                .bind(id)
                .execute(mysql_pool(&self.pool)?)
                .await
                .context("Failed to delete accreditation")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_accreditation_sqlite(
    pool: &SqlitePool,
    accreditation: &Accreditation,
) -> Result<Accreditation> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO accreditations (program_id, name, organization, date_received,
                                    expiration_date, certificate_number, description,
                                    created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(accreditation.program_id)
    .bind(&accreditation.name)
    .bind(&accreditation.organization)
    .bind(accreditation.date_received)
    .bind(accreditation.expiration_date)
    .bind(&accreditation.certificate_number)
    .bind(&accreditation.description)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create accreditation")?;

    get_accreditation_sqlite(pool, result.last_insert_rowid())
        .await?
        .context("Accreditation not found after creation")
}

async fn get_accreditation_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Accreditation>> {
    let sql = format!("{} WHERE a.id = ?", SELECT_ACCREDITATIONS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get accreditation by ID")?;

    Ok(row.as_ref().map(row_to_accreditation_sqlite))
}

async fn list_accreditations_sqlite(
    pool: &SqlitePool,
    program_id: Option<i64>,
) -> Result<Vec<Accreditation>> {
    let rows = match program_id {
        Some(program_id) => {
            let sql = format!("{} WHERE a.program_id = ? {}", SELECT_ACCREDITATIONS, ORDER_BY);
            sqlx::query(&sql).bind(program_id).fetch_all(pool).await
        }
        None => {
            let sql = format!("{} {}", SELECT_ACCREDITATIONS, ORDER_BY);
            sqlx::query(&sql).fetch_all(pool).await
        }
    }
    .context("Failed to list accreditations")?;

    Ok(rows.iter().map(row_to_accreditation_sqlite).collect())
}

async fn update_accreditation_sqlite(
    pool: &SqlitePool,
    accreditation: &Accreditation,
) -> Result<Accreditation> {
    sqlx::query(
        r#"
        UPDATE accreditations
        SET program_id = ?, name = ?, organization = ?, date_received = ?, expiration_date = ?,
            certificate_number = ?, description = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(accreditation.program_id)
    .bind(&accreditation.name)
    .bind(&accreditation.organization)
    .bind(accreditation.date_received)
    .bind(accreditation.expiration_date)
    .bind(&accreditation.certificate_number)
    .bind(&accreditation.description)
    .bind(Utc::now())
    .bind(accreditation.id)
    .execute(pool)
    .await
    .context("Failed to update accreditation")?;

    get_accreditation_sqlite(pool, accreditation.id)
        .await?
        .context("Accreditation not found after update")
}

fn row_to_accreditation_sqlite(row: &sqlx::sqlite::SqliteRow) -> Accreditation {
    Accreditation {
        id: row.get("id"),
        program_id: row.get("program_id"),
        program_name: row.get("program_name"),
        name: row.get("name"),
        organization: row.get("organization"),
        date_received: row.get("date_received"),
        expiration_date: row.get("expiration_date"),
        certificate_number: row.get("certificate_number"),
        description: row.get("description"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_accreditation_mysql(
    pool: &MySqlPool,
    accreditation: &Accreditation,
) -> Result<Accreditation> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO accreditations (program_id, name, organization, date_received,
                                    expiration_date, certificate_number, description,
                                    created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(accreditation.program_id)
    .bind(&accreditation.name)
    .bind(&accreditation.organization)
    .bind(accreditation.date_received)
    .bind(accreditation.expiration_date)
    .bind(&accreditation.certificate_number)
    .bind(&accreditation.description)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create accreditation")?;

    get_accreditation_mysql(pool, result.last_insert_id() as i64)
        .await?
        .context("Accreditation not found after creation")
}

async fn get_accreditation_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Accreditation>> {
    let sql = format!("{} WHERE a.id = ?", SELECT_ACCREDITATIONS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get accreditation by ID")?;

    Ok(row.as_ref().map(row_to_accreditation_mysql))
}

async fn list_accreditations_mysql(
    pool: &MySqlPool,
    program_id: Option<i64>,
) -> Result<Vec<Accreditation>> {
    let rows = match program_id {
        Some(program_id) => {
            let sql = format!("{} WHERE a.program_id = ? {}", SELECT_ACCREDITATIONS, ORDER_BY);
            sqlx::query(&sql).bind(program_id).fetch_all(pool).await
        }
        None => {
            let sql = format!("{} {}", SELECT_ACCREDITATIONS, ORDER_BY);
            sqlx::query(&sql).fetch_all(pool).await
        }
    }
    .context("Failed to list accreditations")?;

    Ok(rows.iter().map(row_to_accreditation_mysql).collect())
}

async fn update_accreditation_mysql(
    pool: &MySqlPool,
    accreditation: &Accreditation,
) -> Result<Accreditation> {
    sqlx::query(
        r#"
        UPDATE accreditations
        SET program_id = ?, name = ?, organization = ?, date_received = ?, expiration_date = ?,
            certificate_number = ?, description = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(accreditation.program_id)
    .bind(&accreditation.name)
    .bind(&accreditation.organization)
    .bind(accreditation.date_received)
    .bind(accreditation.expiration_date)
    .bind(&accreditation.certificate_number)
    .bind(&accreditation.description)
    .bind(Utc::now())
    .bind(accreditation.id)
    .execute(pool)
    .await
    .context("Failed to update accreditation")?;

    get_accreditation_mysql(pool, accreditation.id)
        .await?
        .context("Accreditation not found after update")
}

fn row_to_accreditation_mysql(row: &sqlx::mysql::MySqlRow) -> Accreditation {
    Accreditation {
        id: row.get("id"),
        program_id: row.get("program_id"),
        program_name: row.get("program_name"),
        name: row.get("name"),
        organization: row.get("organization"),
        date_received: row.get("date_received"),
        expiration_date: row.get("expiration_date"),
        certificate_number: row.get("certificate_number"),
        description: row.get("description"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
