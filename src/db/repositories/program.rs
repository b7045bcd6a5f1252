//! Program repository
//!
//! Database operations for educational programs.

use crate::config::DatabaseDriver;
use crate::db::{mysql_pool, sqlite_pool, DynDatabasePool};
use crate::models::Program;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

const PROGRAM_COLUMNS: &str =
    "id, name, description, duration_months, start_date, end_date, is_active, created_at, updated_at";

/// Program repository trait
#[async_trait]
pub trait ProgramRepository: Send + Sync {
    /// Create a new program
    async fn create(&self, program: &Program) -> Result<Program>;

    /// Get program by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Program>>;

    /// List all programs, newest first
    async fn list(&self) -> Result<Vec<Program>>;

    /// Update a program
    async fn update(&self, program: &Program) -> Result<Program>;

    /// Delete a program and, through the foreign key, its accreditations
    async fn delete(&self, id: i64) -> Result<bool>;
}

pub struct SqlxProgramRepository {
    pool: DynDatabasePool,
}

impl SqlxProgramRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ProgramRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ProgramRepository for SqlxProgramRepository {
    async fn create(&self, program: &Program) -> Result<Program> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_program_sqlite(sqlite_pool(&self.pool)?, program).await,
            DatabaseDriver::Mysql => create_program_mysql(mysql_pool(&self.pool)?, program).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Program>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_program_sqlite(sqlite_pool(&self.pool)?, id).await,
            DatabaseDriver::Mysql => get_program_mysql(mysql_pool(&self.pool)?, id).await,
        }
    }

    async fn list(&self) -> Result<Vec<Program>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_programs_sqlite(sqlite_pool(&self.pool)?).await,
            DatabaseDriver::Mysql => list_programs_mysql(mysql_pool(&self.pool)?).await,
        }
    }

    async fn update(&self, program: &Program) -> Result<Program> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_program_sqlite(sqlite_pool(&self.pool)?, program).await,
            DatabaseDriver::Mysql => update_program_mysql(mysql_pool(&self.pool)?, program).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query("DELETE FROM programs WHERE id = ?")
                .bind(id)
                .execute(sqlite_pool(&self.pool)?)
                .await
                .context("Failed to delete program")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query("DELETE FROM programs WHERE id = ?")
                .bind(id)
                .execute(mysql_pool(&self.pool)?)
                .await
                .context("Failed to delete program")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_program_sqlite(pool: &SqlitePool, program: &Program) -> Result<Program> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO programs (name, description, duration_months, start_date, end_date,
                              is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&program.name)
    .bind(&program.description)
    .bind(program.duration_months)
    .bind(program.start_date)
    .bind(program.end_date)
    .bind(program.is_active)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create program")?;

    get_program_sqlite(pool, result.last_insert_rowid())
        .await?
        .context("Program not found after creation")
}

async fn get_program_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Program>> {
    let sql = format!("SELECT {} FROM programs WHERE id = ?", PROGRAM_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get program by ID")?;

    Ok(row.as_ref().map(row_to_program_sqlite))
}

async fn list_programs_sqlite(pool: &SqlitePool) -> Result<Vec<Program>> {
    let sql = format!(
        "SELECT {} FROM programs ORDER BY created_at DESC, id DESC",
        PROGRAM_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .fetch_all(pool)
        .await
        .context("Failed to list programs")?;

    Ok(rows.iter().map(row_to_program_sqlite).collect())
}

async fn update_program_sqlite(pool: &SqlitePool, program: &Program) -> Result<Program> {
    sqlx::query(
        r#"
        UPDATE programs
        SET name = ?, description = ?, duration_months = ?, start_date = ?, end_date = ?,
            is_active = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&program.name)
    .bind(&program.description)
    .bind(program.duration_months)
    .bind(program.start_date)
    .bind(program.end_date)
    .bind(program.is_active)
    .bind(Utc::now())
    .bind(program.id)
    .execute(pool)
    .await
    .context("Failed to update program")?;

    get_program_sqlite(pool, program.id)
        .await?
        .context("Program not found after update")
}

fn row_to_program_sqlite(row: &sqlx::sqlite::SqliteRow) -> Program {
    Program {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        duration_months: row.get("duration_months"),
        start_date: row.get("start_date"),
        end_date: row.get("end_date"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_program_mysql(pool: &MySqlPool, program: &Program) -> Result<Program> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO programs (name, description, duration_months, start_date, end_date,
                              is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&program.name)
    .bind(&program.description)
    .bind(program.duration_months)
    .bind(program.start_date)
    .bind(program.end_date)
    .bind(program.is_active)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create program")?;

    get_program_mysql(pool, result.last_insert_id() as i64)
        .await?
        .context("Program not found after creation")
}

async fn get_program_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Program>> {
    let sql = format!("SELECT {} FROM programs WHERE id = ?", PROGRAM_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get program by ID")?;

    Ok(row.as_ref().map(row_to_program_mysql))
}

async fn list_programs_mysql(pool: &MySqlPool) -> Result<Vec<Program>> {
    let sql = format!(
        "SELECT {} FROM programs ORDER BY created_at DESC, id DESC",
        PROGRAM_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .fetch_all(pool)
        .await
        .context("Failed to list programs")?;

    Ok(rows.iter().map(row_to_program_mysql).collect())
}

async fn update_program_mysql(pool: &MySqlPool, program: &Program) -> Result<Program> {
    sqlx::query(
        r#"
        UPDATE programs
        SET name = ?, description = ?, duration_months = ?, start_date = ?, end_date = ?,
            is_active = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&program.name)
    .bind(&program.description)
    .bind(program.duration_months)
    .bind(program.start_date)
    .bind(program.end_date)
    .bind(program.is_active)
    .bind(Utc::now())
    .bind(program.id)
    .execute(pool)
    .await
    .context("Failed to update program")?;

    get_program_mysql(pool, program.id)
        .await?
        .context("Program not found after update")
}

fn row_to_program_mysql(row: &sqlx::mysql::MySqlRow) -> Program {
    Program {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        duration_months: row.get("duration_months"),
        start_date: row.get("start_date"),
        end_date: row.get("end_date"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
