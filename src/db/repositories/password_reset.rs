//! Password reset token repository
//!
//! Tokens are stored by SHA-256 digest. Redemption claims the token row and
//! rewrites the owner's credentials in one transaction, so a token can only
//! ever change one password.

use crate::config::DatabaseDriver;
use crate::db::{mysql_pool, sqlite_pool, DynDatabasePool};
use crate::models::PasswordResetToken;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait PasswordResetRepository: Send + Sync {
    /// Persist a freshly issued token
    async fn create(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<PasswordResetToken>;

    /// Look up a token by digest, whatever its state
    async fn get_by_hash(&self, token_hash: &str) -> Result<Option<PasswordResetToken>>;

    /// Claim an unused, unexpired token and set the owner's new password.
    ///
    /// Returns the owner's id, or `None` when no redeemable token matched.
    /// All of the owner's sessions are dropped in the same transaction.
    async fn redeem(
        &self,
        token_hash: &str,
        new_password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<i64>>;
}

pub struct SqlxPasswordResetRepository {
    pool: DynDatabasePool,
}

impl SqlxPasswordResetRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PasswordResetRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PasswordResetRepository for SqlxPasswordResetRepository {
    async fn create(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<PasswordResetToken> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_token_sqlite(sqlite_pool(&self.pool)?, user_id, token_hash, expires_at).await
            }
            DatabaseDriver::Mysql => {
                create_token_mysql(mysql_pool(&self.pool)?, user_id, token_hash, expires_at).await
            }
        }
    }

    async fn get_by_hash(&self, token_hash: &str) -> Result<Option<PasswordResetToken>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_token_sqlite(sqlite_pool(&self.pool)?, token_hash).await,
            DatabaseDriver::Mysql => get_token_mysql(mysql_pool(&self.pool)?, token_hash).await,
        }
    }

    async fn redeem(
        &self,
        token_hash: &str,
        new_password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<i64>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                redeem_token_sqlite(sqlite_pool(&self.pool)?, token_hash, new_password_hash, now)
                    .await
            }
            DatabaseDriver::Mysql => {
                redeem_token_mysql(mysql_pool(&self.pool)?, token_hash, new_password_hash, now)
                    .await
            }
        }
    }
}

const CLAIM_SQL: &str = r#"
    UPDATE password_reset_tokens
    SET is_used = ?, used_at = ?
    WHERE token_hash = ? AND is_used = ? AND expires_at > ?
"#;

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_token_sqlite(
    pool: &SqlitePool,
    user_id: i64,
    token_hash: &str,
    expires_at: DateTime<Utc>,
) -> Result<PasswordResetToken> {
    let result = sqlx::query(
        r#"
        INSERT INTO password_reset_tokens (user_id, token_hash, created_at, expires_at, is_used)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(token_hash)
    .bind(Utc::now())
    .bind(expires_at)
    .bind(false)
    .execute(pool)
    .await
    .context("Failed to create password reset token")?;

    let id = result.last_insert_rowid();
    let row = sqlx::query(
        r#"
        SELECT id, user_id, token_hash, created_at, expires_at, is_used, used_at
        FROM password_reset_tokens WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_one(pool)
    .await
    .context("Password reset token not found after creation")?;

    Ok(row_to_token_sqlite(&row))
}

async fn get_token_sqlite(pool: &SqlitePool, token_hash: &str) -> Result<Option<PasswordResetToken>> {
    let row = sqlx::query(
        r#"
        SELECT id, user_id, token_hash, created_at, expires_at, is_used, used_at
        FROM password_reset_tokens WHERE token_hash = ?
        "#,
    )
    .bind(token_hash)
    .fetch_optional(pool)
    .await
    .context("Failed to get password reset token")?;

    Ok(row.as_ref().map(row_to_token_sqlite))
}

async fn redeem_token_sqlite(
    pool: &SqlitePool,
    token_hash: &str,
    new_password_hash: &str,
    now: DateTime<Utc>,
) -> Result<Option<i64>> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let claimed = sqlx::query(CLAIM_SQL)
        .bind(true)
        .bind(now)
        .bind(token_hash)
        .bind(false)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to claim password reset token")?
        .rows_affected();

    if claimed != 1 {
        tx.rollback().await.context("Failed to roll back transaction")?;
        return Ok(None);
    }

    let user_id: i64 = sqlx::query("SELECT user_id FROM password_reset_tokens WHERE token_hash = ?")
        .bind(token_hash)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to load token owner")?
        .get("user_id");

    sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
        .bind(new_password_hash)
        .bind(now)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .context("Failed to update password")?;

    sqlx::query("DELETE FROM sessions WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete sessions")?;

    tx.commit().await.context("Failed to commit password reset")?;
    Ok(Some(user_id))
}

fn row_to_token_sqlite(row: &sqlx::sqlite::SqliteRow) -> PasswordResetToken {
    PasswordResetToken {
        id: row.get("id"),
        user_id: row.get("user_id"),
        token_hash: row.get("token_hash"),
        created_at: row.get("created_at"),
        expires_at: row.get("expires_at"),
        is_used: row.get("is_used"),
        used_at: row.get("used_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_token_mysql(
    pool: &MySqlPool,
    user_id: i64,
    token_hash: &str,
    expires_at: DateTime<Utc>,
) -> Result<PasswordResetToken> {
    let result = sqlx::query(
        r#"
        INSERT INTO password_reset_tokens (user_id, token_hash, created_at, expires_at, is_used)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(token_hash)
    .bind(Utc::now())
    .bind(expires_at)
    .bind(false)
    .execute(pool)
    .await
    .context("Failed to create password reset token")?;

    let id = result.last_insert_id() as i64;
    let row = sqlx::query(
        r#"
        SELECT id, user_id, token_hash, created_at, expires_at, is_used, used_at
        FROM password_reset_tokens WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_one(pool)
    .await
    .context("Password reset token not found after creation")?;

    Ok(row_to_token_mysql(&row))
}

async fn get_token_mysql(pool: &MySqlPool, token_hash: &str) -> Result<Option<PasswordResetToken>> {
    let row = sqlx::query(
        r#"
        SELECT id, user_id, token_hash, created_at, expires_at, is_used, used_at
        FROM password_reset_tokens WHERE token_hash = ?
        "#,
    )
    .bind(token_hash)
    .fetch_optional(pool)
    .await
    .context("Failed to get password reset token")?;

    Ok(row.as_ref().map(row_to_token_mysql))
}

async fn redeem_token_mysql(
    pool: &MySqlPool,
    token_hash: &str,
    new_password_hash: &str,
    now: DateTime<Utc>,
) -> Result<Option<i64>> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    // InnoDB row lock on the token serializes concurrent claims
    let claimed = sqlx::query(CLAIM_SQL)
        .bind(true)
        .bind(now)
        .bind(token_hash)
        .bind(false)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to claim password reset token")?
        .rows_affected();

    if claimed != 1 {
        tx.rollback().await.context("Failed to roll back transaction")?;
        return Ok(None);
    }

    let user_id: i64 = sqlx::query("SELECT user_id FROM password_reset_tokens WHERE token_hash = ?")
        .bind(token_hash)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to load token owner")?
        .get("user_id");

    sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
        .bind(new_password_hash)
        .bind(now)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .context("Failed to update password")?;

    sqlx::query("DELETE FROM sessions WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete sessions")?;

    tx.commit().await.context("Failed to commit password reset")?;
    Ok(Some(user_id))
}

fn row_to_token_mysql(row: &sqlx::mysql::MySqlRow) -> PasswordResetToken {
    PasswordResetToken {
        id: row.get("id"),
        user_id: row.get("user_id"),
        token_hash: row.get("token_hash"),
        created_at: row.get("created_at"),
        expires_at: row.get("expires_at"),
        is_used: row.get("is_used"),
        used_at: row.get("used_at"),
    }
}
