//! Session repository
//!
//! Database operations for login sessions.
//!
//! This module provides:
//! - `SessionRepository` trait defining the interface for session data access
//! - `SqlxSessionRepository` implementing the trait for SQLite and MySQL

use crate::config::DatabaseDriver;
use crate::db::{mysql_pool, sqlite_pool, DynDatabasePool};
use crate::models::Session;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Session repository trait
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Create a new session
    async fn create(&self, session: &Session) -> Result<Session>;

    /// Get session by ID (cookie value)
    async fn get_by_id(&self, id: &str) -> Result<Option<Session>>;

    /// Delete a session
    async fn delete(&self, id: &str) -> Result<()>;

    /// Delete all sessions for a user
    async fn delete_by_user(&self, user_id: i64) -> Result<u64>;

    /// Delete all sessions for a user except `keep_id`
    async fn delete_by_user_except(&self, user_id: i64, keep_id: &str) -> Result<u64>;

    /// Delete expired sessions
    async fn delete_expired(&self) -> Result<i64>;
}

/// SQLx-based session repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxSessionRepository {
    pool: DynDatabasePool,
}

impl SqlxSessionRepository {
    /// Create a new SQLx session repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SessionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn create(&self, session: &Session) -> Result<Session> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_session_sqlite(sqlite_pool(&self.pool)?, session).await,
            DatabaseDriver::Mysql => create_session_mysql(mysql_pool(&self.pool)?, session).await,
        }
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Session>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_session_by_id_sqlite(sqlite_pool(&self.pool)?, id).await,
            DatabaseDriver::Mysql => get_session_by_id_mysql(mysql_pool(&self.pool)?, id).await,
        }
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let sql = "DELETE FROM sessions WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(id)
                    .execute(sqlite_pool(&self.pool)?)
                    .await
                    .context("Failed to delete session")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(id)
                    .execute(mysql_pool(&self.pool)?)
                    .await
                    .context("Failed to delete session")?;
            }
        }
        Ok(())
    }

    async fn delete_by_user(&self, user_id: i64) -> Result<u64> {
        let sql = "DELETE FROM sessions WHERE user_id = ?";
        let result = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(user_id)
                .execute(sqlite_pool(&self.pool)?)
                .await
                .context("Failed to delete sessions by user")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(user_id)
                .execute(mysql_pool(&self.pool)?)
                .await
                .context("Failed to delete sessions by user")?
                .rows_affected(),
        };
        Ok(result)
    }

    async fn delete_by_user_except(&self, user_id: i64, keep_id: &str) -> Result<u64> {
        let sql = "DELETE FROM sessions WHERE user_id = ? AND id <> ?";
        let result = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(user_id)
                .bind(keep_id)
                .execute(sqlite_pool(&self.pool)?)
                .await
                .context("Failed to delete other sessions")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(user_id)
                .bind(keep_id)
                .execute(mysql_pool(&self.pool)?)
                .await
                .context("Failed to delete other sessions")?
                .rows_affected(),
        };
        Ok(result)
    }

    async fn delete_expired(&self) -> Result<i64> {
        let sql = "DELETE FROM sessions WHERE expires_at < ?";
        let now = Utc::now();
        let result = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(now)
                .execute(sqlite_pool(&self.pool)?)
                .await
                .context("Failed to delete expired sessions")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(now)
                .execute(mysql_pool(&self.pool)?)
                .await
                .context("Failed to delete expired sessions")?
                .rows_affected(),
        };
        Ok(result as i64)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_session_sqlite(pool: &SqlitePool, session: &Session) -> Result<Session> {
    sqlx::query(
        r#"
        INSERT INTO sessions (id, user_id, expires_at, created_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(&session.id)
    .bind(session.user_id)
    .bind(session.expires_at)
    .bind(session.created_at)
    .execute(pool)
    .await
    .context("Failed to create session")?;

    Ok(session.clone())
}

async fn get_session_by_id_sqlite(pool: &SqlitePool, id: &str) -> Result<Option<Session>> {
    let row = sqlx::query("SELECT id, user_id, expires_at, created_at FROM sessions WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get session by ID")?;

    Ok(row.map(|row| Session {
        id: row.get("id"),
        user_id: row.get("user_id"),
        expires_at: row.get("expires_at"),
        created_at: row.get("created_at"),
    }))
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_session_mysql(pool: &MySqlPool, session: &Session) -> Result<Session> {
    sqlx::query(
        r#"
        INSERT INTO sessions (id, user_id, expires_at, created_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(&session.id)
    .bind(session.user_id)
    .bind(session.expires_at)
    .bind(session.created_at)
    .execute(pool)
    .await
    .context("Failed to create session")?;

    Ok(session.clone())
}

async fn get_session_by_id_mysql(pool: &MySqlPool, id: &str) -> Result<Option<Session>> {
    let row = sqlx::query("SELECT id, user_id, expires_at, created_at FROM sessions WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get session by ID")?;

    Ok(row.map(|row| Session {
        id: row.get("id"),
        user_id: row.get("user_id"),
        expires_at: row.get("expires_at"),
        created_at: row.get("created_at"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{Role, User};
    use chrono::Duration;

    async fn setup_test_repo() -> (DynDatabasePool, SqlxSessionRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxSessionRepository::new(pool.clone());
        (pool, repo)
    }

    // Sessions reference users, so every test needs real accounts
    async fn create_test_user(pool: &DynDatabasePool, email: &str) -> i64 {
        SqlxUserRepository::new(pool.clone())
            .create(&User::new(email.to_string(), "hash".to_string(), Role::Regular))
            .await
            .expect("Failed to create test user")
            .id
    }

    #[tokio::test]
    async fn test_create_and_get_session() {
        let (pool, repo) = setup_test_repo().await;
        let user_id = create_test_user(&pool, "s@example.com").await;

        let session = Session::new(user_id, Duration::days(14));
        let created = repo.create(&session).await.expect("Failed to create session");
        assert_eq!(created.id, session.id);

        let found = repo
            .get_by_id(&session.id)
            .await
            .expect("Failed to get session")
            .expect("Session not found");
        assert_eq!(found.user_id, user_id);

        assert!(repo.get_by_id("nonexistent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_session() {
        let (pool, repo) = setup_test_repo().await;
        let user_id = create_test_user(&pool, "s@example.com").await;

        let session = Session::new(user_id, Duration::days(14));
        repo.create(&session).await.unwrap();
        repo.delete(&session.id).await.expect("Failed to delete session");

        assert!(repo.get_by_id(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_sessions_by_user() {
        let (pool, repo) = setup_test_repo().await;
        let first = create_test_user(&pool, "one@example.com").await;
        let second = create_test_user(&pool, "two@example.com").await;

        let s1 = Session::new(first, Duration::days(1));
        let s2 = Session::new(first, Duration::days(1));
        let s3 = Session::new(second, Duration::days(1));
        for s in [&s1, &s2, &s3] {
            repo.create(s).await.unwrap();
        }

        assert_eq!(repo.delete_by_user(first).await.unwrap(), 2);
        assert!(repo.get_by_id(&s1.id).await.unwrap().is_none());
        assert!(repo.get_by_id(&s2.id).await.unwrap().is_none());
        assert!(repo.get_by_id(&s3.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_sessions_except_current() {
        let (pool, repo) = setup_test_repo().await;
        let user_id = create_test_user(&pool, "keep@example.com").await;

        let current = Session::new(user_id, Duration::days(1));
        let other = Session::new(user_id, Duration::days(1));
        repo.create(&current).await.unwrap();
        repo.create(&other).await.unwrap();

        assert_eq!(repo.delete_by_user_except(user_id, &current.id).await.unwrap(), 1);
        assert!(repo.get_by_id(&current.id).await.unwrap().is_some());
        assert!(repo.get_by_id(&other.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_expired_sessions() {
        let (pool, repo) = setup_test_repo().await;
        let user_id = create_test_user(&pool, "old@example.com").await;

        let expired = Session::new(user_id, Duration::days(-1));
        let valid = Session::new(user_id, Duration::days(7));
        repo.create(&expired).await.unwrap();
        repo.create(&valid).await.unwrap();

        assert_eq!(repo.delete_expired().await.unwrap(), 1);
        assert!(repo.get_by_id(&expired.id).await.unwrap().is_none());
        assert!(repo.get_by_id(&valid.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_sessions_removed_with_user() {
        let (pool, repo) = setup_test_repo().await;
        let user_id = create_test_user(&pool, "cascade@example.com").await;

        let session = Session::new(user_id, Duration::days(1));
        repo.create(&session).await.unwrap();
        SqlxUserRepository::new(pool.clone())
            .delete(user_id)
            .await
            .unwrap();

        assert!(repo.get_by_id(&session.id).await.unwrap().is_none());
    }
}
