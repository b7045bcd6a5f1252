//! User repository
//!
//! Database operations for user accounts.
//!
//! This module provides:
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing the trait for SQLite and MySQL
//!
//! Emails are expected to be normalized by the caller.

use crate::config::DatabaseDriver;
use crate::db::{mysql_pool, sqlite_pool, DynDatabasePool};
use crate::models::{Role, User};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

pub(crate) const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, university_name, \
     role, is_active, is_staff, last_login, date_joined, updated_at";

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user
    async fn create(&self, user: &User) -> Result<User>;

    /// Get user by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Get user by (normalized) email
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Check whether an email is registered
    async fn exists_by_email(&self, email: &str) -> Result<bool>;

    /// List all users, oldest account first
    async fn list(&self) -> Result<Vec<User>>;

    /// Write every mutable column of a user
    async fn update(&self, user: &User) -> Result<User>;

    /// Replace the stored password hash
    async fn update_password(&self, id: i64, password_hash: &str) -> Result<()>;

    /// Record a successful login
    async fn update_last_login(&self, id: i64, at: DateTime<Utc>) -> Result<()>;

    /// Delete a user. Returns false if no such user existed.
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Count users with the given role
    async fn count_by_role(&self, role: Role) -> Result<i64>;
}

/// SQLx-based user repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    /// Create a new SQLx user repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_user_sqlite(sqlite_pool(&self.pool)?, user).await,
            DatabaseDriver::Mysql => create_user_mysql(mysql_pool(&self.pool)?, user).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_user_by_id_sqlite(sqlite_pool(&self.pool)?, id).await,
            DatabaseDriver::Mysql => get_user_by_id_mysql(mysql_pool(&self.pool)?, id).await,
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_user_by_email_sqlite(sqlite_pool(&self.pool)?, email).await
            }
            DatabaseDriver::Mysql => get_user_by_email_mysql(mysql_pool(&self.pool)?, email).await,
        }
    }

    async fn exists_by_email(&self, email: &str) -> Result<bool> {
        Ok(self.get_by_email(email).await?.is_some())
    }

    async fn list(&self) -> Result<Vec<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_users_sqlite(sqlite_pool(&self.pool)?).await,
            DatabaseDriver::Mysql => list_users_mysql(mysql_pool(&self.pool)?).await,
        }
    }

    async fn update(&self, user: &User) -> Result<User> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_user_sqlite(sqlite_pool(&self.pool)?, user).await,
            DatabaseDriver::Mysql => update_user_mysql(mysql_pool(&self.pool)?, user).await,
        }
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<()> {
        let now = Utc::now();
        let sql = "UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(password_hash)
                    .bind(now)
                    .bind(id)
                    .execute(sqlite_pool(&self.pool)?)
                    .await
                    .context("Failed to update password")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(password_hash)
                    .bind(now)
                    .bind(id)
                    .execute(mysql_pool(&self.pool)?)
                    .await
                    .context("Failed to update password")?;
            }
        }
        Ok(())
    }

    async fn update_last_login(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        let sql = "UPDATE users SET last_login = ? WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(at)
                    .bind(id)
                    .execute(sqlite_pool(&self.pool)?)
                    .await
                    .context("Failed to update last login")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(at)
                    .bind(id)
                    .execute(mysql_pool(&self.pool)?)
                    .await
                    .context("Failed to update last login")?;
            }
        }
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query("DELETE FROM users WHERE id = ?")
                .bind(id)
                .execute(sqlite_pool(&self.pool)?)
                .await
                .context("Failed to delete user")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query("DELETE FROM users WHERE id = ?")
                .bind(id)
                .execute(mysql_pool(&self.pool)?)
                .await
                .context("Failed to delete user")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn count_by_role(&self, role: Role) -> Result<i64> {
        let sql = "SELECT COUNT(*) AS count FROM users WHERE role = ?";
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(role.to_string())
                .fetch_one(sqlite_pool(&self.pool)?)
                .await
                .context("Failed to count users")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(role.to_string())
                .fetch_one(mysql_pool(&self.pool)?)
                .await
                .context("Failed to count users")?
                .get("count"),
        };
        Ok(count)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_user_sqlite(pool: &SqlitePool, user: &User) -> Result<User> {
    let result = sqlx::query(
        r#"
        INSERT INTO users (email, password_hash, first_name, last_name, university_name,
                           role, is_active, is_staff, last_login, date_joined, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.university_name)
    .bind(user.role.to_string())
    .bind(user.is_active)
    .bind(user.is_staff)
    .bind(user.last_login)
    .bind(user.date_joined)
    .bind(user.updated_at)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    let id = result.last_insert_rowid();
    get_user_by_id_sqlite(pool, id)
        .await?
        .context("User not found after creation")
}

async fn get_user_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by ID")?;

    row.as_ref().map(row_to_user_sqlite).transpose()
}

async fn get_user_by_email_sqlite(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(email)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by email")?;

    row.as_ref().map(row_to_user_sqlite).transpose()
}

async fn list_users_sqlite(pool: &SqlitePool) -> Result<Vec<User>> {
    let sql = format!("SELECT {} FROM users ORDER BY id ASC", USER_COLUMNS);
    let rows = sqlx::query(&sql)
        .fetch_all(pool)
        .await
        .context("Failed to list users")?;

    rows.iter().map(row_to_user_sqlite).collect()
}

async fn update_user_sqlite(pool: &SqlitePool, user: &User) -> Result<User> {
    sqlx::query(
        r#"
        UPDATE users
        SET email = ?, first_name = ?, last_name = ?, university_name = ?,
            role = ?, is_active = ?, is_staff = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&user.email)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.university_name)
    .bind(user.role.to_string())
    .bind(user.is_active)
    .bind(user.is_staff)
    .bind(Utc::now())
    .bind(user.id)
    .execute(pool)
    .await
    .context("Failed to update user")?;

    get_user_by_id_sqlite(pool, user.id)
        .await?
        .context("User not found after update")
}

pub(crate) fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    let role: String = row.get("role");
    Ok(User {
        id: row.get("id"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        university_name: row.get("university_name"),
        role: role.parse()?,
        is_active: row.get("is_active"),
        is_staff: row.get("is_staff"),
        last_login: row.get("last_login"),
        date_joined: row.get("date_joined"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_user_mysql(pool: &MySqlPool, user: &User) -> Result<User> {
    let result = sqlx::query(
        r#"
        INSERT INTO users (email, password_hash, first_name, last_name, university_name,
                           role, is_active, is_staff, last_login, date_joined, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.university_name)
    .bind(user.role.to_string())
    .bind(user.is_active)
    .bind(user.is_staff)
    .bind(user.last_login)
    .bind(user.date_joined)
    .bind(user.updated_at)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    let id = result.last_insert_id() as i64;
    get_user_by_id_mysql(pool, id)
        .await?
        .context("User not found after creation")
}

async fn get_user_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by ID")?;

    row.as_ref().map(row_to_user_mysql).transpose()
}

async fn get_user_by_email_mysql(pool: &MySqlPool, email: &str) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(email)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by email")?;

    row.as_ref().map(row_to_user_mysql).transpose()
}

async fn list_users_mysql(pool: &MySqlPool) -> Result<Vec<User>> {
    let sql = format!("SELECT {} FROM users ORDER BY id ASC", USER_COLUMNS);
    let rows = sqlx::query(&sql)
        .fetch_all(pool)
        .await
        .context("Failed to list users")?;

    rows.iter().map(row_to_user_mysql).collect()
}

async fn update_user_mysql(pool: &MySqlPool, user: &User) -> Result<User> {
    sqlx::query(
        r#"
        UPDATE users
        SET email = ?, first_name = ?, last_name = ?, university_name = ?,
            role = ?, is_active = ?, is_staff = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&user.email)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.university_name)
    .bind(user.role.to_string())
    .bind(user.is_active)
    .bind(user.is_staff)
    .bind(Utc::now())
    .bind(user.id)
    .execute(pool)
    .await
    .context("Failed to update user")?;

    get_user_by_id_mysql(pool, user.id)
        .await?
        .context("User not found after update")
}

pub(crate) fn row_to_user_mysql(row: &sqlx::mysql::MySqlRow) -> Result<User> {
    let role: String = row.get("role");
    Ok(User {
        id: row.get("id"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        university_name: row.get("university_name"),
        role: role.parse()?,
        is_active: row.get("is_active"),
        is_staff: row.get("is_staff"),
        last_login: row.get("last_login"),
        date_joined: row.get("date_joined"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> (DynDatabasePool, SqlxUserRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxUserRepository::new(pool.clone());
        (pool, repo)
    }

    fn create_test_user(email: &str, role: Role) -> User {
        let mut user = User::new(email.to_string(), "hashed_password".to_string(), role);
        user.first_name = "Test".to_string();
        user.last_name = "User".to_string();
        user
    }

    #[tokio::test]
    async fn test_create_user() {
        let (_pool, repo) = setup_test_repo().await;

        let created = repo
            .create(&create_test_user("test@example.com", Role::Regular))
            .await
            .expect("Failed to create user");

        assert!(created.id > 0);
        assert_eq!(created.email, "test@example.com");
        assert_eq!(created.role, Role::Regular);
        assert!(created.is_active);
        assert!(created.last_login.is_none());
    }

    #[tokio::test]
    async fn test_create_university_user() {
        let (_pool, repo) = setup_test_repo().await;

        let mut user = create_test_user("u@ex.edu", Role::University);
        user.university_name = Some("Example University".to_string());
        let created = repo.create(&user).await.expect("Failed to create user");

        assert_eq!(created.role, Role::University);
        assert_eq!(created.university_name.as_deref(), Some("Example University"));
    }

    #[tokio::test]
    async fn test_get_user_by_id_and_email() {
        let (_pool, repo) = setup_test_repo().await;
        let created = repo
            .create(&create_test_user("find@example.com", Role::Regular))
            .await
            .expect("Failed to create user");

        let by_id = repo
            .get_by_id(created.id)
            .await
            .expect("Failed to get user")
            .expect("User not found");
        assert_eq!(by_id.email, "find@example.com");

        let by_email = repo
            .get_by_email("find@example.com")
            .await
            .expect("Failed to get user")
            .expect("User not found");
        assert_eq!(by_email.id, created.id);

        assert!(repo.get_by_id(99999).await.unwrap().is_none());
        assert!(repo.get_by_email("nobody@example.com").await.unwrap().is_none());
        assert!(repo.exists_by_email("find@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_unique_email_constraint() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(&create_test_user("dup@example.com", Role::Regular))
            .await
            .expect("Failed to create user");

        let result = repo
            .create(&create_test_user("dup@example.com", Role::University))
            .await;
        assert!(crate::db::repositories::is_unique_violation(&result.unwrap_err()));
    }

    #[tokio::test]
    async fn test_update_user() {
        let (_pool, repo) = setup_test_repo().await;
        let mut user = repo
            .create(&create_test_user("edit@example.com", Role::Regular))
            .await
            .expect("Failed to create user");

        user.first_name = "Changed".to_string();
        user.role = Role::Administrator;
        user.is_active = false;
        let updated = repo.update(&user).await.expect("Failed to update user");

        assert_eq!(updated.first_name, "Changed");
        assert_eq!(updated.role, Role::Administrator);
        assert!(!updated.is_active);
        assert_eq!(updated.password_hash, "hashed_password");
    }

    #[tokio::test]
    async fn test_update_password_and_last_login() {
        let (_pool, repo) = setup_test_repo().await;
        let user = repo
            .create(&create_test_user("pw@example.com", Role::Regular))
            .await
            .expect("Failed to create user");

        repo.update_password(user.id, "new_hash")
            .await
            .expect("Failed to update password");
        let now = Utc::now();
        repo.update_last_login(user.id, now)
            .await
            .expect("Failed to update last login");

        let found = repo.get_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(found.password_hash, "new_hash");
        assert!(found.last_login.is_some());
    }

    #[tokio::test]
    async fn test_delete_user() {
        let (_pool, repo) = setup_test_repo().await;
        let user = repo
            .create(&create_test_user("gone@example.com", Role::Regular))
            .await
            .expect("Failed to create user");

        assert!(repo.delete(user.id).await.expect("Failed to delete user"));
        assert!(!repo.delete(user.id).await.expect("Failed to delete user"));
        assert!(repo.get_by_id(user.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_and_count_by_role() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(&create_test_user("a@example.com", Role::Administrator))
            .await
            .unwrap();
        repo.create(&create_test_user("b@example.com", Role::Regular))
            .await
            .unwrap();
        repo.create(&create_test_user("c@example.com", Role::Regular))
            .await
            .unwrap();

        let users = repo.list().await.expect("Failed to list users");
        assert_eq!(users.len(), 3);
        assert_eq!(users[0].email, "a@example.com");

        assert_eq!(repo.count_by_role(Role::Administrator).await.unwrap(), 1);
        assert_eq!(repo.count_by_role(Role::Regular).await.unwrap(), 2);
        assert_eq!(repo.count_by_role(Role::University).await.unwrap(), 0);
    }
}
