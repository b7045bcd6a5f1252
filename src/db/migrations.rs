//! Database migrations
//!
//! Migrations are embedded in the binary as SQL strings, one variant per
//! driver, and tracked in the `_migrations` table.
//!
//! ```ignore
//! let pool = create_pool(&config).await?;
//! migrations::run_migrations(&pool).await?;
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};

use super::{mysql_pool, sqlite_pool, DynDatabasePool};
use crate::config::DatabaseDriver;

/// A database migration with SQL for both SQLite and MySQL
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version number (unique, applied in ascending order)
    pub version: i32,
    /// Human-readable migration name
    pub name: &'static str,
    /// SQL statements for SQLite
    pub up_sqlite: &'static str,
    /// SQL statements for MySQL
    pub up_mysql: &'static str,
}

/// Migration record stored in the database
#[derive(Debug, Clone)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

/// All schema migrations, oldest first.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_users",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email VARCHAR(254) NOT NULL UNIQUE,
                password_hash VARCHAR(255) NOT NULL,
                first_name VARCHAR(150) NOT NULL,
                last_name VARCHAR(150) NOT NULL,
                university_name VARCHAR(255),
                role VARCHAR(20) NOT NULL DEFAULT 'regular',
                is_active BOOLEAN NOT NULL DEFAULT 1,
                is_staff BOOLEAN NOT NULL DEFAULT 0,
                last_login TIMESTAMP,
                date_joined TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_users_role ON users(role);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS users (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                email VARCHAR(254) NOT NULL UNIQUE,
                password_hash VARCHAR(255) NOT NULL,
                first_name VARCHAR(150) NOT NULL,
                last_name VARCHAR(150) NOT NULL,
                university_name VARCHAR(255) NULL,
                role VARCHAR(20) NOT NULL DEFAULT 'regular',
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                is_staff BOOLEAN NOT NULL DEFAULT FALSE,
                last_login TIMESTAMP NULL DEFAULT NULL,
                date_joined TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX idx_users_role ON users(role);
        "#,
    },
    Migration {
        version: 2,
        name: "create_sessions",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id VARCHAR(64) PRIMARY KEY,
                user_id INTEGER NOT NULL,
                expires_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions(expires_at);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id VARCHAR(64) PRIMARY KEY,
                user_id BIGINT NOT NULL,
                expires_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_sessions_user_id ON sessions(user_id);
            CREATE INDEX idx_sessions_expires_at ON sessions(expires_at);
        "#,
    },
    Migration {
        version: 3,
        name: "create_password_reset_tokens",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS password_reset_tokens (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                token_hash VARCHAR(64) NOT NULL UNIQUE,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                expires_at TIMESTAMP NOT NULL,
                is_used BOOLEAN NOT NULL DEFAULT 0,
                used_at TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_reset_tokens_user_id ON password_reset_tokens(user_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS password_reset_tokens (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                user_id BIGINT NOT NULL,
                token_hash VARCHAR(64) NOT NULL UNIQUE,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                expires_at TIMESTAMP NOT NULL,
                is_used BOOLEAN NOT NULL DEFAULT FALSE,
                used_at TIMESTAMP NULL DEFAULT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_reset_tokens_user_id ON password_reset_tokens(user_id);
        "#,
    },
    Migration {
        version: 4,
        name: "create_programs",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS programs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name VARCHAR(255) NOT NULL,
                description TEXT NOT NULL,
                duration_months INTEGER NOT NULL,
                start_date DATE NOT NULL,
                end_date DATE NOT NULL,
                is_active BOOLEAN NOT NULL DEFAULT 1,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_programs_created_at ON programs(created_at);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS programs (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                name VARCHAR(255) NOT NULL,
                description TEXT NOT NULL,
                duration_months INT NOT NULL,
                start_date DATE NOT NULL,
                end_date DATE NOT NULL,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX idx_programs_created_at ON programs(created_at);
        "#,
    },
    Migration {
        version: 5,
        name: "create_accreditations",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS accreditations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                program_id INTEGER NOT NULL,
                name VARCHAR(255) NOT NULL,
                organization VARCHAR(255) NOT NULL,
                date_received DATE NOT NULL,
                expiration_date DATE NOT NULL,
                certificate_number VARCHAR(100) NOT NULL,
                description TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (program_id) REFERENCES programs(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_accreditations_program_id ON accreditations(program_id);
            CREATE INDEX IF NOT EXISTS idx_accreditations_date_received ON accreditations(date_received);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS accreditations (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                program_id BIGINT NOT NULL,
                name VARCHAR(255) NOT NULL,
                organization VARCHAR(255) NOT NULL,
                date_received DATE NOT NULL,
                expiration_date DATE NOT NULL,
                certificate_number VARCHAR(100) NOT NULL,
                description TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (program_id) REFERENCES programs(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_accreditations_program_id ON accreditations(program_id);
            CREATE INDEX idx_accreditations_date_received ON accreditations(date_received);
        "#,
    },
    Migration {
        version: 6,
        name: "create_publications",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS publications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title VARCHAR(255) NOT NULL,
                publication_date DATE NOT NULL,
                journal_name VARCHAR(255) NOT NULL,
                doi VARCHAR(100),
                url VARCHAR(500),
                abstract TEXT NOT NULL,
                keywords VARCHAR(255) NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_publications_date ON publications(publication_date);
            CREATE TABLE IF NOT EXISTS publication_authors (
                publication_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                PRIMARY KEY (publication_id, user_id),
                FOREIGN KEY (publication_id) REFERENCES publications(id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_publication_authors_user_id ON publication_authors(user_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS publications (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                title VARCHAR(255) NOT NULL,
                publication_date DATE NOT NULL,
                journal_name VARCHAR(255) NOT NULL,
                doi VARCHAR(100) NULL,
                url VARCHAR(500) NULL,
                abstract TEXT NOT NULL,
                keywords VARCHAR(255) NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX idx_publications_date ON publications(publication_date);
            CREATE TABLE IF NOT EXISTS publication_authors (
                publication_id BIGINT NOT NULL,
                user_id BIGINT NOT NULL,
                PRIMARY KEY (publication_id, user_id),
                FOREIGN KEY (publication_id) REFERENCES publications(id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_publication_authors_user_id ON publication_authors(user_id);
        "#,
    },
    Migration {
        version: 7,
        name: "create_mobility_programs",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS mobility_programs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name VARCHAR(255) NOT NULL,
                description TEXT NOT NULL,
                host_institution VARCHAR(255) NOT NULL,
                country VARCHAR(100) NOT NULL,
                city VARCHAR(100) NOT NULL,
                start_date DATE NOT NULL,
                end_date DATE NOT NULL,
                application_deadline DATE NOT NULL,
                requirements TEXT NOT NULL,
                benefits TEXT NOT NULL,
                contact_email VARCHAR(254) NOT NULL,
                website VARCHAR(500),
                is_active BOOLEAN NOT NULL DEFAULT 1,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_mobility_deadline ON mobility_programs(application_deadline);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS mobility_programs (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                name VARCHAR(255) NOT NULL,
                description TEXT NOT NULL,
                host_institution VARCHAR(255) NOT NULL,
                country VARCHAR(100) NOT NULL,
                city VARCHAR(100) NOT NULL,
                start_date DATE NOT NULL,
                end_date DATE NOT NULL,
                application_deadline DATE NOT NULL,
                requirements TEXT NOT NULL,
                benefits TEXT NOT NULL,
                contact_email VARCHAR(254) NOT NULL,
                website VARCHAR(500) NULL,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX idx_mobility_deadline ON mobility_programs(application_deadline);
        "#,
    },
    Migration {
        version: 8,
        name: "create_applications",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS applications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name VARCHAR(255) NOT NULL,
                email VARCHAR(254) NOT NULL,
                phone VARCHAR(50),
                subject VARCHAR(255) NOT NULL,
                message TEXT NOT NULL,
                status VARCHAR(20) NOT NULL DEFAULT 'pending',
                university_id INTEGER,
                submitted_by INTEGER,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (university_id) REFERENCES users(id) ON DELETE SET NULL,
                FOREIGN KEY (submitted_by) REFERENCES users(id) ON DELETE SET NULL
            );
            CREATE INDEX IF NOT EXISTS idx_applications_university_id ON applications(university_id);
            CREATE INDEX IF NOT EXISTS idx_applications_submitted_by ON applications(submitted_by);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS applications (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                name VARCHAR(255) NOT NULL,
                email VARCHAR(254) NOT NULL,
                phone VARCHAR(50) NULL,
                subject VARCHAR(255) NOT NULL,
                message TEXT NOT NULL,
                status VARCHAR(20) NOT NULL DEFAULT 'pending',
                university_id BIGINT NULL,
                submitted_by BIGINT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (university_id) REFERENCES users(id) ON DELETE SET NULL,
                FOREIGN KEY (submitted_by) REFERENCES users(id) ON DELETE SET NULL
            );
            CREATE INDEX idx_applications_university_id ON applications(university_id);
            CREATE INDEX idx_applications_submitted_by ON applications(submitted_by);
        "#,
    },
];

/// Apply every migration that has not been recorded yet.
///
/// Returns the number of migrations applied by this call.
pub async fn run_migrations(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;

    let applied = get_applied_migrations(pool).await?;
    let applied_versions: Vec<i64> = applied.iter().map(|m| m.version).collect();

    let mut count = 0;
    for migration in MIGRATIONS {
        if applied_versions.contains(&(migration.version as i64)) {
            continue;
        }
        tracing::info!(
            "Applying migration {}: {}",
            migration.version,
            migration.name
        );
        apply_migration(pool, migration)
            .await
            .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
        count += 1;
    }

    if count > 0 {
        tracing::info!("Applied {} migration(s)", count);
    } else {
        tracing::debug!("No pending migrations");
    }

    Ok(count)
}

async fn create_migrations_table(pool: &DynDatabasePool) -> Result<()> {
    let sql = match pool.driver() {
        DatabaseDriver::Sqlite => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
        DatabaseDriver::Mysql => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INT PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
    };

    pool.execute(sql).await?;
    Ok(())
}

async fn get_applied_migrations(pool: &DynDatabasePool) -> Result<Vec<MigrationRecord>> {
    match pool.driver() {
        DatabaseDriver::Sqlite => get_applied_migrations_sqlite(sqlite_pool(pool)?).await,
        DatabaseDriver::Mysql => get_applied_migrations_mysql(mysql_pool(pool)?).await,
    }
}

async fn get_applied_migrations_sqlite(pool: &SqlitePool) -> Result<Vec<MigrationRecord>> {
    let rows = sqlx::query("SELECT version, name, applied_at FROM _migrations ORDER BY version")
        .fetch_all(pool)
        .await
        .context("Failed to read applied migrations")?;

    Ok(rows
        .iter()
        .map(|row| MigrationRecord {
            version: row.get("version"),
            name: row.get("name"),
            applied_at: row.get("applied_at"),
        })
        .collect())
}

async fn get_applied_migrations_mysql(pool: &MySqlPool) -> Result<Vec<MigrationRecord>> {
    let rows = sqlx::query("SELECT version, name, applied_at FROM _migrations ORDER BY version")
        .fetch_all(pool)
        .await
        .context("Failed to read applied migrations")?;

    Ok(rows
        .iter()
        .map(|row| {
            let version: i32 = row.get("version");
            MigrationRecord {
                version: version as i64,
                name: row.get("name"),
                applied_at: row.get("applied_at"),
            }
        })
        .collect())
}

async fn apply_migration(pool: &DynDatabasePool, migration: &Migration) -> Result<()> {
    match pool.driver() {
        DatabaseDriver::Sqlite => apply_migration_sqlite(sqlite_pool(pool)?, migration).await,
        DatabaseDriver::Mysql => apply_migration_mysql(mysql_pool(pool)?, migration).await,
    }
}

async fn apply_migration_sqlite(pool: &SqlitePool, migration: &Migration) -> Result<()> {
    for statement in split_sql_statements(migration.up_sqlite) {
        sqlx::query(statement)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
    }

    sqlx::query("INSERT INTO _migrations (version, name, applied_at) VALUES (?, ?, ?)")
        .bind(migration.version)
        .bind(migration.name)
        .bind(Utc::now())
        .execute(pool)
        .await
        .context("Failed to record migration")?;

    Ok(())
}

async fn apply_migration_mysql(pool: &MySqlPool, migration: &Migration) -> Result<()> {
    for statement in split_sql_statements(migration.up_mysql) {
        sqlx::query(statement)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
    }

    sqlx::query("INSERT INTO _migrations (version, name, applied_at) VALUES (?, ?, ?)")
        .bind(migration.version)
        .bind(migration.name)
        .bind(Utc::now())
        .execute(pool)
        .await
        .context("Failed to record migration")?;

    Ok(())
}

/// First 100 characters of a statement, for error messages
fn truncate_sql(sql: &str) -> String {
    match sql.char_indices().nth(100) {
        Some((idx, _)) => format!("{}...", &sql[..idx]),
        None => sql.to_string(),
    }
}

/// Split a migration script on `;`, dropping empty and comment-only pieces
fn split_sql_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty() && !is_comment_only(stmt))
        .collect()
}

fn is_comment_only(s: &str) -> bool {
    s.lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with("--"))
}

/// Check if migrations are up to date
pub async fn is_up_to_date(pool: &DynDatabasePool) -> Result<bool> {
    Ok(pending_count(pool).await? == 0)
}

/// Number of migrations not yet applied
pub async fn pending_count(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;
    let applied = get_applied_migrations(pool).await?;
    Ok(MIGRATIONS.len().saturating_sub(applied.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    async fn migrated_pool() -> DynDatabasePool {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");
        pool
    }

    async fn insert_user(pool: &SqlitePool, email: &str, role: &str) -> i64 {
        sqlx::query(
            "INSERT INTO users (email, password_hash, first_name, last_name, role) VALUES (?, 'hash', '', '', ?)",
        )
        .bind(email)
        .bind(role)
        .execute(pool)
        .await
        .expect("Failed to insert user")
        .last_insert_rowid()
    }

    #[tokio::test]
    async fn test_run_migrations_is_idempotent() {
        let pool = create_test_pool().await.expect("Failed to create test pool");

        assert!(!is_up_to_date(&pool).await.unwrap());
        assert_eq!(pending_count(&pool).await.unwrap(), MIGRATIONS.len());

        let applied = run_migrations(&pool).await.expect("Failed to run migrations");
        assert_eq!(applied, MIGRATIONS.len());

        let applied_again = run_migrations(&pool).await.expect("Failed to rerun migrations");
        assert_eq!(applied_again, 0);
        assert!(is_up_to_date(&pool).await.unwrap());
    }

    #[test]
    fn test_migration_versions_are_ascending() {
        let versions: Vec<i32> = MIGRATIONS.iter().map(|m| m.version).collect();
        let mut sorted = versions.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(versions, sorted);
    }

    #[tokio::test]
    async fn test_user_email_unique() {
        let pool = migrated_pool().await;
        let sqlite = sqlite_pool(&pool).unwrap();

        insert_user(sqlite, "dup@example.edu", "regular").await;
        let result = sqlx::query(
            "INSERT INTO users (email, password_hash, first_name, last_name) VALUES ('dup@example.edu', 'h', '', '')",
        )
        .execute(sqlite)
        .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_program_delete_cascades_to_accreditations() {
        let pool = migrated_pool().await;
        let sqlite = sqlite_pool(&pool).unwrap();

        let program_id = sqlx::query(
            "INSERT INTO programs (name, description, duration_months, start_date, end_date) VALUES ('CS', '', 24, '2024-09-01', '2026-06-30')",
        )
        .execute(sqlite)
        .await
        .unwrap()
        .last_insert_rowid();

        sqlx::query(
            "INSERT INTO accreditations (program_id, name, organization, date_received, expiration_date, certificate_number, description) VALUES (?, 'ABET', 'ABET Inc', '2024-01-01', '2030-01-01', 'C-1', '')",
        )
        .bind(program_id)
        .execute(sqlite)
        .await
        .unwrap();

        sqlx::query("DELETE FROM programs WHERE id = ?")
            .bind(program_id)
            .execute(sqlite)
            .await
            .unwrap();

        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM accreditations")
            .fetch_one(sqlite)
            .await
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn test_accreditation_requires_existing_program() {
        let pool = migrated_pool().await;
        let sqlite = sqlite_pool(&pool).unwrap();

        let result = sqlx::query(
            "INSERT INTO accreditations (program_id, name, organization, date_received, expiration_date, certificate_number, description) VALUES (999, 'X', 'Y', '2024-01-01', '2030-01-01', 'C', '')",
        )
        .execute(sqlite)
        .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_deleting_university_detaches_applications() {
        let pool = migrated_pool().await;
        let sqlite = sqlite_pool(&pool).unwrap();
        let uni = insert_user(sqlite, "uni@example.edu", "university").await;

        sqlx::query(
            "INSERT INTO applications (name, email, subject, message, university_id) VALUES ('A', 'a@example.com', 'S', 'M', ?)",
        )
        .bind(uni)
        .execute(sqlite)
        .await
        .unwrap();

        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(uni)
            .execute(sqlite)
            .await
            .unwrap();

        let university_id: Option<i64> =
            sqlx::query_scalar("SELECT university_id FROM applications")
                .fetch_one(sqlite)
                .await
                .unwrap();
        assert!(university_id.is_none());
    }

    #[tokio::test]
    async fn test_reset_token_hash_unique() {
        let pool = migrated_pool().await;
        let sqlite = sqlite_pool(&pool).unwrap();
        let user = insert_user(sqlite, "reset@example.edu", "regular").await;

        let insert = "INSERT INTO password_reset_tokens (user_id, token_hash, expires_at) VALUES (?, 'abc', '2999-01-01 00:00:00')";
        sqlx::query(insert).bind(user).execute(sqlite).await.unwrap();
        let result = sqlx::query(insert).bind(user).execute(sqlite).await;

        assert!(result.is_err());
    }

    #[test]
    fn test_split_sql_statements() {
        let sql = "CREATE TABLE a (id INT);\n-- just a comment\n;\nCREATE INDEX i ON a(id);  ";
        let statements = split_sql_statements(sql);
        assert_eq!(statements, vec!["CREATE TABLE a (id INT)", "CREATE INDEX i ON a(id)"]);
    }

    #[test]
    fn test_truncate_sql_respects_char_boundaries() {
        let long = "é".repeat(150);
        let truncated = truncate_sql(&long);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.chars().count(), 103);
        assert_eq!(truncate_sql("SELECT 1"), "SELECT 1");
    }
}
