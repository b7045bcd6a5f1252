//! Database layer
//!
//! SQLite is the default for single-binary deployments. MySQL is available
//! for larger installations. The driver is picked from configuration and every
//! repository dispatches on it.
//!
//! ```ignore
//! use eduportal::config::DatabaseConfig;
//! use eduportal::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, mysql_pool, sqlite_pool, DatabasePool, DynDatabasePool,
    MysqlDatabase, SqliteDatabase,
};
