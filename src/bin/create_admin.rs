//! CLI tool to create an administrator account.
//!
//! Usage: `cargo run --bin create-admin -- <email> <password>`
//!
//! Uses the same configuration as the server (`EDUPORTAL_CONFIG`, default
//! `config.yml`) and runs pending migrations first.

use anyhow::{bail, Result};
use std::path::PathBuf;
use std::sync::Arc;

use eduportal::{
    config::Config,
    db::{
        self,
        repositories::{SqlxSessionRepository, SqlxUserRepository},
    },
    services::{RateLimiters, UserService},
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "eduportal=info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [email, password] = args.as_slice() else {
        bail!("usage: create-admin <email> <password>");
    };

    let config_path = std::env::var("EDUPORTAL_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.yml"));
    let config = Config::load_with_env(&config_path)?;

    let pool = db::create_pool(&config.database).await?;
    db::migrations::run_migrations(&pool).await?;

    let user_service = UserService::new(
        SqlxUserRepository::boxed(pool.clone()),
        SqlxSessionRepository::boxed(pool.clone()),
        Arc::new(RateLimiters::new()),
    );

    match user_service.ensure_admin(email, password).await? {
        Some(admin) => println!("Created administrator {} (id {})", admin.email, admin.id),
        None => println!("A user with email {} already exists", email.trim()),
    }

    pool.close().await;
    Ok(())
}
