//! eduportal - University education portal backend

use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use eduportal::{
    api::{self, AppState},
    config::Config,
    db,
    services::create_mailer,
};

/// Interval between limiter and expired-session sweeps
const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "eduportal=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting eduportal...");

    let config_path = std::env::var("EDUPORTAL_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.yml"));
    let config = Config::load_with_env(&config_path)?;
    tracing::info!(path = %config_path.display(), "Configuration loaded");

    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    let applied = db::migrations::run_migrations(&pool).await?;
    tracing::info!(applied, "Database migrations completed");

    let mailer = create_mailer(&config.mail)?;
    let state = AppState::new(pool, &config, mailer);

    if let (Some(email), Some(password)) = (&config.admin.email, &config.admin.password) {
        match state.user_service.ensure_admin(email, password).await? {
            Some(admin) => tracing::info!(user_id = admin.id, "Bootstrap administrator created"),
            None => tracing::debug!("Bootstrap administrator already exists"),
        }
    }

    // Periodic cleanup of limiter windows and expired sessions
    {
        let limiters = state.limiters.clone();
        let user_service = state.user_service.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                limiters.cleanup().await;
                if let Err(e) = user_service.cleanup_expired_sessions().await {
                    tracing::warn!(error = %e, "Expired session cleanup failed");
                }
            }
        });
    }

    let app = api::build_router(state, &config.server.cors_origin);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
