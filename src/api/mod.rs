//! API layer - HTTP handlers and routing
//!
//! All endpoints live under `/api`:
//! - Users, authentication and password reset
//! - Programs and accreditations
//! - Publications
//! - Mobility programs
//! - Applications
//!
//! A middleware resolves the `session` cookie into a caller for every
//! request; handlers pass that caller to the services, which decide access.

pub mod accreditations;
pub mod applications;
pub mod middleware;
pub mod mobility_programs;
pub mod programs;
pub mod publications;
pub mod users;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::DatabaseDriver;

pub use middleware::{ApiError, AppState, Identity};

/// Build the `/api` router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(users::router())
        .merge(programs::router())
        .merge(accreditations::router())
        .merge(publications::router())
        .merge(mobility_programs::router())
        .merge(applications::router())
        .route("/health", get(health))
        .layer(axum_middleware::from_fn_with_state(
            state,
            middleware::resolve_caller,
        ))
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    let mut cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, header::COOKIE])
        .allow_credentials(true);
    match cors_origin.parse::<HeaderValue>() {
        Ok(origin) => cors = cors.allow_origin(origin),
        Err(_) => tracing::warn!(origin = %cors_origin, "Ignoring invalid CORS origin"),
    }

    Router::new()
        .nest("/api", build_api_router(state.clone()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    database: DatabaseDriver,
}

/// GET /api/health - Liveness plus a database ping
async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    state.pool.ping().await.map_err(|e| {
        tracing::error!(error = ?e, "Database ping failed");
        ApiError::internal_error("Database unavailable.")
    })?;

    Ok(Json(HealthResponse {
        status: "ok",
        database: state.pool.driver(),
    }))
}
