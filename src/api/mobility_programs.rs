//! Mobility program API endpoints
//!
//! - GET/POST /api/mobility-programs/
//! - GET /api/mobility-programs/active/ - Open for applications
//! - GET/PUT/PATCH/DELETE /api/mobility-programs/{id}/

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::api::middleware::{ApiError, ApiJson, ApiPath, AppState, Identity};
use crate::models::{CreateMobilityProgramInput, MobilityProgram, UpdateMobilityProgramInput};

/// Build the mobility programs router
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/mobility-programs/",
            get(list_mobility_programs).post(create_mobility_program),
        )
        .route("/mobility-programs/active/", get(list_active))
        .route(
            "/mobility-programs/{id}/",
            get(get_mobility_program)
                .put(replace_mobility_program)
                .patch(update_mobility_program)
                .delete(delete_mobility_program),
        )
}

async fn list_mobility_programs(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<Vec<MobilityProgram>>, ApiError> {
    let programs = state.mobility_program_service.list(&identity.caller).await?;
    Ok(Json(programs))
}

async fn list_active(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<Vec<MobilityProgram>>, ApiError> {
    let programs = state
        .mobility_program_service
        .list_active(&identity.caller)
        .await?;
    Ok(Json(programs))
}

async fn get_mobility_program(
    State(state): State<AppState>,
    identity: Identity,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<MobilityProgram>, ApiError> {
    let program = state.mobility_program_service.get(&identity.caller, id).await?;
    Ok(Json(program))
}

async fn create_mobility_program(
    State(state): State<AppState>,
    identity: Identity,
    ApiJson(body): ApiJson<CreateMobilityProgramInput>,
) -> Result<impl IntoResponse, ApiError> {
    let program = state
        .mobility_program_service
        .create(&identity.caller, body)
        .await?;
    Ok((StatusCode::CREATED, Json(program)))
}

async fn replace_mobility_program(
    State(state): State<AppState>,
    identity: Identity,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<CreateMobilityProgramInput>,
) -> Result<Json<MobilityProgram>, ApiError> {
    let program = state
        .mobility_program_service
        .update(&identity.caller, id, body.into())
        .await?;
    Ok(Json(program))
}

async fn update_mobility_program(
    State(state): State<AppState>,
    identity: Identity,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<UpdateMobilityProgramInput>,
) -> Result<Json<MobilityProgram>, ApiError> {
    let program = state
        .mobility_program_service
        .update(&identity.caller, id, body)
        .await?;
    Ok(Json(program))
}

async fn delete_mobility_program(
    State(state): State<AppState>,
    identity: Identity,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    state
        .mobility_program_service
        .delete(&identity.caller, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
