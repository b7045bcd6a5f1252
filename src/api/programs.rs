//! Program API endpoints
//!
//! - GET/POST /api/programs/
//! - GET/PUT/PATCH/DELETE /api/programs/{id}/
//!
//! Reads are public; writes need an administrator.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::api::middleware::{ApiError, ApiJson, ApiPath, AppState, Identity};
use crate::models::{CreateProgramInput, Program, ProgramDetail, UpdateProgramInput};

/// Build the programs router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/programs/", get(list_programs).post(create_program))
        .route(
            "/programs/{id}/",
            get(get_program)
                .put(replace_program)
                .patch(update_program)
                .delete(delete_program),
        )
}

/// GET /api/programs/
async fn list_programs(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<Vec<Program>>, ApiError> {
    let programs = state.program_service.list(&identity.caller).await?;
    Ok(Json(programs))
}

/// GET /api/programs/{id}/ - Program with its accreditations
async fn get_program(
    State(state): State<AppState>,
    identity: Identity,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<ProgramDetail>, ApiError> {
    let program = state.program_service.get(&identity.caller, id).await?;
    Ok(Json(program))
}

/// POST /api/programs/
async fn create_program(
    State(state): State<AppState>,
    identity: Identity,
    ApiJson(body): ApiJson<CreateProgramInput>,
) -> Result<impl IntoResponse, ApiError> {
    let program = state.program_service.create(&identity.caller, body).await?;
    Ok((StatusCode::CREATED, Json(program)))
}

/// PUT /api/programs/{id}/
async fn replace_program(
    State(state): State<AppState>,
    identity: Identity,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<CreateProgramInput>,
) -> Result<Json<Program>, ApiError> {
    let program = state
        .program_service
        .update(&identity.caller, id, body.into())
        .await?;
    Ok(Json(program))
}

/// PATCH /api/programs/{id}/
async fn update_program(
    State(state): State<AppState>,
    identity: Identity,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<UpdateProgramInput>,
) -> Result<Json<Program>, ApiError> {
    let program = state.program_service.update(&identity.caller, id, body).await?;
    Ok(Json(program))
}

/// DELETE /api/programs/{id}/
async fn delete_program(
    State(state): State<AppState>,
    identity: Identity,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    state.program_service.delete(&identity.caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
