//! Accreditation API endpoints
//!
//! - GET/POST /api/accreditations/
//! - GET /api/accreditations/by_program/?program_id=
//! - GET/PUT/PATCH/DELETE /api/accreditations/{id}/

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, ApiJson, ApiPath, ApiQuery, AppState, Identity};
use crate::models::{
    Accreditation, AccreditationDetail, CreateAccreditationInput, UpdateAccreditationInput,
};

/// Query parameters for the per-program listing
#[derive(Debug, Deserialize)]
pub struct ByProgramQuery {
    pub program_id: Option<i64>,
}

/// Build the accreditations router
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/accreditations/",
            get(list_accreditations).post(create_accreditation),
        )
        .route("/accreditations/by_program/", get(list_by_program))
        .route(
            "/accreditations/{id}/",
            get(get_accreditation)
                .put(replace_accreditation)
                .patch(update_accreditation)
                .delete(delete_accreditation),
        )
}

/// GET /api/accreditations/
async fn list_accreditations(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<Vec<Accreditation>>, ApiError> {
    let accreditations = state.accreditation_service.list(&identity.caller).await?;
    Ok(Json(accreditations))
}

/// GET /api/accreditations/by_program/?program_id=
async fn list_by_program(
    State(state): State<AppState>,
    identity: Identity,
    ApiQuery(query): ApiQuery<ByProgramQuery>,
) -> Result<Json<Vec<Accreditation>>, ApiError> {
    let accreditations = state
        .accreditation_service
        .list_by_program(&identity.caller, query.program_id)
        .await?;
    Ok(Json(accreditations))
}

/// GET /api/accreditations/{id}/ - Accreditation with its program
async fn get_accreditation(
    State(state): State<AppState>,
    identity: Identity,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<AccreditationDetail>, ApiError> {
    let accreditation = state.accreditation_service.get(&identity.caller, id).await?;
    Ok(Json(accreditation))
}

/// POST /api/accreditations/
async fn create_accreditation(
    State(state): State<AppState>,
    identity: Identity,
    ApiJson(body): ApiJson<CreateAccreditationInput>,
) -> Result<impl IntoResponse, ApiError> {
    let accreditation = state
        .accreditation_service
        .create(&identity.caller, body)
        .await?;
    Ok((StatusCode::CREATED, Json(accreditation)))
}

/// PUT /api/accreditations/{id}/
async fn replace_accreditation(
    State(state): State<AppState>,
    identity: Identity,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<CreateAccreditationInput>,
) -> Result<Json<Accreditation>, ApiError> {
    let accreditation = state
        .accreditation_service
        .update(&identity.caller, id, body.into())
        .await?;
    Ok(Json(accreditation))
}

/// PATCH /api/accreditations/{id}/
async fn update_accreditation(
    State(state): State<AppState>,
    identity: Identity,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<UpdateAccreditationInput>,
) -> Result<Json<Accreditation>, ApiError> {
    let accreditation = state
        .accreditation_service
        .update(&identity.caller, id, body)
        .await?;
    Ok(Json(accreditation))
}

/// DELETE /api/accreditations/{id}/
async fn delete_accreditation(
    State(state): State<AppState>,
    identity: Identity,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    state.accreditation_service.delete(&identity.caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
