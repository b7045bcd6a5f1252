//! Application API endpoints
//!
//! - GET/POST /api/applications/ - Anyone may submit; listings are scoped
//! - GET /api/applications/mine/ - Inbox or own submissions
//! - GET/PUT/PATCH/DELETE /api/applications/{id}/
//!
//! Universities change the status of applications addressed to them with
//! PATCH `{"status": ...}`; PUT replaces every field and is admin-only.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::api::middleware::{ApiError, ApiJson, ApiPath, AppState, Identity};
use crate::models::{
    Application, CreateApplicationInput, ReplaceApplicationInput, UpdateApplicationInput,
};

/// Build the applications router
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/applications/",
            get(list_applications).post(create_application),
        )
        .route("/applications/mine/", get(my_applications))
        .route(
            "/applications/{id}/",
            get(get_application)
                .put(replace_application)
                .patch(update_application)
                .delete(delete_application),
        )
}

async fn list_applications(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<Vec<Application>>, ApiError> {
    let applications = state.application_service.list(&identity.caller).await?;
    Ok(Json(applications))
}

async fn my_applications(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<Vec<Application>>, ApiError> {
    let applications = state.application_service.list_mine(&identity.caller).await?;
    Ok(Json(applications))
}

async fn get_application(
    State(state): State<AppState>,
    identity: Identity,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Application>, ApiError> {
    let application = state.application_service.get(&identity.caller, id).await?;
    Ok(Json(application))
}

async fn create_application(
    State(state): State<AppState>,
    identity: Identity,
    ApiJson(body): ApiJson<CreateApplicationInput>,
) -> Result<impl IntoResponse, ApiError> {
    let application = state
        .application_service
        .create(&identity.caller, body)
        .await?;
    Ok((StatusCode::CREATED, Json(application)))
}

async fn replace_application(
    State(state): State<AppState>,
    identity: Identity,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<ReplaceApplicationInput>,
) -> Result<Json<Application>, ApiError> {
    let application = state
        .application_service
        .update(&identity.caller, id, body.into())
        .await?;
    Ok(Json(application))
}

async fn update_application(
    State(state): State<AppState>,
    identity: Identity,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<UpdateApplicationInput>,
) -> Result<Json<Application>, ApiError> {
    let application = state
        .application_service
        .update(&identity.caller, id, body)
        .await?;
    Ok(Json(application))
}

async fn delete_application(
    State(state): State<AppState>,
    identity: Identity,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    state.application_service.delete(&identity.caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
