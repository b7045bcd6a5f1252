//! Publication API endpoints
//!
//! - GET/POST /api/publications/
//! - GET /api/publications/my_publications/ - Co-authored by the caller
//! - GET/PUT/PATCH/DELETE /api/publications/{id}/

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::api::middleware::{ApiError, ApiJson, ApiPath, AppState, Identity};
use crate::models::{CreatePublicationInput, Publication, UpdatePublicationInput};

/// Build the publications router
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/publications/",
            get(list_publications).post(create_publication),
        )
        .route("/publications/my_publications/", get(my_publications))
        .route(
            "/publications/{id}/",
            get(get_publication)
                .put(replace_publication)
                .patch(update_publication)
                .delete(delete_publication),
        )
}

async fn list_publications(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<Vec<Publication>>, ApiError> {
    let publications = state.publication_service.list(&identity.caller).await?;
    Ok(Json(publications))
}

async fn my_publications(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<Vec<Publication>>, ApiError> {
    let publications = state.publication_service.list_mine(&identity.caller).await?;
    Ok(Json(publications))
}

async fn get_publication(
    State(state): State<AppState>,
    identity: Identity,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Publication>, ApiError> {
    let publication = state.publication_service.get(&identity.caller, id).await?;
    Ok(Json(publication))
}

async fn create_publication(
    State(state): State<AppState>,
    identity: Identity,
    ApiJson(body): ApiJson<CreatePublicationInput>,
) -> Result<impl IntoResponse, ApiError> {
    let publication = state
        .publication_service
        .create(&identity.caller, body)
        .await?;
    Ok((StatusCode::CREATED, Json(publication)))
}

async fn replace_publication(
    State(state): State<AppState>,
    identity: Identity,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<CreatePublicationInput>,
) -> Result<Json<Publication>, ApiError> {
    let publication = state
        .publication_service
        .update(&identity.caller, id, body.into())
        .await?;
    Ok(Json(publication))
}

async fn update_publication(
    State(state): State<AppState>,
    identity: Identity,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<UpdatePublicationInput>,
) -> Result<Json<Publication>, ApiError> {
    let publication = state
        .publication_service
        .update(&identity.caller, id, body)
        .await?;
    Ok(Json(publication))
}

async fn delete_publication(
    State(state): State<AppState>,
    identity: Identity,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    state.publication_service.delete(&identity.caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
