//! User and authentication API endpoints
//!
//! - POST /api/register-university/ - Create a university account
//! - POST /api/users/ - Register (admins may pick the role)
//! - POST /api/users/login/ - Log in, sets the session cookie
//! - POST /api/users/logout/ - Log out, clears the session cookie
//! - POST /api/users/reset_password_request/ - Mail a reset link
//! - POST /api/users/reset_password_confirm/ - Redeem a reset token
//! - POST /api/users/change_password/ - Change the caller's password
//! - GET /api/users/me/ - Current user
//! - GET/PUT/PATCH/DELETE /api/users/{id}/ - User records

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::middleware::{
    clear_session_cookie, cookie_headers, session_cookie, ApiError, ApiJson, ApiPath, AppState,
    Identity,
};
use crate::models::{Role, UpdateUserInput, User};
use crate::services::{
    ChangePasswordInput, LoginInput, RegisterInput, ResetConfirmInput, ResetRequestInput,
    UniversityRegisterInput,
};

/// User response (without password)
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub university_name: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub is_staff: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub date_joined: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            full_name: user.full_name(),
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            university_name: user.university_name,
            role: user.role,
            is_active: user.is_active,
            is_staff: user.is_staff,
            last_login: user.last_login,
            date_joined: user.date_joined,
        }
    }
}

/// Response for login and registration
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
}

/// Plain confirmation body
#[derive(Debug, Serialize)]
pub struct DetailResponse {
    pub detail: &'static str,
}

/// Build the users router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register-university/", post(register_university))
        .route("/users/", get(list_users).post(register))
        .route("/users/login/", post(login))
        .route("/users/logout/", post(logout))
        .route("/users/reset_password_request/", post(reset_password_request))
        .route("/users/reset_password_confirm/", post(reset_password_confirm))
        .route("/users/change_password/", post(change_password))
        .route("/users/me/", get(me))
        .route(
            "/users/{id}/",
            get(get_user)
                .put(update_user)
                .patch(update_user)
                .delete(delete_user),
        )
}

/// Start a session for a freshly registered anonymous caller
async fn registered(
    state: &AppState,
    identity: &Identity,
    user: User,
) -> Result<(StatusCode, HeaderMap, Json<AuthResponse>), ApiError> {
    let headers = if identity.caller.is_anonymous() {
        let session = state.user_service.start_session(&user).await?;
        cookie_headers(&session_cookie(&session, state.secure_cookie))?
    } else {
        HeaderMap::new()
    };

    Ok((
        StatusCode::CREATED,
        headers,
        Json(AuthResponse { user: user.into() }),
    ))
}

/// POST /api/users/ - Register a new account
async fn register(
    State(state): State<AppState>,
    identity: Identity,
    ApiJson(body): ApiJson<RegisterInput>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.user_service.register(&identity.caller, body).await?;
    registered(&state, &identity, user).await
}

/// POST /api/register-university/ - Register a university account
async fn register_university(
    State(state): State<AppState>,
    identity: Identity,
    ApiJson(body): ApiJson<UniversityRegisterInput>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.user_service.register_university(body).await?;
    registered(&state, &identity, user).await
}

/// POST /api/users/login/ - Log in
async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginInput>,
) -> Result<impl IntoResponse, ApiError> {
    let (user, session) = state.user_service.login(body).await?;
    let headers = cookie_headers(&session_cookie(&session, state.secure_cookie))?;

    Ok((headers, Json(AuthResponse { user: user.into() })))
}

/// POST /api/users/logout/ - Log out
async fn logout(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<impl IntoResponse, ApiError> {
    let session_id = identity
        .session_id
        .ok_or_else(|| ApiError::unauthorized("Authentication credentials were not provided."))?;

    state.user_service.logout(&session_id).await?;
    let headers = cookie_headers(&clear_session_cookie(state.secure_cookie))?;

    Ok((StatusCode::NO_CONTENT, headers))
}

/// POST /api/users/reset_password_request/ - Mail a reset link
async fn reset_password_request(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ResetRequestInput>,
) -> Result<Json<DetailResponse>, ApiError> {
    state.password_reset_service.request_reset(body).await?;
    Ok(Json(DetailResponse {
        detail: "If the address belongs to an account, a reset link has been sent.",
    }))
}

/// POST /api/users/reset_password_confirm/ - Set a new password with a token
async fn reset_password_confirm(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ResetConfirmInput>,
) -> Result<Json<DetailResponse>, ApiError> {
    state.password_reset_service.confirm_reset(body).await?;
    Ok(Json(DetailResponse {
        detail: "Password has been reset.",
    }))
}

/// POST /api/users/change_password/ - Change the caller's password
async fn change_password(
    State(state): State<AppState>,
    identity: Identity,
    ApiJson(body): ApiJson<ChangePasswordInput>,
) -> Result<Json<DetailResponse>, ApiError> {
    state
        .user_service
        .change_password(&identity.caller, identity.session_id.as_deref(), body)
        .await?;
    Ok(Json(DetailResponse {
        detail: "Password has been changed.",
    }))
}

/// GET /api/users/me/ - Current user
async fn me(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.user_service.me(&identity.caller)?;
    Ok(Json(user.into()))
}

/// GET /api/users/ - All users (administrators)
async fn list_users(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let users = state.user_service.list_users(&identity.caller).await?;
    Ok(Json(users.into_iter().map(Into::into).collect()))
}

/// GET /api/users/{id}/
async fn get_user(
    State(state): State<AppState>,
    identity: Identity,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.user_service.get_user(&identity.caller, id).await?;
    Ok(Json(user.into()))
}

/// PUT/PATCH /api/users/{id}/
async fn update_user(
    State(state): State<AppState>,
    identity: Identity,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<UpdateUserInput>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state
        .user_service
        .update_user(&identity.caller, id, body)
        .await?;
    Ok(Json(user.into()))
}

/// DELETE /api/users/{id}/
async fn delete_user(
    State(state): State<AppState>,
    identity: Identity,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    state.user_service.delete_user(&identity.caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
