//! API middleware
//!
//! Contains:
//! - Shared application state
//! - The JSON error envelope and its mapping from `ServiceError`
//! - Caller resolution (session cookie to `Caller`)
//! - Session cookie helpers

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequest, FromRequestParts, Request, State,
    },
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::Config;
use crate::db::repositories::{
    SqlxAccreditationRepository, SqlxApplicationRepository, SqlxMobilityProgramRepository,
    SqlxPasswordResetRepository, SqlxProgramRepository, SqlxPublicationRepository,
    SqlxSessionRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::Session;
use crate::services::{
    AccreditationService, ApplicationService, Caller, EmailService, Mailer,
    MobilityProgramService, PasswordResetService, ProgramService, PublicationService,
    FieldErrors, RateLimiters, ResetOptions, ServiceError, UserService,
};

/// Name of the authentication cookie
pub const SESSION_COOKIE: &str = "session";

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub user_service: Arc<UserService>,
    pub password_reset_service: Arc<PasswordResetService>,
    pub program_service: Arc<ProgramService>,
    pub accreditation_service: Arc<AccreditationService>,
    pub publication_service: Arc<PublicationService>,
    pub mobility_program_service: Arc<MobilityProgramService>,
    pub application_service: Arc<ApplicationService>,
    pub limiters: Arc<RateLimiters>,
    /// Add `Secure` to the session cookie
    pub secure_cookie: bool,
}

impl AppState {
    /// Wire repositories and services over one pool
    pub fn new(pool: DynDatabasePool, config: &Config, mailer: Arc<dyn Mailer>) -> Self {
        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let session_repo = SqlxSessionRepository::boxed(pool.clone());
        let program_repo = SqlxProgramRepository::boxed(pool.clone());
        let accreditation_repo = SqlxAccreditationRepository::boxed(pool.clone());
        let limiters = Arc::new(RateLimiters::new());

        let user_service = UserService::new(user_repo.clone(), session_repo, limiters.clone())
            .with_session_lifetime(config.session.lifetime_days);
        let password_reset_service = PasswordResetService::new(
            user_repo.clone(),
            SqlxPasswordResetRepository::boxed(pool.clone()),
            EmailService::new(mailer, config.mail.from_name.clone()),
            limiters.clone(),
            ResetOptions::from_config(config),
        );

        Self {
            user_service: Arc::new(user_service),
            password_reset_service: Arc::new(password_reset_service),
            program_service: Arc::new(ProgramService::new(
                program_repo.clone(),
                accreditation_repo.clone(),
            )),
            accreditation_service: Arc::new(AccreditationService::new(
                accreditation_repo,
                program_repo,
            )),
            publication_service: Arc::new(PublicationService::new(
                SqlxPublicationRepository::boxed(pool.clone()),
                user_repo.clone(),
            )),
            mobility_program_service: Arc::new(MobilityProgramService::new(
                SqlxMobilityProgramRepository::boxed(pool.clone()),
            )),
            application_service: Arc::new(ApplicationService::new(
                SqlxApplicationRepository::boxed(pool.clone()),
                user_repo,
            )),
            limiters,
            secure_cookie: config.session.secure_cookie,
            pool,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "RATE_LIMIT" => StatusCode::TOO_MANY_REQUESTS,
            "DELIVERY_FAILED" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(errors) => ApiError::with_details(
                "VALIDATION_ERROR",
                "Invalid input.",
                serde_json::to_value(&errors).unwrap_or_default(),
            ),
            ServiceError::Authentication(msg) => ApiError::unauthorized(msg),
            ServiceError::Unauthenticated => {
                ApiError::unauthorized("Authentication credentials were not provided.")
            }
            ServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            ServiceError::NotFound(msg) => ApiError::not_found(msg),
            ServiceError::RateLimited { retry_after_secs } => ApiError::with_details(
                "RATE_LIMIT",
                "Too many attempts, try again later.",
                serde_json::json!({ "retry_after": retry_after_secs }),
            ),
            ServiceError::Delivery(msg) => {
                tracing::error!(error = %msg, "Email delivery failed");
                ApiError::new("DELIVERY_FAILED", "The email could not be sent.")
            }
            ServiceError::Internal(e) => {
                tracing::error!(error = ?e, "Request failed");
                ApiError::internal_error("Internal server error.")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let retry_after = self
            .error
            .details
            .as_ref()
            .and_then(|d| d.get("retry_after"))
            .and_then(|v| v.as_i64())
            .filter(|_| status == StatusCode::TOO_MANY_REQUESTS);

        let mut response = (status, Json(self)).into_response();
        if let Some(secs) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

// ============================================================================
// Extractors
// ============================================================================

/// `Json` whose rejections use the API error envelope
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `Path` whose rejections use the API error envelope
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// `Query` whose rejections use the API error envelope
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let errors = match &rejection {
            JsonRejection::JsonDataError(_) => deserialize_errors(&rejection.body_text()),
            _ => FieldErrors::single("non_field_errors", rejection.body_text()),
        };
        ServiceError::Validation(errors).into()
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::validation_error(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ServiceError::Validation(deserialize_errors(&rejection.body_text())).into()
    }
}

/// Key a serde error message by the field it names.
///
/// Messages look like `...: missing field `email`` or `...: role: unknown variant ...`.
fn deserialize_errors(text: &str) -> FieldErrors {
    let reason = text
        .split_once("target type: ")
        .or_else(|| text.split_once("query string: "))
        .map_or(text, |(_, reason)| reason);

    if let Some(field) = reason
        .strip_prefix("missing field `")
        .and_then(|rest| rest.split_once('`'))
        .map(|(field, _)| field)
    {
        return FieldErrors::single(field, "This field is required.");
    }

    match reason.split_once(": ") {
        Some((path, message))
            if !path.is_empty()
                && path
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.') =>
        {
            FieldErrors::single(path, message)
        }
        _ => FieldErrors::single("non_field_errors", reason),
    }
}

// ============================================================================
// Caller resolution
// ============================================================================

/// Who is making the request, plus the session that proved it
#[derive(Debug, Clone)]
pub struct Identity {
    pub caller: Caller,
    pub session_id: Option<String>,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self {
            caller: Caller::Anonymous,
            session_id: None,
        }
    }
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<Identity>()
            .cloned()
            .unwrap_or_else(Identity::anonymous))
    }
}

/// Read the session id from the `session` cookie
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|cookie| cookie.trim().strip_prefix("session="))
        .find(|token| !token.is_empty())
        .map(str::to_string)
}

/// Resolve the session cookie into an [`Identity`].
///
/// Unknown, expired or orphaned sessions simply make the caller anonymous;
/// the policy decides later whether that matters.
pub async fn resolve_caller(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let mut identity = Identity::anonymous();

    if let Some(token) = extract_session_token(request.headers()) {
        if let Some(user) = state.user_service.validate_session(&token).await? {
            identity = Identity {
                caller: Caller::User(user),
                session_id: Some(token),
            };
        }
    }

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

// ============================================================================
// Cookies
// ============================================================================

/// `Set-Cookie` value for a new session
pub fn session_cookie(session: &Session, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        session.id,
        session.max_age_seconds()
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that removes the session cookie
pub fn clear_session_cookie(secure: bool) -> String {
    let mut cookie = format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE);
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Headers carrying one `Set-Cookie`
pub fn cookie_headers(cookie: &str) -> Result<HeaderMap, ApiError> {
    let value = HeaderValue::from_str(cookie)
        .map_err(|e| ApiError::internal_error(format!("Invalid cookie header: {}", e)))?;
    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, value);
    Ok(headers)
}
