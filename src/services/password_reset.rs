//! Password reset workflow
//!
//! A reset token is issued by email and redeemed once:
//!
//! ```text
//! request_reset(email) -> ISSUED --confirm_reset--> REDEEMED
//!                            \--(expires_at passes)--> rejected like REDEEMED
//! ```
//!
//! The raw token exists only in the email. The database keeps its SHA-256
//! digest, and redemption claims the row with a conditional update inside the
//! same transaction that rewrites the password, so a token works at most once
//! even under concurrent confirmations.

use crate::config::Config;
use crate::db::repositories::{PasswordResetRepository, UserRepository};
use crate::models::normalize_email;
use crate::services::email::EmailService;
use crate::services::password::{hash_password, is_long_enough};
use crate::services::rate_limiter::RateLimiters;
use crate::services::user::{password_too_short, PASSWORDS_DO_NOT_MATCH};
use crate::services::validation::check_email;
use crate::services::{FieldErrors, ServiceError};
use anyhow::Context;
use argon2::password_hash::rand_core::{OsRng, RngCore};
use chrono::{Duration, Utc};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Length of a raw reset token
pub const TOKEN_LENGTH: usize = 64;

const TOKEN_ALPHABET: &[u8; 62] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Largest multiple of 62 that fits in a byte; bytes above it are rejected
const ACCEPT_BELOW: u8 = 248;

pub const INVALID_TOKEN: &str = "Invalid or used token.";
pub const UNKNOWN_EMAIL: &str = "No user with this email was found.";

/// Generate a reset token: 64 characters from `[A-Za-z0-9]`, OS randomness.
pub fn generate_token() -> String {
    let mut token = String::with_capacity(TOKEN_LENGTH);
    let mut buf = [0u8; TOKEN_LENGTH];

    while token.len() < TOKEN_LENGTH {
        OsRng.fill_bytes(&mut buf);
        for byte in buf.iter().copied().filter(|b| *b < ACCEPT_BELOW) {
            token.push(TOKEN_ALPHABET[(byte % 62) as usize] as char);
            if token.len() == TOKEN_LENGTH {
                break;
            }
        }
    }

    token
}

/// Digest stored in place of the raw token
pub fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResetRequestInput {
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResetConfirmInput {
    pub token: String,
    pub password: String,
    pub password_confirm: String,
}

/// Workflow settings
#[derive(Debug, Clone)]
pub struct ResetOptions {
    pub token_ttl: Duration,
    /// Report unknown emails instead of answering as if a mail was sent
    pub reveal_unknown_email: bool,
    /// Frontend origin; links point at `{base}/reset-password/{token}/`
    pub frontend_base_url: String,
}

impl ResetOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            token_ttl: Duration::minutes(config.password_reset.token_ttl_minutes),
            reveal_unknown_email: config.password_reset.reveal_unknown_email,
            frontend_base_url: config.frontend.base_url.clone(),
        }
    }

    fn reset_url(&self, token: &str) -> String {
        format!(
            "{}/reset-password/{}/",
            self.frontend_base_url.trim_end_matches('/'),
            token
        )
    }
}

impl Default for ResetOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

pub struct PasswordResetService {
    user_repo: Arc<dyn UserRepository>,
    reset_repo: Arc<dyn PasswordResetRepository>,
    email: EmailService,
    limiters: Arc<RateLimiters>,
    options: ResetOptions,
}

impl PasswordResetService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        reset_repo: Arc<dyn PasswordResetRepository>,
        email: EmailService,
        limiters: Arc<RateLimiters>,
        options: ResetOptions,
    ) -> Self {
        Self {
            user_repo,
            reset_repo,
            email,
            limiters,
            options,
        }
    }

    /// Issue a token and mail the reset link.
    ///
    /// Unknown and inactive emails get the same answer as known ones, and
    /// nothing is stored or sent for them, unless `reveal_unknown_email` is on.
    ///
    /// # Errors
    ///
    /// - `Validation` for a malformed email (or an unknown one when revealing)
    /// - `RateLimited` after three requests in fifteen minutes for one email
    /// - `Delivery` when the mail transport fails; the issued token stays valid
    pub async fn request_reset(&self, input: ResetRequestInput) -> Result<(), ServiceError> {
        let email = normalize_email(&input.email);
        let mut errors = FieldErrors::new();
        check_email(&mut errors, "email", &email);
        errors.into_result()?;

        if let Some(retry_after_secs) = self.limiters.reset_request.retry_after(&email).await {
            tracing::warn!(retry_after_secs, "Password reset request rate limited");
            return Err(ServiceError::RateLimited { retry_after_secs });
        }
        self.limiters.reset_request.record(&email).await;

        let user = self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to get user by email")?
            .filter(|u| u.is_active);

        let Some(user) = user else {
            if self.options.reveal_unknown_email {
                return Err(ServiceError::field("email", UNKNOWN_EMAIL));
            }
            tracing::debug!("Password reset requested for unknown email");
            return Ok(());
        };

        let token = generate_token();
        let expires_at = Utc::now() + self.options.token_ttl;
        let issued = self
            .reset_repo
            .create(user.id, &hash_token(&token), expires_at)
            .await
            .context("Failed to store password reset token")?;

        tracing::info!(user_id = user.id, token_id = issued.id, "Password reset token issued");

        self.email
            .send_password_reset(&user.email, &self.options.reset_url(&token))
            .await
            .map_err(|e| {
                tracing::error!(user_id = user.id, error = %e, "Password reset email delivery failed");
                ServiceError::Delivery(e.to_string())
            })
    }

    /// Redeem a token and set the new password.
    ///
    /// On success every session of the user is closed.
    pub async fn confirm_reset(&self, input: ResetConfirmInput) -> Result<(), ServiceError> {
        let mut errors = FieldErrors::new();
        if input.password != input.password_confirm {
            errors.add("password_confirm", PASSWORDS_DO_NOT_MATCH);
        }
        if !is_long_enough(&input.password) {
            errors.add("password", password_too_short());
        }
        errors.into_result()?;

        let token_hash = hash_token(input.token.trim());
        let new_hash = hash_password(&input.password)?;
        let now = Utc::now();

        match self
            .reset_repo
            .redeem(&token_hash, &new_hash, now)
            .await
            .context("Failed to redeem password reset token")?
        {
            Some(user_id) => {
                tracing::info!(user_id, "Password reset completed");
                Ok(())
            }
            None => {
                tracing::debug!("Password reset token rejected");
                Err(ServiceError::field("token", INVALID_TOKEN))
            }
        }
    }
}
