//! Password reset token model

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A persisted reset token. Only the SHA-256 digest of the secret is stored.
#[derive(Debug, Clone, Serialize)]
pub struct PasswordResetToken {
    pub id: i64,
    pub user_id: i64,
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_used: bool,
    pub used_at: Option<DateTime<Utc>>,
}

/// Lifecycle of a reset token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    /// Issued and still redeemable
    Issued,
    /// Issued but past its expiry; never redeemable
    Expired,
    /// Consumed by a password change; permanently inert
    Redeemed,
}

impl PasswordResetToken {
    pub fn state_at(&self, now: DateTime<Utc>) -> TokenState {
        if self.is_used {
            TokenState::Redeemed
        } else if self.expires_at <= now {
            TokenState::Expired
        } else {
            TokenState::Issued
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn token(is_used: bool, expires_in: Duration) -> PasswordResetToken {
        let now = Utc::now();
        PasswordResetToken {
            id: 1,
            user_id: 1,
            token_hash: "digest".to_string(),
            created_at: now,
            expires_at: now + expires_in,
            is_used,
            used_at: None,
        }
    }

    #[test]
    fn test_token_states() {
        let now = Utc::now();
        assert_eq!(token(false, Duration::hours(1)).state_at(now), TokenState::Issued);
        assert_eq!(token(false, Duration::hours(-1)).state_at(now), TokenState::Expired);
        assert_eq!(token(true, Duration::hours(1)).state_at(now), TokenState::Redeemed);
        assert_eq!(token(true, Duration::hours(-1)).state_at(now), TokenState::Redeemed);
    }
}
