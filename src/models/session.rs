//! Session model

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Server-side login session; `id` is the value of the `session` cookie.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Start a session for `user_id` that lasts `lifetime`
    pub fn new(user_id: i64, lifetime: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            expires_at: now + lifetime,
            created_at: now,
        }
    }

    /// Check if the session has expired
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }

    /// Seconds until expiry, for the cookie `Max-Age`
    pub fn max_age_seconds(&self) -> i64 {
        (self.expires_at - Utc::now()).num_seconds().max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_expiry() {
        let session = Session::new(7, Duration::days(14));
        assert_eq!(session.user_id, 7);
        assert!(!session.is_expired());
        assert!(session.max_age_seconds() > 13 * 24 * 3600);
        assert!(Uuid::parse_str(&session.id).is_ok());
    }

    #[test]
    fn test_expired_session() {
        let mut session = Session::new(1, Duration::days(1));
        session.expires_at = Utc::now() - Duration::seconds(5);
        assert!(session.is_expired());
        assert_eq!(session.max_age_seconds(), 0);
    }
}
