//! User model
//!
//! Accounts come in three roles. Regular users browse the catalogue and
//! submit applications. University accounts additionally receive
//! applications. Administrators manage everything.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A registered account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    /// Login identifier, stored trimmed and lower-cased
    pub email: String,
    /// Argon2id PHC string
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    /// Institution name, present for university accounts
    pub university_name: Option<String>,
    pub role: Role,
    /// Inactive accounts cannot log in
    pub is_active: bool,
    /// Informational staff marker; authorization is decided by `role`
    pub is_staff: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub date_joined: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new active user.
    ///
    /// The password must already be hashed with `services::password::hash_password`.
    pub fn new(email: String, password_hash: String, role: Role) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            email,
            password_hash,
            first_name: String::new(),
            last_name: String::new(),
            university_name: None,
            role,
            is_active: true,
            is_staff: role == Role::Administrator,
            last_login: None,
            date_joined: now,
            updated_at: now,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Administrator
    }

    pub fn is_university(&self) -> bool {
        self.role == Role::University
    }

    /// Display name: the institution for university accounts, otherwise
    /// "first last", falling back to the email.
    pub fn full_name(&self) -> String {
        if self.role == Role::University {
            if let Some(name) = self.university_name.as_deref().filter(|n| !n.trim().is_empty()) {
                return name.to_string();
            }
        }
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.email.clone()
        } else {
            full.to_string()
        }
    }

    /// Short display name
    pub fn short_name(&self) -> String {
        if self.role == Role::University {
            if let Some(name) = self.university_name.as_deref().filter(|n| !n.trim().is_empty()) {
                return name.to_string();
            }
        }
        if self.first_name.trim().is_empty() {
            self.email.clone()
        } else {
            self.first_name.clone()
        }
    }
}

/// Account role. Closed set; the authorization policy matches on it exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Regular,
    Administrator,
    University,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Regular => write!(f, "regular"),
            Role::Administrator => write!(f, "administrator"),
            Role::University => write!(f, "university"),
        }
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "regular" | "user" => Ok(Role::Regular),
            "administrator" | "admin" => Ok(Role::Administrator),
            "university" => Ok(Role::University),
            _ => Err(anyhow::anyhow!("Invalid user role: {}", s)),
        }
    }
}

/// Canonical form of an email address used for storage and lookup
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Changes to a user record. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserInput {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub university_name: Option<String>,
    /// Administrator only
    pub role: Option<Role>,
    /// Administrator only
    pub is_staff: Option<bool>,
    /// Administrator only
    pub is_active: Option<bool>,
}

impl UpdateUserInput {
    /// Whether the input touches fields only administrators may change
    pub fn touches_privileged_fields(&self) -> bool {
        self.role.is_some() || self.is_staff.is_some() || self.is_active.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> User {
        User::new("person@example.edu".to_string(), "hash".to_string(), role)
    }

    #[test]
    fn test_role_display_and_parse() {
        for role in [Role::Regular, Role::Administrator, Role::University] {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Administrator);
        assert_eq!("USER".parse::<Role>().unwrap(), Role::Regular);
        assert!("editor".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Role::University).unwrap(),
            "\"university\""
        );
    }

    #[test]
    fn test_full_name_for_university_uses_institution() {
        let mut u = user(Role::University);
        u.university_name = Some("Example University".to_string());
        u.first_name = "Ignored".to_string();
        assert_eq!(u.full_name(), "Example University");
        assert_eq!(u.short_name(), "Example University");
    }

    #[test]
    fn test_full_name_falls_back_to_email() {
        let mut u = user(Role::Regular);
        assert_eq!(u.full_name(), "person@example.edu");

        u.first_name = "Ada".to_string();
        u.last_name = "Lovelace".to_string();
        assert_eq!(u.full_name(), "Ada Lovelace");
        assert_eq!(u.short_name(), "Ada");
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let json = serde_json::to_value(user(Role::Regular)).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "regular");
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  U@Ex.EDU "), "u@ex.edu");
    }

    #[test]
    fn test_new_admin_is_staff() {
        assert!(user(Role::Administrator).is_staff);
        assert!(!user(Role::University).is_staff);
    }
}
