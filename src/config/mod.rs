//! Configuration management
//!
//! Configuration is read from `config.yml` (YAML). Every value has a default,
//! so a missing or empty file yields a usable development setup.
//! `EDUPORTAL_*` environment variables override file values.

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub frontend: FrontendConfig,
    #[serde(default)]
    pub password_reset: PasswordResetConfig,
    /// Optional administrator created at startup when missing
    #[serde(default)]
    pub admin: AdminBootstrapConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin (the frontend, which sends the session cookie)
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/eduportal.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    #[default]
    Sqlite,
    Mysql,
}

/// Login session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// How long a session stays valid after login
    #[serde(default = "default_session_lifetime_days")]
    pub lifetime_days: i64,
    /// Add `Secure` to the session cookie (HTTPS deployments)
    #[serde(default)]
    pub secure_cookie: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lifetime_days: default_session_lifetime_days(),
            secure_cookie: false,
        }
    }
}

fn default_session_lifetime_days() -> i64 {
    14
}

/// Outbound mail transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MailTransport {
    /// Write messages to the log instead of sending them
    #[default]
    Log,
    /// Deliver through an SMTP relay
    Smtp,
}

/// Mail configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    #[serde(default)]
    pub transport: MailTransport,
    #[serde(default)]
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_username: Option<String>,
    #[serde(default)]
    pub smtp_password: Option<String>,
    #[serde(default = "default_from_address")]
    pub from_address: String,
    #[serde(default = "default_from_name")]
    pub from_name: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            transport: MailTransport::default(),
            smtp_host: None,
            smtp_port: default_smtp_port(),
            smtp_username: None,
            smtp_password: None,
            from_address: default_from_address(),
            from_name: default_from_name(),
        }
    }
}

fn default_smtp_port() -> u16 {
    587
}

fn default_from_address() -> String {
    "noreply@localhost".to_string()
}

fn default_from_name() -> String {
    "University Portal".to_string()
}

/// Frontend application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontendConfig {
    /// Base URL used to build links sent by email
    #[serde(default = "default_frontend_url")]
    pub base_url: String,
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            base_url: default_frontend_url(),
        }
    }
}

fn default_frontend_url() -> String {
    "http://localhost:3000".to_string()
}

/// Password reset settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordResetConfig {
    /// Minutes an issued token stays redeemable
    #[serde(default = "default_token_ttl_minutes")]
    pub token_ttl_minutes: i64,
    /// Answer reset requests for unknown emails with a validation error
    #[serde(default)]
    pub reveal_unknown_email: bool,
}

impl Default for PasswordResetConfig {
    fn default() -> Self {
        Self {
            token_ttl_minutes: default_token_ttl_minutes(),
            reveal_unknown_email: false,
        }
    }
}

fn default_token_ttl_minutes() -> i64 {
    24 * 60
}

/// Bootstrap administrator credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminBootstrapConfig {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// A missing or empty file yields the defaults. Invalid YAML is reported
    /// with its line and column.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            })?;

        Ok(config)
    }

    /// Load configuration from file, apply environment overrides and validate.
    ///
    /// Recognised variables:
    /// - EDUPORTAL_SERVER_HOST, EDUPORTAL_SERVER_PORT, EDUPORTAL_SERVER_CORS_ORIGIN
    /// - EDUPORTAL_DATABASE_DRIVER, EDUPORTAL_DATABASE_URL
    /// - EDUPORTAL_SESSION_LIFETIME_DAYS, EDUPORTAL_SESSION_SECURE_COOKIE
    /// - EDUPORTAL_MAIL_TRANSPORT, EDUPORTAL_MAIL_SMTP_HOST, EDUPORTAL_MAIL_SMTP_PORT,
    ///   EDUPORTAL_MAIL_SMTP_USERNAME, EDUPORTAL_MAIL_SMTP_PASSWORD, EDUPORTAL_MAIL_FROM_ADDRESS,
    ///   EDUPORTAL_MAIL_FROM_NAME
    /// - EDUPORTAL_FRONTEND_URL
    /// - EDUPORTAL_RESET_TOKEN_TTL_MINUTES
    /// - EDUPORTAL_ADMIN_EMAIL, EDUPORTAL_ADMIN_PASSWORD
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mail.transport == MailTransport::Smtp
            && self.mail.smtp_host.as_deref().map_or(true, |h| h.trim().is_empty())
        {
            return Err(ConfigError::ValidationError(
                "mail.smtp_host is required when mail.transport is smtp".to_string(),
            ));
        }
        if !self.frontend.base_url.starts_with("http://")
            && !self.frontend.base_url.starts_with("https://")
        {
            return Err(ConfigError::ValidationError(format!(
                "frontend.base_url must be an http(s) URL, got '{}'",
                self.frontend.base_url
            )));
        }
        if self.session.lifetime_days <= 0 {
            return Err(ConfigError::ValidationError(
                "session.lifetime_days must be positive".to_string(),
            ));
        }
        if self.password_reset.token_ttl_minutes <= 0 {
            return Err(ConfigError::ValidationError(
                "password_reset.token_ttl_minutes must be positive".to_string(),
            ));
        }
        if self.admin.email.is_some() != self.admin.password.is_some() {
            return Err(ConfigError::ValidationError(
                "admin.email and admin.password must be given together".to_string(),
            ));
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        // Server
        if let Ok(host) = std::env::var("EDUPORTAL_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("EDUPORTAL_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(cors_origin) = std::env::var("EDUPORTAL_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = cors_origin;
        }

        // Database
        if let Ok(driver) = std::env::var("EDUPORTAL_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {}
            }
        }
        if let Ok(url) = std::env::var("EDUPORTAL_DATABASE_URL") {
            self.database.url = url;
        }

        // Session
        if let Ok(days) = std::env::var("EDUPORTAL_SESSION_LIFETIME_DAYS") {
            if let Ok(days) = days.parse::<i64>() {
                self.session.lifetime_days = days;
            }
        }
        if let Ok(secure) = std::env::var("EDUPORTAL_SESSION_SECURE_COOKIE") {
            if let Ok(secure) = secure.parse::<bool>() {
                self.session.secure_cookie = secure;
            }
        }

        // Mail
        if let Ok(transport) = std::env::var("EDUPORTAL_MAIL_TRANSPORT") {
            match transport.to_lowercase().as_str() {
                "log" => self.mail.transport = MailTransport::Log,
                "smtp" => self.mail.transport = MailTransport::Smtp,
                _ => {}
            }
        }
        if let Ok(host) = std::env::var("EDUPORTAL_MAIL_SMTP_HOST") {
            self.mail.smtp_host = Some(host);
        }
        if let Ok(port) = std::env::var("EDUPORTAL_MAIL_SMTP_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.mail.smtp_port = port;
            }
        }
        if let Ok(username) = std::env::var("EDUPORTAL_MAIL_SMTP_USERNAME") {
            self.mail.smtp_username = Some(username);
        }
        if let Ok(password) = std::env::var("EDUPORTAL_MAIL_SMTP_PASSWORD") {
            self.mail.smtp_password = Some(password);
        }
        if let Ok(from) = std::env::var("EDUPORTAL_MAIL_FROM_ADDRESS") {
            self.mail.from_address = from;
        }
        if let Ok(name) = std::env::var("EDUPORTAL_MAIL_FROM_NAME") {
            self.mail.from_name = name;
        }

        // Frontend and reset tokens
        if let Ok(url) = std::env::var("EDUPORTAL_FRONTEND_URL") {
            self.frontend.base_url = url;
        }
        if let Ok(ttl) = std::env::var("EDUPORTAL_RESET_TOKEN_TTL_MINUTES") {
            if let Ok(ttl) = ttl.parse::<i64>() {
                self.password_reset.token_ttl_minutes = ttl;
            }
        }

        // Bootstrap admin
        if let Ok(email) = std::env::var("EDUPORTAL_ADMIN_EMAIL") {
            self.admin.email = Some(email);
        }
        if let Ok(password) = std::env::var("EDUPORTAL_ADMIN_PASSWORD") {
            self.admin.password = Some(password);
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Config tests that touch the process environment must hold this lock.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
const ENV_KEYS: &[&str] = &[
    "EDUPORTAL_SERVER_HOST",
    "EDUPORTAL_SERVER_PORT",
    "EDUPORTAL_SERVER_CORS_ORIGIN",
    "EDUPORTAL_DATABASE_DRIVER",
    "EDUPORTAL_DATABASE_URL",
    "EDUPORTAL_SESSION_LIFETIME_DAYS",
    "EDUPORTAL_SESSION_SECURE_COOKIE",
    "EDUPORTAL_MAIL_TRANSPORT",
    "EDUPORTAL_MAIL_SMTP_HOST",
    "EDUPORTAL_MAIL_SMTP_PORT",
    "EDUPORTAL_MAIL_SMTP_USERNAME",
    "EDUPORTAL_MAIL_SMTP_PASSWORD",
    "EDUPORTAL_MAIL_FROM_ADDRESS",
    "EDUPORTAL_MAIL_FROM_NAME",
    "EDUPORTAL_FRONTEND_URL",
    "EDUPORTAL_RESET_TOKEN_TTL_MINUTES",
    "EDUPORTAL_ADMIN_EMAIL",
    "EDUPORTAL_ADMIN_PASSWORD",
];


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn valid_config_strategy() -> impl Strategy<Value = Config> {
        (
            "[a-z][a-z0-9]{0,10}",
            1u16..=65535,
            prop_oneof![Just(DatabaseDriver::Sqlite), Just(DatabaseDriver::Mysql)],
            1i64..=365,
            1i64..=10_080,
            any::<bool>(),
        )
            .prop_map(|(host, port, driver, days, ttl, reveal)| {
                let mut config = Config::default();
                config.server.host = host;
                config.server.port = port;
                config.database.driver = driver;
                config.session.lifetime_days = days;
                config.password_reset.token_ttl_minutes = ttl;
                config.password_reset.reveal_unknown_email = reveal;
                config
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        /// Serializing a config to YAML and loading it back preserves every field
        #[test]
        fn config_yaml_roundtrip(config in valid_config_strategy()) {
            let yaml = serde_yaml::to_string(&config).unwrap();
            let mut file = NamedTempFile::new().unwrap();
            write!(file, "{}", yaml).unwrap();

            let loaded = Config::load(file.path()).unwrap();

            prop_assert_eq!(&loaded.server.host, &config.server.host);
            prop_assert_eq!(loaded.server.port, config.server.port);
            prop_assert_eq!(loaded.database.driver, config.database.driver);
            prop_assert_eq!(loaded.session.lifetime_days, config.session.lifetime_days);
            prop_assert_eq!(
                loaded.password_reset.token_ttl_minutes,
                config.password_reset.token_ttl_minutes
            );
            prop_assert_eq!(
                loaded.password_reset.reveal_unknown_email,
                config.password_reset.reveal_unknown_email
            );
            prop_assert!(loaded.validate().is_ok());
        }
    }
}
