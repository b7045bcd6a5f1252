//! Outbound email
//!
//! The password reset workflow talks to a [`Mailer`]. Production uses SMTP
//! through lettre; development uses [`LogMailer`], which writes the message to
//! the log instead of sending it.

use crate::config::{MailConfig, MailTransport};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;

/// A plain-text message ready to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver one message. Failures are returned, never retried.
    async fn send(&self, email: OutgoingEmail) -> Result<()>;
}

/// SMTP delivery
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> Result<Self> {
        let host = config
            .smtp_host
            .as_deref()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| anyhow!("SMTP host not configured"))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .map_err(|e| anyhow!("Failed to create SMTP transport: {}", e))?
            .port(config.smtp_port);

        if let (Some(username), Some(password)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        let from = format!("{} <{}>", config.from_name, config.from_address)
            .parse::<Mailbox>()
            .map_err(|e| anyhow!("Invalid from address: {}", e))?;

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<()> {
        let to = email
            .to
            .parse::<Mailbox>()
            .map_err(|e| anyhow!("Invalid to address: {}", e))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(email.body)
            .map_err(|e| anyhow!("Failed to build email: {}", e))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| anyhow!("Failed to send email: {}", e))?;

        Ok(())
    }
}

/// Development transport: logs instead of sending
#[derive(Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<()> {
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            "Outgoing email (log transport):\n{}",
            email.body
        );
        Ok(())
    }
}

/// Build the mailer selected by `mail.transport`
pub fn create_mailer(config: &MailConfig) -> Result<Arc<dyn Mailer>> {
    match config.transport {
        MailTransport::Log => Ok(Arc::new(LogMailer)),
        MailTransport::Smtp => {
            let mailer = SmtpMailer::new(config).context("Failed to configure SMTP mailer")?;
            Ok(Arc::new(mailer))
        }
    }
}

/// Composes the portal's messages
pub struct EmailService {
    mailer: Arc<dyn Mailer>,
    site_name: String,
}

impl EmailService {
    pub fn new(mailer: Arc<dyn Mailer>, site_name: impl Into<String>) -> Self {
        Self {
            mailer,
            site_name: site_name.into(),
        }
    }

    pub async fn send_password_reset(&self, to_email: &str, reset_url: &str) -> Result<()> {
        let subject = format!("[{}] Password reset", self.site_name);
        let body = format!(
            "Hello,\n\n\
             A password reset was requested for your account. Open the link below to choose a new password:\n\n\
             {}\n\n\
             If you did not request this, you can ignore this email. The link can be used once.\n\n\
             {}",
            reset_url, self.site_name
        );

        self.mailer
            .send(OutgoingEmail {
                to: to_email.to_string(),
                subject,
                body,
            })
            .await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use tokio::sync::Mutex;

    /// Keeps every message instead of sending it
    #[derive(Default)]
    pub struct RecordingMailer {
        pub sent: Mutex<Vec<OutgoingEmail>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, email: OutgoingEmail) -> Result<()> {
            self.sent.lock().await.push(email);
            Ok(())
        }
    }

    /// Always fails, like an unreachable SMTP relay
    pub struct FailingMailer;

    #[async_trait]
    impl Mailer for FailingMailer {
        async fn send(&self, _email: OutgoingEmail) -> Result<()> {
            Err(anyhow!("Connection refused"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{FailingMailer, RecordingMailer};
    use super::*;

    #[tokio::test]
    async fn test_password_reset_email_contains_link() {
        let mailer = Arc::new(RecordingMailer::default());
        let service = EmailService::new(mailer.clone(), "University Portal");

        service
            .send_password_reset("u@ex.edu", "http://localhost:3000/reset-password/abc/")
            .await
            .expect("Failed to send");

        let sent = mailer.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "u@ex.edu");
        assert!(sent[0].subject.contains("Password reset"));
        assert!(sent[0].body.contains("http://localhost:3000/reset-password/abc/"));
    }

    #[tokio::test]
    async fn test_delivery_failure_is_returned() {
        let service = EmailService::new(Arc::new(FailingMailer), "University Portal");
        let result = service.send_password_reset("u@ex.edu", "http://x/").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_log_mailer_accepts_messages() {
        let mailer = LogMailer;
        let email = OutgoingEmail {
            to: "u@ex.edu".to_string(),
            subject: "Hi".to_string(),
            body: "Body".to_string(),
        };
        assert!(mailer.send(email).await.is_ok());
    }

    #[test]
    fn test_create_mailer_requires_smtp_host() {
        let mut config = MailConfig::default();
        config.transport = MailTransport::Smtp;
        config.smtp_host = None;
        assert!(create_mailer(&config).is_err());

        config.transport = MailTransport::Log;
        assert!(create_mailer(&config).is_ok());
    }
}
