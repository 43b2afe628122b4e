//! SMTP mail transport using lettre.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use notify_engine::{
    EmailMessage, MailTransport, NotifyError, NotifyResult, TransportFactory,
};

/// SMTP connection configuration.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub use_tls: bool,
}

impl SmtpConfig {
    /// Configuration for Mailpit/Mailhog (local development).
    ///
    /// Connects to localhost:1025 without authentication.
    pub fn mailpit() -> Self {
        Self {
            host: std::env::var("SMTP_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("SMTP_PORT")
                .unwrap_or_else(|_| "1025".to_string())
                .parse()
                .unwrap_or(1025),
            username: String::new(),
            password: String::new(),
            use_tls: false,
        }
    }

    /// Read configuration from `SMTP_*` environment variables.
    pub fn from_env() -> NotifyResult<Self> {
        Ok(Self {
            host: std::env::var("SMTP_HOST")
                .map_err(|_| NotifyError::Config("SMTP_HOST not set".to_string()))?,
            port: std::env::var("SMTP_PORT")
                .unwrap_or_else(|_| "587".to_string())
                .parse()
                .map_err(|_| NotifyError::Config("invalid SMTP_PORT".to_string()))?,
            username: std::env::var("SMTP_USERNAME").unwrap_or_default(),
            password: std::env::var("SMTP_PASSWORD").unwrap_or_default(),
            use_tls: std::env::var("SMTP_USE_TLS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),
        })
    }
}

/// Sends composed notifications over SMTP.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> NotifyResult<Self> {
        let transport = if config.use_tls {
            let credentials =
                Credentials::new(config.username.clone(), config.password.clone());
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| NotifyError::Transport(format!("smtp relay setup failed: {e}")))?
                .credentials(credentials)
                .port(config.port)
                .build()
        } else if !config.username.is_empty() {
            let credentials =
                Credentials::new(config.username.clone(), config.password.clone());
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
                .credentials(credentials)
                .port(config.port)
                .build()
        } else {
            // No auth (Mailpit/Mailhog).
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
                .port(config.port)
                .build()
        };

        Ok(Self { transport })
    }

    fn build_message(&self, message: &EmailMessage) -> NotifyResult<Message> {
        let from: Mailbox = message
            .from
            .parse()
            .map_err(|e| NotifyError::Transport(format!("invalid from address: {e}")))?;
        let to: Mailbox = message
            .to
            .parse()
            .map_err(|e| NotifyError::Transport(format!("invalid to address: {e}")))?;

        let content_type = if message.html {
            ContentType::TEXT_HTML
        } else {
            ContentType::TEXT_PLAIN
        };

        Message::builder()
            .from(from)
            .to(to)
            .subject(&message.subject)
            .header(content_type)
            .body(message.body.clone())
            .map_err(|e| NotifyError::Transport(format!("failed to build message: {e}")))
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, message: &EmailMessage) -> NotifyResult<()> {
        let mail = self.build_message(message)?;
        self.transport
            .send(mail)
            .await
            .map_err(|e| NotifyError::Transport(format!("smtp send failed: {e}")))?;
        tracing::debug!(
            to = %message.to,
            subject = %message.subject,
            "smtp message sent"
        );
        Ok(())
    }
}

/// Builds a fresh `SmtpMailer` whenever the delivery worker needs one.
pub struct SmtpTransportFactory {
    config: SmtpConfig,
}

impl SmtpTransportFactory {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }
}

impl TransportFactory for SmtpTransportFactory {
    fn create(&self) -> NotifyResult<Box<dyn MailTransport>> {
        Ok(Box::new(SmtpMailer::new(&self.config)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_config() -> SmtpConfig {
        SmtpConfig {
            host: "localhost".to_string(),
            port: 1025,
            username: String::new(),
            password: String::new(),
            use_tls: false,
        }
    }

    fn message(to: &str, html: bool) -> EmailMessage {
        EmailMessage {
            from: "noreply@localhost".to_string(),
            to: to.to_string(),
            subject: "Subject".to_string(),
            body: "<p>Body</p>".to_string(),
            html,
        }
    }

    #[test]
    fn builds_transports_for_all_auth_modes() {
        assert!(SmtpMailer::new(&local_config()).is_ok());

        let mut with_auth = local_config();
        with_auth.username = "mailer".to_string();
        with_auth.password = "secret".to_string();
        assert!(SmtpMailer::new(&with_auth).is_ok());

        let mut with_tls = with_auth;
        with_tls.use_tls = true;
        with_tls.port = 587;
        assert!(SmtpMailer::new(&with_tls).is_ok());
    }

    #[test]
    fn content_type_follows_html_flag() {
        let mailer = SmtpMailer::new(&local_config()).unwrap();

        let html = mailer
            .build_message(&message("reviewer@example.com", true))
            .unwrap();
        assert!(String::from_utf8_lossy(&html.formatted()).contains("text/html"));

        let plain = mailer
            .build_message(&message("reviewer@example.com", false))
            .unwrap();
        assert!(String::from_utf8_lossy(&plain.formatted()).contains("text/plain"));
    }

    #[test]
    fn invalid_recipient_address_is_rejected() {
        let mailer = SmtpMailer::new(&local_config()).unwrap();

        let result = mailer.build_message(&message("not an address", false));

        assert!(matches!(result, Err(NotifyError::Transport(_))));
    }
}
