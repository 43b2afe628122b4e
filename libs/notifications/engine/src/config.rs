//! Engine configuration.

use std::time::Duration;

use crate::error::{NotifyError, NotifyResult};

/// Default page size for the correlator's user paging.
pub const DEFAULT_USER_BATCH_SIZE: usize = 400;

/// Default time the delivery worker waits on an empty queue before stopping.
pub const DEFAULT_WORKER_IDLE_TIMEOUT: Duration = Duration::from_secs(8);

/// Configuration for the notification engine.
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    /// Sender address for outgoing notifications.
    pub sender_address: String,
    /// Render plain-text bodies instead of HTML.
    pub disable_html_email: bool,
    /// The site runs HTTPS; affects edit links and the body link rewrite.
    pub use_https: bool,
    /// Back-office path appended to the site authority.
    pub admin_path: String,
    /// Page size for the correlator's user paging.
    pub user_batch_size: usize,
    /// Idle wait before the delivery worker stops.
    pub worker_idle_timeout: Duration,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            sender_address: "noreply@localhost".to_string(),
            disable_html_email: false,
            use_https: false,
            admin_path: "/admin".to_string(),
            user_batch_size: DEFAULT_USER_BATCH_SIZE,
            worker_idle_timeout: DEFAULT_WORKER_IDLE_TIMEOUT,
        }
    }
}

impl NotificationConfig {
    /// Read configuration from `NOTIFICATIONS_*` environment variables,
    /// falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            sender_address: std::env::var("NOTIFICATIONS_SENDER_ADDRESS")
                .unwrap_or_else(|_| "noreply@localhost".to_string()),
            disable_html_email: std::env::var("NOTIFICATIONS_DISABLE_HTML_EMAIL")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            use_https: std::env::var("NOTIFICATIONS_USE_HTTPS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            admin_path: std::env::var("NOTIFICATIONS_ADMIN_PATH")
                .unwrap_or_else(|_| "/admin".to_string()),
            user_batch_size: std::env::var("NOTIFICATIONS_USER_BATCH_SIZE")
                .unwrap_or_else(|_| "400".to_string())
                .parse()
                .unwrap_or(DEFAULT_USER_BATCH_SIZE),
            worker_idle_timeout: Duration::from_secs(
                std::env::var("NOTIFICATIONS_WORKER_IDLE_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "8".to_string())
                    .parse()
                    .unwrap_or(8),
            ),
        }
    }

    /// Set the sender address.
    pub fn with_sender_address(mut self, address: impl Into<String>) -> Self {
        self.sender_address = address.into();
        self
    }

    /// Enable or disable HTML email bodies.
    pub fn with_html_disabled(mut self, disabled: bool) -> Self {
        self.disable_html_email = disabled;
        self
    }

    /// Enable or disable HTTPS link generation.
    pub fn with_https(mut self, use_https: bool) -> Self {
        self.use_https = use_https;
        self
    }

    /// Set the back-office path.
    pub fn with_admin_path(mut self, path: impl Into<String>) -> Self {
        self.admin_path = path.into();
        self
    }

    /// Set the user page size.
    pub fn with_user_batch_size(mut self, size: usize) -> Self {
        self.user_batch_size = size.max(1);
        self
    }

    /// Set the worker idle timeout.
    pub fn with_worker_idle_timeout(mut self, timeout: Duration) -> Self {
        self.worker_idle_timeout = timeout;
        self
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> NotifyResult<()> {
        if self.sender_address.trim().is_empty() {
            return Err(NotifyError::Config(
                "sender address must not be empty".to_string(),
            ));
        }
        if self.user_batch_size == 0 {
            return Err(NotifyError::Config(
                "user batch size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
