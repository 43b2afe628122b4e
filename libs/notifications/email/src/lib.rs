//! Email delivery adapter for the notification engine.
//!
//! Binds the engine's transport and template seams to real collaborators:
//! SMTP delivery via lettre and Handlebars notification templates.
//!
//! ## Components
//!
//! - **SMTP**: `SmtpMailer` implements the engine's `MailTransport`;
//!   `SmtpTransportFactory` recreates it after send failures
//! - **Templates**: `HandlebarsTemplates` implements the engine's
//!   `NotificationTemplates` with overridable defaults
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use notify_email::{HandlebarsTemplates, SmtpConfig, SmtpTransportFactory};
//! use notify_engine::Dispatcher;
//!
//! let factory = Arc::new(SmtpTransportFactory::new(SmtpConfig::mailpit()));
//! let dispatcher = Dispatcher::new(factory, Duration::from_secs(8));
//! let templates = HandlebarsTemplates::new()?;
//! ```

pub mod smtp;
pub mod templates;

pub use smtp::{SmtpConfig, SmtpMailer, SmtpTransportFactory};
pub use templates::HandlebarsTemplates;
