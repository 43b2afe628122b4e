//! Content change-notification engine.
//!
//! Fans a content action (publish, unpublish, ...) out to the users
//! subscribed to the affected items or their ancestors, renders a change
//! summary per recipient, and delivers the composed messages from a single
//! lazily started background worker.
//!
//! ## Components
//!
//! - **Fan-out correlator**: pages approved users and merge-joins them
//!   against their subscriptions to find (user, content) matches
//! - **Diff summarizer**: renders what changed, branching on how the
//!   content varies (invariant property table vs. edited-culture list)
//! - **Mail composer**: shapes template parameters, invokes host-supplied
//!   templates, and builds the queueable request
//! - **Dispatcher**: FIFO delivery queue drained by at most one worker,
//!   started on demand and stopped after an idle timeout
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use notify_engine::{
//!     Dispatcher, NotificationConfig, NotificationService, TransportFactory,
//! };
//!
//! let dispatcher = Dispatcher::new(factory, Duration::from_secs(8));
//! let service = NotificationService::new(
//!     users, subscriptions, versions, languages,
//!     dispatcher, NotificationConfig::default(),
//! )?;
//!
//! service
//!     .send_notifications(&actor, &items, "publish", "Publish", &site_url, &templates)
//!     .await?;
//! ```

pub mod composer;
pub mod config;
pub mod correlator;
pub mod dispatch;
pub mod error;
pub mod models;
pub mod service;
pub mod store;
pub mod summary;
pub mod transport;

pub use composer::{BodyParams, MailComposer, NotificationTemplates, SubjectParams};
pub use config::{DEFAULT_USER_BATCH_SIZE, DEFAULT_WORKER_IDLE_TIMEOUT, NotificationConfig};
pub use correlator::{CorrelationSink, FanOutCorrelator};
pub use dispatch::Dispatcher;
pub use error::{NotifyError, NotifyResult};
pub use models::{
    Content, ContentId, ContentPath, ContentSnapshot, CultureInfo, EmailMessage, EntityId,
    Language, NotificationRequest, ObjectKind, Property, Subscription, User, UserId, Variance,
};
pub use service::NotificationService;
pub use store::{
    InMemoryLanguageStore, InMemorySubscriptionStore, InMemoryUserStore, InMemoryVersionStore,
    LanguageStore, SubscriptionStore, UserStore, VersionStore,
};
pub use summary::DiffSummarizer;
pub use transport::{MailTransport, MockTransport, MockTransportFactory, TransportFactory};
