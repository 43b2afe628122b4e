//! Mail transport abstraction.
//!
//! The delivery worker owns exactly one transport at a time and asks the
//! factory for a replacement after any send failure, so factories must be
//! cheap to call repeatedly.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{NotifyError, NotifyResult};
use crate::models::EmailMessage;

/// Sends one composed message.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> NotifyResult<()>;
}

/// Produces transport clients for the delivery worker.
pub trait TransportFactory: Send + Sync {
    fn create(&self) -> NotifyResult<Box<dyn MailTransport>>;
}

/// Mock transport for testing. Captures sent messages.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    sent: Arc<Mutex<Vec<EmailMessage>>>,
    should_fail: bool,
    failure_message: Option<String>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport that fails every send with the given message.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            should_fail: true,
            failure_message: Some(message.into()),
        }
    }

    /// Get all messages sent through this transport.
    pub async fn sent_messages(&self) -> Vec<EmailMessage> {
        self.sent.lock().await.clone()
    }

    /// Get the number of messages sent.
    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// Clear the sent messages list.
    pub async fn clear(&self) {
        self.sent.lock().await.clear();
    }

    /// Check whether a message was sent to the given address.
    pub async fn was_sent_to(&self, address: &str) -> bool {
        self.sent.lock().await.iter().any(|m| m.to == address)
    }
}

#[async_trait]
impl MailTransport for MockTransport {
    async fn send(&self, message: &EmailMessage) -> NotifyResult<()> {
        if self.should_fail {
            let reason = self
                .failure_message
                .clone()
                .unwrap_or_else(|| "mock failure".to_string());
            return Err(NotifyError::Transport(reason));
        }
        self.sent.lock().await.push(message.clone());
        Ok(())
    }
}

/// Mock factory for testing worker recovery. All transports it creates
/// share one sent-message list; the first `failing_transports` of them
/// fail every send.
#[derive(Debug, Default)]
pub struct MockTransportFactory {
    sent: Arc<Mutex<Vec<EmailMessage>>>,
    created: AtomicUsize,
    failing_transports: usize,
}

impl MockTransportFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// A factory whose first `count` transports fail every send.
    pub fn failing_first(count: usize) -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            created: AtomicUsize::new(0),
            failing_transports: count,
        }
    }

    /// Number of transports created so far.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Get all messages sent through transports from this factory.
    pub async fn sent_messages(&self) -> Vec<EmailMessage> {
        self.sent.lock().await.clone()
    }

    /// Get the number of messages sent.
    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// Check whether a message was sent to the given address.
    pub async fn was_sent_to(&self, address: &str) -> bool {
        self.sent.lock().await.iter().any(|m| m.to == address)
    }
}

impl TransportFactory for MockTransportFactory {
    fn create(&self) -> NotifyResult<Box<dyn MailTransport>> {
        let index = self.created.fetch_add(1, Ordering::SeqCst);
        let fail = index < self.failing_transports;
        Ok(Box::new(MockTransport {
            sent: Arc::clone(&self.sent),
            should_fail: fail,
            failure_message: fail.then(|| "mock transport failure".to_string()),
        }))
    }
}
