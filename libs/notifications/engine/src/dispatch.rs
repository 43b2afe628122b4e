//! Delivery queue and worker.
//!
//! Producers enqueue from any thread and never block on delivery. At most
//! one worker task drains the queue; it starts lazily on the first enqueue
//! and stops after the queue stays empty for the idle timeout. The
//! queue and the running flag live under one mutex so that starting and
//! stopping serialize, which is what makes losing a message impossible.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tracing::{debug, error, info};

use crate::models::NotificationRequest;
use crate::transport::{MailTransport, TransportFactory};

struct DispatchState {
    queue: VecDeque<NotificationRequest>,
    running: bool,
}

#[derive(Debug, Default)]
struct DispatchCounters {
    /// Workers ever started.
    started: AtomicUsize,
    /// Workers currently running.
    active: AtomicUsize,
    /// High-water mark of `active`.
    peak: AtomicUsize,
}

/// Accepts composed notifications and delivers them from a single lazily
/// started worker task.
#[derive(Clone)]
pub struct Dispatcher {
    state: Arc<Mutex<DispatchState>>,
    wakeup: Arc<Notify>,
    factory: Arc<dyn TransportFactory>,
    counters: Arc<DispatchCounters>,
    idle_timeout: Duration,
    runtime: Handle,
}

impl Dispatcher {
    /// Create a dispatcher that sends through transports from `factory`
    /// and stops its worker after `idle_timeout` of queue emptiness.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime; the handle captured
    /// here is what lets `enqueue` spawn the worker from any thread.
    pub fn new(factory: Arc<dyn TransportFactory>, idle_timeout: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(DispatchState {
                queue: VecDeque::new(),
                running: false,
            })),
            wakeup: Arc::new(Notify::new()),
            factory,
            counters: Arc::new(DispatchCounters::default()),
            idle_timeout,
            runtime: Handle::current(),
        }
    }

    /// Queue a notification for asynchronous delivery. Never blocks on
    /// delivery; starts the worker if none is running.
    pub fn enqueue(&self, request: NotificationRequest) {
        let start = {
            // Pushing and checking the running flag share the lock the
            // worker exits under, so an exiting worker either sees this
            // request or leaves the start to us.
            let mut state = self.state.lock();
            state.queue.push_back(request);
            if state.running {
                false
            } else {
                state.running = true;
                true
            }
        };
        if start {
            self.spawn_worker();
        } else {
            self.wakeup.notify_one();
        }
    }

    /// Number of requests waiting in the queue.
    pub fn queued(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Whether a worker is currently running.
    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// Number of workers ever started.
    pub fn workers_started(&self) -> usize {
        self.counters.started.load(Ordering::SeqCst)
    }

    /// Number of workers currently running.
    pub fn active_workers(&self) -> usize {
        self.counters.active.load(Ordering::SeqCst)
    }

    /// Highest number of workers that ever ran concurrently.
    pub fn peak_active_workers(&self) -> usize {
        self.counters.peak.load(Ordering::SeqCst)
    }

    fn spawn_worker(&self) {
        self.counters.started.fetch_add(1, Ordering::SeqCst);
        debug!("starting delivery worker");
        let worker = DeliveryWorker {
            state: Arc::clone(&self.state),
            wakeup: Arc::clone(&self.wakeup),
            factory: Arc::clone(&self.factory),
            counters: Arc::clone(&self.counters),
            idle_timeout: self.idle_timeout,
        };
        self.runtime.spawn(worker.run());
    }
}

struct DeliveryWorker {
    state: Arc<Mutex<DispatchState>>,
    wakeup: Arc<Notify>,
    factory: Arc<dyn TransportFactory>,
    counters: Arc<DispatchCounters>,
    idle_timeout: Duration,
}

impl DeliveryWorker {
    async fn run(self) {
        let active = self.counters.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.peak.fetch_max(active, Ordering::SeqCst);

        // Owned by this worker alone; recreated after any send failure.
        let mut transport: Option<Box<dyn MailTransport>> = None;

        loop {
            while let Some(request) = self.pop() {
                self.deliver(&mut transport, request).await;
            }

            let timed_out = tokio::time::timeout(self.idle_timeout, self.wakeup.notified())
                .await
                .is_err();
            if timed_out && self.try_exit() {
                debug!("delivery worker idle, stopping");
                return;
            }
        }
    }

    fn pop(&self) -> Option<NotificationRequest> {
        self.state.lock().queue.pop_front()
    }

    /// Last-chance check: only exit while the queue is provably empty.
    /// An enqueue that saw us running pushed under this same lock, so
    /// either we see its request here or it sees `running == false` and
    /// starts the next worker.
    fn try_exit(&self) -> bool {
        let mut state = self.state.lock();
        if state.queue.is_empty() {
            state.running = false;
            self.counters.active.fetch_sub(1, Ordering::SeqCst);
            true
        } else {
            false
        }
    }

    async fn deliver(
        &self,
        transport: &mut Option<Box<dyn MailTransport>>,
        request: NotificationRequest,
    ) {
        if transport.is_none() {
            match self.factory.create() {
                Ok(client) => *transport = Some(client),
                Err(e) => {
                    error!(
                        error = %e,
                        action = %request.action,
                        to_name = %request.recipient_name,
                        to = %request.recipient_email,
                        "no mail transport available, dropping notification"
                    );
                    return;
                }
            }
        }
        let Some(client) = transport.as_deref() else {
            return;
        };

        match client.send(&request.message).await {
            Ok(()) => {
                info!(
                    action = %request.action,
                    to_name = %request.recipient_name,
                    to = %request.recipient_email,
                    "notification sent"
                );
            }
            Err(e) => {
                error!(
                    error = %e,
                    action = %request.action,
                    to_name = %request.recipient_name,
                    to = %request.recipient_email,
                    "failed to send notification"
                );
                // Assume the client is now in a bad state.
                *transport = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EmailMessage;
    use crate::transport::MockTransportFactory;

    fn request(subject: &str) -> NotificationRequest {
        let message = EmailMessage {
            from: "noreply@localhost".to_string(),
            to: "reviewer@example.com".to_string(),
            subject: subject.to_string(),
            body: "Body".to_string(),
            html: false,
        };
        NotificationRequest::new(message, "Publish", "Reviewer")
    }

    async fn drain_until(factory: &MockTransportFactory, count: usize) {
        while factory.sent_count().await < count {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn worker_drains_fifo_then_stops_after_idle_timeout() {
        let factory = Arc::new(MockTransportFactory::new());
        let dispatcher = Dispatcher::new(
            Arc::clone(&factory) as Arc<dyn TransportFactory>,
            Duration::from_secs(8),
        );

        dispatcher.enqueue(request("first"));
        dispatcher.enqueue(request("second"));
        dispatcher.enqueue(request("third"));
        drain_until(&factory, 3).await;

        let subjects: Vec<String> = factory
            .sent_messages()
            .await
            .into_iter()
            .map(|m| m.subject)
            .collect();
        assert_eq!(subjects, vec!["first", "second", "third"]);
        assert_eq!(dispatcher.workers_started(), 1);
        assert!(dispatcher.is_running());

        tokio::time::sleep(Duration::from_secs(9)).await;
        assert!(!dispatcher.is_running());
        assert_eq!(dispatcher.active_workers(), 0);

        dispatcher.enqueue(request("fourth"));
        drain_until(&factory, 4).await;
        assert_eq!(dispatcher.workers_started(), 2);
        assert!(dispatcher.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn enqueue_wakes_idle_worker_before_timeout() {
        let factory = Arc::new(MockTransportFactory::new());
        let dispatcher = Dispatcher::new(
            Arc::clone(&factory) as Arc<dyn TransportFactory>,
            Duration::from_secs(8),
        );

        dispatcher.enqueue(request("first"));
        drain_until(&factory, 1).await;

        // Well inside the idle window; the wakeup must reuse the worker.
        tokio::time::sleep(Duration::from_secs(4)).await;
        dispatcher.enqueue(request("second"));
        drain_until(&factory, 2).await;

        assert_eq!(dispatcher.workers_started(), 1);
        assert!(dispatcher.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn send_failure_replaces_transport_and_keeps_worker_alive() {
        let factory = Arc::new(MockTransportFactory::failing_first(1));
        let dispatcher = Dispatcher::new(
            Arc::clone(&factory) as Arc<dyn TransportFactory>,
            Duration::from_secs(8),
        );

        dispatcher.enqueue(request("first"));
        dispatcher.enqueue(request("second"));
        drain_until(&factory, 1).await;

        let subjects: Vec<String> = factory
            .sent_messages()
            .await
            .into_iter()
            .map(|m| m.subject)
            .collect();
        // The first send fails and is dropped; the replacement transport
        // delivers the rest.
        assert_eq!(subjects, vec!["second"]);
        assert_eq!(factory.created(), 2);
        assert_eq!(dispatcher.workers_started(), 1);
        assert_eq!(dispatcher.queued(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_enqueues_start_one_worker() {
        let factory = Arc::new(MockTransportFactory::new());
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&factory) as Arc<dyn TransportFactory>,
            Duration::from_secs(30),
        ));

        let mut handles = Vec::new();
        for i in 0..16 {
            let dispatcher = Arc::clone(&dispatcher);
            handles.push(tokio::spawn(async move {
                dispatcher.enqueue(request(&format!("message-{i}")));
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while factory.sent_count().await < 16 {
            assert!(
                std::time::Instant::now() < deadline,
                "expected 16 deliveries, got {}",
                factory.sent_count().await
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert_eq!(dispatcher.workers_started(), 1);
        assert_eq!(dispatcher.peak_active_workers(), 1);
    }
}
