use crate::core::{Batch, BatchBus, DeviceInformation, Event, ForgetRequest, Transport};
use crate::utils::error::Result;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Result of one dispatch tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Tracking is stopped; nothing was touched.
    Stopped,
    /// Nothing buffered.
    Idle,
    /// The previous dispatch has not completed yet.
    AwaitingCallback,
    /// Too many consecutive failures; dispatching is suspended.
    RetryLimitReached { retries: u32 },
    Sent { number: u64, events: usize },
    Failed { retries: u32 },
}

/// Turns drained events into batches and ships the pending batch through a [`Transport`].
pub struct BatchManager<T: Transport> {
    transport: T,
    batch_bus: Mutex<BatchBus>,
    max_retries: u32,
}

impl<T: Transport> BatchManager<T> {
    pub fn new(transport: T, device_information: DeviceInformation, max_retries: u32) -> Self {
        let mut batch_bus = BatchBus::new();
        batch_bus.set_device_information(device_information);

        Self {
            transport,
            batch_bus: Mutex::new(batch_bus),
            max_retries,
        }
    }

    // 鎖只在同步區段持有，不跨 await
    fn bus(&self) -> MutexGuard<'_, BatchBus> {
        self.batch_bus.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn retries(&self) -> u32 {
        self.bus().retries()
    }

    pub fn queued_batches(&self) -> usize {
        self.bus().len()
    }

    pub fn pending_batch(&self) -> Option<Batch> {
        self.bus().pending_batch().cloned()
    }

    /// Number of events held in queued and pending batches.
    pub fn buffered_events(&self) -> usize {
        let bus = self.bus();
        bus.pending_batch().map_or(0, Batch::len)
            + bus.batches_iter().map(Batch::len).sum::<usize>()
    }

    pub async fn dispatch(&self, events: Vec<Event>, endpoint: &str) -> Result<DispatchOutcome> {
        let (batch, generation) = {
            let mut bus = self.bus();

            if !events.is_empty() {
                let batch = bus.generate_batch(&events);
                bus.add(batch);
            }

            if bus.awaiting_callback() {
                tracing::debug!("Still awaiting callback from previous dispatch, skipping");
                return Ok(DispatchOutcome::AwaitingCallback);
            }

            if bus.retries() > self.max_retries {
                tracing::error!(
                    "❌ Batch dispatch failed {} times in a row (max {}), suspending dispatch",
                    bus.retries(),
                    self.max_retries
                );
                return Ok(DispatchOutcome::RetryLimitReached {
                    retries: bus.retries(),
                });
            }

            bus.set_pending_batch();
            match bus.on_dispatch() {
                Some(batch) => (batch, bus.generation()),
                None => return Ok(DispatchOutcome::Idle),
            }
        };

        tracing::debug!(
            "Dispatching batch #{} ({} events, retry {}) to {}",
            batch.number,
            batch.len(),
            batch.retries,
            endpoint
        );

        match self.transport.send_batch(endpoint, &batch).await {
            Ok(()) => {
                self.bus().last_batch_succeeded(generation);
                tracing::info!("📤 Sent batch #{} with {} events", batch.number, batch.len());
                Ok(DispatchOutcome::Sent {
                    number: batch.number,
                    events: batch.len(),
                })
            }
            Err(e) => {
                let retries = {
                    let mut bus = self.bus();
                    bus.last_batch_failed(generation);
                    bus.retries()
                };
                tracing::warn!(
                    "⚠️ Batch #{} failed (attempt {}): {}",
                    batch.number,
                    retries,
                    e
                );
                tracing::debug!("💡 {}", e.recovery_suggestion());
                Ok(DispatchOutcome::Failed { retries })
            }
        }
    }

    pub async fn forget(&self, endpoint: &str, request: &ForgetRequest) -> Result<()> {
        self.transport.forget(endpoint, request).await
    }

    pub fn forget_session(&self, session_identifier: &str) -> usize {
        self.bus().remove_session(session_identifier)
    }

    pub fn clear_retries(&self) {
        self.bus().clear_retries();
    }

    pub fn reset(&self) {
        self.bus().reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::TrackerError;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tokio::sync::{Mutex as AsyncMutex, Notify};

    #[derive(Clone, Default)]
    struct MockTransport {
        sent: Arc<AsyncMutex<Vec<Batch>>>,
        failing: Arc<AtomicBool>,
        gated: Arc<AtomicBool>,
        started: Arc<Notify>,
        release: Arc<Notify>,
    }

    impl MockTransport {
        fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        /// Sends block until `open_gate` is called.
        fn close_gate(&self) {
            self.gated.store(true, Ordering::SeqCst);
        }

        fn open_gate(&self) {
            self.gated.store(false, Ordering::SeqCst);
            self.release.notify_one();
        }
    }

    #[async_trait::async_trait]
    impl Transport for MockTransport {
        async fn send_batch(&self, _endpoint: &str, batch: &Batch) -> Result<()> {
            if self.gated.load(Ordering::SeqCst) {
                self.started.notify_one();
                self.release.notified().await;
            }
            if self.failing.load(Ordering::SeqCst) {
                return Err(TrackerError::DispatchError {
                    status: 503,
                    message: "unavailable".to_string(),
                });
            }
            self.sent.lock().await.push(batch.clone());
            Ok(())
        }

        async fn forget(&self, _endpoint: &str, _request: &ForgetRequest) -> Result<()> {
            Ok(())
        }
    }

    fn event(name: &str) -> Event {
        Event {
            name: name.to_string(),
            value: None,
            timestamp: "2026-01-01T00:00:00.000Z".to_string(),
            session_identifier: "s1".to_string(),
        }
    }

    fn manager(transport: MockTransport, max_retries: u32) -> BatchManager<MockTransport> {
        BatchManager::new(transport, DeviceInformation::detect("test"), max_retries)
    }

    #[tokio::test]
    async fn test_dispatch_with_nothing_buffered_is_idle() {
        let manager = manager(MockTransport::default(), 3);
        let outcome = manager.dispatch(vec![], "http://localhost").await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Idle);
    }

    #[tokio::test]
    async fn test_dispatch_sends_events_as_one_batch() {
        let transport = MockTransport::default();
        let manager = manager(transport.clone(), 3);

        let outcome = manager
            .dispatch(vec![event("a"), event("b")], "http://localhost")
            .await
            .unwrap();

        assert_eq!(outcome, DispatchOutcome::Sent { number: 0, events: 2 });
        let sent = transport.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].device_information.as_ref().unwrap().app_id, "test");
        assert!(manager.pending_batch().is_none());
    }

    #[tokio::test]
    async fn test_failed_batch_is_resent_with_new_events() {
        let transport = MockTransport::default();
        let manager = manager(transport.clone(), 3);

        transport.set_failing(true);
        let outcome = manager.dispatch(vec![event("a")], "http://localhost").await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Failed { retries: 1 });
        assert_eq!(manager.buffered_events(), 1);

        transport.set_failing(false);
        let outcome = manager.dispatch(vec![event("b")], "http://localhost").await.unwrap();
        assert!(matches!(outcome, DispatchOutcome::Sent { events: 2, .. }));

        let sent = transport.sent.lock().await;
        let names: Vec<&str> = sent[0].events.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(sent[0].retries, 1);
        assert_eq!(manager.retries(), 0);
    }

    #[tokio::test]
    async fn test_retry_limit_suspends_dispatch_but_keeps_events() {
        let transport = MockTransport::default();
        transport.set_failing(true);
        let manager = manager(transport.clone(), 1);

        manager.dispatch(vec![event("a")], "http://localhost").await.unwrap();
        manager.dispatch(vec![], "http://localhost").await.unwrap();
        let outcome = manager.dispatch(vec![event("b")], "http://localhost").await.unwrap();

        assert_eq!(outcome, DispatchOutcome::RetryLimitReached { retries: 2 });
        assert_eq!(manager.buffered_events(), 2);

        manager.clear_retries();
        transport.set_failing(false);
        let outcome = manager.dispatch(vec![], "http://localhost").await.unwrap();
        assert!(matches!(outcome, DispatchOutcome::Sent { events: 2, .. }));
    }

    #[tokio::test]
    async fn test_forget_session_and_reset() {
        let transport = MockTransport::default();
        transport.set_failing(true);
        let manager = manager(transport, 3);

        manager.dispatch(vec![event("a")], "http://localhost").await.unwrap();
        assert_eq!(manager.forget_session("s1"), 1);
        assert!(manager.pending_batch().is_none());

        manager.dispatch(vec![event("b")], "http://localhost").await.unwrap();
        manager.reset();
        assert_eq!(manager.buffered_events(), 0);
        assert_eq!(manager.retries(), 0);
    }

    fn spawn_dispatch(
        manager: &Arc<BatchManager<MockTransport>>,
        events: Vec<Event>,
    ) -> tokio::task::JoinHandle<Result<DispatchOutcome>> {
        let manager = Arc::clone(manager);
        tokio::spawn(async move { manager.dispatch(events, "http://localhost").await })
    }

    #[tokio::test]
    async fn test_concurrent_dispatch_reports_awaiting_callback() {
        let transport = MockTransport::default();
        transport.close_gate();
        let manager = Arc::new(manager(transport.clone(), 3));

        let first = spawn_dispatch(&manager, vec![event("a")]);
        transport.started.notified().await;

        let second = manager.dispatch(vec![event("b")], "http://localhost").await.unwrap();
        assert_eq!(second, DispatchOutcome::AwaitingCallback);
        assert_eq!(manager.queued_batches(), 1);

        transport.open_gate();
        let first = first.await.unwrap().unwrap();
        assert_eq!(first, DispatchOutcome::Sent { number: 0, events: 1 });

        let third = manager.dispatch(vec![], "http://localhost").await.unwrap();
        assert_eq!(third, DispatchOutcome::Sent { number: 1, events: 1 });
        assert_eq!(transport.sent.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn test_reset_during_send_keeps_later_events() {
        let transport = MockTransport::default();
        transport.close_gate();
        let manager = Arc::new(manager(transport.clone(), 3));

        let first = spawn_dispatch(&manager, vec![event("a")]);
        transport.started.notified().await;

        manager.reset();
        let second = manager.dispatch(vec![event("b")], "http://localhost").await.unwrap();
        assert_eq!(second, DispatchOutcome::AwaitingCallback);

        transport.open_gate();
        first.await.unwrap().unwrap();
        assert_eq!(manager.buffered_events(), 1);

        transport.set_failing(true);
        let outcome = manager.dispatch(vec![], "http://localhost").await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Failed { retries: 1 });
        assert_eq!(manager.buffered_events(), 1);

        transport.set_failing(false);
        let outcome = manager.dispatch(vec![], "http://localhost").await.unwrap();
        assert!(matches!(outcome, DispatchOutcome::Sent { events: 1, .. }));

        let sent = transport.sent.lock().await;
        let names: Vec<&str> = sent
            .iter()
            .flat_map(|b| b.events.iter().map(|e| e.name.as_str()))
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_failure_after_reset_does_not_count_as_retry() {
        let transport = MockTransport::default();
        transport.close_gate();
        transport.set_failing(true);
        let manager = Arc::new(manager(transport.clone(), 3));

        let first = spawn_dispatch(&manager, vec![event("a")]);
        transport.started.notified().await;

        manager.reset();
        assert_eq!(manager.retries(), 0);

        transport.open_gate();
        first.await.unwrap().unwrap();

        assert_eq!(manager.retries(), 0);
        assert!(manager.pending_batch().is_none());
        let outcome = manager.dispatch(vec![], "http://localhost").await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Idle);
    }
}
