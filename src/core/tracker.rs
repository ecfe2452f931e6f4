use crate::core::{
    BatchManager, ConfigProvider, DeviceInformation, DispatchOutcome, Event, EventBus,
    ForgetRequest, Transport,
};
use crate::utils::error::{Result, TrackerError};
use crate::utils::time::generate_timestamp;
use crate::utils::validation::{validate_non_empty_string, validate_url};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

struct TrackerState {
    endpoint: String,
    session_identifier: String,
    tracking: bool,
}

struct TrackerInner<T: Transport> {
    app_id: String,
    dispatch_interval: Duration,
    state: Mutex<TrackerState>,
    event_bus: Mutex<EventBus>,
    manager: BatchManager<T>,
}

/// Handle to the tracking client.
///
/// Cloning is cheap and every clone drives the same buffers, so the handle can
/// be passed to whichever component needs to record events.
pub struct Tracker<T: Transport> {
    inner: Arc<TrackerInner<T>>,
}

impl<T: Transport> Clone for Tracker<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// 產生 128-bit 隨機 session identifier (32 個小寫十六進位字元)
pub fn generate_session_identifier() -> Result<String> {
    let mut bytes = [0u8; 16];
    getrandom::fill(&mut bytes).map_err(|e| {
        TrackerError::IoError(std::io::Error::other(format!(
            "failed to generate session identifier: {e}"
        )))
    })?;
    Ok(bytes.iter().map(|b| format!("{b:02x}")).collect())
}

impl<T: Transport> Tracker<T> {
    pub fn new<C: ConfigProvider>(config: &C, transport: T) -> Result<Self> {
        validate_non_empty_string("app_id", config.app_id())?;
        validate_url("endpoint", config.endpoint())?;
        if config.dispatch_interval().is_zero() {
            return Err(TrackerError::InvalidConfigValueError {
                field: "dispatch_interval".to_string(),
                value: format!("{:?}", config.dispatch_interval()),
                reason: "Dispatch interval must be greater than zero".to_string(),
            });
        }

        let device_information = DeviceInformation::detect(config.app_id());
        let session_identifier = generate_session_identifier()?;

        tracing::debug!(
            "Creating tracker for app '{}' with session '{}'",
            config.app_id(),
            session_identifier
        );

        Ok(Self {
            inner: Arc::new(TrackerInner {
                app_id: config.app_id().to_string(),
                dispatch_interval: config.dispatch_interval(),
                state: Mutex::new(TrackerState {
                    endpoint: config.endpoint().to_string(),
                    session_identifier,
                    tracking: true,
                }),
                event_bus: Mutex::new(EventBus::new()),
                manager: BatchManager::new(transport, device_information, config.max_retries()),
            }),
        })
    }

    fn state(&self) -> MutexGuard<'_, TrackerState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn event_bus(&self) -> MutexGuard<'_, EventBus> {
        self.inner.event_bus.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn app_id(&self) -> &str {
        &self.inner.app_id
    }

    pub fn transport(&self) -> &T {
        self.inner.manager.transport()
    }

    pub fn track(&self, event_name: &str) {
        self.record(event_name, None);
    }

    pub fn track_with_properties(&self, event_name: &str, value: &str) {
        self.record(event_name, Some(value.to_string()));
    }

    fn record(&self, event_name: &str, value: Option<String>) {
        let session_identifier = {
            let state = self.state();
            if !state.tracking {
                tracing::debug!("Tracking is stopped, dropping event '{}'", event_name);
                return;
            }
            state.session_identifier.clone()
        };

        self.event_bus().add(Event {
            name: event_name.to_string(),
            value,
            timestamp: generate_timestamp(),
            session_identifier,
        });
    }

    /// Starts a new session; later events carry the new identifier.
    pub fn set_session_identifier(&self) {
        match generate_session_identifier() {
            Ok(identifier) => {
                tracing::info!("🔑 New session identifier: {}", identifier);
                self.state().session_identifier = identifier;
            }
            Err(e) => {
                tracing::warn!("⚠️ Keeping current session identifier: {}", e);
            }
        }
    }

    pub fn session_identifier(&self) -> String {
        self.state().session_identifier.clone()
    }

    pub fn set_endpoint(&self, url: &str) -> Result<()> {
        validate_url("endpoint", url)?;
        self.state().endpoint = url.to_string();
        tracing::info!("🌐 Endpoint set to {}", url);
        Ok(())
    }

    pub fn endpoint(&self) -> String {
        self.state().endpoint.clone()
    }

    /// Purges every buffered event of `identifier` and asks the collector to
    /// erase what it already holds for it.
    pub async fn forget_by_identifier(&self, identifier: &str) -> Result<()> {
        validate_non_empty_string("identifier", identifier)?;

        let removed =
            self.event_bus().remove_session(identifier) + self.inner.manager.forget_session(identifier);
        tracing::info!(
            "🧹 Removed {} buffered events for identifier '{}'",
            removed,
            identifier
        );

        // 被遺忘的身分不能再收到新事件
        if self.session_identifier() == identifier {
            self.set_session_identifier();
        }

        let request = ForgetRequest {
            identifier: identifier.to_string(),
            app_id: self.inner.app_id.clone(),
            timestamp: generate_timestamp(),
        };
        let endpoint = self.endpoint();
        self.inner.manager.forget(&endpoint, &request).await
    }

    pub fn stop(&self) {
        self.state().tracking = false;
        tracing::info!("⏸️ Tracking stopped");
    }

    pub fn resume(&self) {
        self.state().tracking = true;
        self.inner.manager.clear_retries();
        tracing::info!("▶️ Tracking resumed");
    }

    pub fn is_tracking(&self) -> bool {
        self.state().tracking
    }

    /// Drops all buffered events and batches and clears the retry counter.
    pub fn reset(&self) {
        self.event_bus().clear();
        self.inner.manager.reset();
        tracing::info!("🔄 Tracker reset");
    }

    /// Events not yet acknowledged by the collector.
    pub fn buffered_events(&self) -> usize {
        self.event_bus().len() + self.inner.manager.buffered_events()
    }

    pub fn retries(&self) -> u32 {
        self.inner.manager.retries()
    }

    /// One timer tick. Does nothing while tracking is stopped.
    pub async fn dispatch(&self) -> Result<DispatchOutcome> {
        if !self.is_tracking() {
            return Ok(DispatchOutcome::Stopped);
        }
        self.dispatch_buffered().await
    }

    /// Dispatches buffered data now, even while tracking is stopped.
    pub async fn flush(&self) -> Result<DispatchOutcome> {
        self.dispatch_buffered().await
    }

    async fn dispatch_buffered(&self) -> Result<DispatchOutcome> {
        let endpoint = self.endpoint();
        let events = self.event_bus().drain();

        let outcome = self.inner.manager.dispatch(events, &endpoint).await?;
        if let DispatchOutcome::RetryLimitReached { retries } = outcome {
            tracing::error!(
                "❌ Stopping tracker after {} failed dispatches; call resume() to retry",
                retries
            );
            self.stop();
        }
        Ok(outcome)
    }
}

impl<T: Transport + 'static> Tracker<T> {
    /// Spawns the background task that dispatches every `dispatch_interval`.
    pub fn start(&self) -> DispatchHandle<T> {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let tracker = self.clone();
        let period = self.inner.dispatch_interval;

        tracing::info!("⏱️ Dispatching every {:?}", period);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // 第一次 tick 立即完成，略過
            ticker.tick().await;

            loop {
                tokio::select! {
                    biased;

                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = tracker.dispatch().await {
                            tracing::warn!("⚠️ Dispatch tick failed: {}", e);
                        }
                    }
                }
            }
            tracing::debug!("Dispatch task finished");
        });

        DispatchHandle {
            shutdown: shutdown_tx,
            task,
            tracker: self.clone(),
        }
    }
}

/// Owns the background dispatch task started by [`Tracker::start`].
pub struct DispatchHandle<T: Transport> {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
    tracker: Tracker<T>,
}

impl<T: Transport> DispatchHandle<T> {
    /// Stops the timer and sends whatever is still buffered while tracking is on.
    pub async fn shutdown(self) -> Result<DispatchOutcome> {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::warn!("⚠️ Dispatch task ended abnormally: {}", e);
        }
        self.tracker.dispatch().await
    }
}
