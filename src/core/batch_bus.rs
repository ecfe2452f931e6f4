use crate::core::{Batch, DeviceInformation, Event};
use crate::utils::time::generate_timestamp;

/// Holds batches generated from the EventBus until they are dispatched.
///
/// At most one batch is pending at a time: it is either in flight
/// (`awaiting_callback`) or failed and waiting for the next tick.
#[derive(Debug, Default)]
pub struct BatchBus {
    device_information: Option<DeviceInformation>,
    batches: Vec<Batch>,
    batch_counter: u64,
    retries: u32,
    awaiting_callback: bool,
    pending_batch: Option<Batch>,
    // 每次 reset 遞增，用來辨識 reset 之前送出的批次
    generation: u64,
}

impl BatchBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// 只在尚未設定時寫入
    pub fn set_device_information(&mut self, device_information: DeviceInformation) {
        if self.device_information.is_none() {
            self.device_information = Some(device_information);
        }
    }

    pub fn generate_batch(&mut self, events: &[Event]) -> Batch {
        tracing::debug!("Generating batch with '{}' events", events.len());

        let batch = Batch {
            device_information: self.device_information.clone(),
            timestamp: generate_timestamp(),
            events: events.to_vec(),
            number: self.batch_counter,
            retries: 0,
        };
        self.batch_counter += 1;
        batch
    }

    pub fn add(&mut self, batch: Batch) {
        tracing::debug!(
            "Added batch - identified by number '{}' - to BatchBus",
            batch.number
        );
        self.batches.push(batch);
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn batches_iter(&self) -> impl Iterator<Item = &Batch> {
        self.batches.iter()
    }

    pub fn clear_batches(&mut self) {
        self.batches.clear();
        tracing::debug!("Cleared the BatchBus");
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn awaiting_callback(&self) -> bool {
        self.awaiting_callback
    }

    pub fn pending_batch(&self) -> Option<&Batch> {
        self.pending_batch.as_ref()
    }

    pub fn has_pending(&self) -> bool {
        self.pending_batch.is_some()
    }

    /// Selects the batch for the next dispatch.
    ///
    /// A lone queued batch is used as is. Anything more (several queued
    /// batches, or a failed pending batch plus new ones) is merged into one
    /// freshly generated batch so the per-batch metadata is sent only once.
    pub fn set_pending_batch(&mut self) {
        match (self.pending_batch.is_some(), self.batches.len()) {
            (false, 0) => {
                tracing::warn!("There are no batches to set as pending");
            }
            (true, 0) => {
                tracing::debug!("Keeping previously failed batch as pending");
            }
            (false, 1) => {
                tracing::debug!("There's currently one batch in the BatchBus. Setting it as pending");
                self.pending_batch = self.batches.pop();
            }
            (had_pending, count) => {
                tracing::debug!(
                    "Merging {} queued batches{} into one pending batch",
                    count,
                    if had_pending { " and the failed pending batch" } else { "" }
                );
                let mut queued = std::mem::take(&mut self.batches);
                if let Some(previous) = self.pending_batch.take() {
                    queued.insert(0, previous);
                }
                self.pending_batch = Some(self.merge_batches(queued));
            }
        }
    }

    fn merge_batches(&mut self, batches: Vec<Batch>) -> Batch {
        let all_events: Vec<Event> = batches.into_iter().flat_map(|b| b.events).collect();
        self.generate_batch(&all_events)
    }

    /// Marks the pending batch as in flight and stamps the retry count on it.
    pub fn on_dispatch(&mut self) -> Option<Batch> {
        let retries = self.retries;
        let batch = self.pending_batch.as_mut()?;
        batch.retries = retries;
        self.awaiting_callback = true;
        Some(batch.clone())
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Completion of a batch sent under an older generation only ends the
    /// in-flight state; the bus was reset meanwhile.
    fn is_stale(&mut self, generation: u64) -> bool {
        if generation == self.generation {
            return false;
        }
        self.awaiting_callback = false;
        tracing::debug!(
            "Ignoring callback from generation {} (now {})",
            generation,
            self.generation
        );
        true
    }

    pub fn last_batch_succeeded(&mut self, generation: u64) {
        if self.is_stale(generation) {
            return;
        }
        self.retries = 0;
        self.pending_batch = None;
        self.awaiting_callback = false;
        tracing::debug!("Last batch succeeded. Retries is '{}' now", self.retries);
    }

    pub fn last_batch_failed(&mut self, generation: u64) {
        if self.is_stale(generation) {
            return;
        }
        self.retries += 1;
        self.awaiting_callback = false;
        if self.pending_batch.as_ref().is_some_and(Batch::is_empty) {
            tracing::debug!("Discarding emptied pending batch");
            self.pending_batch = None;
        }
        tracing::debug!("Last batch failed. Retries is '{}' now", self.retries);
    }

    pub fn clear_retries(&mut self) {
        self.retries = 0;
    }

    /// Drops every buffered event of one session. Batches left empty are discarded.
    pub fn remove_session(&mut self, session_identifier: &str) -> usize {
        let mut removed = 0;
        for batch in self.batches.iter_mut().chain(self.pending_batch.iter_mut()) {
            let before = batch.events.len();
            batch
                .events
                .retain(|e| e.session_identifier != session_identifier);
            removed += before - batch.events.len();
        }

        self.batches.retain(|b| !b.is_empty());
        // 進行中的批次不能丟棄，回應時仍需對應
        if !self.awaiting_callback && self.pending_batch.as_ref().is_some_and(Batch::is_empty) {
            self.pending_batch = None;
        }
        removed
    }

    /// Clears everything except the in-flight flag, which only the
    /// completing dispatch may clear.
    pub fn reset(&mut self) {
        self.batches.clear();
        self.pending_batch = None;
        self.retries = 0;
        self.batch_counter = 0;
        self.generation += 1;
        tracing::debug!("Reset the BatchBus");
    }
}
