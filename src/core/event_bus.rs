use crate::core::Event;

/// Events tracked since the last dispatch tick, in arrival order.
#[derive(Debug, Default)]
pub struct EventBus {
    events: Vec<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, event: Event) {
        tracing::debug!("Added event '{}' to EventBus", event.name);
        self.events.push(event);
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// 取出所有事件並清空
    pub fn drain(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn clear(&mut self) {
        self.events.clear();
        tracing::debug!("Cleared the EventBus");
    }

    pub fn remove_session(&mut self, session_identifier: &str) -> usize {
        let before = self.events.len();
        self.events.retain(|e| e.session_identifier != session_identifier);
        before - self.events.len()
    }
}
