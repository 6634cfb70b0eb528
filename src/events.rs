use chrono::NaiveDate;
use tokio::sync::broadcast;

/// Cross-component signals, replacing ad-hoc global events with a typed bus
/// scoped to the application instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEvent {
    /// The visible task list was replaced; score/streak should recompute.
    TasksChanged,
    /// A task landed on a different day than the active session date.
    SwitchDate(NaiveDate),
}

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AppEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self { tx }
    }

    /// Fire-and-forget; having no subscribers is fine.
    pub fn emit(&self, event: AppEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribers_see_emitted_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let day = NaiveDate::from_ymd_opt(2026, 3, 16).unwrap();

        bus.emit(AppEvent::TasksChanged);
        bus.emit(AppEvent::SwitchDate(day));

        assert_eq!(rx.try_recv().unwrap(), AppEvent::TasksChanged);
        assert_eq!(rx.try_recv().unwrap(), AppEvent::SwitchDate(day));
    }

    #[test]
    fn emit_without_subscribers_is_harmless() {
        let bus = EventBus::new();
        bus.emit(AppEvent::TasksChanged);
    }
}
