use super::timed_store::TimedStore;
use crate::domain::event::PaymentEvent;
use crate::domain::ports::{Condition, EVENTS_TABLE};

/// Appends `PaymentEvent`s to the shared audit log.
///
/// Recording is best-effort: a failed append is logged and swallowed so that it
/// never changes the outcome of the operation that triggered it.
#[derive(Clone)]
pub struct EventRecorder {
    store: TimedStore,
}

impl EventRecorder {
    pub fn new(store: TimedStore) -> Self {
        Self { store }
    }

    pub async fn record(&self, event: PaymentEvent) {
        let result = self
            .store
            .put(EVENTS_TABLE, &event.id, &event, Some(Condition::NotExists))
            .await;

        match result {
            Ok(()) => tracing::debug!(
                event_id = %event.id,
                payment_id = %event.payment_id,
                event_type = ?event.event_type,
                "event recorded"
            ),
            Err(e) => tracing::warn!(
                event_id = %event.id,
                payment_id = %event.payment_id,
                event_type = ?event.event_type,
                error = %e,
                "failed to record event"
            ),
        }
    }

    /// All recorded events for one payment, oldest first.
    pub async fn history(&self, payment_id: &str) -> crate::error::Result<Vec<PaymentEvent>> {
        let mut events: Vec<PaymentEvent> = self
            .store
            .scan(EVENTS_TABLE, "payment_id", &payment_id.into())
            .await?;
        events.sort_by_key(|e| e.timestamp);
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::timed_store::DEFAULT_STORE_TIMEOUT;
    use crate::domain::event::EventType;
    use crate::infrastructure::in_memory::InMemoryStore;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_events_are_write_once() {
        let recorder = EventRecorder::new(TimedStore::new(
            Arc::new(InMemoryStore::new()),
            DEFAULT_STORE_TIMEOUT,
        ));
        let first = PaymentEvent::new(EventType::Created, "p1", "u1", dec!(10), "PENDING")
            .with_id("e1");
        let clash = PaymentEvent::new(EventType::Failed, "p1", "u1", dec!(10), "FAILED")
            .with_id("e1");

        recorder.record(first).await;
        recorder.record(clash).await;

        let history = recorder.history("p1").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].event_type, EventType::Created);
        assert!(recorder.history("p2").await.unwrap().is_empty());
    }
}
