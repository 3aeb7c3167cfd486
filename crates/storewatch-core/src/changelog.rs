//! Change log buffer
//!
//! Probe workers record [`ChangeEvent`]s as they complete; the buffer is
//! flushed to the tabular store in one append at the end of the run.
//! One buffer belongs to one run and is dropped with it.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::info;

use crate::error::Result;
use crate::model::ChangeEvent;
use crate::traits::{LogRow, TabularStore};

/// Run-scoped, thread-safe buffer of change events
#[derive(Debug, Default)]
pub struct ChangeLogBuffer {
    events: Mutex<Vec<ChangeEvent>>,
}

impl ChangeLogBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ChangeEvent>> {
        // A panicking recorder cannot leave the Vec half-written.
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an event
    pub fn record(&self, event: ChangeEvent) {
        info!(
            "Logging change: {} - {} ({})",
            event.change_type,
            event.package_id,
            event.change_type.label()
        );
        self.lock().push(event);
    }

    /// Number of buffered events
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of the buffered events, in recording order
    pub fn snapshot(&self) -> Vec<ChangeEvent> {
        self.lock().clone()
    }

    /// Hand every buffered event to the store in a single append
    ///
    /// Returns the number of events written. An empty buffer makes no
    /// call. On failure the events stay buffered and the error is returned.
    pub async fn flush(&self, store: &dyn TabularStore) -> Result<usize> {
        let events = std::mem::take(&mut *self.lock());
        if events.is_empty() {
            return Ok(0);
        }

        let rows: Vec<LogRow> = events.iter().map(ChangeEvent::to_log_row).collect();
        match store.append_log_rows(&rows).await {
            Ok(()) => {
                info!("Wrote {} change(s) to the change log", events.len());
                Ok(events.len())
            }
            Err(e) => {
                let mut guard = self.lock();
                let recorded_meanwhile = std::mem::replace(&mut *guard, events);
                guard.extend(recorded_meanwhile);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChangeType;
    use crate::store::MemoryTabularStore;
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn event(package_id: &str) -> ChangeEvent {
        ChangeEvent {
            timestamp: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            change_type: ChangeType::NewListing,
            sequence_number: "1".into(),
            package_id: package_id.into(),
        }
    }

    #[tokio::test]
    async fn flush_of_empty_buffer_makes_no_call() {
        let store = MemoryTabularStore::new();
        let buffer = ChangeLogBuffer::new();
        let written = tokio_test::assert_ok!(buffer.flush(&store).await);
        assert_eq!(written, 0);
        assert!(store.log_rows().await.is_none(), "log sheet must not be created");
    }

    #[tokio::test]
    async fn flush_writes_all_and_clears() {
        let store = MemoryTabularStore::new();
        let buffer = ChangeLogBuffer::new();
        buffer.record(event("com.a"));
        buffer.record(event("com.b"));

        assert_eq!(buffer.flush(&store).await.unwrap(), 2);
        assert!(buffer.is_empty());

        let log = store.log_rows().await.unwrap();
        assert_eq!(log.len(), 3, "header plus two entries");
        assert_eq!(log[1][3], "com.a");
        assert_eq!(log[2][3], "com.b");
    }

    #[test]
    fn concurrent_records_are_not_lost() {
        let buffer = Arc::new(ChangeLogBuffer::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let buffer = Arc::clone(&buffer);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        buffer.record(event(&format!("com.t{}.p{}", t, i)));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut ids: Vec<String> = buffer.snapshot().into_iter().map(|e| e.package_id).collect();
        assert_eq!(ids.len(), 400);
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 400, "no duplicates");
    }
}
