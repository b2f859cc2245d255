/// Local event id clock
///
/// Ids for events created on this client come from wall-clock milliseconds,
/// bumped past the last issued id so two events created within the same
/// millisecond (or across a backwards clock step) never share an id.
/// Ids for game events are always assigned by the server.
use crate::event::EventId;
use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};

type TimeSource = Box<dyn Fn() -> EventId + Send + Sync>;

pub struct LocalClock {
    last: AtomicI64,
    time_source: TimeSource,
}

impl LocalClock {
    /// Clock backed by the system wall clock
    pub fn new() -> Self {
        Self::with_time_source(|| Utc::now().timestamp_millis())
    }

    /// Clock backed by a custom time source (used for deterministic tests)
    pub fn with_time_source<F>(time_source: F) -> Self
    where
        F: Fn() -> EventId + Send + Sync + 'static,
    {
        Self {
            last: AtomicI64::new(0),
            time_source: Box::new(time_source),
        }
    }

    /// Current time in milliseconds, used for edit timestamps
    pub fn now(&self) -> EventId {
        (self.time_source)()
    }

    /// Next id for a locally created event; strictly greater than every id
    /// this clock has issued or observed
    pub fn next_id(&self) -> EventId {
        let now = self.now();
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last.saturating_add(1)))
            })
            .unwrap_or_else(|last| last);
        now.max(previous.saturating_add(1))
    }

    /// Make sure later local ids sort after an id we have already seen
    pub fn observe(&self, id: EventId) {
        self.last.fetch_max(id, Ordering::SeqCst);
    }
}

impl Default for LocalClock {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LocalClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalClock")
            .field("last", &self.last.load(Ordering::SeqCst))
            .finish()
    }
}
