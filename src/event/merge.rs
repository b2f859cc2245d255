/// Merge of two newest-first event sequences
///
/// Both inputs must be strictly descending by id. The incoming batch is
/// authoritative: on equal ids its copy replaces the one already in the log.
use crate::event::Event;
use std::cmp::Ordering;

/// Merge `incoming` into `current`, producing one strictly descending log.
///
/// Runs in O(|current| + |incoming|). Merging a batch that is already part
/// of the log is a no-op.
pub fn merge_events(current: Vec<Event>, incoming: Vec<Event>) -> Vec<Event> {
    let mut merged = Vec::with_capacity(current.len() + incoming.len());
    let mut current = current.into_iter().peekable();
    let mut incoming = incoming.into_iter().peekable();

    loop {
        let order = match (current.peek(), incoming.peek()) {
            (Some(existing), Some(arriving)) => existing.id().cmp(&arriving.id()),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => break,
        };

        match order {
            Ordering::Equal => {
                current.next();
                merged.extend(incoming.next());
            }
            Ordering::Less => merged.extend(incoming.next()),
            Ordering::Greater => merged.extend(current.next()),
        }
    }

    merged
}

/// Whether `events` is strictly descending by id (newest first, no duplicates)
pub fn is_descending(events: &[Event]) -> bool {
    events.windows(2).all(|pair| pair[0].id() > pair[1].id())
}

/// Put a batch into merge order: newest first, keeping the first copy of any
/// duplicated id
pub fn sort_batch(mut events: Vec<Event>) -> Vec<Event> {
    if is_descending(&events) {
        return events;
    }
    events.sort_by_key(|event| std::cmp::Reverse(event.id()));
    events.dedup_by_key(|event| event.id());
    events
}
