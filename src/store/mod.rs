/// Event store - owns the roll log state
///
/// All mutation goes through `EventStore::dispatch`, which applies actions
/// one at a time in call order. Readers get immutable `Arc<State>`
/// snapshots, either on demand or by subscribing to changes.

pub mod actions;
pub mod reducer;

pub use actions::Action;
pub use reducer::reduce;

use crate::event::{Event, LocalClock};
use crate::metrics;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, trace};

/// Progress of backward pagination through older events
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HistoryFetch {
    #[default]
    Ready,
    Fetching,
    /// No older events remain; only a session reset leaves this state
    Finished,
}

/// Roll log state for one session
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct State {
    /// Newest first, unique ids
    pub events: Vec<Event>,
    pub history_fetch: HistoryFetch,
    /// Dice event under inline edit
    pub editing: Option<Event>,
}

/// Shared handle to the session's roll log
pub struct EventStore {
    state: watch::Sender<Arc<State>>,
    clock: Arc<LocalClock>,
}

impl EventStore {
    /// Create an empty store
    pub fn new(clock: Arc<LocalClock>) -> Self {
        let (state, _) = watch::channel(Arc::new(State::default()));
        Self { state, clock }
    }

    /// Apply an action
    pub fn dispatch(&self, action: Action) {
        trace!("dispatch {}", action.name());
        self.state.send_modify(|state| {
            let current = std::mem::take(Arc::make_mut(state));
            *Arc::make_mut(state) = reduce(current, action, &self.clock);
            metrics::EVENT_LOG_SIZE.set(state.events.len() as i64);
        });
    }

    /// Apply an action received in serialized form, e.g. from a UI bridge.
    ///
    /// An unrecognized action is a programming error: it is logged and the
    /// state is left untouched.
    pub fn dispatch_json(&self, action: serde_json::Value) {
        match serde_json::from_value::<Action>(action) {
            Ok(action) => self.dispatch(action),
            Err(e) => error!("Ignoring unrecognized action: {}", e),
        }
    }

    /// Move pagination from `ready` to `fetching`.
    ///
    /// Returns false, changing nothing, if a fetch is already running or
    /// history is finished.
    pub fn begin_history_fetch(&self) -> bool {
        self.state.send_if_modified(|state| {
            if state.history_fetch != HistoryFetch::Ready {
                return false;
            }
            let current = std::mem::take(Arc::make_mut(state));
            *Arc::make_mut(state) = reduce(
                current,
                Action::SetHistoryFetch {
                    state: HistoryFetch::Fetching,
                },
                &self.clock,
            );
            true
        })
    }

    /// Current state
    pub fn snapshot(&self) -> Arc<State> {
        self.state.borrow().clone()
    }

    /// Receive a new snapshot after every dispatch
    pub fn subscribe(&self) -> watch::Receiver<Arc<State>> {
        self.state.subscribe()
    }

    pub fn clock(&self) -> &Arc<LocalClock> {
        &self.clock
    }
}

impl Default for EventStore {
    fn default() -> Self {
        Self::new(Arc::new(LocalClock::new()))
    }
}
