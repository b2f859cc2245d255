/// Reducer actions
use crate::event::{Event, EventId, Share};
use crate::store::HistoryFetch;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Every state transition the event store accepts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Action {
    SetHistoryFetch {
        state: HistoryFetch,
    },
    /// Add one event; an id of `0` means "unset" and is filled from the local clock
    NewEvent {
        event: Event,
    },
    /// Merge a newest-first, de-duplicated batch into the log
    MergeEvents {
        events: Vec<Event>,
    },
    /// Drop every event that did not originate on this client
    ClearEvents,
    DeleteEvent {
        id: EventId,
    },
    /// Shallow-merge `diff` into the event and stamp it with `edit`
    ModifyEvent {
        id: EventId,
        edit: EventId,
        diff: Map<String, Value>,
    },
    ModifyShare {
        id: EventId,
        share: Share,
    },
    SeizeInitiative {
        id: EventId,
        edit: EventId,
    },
    /// Turn a `Roll` into a `RerollFailures` holding `[reroll, original dice]`
    Reroll {
        id: EventId,
        edit: EventId,
        reroll: Vec<u8>,
    },
    SelectEdit {
        event: Event,
    },
    ClearEdit,
    /// Back to the empty initial state (logout / leaving a game)
    ResetSession,
}

impl Action {
    /// Tag name, used in log lines
    pub fn name(&self) -> &'static str {
        match self {
            Action::SetHistoryFetch { .. } => "setHistoryFetch",
            Action::NewEvent { .. } => "newEvent",
            Action::MergeEvents { .. } => "mergeEvents",
            Action::ClearEvents => "clearEvents",
            Action::DeleteEvent { .. } => "deleteEvent",
            Action::ModifyEvent { .. } => "modifyEvent",
            Action::ModifyShare { .. } => "modifyShare",
            Action::SeizeInitiative { .. } => "seizeInitiative",
            Action::Reroll { .. } => "reroll",
            Action::SelectEdit { .. } => "selectEdit",
            Action::ClearEdit => "clearEdit",
            Action::ResetSession => "resetSession",
        }
    }
}
