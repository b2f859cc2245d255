/// Update protocol - messages carried by the live game stream
///
/// # Channels
///
/// - `event`: one full serialized event, possibly in the legacy flat shape
///   (`pID`/`pName`/`share` instead of `source`)
/// - `update`: a compact tuple `[kind, id, diff, editTimestamp]`
///   - `["evt", 12, "del"]` deletes event 12
///   - `["evt", 12, {"reroll": [6, 5]}, 99]` rerolls failures of roll 12
///   - `["evt", 12, {"title": "x"}, 99]` edits event 12
///   - `["plr", "p1", {"name": "Ada"}]` changes a player profile
///
/// Messages with an empty payload are heartbeats. Anything that cannot be
/// decoded is logged and dropped; the stream keeps running.

pub mod decoder;
pub mod normalize;

pub use decoder::{decode, UpdateDispatcher};
pub use normalize::{normalize_batch, normalize_event};

use crate::event::Event;
use crate::store::Action;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Channel carrying full events
pub const EVENT_CHANNEL: &str = "event";

/// Channel carrying compact update tuples
pub const UPDATE_CHANNEL: &str = "update";

/// One frame from the live stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamMessage {
    /// Channel name (`event` or `update`)
    #[serde(rename = "event")]
    pub channel: String,
    /// JSON text payload; empty for heartbeats
    #[serde(default)]
    pub data: String,
}

impl StreamMessage {
    pub fn new(channel: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            data: data.into(),
        }
    }

    pub fn is_heartbeat(&self) -> bool {
        self.data.trim().is_empty()
    }
}

/// What a stream message asks the client to do
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Heartbeat,
    NewEvent(Event),
    /// Reducer actions, applied in order
    Actions(Vec<Action>),
    PlayerUpdate {
        player_id: String,
        diff: Map<String, Value>,
    },
    PlayerLeft {
        player_id: String,
    },
}
