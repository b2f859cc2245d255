/// Event model - the roll log entries shared by every player in a game
///
/// Every entry is identified and ordered by a single millisecond `id`.
/// The log keeps entries newest first; see `merge` for how batches from
/// the server are folded in.

pub mod clock;
pub mod merge;

pub use clock::LocalClock;
pub use merge::{is_descending, merge_events, sort_batch};

use serde::{Deserialize, Serialize};

/// Event identity and ordering key (milliseconds since the epoch)
pub type EventId = i64;

/// Who can see a game event
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Share {
    #[default]
    InGame,
    GmsOnly,
    Private,
}

/// Player that produced a game event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameSource {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub share: Share,
}

/// Origin of an event: this client, or a player in the joined game
///
/// Serialized as the bare string `"local"` or a `GameSource` object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SourceRepr", into = "SourceRepr")]
pub enum Source {
    Local,
    Game(GameSource),
}

const LOCAL_MARKER: &str = "local";

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum SourceRepr {
    Marker(String),
    Game(GameSource),
}

impl TryFrom<SourceRepr> for Source {
    type Error = String;

    fn try_from(repr: SourceRepr) -> Result<Self, Self::Error> {
        match repr {
            SourceRepr::Marker(marker) if marker == LOCAL_MARKER => Ok(Source::Local),
            SourceRepr::Marker(other) => Err(format!("unknown source marker: {}", other)),
            SourceRepr::Game(source) => Ok(Source::Game(source)),
        }
    }
}

impl From<Source> for SourceRepr {
    fn from(source: Source) -> Self {
        match source {
            Source::Local => SourceRepr::Marker(LOCAL_MARKER.to_string()),
            Source::Game(source) => SourceRepr::Game(source),
        }
    }
}

impl Source {
    pub fn is_local(&self) -> bool {
        matches!(self, Source::Local)
    }
}

/// One entry in the roll log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "ty", rename_all = "camelCase")]
pub enum Event {
    Roll {
        id: EventId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        edit: Option<EventId>,
        source: Source,
        title: String,
        dice: Vec<u8>,
        #[serde(default)]
        glitchy: i32,
    },
    EdgeRoll {
        id: EventId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        edit: Option<EventId>,
        source: Source,
        title: String,
        rounds: Vec<Vec<u8>>,
        #[serde(default)]
        glitchy: i32,
    },
    /// `rounds[0]` holds the rerolled dice, `rounds[1]` the original roll
    RerollFailures {
        id: EventId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        edit: Option<EventId>,
        source: Source,
        #[serde(rename = "rollID")]
        roll_id: EventId,
        title: String,
        rounds: Vec<Vec<u8>>,
        #[serde(default)]
        glitchy: i32,
    },
    Initiative {
        id: EventId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        edit: Option<EventId>,
        source: Source,
        title: String,
        base: i32,
        dice: Vec<u8>,
        #[serde(default)]
        seized: bool,
        #[serde(default)]
        blitzed: bool,
    },
    PlayerJoin {
        id: EventId,
        source: Source,
    },
}

impl Event {
    pub fn id(&self) -> EventId {
        match self {
            Event::Roll { id, .. }
            | Event::EdgeRoll { id, .. }
            | Event::RerollFailures { id, .. }
            | Event::Initiative { id, .. }
            | Event::PlayerJoin { id, .. } => *id,
        }
    }

    pub(crate) fn set_id(&mut self, new_id: EventId) {
        match self {
            Event::Roll { id, .. }
            | Event::EdgeRoll { id, .. }
            | Event::RerollFailures { id, .. }
            | Event::Initiative { id, .. }
            | Event::PlayerJoin { id, .. } => *id = new_id,
        }
    }

    /// Timestamp of the most recent modification, if the event was ever edited
    pub fn edit(&self) -> Option<EventId> {
        match self {
            Event::Roll { edit, .. }
            | Event::EdgeRoll { edit, .. }
            | Event::RerollFailures { edit, .. }
            | Event::Initiative { edit, .. } => *edit,
            Event::PlayerJoin { .. } => None,
        }
    }

    /// Record a modification; a no-op for `PlayerJoin`, which cannot be edited
    pub(crate) fn set_edit(&mut self, timestamp: EventId) {
        match self {
            Event::Roll { edit, .. }
            | Event::EdgeRoll { edit, .. }
            | Event::RerollFailures { edit, .. }
            | Event::Initiative { edit, .. } => *edit = Some(timestamp),
            Event::PlayerJoin { .. } => {}
        }
    }

    pub fn source(&self) -> &Source {
        match self {
            Event::Roll { source, .. }
            | Event::EdgeRoll { source, .. }
            | Event::RerollFailures { source, .. }
            | Event::Initiative { source, .. }
            | Event::PlayerJoin { source, .. } => source,
        }
    }

    pub(crate) fn source_mut(&mut self) -> &mut Source {
        match self {
            Event::Roll { source, .. }
            | Event::EdgeRoll { source, .. }
            | Event::RerollFailures { source, .. }
            | Event::Initiative { source, .. }
            | Event::PlayerJoin { source, .. } => source,
        }
    }

    pub fn is_local(&self) -> bool {
        self.source().is_local()
    }

    pub fn title(&self) -> Option<&str> {
        match self {
            Event::Roll { title, .. }
            | Event::EdgeRoll { title, .. }
            | Event::RerollFailures { title, .. }
            | Event::Initiative { title, .. } => Some(title),
            Event::PlayerJoin { .. } => None,
        }
    }

    /// Dice events are everything a player can edit, i.e. all but `PlayerJoin`
    pub fn is_dice_event(&self) -> bool {
        !matches!(self, Event::PlayerJoin { .. })
    }

    /// Wire tag of this variant
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Roll { .. } => "roll",
            Event::EdgeRoll { .. } => "edgeRoll",
            Event::RerollFailures { .. } => "rerollFailures",
            Event::Initiative { .. } => "initiative",
            Event::PlayerJoin { .. } => "playerJoin",
        }
    }
}
