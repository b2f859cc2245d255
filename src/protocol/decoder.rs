/// Stream message decoding and dispatch
use crate::error::{SyncError, SyncResult};
use crate::event::{Event, EventId, LocalClock, Share, Source};
use crate::game::{GameRoster, PlayerState};
use crate::metrics;
use crate::protocol::{normalize_event, Decoded, StreamMessage, EVENT_CHANNEL, UPDATE_CHANNEL};
use crate::store::{Action, EventStore};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, trace, warn};

const EVENT_UPDATE: &str = "evt";
const PLAYER_UPDATE: &str = "plr";
const DELETE_MARKER: &str = "del";

/// Decode one stream message without applying it
pub fn decode(message: &StreamMessage, clock: &LocalClock) -> SyncResult<Decoded> {
    if message.is_heartbeat() {
        return Ok(Decoded::Heartbeat);
    }
    match message.channel.as_str() {
        EVENT_CHANNEL => decode_event(&message.data),
        UPDATE_CHANNEL => decode_update(&message.data, clock),
        other => Err(SyncError::Protocol(format!("unknown channel `{}`", other))),
    }
}

fn decode_event(data: &str) -> SyncResult<Decoded> {
    let value: Value = serde_json::from_str(data)?;
    normalize_event(value).map(Decoded::NewEvent)
}

fn decode_update(data: &str, clock: &LocalClock) -> SyncResult<Decoded> {
    let value: Value = serde_json::from_str(data)?;
    let Value::Array(parts) = value else {
        return Err(SyncError::Protocol("update is not a tuple".to_string()));
    };
    if parts.len() < 3 {
        return Err(SyncError::Protocol(format!(
            "update tuple has {} elements, expected at least 3",
            parts.len()
        )));
    }

    let kind = parts[0].as_str().unwrap_or_default();
    match kind {
        EVENT_UPDATE => {
            let id = parts[1]
                .as_i64()
                .ok_or_else(|| SyncError::Protocol(format!("bad event id {}", parts[1])))?;
            let edit = parts.get(3).and_then(Value::as_i64).unwrap_or_else(|| clock.now());
            decode_event_update(id, edit, &parts[2])
        }
        PLAYER_UPDATE => {
            let player_id = match &parts[1] {
                Value::String(id) => id.clone(),
                Value::Number(id) => id.to_string(),
                other => {
                    return Err(SyncError::Protocol(format!("bad player id {}", other)));
                }
            };
            match &parts[2] {
                Value::String(marker) if marker == DELETE_MARKER => {
                    Ok(Decoded::PlayerLeft { player_id })
                }
                Value::Object(diff) => Ok(Decoded::PlayerUpdate {
                    player_id,
                    diff: diff.clone(),
                }),
                other => Err(SyncError::Protocol(format!("bad player diff {}", other))),
            }
        }
        other => Err(SyncError::Protocol(format!("unknown update kind `{}`", other))),
    }
}

fn decode_event_update(id: EventId, edit: EventId, diff: &Value) -> SyncResult<Decoded> {
    let mut diff = match diff {
        Value::String(marker) if marker == DELETE_MARKER => {
            return Ok(Decoded::Actions(vec![Action::DeleteEvent { id }]));
        }
        Value::Object(diff) => diff.clone(),
        other => {
            return Err(SyncError::Protocol(format!("bad event diff {}", other)));
        }
    };

    if let Some(reroll) = diff.remove("reroll") {
        let reroll: Vec<u8> = serde_json::from_value(reroll)
            .map_err(|e| SyncError::Protocol(format!("bad reroll dice: {}", e)))?;
        return Ok(Decoded::Actions(vec![Action::Reroll { id, edit, reroll }]));
    }

    let mut actions = Vec::new();
    if let Some(share) = diff.remove("share") {
        let share: Share = serde_json::from_value(share)
            .map_err(|e| SyncError::Protocol(format!("bad share: {}", e)))?;
        actions.push(Action::ModifyShare { id, share });
    }
    // Always stamped, even when only the share changed
    actions.push(Action::ModifyEvent { id, edit, diff });
    Ok(Decoded::Actions(actions))
}

/// Applies decoded stream messages to the store and the game collaborators
pub struct UpdateDispatcher {
    store: Arc<EventStore>,
    roster: Arc<dyn GameRoster>,
    player: Arc<dyn PlayerState>,
}

impl UpdateDispatcher {
    pub fn new(
        store: Arc<EventStore>,
        roster: Arc<dyn GameRoster>,
        player: Arc<dyn PlayerState>,
    ) -> Self {
        Self {
            store,
            roster,
            player,
        }
    }

    /// Apply one message; malformed messages are logged and dropped
    pub fn handle(&self, message: &StreamMessage) {
        metrics::record_stream_message(&message.channel);

        let decoded = match decode(message, self.store.clock()) {
            Ok(decoded) => decoded,
            Err(e) => {
                metrics::record_protocol_error(&message.channel);
                warn!("Dropping `{}` message: {}", message.channel, e);
                return;
            }
        };

        match decoded {
            Decoded::Heartbeat => trace!("Heartbeat on `{}`", message.channel),
            Decoded::NewEvent(event) => {
                if let Event::PlayerJoin {
                    source: Source::Game(source),
                    ..
                } = &event
                {
                    self.roster.player_joined(source);
                }
                self.store.dispatch(Action::NewEvent { event });
            }
            Decoded::Actions(actions) => {
                for action in actions {
                    self.store.dispatch(action);
                }
            }
            Decoded::PlayerUpdate { player_id, diff } => {
                self.player.apply_update(&player_id, &diff);
                if self.roster.knows_player(&player_id) {
                    self.roster.update_player(&player_id, &diff);
                } else {
                    debug!("Update for player {} who is not in the roster", player_id);
                }
            }
            Decoded::PlayerLeft { player_id } => self.roster.player_left(&player_id),
        }
    }

    pub fn store(&self) -> &Arc<EventStore> {
        &self.store
    }

    /// Forget every player, e.g. on logout
    pub fn clear_players(&self) {
        self.roster.clear();
        self.player.clear();
    }
}
