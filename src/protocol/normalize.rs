/// Normalization of events received from the game server
///
/// Older servers send the player as flat `pID`/`pName`/`share` fields and
/// may leave out `glitchy`. Everything is folded into the current shape
/// before it reaches the log.
use crate::error::{SyncError, SyncResult};
use crate::event::{sort_batch, Event};
use serde_json::{json, Map, Value};
use tracing::warn;

const LEGACY_PLAYER_ID: &str = "pID";
const LEGACY_PLAYER_NAME: &str = "pName";
const LEGACY_SHARE: &str = "share";

/// Decode one server event, folding legacy fields into `source`.
///
/// Server-confirmed events must come from a game player; a `"local"`
/// source is rejected.
pub fn normalize_event(value: Value) -> SyncResult<Event> {
    let Value::Object(mut fields) = value else {
        return Err(SyncError::Protocol("event is not a JSON object".to_string()));
    };

    let legacy_id = fields.remove(LEGACY_PLAYER_ID);
    let legacy_name = fields.remove(LEGACY_PLAYER_NAME);
    let legacy_share = fields.remove(LEGACY_SHARE);

    if !fields.contains_key("source") {
        let player_id = match legacy_id {
            Some(Value::String(id)) => id,
            Some(Value::Number(id)) => id.to_string(),
            Some(_) | None => {
                return Err(SyncError::Protocol("event has no source".to_string()));
            }
        };
        let mut source = Map::new();
        source.insert("id".to_string(), Value::String(player_id));
        source.insert(
            "name".to_string(),
            legacy_name.unwrap_or_else(|| Value::String(String::new())),
        );
        if let Some(share) = legacy_share {
            source.insert("share".to_string(), share);
        }
        fields.insert("source".to_string(), Value::Object(source));
    }

    let is_dice_event = fields.get("ty").and_then(Value::as_str) != Some("playerJoin");
    if is_dice_event && !fields.contains_key("glitchy") {
        fields.insert("glitchy".to_string(), json!(0));
    }

    let event: Event = serde_json::from_value(Value::Object(fields))
        .map_err(|e| SyncError::Protocol(format!("invalid event: {}", e)))?;

    if event.is_local() {
        return Err(SyncError::Protocol(format!(
            "server event {} claims a local source",
            event.id()
        )));
    }

    Ok(event)
}

/// Normalize a history page into merge order.
///
/// Events that fail to normalize are dropped individually; the rest of the
/// page is still usable.
pub fn normalize_batch(values: Vec<Value>) -> Vec<Event> {
    let events = values
        .into_iter()
        .filter_map(|value| match normalize_event(value) {
            Ok(event) => Some(event),
            Err(e) => {
                warn!("Dropping event from history page: {}", e);
                None
            }
        })
        .collect();
    sort_batch(events)
}
