/// Game collaborators - roster and player-state sinks fed by the live stream
///
/// The sync engine only ever talks to these through the two traits below;
/// the in-memory implementations are what the binary and the tests use.
use crate::event::GameSource;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// A player seen in the current game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub name: String,
    /// Extra profile fields (colour, pronouns, ...) merged from roster diffs
    #[serde(flatten)]
    pub profile: Map<String, Value>,
}

/// Roster of players in the joined game
pub trait GameRoster: Send + Sync {
    fn knows_player(&self, player_id: &str) -> bool;

    /// A player joined (or rejoined) the game
    fn player_joined(&self, source: &GameSource);

    fn player_left(&self, player_id: &str);

    /// Shallow-merge profile changes into a known player
    fn update_player(&self, player_id: &str, diff: &Map<String, Value>);

    /// Forget every player (logout / leaving the game)
    fn clear(&self);
}

/// This client's own player profile
pub trait PlayerState: Send + Sync {
    fn player_id(&self) -> Option<String>;

    /// Apply a profile diff addressed to `player_id`; ignored if it is not us
    fn apply_update(&self, player_id: &str, diff: &Map<String, Value>);

    fn clear(&self);
}

/// Roster kept in memory, ordered by player id
#[derive(Debug, Default)]
pub struct InMemoryRoster {
    players: RwLock<BTreeMap<String, Player>>,
}

impl InMemoryRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn players(&self) -> Vec<Player> {
        self.players.read().values().cloned().collect()
    }

    pub fn player(&self, player_id: &str) -> Option<Player> {
        self.players.read().get(player_id).cloned()
    }
}

impl GameRoster for InMemoryRoster {
    fn knows_player(&self, player_id: &str) -> bool {
        self.players.read().contains_key(player_id)
    }

    fn player_joined(&self, source: &GameSource) {
        let mut players = self.players.write();
        players
            .entry(source.id.clone())
            .and_modify(|player| player.name = source.name.clone())
            .or_insert_with(|| Player {
                id: source.id.clone(),
                name: source.name.clone(),
                profile: Map::new(),
            });
        debug!("Player {} ({}) is in the game", source.name, source.id);
    }

    fn player_left(&self, player_id: &str) {
        if self.players.write().remove(player_id).is_none() {
            debug!("Player {} left but was not in the roster", player_id);
        }
    }

    fn update_player(&self, player_id: &str, diff: &Map<String, Value>) {
        let mut players = self.players.write();
        let Some(player) = players.get_mut(player_id) else {
            warn!("Roster update for unknown player {}", player_id);
            return;
        };
        for (key, value) in diff {
            match key.as_str() {
                "id" => {}
                "name" => match value.as_str() {
                    Some(name) => player.name = name.to_string(),
                    None => warn!("Ignoring non-string name for player {}", player_id),
                },
                _ => {
                    player.profile.insert(key.clone(), value.clone());
                }
            }
        }
    }

    fn clear(&self) {
        self.players.write().clear();
    }
}

/// Own profile kept in memory
#[derive(Debug, Default)]
pub struct InMemoryPlayer {
    profile: RwLock<Option<Player>>,
}

impl InMemoryPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking our own profile once the game has been joined
    pub fn set(&self, player: Player) {
        *self.profile.write() = Some(player);
    }

    pub fn get(&self) -> Option<Player> {
        self.profile.read().clone()
    }
}

impl PlayerState for InMemoryPlayer {
    fn player_id(&self) -> Option<String> {
        self.profile.read().as_ref().map(|player| player.id.clone())
    }

    fn apply_update(&self, player_id: &str, diff: &Map<String, Value>) {
        let mut profile = self.profile.write();
        let Some(player) = profile.as_mut().filter(|player| player.id == player_id) else {
            return;
        };
        for (key, value) in diff {
            match (key.as_str(), value.as_str()) {
                ("id", _) => {}
                ("name", Some(name)) => player.name = name.to_string(),
                _ => {
                    player.profile.insert(key.clone(), value.clone());
                }
            }
        }
    }

    fn clear(&self) {
        *self.profile.write() = None;
    }
}
