/// Session lifecycle
///
/// A `Session` is created by joining a game (or built from configured
/// credentials) and lives in a `SessionSlot` shared by the stream manager,
/// the paginator and the command layer. Logging out tears it down.
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Credentials and identity for one joined game
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Bearer token sent with every request and the stream upgrade
    pub token: String,
    #[serde(rename = "gameID")]
    pub game_id: String,
    #[serde(rename = "playerID")]
    pub player_id: String,
    pub player_name: String,
}

impl Session {
    pub fn new(
        token: impl Into<String>,
        game_id: impl Into<String>,
        player_id: impl Into<String>,
        player_name: impl Into<String>,
    ) -> Self {
        Self {
            token: token.into(),
            game_id: game_id.into(),
            player_id: player_id.into(),
            player_name: player_name.into(),
        }
    }
}

/// Holder for the active session, if any
#[derive(Debug, Default)]
pub struct SessionSlot {
    current: RwLock<Option<Session>>,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a session, replacing any previous one
    pub fn init(&self, session: Session) {
        info!(
            "Session started for player {} in game {}",
            session.player_id, session.game_id
        );
        *self.current.write() = Some(session);
    }

    pub fn current(&self) -> Option<Session> {
        self.current.read().clone()
    }

    pub fn is_active(&self) -> bool {
        self.current.read().is_some()
    }

    /// Remove and return the active session
    pub fn teardown(&self) -> Option<Session> {
        let session = self.current.write().take();
        if let Some(session) = &session {
            info!("Session ended for player {}", session.player_id);
        }
        session
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_lifecycle() {
        let slot = SessionSlot::new();
        assert!(!slot.is_active());

        slot.init(Session::new("tok", "g1", "p1", "Ada"));
        assert_eq!(slot.current().map(|s| s.game_id), Some("g1".to_string()));

        let ended = slot.teardown().unwrap();
        assert_eq!(ended.player_id, "p1");
        assert!(slot.teardown().is_none());
    }

    #[test]
    fn test_session_wire_names() {
        let json = serde_json::to_value(Session::new("t", "g", "p", "n")).unwrap();
        assert_eq!(json["gameID"], "g");
        assert_eq!(json["playerID"], "p");
        assert_eq!(json["playerName"], "n");
    }
}
