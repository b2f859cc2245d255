/// Client context and dependency injection
use crate::{
    api::{GameApi, GameServer, JoinRequest},
    commands::Commands,
    config::ClientConfig,
    error::{SyncError, SyncResult},
    event::LocalClock,
    game::{InMemoryPlayer, InMemoryRoster, Player},
    history::HistoryPaginator,
    protocol::UpdateDispatcher,
    session::{Session, SessionSlot},
    store::EventStore,
    stream::{ReconnectionManager, StreamTransport, WebSocketTransport},
};
use serde_json::Map;
use std::sync::Arc;
use tracing::info;

/// Client context holding all shared services of one client
#[derive(Clone)]
pub struct ClientContext {
    pub config: Arc<ClientConfig>,
    pub store: Arc<EventStore>,
    pub sessions: Arc<SessionSlot>,
    pub api: Arc<dyn GameServer>,
    // Game collaborators
    pub roster: Arc<InMemoryRoster>,
    pub player: Arc<InMemoryPlayer>,
    // Live stream
    pub manager: ReconnectionManager,
    pub paginator: Arc<HistoryPaginator>,
    pub commands: Commands,
}

impl ClientContext {
    /// Create a new client context from configuration
    pub fn new(config: ClientConfig) -> SyncResult<Self> {
        config.validate()?;

        let api: Arc<dyn GameServer> = Arc::new(GameApi::new(&config)?);
        let transport: Arc<dyn StreamTransport> = Arc::new(WebSocketTransport::new(&config.base_url)?);

        Ok(Self::with_services(config, api, transport))
    }

    /// Wire a context around an existing server client and stream transport
    pub fn with_services(
        config: ClientConfig,
        api: Arc<dyn GameServer>,
        transport: Arc<dyn StreamTransport>,
    ) -> Self {
        let store = Arc::new(EventStore::new(Arc::new(LocalClock::new())));
        let sessions = Arc::new(SessionSlot::new());
        let roster = Arc::new(InMemoryRoster::new());
        let player = Arc::new(InMemoryPlayer::new());

        let dispatcher = Arc::new(UpdateDispatcher::new(
            store.clone(),
            roster.clone(),
            player.clone(),
        ));
        let manager = ReconnectionManager::new(
            transport,
            dispatcher,
            api.clone(),
            sessions.clone(),
            config.retry.schedule(),
        );
        let paginator = Arc::new(HistoryPaginator::new(
            store.clone(),
            api.clone(),
            sessions.clone(),
            manager.subscribe(),
        ));
        let commands = Commands::new(store.clone(), api.clone(), sessions.clone());

        Self {
            config: Arc::new(config),
            store,
            sessions,
            api,
            roster,
            player,
            manager,
            paginator,
            commands,
        }
    }

    /// Join `game_id` as `player_name` and start the live stream
    pub async fn join(&self, game_id: &str, player_name: &str) -> SyncResult<Session> {
        let request = JoinRequest {
            game_id: game_id.to_string(),
            player_name: player_name.to_string(),
        };
        let session = self.api.join_game(&request).await.into_result()?;
        info!("Joined game {} as {}", session.game_id, session.player_name);
        self.start(session.clone());
        Ok(session)
    }

    /// Resume the session described by the configuration, if any
    pub fn resume_configured(&self) -> SyncResult<Option<Session>> {
        let game = &self.config.game;
        let Some(token) = game.session_token.clone() else {
            return Ok(None);
        };
        let (Some(game_id), Some(player_id)) = (game.game_id.clone(), game.player_id.clone()) else {
            return Err(SyncError::Config(
                "Resuming a session needs ROLLSYNC_GAME_ID and ROLLSYNC_PLAYER_ID".to_string(),
            ));
        };
        let player_name = game.player_name.clone().unwrap_or_default();
        let session = Session::new(token, game_id, player_id, player_name);
        self.start(session.clone());
        Ok(Some(session))
    }

    fn start(&self, session: Session) {
        if let Some(previous) = self.sessions.current() {
            info!(
                "Leaving game {} for game {}",
                previous.game_id, session.game_id
            );
            self.manager.reset();
        }
        self.player.set(Player {
            id: session.player_id.clone(),
            name: session.player_name.clone(),
            profile: Map::new(),
        });
        self.sessions.init(session.clone());
        self.manager.connect(session, 0);
    }

    /// Leave the game and forget all session state
    pub async fn logout(&self) {
        self.manager.logout().await;
    }
}
