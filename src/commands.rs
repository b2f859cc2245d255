/// User commands against the roll log
///
/// Local events live only in this client and are changed optimistically.
/// Game events belong to the server: the request goes first and the log is
/// only changed once the server accepted it. The live stream echoes the same
/// change back later, which merges idempotently.
use crate::api::{EventSubmission, GameServer};
use crate::error::{SyncError, SyncResult};
use crate::event::{Event, EventId, GameSource, Share, Source};
use crate::rules;
use crate::session::{Session, SessionSlot};
use crate::store::{Action, EventStore};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Clone)]
pub struct Commands {
    store: Arc<EventStore>,
    api: Arc<dyn GameServer>,
    sessions: Arc<SessionSlot>,
}

impl Commands {
    pub fn new(store: Arc<EventStore>, api: Arc<dyn GameServer>, sessions: Arc<SessionSlot>) -> Self {
        Self {
            store,
            api,
            sessions,
        }
    }

    /// Record a roll that only this client sees; returns its new id
    pub fn roll_local(&self, mut draft: Event) -> SyncResult<EventId> {
        ensure_dice_event(&draft)?;
        let id = self.store.clock().next_id();
        draft.set_id(id);
        *draft.source_mut() = Source::Local;
        debug!("Recording local {} {}", draft.kind(), id);
        self.store.dispatch(Action::NewEvent { event: draft });
        Ok(id)
    }

    /// Submit a roll to the game; returns the id the server assigned
    pub async fn submit_game(&self, mut draft: Event, share: Share) -> SyncResult<EventId> {
        ensure_dice_event(&draft)?;
        let session = self.session()?;
        let submission = EventSubmission::from_event(&draft, share)?;
        let accepted = self
            .api
            .submit_event(&session, &submission)
            .await
            .into_result()?;

        draft.set_id(accepted.id);
        *draft.source_mut() = Source::Game(GameSource {
            id: session.player_id.clone(),
            name: session.player_name.clone(),
            share,
        });
        self.store.dispatch(Action::NewEvent { event: draft });
        info!("Submitted {} {} to game {}", submission_kind(&submission), accepted.id, session.game_id);
        Ok(accepted.id)
    }

    /// Start editing a dice event inline
    pub fn select_edit(&self, id: EventId) -> SyncResult<()> {
        let event = self.find(id)?;
        ensure_dice_event(&event)?;
        self.store.dispatch(Action::SelectEdit { event });
        Ok(())
    }

    pub fn cancel_edit(&self) {
        self.store.dispatch(Action::ClearEdit);
    }

    /// Apply field changes to an event
    pub async fn edit(&self, id: EventId, diff: Map<String, Value>) -> SyncResult<()> {
        let event = self.find(id)?;
        ensure_dice_event(&event)?;
        if !event.is_local() {
            let session = self.session()?;
            self.api
                .update_event(&session, id, &diff)
                .await
                .into_result()?;
        }
        let edit = self.store.clock().now();
        self.store.dispatch(Action::ModifyEvent { id, edit, diff });
        self.store.dispatch(Action::ClearEdit);
        Ok(())
    }

    pub async fn delete(&self, id: EventId) -> SyncResult<()> {
        let event = self.find(id)?;
        if !event.is_local() {
            let session = self.session()?;
            self.api.delete_event(&session, id).await.into_result()?;
        }
        self.store.dispatch(Action::DeleteEvent { id });
        self.store.dispatch(Action::ClearEdit);
        Ok(())
    }

    /// Reroll the failed dice of a plain roll; returns the new dice
    pub async fn reroll(&self, id: EventId) -> SyncResult<Vec<u8>> {
        let event = self.find(id)?;
        let Event::Roll { dice, .. } = &event else {
            return Err(SyncError::InvalidCommand(format!(
                "only plain rolls can be rerolled, event {} is {}",
                id,
                event.kind()
            )));
        };
        let reroll = rules::reroll_failures(dice);
        if !event.is_local() {
            let session = self.session()?;
            self.api
                .reroll_event(&session, id, &reroll)
                .await
                .into_result()?;
        }
        let edit = self.store.clock().now();
        self.store.dispatch(Action::Reroll {
            id,
            edit,
            reroll: reroll.clone(),
        });
        Ok(reroll)
    }

    /// Seize the initiative on an initiative roll
    pub async fn seize(&self, id: EventId) -> SyncResult<()> {
        let event = self.find(id)?;
        if !matches!(event, Event::Initiative { .. }) {
            return Err(SyncError::InvalidCommand(format!(
                "event {} is {}, not an initiative roll",
                id,
                event.kind()
            )));
        }
        if !event.is_local() {
            let session = self.session()?;
            self.api
                .seize_initiative(&session, id)
                .await
                .into_result()?;
        }
        let edit = self.store.clock().now();
        self.store.dispatch(Action::SeizeInitiative { id, edit });
        Ok(())
    }

    fn find(&self, id: EventId) -> SyncResult<Event> {
        self.store
            .snapshot()
            .events
            .iter()
            .find(|event| event.id() == id)
            .cloned()
            .ok_or_else(|| SyncError::NotFound(format!("event {}", id)))
    }

    fn session(&self) -> SyncResult<Session> {
        self.sessions
            .current()
            .ok_or_else(|| SyncError::InvalidCommand("not joined to a game".to_string()))
    }
}

fn ensure_dice_event(event: &Event) -> SyncResult<()> {
    if event.is_dice_event() {
        Ok(())
    } else {
        Err(SyncError::InvalidCommand(format!(
            "{} events cannot be rolled or edited",
            event.kind()
        )))
    }
}

fn submission_kind(submission: &EventSubmission) -> &str {
    submission
        .fields
        .get("ty")
        .and_then(Value::as_str)
        .unwrap_or("event")
}
