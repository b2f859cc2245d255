/// Backward pagination through older events
///
/// A windowed viewport asks whether a row is loaded and, when the user
/// scrolls past the loaded prefix, asks for more. Pages are merged into the
/// log through the same merge as live events, so a page that arrives late
/// still lands in the right place.
use crate::api::{GameServer, RequestOutcome};
use crate::metrics;
use crate::protocol::normalize_batch;
use crate::session::SessionSlot;
use crate::store::{Action, EventStore, HistoryFetch};
use crate::stream::Connection;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info};

pub struct HistoryPaginator {
    store: Arc<EventStore>,
    api: Arc<dyn GameServer>,
    sessions: Arc<SessionSlot>,
    connection: watch::Receiver<Connection>,
}

impl HistoryPaginator {
    pub fn new(
        store: Arc<EventStore>,
        api: Arc<dyn GameServer>,
        sessions: Arc<SessionSlot>,
        connection: watch::Receiver<Connection>,
    ) -> Self {
        Self {
            store,
            api,
            sessions,
            connection,
        }
    }

    /// Whether row `index` of the viewport can be rendered.
    ///
    /// Once history is finished every row counts as loaded, so the viewport
    /// stops asking for more.
    pub fn is_item_loaded(&self, index: usize) -> bool {
        let state = self.store.snapshot();
        index < state.events.len() || state.history_fetch == HistoryFetch::Finished
    }

    /// Fetch the page before the oldest known event.
    ///
    /// Does nothing while a fetch is running, when offline, or when history
    /// is finished. Errors stop pagination for the rest of the session.
    /// Returns the pagination state afterwards.
    pub async fn load_more_items(&self, oldest_visible_index: usize) -> HistoryFetch {
        if !self.connection.borrow().is_online() {
            debug!("Not loading history while offline");
            return self.store.snapshot().history_fetch;
        }
        let Some(session) = self.sessions.current() else {
            debug!("Not loading history without a session");
            return self.store.snapshot().history_fetch;
        };
        if !self.store.begin_history_fetch() {
            return self.store.snapshot().history_fetch;
        }

        let newest = self.store.snapshot().events.last().map(|event| event.id());
        debug!(
            "Loading history before {:?} (viewport at row {})",
            newest, oldest_visible_index
        );

        match self.api.fetch_history(&session, newest).await {
            RequestOutcome::Success(page) => {
                let events = normalize_batch(page.events);
                let next = if page.more {
                    HistoryFetch::Ready
                } else {
                    info!("Reached the start of the game history");
                    HistoryFetch::Finished
                };
                metrics::record_history_fetch(if page.more { "more" } else { "finished" });
                self.store.dispatch(Action::SetHistoryFetch { state: next });
                self.store.dispatch(Action::MergeEvents { events });
                next
            }
            failure => {
                metrics::record_history_fetch("error");
                match &failure {
                    RequestOutcome::ClientError { status, message }
                    | RequestOutcome::ServerError { status, message } => {
                        error!("History request failed with {}: {}", status, message)
                    }
                    RequestOutcome::NetworkError(message) => {
                        error!("History request failed: {}", message)
                    }
                    RequestOutcome::Success(_) => {}
                }
                self.store.dispatch(Action::SetHistoryFetch {
                    state: HistoryFetch::Finished,
                });
                HistoryFetch::Finished
            }
        }
    }
}
