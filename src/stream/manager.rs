/// Reconnection manager for the live game stream
///
/// Owns the only live connection of a session. Every `connect` bumps a
/// generation counter; callbacks from a superseded stream or retry timer see
/// a stale generation and do nothing.
use crate::api::{GameServer, RequestOutcome};
use crate::metrics;
use crate::protocol::UpdateDispatcher;
use crate::session::{Session, SessionSlot};
use crate::store::Action;
use crate::stream::{BackoffSchedule, Connection, StreamTransport};
use futures_util::StreamExt;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Live stream bookkeeping, guarded by one lock
#[derive(Default)]
struct Link {
    generation: u64,
    retries: u32,
    /// Set when a stream opened; the next failure restarts the schedule
    connection_successful: bool,
    stream_task: Option<JoinHandle<()>>,
    retry_timer: Option<JoinHandle<()>>,
}

impl Link {
    /// Abort the stream task and any pending retry, invalidating their callbacks
    fn close(&mut self) -> u64 {
        if let Some(task) = self.stream_task.take() {
            task.abort();
        }
        if let Some(timer) = self.retry_timer.take() {
            timer.abort();
        }
        self.generation += 1;
        self.generation
    }
}

struct Inner {
    transport: Arc<dyn StreamTransport>,
    dispatcher: Arc<UpdateDispatcher>,
    api: Arc<dyn GameServer>,
    sessions: Arc<SessionSlot>,
    schedule: BackoffSchedule,
    connection: watch::Sender<Connection>,
    link: Mutex<Link>,
}

/// Keeps the live stream open, reconnecting with backoff
#[derive(Clone)]
pub struct ReconnectionManager {
    inner: Arc<Inner>,
}

impl ReconnectionManager {
    pub fn new(
        transport: Arc<dyn StreamTransport>,
        dispatcher: Arc<UpdateDispatcher>,
        api: Arc<dyn GameServer>,
        sessions: Arc<SessionSlot>,
        schedule: BackoffSchedule,
    ) -> Self {
        let (connection, _) = watch::channel(Connection::Offline);
        Self {
            inner: Arc::new(Inner {
                transport,
                dispatcher,
                api,
                sessions,
                schedule,
                connection,
                link: Mutex::new(Link::default()),
            }),
        }
    }

    /// Current connection state
    pub fn connection(&self) -> Connection {
        *self.inner.connection.borrow()
    }

    /// Observe connection state changes
    pub fn subscribe(&self) -> watch::Receiver<Connection> {
        self.inner.connection.subscribe()
    }

    /// Consecutive failed attempts behind the current connection
    pub fn retries(&self) -> u32 {
        self.inner.link.lock().retries
    }

    /// Replace any existing stream with a new one for `session`
    pub fn connect(&self, session: Session, retries: u32) {
        let mut link = self.inner.link.lock();
        self.start(&mut link, session, retries);
    }

    fn start(&self, link: &mut Link, session: Session, retries: u32) {
        let generation = link.close();
        link.retries = retries;
        self.set_connection(Connection::Connecting);
        debug!("Opening live stream (generation {}, retries {})", generation, retries);

        let manager = self.clone();
        link.stream_task = Some(tokio::spawn(async move {
            manager.run_stream(generation, session, retries).await;
        }));
    }

    async fn run_stream(self, generation: u64, session: Session, retries: u32) {
        let mut messages = match self.inner.transport.open(&session, retries).await {
            Ok(messages) => messages,
            Err(e) if !e.is_retryable() => {
                self.on_rejected(generation, &e.to_string());
                return;
            }
            Err(e) => {
                error!("Failed to open live stream: {}", e);
                self.on_error(generation, session);
                return;
            }
        };

        if !self.on_open(generation) {
            return;
        }

        while let Some(item) = messages.next().await {
            match item {
                Ok(message) => {
                    if !self.is_current(generation) {
                        return;
                    }
                    self.inner.dispatcher.handle(&message);
                }
                Err(e) => {
                    error!("Live stream error: {}", e);
                    break;
                }
            }
        }

        warn!("Live stream for game {} ended", session.game_id);
        self.on_error(generation, session);
    }

    fn is_current(&self, generation: u64) -> bool {
        self.inner.link.lock().generation == generation
    }

    fn on_open(&self, generation: u64) -> bool {
        let mut link = self.inner.link.lock();
        if link.generation != generation {
            return false;
        }
        if let Some(timer) = link.retry_timer.take() {
            timer.abort();
        }
        link.connection_successful = true;
        self.set_connection(Connection::Connected);
        info!("Live stream connected");
        true
    }

    fn on_rejected(&self, generation: u64, reason: &str) {
        let mut link = self.inner.link.lock();
        if link.generation != generation {
            return;
        }
        link.stream_task = None;
        self.set_connection(Connection::Errored);
        error!("Live stream rejected, not retrying: {}", reason);
    }

    /// Called from the stream task itself once its stream has failed
    fn on_error(&self, generation: u64, session: Session) {
        let mut link = self.inner.link.lock();
        if link.generation != generation {
            return;
        }
        // Detach rather than abort: this is the running task
        link.stream_task = None;
        if let Some(timer) = link.retry_timer.take() {
            timer.abort();
        }

        if link.connection_successful {
            link.retries = 0;
            link.connection_successful = false;
        }
        let retries = link.retries;
        let delay = self.inner.schedule.delay(retries);
        self.set_connection(Connection::Retrying);
        metrics::record_reconnect_attempt();
        warn!("Reconnecting live stream in {:?} (retry {})", delay, retries + 1);

        let manager = self.clone();
        link.retry_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut link = manager.inner.link.lock();
            if link.generation != generation {
                return;
            }
            // Detach ourselves so the restart does not abort this task
            link.retry_timer = None;
            manager.start(&mut link, session, retries + 1);
        }));
    }

    /// Close the stream without reconnecting and drop the log.
    ///
    /// A later `connect` resyncs from scratch.
    pub fn disconnect(&self) {
        {
            let mut link = self.inner.link.lock();
            link.close();
            link.connection_successful = false;
            self.set_connection(Connection::Disconnected);
        }
        info!("Live stream disconnected");
        self.inner.dispatcher.store().dispatch(Action::ClearEvents);
    }

    /// Close the stream and return every piece of session state to its
    /// initial value. The session itself stays in the slot.
    pub fn reset(&self) {
        {
            let mut link = self.inner.link.lock();
            link.close();
            link.retries = 0;
            link.connection_successful = false;
            self.set_connection(Connection::Offline);
        }
        self.inner.dispatcher.clear_players();
        self.inner.dispatcher.store().dispatch(Action::ResetSession);
    }

    /// End the session: close the stream, forget all state, tell the server
    pub async fn logout(&self) {
        self.reset();

        let Some(session) = self.inner.sessions.teardown() else {
            debug!("Logout without an active session");
            return;
        };
        match self.inner.api.logout(&session).await {
            RequestOutcome::Success(()) => info!("Logged out of game {}", session.game_id),
            other => warn!("Server logout failed ({}), session dropped locally", other.label()),
        }
    }

    fn set_connection(&self, connection: Connection) {
        self.inner.connection.send_if_modified(|current| {
            if *current == connection {
                return false;
            }
            debug!("Connection {:?} -> {:?}", current, connection);
            *current = connection;
            true
        });
    }
}
