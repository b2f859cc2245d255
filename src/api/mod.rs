/// Game server request layer
///
/// Every call returns a `RequestOutcome` that callers pattern-match on,
/// separating client errors (our request was wrong), server errors and
/// network failures.

pub mod client;

pub use client::GameApi;

use crate::error::{SyncError, SyncResult};
use crate::event::{Event, EventId, Share};
use crate::session::Session;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Result of one request to the game server
#[derive(Debug, Clone, PartialEq)]
pub enum RequestOutcome<T> {
    Success(T),
    /// 4xx response
    ClientError { status: u16, message: String },
    /// 5xx (or otherwise unexpected) response
    ServerError { status: u16, message: String },
    /// The request never produced a response, or the body was unreadable
    NetworkError(String),
}

impl<T> RequestOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, RequestOutcome::Success(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> RequestOutcome<U> {
        match self {
            RequestOutcome::Success(value) => RequestOutcome::Success(f(value)),
            RequestOutcome::ClientError { status, message } => {
                RequestOutcome::ClientError { status, message }
            }
            RequestOutcome::ServerError { status, message } => {
                RequestOutcome::ServerError { status, message }
            }
            RequestOutcome::NetworkError(message) => RequestOutcome::NetworkError(message),
        }
    }

    /// Short label for logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            RequestOutcome::Success(_) => "success",
            RequestOutcome::ClientError { .. } => "client_error",
            RequestOutcome::ServerError { .. } => "server_error",
            RequestOutcome::NetworkError(_) => "network_error",
        }
    }

    pub fn into_result(self) -> SyncResult<T> {
        match self {
            RequestOutcome::Success(value) => Ok(value),
            RequestOutcome::ClientError { status, message }
            | RequestOutcome::ServerError { status, message } => {
                Err(SyncError::Request { status, message })
            }
            RequestOutcome::NetworkError(message) => Err(SyncError::Transport(message)),
        }
    }
}

/// One page of older events, newest first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryPage {
    /// Raw events; normalized by the paginator before merging
    pub events: Vec<Value>,
    pub more: bool,
}

/// Body of a new game event submission
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventSubmission {
    /// Event fields without `id` and `source`; the server assigns both
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    pub share: Share,
}

impl EventSubmission {
    pub fn from_event(event: &Event, share: Share) -> SyncResult<Self> {
        let mut fields = match serde_json::to_value(event)? {
            Value::Object(fields) => fields,
            _ => {
                return Err(SyncError::InvalidCommand(
                    "event did not encode as an object".to_string(),
                ));
            }
        };
        fields.remove("id");
        fields.remove("source");
        fields.remove("edit");
        Ok(Self { fields, share })
    }
}

/// Server reply to an accepted submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionAccepted {
    pub id: EventId,
}

/// Body of a join request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    #[serde(rename = "gameID")]
    pub game_id: String,
    pub player_name: String,
}

/// Everything the sync engine needs from the game server
#[async_trait]
pub trait GameServer: Send + Sync {
    /// Join a game and obtain a session for it
    async fn join_game(&self, request: &JoinRequest) -> RequestOutcome<Session>;

    /// Events older than `newest` (the most recent page when `None`)
    async fn fetch_history(
        &self,
        session: &Session,
        newest: Option<EventId>,
    ) -> RequestOutcome<HistoryPage>;

    async fn submit_event(
        &self,
        session: &Session,
        submission: &EventSubmission,
    ) -> RequestOutcome<SubmissionAccepted>;

    async fn update_event(
        &self,
        session: &Session,
        id: EventId,
        diff: &Map<String, Value>,
    ) -> RequestOutcome<()>;

    async fn delete_event(&self, session: &Session, id: EventId) -> RequestOutcome<()>;

    async fn reroll_event(
        &self,
        session: &Session,
        id: EventId,
        reroll: &[u8],
    ) -> RequestOutcome<()>;

    async fn seize_initiative(&self, session: &Session, id: EventId) -> RequestOutcome<()>;

    async fn logout(&self, session: &Session) -> RequestOutcome<()>;
}

/// Scriptable in-memory game server for unit tests
#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

    pub(crate) struct FakeServer {
        /// Replies to successive history requests; an empty queue means "no more"
        pub pages: Mutex<VecDeque<RequestOutcome<HistoryPage>>>,
        /// `newest` argument of every history request
        pub history_requests: Mutex<Vec<Option<EventId>>>,
        /// Every other call, e.g. `update 12`
        pub calls: Mutex<Vec<String>>,
        pub reject_commands: AtomicBool,
        pub next_id: AtomicI64,
    }

    impl Default for FakeServer {
        fn default() -> Self {
            Self {
                pages: Mutex::new(VecDeque::new()),
                history_requests: Mutex::new(Vec::new()),
                calls: Mutex::new(Vec::new()),
                reject_commands: AtomicBool::new(false),
                next_id: AtomicI64::new(1000),
            }
        }
    }

    impl FakeServer {
        pub fn push_page(&self, page: RequestOutcome<HistoryPage>) {
            self.pages.lock().push_back(page);
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }

        fn command(&self, call: String) -> RequestOutcome<()> {
            self.calls.lock().push(call);
            if self.reject_commands.load(Ordering::SeqCst) {
                RequestOutcome::ClientError {
                    status: 403,
                    message: "not your event".to_string(),
                }
            } else {
                RequestOutcome::Success(())
            }
        }
    }

    #[async_trait]
    impl GameServer for FakeServer {
        async fn join_game(&self, request: &JoinRequest) -> RequestOutcome<Session> {
            self.calls.lock().push(format!("join {}", request.game_id));
            RequestOutcome::Success(Session::new(
                "token",
                request.game_id.clone(),
                "p1",
                request.player_name.clone(),
            ))
        }

        async fn fetch_history(
            &self,
            _session: &Session,
            newest: Option<EventId>,
        ) -> RequestOutcome<HistoryPage> {
            self.history_requests.lock().push(newest);
            self.pages
                .lock()
                .pop_front()
                .unwrap_or_else(|| RequestOutcome::Success(HistoryPage::default()))
        }

        async fn submit_event(
            &self,
            _session: &Session,
            submission: &EventSubmission,
        ) -> RequestOutcome<SubmissionAccepted> {
            self.command(format!("submit {:?}", submission.share))
                .map(|_| SubmissionAccepted {
                    id: self.next_id.fetch_add(1, Ordering::SeqCst),
                })
        }

        async fn update_event(
            &self,
            _session: &Session,
            id: EventId,
            _diff: &Map<String, Value>,
        ) -> RequestOutcome<()> {
            self.command(format!("update {}", id))
        }

        async fn delete_event(&self, _session: &Session, id: EventId) -> RequestOutcome<()> {
            self.command(format!("delete {}", id))
        }

        async fn reroll_event(
            &self,
            _session: &Session,
            id: EventId,
            _reroll: &[u8],
        ) -> RequestOutcome<()> {
            self.command(format!("reroll {}", id))
        }

        async fn seize_initiative(&self, _session: &Session, id: EventId) -> RequestOutcome<()> {
            self.command(format!("seize {}", id))
        }

        async fn logout(&self, _session: &Session) -> RequestOutcome<()> {
            self.calls.lock().push("logout".to_string());
            RequestOutcome::NetworkError("connection reset".to_string())
        }
    }
}
