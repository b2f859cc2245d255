/// Live stream connection handling
///
/// The reconnection manager owns the single live connection for a session.
/// Connection health is published as a `Connection` value; the transport is
/// a trait so tests can script connection behavior.

pub mod manager;
pub mod transport;

pub use manager::ReconnectionManager;
pub use transport::{MessageStream, StreamTransport, WebSocketTransport};

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Delays before retries 0..8
pub const RETRY_DELAYS: [Duration; 8] = [
    Duration::from_secs(2),
    Duration::from_secs(2),
    Duration::from_secs(4),
    Duration::from_secs(4),
    Duration::from_secs(8),
    Duration::from_secs(8),
    Duration::from_secs(16),
    Duration::from_secs(16),
];

/// Delay for every retry past the table
pub const RETRY_MAX: Duration = Duration::from_secs(32);

/// Health of the live connection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connection {
    /// No session, or logged out
    #[default]
    Offline,
    Connecting,
    Connected,
    /// Waiting for the next reconnection attempt
    Retrying,
    /// Closed on request; will not reconnect by itself
    Disconnected,
    /// The server refused the session
    Errored,
}

impl Connection {
    pub fn is_online(&self) -> bool {
        !matches!(self, Connection::Offline)
    }
}

/// Retry delay table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffSchedule {
    delays: Vec<Duration>,
    max: Duration,
}

impl BackoffSchedule {
    pub fn new(delays: Vec<Duration>, max: Duration) -> Self {
        Self { delays, max }
    }

    /// Delay before reconnecting after `retries` consecutive failures
    pub fn delay(&self, retries: u32) -> Duration {
        self.delays
            .get(retries as usize)
            .copied()
            .unwrap_or(self.max)
    }
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        Self::new(RETRY_DELAYS.to_vec(), RETRY_MAX)
    }
}
