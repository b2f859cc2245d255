/// Unified error types for rollsync
use thiserror::Error;

/// Main error type for the sync engine and its request layer
#[derive(Error, Debug)]
pub enum SyncError {
    /// Malformed or unrecognized wire message
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Live stream or fetch failure that should drive a retry
    #[error("Transport error: {0}")]
    Transport(String),

    /// The server refused the session outright; retrying will not help
    #[error("Rejected by server: {0}")]
    Rejected(String),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON encoding/decoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket errors
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Invalid URL
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Event or player id not present in the log or roster
    #[error("Not found: {0}")]
    NotFound(String),

    /// Command not applicable to its target (e.g. rerolling an initiative)
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// Non-success response from the game server
    #[error("Request failed with status {status}: {message}")]
    Request { status: u16, message: String },
}

impl SyncError {
    /// Whether the live stream should back off and try again after this error
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            SyncError::Rejected(_) | SyncError::Config(_) | SyncError::Url(_)
        )
    }
}

/// Result type alias for sync operations
pub type SyncResult<T> = Result<T, SyncError>;
