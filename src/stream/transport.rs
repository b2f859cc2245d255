/// Live stream transport
///
/// The game server pushes `event` and `update` messages over a WebSocket.
/// Each text frame is a JSON envelope `{"event": <channel>, "data": <json text>}`.
use crate::error::{SyncError, SyncResult};
use crate::metrics;
use crate::protocol::{StreamMessage, EVENT_CHANNEL};
use crate::session::Session;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures_util::StreamExt;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        self,
        client::IntoClientRequest,
        http::{header::AUTHORIZATION, HeaderValue},
        Message,
    },
};
use tracing::{debug, info, warn};
use url::Url;

/// Messages from one open stream. The stream ends when the server closes
/// the connection; an `Err` item means the connection failed.
pub type MessageStream = BoxStream<'static, SyncResult<StreamMessage>>;

/// Opens live streams for a session
#[async_trait]
pub trait StreamTransport: Send + Sync {
    /// Open a stream. `retries` is passed to the server for its bookkeeping.
    ///
    /// Returns `SyncError::Rejected` when the server refuses the session.
    async fn open(&self, session: &Session, retries: u32) -> SyncResult<MessageStream>;
}

/// WebSocket transport against the game server
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    stream_url: Url,
}

impl WebSocketTransport {
    /// Derive the stream endpoint from the HTTP base URL
    pub fn new(base_url: &Url) -> SyncResult<Self> {
        let mut stream_url = base_url.join("game/subscription")?;
        let scheme = match stream_url.scheme() {
            "https" => "wss",
            "http" => "ws",
            other => {
                return Err(SyncError::Config(format!(
                    "Cannot derive a stream URL from scheme {}",
                    other
                )));
            }
        };
        stream_url
            .set_scheme(scheme)
            .map_err(|_| SyncError::Config(format!("Cannot switch {} to {}", stream_url, scheme)))?;

        Ok(Self { stream_url })
    }

    pub fn stream_url(&self) -> &Url {
        &self.stream_url
    }

    fn url_for(&self, retries: u32) -> Url {
        let mut url = self.stream_url.clone();
        url.query_pairs_mut()
            .append_pair("retries", &retries.to_string());
        url
    }
}

#[async_trait]
impl StreamTransport for WebSocketTransport {
    async fn open(&self, session: &Session, retries: u32) -> SyncResult<MessageStream> {
        let url = self.url_for(retries);
        info!("Connecting to live stream: {}", url);

        let mut request = url.as_str().into_client_request()?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", session.token))
            .map_err(|e| SyncError::Config(format!("Invalid session token: {}", e)))?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        let (ws_stream, _) = match connect_async(request).await {
            Ok(connected) => connected,
            Err(tungstenite::Error::Http(response)) if response.status().is_client_error() => {
                return Err(SyncError::Rejected(format!(
                    "stream upgrade refused with {}",
                    response.status()
                )));
            }
            Err(e) => return Err(e.into()),
        };

        info!("✓ Connected to live stream for game {}", session.game_id);

        // Pings are answered by tungstenite itself while the stream is read
        let messages = ws_stream.filter_map(|frame| async move {
            match frame {
                Ok(Message::Text(text)) => parse_envelope(&text).map(Ok),
                Ok(Message::Binary(data)) => match std::str::from_utf8(&data) {
                    Ok(text) => parse_envelope(text).map(Ok),
                    Err(_) => {
                        warn!("Dropping non UTF-8 binary frame");
                        None
                    }
                },
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                    Some(Ok(StreamMessage::new(EVENT_CHANNEL, "")))
                }
                Ok(Message::Close(frame)) => {
                    debug!("Live stream closed by server: {:?}", frame);
                    None
                }
                Ok(Message::Frame(_)) => None,
                Err(e) => Some(Err(SyncError::from(e))),
            }
        });

        Ok(messages.boxed())
    }
}

/// Decode one text frame; empty frames are heartbeats
fn parse_envelope(text: &str) -> Option<StreamMessage> {
    if text.trim().is_empty() {
        return Some(StreamMessage::new(EVENT_CHANNEL, ""));
    }
    match serde_json::from_str::<StreamMessage>(text) {
        Ok(message) => Some(message),
        Err(e) => {
            metrics::record_protocol_error("envelope");
            warn!("Dropping malformed stream frame: {}", e);
            None
        }
    }
}
