/// HTTP implementation of the game server API
use crate::{
    api::{
        EventSubmission, GameServer, HistoryPage, JoinRequest, RequestOutcome, SubmissionAccepted,
    },
    config::ClientConfig,
    error::{SyncError, SyncResult},
    event::EventId,
    metrics,
    session::Session,
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::time::Instant;
use tracing::debug;
use url::Url;

/// Game server client over HTTP
#[derive(Clone)]
pub struct GameApi {
    http_client: Client,
    base_url: Url,
}

impl GameApi {
    /// Create a new API client
    pub fn new(config: &ClientConfig) -> SyncResult<Self> {
        let http_client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| SyncError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, String> {
        self.base_url
            .join(path)
            .map_err(|e| format!("Invalid endpoint {}: {}", path, e))
    }

    fn event_endpoint(&self, id: EventId, suffix: &str) -> Result<Url, String> {
        self.endpoint(&format!("game/events/{}{}", id, suffix))
    }

    /// Send a request and decode a JSON body on success
    async fn send_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: RequestBuilder,
    ) -> RequestOutcome<T> {
        let started = Instant::now();
        let outcome = match request.send().await {
            Ok(response) => decode_json(response).await,
            Err(e) => RequestOutcome::NetworkError(e.to_string()),
        };
        metrics::record_request(endpoint, outcome.label(), started.elapsed().as_secs_f64());
        debug!("{} -> {}", endpoint, outcome.label());
        outcome
    }

    /// Send a request whose success body is ignored
    async fn send_empty(&self, endpoint: &str, request: RequestBuilder) -> RequestOutcome<()> {
        let started = Instant::now();
        let outcome = match request.send().await {
            Ok(response) => match error_outcome(response).await {
                Ok(_) => RequestOutcome::Success(()),
                Err(failure) => failure,
            },
            Err(e) => RequestOutcome::NetworkError(e.to_string()),
        };
        metrics::record_request(endpoint, outcome.label(), started.elapsed().as_secs_f64());
        debug!("{} -> {}", endpoint, outcome.label());
        outcome
    }
}

/// Split a response into a successful response or a failed outcome
async fn error_outcome<T>(response: Response) -> Result<Response, RequestOutcome<T>> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .text()
        .await
        .unwrap_or_else(|e| format!("<unreadable body: {}>", e));
    let status = status.as_u16();
    if (400..500).contains(&status) {
        Err(RequestOutcome::ClientError { status, message })
    } else {
        Err(RequestOutcome::ServerError { status, message })
    }
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> RequestOutcome<T> {
    match error_outcome(response).await {
        Ok(response) => match response.json::<T>().await {
            Ok(body) => RequestOutcome::Success(body),
            Err(e) => RequestOutcome::NetworkError(format!("Invalid response body: {}", e)),
        },
        Err(failure) => failure,
    }
}

/// History query parameters
fn history_query(newest: Option<EventId>) -> Vec<(&'static str, String)> {
    newest
        .map(|id| vec![("newest", id.to_string())])
        .unwrap_or_default()
}

#[async_trait]
impl GameServer for GameApi {
    async fn join_game(&self, request: &JoinRequest) -> RequestOutcome<Session> {
        let url = match self.endpoint("game/join") {
            Ok(url) => url,
            Err(e) => return RequestOutcome::NetworkError(e),
        };
        self.send_json("join", self.http_client.post(url).json(request))
            .await
    }

    async fn fetch_history(
        &self,
        session: &Session,
        newest: Option<EventId>,
    ) -> RequestOutcome<HistoryPage> {
        let url = match self.endpoint("game/events") {
            Ok(url) => url,
            Err(e) => return RequestOutcome::NetworkError(e),
        };
        let request = self
            .http_client
            .get(url)
            .bearer_auth(&session.token)
            .query(&history_query(newest));
        self.send_json("history", request).await
    }

    async fn submit_event(
        &self,
        session: &Session,
        submission: &EventSubmission,
    ) -> RequestOutcome<SubmissionAccepted> {
        let url = match self.endpoint("game/roll") {
            Ok(url) => url,
            Err(e) => return RequestOutcome::NetworkError(e),
        };
        let request = self
            .http_client
            .post(url)
            .bearer_auth(&session.token)
            .json(submission);
        self.send_json("submit", request).await
    }

    async fn update_event(
        &self,
        session: &Session,
        id: EventId,
        diff: &Map<String, Value>,
    ) -> RequestOutcome<()> {
        let url = match self.event_endpoint(id, "") {
            Ok(url) => url,
            Err(e) => return RequestOutcome::NetworkError(e),
        };
        let request = self
            .http_client
            .patch(url)
            .bearer_auth(&session.token)
            .json(diff);
        self.send_empty("update", request).await
    }

    async fn delete_event(&self, session: &Session, id: EventId) -> RequestOutcome<()> {
        let url = match self.event_endpoint(id, "") {
            Ok(url) => url,
            Err(e) => return RequestOutcome::NetworkError(e),
        };
        let request = self.http_client.delete(url).bearer_auth(&session.token);
        self.send_empty("delete", request).await
    }

    async fn reroll_event(
        &self,
        session: &Session,
        id: EventId,
        reroll: &[u8],
    ) -> RequestOutcome<()> {
        let url = match self.event_endpoint(id, "/reroll") {
            Ok(url) => url,
            Err(e) => return RequestOutcome::NetworkError(e),
        };
        let request = self
            .http_client
            .post(url)
            .bearer_auth(&session.token)
            .json(&json!({ "reroll": reroll }));
        self.send_empty("reroll", request).await
    }

    async fn seize_initiative(&self, session: &Session, id: EventId) -> RequestOutcome<()> {
        let url = match self.event_endpoint(id, "/seize") {
            Ok(url) => url,
            Err(e) => return RequestOutcome::NetworkError(e),
        };
        let request = self.http_client.post(url).bearer_auth(&session.token);
        self.send_empty("seize", request).await
    }

    async fn logout(&self, session: &Session) -> RequestOutcome<()> {
        let url = match self.endpoint("auth/logout") {
            Ok(url) => url,
            Err(e) => return RequestOutcome::NetworkError(e),
        };
        let request = self.http_client.post(url).bearer_auth(&session.token);
        self.send_empty("logout", request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api() -> GameApi {
        let config = ClientConfig {
            base_url: Url::parse("https://rolls.example.com/").unwrap(),
            ..ClientConfig::default()
        };
        GameApi::new(&config).unwrap()
    }

    #[test]
    fn test_endpoints_join_base_url() {
        let api = api();
        assert_eq!(
            api.endpoint("game/events").unwrap().as_str(),
            "https://rolls.example.com/game/events"
        );
        assert_eq!(
            api.event_endpoint(42, "/reroll").unwrap().as_str(),
            "https://rolls.example.com/game/events/42/reroll"
        );
    }

    #[test]
    fn test_history_query_omits_newest_for_latest_page() {
        assert!(history_query(None).is_empty());
        assert_eq!(history_query(Some(77)), vec![("newest", "77".to_string())]);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        let config = ClientConfig {
            base_url: Url::parse("http://127.0.0.1:9/").unwrap(),
            ..ClientConfig::default()
        };
        let api = GameApi::new(&config).unwrap();
        let session = Session::new("t", "g", "p", "n");
        let outcome = api.fetch_history(&session, None).await;
        assert!(matches!(outcome, RequestOutcome::NetworkError(_)));
    }
}
