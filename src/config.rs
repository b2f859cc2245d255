/// Configuration management for rollsync
use crate::error::{SyncError, SyncResult};
use crate::stream::{BackoffSchedule, RETRY_DELAYS, RETRY_MAX};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Main client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Game server base URL; the live stream URL is derived from it
    pub base_url: Url,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub game: GameConfig,
    pub retry: RetryConfig,
    pub logging: LoggingConfig,
}

/// Game to join on startup, if any
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameConfig {
    pub game_id: Option<String>,
    pub player_name: Option<String>,
    /// Reuse an existing session instead of joining
    pub session_token: Option<String>,
    pub player_id: Option<String>,
}

/// Live stream reconnection schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Delay in seconds before retry N, for N below the list length
    pub delays_secs: Vec<u64>,
    /// Delay in seconds for every later retry
    pub max_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directives, from `RUST_LOG`
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl LoggingConfig {
    /// Filter for the tracing subscriber; bad directives fall back to the default
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.level).unwrap_or_else(|e| {
            eprintln!("Ignoring invalid log filter `{}`: {}", self.level, e);
            EnvFilter::new(DEFAULT_LOG_LEVEL)
        })
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            delays_secs: RETRY_DELAYS.iter().map(Duration::as_secs).collect(),
            max_secs: RETRY_MAX.as_secs(),
        }
    }
}

impl RetryConfig {
    pub fn schedule(&self) -> BackoffSchedule {
        BackoffSchedule::new(
            self.delays_secs.iter().copied().map(Duration::from_secs).collect(),
            Duration::from_secs(self.max_secs),
        )
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid"),
            user_agent: format!("rollsync/{}", env!("CARGO_PKG_VERSION")),
            request_timeout_secs: 10,
            game: GameConfig::default(),
            retry: RetryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

const DEFAULT_BASE_URL: &str = "http://localhost:3001/";
const DEFAULT_LOG_LEVEL: &str = "rollsync=debug";

impl ClientConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> SyncResult<Self> {
        dotenv::dotenv().ok();

        let base_url = env::var("ROLLSYNC_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let base_url = parse_base_url(&base_url)?;

        let user_agent = env::var("ROLLSYNC_USER_AGENT")
            .unwrap_or_else(|_| format!("rollsync/{}", env!("CARGO_PKG_VERSION")));
        let request_timeout_secs = env::var("ROLLSYNC_REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .map_err(|_| SyncError::Config("Invalid request timeout".to_string()))?;

        let game = GameConfig {
            game_id: non_empty_var("ROLLSYNC_GAME_ID"),
            player_name: non_empty_var("ROLLSYNC_PLAYER_NAME"),
            session_token: non_empty_var("ROLLSYNC_SESSION_TOKEN"),
            player_id: non_empty_var("ROLLSYNC_PLAYER_ID"),
        };

        let retry = RetryConfig {
            delays_secs: match env::var("ROLLSYNC_RETRY_DELAYS") {
                Ok(list) => parse_delay_list(&list)?,
                Err(_) => RetryConfig::default().delays_secs,
            },
            max_secs: env::var("ROLLSYNC_RETRY_MAX_SECS")
                .unwrap_or_else(|_| RETRY_MAX.as_secs().to_string())
                .parse()
                .map_err(|_| SyncError::Config("Invalid retry maximum".to_string()))?,
        };

        let level = env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string());

        let config = ClientConfig {
            base_url,
            user_agent,
            request_timeout_secs,
            game,
            retry,
            logging: LoggingConfig { level },
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> SyncResult<()> {
        if !matches!(self.base_url.scheme(), "http" | "https") {
            return Err(SyncError::Config(format!(
                "Base URL must be http or https, got {}",
                self.base_url.scheme()
            )));
        }

        if self.request_timeout_secs == 0 {
            return Err(SyncError::Config(
                "Request timeout must be at least one second".to_string(),
            ));
        }

        if self.retry.delays_secs.is_empty() {
            return Err(SyncError::Config("Retry schedule cannot be empty".to_string()));
        }

        if self.game.session_token.is_some() && self.game.player_id.is_none() {
            return Err(SyncError::Config(
                "A session token needs ROLLSYNC_PLAYER_ID".to_string(),
            ));
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Parse the base URL, making sure relative endpoint joins keep its path
fn parse_base_url(raw: &str) -> SyncResult<Url> {
    let with_slash = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{}/", raw)
    };
    Ok(Url::parse(&with_slash)?)
}

fn parse_delay_list(list: &str) -> SyncResult<Vec<u64>> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse()
                .map_err(|_| SyncError::Config(format!("Invalid retry delay `{}`", s)))
        })
        .collect()
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ClientConfig::default();
        config.validate().unwrap();
        assert_eq!(config.retry.delays_secs, vec![2, 2, 4, 4, 8, 8, 16, 16]);
        assert_eq!(config.retry.max_secs, 32);
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_base_url_keeps_path_prefix() {
        let url = parse_base_url("https://example.com/roller").unwrap();
        assert_eq!(url.join("game/events").unwrap().as_str(), "https://example.com/roller/game/events");
    }

    #[test]
    fn test_parse_delay_list() {
        assert_eq!(parse_delay_list("1, 2,3").unwrap(), vec![1, 2, 3]);
        assert!(parse_delay_list("1,x").is_err());
    }

    #[test]
    fn test_validation_failures() {
        let mut config = ClientConfig::default();
        config.retry.delays_secs.clear();
        assert!(config.validate().is_err());

        let mut config = ClientConfig::default();
        config.request_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = ClientConfig::default();
        config.base_url = Url::parse("ftp://example.com/").unwrap();
        assert!(config.validate().is_err());

        let mut config = ClientConfig::default();
        config.game.session_token = Some("tok".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serializes_base_url_as_string() {
        let config = ClientConfig::default();
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["base_url"], "http://localhost:3001/");
        assert_eq!(value["logging"]["level"], DEFAULT_LOG_LEVEL);
        let back: ClientConfig = serde_json::from_value(value).unwrap();
        assert_eq!(back.base_url, config.base_url);
    }

    #[test]
    fn test_log_filter_falls_back_on_bad_directives() {
        use tracing::level_filters::LevelFilter;

        let logging = LoggingConfig {
            level: "rollsync=warn".to_string(),
        };
        assert_eq!(logging.env_filter().max_level_hint(), Some(LevelFilter::WARN));
        let logging = LoggingConfig {
            level: "rollsync=loud".to_string(),
        };
        assert_eq!(logging.env_filter().max_level_hint(), Some(LevelFilter::DEBUG));
    }

    #[test]
    fn test_config_from_env() {
        std::env::set_var("ROLLSYNC_BASE_URL", "https://rolls.example.com");
        std::env::set_var("ROLLSYNC_GAME_ID", "ABCD");
        std::env::set_var("ROLLSYNC_RETRY_DELAYS", "1,1,3");

        let config = ClientConfig::from_env().unwrap();
        assert_eq!(config.base_url.as_str(), "https://rolls.example.com/");
        assert_eq!(config.game.game_id.as_deref(), Some("ABCD"));
        assert_eq!(config.retry.delays_secs, vec![1, 1, 3]);

        // Cleanup
        std::env::remove_var("ROLLSYNC_BASE_URL");
        std::env::remove_var("ROLLSYNC_GAME_ID");
        std::env::remove_var("ROLLSYNC_RETRY_DELAYS");
    }
}
