use std::time::Duration;

use thiserror::Error;

const DEFAULT_API_URL: &str = "https://api.telegram.org";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_LONG_POLL_SECS: u64 = 25;

/// Configuration that cannot be read from the environment.
#[derive(Debug, Error)]
pub enum TelegramConfigError {
    #[error("missing Telegram environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
}

/// Runtime configuration describing how to reach the Bot API.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    /// Bot token issued by BotFather.
    pub token: String,
    /// Base URL of the Bot API server.
    pub api_url: String,
    /// Timeout for regular calls.
    pub request_timeout: Duration,
    /// Server-side wait used by `getUpdates` long polling.
    pub long_poll_secs: u64,
}

impl TelegramConfig {
    /// Configuration for the public Bot API with default timeouts.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_url: DEFAULT_API_URL.to_owned(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            long_poll_secs: DEFAULT_LONG_POLL_SECS,
        }
    }

    /// Point the client at another Bot API server (e.g. a local one).
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// Build a configuration from `TELEGRAM_BOT_TOKEN` and the optional `TELEGRAM_API_URL`.
    pub fn from_env() -> Result<Self, TelegramConfigError> {
        let token = std::env::var("TELEGRAM_BOT_TOKEN").map_err(|_| {
            TelegramConfigError::MissingEnvVar {
                var: "TELEGRAM_BOT_TOKEN",
            }
        })?;

        let mut config = Self::new(token);
        if let Some(api_url) = std::env::var("TELEGRAM_API_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
        {
            config = config.with_api_url(api_url);
        }
        Ok(config)
    }

    /// Base URL every method name is appended to.
    pub(super) fn method_base(&self) -> String {
        format!("{}/bot{}", self.api_url.trim_end_matches('/'), self.token)
    }
}
