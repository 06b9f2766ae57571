use std::time::Duration;

use mongodb::options::ClientOptions;
use tracing::warn;

use super::error::{MongoDaoError, MongoResult};

const DEFAULT_DATABASE: &str = "pickup_games";
const DEFAULT_CONNECT_ATTEMPTS: u32 = 10;

/// How long to keep pinging a freshly built client before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectRetry {
    /// Pings attempted before the connection counts as failed.
    pub max_attempts: u32,
    /// Pause after the first failed ping.
    pub initial_delay: Duration,
    /// Upper bound for the doubling pause.
    pub max_delay: Duration,
}

impl Default for ConnectRetry {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_CONNECT_ATTEMPTS,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl ConnectRetry {
    /// One ping, no waiting. The storage supervisor runs its own backoff around reconnects.
    pub fn single() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub(super) fn next_delay(&self, current: Duration) -> Duration {
        (current * 2).min(self.max_delay)
    }
}

/// Connection settings for the MongoDB listing store.
#[derive(Clone)]
pub struct MongoConfig {
    /// Parsed driver options, including the hosts from the URI.
    pub options: ClientOptions,
    /// Database holding the `listings` collection.
    pub database_name: String,
    /// Ping policy applied on the first connect.
    pub connect_retry: ConnectRetry,
}

impl MongoConfig {
    /// Parse `uri` and target `db_name`, or the default database.
    pub async fn from_uri(uri: &str, db_name: Option<&str>) -> MongoResult<Self> {
        let database_name = db_name.unwrap_or(DEFAULT_DATABASE).to_owned();
        let options =
            ClientOptions::parse(uri)
                .await
                .map_err(|source| MongoDaoError::InvalidUri {
                    uri: uri.to_owned(),
                    source,
                })?;

        Ok(Self {
            options,
            database_name,
            connect_retry: ConnectRetry::default(),
        })
    }

    /// Read `MONGO_URI` (required), `MONGO_DB` and `MONGO_CONNECT_ATTEMPTS` (optional).
    pub async fn from_env() -> MongoResult<Self> {
        let uri = std::env::var("MONGO_URI")
            .map_err(|_| MongoDaoError::MissingEnvVar { var: "MONGO_URI" })?;
        let db = std::env::var("MONGO_DB").ok();
        let config = Self::from_uri(&uri, db.as_deref()).await?;
        Ok(config.with_connect_attempts(std::env::var("MONGO_CONNECT_ATTEMPTS").ok()))
    }

    fn with_connect_attempts(mut self, value: Option<String>) -> Self {
        let Some(value) = value else {
            return self;
        };
        match value.parse::<u32>() {
            Ok(attempts) if attempts > 0 => self.connect_retry.max_attempts = attempts,
            _ => warn!(%value, "ignoring invalid MONGO_CONNECT_ATTEMPTS"),
        }
        self
    }
}
