use mongodb::{Client, Database, bson::doc};
use tokio::time::sleep;
use tracing::debug;

use super::{
    config::{ConnectRetry, MongoConfig},
    error::{MongoDaoError, MongoResult},
};

/// Build a client for `config` and wait until the server answers a ping,
/// following `retry`.
pub async fn establish_connection(
    config: &MongoConfig,
    retry: ConnectRetry,
) -> MongoResult<(Client, Database)> {
    let client = Client::with_options(config.options.clone())
        .map_err(|source| MongoDaoError::ClientConstruction { source })?;
    let database = client.database(&config.database_name);

    let mut attempts = 0;
    let mut delay = retry.initial_delay;

    loop {
        match database.run_command(doc! { "ping": 1 }).await {
            Ok(_) => break,
            Err(err) => {
                attempts += 1;
                if attempts >= retry.max_attempts {
                    return Err(MongoDaoError::InitialPing {
                        attempts,
                        source: err,
                    });
                }
                debug!(
                    attempts,
                    max_attempts = retry.max_attempts,
                    database = %config.database_name,
                    error = %err,
                    "MongoDB not reachable yet; retrying"
                );
                sleep(delay).await;
                delay = retry.next_delay(delay);
            }
        }
    }

    Ok((client, database))
}
