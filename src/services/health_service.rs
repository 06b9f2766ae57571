use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report whether the listing store is reachable, logging connectivity issues.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    if let Err(err) = state.store().health_check().await {
        warn!(error = %err, "storage health check failed");
        return HealthResponse::degraded();
    }

    if state.is_degraded() {
        HealthResponse::degraded()
    } else {
        HealthResponse::ok()
    }
}
