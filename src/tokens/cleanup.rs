//! Background purge of expired token rows

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::service::TokenService;

/// Spawn a task that deletes expired refresh, reset and verify-email rows every `period`.
pub fn start_cleanup_task(tokens: Arc<TokenService>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            match tokens.purge_expired().await {
                Ok(0) => debug!("Token cleanup found nothing to purge"),
                Ok(purged) => info!(purged = purged, "Purged expired tokens"),
                Err(e) => error!(error = %e, "Expired token cleanup failed"),
            }
        }
    })
}
