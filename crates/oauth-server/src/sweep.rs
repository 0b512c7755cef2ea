//! Background removal of expired codes and tokens
//!
//! Expiry is always checked when a credential is presented; this task only
//! keeps abandoned codes and tokens from accumulating in memory.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::store::{CredentialStore, now_secs};

/// Spawn a task that purges expired records every `interval`.
pub fn spawn_sweep_task(
    store: Arc<dyn CredentialStore>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // Skip the immediate first tick, the store starts empty
        ticker.tick().await;

        loop {
            ticker.tick().await;
            sweep_once(store.as_ref()).await;
        }
    })
}

async fn sweep_once(store: &dyn CredentialStore) -> usize {
    let purged = store.purge_expired(now_secs()).await;
    if purged > 0 {
        info!(purged, "purged expired credentials");
    } else {
        debug!("sweep found nothing to purge");
    }
    purged
}
