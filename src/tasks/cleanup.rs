//! Expiry Reaper Task
//!
//! Background task that periodically drops expired entries. Reads already
//! treat expired entries as misses; the reaper only reclaims their space.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::adapter::Adapter;

/// Spawns a background task that calls [`Adapter::purge_expired`] every
/// `cleanup_interval_secs` seconds.
///
/// The purge itself runs on the blocking pool. Abort the returned handle
/// during shutdown.
///
/// # Example
/// ```ignore
/// let cleanup_handle = spawn_cleanup_task(adapter.clone(), 60);
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task(adapter: Arc<dyn Adapter>, cleanup_interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting expiry reaper with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            let target = Arc::clone(&adapter);
            match tokio::task::spawn_blocking(move || target.purge_expired()).await {
                Ok(Ok(0)) => debug!("Expiry reaper: no expired entries found"),
                Ok(Ok(removed)) => info!("Expiry reaper: removed {} expired entries", removed),
                Ok(Err(e)) => warn!(error = %e, "Expiry reaper: purge failed"),
                Err(e) => warn!(error = %e, "Expiry reaper: purge task did not complete"),
            }
        }
    })
}
