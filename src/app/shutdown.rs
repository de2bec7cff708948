//! Graceful shutdown handling.

use std::sync::Arc;
use std::time::Duration;

use crate::filter::GeoIpFilter;

const RECLAIM_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Waits for every other holder of `filter` to let go, then returns the
/// stage so it can be shut down.
///
/// Blocking workers abandoned by a failed run still hold clones until their
/// current record is done. Gives up after `grace` and hands the shared
/// handle back.
pub async fn reclaim_filter(
    mut filter: Arc<GeoIpFilter>,
    grace: Duration,
) -> Result<GeoIpFilter, Arc<GeoIpFilter>> {
    let deadline = tokio::time::Instant::now() + grace;
    loop {
        match Arc::try_unwrap(filter) {
            Ok(filter) => return Ok(filter),
            Err(shared) if tokio::time::Instant::now() >= deadline => return Err(shared),
            Err(shared) => filter = shared,
        }
        tokio::time::sleep(RECLAIM_POLL_INTERVAL).await;
    }
}
