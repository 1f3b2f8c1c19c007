use std::time::Duration;

use tracing::{info, warn};

use vista_api::AppState;

/// Background task that deletes stories past their `expires_at`.
///
/// Reads already hide expired stories; this only reclaims the rows.
pub async fn run_story_purge_loop(state: AppState, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        let db_state = state.clone();
        match tokio::task::spawn_blocking(move || db_state.db.purge_expired_stories()).await {
            Ok(Ok(count)) => {
                if count > 0 {
                    info!("Cleanup: purged {} expired stories", count);
                }
            }
            Ok(Err(e)) => warn!("Cleanup error: {}", e),
            Err(e) => warn!("Cleanup task join error: {}", e),
        }
    }
}
