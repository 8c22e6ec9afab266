/// Background maintenance jobs
use crate::context::AppContext;
use std::time::Duration;

const MAINTENANCE_INTERVAL_SECS: u64 = 3600;

/// Spawn the periodic maintenance loop: purges expired sessions and
/// abandoned signups every hour.
pub fn start(ctx: AppContext) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(MAINTENANCE_INTERVAL_SECS));
        // First tick fires immediately, cleaning up anything left over
        // from before the last shutdown
        loop {
            interval.tick().await;

            match ctx.accounts.cleanup_expired_sessions().await {
                Ok(n) if n > 0 => tracing::info!(purged = n, "Purged expired sessions"),
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Session cleanup failed"),
            }

            match ctx.accounts.cleanup_abandoned_signups().await {
                Ok(n) if n > 0 => tracing::info!(purged = n, "Purged abandoned signups"),
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Pending signup cleanup failed"),
            }
        }
    });
}
