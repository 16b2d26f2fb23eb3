// Restart loop around follower sessions.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::RestartConfig;
use crate::follower::{PlaylistFollower, SessionEnd};
use crate::FollowerError;

/// Re-opens a playlist whenever a follower session fails.
pub struct Supervisor {
    follower: Arc<PlaylistFollower>,
    restart_config: RestartConfig,
}

impl Supervisor {
    pub fn new(follower: Arc<PlaylistFollower>) -> Self {
        let restart_config = follower.config().restart_config.clone();
        Self {
            follower,
            restart_config,
        }
    }

    /// Run sessions until one ends cleanly, `cancel` fires, or the restart
    /// budget is spent. In the last case the final session error is returned.
    pub async fn run(&self, url: &str, cancel: &CancellationToken) -> Result<SessionEnd, FollowerError> {
        let policy = self.restart_config.policy;
        let mut restarts: u32 = 0;
        // Failed openings in a row; a session that opened resets the backoff.
        let mut consecutive_failures: u32 = 0;

        loop {
            let outcome = self.follower.run_tracked_session(url, cancel).await;
            let err = match outcome.result {
                Ok(end) => {
                    info!(url, ?end, restarts, "Follower stopped");
                    return Ok(end);
                }
                Err(e) => e,
            };

            if outcome.opened {
                consecutive_failures = 0;
            } else {
                consecutive_failures = consecutive_failures.saturating_add(1);
            }

            if let Some(max_restarts) = self.restart_config.max_restarts {
                if restarts >= max_restarts {
                    error!(url, restarts, error = %err, "Restart limit reached, giving up");
                    return Err(err);
                }
            }
            restarts += 1;

            let delay = policy.delay_for(consecutive_failures);
            warn!(
                url,
                restart = restarts,
                delay = ?delay,
                error = %err,
                "Session ended, restarting"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(url, "Cancelled while waiting to restart");
                    return Ok(SessionEnd::Cancelled);
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
