//! Client configuration loaded from environment variables.
//!
//! Every timing constant of the reconciliation layer lives here.  All
//! settings have defaults, so a client runs with zero configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Client configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Participant list poll.
    /// Env: `DROPRAIN_PARTICIPANT_POLL_MS`, default 3000.
    pub participant_poll: Duration,

    /// Room existence and status check.
    /// Env: `DROPRAIN_ROOM_CHECK_MS`, default 2000.
    pub room_check_poll: Duration,

    /// Current-problem poll.
    /// Env: `DROPRAIN_PROBLEM_POLL_MS`, default 2000.
    pub problem_poll: Duration,

    /// Session list poll during play.
    /// Env: `DROPRAIN_SESSION_POLL_MS`, default 300.
    pub session_poll: Duration,

    /// Result screen poll.
    /// Env: `DROPRAIN_RESULT_POLL_MS`, default 500.
    pub result_poll: Duration,

    /// Delay before the result screen's first read.
    /// Env: `DROPRAIN_RESULT_DELAY_MS`, default 500.
    pub result_initial_delay: Duration,

    /// Host problem-spawn check cadence.
    /// Env: `DROPRAIN_HOST_CHECK_MS`, default 1000.
    pub host_check: Duration,

    /// Pause between clearing a stale problem and writing the next one.
    /// Env: `DROPRAIN_PROBLEM_SETTLE_MS`, default 300.
    pub problem_settle: Duration,

    /// Minimum spacing of live score writes.
    /// Env: `DROPRAIN_LIVE_SCORE_MS`, default 300.
    pub live_score_throttle: Duration,

    /// Retries for live score writes (3 attempts, 300 ms apart).
    /// Env: `DROPRAIN_LIVE_RETRY_DELAY_MS`.
    pub live_retry: RetryPolicy,

    /// Retries for the end-of-game save (5 attempts, 1 s apart).
    /// Env: `DROPRAIN_FINAL_RETRY_DELAY_MS`.
    pub final_retry: RetryPolicy,

    /// Wait after a successful final save before reporting game over.
    /// Env: `DROPRAIN_POST_SAVE_MS`, default 2000.
    pub post_save_delay: Duration,

    /// Wait after a failed final save before reporting game over.
    /// Env: `DROPRAIN_POST_SAVE_FAILURE_MS`, default 3000.
    pub post_save_failure_delay: Duration,

    /// Upper bound on the best-score update.
    /// Env: `DROPRAIN_BEST_SCORE_TIMEOUT_MS`, default 3000.
    pub best_score_timeout: Duration,

    /// Database file of the local backend; in-memory when unset.
    /// Env: `DROPRAIN_DB_PATH`.
    pub db_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            participant_poll: Duration::from_millis(3000),
            room_check_poll: Duration::from_millis(2000),
            problem_poll: Duration::from_millis(2000),
            session_poll: Duration::from_millis(300),
            result_poll: Duration::from_millis(500),
            result_initial_delay: Duration::from_millis(500),
            host_check: Duration::from_millis(1000),
            problem_settle: Duration::from_millis(300),
            live_score_throttle: Duration::from_millis(300),
            live_retry: RetryPolicy::LIVE,
            final_retry: RetryPolicy::FINAL,
            post_save_delay: Duration::from_millis(2000),
            post_save_failure_delay: Duration::from_millis(3000),
            best_score_timeout: Duration::from_millis(3000),
            db_path: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        let durations: [(&str, &mut Duration); 14] = [
            ("DROPRAIN_PARTICIPANT_POLL_MS", &mut config.participant_poll),
            ("DROPRAIN_ROOM_CHECK_MS", &mut config.room_check_poll),
            ("DROPRAIN_PROBLEM_POLL_MS", &mut config.problem_poll),
            ("DROPRAIN_SESSION_POLL_MS", &mut config.session_poll),
            ("DROPRAIN_RESULT_POLL_MS", &mut config.result_poll),
            ("DROPRAIN_RESULT_DELAY_MS", &mut config.result_initial_delay),
            ("DROPRAIN_HOST_CHECK_MS", &mut config.host_check),
            ("DROPRAIN_PROBLEM_SETTLE_MS", &mut config.problem_settle),
            ("DROPRAIN_LIVE_SCORE_MS", &mut config.live_score_throttle),
            ("DROPRAIN_LIVE_RETRY_DELAY_MS", &mut config.live_retry.delay),
            ("DROPRAIN_FINAL_RETRY_DELAY_MS", &mut config.final_retry.delay),
            ("DROPRAIN_POST_SAVE_MS", &mut config.post_save_delay),
            ("DROPRAIN_POST_SAVE_FAILURE_MS", &mut config.post_save_failure_delay),
            ("DROPRAIN_BEST_SCORE_TIMEOUT_MS", &mut config.best_score_timeout),
        ];

        for (key, slot) in durations {
            let Some(raw) = lookup(key) else { continue };
            match raw.trim().parse::<u64>() {
                Ok(ms) => *slot = Duration::from_millis(ms),
                Err(e) => {
                    tracing::warn!(key, value = %raw, error = %e, "invalid duration, using default");
                }
            }
        }

        if let Some(path) = lookup("DROPRAIN_DB_PATH") {
            if !path.is_empty() {
                config.db_path = Some(PathBuf::from(path));
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_published_intervals() {
        let config = ClientConfig::default();
        assert_eq!(config.participant_poll, Duration::from_secs(3));
        assert_eq!(config.room_check_poll, Duration::from_secs(2));
        assert_eq!(config.session_poll, Duration::from_millis(300));
        assert_eq!(config.live_retry.attempts, 3);
        assert_eq!(config.final_retry.attempts, 5);
        assert!(config.db_path.is_none());
    }

    #[test]
    fn lookup_overrides_and_ignores_garbage() {
        let env: HashMap<&str, &str> = [
            ("DROPRAIN_SESSION_POLL_MS", "50"),
            ("DROPRAIN_ROOM_CHECK_MS", "soon"),
            ("DROPRAIN_FINAL_RETRY_DELAY_MS", "10"),
            ("DROPRAIN_DB_PATH", "/tmp/droprain.db"),
        ]
        .into_iter()
        .collect();

        let config = ClientConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.session_poll, Duration::from_millis(50));
        assert_eq!(config.room_check_poll, Duration::from_secs(2));
        assert_eq!(config.final_retry.delay, Duration::from_millis(10));
        assert_eq!(config.final_retry.attempts, 5);
        assert_eq!(config.db_path, Some(PathBuf::from("/tmp/droprain.db")));
    }
}
