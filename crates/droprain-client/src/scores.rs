//! Score reconciliation.
//!
//! Each client owns its own session row per room and keeps it current with
//! throttled upserts while playing ([`LiveScoreSync`]), then performs one
//! durable save at game end ([`finalize`]).  Reads go the other way: every
//! client pulls all rows of the room and collapses them to one row per user
//! ([`latest_per_user`]), freshest write wins.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};

use droprain_shared::scoring::{calculate_grade, session_accuracy};
use droprain_shared::{Difficulty, RoomId, UserId};
use droprain_store::{
    BackendResult, ChangeKind, GameSession, NewSession, Participant, SessionRepo, SessionUpdate,
    UserRepo,
};

use crate::config::ClientConfig;
use crate::retry::{with_timeout, RetryPolicy};
use crate::SharedBackend;

/// Notice shown when the end-of-game save could not be completed.
pub const SAVE_FAILED_NOTICE: &str =
    "Failed to save your score. Please check your network connection.";

/// Running totals of one player's game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionStats {
    pub score: u32,
    pub correct_count: u32,
    pub total_count: u32,
}

impl SessionStats {
    pub fn accuracy(&self) -> f64 {
        session_accuracy(self.correct_count, self.total_count)
    }
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Write `stats` to the (room, user) row: update it when it exists, insert it
/// otherwise.  Updates refresh `played_at`, which is what readers use to
/// pick the freshest row.
pub async fn upsert_session(
    backend: &SharedBackend,
    room: RoomId,
    user: UserId,
    difficulty: Difficulty,
    stats: SessionStats,
) -> BackendResult<GameSession> {
    let now = Utc::now();
    match backend.find_session(room, user).await? {
        Some(existing) => {
            backend
                .update_session(
                    existing.id,
                    SessionUpdate {
                        score: stats.score,
                        correct_count: stats.correct_count,
                        total_count: stats.total_count,
                        accuracy: stats.accuracy(),
                        played_at: now,
                    },
                )
                .await
        }
        None => {
            backend
                .insert_session(NewSession {
                    room_id: Some(room),
                    user_id: user,
                    score: stats.score,
                    correct_count: stats.correct_count,
                    total_count: stats.total_count,
                    accuracy: stats.accuracy(),
                    difficulty,
                    played_at: now,
                })
                .await
        }
    }
}

/// Start a fresh game in `room`: drop the user's rows from earlier games in
/// the same room, then write a zero row so other players see them at once.
pub async fn init_session(
    backend: &SharedBackend,
    room: RoomId,
    user: UserId,
    difficulty: Difficulty,
) -> BackendResult<GameSession> {
    match backend.delete_sessions(room, user).await {
        Ok(0) => {}
        Ok(removed) => tracing::debug!(room_id = %room, removed, "cleared previous sessions"),
        Err(e) => tracing::error!(room_id = %room, error = %e, "failed to clear previous sessions"),
    }
    upsert_session(backend, room, user, difficulty, SessionStats::default()).await
}

/// Throttled background writer of the local player's running score.
///
/// The game reports every change with [`LiveScoreSync::report`]; at most once
/// per throttle period, and only when the score moved, the latest totals are
/// upserted.  Failed writes are retried, logged, and written again on the
/// next tick if nothing newer arrived.
pub struct LiveScoreSync {
    tx: watch::Sender<SessionStats>,
    handle: JoinHandle<()>,
}

impl LiveScoreSync {
    pub fn spawn(
        backend: SharedBackend,
        room: RoomId,
        user: UserId,
        difficulty: Difficulty,
        config: &ClientConfig,
    ) -> Self {
        let (tx, mut rx) = watch::channel(SessionStats::default());
        let throttle = config.live_score_throttle;
        let retry = config.live_retry;

        let handle = tokio::spawn(async move {
            let mut ticker = interval(throttle);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last_score = 0;

            loop {
                ticker.tick().await;
                let stats = *rx.borrow_and_update();
                if stats.score == last_score {
                    continue;
                }

                let result = retry
                    .run("live_score", || upsert_session(&backend, room, user, difficulty, stats))
                    .await;
                match result {
                    Ok(_) => {
                        last_score = stats.score;
                        tracing::trace!(room_id = %room, score = stats.score, "live score synced");
                    }
                    // last_score stays behind so the next tick retries these totals.
                    Err(e) => tracing::error!(
                        room_id = %room,
                        score = stats.score,
                        error = %e,
                        "live score sync failed"
                    ),
                }
            }
        });

        Self { tx, handle }
    }

    pub fn report(&self, stats: SessionStats) {
        self.tx.send_replace(stats);
    }

    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for LiveScoreSync {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Outcome of [`finalize`].
#[derive(Debug, Clone, PartialEq)]
pub struct FinalSave {
    pub saved: bool,
    /// User-facing notice; set only when the save failed.
    pub notice: Option<String>,
    pub best_score_raised: bool,
}

/// Durable end-of-game save.
///
/// Upserts the final totals under the final retry policy, raises the best
/// score (bounded by the best-score timeout), then waits for the
/// post-save delay so that readers who query next see the row.
pub async fn finalize(
    backend: &SharedBackend,
    room: RoomId,
    user: UserId,
    difficulty: Difficulty,
    stats: SessionStats,
    config: &ClientConfig,
) -> FinalSave {
    let saved = config
        .final_retry
        .run("final_score", || upsert_session(backend, room, user, difficulty, stats))
        .await;

    let outcome = match saved {
        Ok(_) => {
            tracing::info!(room_id = %room, score = stats.score, "final score saved");
            FinalSave {
                saved: true,
                notice: None,
                best_score_raised: raise_best_score(backend, user, stats.score, config).await,
            }
        }
        Err(e) => {
            tracing::error!(room_id = %room, score = stats.score, error = %e, "final score save failed");
            FinalSave {
                saved: false,
                notice: Some(SAVE_FAILED_NOTICE.to_string()),
                best_score_raised: false,
            }
        }
    };

    let delay = if outcome.saved {
        config.post_save_delay
    } else {
        config.post_save_failure_delay
    };
    sleep(delay).await;
    outcome
}

/// Raise the stored best score, giving up after the configured timeout.
/// Failures are logged; the session row is already saved.
pub(crate) async fn raise_best_score(
    backend: &SharedBackend,
    user: UserId,
    score: u32,
    config: &ClientConfig,
) -> bool {
    match with_timeout(
        "best_score",
        config.best_score_timeout,
        backend.raise_best_score(user, score),
    )
    .await
    {
        Ok(raised) => {
            if raised {
                tracing::info!(user_id = %user, score, "new best score");
            }
            raised
        }
        Err(e) => {
            tracing::warn!(user_id = %user, error = %e, "best score update failed");
            false
        }
    }
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Whether `candidate` supersedes `current` for the same user: later
/// `played_at` wins, ties go to the higher score.
fn is_fresher(candidate: &GameSession, current: &GameSession) -> bool {
    match candidate.played_at.cmp(&current.played_at) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => candidate.score > current.score,
    }
}

/// Collapse rows to the freshest one per user, keeping users in order of
/// first appearance.
pub fn latest_per_user(rows: &[GameSession]) -> Vec<GameSession> {
    let mut index: HashMap<UserId, usize> = HashMap::new();
    let mut latest: Vec<GameSession> = Vec::new();

    for row in rows {
        match index.get(&row.user_id) {
            Some(&i) => {
                if is_fresher(row, &latest[i]) {
                    latest[i] = row.clone();
                }
            }
            None => {
                index.insert(row.user_id, latest.len());
                latest.push(row.clone());
            }
        }
    }
    latest
}

/// Fold one change-feed event into a per-user view.  Returns whether the
/// view changed.
pub fn merge_session_change(
    sessions: &mut Vec<GameSession>,
    kind: ChangeKind,
    row: &GameSession,
) -> bool {
    match kind {
        ChangeKind::Insert | ChangeKind::Update => {
            let Some(i) = sessions.iter().position(|s| s.user_id == row.user_id) else {
                sessions.push(row.clone());
                return true;
            };
            let current = &sessions[i];
            let stale = if current.id == row.id {
                row.played_at < current.played_at
            } else {
                !is_fresher(row, current)
            };
            if current == row || stale {
                return false;
            }
            // Feed rows carry no nickname; keep the one we have.
            let nickname = row.nickname.clone().or_else(|| current.nickname.clone());
            sessions[i] = GameSession {
                nickname,
                ..row.clone()
            };
            true
        }
        ChangeKind::Delete => {
            let before = sessions.len();
            sessions.retain(|s| s.id != row.id);
            sessions.len() != before
        }
    }
}

/// One line of the result screen.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedResult {
    pub rank: usize,
    pub user_id: UserId,
    pub nickname: String,
    pub score: u32,
    pub accuracy: f64,
    pub correct_count: u32,
    pub total_count: u32,
    /// 1-5 stars.
    pub grade: u8,
}

/// Rank the freshest row of every user: score descending, then accuracy
/// descending.
pub fn rank_results(rows: &[GameSession]) -> Vec<RankedResult> {
    let mut latest = latest_per_user(rows);
    latest.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| b.accuracy.partial_cmp(&a.accuracy).unwrap_or(Ordering::Equal))
    });

    latest
        .into_iter()
        .enumerate()
        .map(|(i, s)| RankedResult {
            rank: i + 1,
            user_id: s.user_id,
            nickname: s.nickname.unwrap_or_else(|| s.user_id.short()),
            score: s.score,
            accuracy: s.accuracy,
            correct_count: s.correct_count,
            total_count: s.total_count,
            grade: calculate_grade(s.score),
        })
        .collect()
}

/// One line of the in-game scoreboard.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreboardEntry {
    pub user_id: UserId,
    pub nickname: String,
    pub score: u32,
    pub is_me: bool,
}

/// Live scoreboard over the room's participants.  The local player's own
/// score comes from `my_score`, which is never older than their row.
pub fn scoreboard(
    participants: &[Participant],
    sessions: &[GameSession],
    me: UserId,
    my_score: u32,
) -> Vec<ScoreboardEntry> {
    let latest = latest_per_user(sessions);
    let mut entries: Vec<ScoreboardEntry> = participants
        .iter()
        .map(|p| {
            let is_me = p.user_id == me;
            let score = if is_me {
                my_score
            } else {
                latest
                    .iter()
                    .find(|s| s.user_id == p.user_id)
                    .map_or(0, |s| s.score)
            };
            ScoreboardEntry {
                user_id: p.user_id,
                nickname: p.nickname.clone().unwrap_or_else(|| p.user_id.short()),
                score,
                is_me,
            }
        })
        .collect();

    entries.sort_by(|a, b| b.score.cmp(&a.score));
    entries
}

/// Result-screen poller: re-reads the room's sessions and republishes the
/// ranking whenever it changes, until dropped.
pub struct ResultBoard {
    rx: watch::Receiver<Vec<RankedResult>>,
    handle: JoinHandle<()>,
}

impl ResultBoard {
    pub fn spawn(backend: SharedBackend, room: RoomId, config: &ClientConfig) -> Self {
        let (tx, rx) = watch::channel(Vec::new());
        let initial_delay = config.result_initial_delay;
        let period = config.result_poll;

        let handle = tokio::spawn(async move {
            sleep(initial_delay).await;
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                match backend.list_room_sessions(room).await {
                    Ok(rows) => {
                        let ranked = rank_results(&rows);
                        tx.send_if_modified(|current| {
                            if *current == ranked {
                                false
                            } else {
                                *current = ranked;
                                true
                            }
                        });
                    }
                    Err(e) => tracing::warn!(room_id = %room, error = %e, "result poll failed"),
                }
            }
        });

        Self { rx, handle }
    }

    pub fn current(&self) -> Vec<RankedResult> {
        self.rx.borrow().clone()
    }

    /// Wait for the next change of the ranking.
    pub async fn changed(&mut self) -> Option<Vec<RankedResult>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}

impl Drop for ResultBoard {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
