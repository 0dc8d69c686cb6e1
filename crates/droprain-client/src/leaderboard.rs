//! Leaderboards.
//!
//! The overall board ranks users by their stored best score.  Weekly and
//! monthly boards are computed from the sessions played in the period,
//! keeping each user's best session.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Months, Utc};
use serde::Serialize;

use droprain_shared::UserId;
use droprain_store::{BackendError, GameSession, SessionRepo, UserRepo};

use crate::error::{ClientError, Result};
use crate::SharedBackend;

pub const DEFAULT_LIMIT: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Overall,
    Weekly,
    Monthly,
}

impl Period {
    /// Start of the period ending at `now`; `None` for all time.
    pub fn since(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Overall => None,
            Self::Weekly => Some(now - Duration::days(7)),
            Self::Monthly => Some(
                now.checked_sub_months(Months::new(1))
                    .unwrap_or(now - Duration::days(30)),
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub user_id: UserId,
    pub nickname: String,
    pub best_score: u32,
}

/// Best session per user, highest first, cut to `limit`.
pub fn best_per_user(sessions: &[GameSession], limit: u32) -> Vec<LeaderboardEntry> {
    let mut best: HashMap<UserId, (String, u32)> = HashMap::new();
    let mut order = Vec::new();
    for session in sessions {
        let nickname = || session.nickname.clone().unwrap_or_else(|| session.user_id.short());
        match best.get_mut(&session.user_id) {
            Some((_, score)) if *score >= session.score => {}
            Some(entry) => *entry = (nickname(), session.score),
            None => {
                order.push(session.user_id);
                best.insert(session.user_id, (nickname(), session.score));
            }
        }
    }

    let mut rows: Vec<(UserId, String, u32)> = order
        .into_iter()
        .filter_map(|id| best.remove(&id).map(|(nick, score)| (id, nick, score)))
        .collect();
    rows.sort_by(|a, b| b.2.cmp(&a.2));

    rows.into_iter()
        .take(limit as usize)
        .enumerate()
        .map(|(i, (user_id, nickname, best_score))| LeaderboardEntry {
            rank: i as u32 + 1,
            user_id,
            nickname,
            best_score,
        })
        .collect()
}

pub struct Leaderboard {
    backend: SharedBackend,
}

impl Leaderboard {
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }

    pub async fn fetch(&self, period: Period, limit: u32) -> Result<Vec<LeaderboardEntry>> {
        let Some(since) = period.since(Utc::now()) else {
            return self.overall(limit).await;
        };
        let sessions = self.backend.list_sessions_since(since).await?;
        tracing::debug!(?period, sessions = sessions.len(), "leaderboard computed");
        Ok(best_per_user(&sessions, limit))
    }

    pub async fn overall(&self, limit: u32) -> Result<Vec<LeaderboardEntry>> {
        let users = self.backend.top_users(limit).await?;
        Ok(users
            .into_iter()
            .enumerate()
            .map(|(i, user)| LeaderboardEntry {
                rank: i as u32 + 1,
                user_id: user.id,
                nickname: user.nickname,
                best_score: user.best_score,
            })
            .collect())
    }

    pub async fn weekly(&self, limit: u32) -> Result<Vec<LeaderboardEntry>> {
        self.fetch(Period::Weekly, limit).await
    }

    pub async fn monthly(&self, limit: u32) -> Result<Vec<LeaderboardEntry>> {
        self.fetch(Period::Monthly, limit).await
    }

    /// Overall rank: one more than the number of users with a strictly
    /// higher best score.  Period ranks are not computed and return `None`.
    pub async fn my_rank(&self, user: UserId, period: Period) -> Result<Option<u32>> {
        if period != Period::Overall {
            return Ok(None);
        }
        let profile = self.backend.get_user(user).await.map_err(|e| match e {
            BackendError::NotFound => ClientError::UserNotFound,
            other => ClientError::from(other),
        })?;
        let above = self.backend.count_users_above(profile.best_score).await?;
        Ok(Some(above + 1))
    }
}
