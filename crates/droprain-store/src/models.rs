//! Row structs for every table, plus the column codecs shared by the CRUD
//! modules.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can travel on the
//! change feed and be handed to the client layer unchanged.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use droprain_shared::{Difficulty, Problem, RoomId, RoomStatus, SessionId, UserId};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// Public profile of a player.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    /// Unique display name.
    pub nickname: String,
    /// Highest session score ever saved.  Never decreases.
    pub best_score: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Auth account
// ---------------------------------------------------------------------------

/// Credential record kept apart from the public profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthAccount {
    pub user_id: UserId,
    pub email: String,
    /// Hex-encoded random salt.
    pub salt: String,
    /// Hex-encoded BLAKE3 digest of salt and password.
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

/// A shared multiplayer room.  The current problem is embedded in the row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Room {
    pub id: RoomId,
    pub room_code: String,
    pub host_id: UserId,
    pub difficulty: Difficulty,
    pub custom_tables: Option<Vec<u32>>,
    pub status: RoomStatus,
    pub max_players: u32,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub current_problem: Option<Problem>,
    pub problem_created_at: Option<DateTime<Utc>>,
}

impl Room {
    pub fn is_host(&self, user: UserId) -> bool {
        self.host_id == user
    }

    /// Tables problems for this room are drawn from.
    pub fn tables(&self) -> Vec<u32> {
        self.difficulty.resolve_tables(self.custom_tables.as_deref())
    }
}

/// Fields a client supplies when creating a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRoom {
    pub room_code: String,
    pub host_id: UserId,
    pub difficulty: Difficulty,
    pub custom_tables: Option<Vec<u32>>,
    pub max_players: u32,
}

// ---------------------------------------------------------------------------
// Participant
// ---------------------------------------------------------------------------

/// Join record linking a room and a user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Participant {
    pub id: Uuid,
    pub room_id: RoomId,
    pub user_id: UserId,
    /// Joined in from `users`; `None` when the profile is missing.
    pub nickname: Option<String>,
    pub joined_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Game session
// ---------------------------------------------------------------------------

/// Score record of one game: per (room, user) in multiplayer, standalone in
/// single-player.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameSession {
    pub id: SessionId,
    pub room_id: Option<RoomId>,
    pub user_id: UserId,
    /// Joined in from `users`; `None` when the profile is missing.
    pub nickname: Option<String>,
    pub score: u32,
    pub correct_count: u32,
    pub total_count: u32,
    /// Percentage in `0.0..=100.0`.
    pub accuracy: f64,
    pub difficulty: Difficulty,
    pub played_at: DateTime<Utc>,
}

/// Fields of a session row being inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSession {
    pub room_id: Option<RoomId>,
    pub user_id: UserId,
    pub score: u32,
    pub correct_count: u32,
    pub total_count: u32,
    pub accuracy: f64,
    pub difficulty: Difficulty,
    pub played_at: DateTime<Utc>,
}

/// Mutable fields of an existing session row.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionUpdate {
    pub score: u32,
    pub correct_count: u32,
    pub total_count: u32,
    pub accuracy: f64,
    pub played_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Column codecs
// ---------------------------------------------------------------------------

/// Timestamps are stored with a fixed number of fractional digits so that
/// text ordering matches time ordering.
pub(crate) fn encode_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion(idx, e))
}

pub(crate) fn decode_uuid(idx: usize, raw: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| conversion(idx, e))
}

pub(crate) fn decode_difficulty(idx: usize, raw: &str) -> rusqlite::Result<Difficulty> {
    Difficulty::parse(raw).ok_or_else(|| conversion(idx, invalid("difficulty", raw)))
}

pub(crate) fn decode_status(idx: usize, raw: &str) -> rusqlite::Result<RoomStatus> {
    RoomStatus::parse(raw).ok_or_else(|| conversion(idx, invalid("status", raw)))
}

pub(crate) fn decode_json<T: serde::de::DeserializeOwned>(
    idx: usize,
    raw: &str,
) -> rusqlite::Result<T> {
    serde_json::from_str(raw).map_err(|e| conversion(idx, e))
}

fn invalid(column: &'static str, value: &str) -> crate::StoreError {
    crate::StoreError::InvalidValue {
        column,
        value: value.to_string(),
    }
}

fn conversion<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn encoded_timestamps_sort_like_time() {
        let a = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 9).unwrap();
        let b = a + chrono::Duration::milliseconds(1500);
        assert!(encode_ts(&a) < encode_ts(&b));
        assert_eq!(decode_ts(0, &encode_ts(&b)).unwrap(), b);
    }

    #[test]
    fn unknown_status_is_a_conversion_failure() {
        let err = decode_status(5, "deleted").unwrap_err();
        assert!(matches!(err, rusqlite::Error::FromSqlConversionFailure(5, _, _)));
    }
}
