//! Repository traits - what the client layer expects from a hosted backend.
//!
//! The client only ever talks to these traits.  [`LocalBackend`] implements
//! them over SQLite; an adapter for a hosted service would implement the same
//! set.
//!
//! [`LocalBackend`]: crate::LocalBackend

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use droprain_shared::{Problem, RoomId, RoomStatus, SessionId, UserId};

use crate::error::StoreError;
use crate::feed::{FeedFilter, Subscription};
use crate::models::{GameSession, NewRoom, NewSession, Participant, Room, SessionUpdate, User};

/// Errors a backend call can surface.
#[derive(Error, Debug)]
pub enum BackendError {
    /// A uniqueness rule rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The addressed record does not exist.
    #[error("record not found")]
    NotFound,

    /// The acting user may not perform this write.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The backend could not be reached; the call may be retried.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for BackendError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => BackendError::NotFound,
            StoreError::Conflict(msg) => BackendError::Conflict(msg),
            other => BackendError::Store(other),
        }
    }
}

impl BackendError {
    /// Whether retrying the same call could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Unavailable(_))
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

// ============================================================================
// Auth
// ============================================================================

/// Email/password credential provider.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Create an account and return its user id.  A taken email is a
    /// [`BackendError::Conflict`].
    async fn register(&self, email: &str, password: &str) -> BackendResult<UserId>;

    /// `Some(user)` when the credentials match, `None` otherwise.
    async fn authenticate(&self, email: &str, password: &str) -> BackendResult<Option<UserId>>;
}

// ============================================================================
// Tables
// ============================================================================

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn insert_user(&self, id: UserId, nickname: &str) -> BackendResult<User>;
    async fn get_user(&self, id: UserId) -> BackendResult<User>;
    async fn find_user_by_nickname(&self, nickname: &str) -> BackendResult<Option<User>>;
    /// Raise the stored best score to `score` if higher.  Returns whether it
    /// changed.
    async fn raise_best_score(&self, id: UserId, score: u32) -> BackendResult<bool>;
    async fn top_users(&self, limit: u32) -> BackendResult<Vec<User>>;
    async fn count_users_above(&self, score: u32) -> BackendResult<u32>;
}

/// Room records.  Writes that steer a room take the acting user and are
/// refused with [`BackendError::Forbidden`] unless that user is the host.
#[async_trait]
pub trait RoomRepo: Send + Sync {
    async fn insert_room(&self, new: NewRoom) -> BackendResult<Room>;
    async fn get_room(&self, id: RoomId) -> BackendResult<Room>;
    /// Case-sensitive lookup on a normalized code, `waiting` rooms only.
    async fn find_waiting_room(&self, code: &str) -> BackendResult<Room>;
    async fn update_room_status(
        &self,
        id: RoomId,
        actor: UserId,
        status: RoomStatus,
    ) -> BackendResult<Room>;
    async fn set_room_problem(
        &self,
        id: RoomId,
        actor: UserId,
        problem: Option<Problem>,
    ) -> BackendResult<Room>;
    async fn delete_room(&self, id: RoomId, actor: UserId) -> BackendResult<()>;
}

#[async_trait]
pub trait ParticipantRepo: Send + Sync {
    async fn add_participant(&self, room: RoomId, user: UserId) -> BackendResult<Participant>;
    async fn list_participants(&self, room: RoomId) -> BackendResult<Vec<Participant>>;
    async fn count_participants(&self, room: RoomId) -> BackendResult<u32>;
    /// Returns whether a row was removed.
    async fn remove_participant(&self, room: RoomId, user: UserId) -> BackendResult<bool>;
    /// Host-only.  Returns the number of rows removed.
    async fn remove_all_participants(&self, room: RoomId, actor: UserId) -> BackendResult<u32>;
}

#[async_trait]
pub trait SessionRepo: Send + Sync {
    async fn insert_session(&self, new: NewSession) -> BackendResult<GameSession>;
    async fn update_session(
        &self,
        id: SessionId,
        update: SessionUpdate,
    ) -> BackendResult<GameSession>;
    async fn find_session(&self, room: RoomId, user: UserId)
        -> BackendResult<Option<GameSession>>;
    async fn delete_sessions(&self, room: RoomId, user: UserId) -> BackendResult<u32>;
    /// Most recent first.
    async fn list_room_sessions(&self, room: RoomId) -> BackendResult<Vec<GameSession>>;
    async fn list_sessions_since(&self, since: DateTime<Utc>)
        -> BackendResult<Vec<GameSession>>;
}

// ============================================================================
// Realtime
// ============================================================================

pub trait ChangeFeed: Send + Sync {
    fn subscribe(&self, filter: FeedFilter) -> Subscription;
}

/// Everything a client needs from the hosted backend.
pub trait Backend:
    AuthProvider + UserRepo + RoomRepo + ParticipantRepo + SessionRepo + ChangeFeed + 'static
{
}

impl<T> Backend for T where
    T: AuthProvider + UserRepo + RoomRepo + ParticipantRepo + SessionRepo + ChangeFeed + 'static
{
}
