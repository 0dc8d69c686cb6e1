//! SQLite-backed implementation of the [`Backend`] trait family.
//!
//! [`LocalBackend`] plays the part of the hosted service: it owns the
//! database, checks host-only writes, and publishes every accepted change on
//! a broadcast channel that [`Subscription`]s read from.  Two switches make
//! unreliable networks reproducible in tests: [`LocalBackend::fail_next_writes`]
//! and [`LocalBackend::set_feed_enabled`].
//!
//! [`Backend`]: crate::Backend

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use droprain_shared::{Problem, RoomId, RoomStatus, SessionId, UserId};

use crate::auth::{generate_salt, password_digest};
use crate::backend::{
    AuthProvider, BackendError, BackendResult, ChangeFeed, ParticipantRepo, RoomRepo,
    SessionRepo, UserRepo,
};
use crate::database::Database;
use crate::error::Result;
use crate::feed::{ChangeEvent, ChangeKind, ChangeRow, FeedFilter, Subscription};
use crate::models::{
    AuthAccount, GameSession, NewRoom, NewSession, Participant, Room, SessionUpdate, User,
};

/// Capacity of the change-feed channel.  Receivers further behind than this
/// see a lag notice and skip ahead.
const FEED_CAPACITY: usize = 256;

pub struct LocalBackend {
    db: Mutex<Database>,
    feed: broadcast::Sender<ChangeEvent>,
    failing_writes: AtomicU32,
    feed_enabled: AtomicBool,
}

impl LocalBackend {
    pub fn new(db: Database) -> Self {
        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            db: Mutex::new(db),
            feed,
            failing_writes: AtomicU32::new(0),
            feed_enabled: AtomicBool::new(true),
        }
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        Ok(Self::new(Database::open_at(path)?))
    }

    /// Make the next `n` write calls fail with [`BackendError::Unavailable`].
    pub fn fail_next_writes(&self, n: u32) {
        self.failing_writes.store(n, Ordering::SeqCst);
    }

    /// With the feed disabled, writes still land but no change notification
    /// is delivered, as when a realtime socket silently drops.
    pub fn set_feed_enabled(&self, enabled: bool) {
        self.feed_enabled.store(enabled, Ordering::SeqCst);
    }

    fn lock(&self) -> BackendResult<MutexGuard<'_, Database>> {
        self.db
            .lock()
            .map_err(|_| BackendError::Unavailable("database lock poisoned".into()))
    }

    fn with_db<T>(&self, f: impl FnOnce(&Database) -> Result<T>) -> BackendResult<T> {
        let db = self.lock()?;
        Ok(f(&db)?)
    }

    /// Consume one injected failure, if any are pending.
    fn begin_write(&self, op: &'static str) -> BackendResult<()> {
        let injected = self
            .failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            tracing::debug!(op, "injected write failure");
            return Err(BackendError::Unavailable(format!("{op}: connection reset")));
        }
        Ok(())
    }

    fn publish(&self, kind: ChangeKind, row: ChangeRow) {
        if !self.feed_enabled.load(Ordering::SeqCst) {
            return;
        }
        // No receivers is not an error; nobody is listening yet.
        let _ = self.feed.send(ChangeEvent::new(kind, row));
    }

    fn require_host(db: &Database, room: RoomId, actor: UserId) -> BackendResult<Room> {
        let room = db.get_room(room)?;
        if !room.is_host(actor) {
            return Err(BackendError::Forbidden(format!(
                "user {} is not the host of room {}",
                actor.short(),
                room.room_code
            )));
        }
        Ok(room)
    }
}

// ============================================================================
// Auth
// ============================================================================

#[async_trait]
impl AuthProvider for LocalBackend {
    async fn register(&self, email: &str, password: &str) -> BackendResult<UserId> {
        self.begin_write("register")?;
        let salt = generate_salt();
        let account = AuthAccount {
            user_id: UserId::new(),
            email: email.to_string(),
            password_hash: password_digest(&salt, password),
            salt,
            created_at: Utc::now(),
        };
        self.with_db(|db| db.create_auth_account(&account))?;
        tracing::info!(user_id = %account.user_id, "account registered");
        Ok(account.user_id)
    }

    async fn authenticate(&self, email: &str, password: &str) -> BackendResult<Option<UserId>> {
        let account = self.with_db(|db| db.find_auth_account(email))?;
        Ok(account
            .filter(|a| a.verify(password))
            .map(|a| a.user_id))
    }
}

// ============================================================================
// Users
// ============================================================================

#[async_trait]
impl UserRepo for LocalBackend {
    async fn insert_user(&self, id: UserId, nickname: &str) -> BackendResult<User> {
        self.begin_write("insert_user")?;
        let now = Utc::now();
        let user = User {
            id,
            nickname: nickname.to_string(),
            best_score: 0,
            created_at: now,
            updated_at: now,
        };
        self.with_db(|db| {
            db.create_user(&user)?;
            db.get_user(id)
        })
    }

    async fn get_user(&self, id: UserId) -> BackendResult<User> {
        self.with_db(|db| db.get_user(id))
    }

    async fn find_user_by_nickname(&self, nickname: &str) -> BackendResult<Option<User>> {
        self.with_db(|db| db.find_user_by_nickname(nickname))
    }

    async fn raise_best_score(&self, id: UserId, score: u32) -> BackendResult<bool> {
        self.begin_write("raise_best_score")?;
        self.with_db(|db| db.raise_best_score(id, score))
    }

    async fn top_users(&self, limit: u32) -> BackendResult<Vec<User>> {
        self.with_db(|db| db.top_users(limit))
    }

    async fn count_users_above(&self, score: u32) -> BackendResult<u32> {
        self.with_db(|db| db.count_users_above(score))
    }
}

// ============================================================================
// Rooms
// ============================================================================

#[async_trait]
impl RoomRepo for LocalBackend {
    async fn insert_room(&self, new: NewRoom) -> BackendResult<Room> {
        self.begin_write("insert_room")?;
        let room = self.with_db(|db| db.create_room(&new))?;
        self.publish(ChangeKind::Insert, ChangeRow::Room(room.clone()));
        Ok(room)
    }

    async fn get_room(&self, id: RoomId) -> BackendResult<Room> {
        self.with_db(|db| db.get_room(id))
    }

    async fn find_waiting_room(&self, code: &str) -> BackendResult<Room> {
        self.with_db(|db| db.find_waiting_room(code))
    }

    async fn update_room_status(
        &self,
        id: RoomId,
        actor: UserId,
        status: RoomStatus,
    ) -> BackendResult<Room> {
        self.begin_write("update_room_status")?;
        let room = {
            let db = self.lock()?;
            Self::require_host(&db, id, actor)?;
            let finished_at = (status == RoomStatus::Finished).then(Utc::now);
            db.set_room_status(id, status, finished_at)?
        };
        self.publish(ChangeKind::Update, ChangeRow::Room(room.clone()));
        Ok(room)
    }

    async fn set_room_problem(
        &self,
        id: RoomId,
        actor: UserId,
        problem: Option<Problem>,
    ) -> BackendResult<Room> {
        self.begin_write("set_room_problem")?;
        let room = {
            let db = self.lock()?;
            Self::require_host(&db, id, actor)?;
            db.set_room_problem(id, problem.as_ref())?
        };
        self.publish(ChangeKind::Update, ChangeRow::Room(room.clone()));
        Ok(room)
    }

    async fn delete_room(&self, id: RoomId, actor: UserId) -> BackendResult<()> {
        self.begin_write("delete_room")?;
        let removed = {
            let db = self.lock()?;
            Self::require_host(&db, id, actor)?;
            db.delete_room(id)?
        };
        if let Some(room) = removed {
            tracing::info!(room_id = %id, code = %room.room_code, "room deleted");
            self.publish(ChangeKind::Delete, ChangeRow::Room(room));
        }
        Ok(())
    }
}

// ============================================================================
// Participants
// ============================================================================

#[async_trait]
impl ParticipantRepo for LocalBackend {
    async fn add_participant(&self, room: RoomId, user: UserId) -> BackendResult<Participant> {
        self.begin_write("add_participant")?;
        let participant = self.with_db(|db| db.add_participant(room, user))?;
        self.publish(ChangeKind::Insert, ChangeRow::Participant(participant.clone()));
        Ok(participant)
    }

    async fn list_participants(&self, room: RoomId) -> BackendResult<Vec<Participant>> {
        self.with_db(|db| db.list_participants(room))
    }

    async fn count_participants(&self, room: RoomId) -> BackendResult<u32> {
        self.with_db(|db| db.count_participants(room))
    }

    async fn remove_participant(&self, room: RoomId, user: UserId) -> BackendResult<bool> {
        self.begin_write("remove_participant")?;
        let removed = self.with_db(|db| db.remove_participant(room, user))?;
        match removed {
            Some(participant) => {
                self.publish(ChangeKind::Delete, ChangeRow::Participant(participant));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove_all_participants(&self, room: RoomId, actor: UserId) -> BackendResult<u32> {
        self.begin_write("remove_all_participants")?;
        let removed = {
            let db = self.lock()?;
            Self::require_host(&db, room, actor)?;
            db.remove_all_participants(room)?
        };
        let count = removed.len() as u32;
        for participant in removed {
            self.publish(ChangeKind::Delete, ChangeRow::Participant(participant));
        }
        Ok(count)
    }
}

// ============================================================================
// Sessions
// ============================================================================

#[async_trait]
impl SessionRepo for LocalBackend {
    async fn insert_session(&self, new: NewSession) -> BackendResult<GameSession> {
        self.begin_write("insert_session")?;
        let session = self.with_db(|db| db.insert_session(&new))?;
        self.publish(ChangeKind::Insert, ChangeRow::Session(session.clone()));
        Ok(session)
    }

    async fn update_session(
        &self,
        id: SessionId,
        update: SessionUpdate,
    ) -> BackendResult<GameSession> {
        self.begin_write("update_session")?;
        let session = self.with_db(|db| db.update_session(id, &update))?;
        self.publish(ChangeKind::Update, ChangeRow::Session(session.clone()));
        Ok(session)
    }

    async fn find_session(
        &self,
        room: RoomId,
        user: UserId,
    ) -> BackendResult<Option<GameSession>> {
        self.with_db(|db| db.find_session(room, user))
    }

    async fn delete_sessions(&self, room: RoomId, user: UserId) -> BackendResult<u32> {
        self.begin_write("delete_sessions")?;
        let removed = self.with_db(|db| db.delete_sessions(room, user))?;
        let count = removed.len() as u32;
        for session in removed {
            self.publish(ChangeKind::Delete, ChangeRow::Session(session));
        }
        Ok(count)
    }

    async fn list_room_sessions(&self, room: RoomId) -> BackendResult<Vec<GameSession>> {
        self.with_db(|db| db.list_room_sessions(room))
    }

    async fn list_sessions_since(
        &self,
        since: DateTime<Utc>,
    ) -> BackendResult<Vec<GameSession>> {
        self.with_db(|db| db.list_sessions_since(since))
    }
}

// ============================================================================
// Realtime
// ============================================================================

impl ChangeFeed for LocalBackend {
    fn subscribe(&self, filter: FeedFilter) -> Subscription {
        Subscription::new(self.feed.subscribe(), filter)
    }
}
