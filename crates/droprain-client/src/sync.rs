//! Realtime mirror of one room.
//!
//! [`RoomSync`] keeps a local copy of a room's status, participant list,
//! current problem and session rows.  Two sources feed it: filtered change
//! feed subscriptions (fast, but may miss events) and fixed-period polls
//! (slow, but always converge).  Both funnel into the same `apply_*`
//! functions, which de-duplicate before publishing a [`SyncEvent`], so a
//! change seen on both paths is reported once.
//!
//! A room that disappears is reported as [`SyncStatus::Deleted`].  For a
//! non-host client whose delete notification was lost, the existence poll
//! is the only way to learn the host left.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use droprain_shared::{Problem, ProblemKey, RoomId, RoomStatus};
use droprain_store::{
    BackendError, ChangeFeed, ChangeKind, ChangeRow, FeedFilter, GameSession, Participant,
    ParticipantRepo, Room, RoomRepo, SessionRepo, Subscription, Table,
};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::scores::{latest_per_user, merge_session_change};
use crate::SharedBackend;

const EVENT_CAPACITY: usize = 64;

/// Room status as seen by a client, including the local-only `Deleted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncStatus {
    Waiting,
    Playing,
    Finished,
    Deleted,
}

impl From<RoomStatus> for SyncStatus {
    fn from(status: RoomStatus) -> Self {
        match status {
            RoomStatus::Waiting => Self::Waiting,
            RoomStatus::Playing => Self::Playing,
            RoomStatus::Finished => Self::Finished,
        }
    }
}

/// Published whenever the mirror changes.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    Status(SyncStatus),
    Participants(Vec<Participant>),
    /// A problem with a key not seen before.
    Problem(Problem),
    ProblemCleared,
    /// Per-user session view, one row per user.
    Sessions(Vec<GameSession>),
}

/// Point-in-time copy of the mirror.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    /// Last room row read; `None` once deleted.
    pub room: Option<Room>,
    pub status: SyncStatus,
    pub participants: Vec<Participant>,
    pub problem: Option<Problem>,
    pub sessions: Vec<GameSession>,
}

struct MirrorState {
    snapshot: RoomSnapshot,
    participant_hash: Option<blake3::Hash>,
    /// Survives clears so a re-read of an old problem is not "new".
    last_problem: Option<ProblemKey>,
}

/// Order-independent fingerprint of a participant list.
fn participant_hash(participants: &[Participant]) -> blake3::Hash {
    let mut ids: Vec<_> = participants.iter().map(|p| p.user_id).collect();
    ids.sort();
    let mut hasher = blake3::Hasher::new();
    for id in ids {
        hasher.update(id.0.as_bytes());
    }
    hasher.finalize()
}

struct Mirror {
    backend: SharedBackend,
    room_id: RoomId,
    state: Mutex<MirrorState>,
    events: broadcast::Sender<SyncEvent>,
}

impl Mirror {
    fn lock(&self) -> MutexGuard<'_, MirrorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SyncEvent) {
        // No receivers is fine; the snapshot still reflects the change.
        let _ = self.events.send(event);
    }

    fn is_deleted(&self) -> bool {
        self.lock().snapshot.status == SyncStatus::Deleted
    }

    fn apply_status(&self, status: RoomStatus) {
        let status = SyncStatus::from(status);
        {
            let mut state = self.lock();
            if state.snapshot.status == status || state.snapshot.status == SyncStatus::Deleted {
                return;
            }
            state.snapshot.status = status;
        }
        tracing::info!(room_id = %self.room_id, ?status, "room status changed");
        self.emit(SyncEvent::Status(status));
    }

    fn apply_room(&self, room: Room) {
        let status = room.status;
        let problem = room.current_problem.clone();
        {
            let mut state = self.lock();
            if state.snapshot.status == SyncStatus::Deleted {
                return;
            }
            state.snapshot.room = Some(room);
        }
        self.apply_status(status);
        self.apply_problem(problem);
    }

    fn apply_problem(&self, problem: Option<Problem>) {
        let event = {
            let mut state = self.lock();
            if state.snapshot.status == SyncStatus::Deleted {
                return;
            }
            match problem {
                Some(problem) => {
                    let key = problem.key();
                    if state.last_problem.as_ref() == Some(&key) {
                        None
                    } else {
                        state.last_problem = Some(key);
                        state.snapshot.problem = Some(problem.clone());
                        Some(SyncEvent::Problem(problem))
                    }
                }
                None => state
                    .snapshot
                    .problem
                    .take()
                    .map(|_| SyncEvent::ProblemCleared),
            }
        };
        if let Some(event) = event {
            tracing::debug!(room_id = %self.room_id, "problem changed");
            self.emit(event);
        }
    }

    fn apply_participants(&self, participants: Vec<Participant>) {
        let hash = participant_hash(&participants);
        {
            let mut state = self.lock();
            if state.snapshot.status == SyncStatus::Deleted
                || state.participant_hash == Some(hash)
            {
                return;
            }
            state.participant_hash = Some(hash);
            state.snapshot.participants = participants.clone();
        }
        tracing::debug!(room_id = %self.room_id, count = participants.len(), "participants changed");
        self.emit(SyncEvent::Participants(participants));
    }

    fn apply_sessions(&self, rows: &[GameSession]) {
        let latest = latest_per_user(rows);
        {
            let mut state = self.lock();
            if state.snapshot.status == SyncStatus::Deleted || state.snapshot.sessions == latest {
                return;
            }
            state.snapshot.sessions = latest.clone();
        }
        self.emit(SyncEvent::Sessions(latest));
    }

    fn merge_session(&self, kind: ChangeKind, row: &GameSession) {
        let mut state = self.lock();
        if state.snapshot.status == SyncStatus::Deleted
            || !merge_session_change(&mut state.snapshot.sessions, kind, row)
        {
            return;
        }
        let sessions = state.snapshot.sessions.clone();
        drop(state);
        self.emit(SyncEvent::Sessions(sessions));
    }

    /// Switch to `Deleted` and drop the participant list and problem.
    /// Fires once; returns whether this call made the transition.
    fn mark_deleted(&self) -> bool {
        {
            let mut state = self.lock();
            if state.snapshot.status == SyncStatus::Deleted {
                return false;
            }
            state.snapshot.status = SyncStatus::Deleted;
            state.snapshot.room = None;
            state.snapshot.participants.clear();
            state.snapshot.problem = None;
            state.participant_hash = None;
        }
        tracing::info!(room_id = %self.room_id, "room deleted");
        self.emit(SyncEvent::Status(SyncStatus::Deleted));
        true
    }

    async fn refresh_participants(&self) {
        match self.backend.list_participants(self.room_id).await {
            Ok(list) => self.apply_participants(list),
            Err(e) => tracing::warn!(room_id = %self.room_id, error = %e, "participant refresh failed"),
        }
    }

    /// Existence and status check.
    async fn check_room(&self) {
        match self.backend.get_room(self.room_id).await {
            Ok(room) => self.apply_status(room.status),
            Err(BackendError::NotFound) => {
                self.mark_deleted();
            }
            Err(e) => tracing::warn!(room_id = %self.room_id, error = %e, "room check failed"),
        }
    }

    async fn poll_problem(&self) {
        match self.backend.get_room(self.room_id).await {
            Ok(room) => self.apply_problem(room.current_problem),
            Err(BackendError::NotFound) => {
                self.mark_deleted();
            }
            Err(e) => tracing::warn!(room_id = %self.room_id, error = %e, "problem poll failed"),
        }
    }

    async fn poll_sessions(&self) {
        match self.backend.list_room_sessions(self.room_id).await {
            Ok(rows) => self.apply_sessions(&rows),
            Err(e) => tracing::warn!(room_id = %self.room_id, error = %e, "session poll failed"),
        }
    }
}

/// Handle to a running room mirror.  Dropping it stops every task.
pub struct RoomSync {
    mirror: Arc<Mirror>,
    tasks: Vec<JoinHandle<()>>,
}

impl RoomSync {
    /// Subscribe, load the room once, then start the pollers.
    ///
    /// Fails with [`ClientError::RoomNotFound`] when the room does not exist.
    pub async fn spawn(
        backend: SharedBackend,
        room_id: RoomId,
        config: &ClientConfig,
    ) -> Result<Self> {
        // Subscribe first so nothing written during the load is missed.
        let rooms = backend.subscribe(
            FeedFilter::new(Table::Rooms, &[ChangeKind::Update, ChangeKind::Delete])
                .for_room(room_id),
        );
        let participants = backend.subscribe(
            FeedFilter::new(
                Table::RoomParticipants,
                &[ChangeKind::Insert, ChangeKind::Delete],
            )
            .for_room(room_id),
        );
        let sessions = backend.subscribe(
            FeedFilter::new(Table::GameSessions, &[ChangeKind::Insert, ChangeKind::Update])
                .for_room(room_id),
        );

        let room = backend.get_room(room_id).await.map_err(|e| match e {
            BackendError::NotFound => ClientError::RoomNotFound,
            other => ClientError::from(other),
        })?;
        let participant_list = backend.list_participants(room_id).await?;
        let session_rows = backend.list_room_sessions(room_id).await?;

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let last_problem = room.current_problem.as_ref().map(Problem::key);
        let snapshot = RoomSnapshot {
            room_id,
            status: room.status.into(),
            problem: room.current_problem.clone(),
            participants: participant_list.clone(),
            sessions: latest_per_user(&session_rows),
            room: Some(room),
        };
        let mirror = Arc::new(Mirror {
            backend,
            room_id,
            state: Mutex::new(MirrorState {
                snapshot,
                participant_hash: Some(participant_hash(&participant_list)),
                last_problem,
            }),
            events,
        });

        let tasks = vec![
            tokio::spawn(watch_rooms(mirror.clone(), rooms)),
            tokio::spawn(watch_participants(mirror.clone(), participants)),
            tokio::spawn(watch_sessions(mirror.clone(), sessions)),
            spawn_poller(mirror.clone(), config.participant_poll, Poll::Participants),
            spawn_poller(mirror.clone(), config.room_check_poll, Poll::RoomCheck),
            spawn_poller(mirror.clone(), config.problem_poll, Poll::Problem),
            spawn_poller(mirror.clone(), config.session_poll, Poll::Sessions),
        ];

        tracing::info!(room_id = %room_id, "room sync started");
        Ok(Self { mirror, tasks })
    }

    pub fn room_id(&self) -> RoomId {
        self.mirror.room_id
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        self.mirror.lock().snapshot.clone()
    }

    pub fn problem(&self) -> Option<Problem> {
        self.mirror.lock().snapshot.problem.clone()
    }

    pub fn status(&self) -> SyncStatus {
        self.mirror.lock().snapshot.status
    }

    pub fn events(&self) -> broadcast::Receiver<SyncEvent> {
        self.mirror.events.subscribe()
    }

    /// Re-read the participant list now, e.g. right after joining.
    pub async fn refresh_participants(&self) {
        self.mirror.refresh_participants().await;
    }

    pub fn shutdown(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        tracing::debug!(room_id = %self.mirror.room_id, "room sync stopped");
    }
}

impl Drop for RoomSync {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn watch_rooms(mirror: Arc<Mirror>, mut sub: Subscription) {
    while let Some(event) = sub.next().await {
        match (event.kind, event.row) {
            (ChangeKind::Delete, _) => {
                mirror.mark_deleted();
                break;
            }
            (_, ChangeRow::Room(room)) => mirror.apply_room(room),
            _ => {}
        }
    }
}

async fn watch_participants(mirror: Arc<Mirror>, mut sub: Subscription) {
    // Feed rows lack nicknames; refetch the joined list instead.
    while sub.next().await.is_some() {
        if mirror.is_deleted() {
            break;
        }
        mirror.refresh_participants().await;
    }
}

async fn watch_sessions(mirror: Arc<Mirror>, mut sub: Subscription) {
    while let Some(event) = sub.next().await {
        if let ChangeRow::Session(row) = &event.row {
            mirror.merge_session(event.kind, row);
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Poll {
    Participants,
    RoomCheck,
    Problem,
    Sessions,
}

fn spawn_poller(mirror: Arc<Mirror>, period: Duration, poll: Poll) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if mirror.is_deleted() {
                tracing::trace!(room_id = %mirror.room_id, ?poll, "poller stopped");
                break;
            }
            match poll {
                Poll::Participants => mirror.refresh_participants().await,
                Poll::RoomCheck => mirror.check_room().await,
                Poll::Problem => mirror.poll_problem().await,
                Poll::Sessions => mirror.poll_sessions().await,
            }
        }
    })
}
