//! One player's side of a multiplayer game.
//!
//! [`MultiplayerGame`] ties the pieces together: the room mirror, the
//! host's problem broadcaster, the local droplet field and engine, and the
//! live score writer.  The caller drives it with [`MultiplayerGame::frame`]
//! and ends it with [`MultiplayerGame::finish`].

use tokio::time::Instant;

use droprain_shared::UserId;
use droprain_store::Room;

use crate::broadcast::ProblemBroadcaster;
use crate::config::ClientConfig;
use crate::droplets::DropletField;
use crate::error::Result;
use crate::game::{AnswerResult, FrameReport, GameEngine};
use crate::scores::{finalize, init_session, scoreboard, FinalSave, LiveScoreSync, ScoreboardEntry};
use crate::sync::{RoomSync, SyncStatus};
use crate::SharedBackend;

/// Shown when the room vanished mid-game.
pub const ROOM_DELETED_NOTICE: &str = "the host left and the room was deleted";

pub struct MultiplayerGame {
    backend: SharedBackend,
    config: ClientConfig,
    room: Room,
    me: UserId,
    sync: RoomSync,
    broadcaster: Option<ProblemBroadcaster>,
    live: LiveScoreSync,
    field: DropletField,
    engine: GameEngine,
    notice: Option<String>,
}

impl MultiplayerGame {
    /// Reset the player's session row and start syncing.  The host also
    /// starts broadcasting problems.
    pub async fn start(
        backend: SharedBackend,
        room: Room,
        me: UserId,
        config: &ClientConfig,
    ) -> Result<Self> {
        init_session(&backend, room.id, me, room.difficulty).await?;
        let sync = RoomSync::spawn(backend.clone(), room.id, config).await?;
        let broadcaster = room
            .is_host(me)
            .then(|| ProblemBroadcaster::spawn(backend.clone(), &room, config));
        let live = LiveScoreSync::spawn(backend.clone(), room.id, me, room.difficulty, config);

        tracing::info!(
            room_id = %room.id,
            user_id = %me,
            host = broadcaster.is_some(),
            "multiplayer game started"
        );
        Ok(Self {
            backend,
            config: config.clone(),
            room,
            me,
            sync,
            broadcaster,
            live,
            field: DropletField::new(),
            engine: GameEngine::new(),
            notice: None,
        })
    }

    pub fn room(&self) -> &Room {
        &self.room
    }

    pub fn is_host(&self) -> bool {
        self.broadcaster.is_some()
    }

    pub fn engine(&self) -> &GameEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut GameEngine {
        &mut self.engine
    }

    pub fn field(&self) -> &DropletField {
        &self.field
    }

    pub fn sync(&self) -> &RoomSync {
        &self.sync
    }

    /// User-facing notice, set when the room went away.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn room_deleted(&self) -> bool {
        self.sync.status() == SyncStatus::Deleted
    }

    /// One frame: react to room deletion, turn a new shared problem into a
    /// droplet, move droplets, and hand the score to the live writer.
    pub fn frame(&mut self, now: Instant) -> FrameReport {
        let mut report = FrameReport::default();

        if self.room_deleted() && self.notice.is_none() {
            tracing::warn!(room_id = %self.room.id, "room deleted during play");
            self.notice = Some(ROOM_DELETED_NOTICE.to_string());
            self.engine.end();
            self.field.clear();
        }

        if self.engine.is_active() {
            let problem = self.sync.problem();
            report.spawned = self.field.ingest_shared(problem.as_ref(), true);
            report.missed = self.engine.advance(&mut self.field, now);
            self.live.report(self.engine.stats());
        }

        if self.engine.take_game_over() {
            report.game_over = true;
        }
        report
    }

    pub fn submit_answer(&mut self, answer: u32, now: Instant) -> AnswerResult {
        let result = self.engine.answer(&mut self.field, answer, now);
        if result != AnswerResult::Ignored {
            self.live.report(self.engine.stats());
        }
        result
    }

    /// Live per-participant scores, own score from the local engine.
    pub fn scoreboard(&self) -> Vec<ScoreboardEntry> {
        let snapshot = self.sync.snapshot();
        scoreboard(
            &snapshot.participants,
            &snapshot.sessions,
            self.me,
            self.engine.score(),
        )
    }

    /// End the game and save the final score.  Nothing is saved when the
    /// room is gone.
    pub async fn finish(mut self) -> FinalSave {
        self.live.stop();
        self.engine.end();

        // Other players may still be in the round; the host keeps serving
        // problems until the room stops playing.
        if let Some(broadcaster) = self.broadcaster.take() {
            if self.room_deleted() {
                broadcaster.stop();
            } else {
                tracing::debug!(room_id = %self.room.id, "leaving problem broadcaster running");
                broadcaster.detach();
            }
        }

        if self.room_deleted() {
            return FinalSave {
                saved: false,
                notice: Some(ROOM_DELETED_NOTICE.to_string()),
                best_score_raised: false,
            };
        }

        finalize(
            &self.backend,
            self.room.id,
            self.me,
            self.room.difficulty,
            self.engine.stats(),
            &self.config,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rooms::RoomManager;
    use crate::test_support::{local_backend, signed_up};
    use droprain_shared::Difficulty;
    use droprain_store::{RoomRepo, SessionRepo, UserRepo};
    use std::time::Duration;
    use tokio::time::sleep;

    async fn started_room(backend: &SharedBackend) -> (Room, UserId, UserId) {
        let manager = RoomManager::new(backend.clone());
        let host = signed_up(backend, "host").await;
        let guest = signed_up(backend, "guest").await;
        let room = manager.create_room(host.id, Difficulty::Easy, None).await.unwrap();
        manager.join_room_by_code(&room.room_code.to_lowercase(), guest.id).await.unwrap();
        let room = manager.start_game(room.id, host.id).await.unwrap();
        (room, host.id, guest.id)
    }

    #[tokio::test(start_paused = true)]
    async fn guest_catches_the_hosts_problem_and_the_score_spreads() {
        let (_, backend) = local_backend();
        let config = ClientConfig::default();
        let (room, host, guest) = started_room(&backend).await;

        let mut host_game = MultiplayerGame::start(backend.clone(), room.clone(), host, &config)
            .await
            .unwrap();
        let mut guest_game = MultiplayerGame::start(backend.clone(), room.clone(), guest, &config)
            .await
            .unwrap();
        assert!(host_game.is_host());
        assert!(!guest_game.is_host());

        sleep(Duration::from_millis(1500)).await;
        let report = guest_game.frame(Instant::now());
        assert!(report.spawned);
        host_game.frame(Instant::now());
        assert_eq!(host_game.field().len(), 1);

        // Re-reading the same problem spawns nothing.
        assert!(!guest_game.frame(Instant::now()).spawned);

        let answer = guest_game.field().droplets()[0].answer;
        assert!(matches!(
            guest_game.submit_answer(answer, Instant::now()),
            AnswerResult::Correct(_)
        ));
        let guest_score = guest_game.engine().score();

        // The answer is local: the host still has its droplet.
        assert_eq!(host_game.field().len(), 1);

        sleep(Duration::from_secs(1)).await;
        let row = backend.find_session(room.id, guest).await.unwrap().unwrap();
        assert_eq!(row.score, guest_score);

        let board = host_game.scoreboard();
        let guest_line = board.iter().find(|e| e.user_id == guest).unwrap();
        assert_eq!(guest_line.score, guest_score);
        assert_eq!(board[0].user_id, guest);

        let save = guest_game.finish().await;
        assert!(save.saved);
        assert_eq!(backend.get_user(guest).await.unwrap().best_score, guest_score);
    }

    #[tokio::test(start_paused = true)]
    async fn host_keeps_serving_problems_until_the_room_finishes() {
        let (_, backend) = local_backend();
        let config = ClientConfig::default();
        let (room, host, _) = started_room(&backend).await;
        let host_game = MultiplayerGame::start(backend.clone(), room.clone(), host, &config)
            .await
            .unwrap();
        sleep(Duration::from_millis(1500)).await;

        let save = host_game.finish().await;
        assert!(save.saved);
        let before = backend.get_room(room.id).await.unwrap().current_problem;
        assert!(before.is_some());

        // Still playing: the stale problem is replaced after the host's game ended.
        sleep(Duration::from_secs(8)).await;
        let replaced = backend.get_room(room.id).await.unwrap().current_problem;
        assert!(replaced.is_some());
        assert_ne!(replaced, before);

        RoomManager::new(backend.clone())
            .finish_game(room.id, host)
            .await
            .unwrap();
        sleep(Duration::from_secs(1)).await;
        let last = backend.get_room(room.id).await.unwrap().current_problem;
        sleep(Duration::from_secs(10)).await;
        assert_eq!(backend.get_room(room.id).await.unwrap().current_problem, last);
    }

    #[tokio::test(start_paused = true)]
    async fn guest_game_ends_when_the_host_leaves() {
        let (_, backend) = local_backend();
        let config = ClientConfig::default();
        let (room, host, guest) = started_room(&backend).await;
        let mut guest_game = MultiplayerGame::start(backend.clone(), room.clone(), guest, &config)
            .await
            .unwrap();

        RoomManager::new(backend.clone())
            .leave_room(room.id, host)
            .await
            .unwrap();
        sleep(Duration::from_millis(100)).await;

        let report = guest_game.frame(Instant::now());
        assert!(report.game_over);
        assert_eq!(guest_game.notice(), Some(ROOM_DELETED_NOTICE));
        assert!(!guest_game.frame(Instant::now()).game_over);

        let save = guest_game.finish().await;
        assert!(!save.saved);
        assert_eq!(save.notice.as_deref(), Some(ROOM_DELETED_NOTICE));
    }

    #[tokio::test(start_paused = true)]
    async fn restarting_resets_the_session_row() {
        let (_, backend) = local_backend();
        let config = ClientConfig::default();
        let (room, _, guest) = started_room(&backend).await;

        let first = MultiplayerGame::start(backend.clone(), room.clone(), guest, &config)
            .await
            .unwrap();
        crate::scores::upsert_session(
            &backend,
            room.id,
            guest,
            room.difficulty,
            crate::scores::SessionStats {
                score: 50,
                correct_count: 5,
                total_count: 5,
            },
        )
        .await
        .unwrap();
        drop(first);

        let _second = MultiplayerGame::start(backend.clone(), room.clone(), guest, &config)
            .await
            .unwrap();
        let rows: Vec<_> = backend
            .list_room_sessions(room.id)
            .await
            .unwrap()
            .into_iter()
            .filter(|s| s.user_id == guest)
            .collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].score, 0);
    }
}
