//! Room lifecycle: create, find, join, leave, and host-driven status
//! transitions.

use droprain_shared::constants::{MAX_PLAYERS, MIN_PLAYERS_TO_START, ROOM_CODE_MAX_ATTEMPTS};
use droprain_shared::difficulty::validate_custom_tables;
use droprain_shared::room_code::{generate_room_code, normalize_room_code};
use droprain_shared::validation::validate_room_code;
use droprain_shared::{Difficulty, RoomId, RoomStatus, UserId, ValidationError};
use droprain_store::{
    BackendError, NewRoom, Participant, ParticipantRepo, Room, RoomRepo,
};

use crate::error::{ClientError, Result};
use crate::SharedBackend;

/// What [`RoomManager::leave_room`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The participant row was removed; the room lives on.
    Left,
    /// The host left a live room, so the room was torn down.
    RoomDeleted,
    /// The room no longer existed.
    AlreadyGone,
}

pub struct RoomManager {
    backend: SharedBackend,
}

impl RoomManager {
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }

    /// Create a room hosted by `host` and add the host as first participant.
    ///
    /// `custom_tables` is required for [`Difficulty::Custom`] and ignored
    /// otherwise.
    pub async fn create_room(
        &self,
        host: UserId,
        difficulty: Difficulty,
        custom_tables: Option<&[u32]>,
    ) -> Result<Room> {
        self.create_room_with_codes(host, difficulty, custom_tables, || {
            generate_room_code(&mut rand::thread_rng())
        })
        .await
    }

    pub(crate) async fn create_room_with_codes(
        &self,
        host: UserId,
        difficulty: Difficulty,
        custom_tables: Option<&[u32]>,
        mut next_code: impl FnMut() -> String + Send,
    ) -> Result<Room> {
        let custom_tables = match (difficulty, custom_tables) {
            (Difficulty::Custom, Some(tables)) => Some(validate_custom_tables(tables)?),
            (Difficulty::Custom, None) => return Err(ValidationError::NoTables.into()),
            _ => None,
        };

        let mut created = None;
        for attempt in 1..=ROOM_CODE_MAX_ATTEMPTS {
            let new = NewRoom {
                room_code: next_code(),
                host_id: host,
                difficulty,
                custom_tables: custom_tables.clone(),
                max_players: MAX_PLAYERS,
            };
            match self.backend.insert_room(new).await {
                Ok(room) => {
                    created = Some(room);
                    break;
                }
                Err(BackendError::Conflict(_)) => {
                    tracing::debug!(attempt, "room code collision, regenerating");
                }
                Err(e) => return Err(ClientError::Persistence(e)),
            }
        }

        let room = created.ok_or(ClientError::RoomCreationExhausted {
            attempts: ROOM_CODE_MAX_ATTEMPTS,
        })?;

        if let Err(e) = self.backend.add_participant(room.id, host).await {
            tracing::error!(room_id = %room.id, error = %e, "failed to add host as participant");
        }

        tracing::info!(
            room_id = %room.id,
            code = %room.room_code,
            difficulty = %room.difficulty,
            "room created"
        );
        Ok(room)
    }

    /// Find a joinable room by code, case-insensitively.
    pub async fn find_room_by_code(&self, code: &str) -> Result<Room> {
        validate_room_code(code)?;
        let code = normalize_room_code(code);
        self.backend
            .find_waiting_room(&code)
            .await
            .map_err(room_not_found)
    }

    /// Join a waiting room.  Joining a room one is already in succeeds
    /// without writing anything.
    pub async fn join_room(&self, room_id: RoomId, user: UserId) -> Result<Room> {
        let room = self.backend.get_room(room_id).await.map_err(room_not_found)?;
        if room.status != RoomStatus::Waiting {
            return Err(ClientError::RoomNotWaiting {
                status: room.status,
            });
        }

        let participants = self.backend.list_participants(room_id).await?;
        if participants.iter().any(|p| p.user_id == user) {
            tracing::debug!(room_id = %room_id, user_id = %user, "already joined");
            return Ok(room);
        }
        if participants.len() as u32 >= room.max_players {
            return Err(ClientError::RoomFull {
                max: room.max_players,
            });
        }

        match self.backend.add_participant(room_id, user).await {
            Ok(_) => {}
            // Lost a race against our own earlier join.
            Err(BackendError::Conflict(_)) => {}
            Err(e) => return Err(room_not_found(e)),
        }

        tracing::info!(room_id = %room_id, user_id = %user, "joined room");
        Ok(room)
    }

    pub async fn join_room_by_code(&self, code: &str, user: UserId) -> Result<Room> {
        let room = self.find_room_by_code(code).await?;
        self.join_room(room.id, user).await
    }

    /// Leave a room.  When the host leaves a room that is still waiting or
    /// playing, every participant is removed and the room is deleted;
    /// other clients observe the teardown through the change feed or their
    /// existence poll.
    pub async fn leave_room(&self, room_id: RoomId, user: UserId) -> Result<LeaveOutcome> {
        let room = match self.backend.get_room(room_id).await {
            Ok(room) => room,
            Err(BackendError::NotFound) => return Ok(LeaveOutcome::AlreadyGone),
            Err(e) => return Err(e.into()),
        };

        if room.is_host(user) && room.status != RoomStatus::Finished {
            let removed = self.backend.remove_all_participants(room_id, user).await?;
            self.backend.delete_room(room_id, user).await?;
            tracing::info!(room_id = %room_id, removed, "host left, room deleted");
            return Ok(LeaveOutcome::RoomDeleted);
        }

        self.backend.remove_participant(room_id, user).await?;
        tracing::info!(room_id = %room_id, user_id = %user, "left room");
        Ok(LeaveOutcome::Left)
    }

    /// Move the room to `status`.  Only the host may do this.
    pub async fn update_room_status(
        &self,
        room_id: RoomId,
        actor: UserId,
        status: RoomStatus,
    ) -> Result<Room> {
        let room = self
            .backend
            .update_room_status(room_id, actor, status)
            .await
            .map_err(room_not_found)?;
        tracing::info!(room_id = %room_id, status = %status, "room status updated");
        Ok(room)
    }

    /// Start the game.  Requires the host and at least two participants.
    pub async fn start_game(&self, room_id: RoomId, actor: UserId) -> Result<Room> {
        let room = self.backend.get_room(room_id).await.map_err(room_not_found)?;
        if !room.is_host(actor) {
            return Err(ClientError::NotHost);
        }

        let present = self.backend.count_participants(room_id).await? as usize;
        if present < MIN_PLAYERS_TO_START {
            return Err(ClientError::NotEnoughPlayers {
                required: MIN_PLAYERS_TO_START,
                present,
            });
        }

        self.update_room_status(room_id, actor, RoomStatus::Playing)
            .await
    }

    pub async fn finish_game(&self, room_id: RoomId, actor: UserId) -> Result<Room> {
        self.update_room_status(room_id, actor, RoomStatus::Finished)
            .await
    }

    pub async fn find_room(&self, room_id: RoomId) -> Result<Room> {
        self.backend.get_room(room_id).await.map_err(room_not_found)
    }

    pub async fn participants(&self, room_id: RoomId) -> Result<Vec<Participant>> {
        Ok(self.backend.list_participants(room_id).await?)
    }
}

fn room_not_found(err: BackendError) -> ClientError {
    match err {
        BackendError::NotFound => ClientError::RoomNotFound,
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{local_backend, signed_up};

    #[tokio::test]
    async fn easy_room_join_by_code_and_start() {
        let (_, backend) = local_backend();
        let host = signed_up(&backend, "host").await;
        let guest = signed_up(&backend, "guest").await;
        let rooms = RoomManager::new(backend.clone());

        let room = rooms.create_room(host.id, Difficulty::Easy, None).await.unwrap();
        assert_eq!(room.room_code.len(), 6);
        assert_eq!(room.tables(), vec![2, 3, 5]);

        assert!(matches!(
            rooms.start_game(room.id, host.id).await,
            Err(ClientError::NotEnoughPlayers { required: 2, present: 1 })
        ));

        let code = room.room_code.to_lowercase();
        rooms.join_room_by_code(&code, guest.id).await.unwrap();

        assert!(matches!(
            rooms.start_game(room.id, guest.id).await,
            Err(ClientError::NotHost)
        ));
        let started = rooms.start_game(room.id, host.id).await.unwrap();
        assert_eq!(started.status, RoomStatus::Playing);

        assert!(matches!(
            rooms.find_room_by_code(&room.room_code).await,
            Err(ClientError::RoomNotFound)
        ));
    }

    #[tokio::test]
    async fn join_is_idempotent_and_bounded() {
        let (_, backend) = local_backend();
        let host = signed_up(&backend, "host").await;
        let rooms = RoomManager::new(backend.clone());
        let room = rooms.create_room(host.id, Difficulty::Normal, None).await.unwrap();

        let guest = signed_up(&backend, "guest").await;
        rooms.join_room(room.id, guest.id).await.unwrap();
        rooms.join_room(room.id, guest.id).await.unwrap();
        assert_eq!(rooms.participants(room.id).await.unwrap().len(), 2);

        for i in 0..8 {
            let p = signed_up(&backend, &format!("filler{i}")).await;
            rooms.join_room(room.id, p.id).await.unwrap();
        }
        let late = signed_up(&backend, "late").await;
        assert!(matches!(
            rooms.join_room(room.id, late.id).await,
            Err(ClientError::RoomFull { max: 10 })
        ));
        // Already-present players may still "re-join" a full room.
        rooms.join_room(room.id, guest.id).await.unwrap();
    }

    #[tokio::test]
    async fn join_rejects_rooms_in_play() {
        let (_, backend) = local_backend();
        let host = signed_up(&backend, "host").await;
        let guest = signed_up(&backend, "guest").await;
        let late = signed_up(&backend, "late").await;
        let rooms = RoomManager::new(backend.clone());

        let room = rooms.create_room(host.id, Difficulty::Hard, None).await.unwrap();
        rooms.join_room(room.id, guest.id).await.unwrap();
        rooms.start_game(room.id, host.id).await.unwrap();

        assert!(matches!(
            rooms.join_room(room.id, late.id).await,
            Err(ClientError::RoomNotWaiting {
                status: RoomStatus::Playing
            })
        ));
        assert!(matches!(
            rooms.join_room(RoomId::new(), late.id).await,
            Err(ClientError::RoomNotFound)
        ));
    }

    #[tokio::test]
    async fn code_collisions_exhaust_after_ten_attempts() {
        let (_, backend) = local_backend();
        let host = signed_up(&backend, "host").await;
        let rooms = RoomManager::new(backend.clone());

        rooms
            .create_room_with_codes(host.id, Difficulty::Easy, None, || "AAAAAA".into())
            .await
            .unwrap();

        let mut tries = 0;
        let err = rooms
            .create_room_with_codes(host.id, Difficulty::Easy, None, || {
                tries += 1;
                "AAAAAA".into()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::RoomCreationExhausted { attempts: 10 }));
        assert_eq!(tries, 10);
    }

    #[tokio::test]
    async fn collision_then_fresh_code_succeeds() {
        let (_, backend) = local_backend();
        let host = signed_up(&backend, "host").await;
        let rooms = RoomManager::new(backend.clone());
        rooms
            .create_room_with_codes(host.id, Difficulty::Easy, None, || "BBBBBB".into())
            .await
            .unwrap();

        let mut codes = vec!["CCCCCC".to_string(), "BBBBBB".to_string()];
        let room = rooms
            .create_room_with_codes(host.id, Difficulty::Easy, None, || {
                codes.pop().unwrap_or_default()
            })
            .await
            .unwrap();
        assert_eq!(room.room_code, "CCCCCC");
    }

    #[tokio::test]
    async fn custom_rooms_need_valid_tables() {
        let (_, backend) = local_backend();
        let host = signed_up(&backend, "host").await;
        let rooms = RoomManager::new(backend.clone());

        assert!(matches!(
            rooms.create_room(host.id, Difficulty::Custom, None).await,
            Err(ClientError::Validation(ValidationError::NoTables))
        ));
        assert!(matches!(
            rooms.create_room(host.id, Difficulty::Custom, Some(&[3, 12][..])).await,
            Err(ClientError::Validation(ValidationError::TableOutOfRange(12)))
        ));

        let room = rooms
            .create_room(host.id, Difficulty::Custom, Some(&[9, 7, 7][..]))
            .await
            .unwrap();
        assert_eq!(room.custom_tables, Some(vec![7, 9]));
    }

    #[tokio::test]
    async fn host_leaving_a_waiting_room_tears_it_down() {
        let (_, backend) = local_backend();
        let host = signed_up(&backend, "host").await;
        let guest = signed_up(&backend, "guest").await;
        let rooms = RoomManager::new(backend.clone());

        let room = rooms.create_room(host.id, Difficulty::Easy, None).await.unwrap();
        rooms.join_room(room.id, guest.id).await.unwrap();

        assert_eq!(
            rooms.leave_room(room.id, host.id).await.unwrap(),
            LeaveOutcome::RoomDeleted
        );
        assert!(rooms.participants(room.id).await.unwrap().is_empty());
        assert!(matches!(
            backend.get_room(room.id).await,
            Err(BackendError::NotFound)
        ));
        assert_eq!(
            rooms.leave_room(room.id, guest.id).await.unwrap(),
            LeaveOutcome::AlreadyGone
        );
    }

    #[tokio::test]
    async fn leaving_a_finished_room_keeps_it() {
        let (_, backend) = local_backend();
        let host = signed_up(&backend, "host").await;
        let guest = signed_up(&backend, "guest").await;
        let rooms = RoomManager::new(backend.clone());

        let room = rooms.create_room(host.id, Difficulty::Easy, None).await.unwrap();
        rooms.join_room(room.id, guest.id).await.unwrap();
        rooms.start_game(room.id, host.id).await.unwrap();
        let finished = rooms.finish_game(room.id, host.id).await.unwrap();
        assert!(finished.finished_at.is_some());

        assert_eq!(
            rooms.leave_room(room.id, host.id).await.unwrap(),
            LeaveOutcome::Left
        );
        assert_eq!(rooms.participants(room.id).await.unwrap().len(), 1);
    }
}
