//! Client-wide context.
//!
//! [`AppState`] replaces ambient globals: it owns the backend handle, the
//! configuration, the signed-in user and the room the user is in.  Screens
//! borrow it; entering and leaving a room go through it so the room context
//! never outlives the membership.

use droprain_shared::{Difficulty, RoomStatus};
use droprain_store::Room;

use crate::auth::AuthContext;
use crate::config::ClientConfig;
use crate::error::Result;
use crate::leaderboard::Leaderboard;
use crate::rooms::{LeaveOutcome, RoomManager};
use crate::SharedBackend;

/// The room the signed-in user currently belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomContext {
    pub room: Room,
    pub is_host: bool,
}

pub struct AppState {
    pub backend: SharedBackend,
    pub config: ClientConfig,
    pub auth: AuthContext,
    /// `None` outside the multiplayer screens.
    pub room: Option<RoomContext>,
}

impl AppState {
    pub fn new(backend: SharedBackend, config: ClientConfig) -> Self {
        Self {
            auth: AuthContext::new(backend.clone()),
            backend,
            config,
            room: None,
        }
    }

    pub fn rooms(&self) -> RoomManager {
        RoomManager::new(self.backend.clone())
    }

    pub fn leaderboard(&self) -> Leaderboard {
        Leaderboard::new(self.backend.clone())
    }

    fn enter(&mut self, room: Room) -> &RoomContext {
        let is_host = self
            .auth
            .current_user()
            .is_some_and(|user| room.is_host(user.id));
        tracing::debug!(room_id = %room.id, is_host, "entered room");
        self.room.insert(RoomContext { room, is_host })
    }

    /// Create a room hosted by the signed-in user and enter it.
    pub async fn create_room(
        &mut self,
        difficulty: Difficulty,
        custom_tables: Option<&[u32]>,
    ) -> Result<&RoomContext> {
        let user = self.auth.require_user()?.id;
        let room = self.rooms().create_room(user, difficulty, custom_tables).await?;
        Ok(self.enter(room))
    }

    /// Join a waiting room by its code and enter it.
    pub async fn join_room(&mut self, code: &str) -> Result<&RoomContext> {
        let user = self.auth.require_user()?.id;
        let room = self.rooms().join_room_by_code(code, user).await?;
        Ok(self.enter(room))
    }

    /// Leave the current room, if any, and drop the room context.
    pub async fn leave_room(&mut self) -> Result<Option<LeaveOutcome>> {
        let Some(ctx) = self.room.take() else {
            return Ok(None);
        };
        let user = self.auth.require_user()?.id;
        let outcome = self.rooms().leave_room(ctx.room.id, user).await?;
        Ok(Some(outcome))
    }

    /// Re-read the current room and refresh the context.
    pub async fn refresh_room(&mut self) -> Result<Option<&RoomContext>> {
        let Some(ctx) = self.room.as_ref() else {
            return Ok(None);
        };
        let room = self.rooms().find_room(ctx.room.id).await?;
        Ok(Some(self.enter(room)))
    }

    pub fn in_active_room(&self) -> bool {
        self.room
            .as_ref()
            .is_some_and(|ctx| ctx.room.status != RoomStatus::Finished)
    }

    /// Sign out, leaving the current room first.
    pub async fn sign_out(&mut self) -> Result<()> {
        if let Err(e) = self.leave_room().await {
            tracing::warn!(error = %e, "leaving room on sign-out failed");
        }
        self.auth.sign_out();
        Ok(())
    }
}
