//! Sign-up / sign-in against the backend's auth provider.
//!
//! Players only ever see nicknames.  The auth provider wants an email, so
//! each nickname maps to a synthetic `{nickname}@game.local` address.

use droprain_shared::constants::AUTH_EMAIL_DOMAIN;
use droprain_shared::validation::{validate_nickname, validate_password, validate_password_confirm};
use droprain_shared::UserId;
use droprain_store::{AuthProvider, BackendError, User, UserRepo};

use crate::error::{ClientError, Result};
use crate::SharedBackend;

pub fn nickname_to_email(nickname: &str) -> String {
    format!("{nickname}@{AUTH_EMAIL_DOMAIN}")
}

/// Signed-in state of one client.  Created signed-out; every successful
/// sign-in replaces the held profile, sign-out clears it.
pub struct AuthContext {
    backend: SharedBackend,
    user: Option<User>,
}

impl AuthContext {
    pub fn new(backend: SharedBackend) -> Self {
        Self {
            backend,
            user: None,
        }
    }

    pub fn current_user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn require_user(&self) -> Result<&User> {
        self.user.as_ref().ok_or(ClientError::NotSignedIn)
    }

    /// Register a new player and sign in as them.
    pub async fn sign_up(&mut self, nickname: &str, password: &str, confirm: &str) -> Result<User> {
        validate_nickname(nickname)?;
        validate_password(password)?;
        validate_password_confirm(password, confirm)?;

        if self.backend.find_user_by_nickname(nickname).await?.is_some() {
            return Err(ClientError::NicknameTaken);
        }

        let user_id = self
            .backend
            .register(&nickname_to_email(nickname), password)
            .await
            .map_err(taken_on_conflict)?;

        let user = self
            .backend
            .insert_user(user_id, nickname)
            .await
            .map_err(taken_on_conflict)?;

        tracing::info!(user_id = %user.id, nickname = %user.nickname, "signed up");
        self.user = Some(user.clone());
        Ok(user)
    }

    /// Sign in with nickname and password.  Any previous session is dropped
    /// first, so a failed attempt leaves the context signed out.
    pub async fn sign_in(&mut self, nickname: &str, password: &str) -> Result<User> {
        validate_nickname(nickname)?;
        validate_password(password)?;

        self.user = None;

        let user_id = self
            .backend
            .authenticate(&nickname_to_email(nickname), password)
            .await?
            .ok_or(ClientError::InvalidCredentials)?;

        let user = self.load_or_create_profile(user_id, nickname).await?;
        tracing::info!(user_id = %user.id, nickname = %user.nickname, "signed in");
        self.user = Some(user.clone());
        Ok(user)
    }

    pub fn sign_out(&mut self) {
        if let Some(user) = self.user.take() {
            tracing::info!(user_id = %user.id, "signed out");
        }
    }

    /// Re-read the signed-in profile, e.g. after a best score was saved.
    pub async fn refresh_profile(&mut self) -> Result<User> {
        let id = self.require_user()?.id;
        let user = self.backend.get_user(id).await.map_err(|e| match e {
            BackendError::NotFound => ClientError::UserNotFound,
            other => other.into(),
        })?;
        self.user = Some(user.clone());
        Ok(user)
    }

    /// Accounts can exist without a profile row when sign-up was interrupted
    /// between the two writes; such a profile is created on first sign-in.
    async fn load_or_create_profile(&self, user_id: UserId, nickname: &str) -> Result<User> {
        match self.backend.get_user(user_id).await {
            Ok(user) => Ok(user),
            Err(BackendError::NotFound) => {
                tracing::warn!(user_id = %user_id, "profile missing, creating it");
                Ok(self
                    .backend
                    .insert_user(user_id, nickname)
                    .await
                    .map_err(taken_on_conflict)?)
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn taken_on_conflict(err: BackendError) -> ClientError {
    match err {
        BackendError::Conflict(_) => ClientError::NicknameTaken,
        other => other.into(),
    }
}
