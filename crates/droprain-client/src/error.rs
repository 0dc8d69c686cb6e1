use thiserror::Error;

use droprain_shared::{RoomStatus, ValidationError};
use droprain_store::BackendError;

/// Coarse classification the UI uses to decide how to present an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad input, rejected before any network call.  Shown inline.
    Validation,
    /// The room or user is gone.
    NotFound,
    /// The request clashes with current shared state.
    Conflict,
    /// Network failure; retried by the caller's policy.
    Transient,
    /// A call outlived its deadline.
    Timeout,
    /// The backend rejected or failed the write for another reason.
    Persistence,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Room not found")]
    RoomNotFound,

    #[error("User not found")]
    UserNotFound,

    #[error("Room is not accepting players (status: {status})")]
    RoomNotWaiting { status: RoomStatus },

    #[error("Room is full ({max} players)")]
    RoomFull { max: u32 },

    #[error("Nickname is already taken")]
    NicknameTaken,

    #[error("Invalid nickname or password")]
    InvalidCredentials,

    #[error("No free room code after {attempts} attempts")]
    RoomCreationExhausted { attempts: u32 },

    #[error("At least {required} players are needed to start ({present} present)")]
    NotEnoughPlayers { required: usize, present: usize },

    #[error("Only the host can do that")]
    NotHost,

    #[error("Not signed in")]
    NotSignedIn,

    #[error("Network error: {0}")]
    Transient(String),

    #[error("{op} timed out after {ms} ms")]
    Timeout { op: &'static str, ms: u64 },

    #[error("Backend error: {0}")]
    Persistence(BackendError),
}

impl From<BackendError> for ClientError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Unavailable(msg) => ClientError::Transient(msg),
            BackendError::Forbidden(_) => ClientError::NotHost,
            other => ClientError::Persistence(other),
        }
    }
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Validation(_) | ClientError::NotSignedIn => ErrorKind::Validation,
            ClientError::RoomNotFound | ClientError::UserNotFound => ErrorKind::NotFound,
            ClientError::RoomNotWaiting { .. }
            | ClientError::RoomFull { .. }
            | ClientError::NicknameTaken
            | ClientError::InvalidCredentials
            | ClientError::RoomCreationExhausted { .. }
            | ClientError::NotEnoughPlayers { .. }
            | ClientError::NotHost => ErrorKind::Conflict,
            ClientError::Transient(_) => ErrorKind::Transient,
            ClientError::Timeout { .. } => ErrorKind::Timeout,
            ClientError::Persistence(BackendError::NotFound) => ErrorKind::NotFound,
            ClientError::Persistence(BackendError::Conflict(_)) => ErrorKind::Conflict,
            ClientError::Persistence(_) => ErrorKind::Persistence,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_errors_map_to_the_taxonomy() {
        let transient: ClientError = BackendError::Unavailable("reset".into()).into();
        assert_eq!(transient.kind(), ErrorKind::Transient);

        let forbidden: ClientError = BackendError::Forbidden("guest".into()).into();
        assert!(matches!(forbidden, ClientError::NotHost));

        let missing: ClientError = BackendError::NotFound.into();
        assert_eq!(missing.kind(), ErrorKind::NotFound);

        let invalid: ClientError = ValidationError::PasswordMismatch.into();
        assert_eq!(invalid.kind(), ErrorKind::Validation);
    }
}
