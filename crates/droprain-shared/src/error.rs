use thiserror::Error;

/// Input rejected locally before any backend call is made.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Nickname is required")]
    NicknameEmpty,

    #[error("Nickname must be at least {min} characters")]
    NicknameTooShort { min: usize },

    #[error("Nickname must be at most {max} characters")]
    NicknameTooLong { max: usize },

    #[error("Nickname may only contain Hangul, Latin letters and digits")]
    NicknameCharset,

    #[error("Password is required")]
    PasswordEmpty,

    #[error("Password must be at least {min} characters")]
    PasswordTooShort { min: usize },

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Room code is required")]
    RoomCodeEmpty,

    #[error("Room code must be {expected} characters")]
    RoomCodeLength { expected: usize },

    #[error("Room code may only contain A-Z and 0-9")]
    RoomCodeCharset,

    #[error("Select at least one table")]
    NoTables,

    #[error("Table {0} is outside the allowed range")]
    TableOutOfRange(u32),
}
