//! Client-side input validation, run before any backend call.

use crate::constants::{NICKNAME_MAX_LEN, NICKNAME_MIN_LEN, PASSWORD_MIN_LEN, ROOM_CODE_LEN};
use crate::error::ValidationError;
use crate::room_code::normalize_room_code;

/// Nicknames are 2-20 characters of Hangul syllables, ASCII letters or digits.
pub fn validate_nickname(nickname: &str) -> Result<(), ValidationError> {
    if nickname.trim().is_empty() {
        return Err(ValidationError::NicknameEmpty);
    }

    let len = nickname.chars().count();
    if len < NICKNAME_MIN_LEN {
        return Err(ValidationError::NicknameTooShort { min: NICKNAME_MIN_LEN });
    }
    if len > NICKNAME_MAX_LEN {
        return Err(ValidationError::NicknameTooLong { max: NICKNAME_MAX_LEN });
    }

    let allowed = |c: char| c.is_ascii_alphanumeric() || ('가'..='힣').contains(&c);
    if !nickname.chars().all(allowed) {
        return Err(ValidationError::NicknameCharset);
    }

    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::PasswordEmpty);
    }
    if password.chars().count() < PASSWORD_MIN_LEN {
        return Err(ValidationError::PasswordTooShort { min: PASSWORD_MIN_LEN });
    }
    Ok(())
}

pub fn validate_password_confirm(password: &str, confirm: &str) -> Result<(), ValidationError> {
    if password != confirm {
        return Err(ValidationError::PasswordMismatch);
    }
    Ok(())
}

/// Room codes are case-insensitive on input; the check runs on the
/// normalized form.
pub fn validate_room_code(code: &str) -> Result<(), ValidationError> {
    let code = normalize_room_code(code);
    if code.is_empty() {
        return Err(ValidationError::RoomCodeEmpty);
    }
    if code.chars().count() != ROOM_CODE_LEN {
        return Err(ValidationError::RoomCodeLength {
            expected: ROOM_CODE_LEN,
        });
    }
    if !code.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()) {
        return Err(ValidationError::RoomCodeCharset);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nickname_rules() {
        assert!(validate_nickname("player1").is_ok());
        assert!(validate_nickname("구구단왕").is_ok());
        assert_eq!(validate_nickname("  "), Err(ValidationError::NicknameEmpty));
        assert_eq!(
            validate_nickname("a"),
            Err(ValidationError::NicknameTooShort { min: 2 })
        );
        assert_eq!(
            validate_nickname(&"x".repeat(21)),
            Err(ValidationError::NicknameTooLong { max: 20 })
        );
        assert_eq!(
            validate_nickname("bad name"),
            Err(ValidationError::NicknameCharset)
        );
        assert_eq!(validate_nickname("ab_c"), Err(ValidationError::NicknameCharset));
    }

    #[test]
    fn password_rules() {
        assert_eq!(validate_password(""), Err(ValidationError::PasswordEmpty));
        assert_eq!(
            validate_password("12345"),
            Err(ValidationError::PasswordTooShort { min: 6 })
        );
        assert!(validate_password("123456").is_ok());
        assert_eq!(
            validate_password_confirm("abcdef", "abcdeg"),
            Err(ValidationError::PasswordMismatch)
        );
    }

    #[test]
    fn room_code_rules() {
        assert!(validate_room_code("abc123").is_ok());
        assert_eq!(validate_room_code(""), Err(ValidationError::RoomCodeEmpty));
        assert_eq!(
            validate_room_code("ABC12"),
            Err(ValidationError::RoomCodeLength { expected: 6 })
        );
        assert_eq!(
            validate_room_code("AB-123"),
            Err(ValidationError::RoomCodeCharset)
        );
    }
}
