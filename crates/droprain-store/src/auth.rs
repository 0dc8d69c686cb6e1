//! Credential storage for the local auth provider.
//!
//! Passwords are never stored; only a salted BLAKE3 digest is kept.

use rand::RngCore;
use rusqlite::{params, OptionalExtension};

use droprain_shared::UserId;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{decode_ts, decode_uuid, encode_ts, AuthAccount};

const SALT_LEN: usize = 16;

/// Draw a fresh random salt, hex-encoded.
pub fn generate_salt() -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    hex::encode(salt)
}

/// Hex-encoded BLAKE3 digest of `salt || password`.
pub fn password_digest(salt: &str, password: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hasher.finalize().to_hex().to_string()
}

impl AuthAccount {
    pub fn verify(&self, password: &str) -> bool {
        password_digest(&self.salt, password) == self.password_hash
    }
}

impl Database {
    /// Insert a credential record.  A taken email yields
    /// [`StoreError::Conflict`].
    pub fn create_auth_account(&self, account: &AuthAccount) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO auth_accounts (user_id, email, salt, password_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    account.user_id.to_string(),
                    account.email,
                    account.salt,
                    account.password_hash,
                    encode_ts(&account.created_at),
                ],
            )
            .map_err(StoreError::from_write)?;
        Ok(())
    }

    pub fn find_auth_account(&self, email: &str) -> Result<Option<AuthAccount>> {
        let account = self
            .conn()
            .query_row(
                "SELECT user_id, email, salt, password_hash, created_at
                 FROM auth_accounts WHERE email = ?1",
                params![email],
                |row| {
                    let id: String = row.get(0)?;
                    let created: String = row.get(4)?;
                    Ok(AuthAccount {
                        user_id: UserId(decode_uuid(0, &id)?),
                        email: row.get(1)?,
                        salt: row.get(2)?,
                        password_hash: row.get(3)?,
                        created_at: decode_ts(4, &created)?,
                    })
                },
            )
            .optional()?;
        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn digest_depends_on_salt() {
        assert_ne!(password_digest("aa", "secret"), password_digest("bb", "secret"));
        assert_eq!(password_digest("aa", "secret"), password_digest("aa", "secret"));
        assert_eq!(generate_salt().len(), SALT_LEN * 2);
    }

    #[test]
    fn stored_account_verifies() {
        let db = Database::open_in_memory().unwrap();
        let salt = generate_salt();
        let account = AuthAccount {
            user_id: UserId::new(),
            email: "alice@game.local".into(),
            password_hash: password_digest(&salt, "hunter22"),
            salt,
            created_at: Utc::now(),
        };
        db.create_auth_account(&account).unwrap();

        let loaded = db.find_auth_account("alice@game.local").unwrap().unwrap();
        assert!(loaded.verify("hunter22"));
        assert!(!loaded.verify("hunter23"));

        let err = db.create_auth_account(&account).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }
}
