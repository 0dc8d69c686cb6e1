//! CRUD operations for [`User`] profiles.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use droprain_shared::UserId;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{decode_ts, decode_uuid, encode_ts, User};

const USER_COLUMNS: &str = "id, nickname, best_score, created_at, updated_at";

impl Database {
    /// Insert a new profile.  A taken nickname yields [`StoreError::Conflict`].
    pub fn create_user(&self, user: &User) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO users (id, nickname, best_score, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    user.id.to_string(),
                    user.nickname,
                    user.best_score,
                    encode_ts(&user.created_at),
                    encode_ts(&user.updated_at),
                ],
            )
            .map_err(StoreError::from_write)?;
        Ok(())
    }

    pub fn get_user(&self, id: UserId) -> Result<User> {
        self.conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id.to_string()],
                row_to_user,
            )
            .map_err(StoreError::from_query)
    }

    pub fn find_user_by_nickname(&self, nickname: &str) -> Result<Option<User>> {
        let user = self
            .conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE nickname = ?1"),
                params![nickname],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    /// Store `score` as the new best score if it beats the current one.
    ///
    /// The comparison happens inside the `UPDATE`, so the stored value never
    /// decreases no matter how writers interleave.  Returns `true` when the
    /// value was raised.
    pub fn raise_best_score(&self, id: UserId, score: u32) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE users SET best_score = ?2, updated_at = ?3
             WHERE id = ?1 AND best_score < ?2",
            params![id.to_string(), score, encode_ts(&Utc::now())],
        )?;
        Ok(affected > 0)
    }

    /// Profiles ordered by best score, highest first.
    pub fn top_users(&self, limit: u32) -> Result<Vec<User>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users
             ORDER BY best_score DESC, created_at ASC
             LIMIT ?1"
        ))?;

        let rows = stmt.query_map(params![limit], row_to_user)?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }

    /// Number of profiles whose best score is strictly above `score`.
    pub fn count_users_above(&self, score: u32) -> Result<u32> {
        let count = self.conn().query_row(
            "SELECT COUNT(*) FROM users WHERE best_score > ?1",
            params![score],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let id: String = row.get(0)?;
    let created: String = row.get(3)?;
    let updated: String = row.get(4)?;

    Ok(User {
        id: UserId(decode_uuid(0, &id)?),
        nickname: row.get(1)?,
        best_score: row.get(2)?,
        created_at: decode_ts(3, &created)?,
        updated_at: decode_ts(4, &updated)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(nickname: &str) -> User {
        let now = Utc::now();
        User {
            id: UserId::new(),
            nickname: nickname.to_string(),
            best_score: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn duplicate_nickname_conflicts() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&user("alice")).unwrap();

        let err = db.create_user(&user("alice")).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn best_score_only_goes_up() {
        let db = Database::open_in_memory().unwrap();
        let alice = user("alice");
        db.create_user(&alice).unwrap();

        assert!(db.raise_best_score(alice.id, 120).unwrap());
        assert!(!db.raise_best_score(alice.id, 80).unwrap());
        assert!(!db.raise_best_score(alice.id, 120).unwrap());
        assert_eq!(db.get_user(alice.id).unwrap().best_score, 120);
    }

    #[test]
    fn ranking_helpers() {
        let db = Database::open_in_memory().unwrap();
        for (name, score) in [("aa", 50), ("bb", 300), ("cc", 120)] {
            let u = user(name);
            db.create_user(&u).unwrap();
            db.raise_best_score(u.id, score).unwrap();
        }

        let top: Vec<_> = db
            .top_users(2)
            .unwrap()
            .into_iter()
            .map(|u| u.nickname)
            .collect();
        assert_eq!(top, vec!["bb", "cc"]);
        assert_eq!(db.count_users_above(120).unwrap(), 1);
        assert!(db.find_user_by_nickname("zz").unwrap().is_none());
    }
}
