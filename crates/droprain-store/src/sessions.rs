//! CRUD operations for [`GameSession`] score records.

use chrono::{DateTime, Utc};
use rusqlite::params;

use droprain_shared::{RoomId, SessionId, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{
    decode_difficulty, decode_ts, decode_uuid, encode_ts, GameSession, NewSession, SessionUpdate,
};

const SESSION_SELECT: &str = "SELECT s.id, s.room_id, s.user_id, u.nickname, s.score, \
     s.correct_count, s.total_count, s.accuracy, s.difficulty, s.played_at \
     FROM game_sessions s LEFT JOIN users u ON u.id = s.user_id";

impl Database {
    /// Insert a session row and return it.
    pub fn insert_session(&self, new: &NewSession) -> Result<GameSession> {
        let id = SessionId::new();
        self.conn()
            .execute(
                "INSERT INTO game_sessions (id, room_id, user_id, score, correct_count,
                                            total_count, accuracy, difficulty, played_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    id.to_string(),
                    new.room_id.map(|r| r.to_string()),
                    new.user_id.to_string(),
                    new.score,
                    new.correct_count,
                    new.total_count,
                    new.accuracy,
                    new.difficulty.as_str(),
                    encode_ts(&new.played_at),
                ],
            )
            .map_err(StoreError::from_write)?;

        self.get_session(id)
    }

    pub fn get_session(&self, id: SessionId) -> Result<GameSession> {
        self.conn()
            .query_row(
                &format!("{SESSION_SELECT} WHERE s.id = ?1"),
                params![id.to_string()],
                row_to_session,
            )
            .map_err(StoreError::from_query)
    }

    /// Overwrite the running totals of an existing row.
    pub fn update_session(&self, id: SessionId, update: &SessionUpdate) -> Result<GameSession> {
        let affected = self.conn().execute(
            "UPDATE game_sessions
             SET score = ?2, correct_count = ?3, total_count = ?4, accuracy = ?5, played_at = ?6
             WHERE id = ?1",
            params![
                id.to_string(),
                update.score,
                update.correct_count,
                update.total_count,
                update.accuracy,
                encode_ts(&update.played_at),
            ],
        )?;

        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        self.get_session(id)
    }

    /// The freshest session row of `user` in `room`, if any.
    pub fn find_session(&self, room: RoomId, user: UserId) -> Result<Option<GameSession>> {
        let mut rows = self.query_sessions(
            &format!(
                "{SESSION_SELECT} WHERE s.room_id = ?1 AND s.user_id = ?2
                 ORDER BY s.played_at DESC, s.score DESC LIMIT 1"
            ),
            params![room.to_string(), user.to_string()],
        )?;
        Ok(rows.pop())
    }

    /// Delete every row of `user` in `room`, returning the removed rows.
    pub fn delete_sessions(&self, room: RoomId, user: UserId) -> Result<Vec<GameSession>> {
        let removed = self.query_sessions(
            &format!("{SESSION_SELECT} WHERE s.room_id = ?1 AND s.user_id = ?2"),
            params![room.to_string(), user.to_string()],
        )?;
        self.conn().execute(
            "DELETE FROM game_sessions WHERE room_id = ?1 AND user_id = ?2",
            params![room.to_string(), user.to_string()],
        )?;
        Ok(removed)
    }

    /// All rows of a room, most recent first.
    pub fn list_room_sessions(&self, room: RoomId) -> Result<Vec<GameSession>> {
        self.query_sessions(
            &format!("{SESSION_SELECT} WHERE s.room_id = ?1 ORDER BY s.played_at DESC"),
            params![room.to_string()],
        )
    }

    /// Every row (single and multiplayer) played at or after `since`, most
    /// recent first.
    pub fn list_sessions_since(&self, since: DateTime<Utc>) -> Result<Vec<GameSession>> {
        self.query_sessions(
            &format!("{SESSION_SELECT} WHERE s.played_at >= ?1 ORDER BY s.played_at DESC"),
            params![encode_ts(&since)],
        )
    }

    fn query_sessions(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<GameSession>> {
        let mut stmt = self.conn().prepare(sql)?;
        let rows = stmt.query_map(params, row_to_session)?;

        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row?);
        }
        Ok(sessions)
    }
}

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<GameSession> {
    let id: String = row.get(0)?;
    let room: Option<String> = row.get(1)?;
    let user: String = row.get(2)?;
    let difficulty: String = row.get(8)?;
    let played: String = row.get(9)?;

    Ok(GameSession {
        id: SessionId(decode_uuid(0, &id)?),
        room_id: room.map(|r| decode_uuid(1, &r).map(RoomId)).transpose()?,
        user_id: UserId(decode_uuid(2, &user)?),
        nickname: row.get(3)?,
        score: row.get(4)?,
        correct_count: row.get(5)?,
        total_count: row.get(6)?,
        accuracy: row.get(7)?,
        difficulty: decode_difficulty(8, &difficulty)?,
        played_at: decode_ts(9, &played)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{new_room, seed_user};
    use chrono::Duration;
    use droprain_shared::Difficulty;

    fn new_session(room: Option<RoomId>, user: UserId, score: u32, at: DateTime<Utc>) -> NewSession {
        NewSession {
            room_id: room,
            user_id: user,
            score,
            correct_count: score / 10,
            total_count: score / 10,
            accuracy: 100.0,
            difficulty: Difficulty::Easy,
            played_at: at,
        }
    }

    #[test]
    fn insert_then_update_refreshes_played_at() {
        let db = Database::open_in_memory().unwrap();
        let host = seed_user(&db, "host");
        let room = db.create_room(&new_room(host.id, "SES001")).unwrap();
        let t0 = Utc::now();

        let row = db
            .insert_session(&new_session(Some(room.id), host.id, 0, t0))
            .unwrap();
        assert_eq!(row.nickname.as_deref(), Some("host"));

        let updated = db
            .update_session(
                row.id,
                &SessionUpdate {
                    score: 30,
                    correct_count: 3,
                    total_count: 4,
                    accuracy: 75.0,
                    played_at: t0 + Duration::seconds(5),
                },
            )
            .unwrap();
        assert_eq!(updated.score, 30);
        assert!(updated.played_at > row.played_at);

        let found = db.find_session(room.id, host.id).unwrap().unwrap();
        assert_eq!(found.id, row.id);
    }

    #[test]
    fn room_sessions_are_newest_first_and_cascade() {
        let db = Database::open_in_memory().unwrap();
        let host = seed_user(&db, "host");
        let guest = seed_user(&db, "guest");
        let room = db.create_room(&new_room(host.id, "SES002")).unwrap();
        let t0 = Utc::now();

        db.insert_session(&new_session(Some(room.id), host.id, 10, t0))
            .unwrap();
        db.insert_session(&new_session(Some(room.id), guest.id, 20, t0 + Duration::seconds(1)))
            .unwrap();
        db.insert_session(&new_session(None, guest.id, 90, t0)).unwrap();

        let rows = db.list_room_sessions(room.id).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].user_id, guest.id);

        assert_eq!(db.delete_sessions(room.id, guest.id).unwrap().len(), 1);

        db.delete_room(room.id).unwrap();
        assert!(db.list_room_sessions(room.id).unwrap().is_empty());
        // The standalone row survives.
        assert_eq!(db.list_sessions_since(t0 - Duration::days(1)).unwrap().len(), 1);
    }
}
