//! CRUD operations for [`Participant`] join records.

use chrono::Utc;
use rusqlite::params;
use uuid::Uuid;

use droprain_shared::{RoomId, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{decode_ts, decode_uuid, encode_ts, Participant};

impl Database {
    /// Add `user` to `room`.
    ///
    /// A second join by the same user yields [`StoreError::Conflict`]; a
    /// missing room or user yields [`StoreError::NotFound`].
    pub fn add_participant(&self, room: RoomId, user: UserId) -> Result<Participant> {
        let participant = Participant {
            id: Uuid::new_v4(),
            room_id: room,
            user_id: user,
            nickname: None,
            joined_at: Utc::now(),
        };

        self.conn()
            .execute(
                "INSERT INTO room_participants (id, room_id, user_id, joined_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    participant.id.to_string(),
                    room.to_string(),
                    user.to_string(),
                    encode_ts(&participant.joined_at),
                ],
            )
            .map_err(StoreError::from_write)?;

        let nickname = Some(self.get_user(user)?.nickname);
        Ok(Participant {
            nickname,
            ..participant
        })
    }

    /// Participants of a room in join order, with nicknames filled in.
    pub fn list_participants(&self, room: RoomId) -> Result<Vec<Participant>> {
        let mut stmt = self.conn().prepare(
            "SELECT p.id, p.room_id, p.user_id, u.nickname, p.joined_at
             FROM room_participants p
             LEFT JOIN users u ON u.id = p.user_id
             WHERE p.room_id = ?1
             ORDER BY p.joined_at ASC",
        )?;

        let rows = stmt.query_map(params![room.to_string()], row_to_participant)?;

        let mut participants = Vec::new();
        for row in rows {
            participants.push(row?);
        }
        Ok(participants)
    }

    pub fn count_participants(&self, room: RoomId) -> Result<u32> {
        let count = self.conn().query_row(
            "SELECT COUNT(*) FROM room_participants WHERE room_id = ?1",
            params![room.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Remove one participant.  Returns the removed row, if any.
    pub fn remove_participant(&self, room: RoomId, user: UserId) -> Result<Option<Participant>> {
        let removed = self
            .list_participants(room)?
            .into_iter()
            .find(|p| p.user_id == user);

        if removed.is_some() {
            self.conn().execute(
                "DELETE FROM room_participants WHERE room_id = ?1 AND user_id = ?2",
                params![room.to_string(), user.to_string()],
            )?;
        }
        Ok(removed)
    }

    /// Remove every participant of a room, returning the removed rows.
    pub fn remove_all_participants(&self, room: RoomId) -> Result<Vec<Participant>> {
        let removed = self.list_participants(room)?;
        self.conn().execute(
            "DELETE FROM room_participants WHERE room_id = ?1",
            params![room.to_string()],
        )?;
        Ok(removed)
    }
}

fn row_to_participant(row: &rusqlite::Row<'_>) -> rusqlite::Result<Participant> {
    let id: String = row.get(0)?;
    let room: String = row.get(1)?;
    let user: String = row.get(2)?;
    let joined: String = row.get(4)?;

    Ok(Participant {
        id: decode_uuid(0, &id)?,
        room_id: RoomId(decode_uuid(1, &room)?),
        user_id: UserId(decode_uuid(2, &user)?),
        nickname: row.get(3)?,
        joined_at: decode_ts(4, &joined)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{new_room, seed_user};

    #[test]
    fn join_is_unique_per_room_and_user() {
        let db = Database::open_in_memory().unwrap();
        let host = seed_user(&db, "host");
        let guest = seed_user(&db, "guest");
        let room = db.create_room(&new_room(host.id, "JOIN01")).unwrap();

        db.add_participant(room.id, host.id).unwrap();
        db.add_participant(room.id, guest.id).unwrap();
        let err = db.add_participant(room.id, guest.id).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let listed = db.list_participants(room.id).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].nickname.as_deref(), Some("host"));
        assert_eq!(db.count_participants(room.id).unwrap(), 2);
    }

    #[test]
    fn joining_a_missing_room_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let guest = seed_user(&db, "guest");
        let err = db.add_participant(RoomId::new(), guest.id).unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[test]
    fn removal_and_room_cascade() {
        let db = Database::open_in_memory().unwrap();
        let host = seed_user(&db, "host");
        let guest = seed_user(&db, "guest");
        let room = db.create_room(&new_room(host.id, "LEAVE1")).unwrap();
        db.add_participant(room.id, host.id).unwrap();
        db.add_participant(room.id, guest.id).unwrap();

        assert!(db.remove_participant(room.id, guest.id).unwrap().is_some());
        assert!(db.remove_participant(room.id, guest.id).unwrap().is_none());

        db.delete_room(room.id).unwrap();
        assert_eq!(db.count_participants(room.id).unwrap(), 0);
    }
}
