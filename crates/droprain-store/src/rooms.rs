//! CRUD operations for [`Room`] records.

use chrono::{DateTime, Utc};
use rusqlite::params;

use droprain_shared::{Problem, RoomId, RoomStatus, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{
    decode_difficulty, decode_json, decode_status, decode_ts, decode_uuid, encode_ts, NewRoom,
    Room,
};

const ROOM_COLUMNS: &str = "id, room_code, host_id, difficulty, custom_tables, status, \
     max_players, created_at, finished_at, current_problem, problem_created_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a room in `waiting` status.
    ///
    /// A code already used by a live room yields [`StoreError::Conflict`];
    /// an unknown host yields [`StoreError::NotFound`].
    pub fn create_room(&self, new: &NewRoom) -> Result<Room> {
        let room = Room {
            id: RoomId::new(),
            room_code: new.room_code.clone(),
            host_id: new.host_id,
            difficulty: new.difficulty,
            custom_tables: new.custom_tables.clone(),
            status: RoomStatus::Waiting,
            max_players: new.max_players,
            created_at: Utc::now(),
            finished_at: None,
            current_problem: None,
            problem_created_at: None,
        };

        let tables = room
            .custom_tables
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.conn()
            .execute(
                "INSERT INTO rooms (id, room_code, host_id, difficulty, custom_tables, status,
                                    max_players, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    room.id.to_string(),
                    room.room_code,
                    room.host_id.to_string(),
                    room.difficulty.as_str(),
                    tables,
                    room.status.as_str(),
                    room.max_players,
                    encode_ts(&room.created_at),
                ],
            )
            .map_err(StoreError::from_write)?;

        // Reload so the returned value carries the stored precision.
        self.get_room(room.id)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_room(&self, id: RoomId) -> Result<Room> {
        self.conn()
            .query_row(
                &format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE id = ?1"),
                params![id.to_string()],
                row_to_room,
            )
            .map_err(StoreError::from_query)
    }

    /// Look up a joinable room by its (already normalized) code.
    pub fn find_waiting_room(&self, code: &str) -> Result<Room> {
        self.conn()
            .query_row(
                &format!(
                    "SELECT {ROOM_COLUMNS} FROM rooms
                     WHERE room_code = ?1 AND status = 'waiting'"
                ),
                params![code],
                row_to_room,
            )
            .map_err(StoreError::from_query)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Set the room status.  `finished_at` is written as given, so callers
    /// stamp it when moving to `finished`.
    pub fn set_room_status(
        &self,
        id: RoomId,
        status: RoomStatus,
        finished_at: Option<DateTime<Utc>>,
    ) -> Result<Room> {
        let affected = self.conn().execute(
            "UPDATE rooms SET status = ?2, finished_at = COALESCE(?3, finished_at)
             WHERE id = ?1",
            params![
                id.to_string(),
                status.as_str(),
                finished_at.as_ref().map(encode_ts),
            ],
        )
        .map_err(StoreError::from_write)?;

        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        self.get_room(id)
    }

    /// Replace (or clear, with `None`) the embedded current problem.  The
    /// problem timestamp column mirrors the problem's own creation time.
    pub fn set_room_problem(&self, id: RoomId, problem: Option<&Problem>) -> Result<Room> {
        let json = problem.map(serde_json::to_string).transpose()?;
        let created = problem.map(|p| encode_ts(&p.created_at));

        let affected = self.conn().execute(
            "UPDATE rooms SET current_problem = ?2, problem_created_at = ?3 WHERE id = ?1",
            params![id.to_string(), json, created],
        )?;

        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        self.get_room(id)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete a room; participants and session rows cascade.  Returns the
    /// deleted row, or `None` if it did not exist.
    pub fn delete_room(&self, id: RoomId) -> Result<Option<Room>> {
        let room = match self.get_room(id) {
            Ok(room) => room,
            Err(StoreError::NotFound) => return Ok(None),
            Err(e) => return Err(e),
        };
        self.conn()
            .execute("DELETE FROM rooms WHERE id = ?1", params![id.to_string()])?;
        Ok(Some(room))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn row_to_room(row: &rusqlite::Row<'_>) -> rusqlite::Result<Room> {
    let id: String = row.get(0)?;
    let host: String = row.get(2)?;
    let difficulty: String = row.get(3)?;
    let tables: Option<String> = row.get(4)?;
    let status: String = row.get(5)?;
    let created: String = row.get(7)?;
    let finished: Option<String> = row.get(8)?;
    let problem: Option<String> = row.get(9)?;
    let problem_created: Option<String> = row.get(10)?;

    Ok(Room {
        id: RoomId(decode_uuid(0, &id)?),
        room_code: row.get(1)?,
        host_id: UserId(decode_uuid(2, &host)?),
        difficulty: decode_difficulty(3, &difficulty)?,
        custom_tables: tables.map(|t| decode_json(4, &t)).transpose()?,
        status: decode_status(5, &status)?,
        max_players: row.get(6)?,
        created_at: decode_ts(7, &created)?,
        finished_at: finished.map(|f| decode_ts(8, &f)).transpose()?,
        current_problem: problem.map(|p| decode_json(9, &p)).transpose()?,
        problem_created_at: problem_created.map(|p| decode_ts(10, &p)).transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{new_room, seed_user};
    use droprain_shared::Difficulty;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn live_codes_are_unique_but_finished_ones_free_up() {
        let db = Database::open_in_memory().unwrap();
        let host = seed_user(&db, "host");

        let room = db.create_room(&new_room(host.id, "ABC123")).unwrap();
        let err = db.create_room(&new_room(host.id, "ABC123")).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        db.set_room_status(room.id, RoomStatus::Finished, Some(Utc::now()))
            .unwrap();
        db.create_room(&new_room(host.id, "ABC123")).unwrap();
    }

    #[test]
    fn unknown_host_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let err = db
            .create_room(&new_room(UserId::new(), "ZZZ999"))
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[test]
    fn only_waiting_rooms_are_found_by_code() {
        let db = Database::open_in_memory().unwrap();
        let host = seed_user(&db, "host");
        let room = db.create_room(&new_room(host.id, "Q1W2E3")).unwrap();

        assert_eq!(db.find_waiting_room("Q1W2E3").unwrap().id, room.id);

        db.set_room_status(room.id, RoomStatus::Playing, None).unwrap();
        assert!(matches!(
            db.find_waiting_room("Q1W2E3"),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn problem_is_embedded_and_cleared() {
        let db = Database::open_in_memory().unwrap();
        let host = seed_user(&db, "host");
        let mut new = new_room(host.id, "PRB001");
        new.difficulty = Difficulty::Custom;
        new.custom_tables = Some(vec![7, 8]);
        let room = db.create_room(&new).unwrap();
        assert_eq!(room.tables(), vec![7, 8]);

        let mut rng = StdRng::seed_from_u64(7);
        let problem = Problem::generate(
            &mut rng,
            room.difficulty.config(),
            &room.tables(),
            None,
            Utc::now(),
        );

        let stored = db.set_room_problem(room.id, Some(&problem)).unwrap();
        assert_eq!(stored.current_problem.as_ref(), Some(&problem));
        assert!(stored.problem_created_at.is_some());

        let cleared = db.set_room_problem(room.id, None).unwrap();
        assert!(cleared.current_problem.is_none());
        assert!(cleared.problem_created_at.is_none());
    }

    #[test]
    fn finishing_stamps_finish_time() {
        let db = Database::open_in_memory().unwrap();
        let host = seed_user(&db, "host");
        let room = db.create_room(&new_room(host.id, "FIN001")).unwrap();

        let finished = db
            .set_room_status(room.id, RoomStatus::Finished, Some(Utc::now()))
            .unwrap();
        assert_eq!(finished.status, RoomStatus::Finished);
        assert!(finished.finished_at.is_some());

        assert!(db.delete_room(room.id).unwrap().is_some());
        assert!(db.delete_room(room.id).unwrap().is_none());
    }
}
