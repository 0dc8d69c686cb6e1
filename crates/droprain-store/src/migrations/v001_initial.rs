//! v001 -- Initial schema creation.
//!
//! Creates the five tables the game reads and writes: `users`,
//! `auth_accounts`, `rooms`, `room_participants` and `game_sessions`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users (public profile)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id          TEXT PRIMARY KEY NOT NULL,    -- UUID v4, same as the auth account
    nickname    TEXT NOT NULL UNIQUE,
    best_score  INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL,                -- RFC-3339
    updated_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_users_best_score ON users(best_score DESC);

-- ----------------------------------------------------------------
-- Auth accounts (credential store)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS auth_accounts (
    user_id       TEXT PRIMARY KEY NOT NULL,
    email         TEXT NOT NULL UNIQUE,
    salt          TEXT NOT NULL,              -- hex
    password_hash TEXT NOT NULL,              -- hex BLAKE3(salt || password)
    created_at    TEXT NOT NULL
);

-- ----------------------------------------------------------------
-- Rooms
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS rooms (
    id                 TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    room_code          TEXT NOT NULL,              -- 6 chars [A-Z0-9]
    host_id            TEXT NOT NULL,
    difficulty         TEXT NOT NULL,
    custom_tables      TEXT,                       -- JSON array or NULL
    status             TEXT NOT NULL DEFAULT 'waiting',
    max_players        INTEGER NOT NULL DEFAULT 10,
    created_at         TEXT NOT NULL,
    finished_at        TEXT,
    current_problem    TEXT,                       -- JSON object or NULL
    problem_created_at TEXT,

    FOREIGN KEY (host_id) REFERENCES users(id) ON DELETE CASCADE,
    CHECK (status IN ('waiting', 'playing', 'finished'))
);

-- Codes are only reserved while a room is live.
CREATE UNIQUE INDEX IF NOT EXISTS idx_rooms_active_code
    ON rooms(room_code) WHERE status != 'finished';

-- ----------------------------------------------------------------
-- Room participants
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS room_participants (
    id        TEXT PRIMARY KEY NOT NULL,
    room_id   TEXT NOT NULL,
    user_id   TEXT NOT NULL,
    joined_at TEXT NOT NULL,

    UNIQUE (room_id, user_id),
    FOREIGN KEY (room_id) REFERENCES rooms(id) ON DELETE CASCADE,
    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_participants_room ON room_participants(room_id, joined_at);

-- ----------------------------------------------------------------
-- Game sessions (score records)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS game_sessions (
    id            TEXT PRIMARY KEY NOT NULL,
    room_id       TEXT,                        -- NULL for single-player
    user_id       TEXT NOT NULL,
    score         INTEGER NOT NULL DEFAULT 0,
    correct_count INTEGER NOT NULL DEFAULT 0,
    total_count   INTEGER NOT NULL DEFAULT 0,
    accuracy      REAL NOT NULL DEFAULT 0,
    difficulty    TEXT NOT NULL,
    played_at     TEXT NOT NULL,

    FOREIGN KEY (room_id) REFERENCES rooms(id) ON DELETE CASCADE,
    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_sessions_room_user ON game_sessions(room_id, user_id);
CREATE INDEX IF NOT EXISTS idx_sessions_played_at ON game_sessions(played_at DESC);
"#;

/// Apply the initial schema.
pub fn up(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(UP_SQL)
}
