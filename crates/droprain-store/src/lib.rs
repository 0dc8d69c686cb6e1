//! # droprain-store
//!
//! The backend the game clients talk to: a relational store for users,
//! credentials, rooms, participants and game sessions, plus a realtime
//! change feed.
//!
//! [`Database`] wraps a `rusqlite::Connection` and provides typed CRUD
//! helpers for every table.  The async repository traits in [`backend`]
//! are what clients program against; [`LocalBackend`] implements them over
//! the database and publishes row changes on a broadcast channel.

pub mod auth;
pub mod backend;
pub mod database;
pub mod feed;
pub mod local;
pub mod migrations;
pub mod models;
pub mod participants;
pub mod rooms;
pub mod sessions;
pub mod users;

mod error;

pub use backend::{
    AuthProvider, Backend, BackendError, BackendResult, ChangeFeed, ParticipantRepo, RoomRepo,
    SessionRepo, UserRepo,
};
pub use database::Database;
pub use error::{Result, StoreError};
pub use feed::{ChangeEvent, ChangeKind, ChangeRow, FeedFilter, Subscription, Table};
pub use local::LocalBackend;
pub use models::*;
