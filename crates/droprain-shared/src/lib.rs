//! # droprain-shared
//!
//! Domain types and pure game rules shared by the store and the client:
//! identifiers, room status, difficulty presets, problem and room-code
//! generation, input validation and scoring helpers.  Nothing in this crate
//! performs I/O.

pub mod constants;
pub mod difficulty;
pub mod error;
pub mod problem;
pub mod room_code;
pub mod scoring;
pub mod types;
pub mod validation;

pub use difficulty::{Difficulty, DifficultyConfig};
pub use error::ValidationError;
pub use problem::{Problem, ProblemKey};
pub use types::{ItemType, RoomId, RoomStatus, SessionId, UserId};
