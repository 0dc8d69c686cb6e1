//! # droprain-client
//!
//! Client side of the multiplication-rain game: everything a player's
//! device does between the screen and the shared backend.  Rooms are
//! created and joined through [`rooms`], kept in sync by [`sync`], fed with
//! problems by the host's [`broadcast`] task, played locally with
//! [`game`] and [`droplets`], and scored through [`scores`].

pub mod auth;
pub mod broadcast;
pub mod config;
pub mod droplets;
pub mod error;
pub mod game;
pub mod leaderboard;
pub mod multiplayer;
pub mod retry;
pub mod rooms;
pub mod scores;
pub mod solo;
pub mod state;
pub mod sync;

use std::sync::Arc;

use tracing_subscriber::{fmt, EnvFilter};

use droprain_store::{Backend, LocalBackend, StoreError};

use crate::config::ClientConfig;

pub use error::{ClientError, ErrorKind, Result};

/// The backend every client component talks to.
pub type SharedBackend = Arc<dyn Backend>;

/// Install the global tracing subscriber.  `RUST_LOG` overrides the default
/// filter.  Calling it twice is harmless.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("droprain_client=debug,droprain_store=info,droprain_shared=info,warn")
    });

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}

/// Open the local backend: on disk when `db_path` is set, in memory
/// otherwise.
pub fn open_backend(config: &ClientConfig) -> std::result::Result<SharedBackend, StoreError> {
    let backend = match &config.db_path {
        Some(path) => LocalBackend::open_at(path)?,
        None => LocalBackend::in_memory()?,
    };
    Ok(Arc::new(backend))
}
