//! Single-player game.
//!
//! Same engine and droplet physics as multiplayer, but problems are made
//! locally on the difficulty's spawn interval and the only backend traffic
//! is the save at the end.

use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;

use droprain_shared::difficulty::validate_custom_tables;
use droprain_shared::problem::FactorPair;
use droprain_shared::{Difficulty, DifficultyConfig, Problem, UserId};
use droprain_store::{GameSession, NewSession, SessionRepo};

use crate::config::ClientConfig;
use crate::droplets::DropletField;
use crate::error::Result;
use crate::game::{AnswerResult, FrameReport, GameEngine};
use crate::scores::{raise_best_score, SessionStats};
use crate::SharedBackend;

pub struct SoloGame {
    difficulty: Difficulty,
    config: &'static DifficultyConfig,
    tables: Vec<u32>,
    engine: GameEngine,
    field: DropletField,
    last_spawn: Instant,
    previous: Option<FactorPair>,
}

impl SoloGame {
    /// Start a game at `now`.  A custom difficulty needs a valid table set.
    pub fn new(difficulty: Difficulty, custom_tables: Option<&[u32]>, now: Instant) -> Result<Self> {
        let tables = match difficulty {
            Difficulty::Custom => validate_custom_tables(custom_tables.unwrap_or_default())?,
            _ => difficulty.resolve_tables(None),
        };
        Ok(Self {
            difficulty,
            config: difficulty.config(),
            tables,
            engine: GameEngine::new(),
            field: DropletField::new(),
            last_spawn: now,
            previous: None,
        })
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn engine(&self) -> &GameEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut GameEngine {
        &mut self.engine
    }

    pub fn field(&self) -> &DropletField {
        &self.field
    }

    /// Move droplets one frame and spawn when the interval has passed.
    pub fn frame(&mut self, now: Instant) -> FrameReport {
        let mut report = FrameReport::default();
        if self.engine.is_active() {
            report.missed = self.engine.advance(&mut self.field, now);

            let interval = Duration::from_millis(self.config.spawn_interval_ms);
            if self.engine.is_active() && now.duration_since(self.last_spawn) > interval {
                let problem = {
                    let mut rng = rand::thread_rng();
                    Problem::generate(&mut rng, self.config, &self.tables, self.previous, Utc::now())
                };
                self.previous = Some(problem.factors());
                self.field.spawn_local(&problem);
                self.last_spawn = now;
                report.spawned = true;
            }
        }
        if self.engine.take_game_over() {
            self.field.clear();
            report.game_over = true;
        }
        report
    }

    pub fn submit_answer(&mut self, answer: u32, now: Instant) -> AnswerResult {
        self.engine.answer(&mut self.field, answer, now)
    }

    pub fn stats(&self) -> SessionStats {
        self.engine.stats()
    }
}

/// Outcome of [`save_result`].
#[derive(Debug, Clone, PartialEq)]
pub struct SoloSave {
    pub session: GameSession,
    pub best_score_raised: bool,
}

/// Store a finished single-player game as a standalone session and raise
/// the best score when it was beaten.
pub async fn save_result(
    backend: &SharedBackend,
    user: UserId,
    difficulty: Difficulty,
    stats: SessionStats,
    config: &ClientConfig,
) -> Result<SoloSave> {
    let new = NewSession {
        room_id: None,
        user_id: user,
        score: stats.score,
        correct_count: stats.correct_count,
        total_count: stats.total_count,
        accuracy: stats.accuracy(),
        difficulty,
        played_at: Utc::now(),
    };
    let session = config
        .final_retry
        .run("solo_save", || backend.insert_session(new.clone()))
        .await?;
    tracing::info!(user_id = %user, score = stats.score, "solo game saved");

    let best_score_raised = raise_best_score(backend, user, stats.score, config).await;
    Ok(SoloSave {
        session,
        best_score_raised,
    })
}
