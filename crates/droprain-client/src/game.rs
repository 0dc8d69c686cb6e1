//! Local game rules: score, lives, levels and item effects.
//!
//! The engine is purely local and shared by single- and multiplayer games.
//! Time is passed in explicitly so the slow effect can be driven by a
//! paused clock in tests.

use std::time::Duration;

use tokio::time::Instant;

use droprain_shared::constants::{
    BASE_SCORE, BONUS_ITEM_SCORE, INITIAL_LIVES, LEVEL_UP_LIFE_BONUS, LEVEL_UP_SCORE, MAX_LIVES,
    SLOW_DURATION_MS, SLOW_SPEED_MULTIPLIER,
};
use droprain_shared::scoring::round_accuracy;
use droprain_shared::ItemType;

use crate::droplets::DropletField;
use crate::scores::SessionStats;

/// Effect of one correct answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrectOutcome {
    pub points: u32,
    pub item: Option<ItemType>,
    /// New level when this answer crossed a level threshold.
    pub level_up: Option<u32>,
    /// The caller should remove the lowest droplet.
    pub clear_lowest: bool,
}

/// What one frame did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameReport {
    pub spawned: bool,
    pub missed: u32,
    /// Set on the frame the game ended, once.
    pub game_over: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerResult {
    Correct(CorrectOutcome),
    Wrong,
    /// The game is paused or over.
    Ignored,
}

#[derive(Debug, Clone)]
pub struct GameEngine {
    score: u32,
    lives: u32,
    level: u32,
    correct_count: u32,
    total_count: u32,
    paused: bool,
    active: bool,
    slow_until: Option<Instant>,
    game_over_reported: bool,
}

impl Default for GameEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl GameEngine {
    /// A running game with full lives.
    pub fn new() -> Self {
        Self {
            score: 0,
            lives: INITIAL_LIVES,
            level: 1,
            correct_count: 0,
            total_count: 0,
            paused: false,
            active: true,
            slow_until: None,
            game_over_reported: false,
        }
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn lives(&self) -> u32 {
        self.lives
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    /// Rounded accuracy percentage; 100 before the first attempt.
    pub fn accuracy(&self) -> u32 {
        round_accuracy(self.correct_count, self.total_count)
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            score: self.score,
            correct_count: self.correct_count,
            total_count: self.total_count,
        }
    }

    /// Running and not paused.
    pub fn is_active(&self) -> bool {
        self.active && !self.paused
    }

    pub fn is_over(&self) -> bool {
        !self.active
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn pause(&mut self) {
        if self.active {
            self.paused = true;
        }
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_slowed(&self, now: Instant) -> bool {
        self.slow_until.is_some_and(|until| now < until)
    }

    /// Fall speed multiplier at `now`.
    pub fn speed_multiplier(&self, now: Instant) -> f64 {
        if self.is_slowed(now) {
            SLOW_SPEED_MULTIPLIER
        } else {
            1.0
        }
    }

    pub fn record_correct(&mut self, item: Option<ItemType>, now: Instant) -> CorrectOutcome {
        let mut points = BASE_SCORE;
        match item {
            Some(ItemType::Bonus) => points += BONUS_ITEM_SCORE,
            // A second SLOW restarts the timer.
            Some(ItemType::Slow) => {
                self.slow_until = Some(now + Duration::from_millis(SLOW_DURATION_MS));
            }
            Some(ItemType::Clear) | None => {}
        }

        self.correct_count += 1;
        self.total_count += 1;
        self.score += points;

        let level_up = (self.score >= self.level * LEVEL_UP_SCORE).then(|| {
            self.level += 1;
            self.lives = (self.lives + LEVEL_UP_LIFE_BONUS).min(MAX_LIVES);
            self.level
        });

        CorrectOutcome {
            points,
            item,
            level_up,
            clear_lowest: item == Some(ItemType::Clear),
        }
    }

    /// Match `answer` against the field: the lowest matching droplet is
    /// taken, no match costs a life.
    pub fn answer(&mut self, field: &mut DropletField, answer: u32, now: Instant) -> AnswerResult {
        if !self.is_active() {
            return AnswerResult::Ignored;
        }
        let Some(droplet) = field.check_answer(answer) else {
            self.record_wrong();
            return AnswerResult::Wrong;
        };
        let outcome = self.record_correct(droplet.item_type, now);
        if outcome.clear_lowest {
            field.remove_lowest();
        }
        AnswerResult::Correct(outcome)
    }

    /// Advance the field one frame; each droplet that falls out costs a
    /// life.  Returns the number missed.
    pub fn advance(&mut self, field: &mut DropletField, now: Instant) -> u32 {
        if !self.is_active() {
            return 0;
        }
        let missed = field.tick(1, self.speed_multiplier(now));
        self.record_misses(missed);
        missed
    }

    /// A wrong answer or a missed droplet: one life and one attempt.
    pub fn record_wrong(&mut self) {
        if !self.active {
            return;
        }
        self.total_count += 1;
        self.lives = self.lives.saturating_sub(1);
        if self.lives == 0 {
            self.end();
        }
    }

    pub fn record_misses(&mut self, count: u32) {
        for _ in 0..count {
            self.record_wrong();
        }
    }

    /// Stop the game, e.g. because the room went away.
    pub fn end(&mut self) {
        self.active = false;
        self.paused = false;
        self.slow_until = None;
    }

    /// `true` exactly once after the game ends.
    pub fn take_game_over(&mut self) -> bool {
        if self.active || self.game_over_reported {
            return false;
        }
        self.game_over_reported = true;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_up_at_hundred_points_restores_a_life() {
        let now = Instant::now();
        let mut game = GameEngine::new();
        game.record_wrong();
        assert_eq!(game.lives(), 4);

        let mut last = None;
        for _ in 0..12 {
            last = game.record_correct(None, now).level_up.or(last);
        }
        assert_eq!(game.score(), 120);
        assert_eq!(game.level(), 2);
        assert_eq!(last, Some(2));
        assert_eq!(game.lives(), 5);
    }

    #[test]
    fn lives_never_exceed_the_cap() {
        let now = Instant::now();
        let mut game = GameEngine::new();
        for _ in 0..10 {
            game.record_correct(None, now);
        }
        assert_eq!(game.level(), 2);
        assert_eq!(game.lives(), 5);
    }

    #[test]
    fn items_change_points_and_speed() {
        let now = Instant::now();
        let mut game = GameEngine::new();

        assert_eq!(game.record_correct(Some(ItemType::Bonus), now).points, 20);
        assert!(game.record_correct(Some(ItemType::Clear), now).clear_lowest);

        game.record_correct(Some(ItemType::Slow), now);
        assert_eq!(game.speed_multiplier(now + Duration::from_secs(19)), 0.4);
        assert_eq!(game.speed_multiplier(now + Duration::from_secs(20)), 1.0);
    }

    #[test]
    fn accuracy_counts_misses() {
        let now = Instant::now();
        let mut game = GameEngine::new();
        assert_eq!(game.accuracy(), 100);
        game.record_correct(None, now);
        game.record_correct(None, now);
        game.record_misses(1);
        assert_eq!(game.accuracy(), 67);
        assert_eq!(game.stats().total_count, 3);
    }

    #[test]
    fn game_over_is_reported_once() {
        let mut game = GameEngine::new();
        game.record_misses(4);
        assert!(!game.take_game_over());
        game.record_misses(3);
        assert!(game.is_over());
        assert_eq!(game.lives(), 0);
        assert_eq!(game.stats().total_count, 5);
        assert!(game.take_game_over());
        assert!(!game.take_game_over());
    }

    fn droplet(a: u32, b: u32, y: f64, item: Option<ItemType>) -> droprain_shared::Problem {
        droprain_shared::Problem {
            multiplicand: a,
            multiplier: b,
            answer: a * b,
            problem: format!("{a}×{b}"),
            x: 100.0,
            y,
            speed: 1.0,
            item_type: item,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn clear_item_takes_the_next_lowest_droplet_too() {
        let now = Instant::now();
        let mut game = GameEngine::new();
        let mut field = DropletField::new();
        field.spawn_local(&droplet(2, 3, 50.0, Some(ItemType::Clear)));
        field.spawn_local(&droplet(4, 4, 300.0, None));
        field.spawn_local(&droplet(5, 5, 100.0, None));

        assert!(matches!(
            game.answer(&mut field, 6, now),
            AnswerResult::Correct(CorrectOutcome { clear_lowest: true, .. })
        ));
        assert_eq!(field.len(), 1);
        assert_eq!(field.droplets()[0].answer, 25);

        assert_eq!(game.answer(&mut field, 7, now), AnswerResult::Wrong);
        assert_eq!(game.lives(), 4);
        game.pause();
        assert_eq!(game.answer(&mut field, 25, now), AnswerResult::Ignored);
    }

    #[test]
    fn missed_droplets_cost_lives() {
        let now = Instant::now();
        let mut game = GameEngine::new();
        let mut field = DropletField::new();
        field.spawn_local(&droplet(2, 2, 599.5, None));
        assert_eq!(game.advance(&mut field, now), 1);
        assert_eq!(game.lives(), 4);
        assert!(field.is_empty());
    }

    #[test]
    fn pause_only_while_running() {
        let mut game = GameEngine::new();
        game.pause();
        assert!(!game.is_active());
        game.resume();
        assert!(game.is_active());
        game.end();
        game.pause();
        assert!(!game.is_paused());
    }
}
