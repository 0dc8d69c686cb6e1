//! Multiplication problem generation.
//!
//! A [`Problem`] is the payload the host embeds in the shared room record.
//! Every client turns it into local falling droplets, so it carries both the
//! arithmetic (factors and product) and the spawn parameters (position,
//! speed, item tag).  The creation timestamp, together with the factor pair,
//! forms the [`ProblemKey`] clients use to tell a new problem from a re-read
//! of the one they already have.

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::constants::{
    CANVAS_WIDTH, ITEM_PROBABILITY, MAX_MULTIPLIER, PROBLEM_MAX_ATTEMPTS, SPAWN_PADDING, SPAWN_Y,
};
use crate::difficulty::DifficultyConfig;
use crate::types::ItemType;

/// An ordered factor pair, `multiplicand × multiplier`.
pub type FactorPair = (u32, u32);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    pub multiplicand: u32,
    pub multiplier: u32,
    pub answer: u32,
    /// Display string, e.g. `"3×4"`.
    pub problem: String,
    pub x: f64,
    pub y: f64,
    pub speed: f64,
    pub item_type: Option<ItemType>,
    pub created_at: DateTime<Utc>,
}

/// De-duplication key of a problem: factor pair plus creation time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProblemKey {
    pub factors: FactorPair,
    pub created_at: DateTime<Utc>,
}

impl Problem {
    /// Generate a problem for the given tables.
    ///
    /// `previous` is the factor pair of the problem this one replaces; see
    /// [`generate_distinct`].
    pub fn generate<R: Rng + ?Sized>(
        rng: &mut R,
        config: &DifficultyConfig,
        tables: &[u32],
        previous: Option<FactorPair>,
        now: DateTime<Utc>,
    ) -> Self {
        let (multiplicand, multiplier) = generate_distinct(rng, tables, previous);
        Self {
            multiplicand,
            multiplier,
            answer: multiplicand * multiplier,
            problem: format_problem(multiplicand, multiplier),
            x: spawn_x(rng),
            y: SPAWN_Y,
            speed: config.speed,
            item_type: roll_item(rng),
            created_at: now,
        }
    }

    pub fn factors(&self) -> FactorPair {
        (self.multiplicand, self.multiplier)
    }

    pub fn key(&self) -> ProblemKey {
        ProblemKey {
            factors: self.factors(),
            created_at: self.created_at,
        }
    }
}

pub fn format_problem(multiplicand: u32, multiplier: u32) -> String {
    format!("{multiplicand}×{multiplier}")
}

/// Pick one factor from `tables` and the other from `1..=9`.
///
/// An empty table set falls back to the 2 table.
pub fn generate_factors<R: Rng + ?Sized>(rng: &mut R, tables: &[u32]) -> FactorPair {
    let table = tables.choose(rng).copied().unwrap_or(2);
    let multiplier = rng.gen_range(1..=MAX_MULTIPLIER);
    (table, multiplier)
}

/// Generate factors, retrying while they repeat `previous`.
///
/// Gives up after [`PROBLEM_MAX_ATTEMPTS`] tries and returns whatever the last
/// draw produced, which may equal `previous` when the table set leaves no
/// other choice.
pub fn generate_distinct<R: Rng + ?Sized>(
    rng: &mut R,
    tables: &[u32],
    previous: Option<FactorPair>,
) -> FactorPair {
    let mut pair = generate_factors(rng, tables);
    let mut attempts = 1;
    while Some(pair) == previous && attempts < PROBLEM_MAX_ATTEMPTS {
        pair = generate_factors(rng, tables);
        attempts += 1;
    }
    pair
}

/// Attach an item with probability [`ITEM_PROBABILITY`], uniform over the
/// three kinds.
pub fn roll_item<R: Rng + ?Sized>(rng: &mut R) -> Option<ItemType> {
    if rng.gen_bool(ITEM_PROBABILITY) {
        ItemType::ALL.choose(rng).copied()
    } else {
        None
    }
}

fn spawn_x<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    rng.gen_range(SPAWN_PADDING..CANVAS_WIDTH - SPAWN_PADDING)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::difficulty::Difficulty;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn answer_is_product_of_factors_for_every_preset() {
        let mut rng = StdRng::seed_from_u64(7);
        for difficulty in Difficulty::PRESETS {
            let config = difficulty.config();
            for _ in 0..200 {
                let p = Problem::generate(&mut rng, config, config.tables, None, Utc::now());
                assert_eq!(p.answer, p.multiplicand * p.multiplier);
                assert!(config.tables.contains(&p.multiplicand));
                assert!((1..=9).contains(&p.multiplier));
                assert_eq!(p.problem, format!("{}×{}", p.multiplicand, p.multiplier));
                assert!(p.x >= SPAWN_PADDING && p.x < CANVAS_WIDTH - SPAWN_PADDING);
                assert_eq!(p.y, SPAWN_Y);
                assert_eq!(p.speed, config.speed);
            }
        }
    }

    #[test]
    fn distinct_generation_avoids_previous_pair() {
        let mut rng = StdRng::seed_from_u64(42);
        // With tables {2} there are nine pairs; ten tries make a repeat
        // vanishingly rare, so across many runs the previous never comes back.
        for _ in 0..500 {
            let pair = generate_distinct(&mut rng, &[2], Some((2, 5)));
            assert_ne!(pair, (2, 5));
        }
    }

    #[test]
    fn distinct_generation_returns_repeat_when_no_alternative() {
        struct Fixed;
        impl rand::RngCore for Fixed {
            fn next_u32(&mut self) -> u32 {
                0
            }
            fn next_u64(&mut self) -> u64 {
                0
            }
            fn fill_bytes(&mut self, dest: &mut [u8]) {
                dest.fill(0)
            }
            fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
                dest.fill(0);
                Ok(())
            }
        }
        // A source that always yields the same draw exhausts the retry cap.
        let mut rng = Fixed;
        let first = generate_factors(&mut rng, &[3]);
        let again = generate_distinct(&mut rng, &[3], Some(first));
        assert_eq!(again, first);
    }

    #[test]
    fn item_rate_is_roughly_thirty_five_percent() {
        let mut rng = StdRng::seed_from_u64(1);
        let n = 20_000;
        let mut counts = [0usize; 3];
        let mut tagged = 0;
        for _ in 0..n {
            if let Some(item) = roll_item(&mut rng) {
                tagged += 1;
                counts[ItemType::ALL.iter().position(|i| *i == item).unwrap()] += 1;
            }
        }
        let rate = tagged as f64 / n as f64;
        assert!((0.32..0.38).contains(&rate), "rate {rate}");
        for c in counts {
            let share = c as f64 / tagged as f64;
            assert!((0.28..0.39).contains(&share), "share {share}");
        }
    }

    #[test]
    fn embedded_payload_uses_camel_case_keys() {
        let mut rng = StdRng::seed_from_u64(3);
        let config = Difficulty::Easy.config();
        let p = Problem::generate(&mut rng, config, config.tables, None, Utc::now());
        let json = serde_json::to_value(&p).unwrap();
        assert!(json.get("itemType").is_some());
        assert!(json.get("createdAt").is_some());
        let back: Problem = serde_json::from_value(json).unwrap();
        assert_eq!(back.key(), p.key());
    }
}
