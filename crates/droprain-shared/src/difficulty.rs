//! Difficulty presets and table selection.

use serde::{Deserialize, Serialize};

use crate::constants::{MAX_TABLE, MIN_TABLE};
use crate::error::ValidationError;

/// Difficulty selector stored on rooms and sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Normal,
    Hard,
    /// User-chosen table set; speed and spawn interval follow `Normal`.
    Custom,
}

/// Client-visible configuration of a difficulty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DifficultyConfig {
    pub name: &'static str,
    pub description: &'static str,
    pub tables: &'static [u32],
    /// Fall speed in pixels per frame.
    pub speed: f64,
    /// Minimum time between new problems in milliseconds.
    pub spawn_interval_ms: u64,
}

const EASY: DifficultyConfig = DifficultyConfig {
    name: "Easy",
    description: "Tables 2, 3, 5 | slow",
    tables: &[2, 3, 5],
    speed: 0.3,
    spawn_interval_ms: 3000,
};

const NORMAL: DifficultyConfig = DifficultyConfig {
    name: "Normal",
    description: "Tables 2-5 | medium",
    tables: &[2, 3, 4, 5],
    speed: 0.5,
    spawn_interval_ms: 2500,
};

const HARD: DifficultyConfig = DifficultyConfig {
    name: "Hard",
    description: "Tables 2-9 | fast",
    tables: &[2, 3, 4, 5, 6, 7, 8, 9],
    speed: 0.8,
    spawn_interval_ms: 2000,
};

impl Difficulty {
    pub const PRESETS: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Normal, Difficulty::Hard];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Normal => "normal",
            Self::Hard => "hard",
            Self::Custom => "custom",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "easy" => Some(Self::Easy),
            "normal" => Some(Self::Normal),
            "hard" => Some(Self::Hard),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }

    /// Parse a stored label, treating anything unknown as `Normal`.
    pub fn parse_or_normal(s: &str) -> Self {
        Self::parse(s).unwrap_or(Self::Normal)
    }

    pub fn config(&self) -> &'static DifficultyConfig {
        match self {
            Self::Easy => &EASY,
            Self::Normal | Self::Custom => &NORMAL,
            Self::Hard => &HARD,
        }
    }

    /// Tables problems are drawn from: the custom set when one is given and
    /// non-empty, the preset's tables otherwise.
    pub fn resolve_tables(&self, custom: Option<&[u32]>) -> Vec<u32> {
        match custom {
            Some(tables) if !tables.is_empty() => tables.to_vec(),
            _ => self.config().tables.to_vec(),
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validate a user-chosen table set, returning it sorted and deduplicated.
pub fn validate_custom_tables(tables: &[u32]) -> Result<Vec<u32>, ValidationError> {
    if tables.is_empty() {
        return Err(ValidationError::NoTables);
    }
    if let Some(&bad) = tables.iter().find(|t| !(MIN_TABLE..=MAX_TABLE).contains(*t)) {
        return Err(ValidationError::TableOutOfRange(bad));
    }
    let mut tables = tables.to_vec();
    tables.sort_unstable();
    tables.dedup();
    Ok(tables)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_match_published_values() {
        assert_eq!(Difficulty::Easy.config().tables, &[2, 3, 5]);
        assert_eq!(Difficulty::Easy.config().spawn_interval_ms, 3000);
        assert_eq!(Difficulty::Normal.config().spawn_interval_ms, 2500);
        assert_eq!(Difficulty::Hard.config().tables.len(), 8);
        assert_eq!(Difficulty::Hard.config().spawn_interval_ms, 2000);
    }

    #[test]
    fn unknown_label_falls_back_to_normal() {
        assert_eq!(Difficulty::parse_or_normal("nightmare"), Difficulty::Normal);
        assert_eq!(Difficulty::parse_or_normal("hard"), Difficulty::Hard);
    }

    #[test]
    fn custom_tables_take_precedence_when_present() {
        assert_eq!(Difficulty::Custom.resolve_tables(Some(&[7, 8])), vec![7, 8]);
        assert_eq!(Difficulty::Easy.resolve_tables(Some(&[])), vec![2, 3, 5]);
        assert_eq!(Difficulty::Normal.resolve_tables(None), vec![2, 3, 4, 5]);
    }

    #[test]
    fn custom_tables_are_validated() {
        assert_eq!(validate_custom_tables(&[]), Err(ValidationError::NoTables));
        assert_eq!(
            validate_custom_tables(&[3, 12]),
            Err(ValidationError::TableOutOfRange(12))
        );
        assert_eq!(validate_custom_tables(&[9, 2, 9]).unwrap(), vec![2, 9]);
    }
}
