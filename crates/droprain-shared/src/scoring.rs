/// Accuracy shown during play: rounded percentage, 100 before any attempt.
pub fn round_accuracy(correct: u32, total: u32) -> u32 {
    if total == 0 {
        return 100;
    }
    ((correct as f64 / total as f64) * 100.0).round() as u32
}

/// Accuracy persisted on session rows: raw percentage, 0 before any attempt.
pub fn session_accuracy(correct: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    correct as f64 / total as f64 * 100.0
}

/// Score bands for the 1-5 star grade: (min, max, stars), inclusive.
const GRADE_THRESHOLDS: [(u32, u32, u8); 5] = [
    (0, 100, 1),
    (101, 300, 2),
    (301, 500, 3),
    (501, 700, 4),
    (701, u32::MAX, 5),
];

pub fn calculate_grade(score: u32) -> u8 {
    GRADE_THRESHOLDS
        .iter()
        .find(|(min, max, _)| (*min..=*max).contains(&score))
        .map(|(_, _, stars)| *stars)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accuracy_variants() {
        assert_eq!(round_accuracy(0, 0), 100);
        assert_eq!(round_accuracy(2, 3), 67);
        assert_eq!(session_accuracy(0, 0), 0.0);
        assert!((session_accuracy(2, 3) - 66.666).abs() < 0.01);
    }

    #[test]
    fn grade_bands() {
        assert_eq!(calculate_grade(0), 1);
        assert_eq!(calculate_grade(100), 1);
        assert_eq!(calculate_grade(101), 2);
        assert_eq!(calculate_grade(500), 3);
        assert_eq!(calculate_grade(700), 4);
        assert_eq!(calculate_grade(5000), 5);
    }
}
