use serde::{Deserialize, Serialize};

use crate::ledger::{Character, Ledger, StatusCounts};
use crate::util::round_half_up;

/// Characters per standardized word.
pub const CHARS_PER_WORD: f64 = 5.0;

/// Scoring snapshot derived from a ledger and the elapsed time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingStats {
    pub wpm: u32,
    /// Whole percent, 0..=100.
    pub accuracy: u32,
    pub correct: usize,
    pub incorrect: usize,
    pub missed: usize,
    /// Seconds, fractional.
    pub total_time: f64,
    pub char_count: usize,
}

impl TypingStats {
    /// Raw speed over every scored character, regardless of correctness.
    pub fn raw_wpm(&self) -> u32 {
        raw_wpm(self.char_count, self.total_time)
    }
}

pub fn raw_wpm(char_count: usize, elapsed_secs: f64) -> u32 {
    let minutes = elapsed_secs / 60.0;
    if minutes <= 0.0 {
        return 0;
    }
    round_half_up((char_count as f64 / CHARS_PER_WORD) / minutes).max(0.0) as u32
}

/// Net speed: incorrect characters cancel correct ones; floored at zero.
pub fn net_wpm(correct: usize, incorrect: usize, elapsed_secs: f64) -> u32 {
    let minutes = elapsed_secs / 60.0;
    if minutes <= 0.0 {
        return 0;
    }
    let diff = correct as f64 - incorrect as f64;
    round_half_up((diff / CHARS_PER_WORD) / minutes).max(0.0) as u32
}

pub fn compute(chars: &[Character], elapsed_secs: f64) -> TypingStats {
    compute_from_counts(&StatusCounts::tally(chars), elapsed_secs)
}

pub fn compute_for(ledger: &Ledger, elapsed_secs: f64) -> TypingStats {
    compute_from_counts(&ledger.counts(), elapsed_secs)
}

/// Pending characters are not scored. A perfectly accurate run is credited
/// its raw speed; anything else gets net speed.
pub fn compute_from_counts(counts: &StatusCounts, elapsed_secs: f64) -> TypingStats {
    let elapsed_secs = elapsed_secs.max(0.0);
    let char_count = counts.correct + counts.incorrect + counts.missed;

    let accuracy = if char_count > 0 {
        round_half_up(100.0 * counts.correct as f64 / char_count as f64) as u32
    } else {
        0
    };

    let wpm = if char_count > 0 && counts.correct == char_count {
        raw_wpm(char_count, elapsed_secs)
    } else {
        net_wpm(counts.correct, counts.incorrect, elapsed_secs)
    };

    TypingStats {
        wpm,
        accuracy,
        correct: counts.correct,
        incorrect: counts.incorrect,
        missed: counts.missed,
        total_time: elapsed_secs,
        char_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::CharStatus;

    fn counts(correct: usize, incorrect: usize, missed: usize) -> StatusCounts {
        StatusCounts {
            pending: 0,
            correct,
            incorrect,
            missed,
        }
    }

    #[test]
    fn empty_snapshot_scores_zero() {
        let stats = compute_from_counts(&StatusCounts::default(), 30.0);
        assert_eq!(stats.wpm, 0);
        assert_eq!(stats.accuracy, 0);
        assert_eq!(stats.char_count, 0);
        assert_eq!(stats.total_time, 30.0);
    }

    #[test]
    fn zero_elapsed_time_scores_zero_wpm() {
        let stats = compute_from_counts(&counts(10, 0, 0), 0.0);
        assert_eq!(stats.wpm, 0);
        assert_eq!(stats.accuracy, 100);
    }

    #[test]
    fn perfect_accuracy_uses_raw_speed() {
        // 50 chars in 30s: 10 words in half a minute
        let stats = compute_from_counts(&counts(50, 0, 0), 30.0);
        assert_eq!(stats.accuracy, 100);
        assert_eq!(stats.wpm, 20);
        assert_eq!(stats.wpm, raw_wpm(50, 30.0));
    }

    #[test]
    fn perfect_accuracy_rounds_raw_speed() {
        // 7 chars in 4s -> 1.4 words / (1/15) min = 21
        let stats = compute_from_counts(&counts(7, 0, 0), 4.0);
        assert_eq!(stats.wpm, 21);
        // 3 chars in 7s -> 0.6 / 0.11666 = 5.142...
        assert_eq!(compute_from_counts(&counts(3, 0, 0), 7.0).wpm, 5);
    }

    #[test]
    fn errors_switch_to_net_speed() {
        // (45 - 5) / 5 = 8 words in 0.5 min = 16
        let stats = compute_from_counts(&counts(45, 5, 0), 30.0);
        assert_eq!(stats.accuracy, 90);
        assert_eq!(stats.wpm, 16);
        assert!(stats.wpm < stats.raw_wpm());
    }

    #[test]
    fn net_speed_floors_at_zero() {
        let stats = compute_from_counts(&counts(2, 20, 0), 10.0);
        assert_eq!(stats.wpm, 0);
        assert_eq!(stats.accuracy, 9);
    }

    #[test]
    fn missed_characters_hurt_accuracy_but_not_net_numerator() {
        let stats = compute_from_counts(&counts(10, 0, 10), 60.0);
        assert_eq!(stats.accuracy, 50);
        assert_eq!(stats.wpm, 2);
        assert_eq!(stats.char_count, 20);
    }

    #[test]
    fn accuracy_rounds_half_up() {
        // 1/8 = 12.5%
        assert_eq!(compute_from_counts(&counts(1, 7, 0), 10.0).accuracy, 13);
        // 2/3 = 66.67%
        assert_eq!(compute_from_counts(&counts(2, 1, 0), 10.0).accuracy, 67);
    }

    #[test]
    fn nearly_perfect_accuracy_still_uses_net_speed() {
        // 199/200 rounds to 100% but one error remains
        let stats = compute_from_counts(&counts(199, 1, 0), 30.0);
        assert_eq!(stats.accuracy, 100);
        assert_eq!(stats.wpm, 79);
        assert_ne!(stats.wpm, stats.raw_wpm());
    }

    #[test]
    fn accuracy_is_bounded() {
        for c in 0..12 {
            for i in 0..12 {
                for m in 0..4 {
                    let stats = compute_from_counts(&counts(c, i, m), 12.5);
                    assert!(stats.accuracy <= 100);
                }
            }
        }
    }

    #[test]
    fn compute_ignores_pending_characters() {
        let chars = [
            Character {
                glyph: 'a',
                status: CharStatus::Correct,
            },
            Character {
                glyph: 'b',
                status: CharStatus::Pending,
            },
            Character {
                glyph: 'c',
                status: CharStatus::Missed,
            },
        ];
        let stats = compute(&chars, 6.0);
        assert_eq!(stats.char_count, 2);
        assert_eq!(stats.correct, 1);
        assert_eq!(stats.missed, 1);
        assert_eq!(stats.accuracy, 50);
    }

    #[test]
    fn serializes_with_camel_case_fields() {
        let stats = compute_from_counts(&counts(5, 0, 0), 60.0);
        let json = serde_json::to_value(stats).unwrap();
        assert_eq!(json["charCount"], 5);
        assert_eq!(json["totalTime"], 60.0);
    }
}
