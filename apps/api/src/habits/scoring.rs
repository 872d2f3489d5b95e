//! Drift scoring — pure recomputation over the trailing habit window.
//!
//! Higher favors consistency: a completed day pushes the score up, a missed
//! day pulls it down, and a run of three misses takes an extra one-time
//! penalty. The result is always clamped to [0, 100].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Number of trailing days considered by the scorer.
pub const HISTORY_WINDOW_DAYS: usize = 30;
/// Neutral starting point for every recomputation.
pub const BASELINE_SCORE: i32 = 50;

const COMPLETED_DELTA: i32 = 2;
const MISS_DELTA: i32 = 4;
const MISS_STREAK_THRESHOLD: u32 = 3;
const MISS_STREAK_PENALTY: i32 = 5;

/// One day of habit history as consumed by the scorer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HabitDay {
    pub date: NaiveDate,
    pub completed: bool,
}

/// Recomputes the drift score from history ordered oldest → newest.
///
/// Only the trailing [`HISTORY_WINDOW_DAYS`] entries contribute; days with no
/// entry are simply absent and do not count as misses. The miss-streak
/// penalty fires exactly once per streak, the moment the streak reaches
/// three, and re-arms only after a completed day resets the streak.
pub fn compute_drift_score(history: &[HabitDay]) -> i32 {
    let window_start = history.len().saturating_sub(HISTORY_WINDOW_DAYS);
    let mut score = BASELINE_SCORE;
    let mut consecutive_misses = 0u32;

    for day in &history[window_start..] {
        if day.completed {
            score += COMPLETED_DELTA;
            consecutive_misses = 0;
        } else {
            score -= MISS_DELTA;
            consecutive_misses += 1;
            if consecutive_misses == MISS_STREAK_THRESHOLD {
                score -= MISS_STREAK_PENALTY;
            }
        }
    }

    score.clamp(0, 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Days;

    /// Builds a history from oldest to newest, one entry per day.
    fn history(days: &[bool]) -> Vec<HabitDay> {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        days.iter()
            .enumerate()
            .map(|(i, &completed)| HabitDay {
                date: start.checked_add_days(Days::new(i as u64)).unwrap(),
                completed,
            })
            .collect()
    }

    #[test]
    fn test_empty_history_is_baseline() {
        assert_eq!(compute_drift_score(&[]), 50);
    }

    #[test]
    fn test_single_completed_day() {
        assert_eq!(compute_drift_score(&history(&[true])), 52);
    }

    #[test]
    fn test_single_missed_day() {
        assert_eq!(compute_drift_score(&history(&[false])), 46);
    }

    #[test]
    fn test_three_consecutive_misses_take_streak_penalty() {
        // 50 - 4*3 - 5
        assert_eq!(compute_drift_score(&history(&[false, false, false])), 33);
    }

    #[test]
    fn test_penalty_fires_on_third_miss_then_hit_recovers() {
        // 50 - 4 - 4 - (4 + 5) = 33, then +2
        assert_eq!(
            compute_drift_score(&history(&[false, false, false, true])),
            35
        );
    }

    #[test]
    fn test_fourth_miss_in_same_streak_takes_no_extra_penalty() {
        // The streak penalty is once per streak, not once per day at >= 3.
        assert_eq!(
            compute_drift_score(&history(&[false, false, false, false])),
            29
        );
    }

    #[test]
    fn test_completed_day_resets_streak_counter() {
        // miss, miss, hit, miss, miss, miss: the first pair never reaches the
        // threshold, so only the second run takes the penalty.
        // 50 - 8 + 2 - 12 - 5 = 27
        assert_eq!(
            compute_drift_score(&history(&[false, false, true, false, false, false])),
            27
        );
    }

    #[test]
    fn test_penalty_rearms_after_reset() {
        // Two full streaks of three, separated by a hit: the penalty fires twice.
        // 50 - 12 - 5 + 2 - 12 - 5 = 18
        assert_eq!(
            compute_drift_score(&history(&[
                false, false, false, true, false, false, false
            ])),
            18
        );
    }

    #[test]
    fn test_clamped_at_zero() {
        // 30 misses in one streak: 50 - 120 - 5 would be -75.
        assert_eq!(compute_drift_score(&history(&[false; 30])), 0);
    }

    #[test]
    fn test_clamped_at_one_hundred() {
        // 30 hits: 50 + 60 would be 110.
        assert_eq!(compute_drift_score(&history(&[true; 30])), 100);
    }

    #[test]
    fn test_only_trailing_window_contributes() {
        // 31 entries: an old miss followed by 30 alternating days. The window
        // holds only the alternation: 50 + 15*2 - 15*4 = 20. Including the
        // 31st entry would change the result.
        let mut days = vec![false];
        for i in 0..30 {
            days.push(i % 2 == 0);
        }
        assert_eq!(compute_drift_score(&history(&days)), 20);

        // Entries older than the window have zero effect.
        let mut padded = vec![true; 10];
        padded.extend_from_slice(&days[1..]);
        assert_eq!(compute_drift_score(&history(&padded)), 20);
    }

    #[test]
    fn test_score_always_in_bounds() {
        for n in 0..=30 {
            let all_misses = history(&vec![false; n]);
            let all_hits = history(&vec![true; n]);
            for h in [&all_misses, &all_hits] {
                let score = compute_drift_score(h);
                assert!((0..=100).contains(&score), "score {score} out of bounds");
            }
        }
    }

    #[test]
    fn test_extra_miss_never_raises_score() {
        let base = vec![true, false, true, true, false, false];
        let with_miss = {
            let mut h = base.clone();
            h.push(false);
            h
        };
        assert!(
            compute_drift_score(&history(&with_miss)) < compute_drift_score(&history(&base))
        );
    }

    #[test]
    fn test_extra_hit_never_lowers_score() {
        let base = vec![true, false, true, true, false, false];
        let with_hit = {
            let mut h = base.clone();
            h.push(true);
            h
        };
        assert!(
            compute_drift_score(&history(&with_hit)) > compute_drift_score(&history(&base))
        );
    }
}
