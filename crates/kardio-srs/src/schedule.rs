//! Review scheduling for a single (user, vocabulary) progress record.

use std::ops::Range;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::status::{LearningStatus, accuracy_rate, status_for};

/// Delay, in whole minutes, before a missed item becomes due again.
///
/// The end is exclusive: a missed item always returns within the hour.
pub const RETRY_DELAY_MINUTES: Range<i64> = 30..60;

/// Get the review interval in hours after a correct answer.
///
/// # Arguments
///
/// * `correct_count` - Number of correct answers, including the one just given
///
/// # Returns
///
/// The interval in hours as an `i64`
///
/// # Algorithm
///
/// * 0 or 1 correct: 4 hours
/// * 2 correct: 8 hours
/// * 3 correct: 1 day
/// * 4 correct: 3 days
/// * 5 correct: 1 week
/// * 6 or more: 2 weeks
pub const fn correct_interval_hours(correct_count: i32) -> i64 {
    match correct_count {
        i32::MIN..=1 => 4,
        2 => 8,
        3 => 24,
        4 => 72,
        5 => 168,
        _ => 336,
    }
}

/// Pick the delay before a missed item is shown again.
///
/// The delay is jittered over [`RETRY_DELAY_MINUTES`] so items missed together
/// do not all come due in the same minute.
pub fn retry_delay<R: Rng + ?Sized>(rng: &mut R) -> Duration {
    Duration::minutes(rng.gen_range(RETRY_DELAY_MINUTES))
}

/// Compute the next review date for an item.
///
/// # Arguments
///
/// * `correct_count` - Correct answers so far, counting the current attempt
/// * `is_correct` - Outcome of the current attempt
/// * `now` - When the attempt happened
/// * `rng` - Random source for the retry jitter
///
/// # Returns
///
/// `now` plus [`retry_delay`] for a miss, or plus
/// [`correct_interval_hours`] for a correct answer.
pub fn compute_next_review<R: Rng + ?Sized>(
    correct_count: i32,
    is_correct: bool,
    now: DateTime<Utc>,
    rng: &mut R,
) -> DateTime<Utc> {
    if is_correct {
        now + Duration::hours(correct_interval_hours(correct_count))
    } else {
        now + retry_delay(rng)
    }
}

/// Learning state of one user on one vocabulary item.
///
/// `status` is always derived from the counters; it is never set on its own.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Progress {
    /// Number of correct answers (never decreases)
    pub correct_count: i32,
    /// Number of incorrect answers (never decreases)
    pub incorrect_count: i32,
    /// Status derived from the counters
    pub status: LearningStatus,
    /// When the last attempt was recorded
    pub last_studied_at: Option<DateTime<Utc>>,
    /// When the item becomes eligible for review again
    pub next_review_at: Option<DateTime<Utc>>,
}

impl Progress {
    /// A record with no attempts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a record from stored counters, re-deriving the status.
    pub fn from_counters(correct_count: i32, incorrect_count: i32) -> Self {
        Self {
            correct_count,
            incorrect_count,
            status: status_for(correct_count, incorrect_count),
            last_studied_at: None,
            next_review_at: None,
        }
    }

    /// Total number of recorded attempts.
    pub fn total_attempts(&self) -> i64 {
        i64::from(self.correct_count) + i64::from(self.incorrect_count)
    }

    /// Percentage of correct answers (`0.0` before the first attempt).
    pub fn accuracy_rate(&self) -> f64 {
        accuracy_rate(self.correct_count, self.incorrect_count)
    }

    /// Whether the item should be offered for review at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review_at.is_none_or(|at| at <= now)
    }

    /// Apply one attempt and reschedule the item.
    ///
    /// Counters are bumped first, so both the review interval and the mastery
    /// check see the attempt being recorded. Returns the new `next_review_at`.
    pub fn record_attempt<R: Rng + ?Sized>(
        &mut self,
        is_correct: bool,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> DateTime<Utc> {
        if is_correct {
            self.correct_count = self.correct_count.saturating_add(1);
        } else {
            self.incorrect_count = self.incorrect_count.saturating_add(1);
        }

        let next_review_at = compute_next_review(self.correct_count, is_correct, now, rng);

        self.last_studied_at = Some(now);
        self.next_review_at = Some(next_review_at);
        self.status = status_for(self.correct_count, self.incorrect_count);

        next_review_at
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_correct_interval_hours() {
        assert_eq!(correct_interval_hours(0), 4); // 4 hours
        assert_eq!(correct_interval_hours(1), 4); // 4 hours
        assert_eq!(correct_interval_hours(2), 8); // 8 hours
        assert_eq!(correct_interval_hours(3), 24); // 1 day
        assert_eq!(correct_interval_hours(4), 72); // 3 days
        assert_eq!(correct_interval_hours(5), 168); // 1 week
        assert_eq!(correct_interval_hours(6), 336); // 2 weeks
        assert_eq!(correct_interval_hours(100), 336); // 2 weeks
    }

    #[test]
    fn test_retry_delay_is_bounded() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..500 {
            let minutes = retry_delay(&mut rng).num_minutes();
            assert!((30..60).contains(&minutes), "got {minutes} minutes");
        }
    }

    #[test]
    fn test_compute_next_review() {
        let mut rng = StdRng::seed_from_u64(1);

        let next = compute_next_review(1, true, now(), &mut rng);
        assert_eq!((next - now()).num_hours(), 4);

        let next = compute_next_review(5, true, now(), &mut rng);
        assert_eq!((next - now()).num_hours(), 168);

        // A miss ignores the correct count entirely
        let next = compute_next_review(9, false, now(), &mut rng);
        let minutes = (next - now()).num_minutes();
        assert!((30..60).contains(&minutes));
    }

    #[test]
    fn test_first_correct_attempt() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut progress = Progress::new();

        let next = progress.record_attempt(true, now(), &mut rng);

        assert_eq!(progress.correct_count, 1);
        assert_eq!(progress.incorrect_count, 0);
        assert_eq!(progress.status, LearningStatus::Learning);
        assert_eq!(progress.last_studied_at, Some(now()));
        assert_eq!(progress.next_review_at, Some(next));
        assert_eq!(next - now(), Duration::hours(4));
    }

    #[test]
    fn test_fifth_correct_attempt_masters_item() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut progress = Progress::from_counters(4, 0);
        assert_eq!(progress.status, LearningStatus::Learning);

        let next = progress.record_attempt(true, now(), &mut rng);

        assert_eq!(progress.correct_count, 5);
        assert_eq!(progress.accuracy_rate(), 100.0);
        assert_eq!(progress.status, LearningStatus::Mastered);
        assert_eq!(next - now(), Duration::hours(168));
    }

    #[test]
    fn test_miss_drops_mastery() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut progress = Progress::from_counters(5, 0);
        assert_eq!(progress.status, LearningStatus::Mastered);

        progress.record_attempt(false, now(), &mut rng);

        // 5 / 6 = 83% accuracy
        assert_eq!(progress.incorrect_count, 1);
        assert_eq!(progress.status, LearningStatus::Learning);
    }

    #[test]
    fn test_is_due() {
        let mut progress = Progress::new();
        assert!(progress.is_due(now()));

        progress.next_review_at = Some(now() + Duration::minutes(1));
        assert!(!progress.is_due(now()));
        assert!(progress.is_due(now() + Duration::minutes(1)));
    }

    #[test]
    fn test_seeded_jitter_is_reproducible() {
        let mut first = Progress::new();
        let mut second = Progress::new();

        let a = first.record_attempt(false, now(), &mut StdRng::seed_from_u64(99));
        let b = second.record_attempt(false, now(), &mut StdRng::seed_from_u64(99));

        assert_eq!(a, b);
    }
}
