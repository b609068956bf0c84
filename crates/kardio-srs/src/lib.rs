//! SRS (Spaced Repetition System) rules for Kardio
//!
//! This crate holds the pure learning rules behind vocabulary study:
//!
//! * how a learning status is derived from answer counters ([`status`]),
//! * when an item should come back for review ([`schedule`]),
//! * how a user's daily study streak moves ([`streak`]).
//!
//! Nothing here performs I/O. Callers load a record, apply a rule with an
//! explicit timestamp (see [`Clock`]) and persist the result themselves.

pub mod schedule;
pub mod status;
pub mod streak;
pub mod time;

pub use schedule::{
    Progress, RETRY_DELAY_MINUTES, compute_next_review, correct_interval_hours, retry_delay,
};
pub use status::{
    LearningStatus, MASTERY_MIN_ACCURACY_PERCENT, MASTERY_MIN_CORRECT, ParseStatusError,
    accuracy_rate, status_for,
};
pub use streak::{Streak, StreakOutcome};
pub use time::Clock;
