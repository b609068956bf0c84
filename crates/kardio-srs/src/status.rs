//! Learning status derived from answer counters.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Minimum number of correct answers before an item can be mastered.
pub const MASTERY_MIN_CORRECT: i32 = 5;

/// Minimum accuracy, in percent, before an item can be mastered.
pub const MASTERY_MIN_ACCURACY_PERCENT: i64 = 90;

/// Where a user stands with a single vocabulary item.
///
/// Stored and serialized as `NOT_STUDIED`, `LEARNING` or `MASTERED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LearningStatus {
    /// No attempt recorded yet.
    #[default]
    NotStudied,
    /// At least one attempt, mastery threshold not reached.
    Learning,
    /// Enough correct answers at a high enough accuracy.
    Mastered,
}

impl LearningStatus {
    /// The persisted representation of the status.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotStudied => "NOT_STUDIED",
            Self::Learning => "LEARNING",
            Self::Mastered => "MASTERED",
        }
    }
}

impl fmt::Display for LearningStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a stored status string is not one of the known values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStatusError(String);

impl fmt::Display for ParseStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown learning status: {}", self.0)
    }
}

impl std::error::Error for ParseStatusError {}

impl FromStr for LearningStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NOT_STUDIED" => Ok(Self::NotStudied),
            "LEARNING" => Ok(Self::Learning),
            "MASTERED" => Ok(Self::Mastered),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

impl TryFrom<String> for LearningStatus {
    type Error = ParseStatusError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Percentage of correct answers, in `0.0..=100.0`.
///
/// Returns `0.0` when nothing has been answered yet.
pub fn accuracy_rate(correct_count: i32, incorrect_count: i32) -> f64 {
    let total = i64::from(correct_count) + i64::from(incorrect_count);
    if total <= 0 {
        return 0.0;
    }

    f64::from(correct_count) / total as f64 * 100.0
}

/// Derive the learning status from the answer counters.
///
/// * no attempts: [`LearningStatus::NotStudied`]
/// * at least [`MASTERY_MIN_CORRECT`] correct answers and an accuracy of at
///   least [`MASTERY_MIN_ACCURACY_PERCENT`]: [`LearningStatus::Mastered`]
/// * anything else: [`LearningStatus::Learning`]
pub fn status_for(correct_count: i32, incorrect_count: i32) -> LearningStatus {
    let correct = i64::from(correct_count);
    let total = correct + i64::from(incorrect_count);

    if total == 0 {
        LearningStatus::NotStudied
    } else if correct_count >= MASTERY_MIN_CORRECT
        // accuracy_rate() >= 90, in integers
        && correct * 100 >= MASTERY_MIN_ACCURACY_PERCENT * total
    {
        LearningStatus::Mastered
    } else {
        LearningStatus::Learning
    }
}
