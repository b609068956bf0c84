//! Daily study streaks.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// What a call to [`Streak::record_activity`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakOutcome {
    /// First activity ever recorded.
    Started,
    /// Activity on the day after the last one.
    Extended,
    /// Activity after a gap of more than one day; the streak restarts at 1.
    Reset,
    /// Activity was already recorded for this day.
    AlreadyRecorded,
    /// The date is earlier than the last recorded activity and was ignored.
    Backdated,
}

impl StreakOutcome {
    /// Whether the streak record was modified and needs saving.
    pub const fn changed(self) -> bool {
        matches!(self, Self::Started | Self::Extended | Self::Reset)
    }

    /// Label used in logs and metrics.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Extended => "extended",
            Self::Reset => "reset",
            Self::AlreadyRecorded => "already_recorded",
            Self::Backdated => "backdated",
        }
    }
}

/// Consecutive-day activity counter for one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Streak {
    /// Consecutive days with activity, ending at `last_activity_date`
    pub current_streak: i32,
    /// Best `current_streak` ever reached
    pub longest_streak: i32,
    /// Calendar day of the most recent activity
    pub last_activity_date: Option<NaiveDate>,
}

impl Streak {
    /// Record that the user studied on `today`.
    ///
    /// At most one change per calendar day: a second call with the same date
    /// is a no-op. A date before `last_activity_date` (clock skew, replays) is
    /// ignored rather than treated as a broken streak.
    pub fn record_activity(&mut self, today: NaiveDate) -> StreakOutcome {
        let outcome = match self.last_activity_date {
            None => {
                self.current_streak = 1;
                StreakOutcome::Started
            }
            Some(last) => match today.signed_duration_since(last).num_days() {
                0 => return StreakOutcome::AlreadyRecorded,
                1 => {
                    self.current_streak = self.current_streak.saturating_add(1);
                    StreakOutcome::Extended
                }
                days if days > 1 => {
                    self.current_streak = 1;
                    StreakOutcome::Reset
                }
                _ => return StreakOutcome::Backdated,
            },
        };

        if self.current_streak > self.longest_streak {
            self.longest_streak = self.current_streak;
        }
        self.last_activity_date = Some(today);

        outcome
    }

    /// Whether activity has already been recorded on `today`.
    pub fn is_active_on(&self, today: NaiveDate) -> bool {
        self.last_activity_date == Some(today)
    }
}
