//! Time source for the learning rules.
//!
//! Every rule takes "now" or "today" from a [`Clock`]; today is the UTC
//! calendar day.

use chrono::{DateTime, Duration, NaiveDate, Utc};

/// Source of "now" for the learning rules.
///
/// Services hold a `Clock` instead of calling `Utc::now()` directly so tests
/// can pin time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Clock {
    /// Wall-clock time.
    #[default]
    System,
    /// A fixed instant.
    Fixed(DateTime<Utc>),
}

impl Clock {
    /// A clock pinned to `at`.
    pub const fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    /// The current instant according to this clock.
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Self::System => Utc::now(),
            Self::Fixed(at) => *at,
        }
    }

    /// The current calendar day, in UTC.
    pub fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    /// Move a fixed clock forward. No effect on [`Clock::System`].
    pub fn advance(&mut self, delta: Duration) {
        if let Self::Fixed(at) = self {
            *at += delta;
        }
    }
}
