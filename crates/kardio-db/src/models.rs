use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use kardio_srs::{LearningStatus, Progress, Streak, accuracy_rate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Study module lookup row (soft-deleted modules never resolve)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ModuleRef {
    /// Unique module identifier
    pub id: Uuid,
    /// User who created the module
    pub creator_id: Uuid,
    /// Module name (max 255 chars)
    pub name: String,
}

/// Vocabulary lookup row (soft-deleted items never resolve)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct VocabularyRef {
    /// Unique vocabulary identifier
    pub id: Uuid,
    /// Module this vocabulary belongs to (indexed)
    pub module_id: Uuid,
    /// The term being learned (max 255 chars)
    pub term: String,
}

/// Learning progress of one user on one vocabulary item
/// Unique on (user_id, vocabulary_id)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProgressRecord {
    /// Unique identifier
    pub id: Uuid,
    /// User ID (indexed)
    pub user_id: Uuid,
    /// Vocabulary ID (indexed, unique with user_id)
    pub vocabulary_id: Uuid,
    /// Status derived from the counters, stored as text
    #[sqlx(try_from = "String")]
    pub status: LearningStatus,
    /// Number of correct answers
    pub correct_count: i32,
    /// Number of incorrect answers
    pub incorrect_count: i32,
    /// Last recorded attempt (null until the first attempt)
    pub last_studied_at: Option<DateTime<Utc>>,
    /// When the item is due again (null until the first attempt)
    pub next_review_at: Option<DateTime<Utc>>,
    /// When this record was created
    pub created_at: DateTime<Utc>,
    /// When this record was last updated
    pub updated_at: DateTime<Utc>,
}

impl ProgressRecord {
    /// A zeroed record for a pair that has never been studied.
    pub fn new(user_id: Uuid, vocabulary_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            vocabulary_id,
            status: LearningStatus::NotStudied,
            correct_count: 0,
            incorrect_count: 0,
            last_studied_at: None,
            next_review_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The scheduling state carried by this row.
    pub fn progress(&self) -> Progress {
        Progress {
            correct_count: self.correct_count,
            incorrect_count: self.incorrect_count,
            status: self.status,
            last_studied_at: self.last_studied_at,
            next_review_at: self.next_review_at,
        }
    }

    /// Copy an updated scheduling state back into the row.
    pub fn apply(&mut self, progress: &Progress, now: DateTime<Utc>) {
        self.correct_count = progress.correct_count;
        self.incorrect_count = progress.incorrect_count;
        self.status = progress.status;
        self.last_studied_at = progress.last_studied_at;
        self.next_review_at = progress.next_review_at;
        self.updated_at = now;
    }

    /// Attempts recorded so far; doubles as the row version for conditional updates.
    pub fn total_attempts(&self) -> i64 {
        i64::from(self.correct_count) + i64::from(self.incorrect_count)
    }

    /// Percentage of correct answers.
    pub fn accuracy_rate(&self) -> f64 {
        accuracy_rate(self.correct_count, self.incorrect_count)
    }
}

/// Daily streak of one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct StreakRecord {
    /// Unique identifier
    pub id: Uuid,
    /// User ID (unique)
    pub user_id: Uuid,
    /// Consecutive days with activity
    pub current_streak: i32,
    /// Best streak ever reached
    pub longest_streak: i32,
    /// Calendar day of the last activity (DATE, no time component)
    pub last_activity_date: Option<NaiveDate>,
    /// When this record was created
    pub created_at: DateTime<Utc>,
    /// When this record was last updated
    pub updated_at: DateTime<Utc>,
}

impl StreakRecord {
    /// A fresh record with no activity.
    pub fn new(user_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            current_streak: 0,
            longest_streak: 0,
            last_activity_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn streak(&self) -> Streak {
        Streak {
            current_streak: self.current_streak,
            longest_streak: self.longest_streak,
            last_activity_date: self.last_activity_date,
        }
    }

    pub fn apply(&mut self, streak: &Streak, now: DateTime<Utc>) {
        self.current_streak = streak.current_streak;
        self.longest_streak = streak.longest_streak;
        self.last_activity_date = streak.last_activity_date;
        self.updated_at = now;
    }
}

/// Kind of study activity a session runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionType {
    Flashcard,
    Learn,
    Test,
    Match,
    Blast,
}

impl SessionType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Flashcard => "FLASHCARD",
            Self::Learn => "LEARN",
            Self::Test => "TEST",
            Self::Match => "MATCH",
            Self::Blast => "BLAST",
        }
    }
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a stored session type is not one of the known values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown session type: {0}")]
pub struct ParseSessionTypeError(String);

impl FromStr for SessionType {
    type Err = ParseSessionTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FLASHCARD" => Ok(Self::Flashcard),
            "LEARN" => Ok(Self::Learn),
            "TEST" => Ok(Self::Test),
            "MATCH" => Ok(Self::Match),
            "BLAST" => Ok(Self::Blast),
            other => Err(ParseSessionTypeError(other.to_string())),
        }
    }
}

impl TryFrom<String> for SessionType {
    type Error = ParseSessionTypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Study session - one sitting of a user on a module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct StudySessionRecord {
    /// Unique identifier
    pub id: Uuid,
    /// Owner of the session (indexed)
    pub user_id: Uuid,
    /// Module being studied (indexed)
    pub module_id: Uuid,
    /// Activity kind, stored as text
    #[sqlx(try_from = "String")]
    pub session_type: SessionType,
    /// When the session started
    pub start_time: DateTime<Utc>,
    /// When the session ended (null while active)
    pub end_time: Option<DateTime<Utc>>,
    /// Number of attempts recorded in the session
    pub total_items: i32,
    /// Number of correct attempts
    pub correct_items: i32,
    /// When this record was created
    pub created_at: DateTime<Utc>,
}

impl StudySessionRecord {
    pub fn new(
        user_id: Uuid,
        module_id: Uuid,
        session_type: SessionType,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            module_id,
            session_type,
            start_time: now,
            end_time: None,
            total_items: 0,
            correct_items: 0,
            created_at: now,
        }
    }

    pub fn is_ended(&self) -> bool {
        self.end_time.is_some()
    }

    /// Count one attempt towards the session totals.
    pub fn record_attempt(&mut self, is_correct: bool) {
        self.total_items = self.total_items.saturating_add(1);
        if is_correct {
            self.correct_items = self.correct_items.saturating_add(1);
        }
    }

    /// Close the session. Ending twice keeps the first end time.
    pub fn end(&mut self, now: DateTime<Utc>) {
        if self.end_time.is_none() {
            self.end_time = Some(now);
        }
    }

    /// Percentage of correct attempts in the session.
    pub fn accuracy_rate(&self) -> f64 {
        accuracy_rate(self.correct_items, self.total_items - self.correct_items)
    }

    /// Session length in seconds, once ended.
    pub fn duration_seconds(&self) -> Option<i64> {
        self.end_time
            .map(|end| end.signed_duration_since(self.start_time).num_seconds())
    }

    /// Seconds spent in the session, counting an open session up to `now`.
    pub fn seconds_studied(&self, now: DateTime<Utc>) -> i64 {
        self.end_time
            .unwrap_or(now)
            .signed_duration_since(self.start_time)
            .num_seconds()
            .max(0)
    }
}

/// One answered item within a study session
/// High-volume table optimized for inserts and per-session reads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SessionItemRecord {
    /// Unique identifier
    pub id: Uuid,
    /// Session ID (indexed)
    pub session_id: Uuid,
    /// Vocabulary ID (indexed)
    pub vocabulary_id: Uuid,
    /// Whether the answer was correct
    pub is_correct: bool,
    /// Time to answer in milliseconds, when the client reported it
    pub response_time_ms: Option<i32>,
    /// When the attempt was recorded
    pub created_at: DateTime<Utc>,
}

/// Narrows a user's session history. Empty fields match everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionFilter {
    pub module_id: Option<Uuid>,
    pub session_type: Option<SessionType>,
}

impl SessionFilter {
    pub fn matches(&self, session: &StudySessionRecord) -> bool {
        self.module_id.is_none_or(|id| id == session.module_id)
            && self
                .session_type
                .is_none_or(|kind| kind == session.session_type)
    }
}

/// Stored status of one vocabulary item
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct ProgressStatusRow {
    pub vocabulary_id: Uuid,
    #[sqlx(try_from = "String")]
    pub status: LearningStatus,
}

/// Session item joined with its vocabulary term, for session analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SessionItemDetail {
    pub id: Uuid,
    pub vocabulary_id: Uuid,
    pub term: String,
    pub is_correct: bool,
    pub response_time_ms: Option<i32>,
    pub created_at: DateTime<Utc>,
}
