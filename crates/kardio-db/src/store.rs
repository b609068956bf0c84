use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    models::{
        ModuleRef, ProgressRecord, ProgressStatusRow, SessionFilter, SessionItemDetail,
        SessionItemRecord, StreakRecord, StudySessionRecord, VocabularyRef,
    },
    repositories::{directory, progress, session, streak},
};

/// Errors surfaced by store implementations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A row vanished or reappeared between two statements of one operation.
    #[error("conflicting concurrent write on {0}")]
    Conflict(&'static str),

    #[error("store lock poisoned")]
    Poisoned,

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Lookups of the entities progress and sessions hang off.
///
/// Soft-deleted users, modules and vocabularies never resolve.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn user_exists(&self, user_id: Uuid) -> Result<bool, StoreError>;

    async fn find_module(&self, module_id: Uuid) -> Result<Option<ModuleRef>, StoreError>;

    async fn find_vocabulary(
        &self,
        vocabulary_id: Uuid,
    ) -> Result<Option<VocabularyRef>, StoreError>;

    /// Stamp a module as studied at `at`.
    async fn touch_module(&self, module_id: Uuid, at: DateTime<Utc>) -> Result<bool, StoreError>;
}

/// Persistence of per-(user, vocabulary) learning progress.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn find_progress(
        &self,
        user_id: Uuid,
        vocabulary_id: Uuid,
    ) -> Result<Option<ProgressRecord>, StoreError>;

    /// Create a zeroed record for the pair, or return the one that already exists.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if the existing row disappears before it can be read.
    async fn insert_progress(
        &self,
        user_id: Uuid,
        vocabulary_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<ProgressRecord, StoreError>;

    /// Overwrite the stored row with `record`, but only if its attempt total
    /// still equals `expected_attempts`. Returns false when the check fails.
    async fn update_progress(
        &self,
        record: &ProgressRecord,
        expected_attempts: i64,
    ) -> Result<bool, StoreError>;

    async fn set_next_review(
        &self,
        progress_id: Uuid,
        next_review_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    async fn list_progress_for_user(&self, user_id: Uuid) -> Result<Vec<ProgressRecord>, StoreError>;

    async fn list_progress_in_module(
        &self,
        user_id: Uuid,
        module_id: Uuid,
    ) -> Result<Vec<ProgressRecord>, StoreError>;

    /// Statuses of the requested items that have a record; the rest are omitted.
    async fn list_statuses(
        &self,
        user_id: Uuid,
        vocabulary_ids: &[Uuid],
    ) -> Result<Vec<ProgressStatusRow>, StoreError>;
}

#[async_trait]
pub trait StreakStore: Send + Sync {
    async fn find_streak(&self, user_id: Uuid) -> Result<Option<StreakRecord>, StoreError>;

    /// Create the user's streak row unless it exists; returns the stored row.
    async fn insert_streak(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<StreakRecord, StoreError>;

    async fn update_streak(&self, record: &StreakRecord) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert_session(&self, session: &StudySessionRecord) -> Result<(), StoreError>;

    async fn find_session(&self, session_id: Uuid)
    -> Result<Option<StudySessionRecord>, StoreError>;

    async fn update_session(&self, session: &StudySessionRecord) -> Result<bool, StoreError>;

    async fn delete_session(&self, session_id: Uuid) -> Result<bool, StoreError>;

    async fn list_active_sessions(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<StudySessionRecord>, StoreError>;

    /// Sessions of the user matching `filter`, newest first.
    async fn list_sessions(
        &self,
        user_id: Uuid,
        filter: SessionFilter,
    ) -> Result<Vec<StudySessionRecord>, StoreError>;

    /// Seconds spent in sessions that started and ended within `[from, to)`.
    /// Open sessions started in the window count up to `now`.
    async fn total_study_seconds(
        &self,
        user_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<i64, StoreError>;

    async fn insert_session_item(&self, item: &SessionItemRecord) -> Result<(), StoreError>;

    async fn list_session_items(
        &self,
        session_id: Uuid,
    ) -> Result<Vec<SessionItemDetail>, StoreError>;
}

/// Postgres-backed store delegating to the repository functions.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Directory for PgStore {
    async fn user_exists(&self, user_id: Uuid) -> Result<bool, StoreError> {
        Ok(directory::user_exists(&self.pool, user_id).await?)
    }

    async fn find_module(&self, module_id: Uuid) -> Result<Option<ModuleRef>, StoreError> {
        Ok(directory::find_module(&self.pool, module_id).await?)
    }

    async fn find_vocabulary(
        &self,
        vocabulary_id: Uuid,
    ) -> Result<Option<VocabularyRef>, StoreError> {
        Ok(directory::find_vocabulary(&self.pool, vocabulary_id).await?)
    }

    async fn touch_module(&self, module_id: Uuid, at: DateTime<Utc>) -> Result<bool, StoreError> {
        Ok(directory::touch_module(&self.pool, module_id, at).await?)
    }
}

#[async_trait]
impl ProgressStore for PgStore {
    async fn find_progress(
        &self,
        user_id: Uuid,
        vocabulary_id: Uuid,
    ) -> Result<Option<ProgressRecord>, StoreError> {
        Ok(progress::find_progress(&self.pool, user_id, vocabulary_id).await?)
    }

    async fn insert_progress(
        &self,
        user_id: Uuid,
        vocabulary_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<ProgressRecord, StoreError> {
        if let Some(record) =
            progress::insert_progress_if_absent(&self.pool, user_id, vocabulary_id, now).await?
        {
            return Ok(record);
        }

        // Lost the insert race; the winner's row is the one to use
        progress::find_progress(&self.pool, user_id, vocabulary_id)
            .await?
            .ok_or(StoreError::Conflict("learning_progress"))
    }

    async fn update_progress(
        &self,
        record: &ProgressRecord,
        expected_attempts: i64,
    ) -> Result<bool, StoreError> {
        Ok(progress::update_progress_if_unchanged(&self.pool, record, expected_attempts).await?)
    }

    async fn set_next_review(
        &self,
        progress_id: Uuid,
        next_review_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Ok(progress::set_next_review(&self.pool, progress_id, next_review_at, now).await?)
    }

    async fn list_progress_for_user(&self, user_id: Uuid) -> Result<Vec<ProgressRecord>, StoreError> {
        Ok(progress::list_progress_for_user(&self.pool, user_id).await?)
    }

    async fn list_progress_in_module(
        &self,
        user_id: Uuid,
        module_id: Uuid,
    ) -> Result<Vec<ProgressRecord>, StoreError> {
        Ok(progress::list_progress_in_module(&self.pool, user_id, module_id).await?)
    }

    async fn list_statuses(
        &self,
        user_id: Uuid,
        vocabulary_ids: &[Uuid],
    ) -> Result<Vec<ProgressStatusRow>, StoreError> {
        Ok(progress::list_statuses(&self.pool, user_id, vocabulary_ids).await?)
    }
}

#[async_trait]
impl StreakStore for PgStore {
    async fn find_streak(&self, user_id: Uuid) -> Result<Option<StreakRecord>, StoreError> {
        Ok(streak::find_streak(&self.pool, user_id).await?)
    }

    async fn insert_streak(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<StreakRecord, StoreError> {
        if let Some(record) = streak::insert_streak_if_absent(&self.pool, user_id, now).await? {
            return Ok(record);
        }

        streak::find_streak(&self.pool, user_id)
            .await?
            .ok_or(StoreError::Conflict("streaks"))
    }

    async fn update_streak(&self, record: &StreakRecord) -> Result<bool, StoreError> {
        Ok(streak::update_streak(&self.pool, record).await?)
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn insert_session(&self, record: &StudySessionRecord) -> Result<(), StoreError> {
        Ok(session::insert_session(&self.pool, record).await?)
    }

    async fn find_session(
        &self,
        session_id: Uuid,
    ) -> Result<Option<StudySessionRecord>, StoreError> {
        Ok(session::find_session(&self.pool, session_id).await?)
    }

    async fn update_session(&self, record: &StudySessionRecord) -> Result<bool, StoreError> {
        Ok(session::update_session(&self.pool, record).await?)
    }

    async fn delete_session(&self, session_id: Uuid) -> Result<bool, StoreError> {
        Ok(session::delete_session(&self.pool, session_id).await?)
    }

    async fn list_active_sessions(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<StudySessionRecord>, StoreError> {
        Ok(session::list_active_sessions(&self.pool, user_id).await?)
    }

    async fn list_sessions(
        &self,
        user_id: Uuid,
        filter: SessionFilter,
    ) -> Result<Vec<StudySessionRecord>, StoreError> {
        Ok(session::list_sessions(&self.pool, user_id, filter).await?)
    }

    async fn total_study_seconds(
        &self,
        user_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        Ok(session::total_study_seconds(&self.pool, user_id, from, to, now).await?)
    }

    async fn insert_session_item(&self, item: &SessionItemRecord) -> Result<(), StoreError> {
        Ok(session::insert_session_item(&self.pool, item).await?)
    }

    async fn list_session_items(
        &self,
        session_id: Uuid,
    ) -> Result<Vec<SessionItemDetail>, StoreError> {
        Ok(session::list_session_items(&self.pool, session_id).await?)
    }
}
