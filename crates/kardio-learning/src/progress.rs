//! Learning progress per (user, vocabulary item).
//!
//! The soft entry points ([`ProgressService::record_attempt`],
//! [`ProgressService::update_next_review_time`]) never return an error: any
//! failure is logged, counted and reported as `false`, so a study session
//! keeps going when progress bookkeeping fails. The `try_*` forms carry the
//! actual error for callers that want it.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use chrono::{DateTime, Utc};
use kardio_db::{Directory, ProgressStore, models::ProgressRecord};
use kardio_srs::{Clock, LearningStatus};
use rand::{SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::ServiceError, metrics, streak::StreakService};

/// Progress of one vocabulary item as shown to the learner
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressView {
    pub id: Uuid,
    pub vocabulary_id: Uuid,
    pub status: LearningStatus,
    pub correct_count: i32,
    pub incorrect_count: i32,
    pub accuracy_rate: f64,
    pub last_studied_at: Option<DateTime<Utc>>,
    pub next_review_at: Option<DateTime<Utc>>,
}

impl From<&ProgressRecord> for ProgressView {
    fn from(record: &ProgressRecord) -> Self {
        Self {
            id: record.id,
            vocabulary_id: record.vocabulary_id,
            status: record.status,
            correct_count: record.correct_count,
            incorrect_count: record.incorrect_count,
            accuracy_rate: record.accuracy_rate(),
            last_studied_at: record.last_studied_at,
            next_review_at: record.next_review_at,
        }
    }
}

/// One answer in a batch update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct AttemptInput {
    pub vocabulary_id: Uuid,
    pub is_correct: bool,
}

/// Aggregate progress of a user over one module
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleStatistics {
    pub module_id: Uuid,
    /// Items with at least one attempt
    pub studied_count: usize,
    pub mastered_count: usize,
    pub learning_count: usize,
    /// Mean per-item accuracy over studied items, 0 when nothing was studied
    pub average_accuracy: f64,
}

/// Overall learning summary of a user
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserStats {
    pub total_tracked: usize,
    pub mastered_count: usize,
    pub learning_count: usize,
    pub not_studied_count: usize,
    /// Correct answers over all answers, in percent
    pub overall_accuracy: f64,
    pub current_streak: i32,
    pub longest_streak: i32,
    pub last_studied_at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct ProgressService {
    directory: Arc<dyn Directory>,
    store: Arc<dyn ProgressStore>,
    clock: Clock,
    rng: Arc<Mutex<StdRng>>,
    retry_limit: u32,
}

impl std::fmt::Debug for ProgressService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressService")
            .field("clock", &self.clock)
            .field("retry_limit", &self.retry_limit)
            .finish_non_exhaustive()
    }
}

impl ProgressService {
    pub fn new(
        directory: Arc<dyn Directory>,
        store: Arc<dyn ProgressStore>,
        clock: Clock,
        rng: StdRng,
        retry_limit: u32,
    ) -> Self {
        Self {
            directory,
            store,
            clock,
            rng: Arc::new(Mutex::new(rng)),
            retry_limit,
        }
    }

    /// Seeded jitter when `seed` is given, OS entropy otherwise.
    pub fn jitter_rng(seed: Option<u64>) -> StdRng {
        seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64)
    }

    /// Same stores and RNG, different clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub const fn clock(&self) -> Clock {
        self.clock
    }

    /// Record one answer. Returns false, after logging, if anything failed.
    pub async fn record_attempt(&self, user_id: Uuid, vocabulary_id: Uuid, is_correct: bool) -> bool {
        tracing::debug!(%user_id, %vocabulary_id, is_correct, "Recording attempt");

        match self
            .try_record_attempt(user_id, vocabulary_id, is_correct)
            .await
        {
            Ok(view) => {
                metrics::record_progress_update("record_attempt", true);
                tracing::debug!(
                    %user_id,
                    %vocabulary_id,
                    status = %view.status,
                    next_review_at = ?view.next_review_at,
                    "Attempt recorded"
                );
                true
            }
            Err(e) => {
                metrics::record_progress_update("record_attempt", false);
                tracing::error!(
                    %user_id,
                    %vocabulary_id,
                    error = %e,
                    kind = e.kind(),
                    "Failed to record attempt"
                );
                false
            }
        }
    }

    /// Record one answer, applying the review schedule, and return the stored result.
    ///
    /// A write that loses against a concurrent attempt on the same row is
    /// recomputed from a fresh read, at most `retry_limit` more times.
    pub async fn try_record_attempt(
        &self,
        user_id: Uuid,
        vocabulary_id: Uuid,
        is_correct: bool,
    ) -> Result<ProgressView, ServiceError> {
        let now = self.clock.now();

        for attempt in 0..=self.retry_limit {
            let mut record = self.load_or_create(user_id, vocabulary_id, now).await?;
            let expected_attempts = record.total_attempts();

            let mut progress = record.progress();
            {
                let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
                progress.record_attempt(is_correct, now, &mut *rng);
            }
            record.apply(&progress, now);

            if self.store.update_progress(&record, expected_attempts).await? {
                return Ok(ProgressView::from(&record));
            }

            tracing::debug!(%user_id, %vocabulary_id, attempt, "Progress changed concurrently, retrying");
        }

        Err(ServiceError::Conflict {
            entity: "learning_progress",
            id: vocabulary_id,
        })
    }

    /// Overwrite when an item is next due. Returns false, after logging, if anything failed.
    pub async fn update_next_review_time(
        &self,
        user_id: Uuid,
        vocabulary_id: Uuid,
        next_review_at: DateTime<Utc>,
    ) -> bool {
        tracing::debug!(%user_id, %vocabulary_id, %next_review_at, "Updating next review time");

        match self
            .try_update_next_review_time(user_id, vocabulary_id, next_review_at)
            .await
        {
            Ok(_) => {
                metrics::record_progress_update("update_next_review_time", true);
                true
            }
            Err(e) => {
                metrics::record_progress_update("update_next_review_time", false);
                tracing::error!(
                    %user_id,
                    %vocabulary_id,
                    error = %e,
                    kind = e.kind(),
                    "Failed to update next review time"
                );
                false
            }
        }
    }

    pub async fn try_update_next_review_time(
        &self,
        user_id: Uuid,
        vocabulary_id: Uuid,
        next_review_at: DateTime<Utc>,
    ) -> Result<ProgressView, ServiceError> {
        let now = self.clock.now();
        let mut record = self.load_or_create(user_id, vocabulary_id, now).await?;

        if !self
            .store
            .set_next_review(record.id, next_review_at, now)
            .await?
        {
            return Err(ServiceError::Conflict {
                entity: "learning_progress",
                id: vocabulary_id,
            });
        }

        record.next_review_at = Some(next_review_at);
        record.updated_at = now;
        Ok(ProgressView::from(&record))
    }

    /// Record a batch of answers in order; returns how many were recorded.
    pub async fn record_attempts(&self, user_id: Uuid, attempts: &[AttemptInput]) -> usize {
        let mut recorded = 0;
        for attempt in attempts {
            if self
                .record_attempt(user_id, attempt.vocabulary_id, attempt.is_correct)
                .await
            {
                recorded += 1;
            }
        }

        if recorded < attempts.len() {
            tracing::warn!(
                %user_id,
                recorded,
                submitted = attempts.len(),
                "Some attempts in the batch were not recorded"
            );
        }
        recorded
    }

    pub async fn get_progress(
        &self,
        user_id: Uuid,
        vocabulary_id: Uuid,
    ) -> Result<Option<ProgressView>, ServiceError> {
        let record = self.store.find_progress(user_id, vocabulary_id).await?;
        Ok(record.as_ref().map(ProgressView::from))
    }

    pub async fn module_statistics(
        &self,
        user_id: Uuid,
        module_id: Uuid,
    ) -> Result<ModuleStatistics, ServiceError> {
        if self.directory.find_module(module_id).await?.is_none() {
            return Err(ServiceError::not_found("module", module_id));
        }

        let records = self
            .store
            .list_progress_in_module(user_id, module_id)
            .await?;
        let studied: Vec<&ProgressRecord> =
            records.iter().filter(|r| r.total_attempts() > 0).collect();

        let average_accuracy = if studied.is_empty() {
            0.0
        } else {
            studied.iter().map(|r| r.accuracy_rate()).sum::<f64>() / studied.len() as f64
        };

        Ok(ModuleStatistics {
            module_id,
            studied_count: studied.len(),
            mastered_count: count_status(&records, LearningStatus::Mastered),
            learning_count: count_status(&records, LearningStatus::Learning),
            average_accuracy,
        })
    }

    /// Studied items whose review time has passed, most overdue first.
    pub async fn due_for_review(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<ProgressView>, ServiceError> {
        let now = self.clock.now();
        let mut due: Vec<ProgressRecord> = self
            .store
            .list_progress_for_user(user_id)
            .await?
            .into_iter()
            .filter(|r| r.total_attempts() > 0 && r.next_review_at.is_some_and(|at| at <= now))
            .collect();
        due.sort_by_key(|r| r.next_review_at);

        Ok(due.iter().take(limit).map(ProgressView::from).collect())
    }

    /// Status of each requested item; items without a record are `NotStudied`.
    pub async fn batch_status(
        &self,
        user_id: Uuid,
        vocabulary_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, LearningStatus>, ServiceError> {
        let mut statuses: HashMap<Uuid, LearningStatus> = vocabulary_ids
            .iter()
            .map(|id| (*id, LearningStatus::NotStudied))
            .collect();
        if vocabulary_ids.is_empty() {
            return Ok(statuses);
        }

        for row in self.store.list_statuses(user_id, vocabulary_ids).await? {
            statuses.insert(row.vocabulary_id, row.status);
        }
        Ok(statuses)
    }

    pub async fn user_stats(
        &self,
        user_id: Uuid,
        streaks: &StreakService,
    ) -> Result<UserStats, ServiceError> {
        if !self.directory.user_exists(user_id).await? {
            return Err(ServiceError::not_found("user", user_id));
        }

        let records = self.store.list_progress_for_user(user_id).await?;
        let streak = streaks.get_streak(user_id).await?;

        let correct: i64 = records.iter().map(|r| i64::from(r.correct_count)).sum();
        let total: i64 = records.iter().map(ProgressRecord::total_attempts).sum();
        let overall_accuracy = if total == 0 {
            0.0
        } else {
            correct as f64 / total as f64 * 100.0
        };

        Ok(UserStats {
            total_tracked: records.len(),
            mastered_count: count_status(&records, LearningStatus::Mastered),
            learning_count: count_status(&records, LearningStatus::Learning),
            not_studied_count: count_status(&records, LearningStatus::NotStudied),
            overall_accuracy,
            current_streak: streak.current_streak,
            longest_streak: streak.longest_streak,
            last_studied_at: records.iter().filter_map(|r| r.last_studied_at).max(),
        })
    }

    /// Existing record for the pair, or a new zeroed one.
    ///
    /// Creating requires both the user and the vocabulary item to resolve.
    async fn load_or_create(
        &self,
        user_id: Uuid,
        vocabulary_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<ProgressRecord, ServiceError> {
        if let Some(record) = self.store.find_progress(user_id, vocabulary_id).await? {
            return Ok(record);
        }

        if !self.directory.user_exists(user_id).await? {
            return Err(ServiceError::not_found("user", user_id));
        }
        if self.directory.find_vocabulary(vocabulary_id).await?.is_none() {
            return Err(ServiceError::not_found("vocabulary", vocabulary_id));
        }

        tracing::debug!(%user_id, %vocabulary_id, "Creating learning progress");
        Ok(self
            .store
            .insert_progress(user_id, vocabulary_id, now)
            .await?)
    }
}

fn count_status(records: &[ProgressRecord], status: LearningStatus) -> usize {
    records.iter().filter(|r| r.status == status).count()
}
