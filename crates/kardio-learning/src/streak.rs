use std::sync::Arc;

use chrono::NaiveDate;
use kardio_db::{Directory, StreakStore, models::StreakRecord};
use kardio_srs::{Clock, StreakOutcome};
use serde::Serialize;
use uuid::Uuid;

use crate::{error::ServiceError, metrics};

/// A user's streak as seen on the current day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StreakSummary {
    pub current_streak: i32,
    pub longest_streak: i32,
    pub last_activity_date: Option<NaiveDate>,
    pub is_active_today: bool,
}

impl StreakSummary {
    fn from_record(record: &StreakRecord, today: NaiveDate) -> Self {
        Self {
            current_streak: record.current_streak,
            longest_streak: record.longest_streak,
            last_activity_date: record.last_activity_date,
            is_active_today: record.streak().is_active_on(today),
        }
    }

    const fn empty() -> Self {
        Self {
            current_streak: 0,
            longest_streak: 0,
            last_activity_date: None,
            is_active_today: false,
        }
    }
}

#[derive(Clone)]
pub struct StreakService {
    directory: Arc<dyn Directory>,
    store: Arc<dyn StreakStore>,
    clock: Clock,
}

impl std::fmt::Debug for StreakService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreakService")
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl StreakService {
    pub fn new(directory: Arc<dyn Directory>, store: Arc<dyn StreakStore>, clock: Clock) -> Self {
        Self {
            directory,
            store,
            clock,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Best-effort streak bump for today. Never fails the caller.
    pub async fn record_activity(&self, user_id: Uuid) {
        match self.try_record_activity(user_id).await {
            Ok(Some(outcome)) => {
                metrics::record_streak_update(outcome.as_str());
                tracing::debug!(%user_id, outcome = outcome.as_str(), "Streak updated");
            }
            Ok(None) => {
                metrics::record_streak_update("missing");
                tracing::debug!(%user_id, "No streak record, skipping");
            }
            Err(e) => {
                metrics::record_streak_update("error");
                tracing::error!(%user_id, error = %e, "Failed to update streak");
            }
        }
    }

    /// Apply today's activity to the user's streak record.
    ///
    /// Returns `None` when the user has no streak record; records are created
    /// by [`StreakService::ensure_streak`], not here.
    pub async fn try_record_activity(
        &self,
        user_id: Uuid,
    ) -> Result<Option<StreakOutcome>, ServiceError> {
        let Some(mut record) = self.store.find_streak(user_id).await? else {
            return Ok(None);
        };

        let mut streak = record.streak();
        let outcome = streak.record_activity(self.clock.today());

        if outcome.changed() {
            record.apply(&streak, self.clock.now());
            if !self.store.update_streak(&record).await? {
                return Err(ServiceError::Conflict {
                    entity: "streak",
                    id: user_id,
                });
            }
        }

        Ok(Some(outcome))
    }

    /// Create the user's streak record if it does not exist yet.
    pub async fn ensure_streak(&self, user_id: Uuid) -> Result<StreakSummary, ServiceError> {
        if !self.directory.user_exists(user_id).await? {
            return Err(ServiceError::not_found("user", user_id));
        }

        let record = self.store.insert_streak(user_id, self.clock.now()).await?;
        Ok(StreakSummary::from_record(&record, self.clock.today()))
    }

    /// Current streak of a user; zeros if nothing was recorded yet.
    pub async fn get_streak(&self, user_id: Uuid) -> Result<StreakSummary, ServiceError> {
        match self.store.find_streak(user_id).await? {
            Some(record) => Ok(StreakSummary::from_record(&record, self.clock.today())),
            None if self.directory.user_exists(user_id).await? => Ok(StreakSummary::empty()),
            None => Err(ServiceError::not_found("user", user_id)),
        }
    }
}
