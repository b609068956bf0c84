//! Study sessions: one sitting of a user on a module.
//!
//! Recording an answer in a session also feeds the learner's progress and
//! streak. Those side effects are best effort; a session operation only fails
//! on problems with the session itself.

use std::{collections::BTreeMap, sync::Arc};

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use kardio_db::{
    Directory, SessionStore,
    models::{
        SessionFilter, SessionItemDetail, SessionItemRecord, SessionType, StudySessionRecord,
    },
};
use kardio_srs::{Clock, accuracy_rate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::ServiceError, metrics, progress::ProgressService, streak::StreakService};

/// Answers per term below this accuracy mark the term as difficult.
const DIFFICULT_TERM_ACCURACY: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct AttemptRecordRequest {
    pub session_id: Uuid,
    pub vocabulary_id: Uuid,
    pub is_correct: bool,
    /// Time to answer, when the client measured it
    pub response_time_ms: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub module_id: Uuid,
    pub session_type: SessionType,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub total_items: i32,
    pub correct_items: i32,
    pub accuracy_rate: f64,
    pub duration_seconds: Option<i64>,
    pub is_active: bool,
}

impl From<&StudySessionRecord> for SessionView {
    fn from(session: &StudySessionRecord) -> Self {
        Self {
            id: session.id,
            user_id: session.user_id,
            module_id: session.module_id,
            session_type: session.session_type,
            start_time: session.start_time,
            end_time: session.end_time,
            total_items: session.total_items,
            correct_items: session.correct_items,
            accuracy_rate: session.accuracy_rate(),
            duration_seconds: session.duration_seconds(),
            is_active: !session.is_ended(),
        }
    }
}

/// A session together with every answer given in it, in answer order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionDetail {
    #[serde(flatten)]
    pub session: SessionView,
    pub items: Vec<SessionItemDetail>,
}

/// Per-term breakdown of the answers given in a session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionAnalysis {
    pub total_items: usize,
    pub correct_items: usize,
    pub accuracy_rate: f64,
    /// Mean over answers with a measured time; 0 when none were measured
    pub average_response_time_ms: f64,
    /// Terms answered correctly less than half of the time, sorted
    pub difficult_terms: Vec<String>,
    /// Terms answered correctly every time, sorted
    pub mastered_terms: Vec<String>,
}

impl SessionAnalysis {
    pub fn from_items(items: &[SessionItemDetail]) -> Self {
        let total_items = items.len();
        let correct_items = items.iter().filter(|item| item.is_correct).count();

        let timed: Vec<f64> = items
            .iter()
            .filter_map(|item| item.response_time_ms)
            .map(f64::from)
            .collect();
        let average_response_time_ms = if timed.is_empty() {
            0.0
        } else {
            timed.iter().sum::<f64>() / timed.len() as f64
        };

        // vocabulary id -> (term, correct, incorrect)
        let mut per_term: BTreeMap<Uuid, (&str, i32, i32)> = BTreeMap::new();
        for item in items {
            let entry = per_term
                .entry(item.vocabulary_id)
                .or_insert((item.term.as_str(), 0, 0));
            if item.is_correct {
                entry.1 += 1;
            } else {
                entry.2 += 1;
            }
        }

        let mut difficult_terms = Vec::new();
        let mut mastered_terms = Vec::new();
        for (term, correct, incorrect) in per_term.into_values() {
            if incorrect == 0 {
                mastered_terms.push(term.to_string());
            } else if accuracy_rate(correct, incorrect) < DIFFICULT_TERM_ACCURACY {
                difficult_terms.push(term.to_string());
            }
        }
        difficult_terms.sort();
        mastered_terms.sort();

        Self {
            total_items,
            correct_items,
            accuracy_rate: percentage(correct_items, total_items),
            average_response_time_ms,
            difficult_terms,
            mastered_terms,
        }
    }
}

fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

#[derive(Clone)]
pub struct SessionService {
    directory: Arc<dyn Directory>,
    sessions: Arc<dyn SessionStore>,
    progress: ProgressService,
    streaks: StreakService,
    clock: Clock,
}

impl std::fmt::Debug for SessionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionService")
            .field("progress", &self.progress)
            .field("streaks", &self.streaks)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl SessionService {
    pub fn new(
        directory: Arc<dyn Directory>,
        sessions: Arc<dyn SessionStore>,
        progress: ProgressService,
        streaks: StreakService,
        clock: Clock,
    ) -> Self {
        Self {
            directory,
            sessions,
            progress,
            streaks,
            clock,
        }
    }

    /// Same stores, with this clock here and in the progress and streak services.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.progress = self.progress.with_clock(clock);
        self.streaks = self.streaks.with_clock(clock);
        self.clock = clock;
        self
    }

    /// Start a session, then bump the streak and stamp the module as studied.
    pub async fn create_session(
        &self,
        user_id: Uuid,
        module_id: Uuid,
        session_type: SessionType,
    ) -> Result<SessionView, ServiceError> {
        tracing::info!(%user_id, %module_id, %session_type, "Creating study session");

        if !self.directory.user_exists(user_id).await? {
            return Err(ServiceError::not_found("user", user_id));
        }
        if self.directory.find_module(module_id).await?.is_none() {
            return Err(ServiceError::not_found("module", module_id));
        }

        let now = self.clock.now();
        let session = StudySessionRecord::new(user_id, module_id, session_type, now);
        self.sessions.insert_session(&session).await?;

        if let Err(e) = self.streaks.ensure_streak(user_id).await {
            tracing::warn!(%user_id, error = %e, "Could not create streak record");
        }
        self.streaks.record_activity(user_id).await;
        self.touch_module(module_id, now).await;

        metrics::record_session_event("created");
        tracing::info!(session_id = %session.id, "Study session created");
        Ok(SessionView::from(&session))
    }

    /// Count an answer in the session and feed it to the learner's progress.
    pub async fn record_attempt(
        &self,
        user_id: Uuid,
        request: AttemptRecordRequest,
    ) -> Result<SessionView, ServiceError> {
        tracing::debug!(
            %user_id,
            session_id = %request.session_id,
            vocabulary_id = %request.vocabulary_id,
            "Recording session attempt"
        );

        let mut session = self.owned_session(user_id, request.session_id).await?;
        if session.is_ended() {
            return Err(ServiceError::Validation(format!(
                "session {} has already ended",
                session.id
            )));
        }
        if request.response_time_ms.is_some_and(|ms| ms < 0) {
            return Err(ServiceError::Validation(
                "response time cannot be negative".to_string(),
            ));
        }

        let vocabulary = self
            .directory
            .find_vocabulary(request.vocabulary_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("vocabulary", request.vocabulary_id))?;
        if vocabulary.module_id != session.module_id {
            return Err(ServiceError::Validation(format!(
                "vocabulary {} does not belong to module {}",
                vocabulary.id, session.module_id
            )));
        }

        let now = self.clock.now();
        session.record_attempt(request.is_correct);
        self.sessions
            .insert_session_item(&SessionItemRecord {
                id: Uuid::new_v4(),
                session_id: session.id,
                vocabulary_id: vocabulary.id,
                is_correct: request.is_correct,
                response_time_ms: request.response_time_ms,
                created_at: now,
            })
            .await?;
        if !self.sessions.update_session(&session).await? {
            return Err(ServiceError::not_found("session", session.id));
        }

        if !self
            .progress
            .record_attempt(user_id, vocabulary.id, request.is_correct)
            .await
        {
            tracing::warn!(
                %user_id,
                session_id = %session.id,
                vocabulary_id = %vocabulary.id,
                "Attempt counted in session but learning progress was not updated"
            );
        }

        metrics::record_session_event("attempt");
        Ok(SessionView::from(&session))
    }

    /// End a session. Ending an already ended session returns it unchanged.
    pub async fn end_session(
        &self,
        user_id: Uuid,
        session_id: Uuid,
    ) -> Result<SessionView, ServiceError> {
        let mut session = self.owned_session(user_id, session_id).await?;
        if session.is_ended() {
            tracing::warn!(%session_id, "Session is already ended");
            return Ok(SessionView::from(&session));
        }

        session.end(self.clock.now());
        if !self.sessions.update_session(&session).await? {
            return Err(ServiceError::not_found("session", session_id));
        }

        metrics::record_session_event("ended");
        tracing::info!(
            %session_id,
            total_items = session.total_items,
            correct_items = session.correct_items,
            "Study session ended"
        );
        Ok(SessionView::from(&session))
    }

    pub async fn get_session(
        &self,
        user_id: Uuid,
        session_id: Uuid,
    ) -> Result<SessionView, ServiceError> {
        let session = self.owned_session(user_id, session_id).await?;
        Ok(SessionView::from(&session))
    }

    /// Sessions of the user that have not ended, newest first.
    pub async fn active_sessions(&self, user_id: Uuid) -> Result<Vec<SessionView>, ServiceError> {
        if !self.directory.user_exists(user_id).await? {
            return Err(ServiceError::not_found("user", user_id));
        }

        let sessions = self.sessions.list_active_sessions(user_id).await?;
        Ok(sessions.iter().map(SessionView::from).collect())
    }

    /// The session with its answers.
    pub async fn get_session_detail(
        &self,
        user_id: Uuid,
        session_id: Uuid,
    ) -> Result<SessionDetail, ServiceError> {
        let session = self.owned_session(user_id, session_id).await?;
        let items = self.sessions.list_session_items(session.id).await?;
        Ok(SessionDetail {
            session: SessionView::from(&session),
            items,
        })
    }

    /// Every session of the user, newest first.
    pub async fn session_history(&self, user_id: Uuid) -> Result<Vec<SessionView>, ServiceError> {
        if !self.directory.user_exists(user_id).await? {
            return Err(ServiceError::not_found("user", user_id));
        }
        self.history(user_id, SessionFilter::default()).await
    }

    /// The user's sessions on one module, newest first.
    pub async fn module_sessions(
        &self,
        user_id: Uuid,
        module_id: Uuid,
    ) -> Result<Vec<SessionView>, ServiceError> {
        if self.directory.find_module(module_id).await?.is_none() {
            return Err(ServiceError::not_found("module", module_id));
        }

        let filter = SessionFilter {
            module_id: Some(module_id),
            ..SessionFilter::default()
        };
        self.history(user_id, filter).await
    }

    /// The user's sessions of one kind, newest first.
    pub async fn sessions_by_type(
        &self,
        user_id: Uuid,
        session_type: SessionType,
    ) -> Result<Vec<SessionView>, ServiceError> {
        if !self.directory.user_exists(user_id).await? {
            return Err(ServiceError::not_found("user", user_id));
        }

        let filter = SessionFilter {
            session_type: Some(session_type),
            ..SessionFilter::default()
        };
        self.history(user_id, filter).await
    }

    /// Seconds the user spent in sessions between two UTC days, both inclusive.
    ///
    /// Only sessions that started and ended within the range count; a session
    /// still open counts up to now.
    pub async fn total_study_time(
        &self,
        user_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<i64, ServiceError> {
        tracing::debug!(%user_id, %start_date, %end_date, "Computing total study time");

        if !self.directory.user_exists(user_id).await? {
            return Err(ServiceError::not_found("user", user_id));
        }
        if start_date > end_date {
            return Err(ServiceError::Validation(format!(
                "start date {start_date} is after end date {end_date}"
            )));
        }

        let from = start_date.and_time(NaiveTime::MIN).and_utc();
        let to = end_date
            .and_time(NaiveTime::MIN)
            .and_utc()
            .checked_add_signed(Duration::days(1))
            .ok_or_else(|| {
                ServiceError::Validation(format!("end date {end_date} is out of range"))
            })?;

        let seconds = self
            .sessions
            .total_study_seconds(user_id, from, to, self.clock.now())
            .await?;
        Ok(seconds)
    }

    pub async fn delete_session(&self, user_id: Uuid, session_id: Uuid) -> Result<(), ServiceError> {
        let session = self.owned_session(user_id, session_id).await?;
        if !self.sessions.delete_session(session.id).await? {
            return Err(ServiceError::not_found("session", session_id));
        }

        metrics::record_session_event("deleted");
        tracing::info!(%session_id, "Study session deleted");
        Ok(())
    }

    pub async fn analyze_session(
        &self,
        user_id: Uuid,
        session_id: Uuid,
    ) -> Result<SessionAnalysis, ServiceError> {
        let session = self.owned_session(user_id, session_id).await?;
        let items = self.sessions.list_session_items(session.id).await?;
        if items.is_empty() {
            tracing::warn!(%session_id, "No items found for session");
        }
        Ok(SessionAnalysis::from_items(&items))
    }

    async fn history(
        &self,
        user_id: Uuid,
        filter: SessionFilter,
    ) -> Result<Vec<SessionView>, ServiceError> {
        let sessions = self.sessions.list_sessions(user_id, filter).await?;
        Ok(sessions.iter().map(SessionView::from).collect())
    }

    async fn owned_session(
        &self,
        user_id: Uuid,
        session_id: Uuid,
    ) -> Result<StudySessionRecord, ServiceError> {
        let session = self
            .sessions
            .find_session(session_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("session", session_id))?;

        if session.user_id != user_id {
            tracing::warn!(%user_id, %session_id, "User is not the owner of the session");
            return Err(ServiceError::Forbidden(format!(
                "session {session_id} belongs to another user"
            )));
        }
        Ok(session)
    }

    async fn touch_module(&self, module_id: Uuid, at: DateTime<Utc>) {
        match self.directory.touch_module(module_id, at).await {
            Ok(true) => tracing::debug!(%module_id, "Updated module last studied time"),
            Ok(false) => tracing::warn!(%module_id, "Module vanished before it could be stamped"),
            Err(e) => {
                tracing::error!(%module_id, error = %e, "Failed to update module last studied time");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn item(vocabulary_id: Uuid, term: &str, is_correct: bool, ms: Option<i32>) -> SessionItemDetail {
        SessionItemDetail {
            id: Uuid::new_v4(),
            vocabulary_id,
            term: term.to_string(),
            is_correct,
            response_time_ms: ms,
            created_at: Utc.with_ymd_and_hms(2024, 2, 1, 18, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_analysis_of_empty_session() {
        let analysis = SessionAnalysis::from_items(&[]);
        assert_eq!(analysis.total_items, 0);
        assert_eq!(analysis.accuracy_rate, 0.0);
        assert_eq!(analysis.average_response_time_ms, 0.0);
        assert!(analysis.difficult_terms.is_empty());
        assert!(analysis.mastered_terms.is_empty());
    }

    #[test]
    fn test_analysis_groups_by_term() {
        let (haus, baum, rot) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let items = [
            item(haus, "Haus", true, Some(1000)),
            item(haus, "Haus", true, Some(2000)),
            item(baum, "Baum", false, None),
            item(baum, "Baum", false, Some(3000)),
            item(baum, "Baum", true, None),
            item(rot, "rot", true, None),
            item(rot, "rot", false, None),
        ];

        let analysis = SessionAnalysis::from_items(&items);

        assert_eq!(analysis.total_items, 7);
        assert_eq!(analysis.correct_items, 4);
        assert_eq!(analysis.average_response_time_ms, 2000.0);
        assert_eq!(analysis.mastered_terms, vec!["Haus".to_string()]);
        // rot sits at exactly 50% and is neither
        assert_eq!(analysis.difficult_terms, vec!["Baum".to_string()]);
    }
}
