use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    models::{
        ModuleRef, ProgressRecord, ProgressStatusRow, SessionFilter, SessionItemDetail,
        SessionItemRecord, StreakRecord, StudySessionRecord, VocabularyRef,
    },
    store::{Directory, ProgressStore, SessionStore, StoreError, StreakStore},
};

#[derive(Debug)]
struct ModuleEntry {
    module: ModuleRef,
    last_studied_at: Option<DateTime<Utc>>,
    deleted: bool,
}

#[derive(Debug)]
struct VocabularyEntry {
    vocabulary: VocabularyRef,
    deleted: bool,
}

#[derive(Debug, Default)]
struct MemoryState {
    users: HashSet<Uuid>,
    modules: HashMap<Uuid, ModuleEntry>,
    vocabularies: HashMap<Uuid, VocabularyEntry>,
    progress: HashMap<(Uuid, Uuid), ProgressRecord>,
    streaks: HashMap<Uuid, StreakRecord>,
    sessions: HashMap<Uuid, StudySessionRecord>,
    session_items: Vec<SessionItemRecord>,
}

impl MemoryState {
    fn live_vocabulary(&self, vocabulary_id: Uuid) -> Option<&VocabularyRef> {
        let entry = self.vocabularies.get(&vocabulary_id)?;
        let module_live = self
            .modules
            .get(&entry.vocabulary.module_id)
            .is_some_and(|m| !m.deleted);
        (!entry.deleted && module_live).then_some(&entry.vocabulary)
    }
}

/// Due date ascending, never-scheduled rows last.
fn sorted_by_due<'a>(records: impl Iterator<Item = &'a ProgressRecord>) -> Vec<ProgressRecord> {
    let mut out: Vec<ProgressRecord> = records.cloned().collect();
    out.sort_by_key(|r| (r.next_review_at.is_none(), r.next_review_at));
    out
}

/// In-memory implementation of every store trait, for tests and prototyping.
///
/// Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
    fail_progress_writes: Arc<AtomicBool>,
    fail_streak_writes: Arc<AtomicBool>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state.lock().map_err(|_| StoreError::Poisoned)
    }

    fn seed(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_writes(switch: &AtomicBool, table: &str) -> Result<(), StoreError> {
        if switch.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!(
                "{table} writes are switched off"
            )));
        }
        Ok(())
    }

    fn check_progress_writes(&self) -> Result<(), StoreError> {
        Self::check_writes(&self.fail_progress_writes, "progress")
    }

    fn check_streak_writes(&self) -> Result<(), StoreError> {
        Self::check_writes(&self.fail_streak_writes, "streak")
    }

    /// Make every progress insert and update fail until switched back.
    pub fn fail_progress_writes(&self, fail: bool) {
        self.fail_progress_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every streak insert and update fail until switched back.
    pub fn fail_streak_writes(&self, fail: bool) {
        self.fail_streak_writes.store(fail, Ordering::SeqCst);
    }

    pub fn add_user(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.seed().users.insert(id);
        id
    }

    pub fn add_module(&self, creator_id: Uuid, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        let module = ModuleRef {
            id,
            creator_id,
            name: name.to_string(),
        };
        self.seed().modules.insert(
            id,
            ModuleEntry {
                module,
                last_studied_at: None,
                deleted: false,
            },
        );
        id
    }

    pub fn add_vocabulary(&self, module_id: Uuid, term: &str) -> Uuid {
        let id = Uuid::new_v4();
        let vocabulary = VocabularyRef {
            id,
            module_id,
            term: term.to_string(),
        };
        self.seed().vocabularies.insert(
            id,
            VocabularyEntry {
                vocabulary,
                deleted: false,
            },
        );
        id
    }

    pub fn soft_delete_vocabulary(&self, vocabulary_id: Uuid) {
        if let Some(entry) = self.seed().vocabularies.get_mut(&vocabulary_id) {
            entry.deleted = true;
        }
    }

    pub fn soft_delete_module(&self, module_id: Uuid) {
        if let Some(entry) = self.seed().modules.get_mut(&module_id) {
            entry.deleted = true;
        }
    }

    /// When the module was last stamped as studied.
    pub fn module_last_studied_at(&self, module_id: Uuid) -> Option<DateTime<Utc>> {
        self.seed()
            .modules
            .get(&module_id)
            .and_then(|m| m.last_studied_at)
    }
}

#[async_trait]
impl Directory for InMemoryStore {
    async fn user_exists(&self, user_id: Uuid) -> Result<bool, StoreError> {
        Ok(self.state()?.users.contains(&user_id))
    }

    async fn find_module(&self, module_id: Uuid) -> Result<Option<ModuleRef>, StoreError> {
        let state = self.state()?;
        Ok(state
            .modules
            .get(&module_id)
            .filter(|m| !m.deleted)
            .map(|m| m.module.clone()))
    }

    async fn find_vocabulary(
        &self,
        vocabulary_id: Uuid,
    ) -> Result<Option<VocabularyRef>, StoreError> {
        Ok(self.state()?.live_vocabulary(vocabulary_id).cloned())
    }

    async fn touch_module(&self, module_id: Uuid, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut state = self.state()?;
        match state.modules.get_mut(&module_id).filter(|m| !m.deleted) {
            Some(entry) => {
                entry.last_studied_at = Some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl ProgressStore for InMemoryStore {
    async fn find_progress(
        &self,
        user_id: Uuid,
        vocabulary_id: Uuid,
    ) -> Result<Option<ProgressRecord>, StoreError> {
        Ok(self
            .state()?
            .progress
            .get(&(user_id, vocabulary_id))
            .cloned())
    }

    async fn insert_progress(
        &self,
        user_id: Uuid,
        vocabulary_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<ProgressRecord, StoreError> {
        self.check_progress_writes()?;
        let mut state = self.state()?;
        let record = state
            .progress
            .entry((user_id, vocabulary_id))
            .or_insert_with(|| ProgressRecord::new(user_id, vocabulary_id, now));
        Ok(record.clone())
    }

    async fn update_progress(
        &self,
        record: &ProgressRecord,
        expected_attempts: i64,
    ) -> Result<bool, StoreError> {
        self.check_progress_writes()?;
        let mut state = self.state()?;
        let Some(stored) = state
            .progress
            .get_mut(&(record.user_id, record.vocabulary_id))
            .filter(|stored| stored.id == record.id)
        else {
            return Ok(false);
        };
        if stored.total_attempts() != expected_attempts {
            return Ok(false);
        }
        *stored = record.clone();
        Ok(true)
    }

    async fn set_next_review(
        &self,
        progress_id: Uuid,
        next_review_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.check_progress_writes()?;
        let mut state = self.state()?;
        match state.progress.values_mut().find(|r| r.id == progress_id) {
            Some(stored) => {
                stored.next_review_at = Some(next_review_at);
                stored.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_progress_for_user(&self, user_id: Uuid) -> Result<Vec<ProgressRecord>, StoreError> {
        let state = self.state()?;
        let records = state.progress.values().filter(|r| {
            r.user_id == user_id
                && state
                    .vocabularies
                    .get(&r.vocabulary_id)
                    .is_some_and(|v| !v.deleted)
        });
        Ok(sorted_by_due(records))
    }

    async fn list_progress_in_module(
        &self,
        user_id: Uuid,
        module_id: Uuid,
    ) -> Result<Vec<ProgressRecord>, StoreError> {
        let state = self.state()?;
        let records = state.progress.values().filter(|r| {
            r.user_id == user_id
                && state
                    .vocabularies
                    .get(&r.vocabulary_id)
                    .is_some_and(|v| !v.deleted && v.vocabulary.module_id == module_id)
        });
        Ok(sorted_by_due(records))
    }

    async fn list_statuses(
        &self,
        user_id: Uuid,
        vocabulary_ids: &[Uuid],
    ) -> Result<Vec<ProgressStatusRow>, StoreError> {
        let state = self.state()?;
        Ok(vocabulary_ids
            .iter()
            .filter_map(|id| state.progress.get(&(user_id, *id)))
            .map(|r| ProgressStatusRow {
                vocabulary_id: r.vocabulary_id,
                status: r.status,
            })
            .collect())
    }
}

#[async_trait]
impl StreakStore for InMemoryStore {
    async fn find_streak(&self, user_id: Uuid) -> Result<Option<StreakRecord>, StoreError> {
        Ok(self.state()?.streaks.get(&user_id).cloned())
    }

    async fn insert_streak(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<StreakRecord, StoreError> {
        self.check_streak_writes()?;
        let mut state = self.state()?;
        let record = state
            .streaks
            .entry(user_id)
            .or_insert_with(|| StreakRecord::new(user_id, now));
        Ok(record.clone())
    }

    async fn update_streak(&self, record: &StreakRecord) -> Result<bool, StoreError> {
        self.check_streak_writes()?;
        let mut state = self.state()?;
        match state
            .streaks
            .get_mut(&record.user_id)
            .filter(|stored| stored.id == record.id)
        {
            Some(stored) => {
                *stored = record.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn insert_session(&self, session: &StudySessionRecord) -> Result<(), StoreError> {
        let mut state = self.state()?;
        if state.sessions.contains_key(&session.id) {
            return Err(StoreError::Conflict("study_sessions"));
        }
        state.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn find_session(
        &self,
        session_id: Uuid,
    ) -> Result<Option<StudySessionRecord>, StoreError> {
        Ok(self.state()?.sessions.get(&session_id).cloned())
    }

    async fn update_session(&self, session: &StudySessionRecord) -> Result<bool, StoreError> {
        let mut state = self.state()?;
        match state.sessions.get_mut(&session.id) {
            Some(stored) => {
                stored.end_time = session.end_time;
                stored.total_items = session.total_items;
                stored.correct_items = session.correct_items;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_session(&self, session_id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.state()?;
        let removed = state.sessions.remove(&session_id).is_some();
        state.session_items.retain(|item| item.session_id != session_id);
        Ok(removed)
    }

    async fn list_active_sessions(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<StudySessionRecord>, StoreError> {
        let state = self.state()?;
        let mut sessions: Vec<StudySessionRecord> = state
            .sessions
            .values()
            .filter(|s| s.user_id == user_id && !s.is_ended())
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(sessions)
    }

    async fn list_sessions(
        &self,
        user_id: Uuid,
        filter: SessionFilter,
    ) -> Result<Vec<StudySessionRecord>, StoreError> {
        let state = self.state()?;
        let mut sessions: Vec<StudySessionRecord> = state
            .sessions
            .values()
            .filter(|s| s.user_id == user_id && filter.matches(s))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(sessions)
    }

    async fn total_study_seconds(
        &self,
        user_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        let state = self.state()?;
        Ok(state
            .sessions
            .values()
            .filter(|s| s.user_id == user_id && s.start_time >= from && s.start_time < to)
            .filter(|s| s.end_time.is_none_or(|end| end < to))
            .map(|s| s.seconds_studied(now))
            .sum())
    }

    async fn insert_session_item(&self, item: &SessionItemRecord) -> Result<(), StoreError> {
        let mut state = self.state()?;
        if !state.sessions.contains_key(&item.session_id) {
            return Err(StoreError::Conflict("session_items"));
        }
        state.session_items.push(item.clone());
        Ok(())
    }

    async fn list_session_items(
        &self,
        session_id: Uuid,
    ) -> Result<Vec<SessionItemDetail>, StoreError> {
        let state = self.state()?;
        Ok(state
            .session_items
            .iter()
            .filter(|item| item.session_id == session_id)
            .filter_map(|item| {
                let entry = state.vocabularies.get(&item.vocabulary_id)?;
                Some(SessionItemDetail {
                    id: item.id,
                    vocabulary_id: item.vocabulary_id,
                    term: entry.vocabulary.term.clone(),
                    is_correct: item.is_correct,
                    response_time_ms: item.response_time_ms,
                    created_at: item.created_at,
                })
            })
            .collect())
    }
}
