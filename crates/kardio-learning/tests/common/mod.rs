use chrono::{DateTime, Duration, TimeZone, Utc};
use kardio_db::InMemoryStore;
use kardio_learning::{AppState, Environment, ProgressService};
use kardio_srs::Clock;

/// Monday 2024-03-04 09:00 UTC
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap()
}

/// Test state builder: services over a fresh in-memory store
pub struct TestStateBuilder {
    now: DateTime<Utc>,
    seed: u64,
    retry_limit: u32,
}

impl TestStateBuilder {
    pub fn new() -> Self {
        Self {
            now: start_time(),
            seed: 7,
            retry_limit: 3,
        }
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn retry_limit(mut self, retry_limit: u32) -> Self {
        self.retry_limit = retry_limit;
        self
    }

    pub fn build(self) -> TestApp {
        let store = InMemoryStore::new();
        let state = AppState::from_store(
            store.clone(),
            Environment::Development,
            Clock::fixed(self.now),
            ProgressService::jitter_rng(Some(self.seed)),
            self.retry_limit,
        );

        TestApp {
            state,
            store,
            now: self.now,
        }
    }
}

/// Services plus a handle on the store they share
pub struct TestApp {
    pub state: AppState,
    pub store: InMemoryStore,
    pub now: DateTime<Utc>,
}

impl TestApp {
    /// Move the clock of every service forward.
    pub fn advance(&mut self, delta: Duration) {
        self.now += delta;
        self.state = self.state.clone().with_clock(Clock::fixed(self.now));
    }

    /// A user owning a module with the given terms.
    pub fn seed_module(&self, terms: &[&str]) -> Seeded {
        let user_id = self.store.add_user();
        let module_id = self.store.add_module(user_id, "German basics");
        let vocabulary_ids = terms
            .iter()
            .map(|term| self.store.add_vocabulary(module_id, term))
            .collect();

        Seeded {
            user_id,
            module_id,
            vocabulary_ids,
        }
    }
}

pub struct Seeded {
    pub user_id: uuid::Uuid,
    pub module_id: uuid::Uuid,
    pub vocabulary_ids: Vec<uuid::Uuid>,
}
