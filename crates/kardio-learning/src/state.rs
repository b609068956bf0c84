use std::sync::Arc;

use anyhow::Context;
use kardio_db::{Directory, PgStore, ProgressStore, SessionStore, StreakStore};
use kardio_srs::Clock;
use rand::rngs::StdRng;

use crate::{
    config::{AppConfig, Environment},
    progress::ProgressService,
    session::SessionService,
    streak::StreakService,
};

/// The services wired onto one store.
#[derive(Clone, Debug)]
pub struct AppState {
    pub progress: ProgressService,
    pub streaks: StreakService,
    pub sessions: SessionService,
    pub environment: Environment,
}

impl AppState {
    /// Connect to Postgres, apply migrations and build the services on top.
    pub async fn connect(config: &AppConfig) -> anyhow::Result<Self> {
        let pool = kardio_db::create_pool(&config.database_url, config.database_max_connections)
            .await
            .context("failed to create database pool")?;
        kardio_db::ensure_db_and_migrate(&config.database_url, &pool)
            .await
            .context("failed to prepare database")?;

        tracing::info!(
            max_connections = config.database_max_connections,
            retry_limit = config.progress_retry_limit,
            "Database ready"
        );

        Ok(Self::from_store(
            PgStore::new(pool),
            config.env,
            Clock::System,
            ProgressService::jitter_rng(config.review_jitter_seed),
            config.progress_retry_limit,
        ))
    }

    /// Build the services over any store implementing every store trait.
    pub fn from_store<S>(
        store: S,
        environment: Environment,
        clock: Clock,
        rng: StdRng,
        retry_limit: u32,
    ) -> Self
    where
        S: Directory + ProgressStore + StreakStore + SessionStore + 'static,
    {
        let store = Arc::new(store);
        let directory: Arc<dyn Directory> = store.clone();

        let progress = ProgressService::new(directory.clone(), store.clone(), clock, rng, retry_limit);
        let streaks = StreakService::new(directory.clone(), store.clone(), clock);
        let sessions =
            SessionService::new(directory, store, progress.clone(), streaks.clone(), clock);

        Self {
            progress,
            streaks,
            sessions,
            environment,
        }
    }

    /// The same services and stores, reading time from `clock`.
    #[must_use]
    pub fn with_clock(self, clock: Clock) -> Self {
        Self {
            progress: self.progress.with_clock(clock),
            streaks: self.streaks.with_clock(clock),
            sessions: self.sessions.with_clock(clock),
            environment: self.environment,
        }
    }
}
