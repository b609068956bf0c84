//! Learning workflows of Kardio: per-item progress with spaced review,
//! daily streaks and study sessions, over the stores in `kardio-db`.

pub mod config;
pub mod error;
pub mod metrics;
pub mod progress;
pub mod session;
pub mod state;
pub mod streak;
pub mod tracing;

pub use config::{AppConfig, Environment};
pub use error::ServiceError;
pub use progress::{AttemptInput, ModuleStatistics, ProgressService, ProgressView, UserStats};
pub use session::{
    AttemptRecordRequest, SessionAnalysis, SessionDetail, SessionService, SessionView,
};
pub use state::AppState;
pub use streak::{StreakService, StreakSummary};
