//! Log output for Kardio processes.
//!
//! Development logs are pretty-printed. Production logs are flattened JSON
//! lines. Either way the workspace crates log at the chosen level while
//! dependencies stay at `warn`, unless `RUST_LOG` says otherwise.

use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Environment;

/// Crates whose events follow the environment's level.
const KARDIO_TARGETS: [&str; 4] = ["kardio_srs", "kardio_db", "kardio_learning", "kardio_migrate"];

/// Filter directives used when `RUST_LOG` is not set.
///
/// `warn` for everything, `debug` (development) or `info` (production) for
/// the workspace crates.
pub fn default_directives(env: &Environment) -> String {
    let level = if env.is_development() { "debug" } else { "info" };

    let mut directives = vec!["warn".to_string()];
    directives.extend(KARDIO_TARGETS.iter().map(|target| format!("{target}={level}")));
    directives.join(",")
}

fn env_filter(env: &Environment) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(env)))
}

/// Install the global subscriber for `env`.
///
/// `RUST_LOG` overrides the default filter, e.g.
/// `RUST_LOG=kardio_learning=trace,sqlx=info`.
pub fn init_tracing(env: &Environment) {
    let filter = env_filter(env);

    if env.is_development() {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_line_number(true)
                    .with_file(true)
                    .pretty()
                    .with_filter(filter),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .flatten_event(true)
                    .with_target(true)
                    .with_filter(filter),
            )
            .init();
    }

    tracing::info!(environment = ?env, "Logging initialized");
}
