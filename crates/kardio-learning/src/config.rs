use serde::Deserialize;

/// Deployment environment, read from `APP_ENV`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub const fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    pub const fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

const fn default_max_connections() -> u32 {
    10
}

const fn default_progress_retry_limit() -> u32 {
    3
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    #[serde(default, rename = "app_env")]
    pub env: Environment,
    #[serde(default = "default_max_connections")]
    pub database_max_connections: u32,
    /// How many times a lost progress write is re-read and retried.
    #[serde(default = "default_progress_retry_limit")]
    pub progress_retry_limit: u32,
    /// Seeds the retry-jitter RNG; random when unset.
    #[serde(default)]
    pub review_jitter_seed: Option<u64>,
}

impl AppConfig {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Read the configuration from explicit `(KEY, value)` pairs.
    pub fn from_pairs<I>(pairs: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::from_iter(pairs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_apply() {
        let config =
            AppConfig::from_pairs(pairs(&[("DATABASE_URL", "postgres://localhost/kardio")]))
                .unwrap();

        assert_eq!(config.database_url, "postgres://localhost/kardio");
        assert_eq!(config.env, Environment::Development);
        assert_eq!(config.database_max_connections, 10);
        assert_eq!(config.progress_retry_limit, 3);
        assert_eq!(config.review_jitter_seed, None);
    }

    #[test]
    fn test_overrides_are_read() {
        let config = AppConfig::from_pairs(pairs(&[
            ("DATABASE_URL", "postgres://db/kardio"),
            ("APP_ENV", "production"),
            ("DATABASE_MAX_CONNECTIONS", "25"),
            ("PROGRESS_RETRY_LIMIT", "5"),
            ("REVIEW_JITTER_SEED", "42"),
        ]))
        .unwrap();

        assert!(config.env.is_production());
        assert_eq!(config.database_max_connections, 25);
        assert_eq!(config.progress_retry_limit, 5);
        assert_eq!(config.review_jitter_seed, Some(42));
    }

    #[test]
    fn test_missing_database_url_fails() {
        assert!(AppConfig::from_pairs(pairs(&[("APP_ENV", "development")])).is_err());
    }
}
