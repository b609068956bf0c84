use kardio_db::StoreError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("{entity} {id} kept changing under concurrent writes")]
    Conflict { entity: &'static str, id: Uuid },
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl ServiceError {
    pub const fn not_found(entity: &'static str, id: Uuid) -> Self {
        Self::NotFound { entity, id }
    }

    /// Short label for logs and metrics.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Forbidden(_) => "forbidden",
            Self::Validation(_) => "validation",
            Self::Conflict { .. } => "conflict",
            Self::Store(_) => "store",
        }
    }
}
