use chrono::{DateTime, Utc};
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::models::{ModuleRef, VocabularyRef};

pub async fn user_exists<'e, E>(executor: E, user_id: Uuid) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_scalar(
        // language=PostgreSQL
        r#"
            SELECT EXISTS(
                SELECT 1 FROM users
                WHERE id = $1 AND deleted_at IS NULL
            )
        "#,
    )
    .bind(user_id)
    .fetch_one(executor)
    .await
}

pub async fn find_module<'e, E>(
    executor: E,
    module_id: Uuid,
) -> Result<Option<ModuleRef>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT id, creator_id, name
            FROM study_modules
            WHERE id = $1 AND deleted_at IS NULL
        "#,
    )
    .bind(module_id)
    .fetch_optional(executor)
    .await
}

pub async fn find_vocabulary<'e, E>(
    executor: E,
    vocabulary_id: Uuid,
) -> Result<Option<VocabularyRef>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT v.id, v.module_id, v.term
            FROM vocabularies v
            JOIN study_modules m ON m.id = v.module_id
            WHERE v.id = $1 AND v.deleted_at IS NULL AND m.deleted_at IS NULL
        "#,
    )
    .bind(vocabulary_id)
    .fetch_optional(executor)
    .await
}

/// Stamp the module's `last_studied_at`. Returns false if the module is gone.
pub async fn touch_module<'e, E>(
    executor: E,
    module_id: Uuid,
    studied_at: DateTime<Utc>,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        // language=PostgreSQL
        r#"
            UPDATE study_modules
            SET last_studied_at = $2, updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
        "#,
    )
    .bind(module_id)
    .bind(studied_at)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}
