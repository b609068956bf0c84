use chrono::{DateTime, Utc};
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::models::{ProgressRecord, ProgressStatusRow};

pub async fn find_progress<'e, E>(
    executor: E,
    user_id: Uuid,
    vocabulary_id: Uuid,
) -> Result<Option<ProgressRecord>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT id, user_id, vocabulary_id, status, correct_count, incorrect_count,
                   last_studied_at, next_review_at, created_at, updated_at
            FROM learning_progress
            WHERE user_id = $1 AND vocabulary_id = $2
        "#,
    )
    .bind(user_id)
    .bind(vocabulary_id)
    .fetch_optional(executor)
    .await
}

/// Insert a zeroed progress row unless one already exists for the pair.
///
/// Returns `None` when another writer created the row first.
pub async fn insert_progress_if_absent<'e, E>(
    executor: E,
    user_id: Uuid,
    vocabulary_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Option<ProgressRecord>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            INSERT INTO learning_progress (user_id, vocabulary_id, status, correct_count, incorrect_count, created_at, updated_at)
            VALUES ($1, $2, 'NOT_STUDIED', 0, 0, $3, $3)
            ON CONFLICT (user_id, vocabulary_id) DO NOTHING
            RETURNING id, user_id, vocabulary_id, status, correct_count, incorrect_count,
                      last_studied_at, next_review_at, created_at, updated_at
        "#,
    )
    .bind(user_id)
    .bind(vocabulary_id)
    .bind(now)
    .fetch_optional(executor)
    .await
}

/// Write back a progress row if nobody recorded an attempt since it was read.
///
/// The attempt total only ever grows, so it serves as the row version.
pub async fn update_progress_if_unchanged<'e, E>(
    executor: E,
    record: &ProgressRecord,
    expected_attempts: i64,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        // language=PostgreSQL
        r#"
            UPDATE learning_progress
            SET status = $2,
                correct_count = $3,
                incorrect_count = $4,
                last_studied_at = $5,
                next_review_at = $6,
                updated_at = $7
            WHERE id = $1
                AND correct_count::BIGINT + incorrect_count::BIGINT = $8
        "#,
    )
    .bind(record.id)
    .bind(record.status.as_str())
    .bind(record.correct_count)
    .bind(record.incorrect_count)
    .bind(record.last_studied_at)
    .bind(record.next_review_at)
    .bind(record.updated_at)
    .bind(expected_attempts)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn set_next_review<'e, E>(
    executor: E,
    progress_id: Uuid,
    next_review_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        // language=PostgreSQL
        r#"
            UPDATE learning_progress
            SET next_review_at = $2, updated_at = $3
            WHERE id = $1
        "#,
    )
    .bind(progress_id)
    .bind(next_review_at)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn list_progress_for_user<'e, E>(
    executor: E,
    user_id: Uuid,
) -> Result<Vec<ProgressRecord>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT lp.id, lp.user_id, lp.vocabulary_id, lp.status, lp.correct_count, lp.incorrect_count,
                   lp.last_studied_at, lp.next_review_at, lp.created_at, lp.updated_at
            FROM learning_progress lp
            JOIN vocabularies v ON v.id = lp.vocabulary_id
            WHERE lp.user_id = $1 AND v.deleted_at IS NULL
            ORDER BY lp.next_review_at NULLS LAST
        "#,
    )
    .bind(user_id)
    .fetch_all(executor)
    .await
}

pub async fn list_progress_in_module<'e, E>(
    executor: E,
    user_id: Uuid,
    module_id: Uuid,
) -> Result<Vec<ProgressRecord>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT lp.id, lp.user_id, lp.vocabulary_id, lp.status, lp.correct_count, lp.incorrect_count,
                   lp.last_studied_at, lp.next_review_at, lp.created_at, lp.updated_at
            FROM learning_progress lp
            JOIN vocabularies v ON v.id = lp.vocabulary_id
            WHERE lp.user_id = $1 AND v.module_id = $2 AND v.deleted_at IS NULL
            ORDER BY lp.next_review_at NULLS LAST
        "#,
    )
    .bind(user_id)
    .bind(module_id)
    .fetch_all(executor)
    .await
}

/// Stored statuses for those of `vocabulary_ids` the user has progress on.
pub async fn list_statuses<'e, E>(
    executor: E,
    user_id: Uuid,
    vocabulary_ids: &[Uuid],
) -> Result<Vec<ProgressStatusRow>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT vocabulary_id, status
            FROM learning_progress
            WHERE user_id = $1 AND vocabulary_id = ANY($2)
        "#,
    )
    .bind(user_id)
    .bind(vocabulary_ids)
    .fetch_all(executor)
    .await
}
