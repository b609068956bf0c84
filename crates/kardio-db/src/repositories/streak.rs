use chrono::{DateTime, Utc};
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::models::StreakRecord;

pub async fn find_streak<'e, E>(
    executor: E,
    user_id: Uuid,
) -> Result<Option<StreakRecord>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT id, user_id, current_streak, longest_streak, last_activity_date, created_at, updated_at
            FROM streaks
            WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(executor)
    .await
}

/// Returns `None` if the user already has a streak row.
pub async fn insert_streak_if_absent<'e, E>(
    executor: E,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Option<StreakRecord>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            INSERT INTO streaks (user_id, current_streak, longest_streak, created_at, updated_at)
            VALUES ($1, 0, 0, $2, $2)
            ON CONFLICT (user_id) DO NOTHING
            RETURNING id, user_id, current_streak, longest_streak, last_activity_date, created_at, updated_at
        "#,
    )
    .bind(user_id)
    .bind(now)
    .fetch_optional(executor)
    .await
}

pub async fn update_streak<'e, E>(executor: E, record: &StreakRecord) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        // language=PostgreSQL
        r#"
            UPDATE streaks
            SET current_streak = $2,
                longest_streak = $3,
                last_activity_date = $4,
                updated_at = $5
            WHERE id = $1
        "#,
    )
    .bind(record.id)
    .bind(record.current_streak)
    .bind(record.longest_streak)
    .bind(record.last_activity_date)
    .bind(record.updated_at)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}
