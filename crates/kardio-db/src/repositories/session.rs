use chrono::{DateTime, Utc};
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::models::{SessionFilter, SessionItemDetail, SessionItemRecord, StudySessionRecord};

pub async fn insert_session<'e, E>(
    executor: E,
    session: &StudySessionRecord,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        // language=PostgreSQL
        r#"
            INSERT INTO study_sessions (id, user_id, module_id, session_type, start_time, end_time, total_items, correct_items, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(session.id)
    .bind(session.user_id)
    .bind(session.module_id)
    .bind(session.session_type.as_str())
    .bind(session.start_time)
    .bind(session.end_time)
    .bind(session.total_items)
    .bind(session.correct_items)
    .bind(session.created_at)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn find_session<'e, E>(
    executor: E,
    session_id: Uuid,
) -> Result<Option<StudySessionRecord>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT id, user_id, module_id, session_type, start_time, end_time, total_items, correct_items, created_at
            FROM study_sessions
            WHERE id = $1
        "#,
    )
    .bind(session_id)
    .fetch_optional(executor)
    .await
}

pub async fn update_session<'e, E>(
    executor: E,
    session: &StudySessionRecord,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        // language=PostgreSQL
        r#"
            UPDATE study_sessions
            SET end_time = $2, total_items = $3, correct_items = $4
            WHERE id = $1
        "#,
    )
    .bind(session.id)
    .bind(session.end_time)
    .bind(session.total_items)
    .bind(session.correct_items)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Delete a session; its items go with it (`ON DELETE CASCADE`).
pub async fn delete_session<'e, E>(executor: E, session_id: Uuid) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        // language=PostgreSQL
        r#"
            DELETE FROM study_sessions WHERE id = $1
        "#,
    )
    .bind(session_id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn list_active_sessions<'e, E>(
    executor: E,
    user_id: Uuid,
) -> Result<Vec<StudySessionRecord>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT id, user_id, module_id, session_type, start_time, end_time, total_items, correct_items, created_at
            FROM study_sessions
            WHERE user_id = $1 AND end_time IS NULL
            ORDER BY start_time DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(executor)
    .await
}

/// Session history of a user, newest first.
pub async fn list_sessions<'e, E>(
    executor: E,
    user_id: Uuid,
    filter: SessionFilter,
) -> Result<Vec<StudySessionRecord>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT id, user_id, module_id, session_type, start_time, end_time, total_items, correct_items, created_at
            FROM study_sessions
            WHERE user_id = $1
              AND ($2::UUID IS NULL OR module_id = $2)
              AND ($3::TEXT IS NULL OR session_type = $3)
            ORDER BY start_time DESC
        "#,
    )
    .bind(user_id)
    .bind(filter.module_id)
    .bind(filter.session_type.map(|kind| kind.as_str()))
    .fetch_all(executor)
    .await
}

/// Whole seconds spent in sessions that started and ended in `[from, to)`.
///
/// Open sessions count up to `now`.
pub async fn total_study_seconds<'e, E>(
    executor: E,
    user_id: Uuid,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_scalar(
        // language=PostgreSQL
        r#"
            SELECT COALESCE(SUM(FLOOR(GREATEST(EXTRACT(EPOCH FROM (COALESCE(end_time, $4) - start_time)), 0))), 0)::BIGINT
            FROM study_sessions
            WHERE user_id = $1
              AND start_time >= $2 AND start_time < $3
              AND (end_time IS NULL OR end_time < $3)
        "#,
    )
    .bind(user_id)
    .bind(from)
    .bind(to)
    .bind(now)
    .fetch_one(executor)
    .await
}

pub async fn insert_session_item<'e, E>(
    executor: E,
    item: &SessionItemRecord,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        // language=PostgreSQL
        r#"
            INSERT INTO session_items (id, session_id, vocabulary_id, is_correct, response_time_ms, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(item.id)
    .bind(item.session_id)
    .bind(item.vocabulary_id)
    .bind(item.is_correct)
    .bind(item.response_time_ms)
    .bind(item.created_at)
    .execute(executor)
    .await?;
    Ok(())
}

/// Items of a session with their terms, in answer order.
pub async fn list_session_items<'e, E>(
    executor: E,
    session_id: Uuid,
) -> Result<Vec<SessionItemDetail>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT si.id, si.vocabulary_id, v.term, si.is_correct, si.response_time_ms, si.created_at
            FROM session_items si
            JOIN vocabularies v ON v.id = si.vocabulary_id
            WHERE si.session_id = $1
            ORDER BY si.created_at, si.id
        "#,
    )
    .bind(session_id)
    .fetch_all(executor)
    .await
}
