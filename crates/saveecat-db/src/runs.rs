//! Database operations for the `runs` table.

use chrono::{DateTime, Utc};
use saveecat_core::{RunCounters, RunKind, RunStatus};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RunRow {
    pub id: i64,
    pub public_id: Uuid,
    pub source_id: i64,
    pub kind: String,
    pub status: String,
    pub counters: Json<RunCounters>,
    pub max_items: Option<i32>,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl RunRow {
    #[must_use]
    pub fn run_status(&self) -> Option<RunStatus> {
        RunStatus::parse(&self.status)
    }

    #[must_use]
    pub fn run_kind(&self) -> Option<RunKind> {
        RunKind::parse(&self.kind)
    }
}

/// Creates a new run in `pending` status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_run(
    pool: &PgPool,
    source_id: i64,
    kind: RunKind,
    max_items: Option<i32>,
) -> Result<RunRow, DbError> {
    let public_id = Uuid::new_v4();

    let row = sqlx::query_as::<_, RunRow>(
        "INSERT INTO runs (public_id, source_id, kind, max_items, status) \
         VALUES ($1, $2, $3, $4, 'pending') \
         RETURNING id, public_id, source_id, kind, status, counters, max_items, \
                   error_message, started_at, completed_at, created_at",
    )
    .bind(public_id)
    .bind(source_id)
    .bind(kind.as_str())
    .bind(max_items)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Fetches a single run by its internal `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_run(pool: &PgPool, id: i64) -> Result<RunRow, DbError> {
    let row = sqlx::query_as::<_, RunRow>(
        "SELECT id, public_id, source_id, kind, status, counters, max_items, \
                error_message, started_at, completed_at, created_at \
         FROM runs \
         WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Marks a run as `running` and sets `started_at = NOW()`.
///
/// Also transitions from `paused` (a resumed run passes through here) and
/// from `running` itself: a worker that died mid-run leaves the row in
/// `running`, and the replacement picks it back up by id. Only terminal
/// statuses reject the start.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is already
/// `completed` or `error`, or [`DbError::Sqlx`] if the update fails.
pub async fn start_run(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE runs \
         SET status = 'running', started_at = COALESCE(started_at, NOW()) \
         WHERE id = $1 AND status IN ('pending', 'paused', 'running')",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "pending, paused, or running",
        });
    }

    Ok(())
}

/// Writes the current counters onto the run row. Called after every item so
/// progress survives a crash.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn update_run_progress(
    pool: &PgPool,
    id: i64,
    counters: RunCounters,
) -> Result<(), DbError> {
    let result = sqlx::query("UPDATE runs SET counters = $1 WHERE id = $2")
        .bind(Json(counters))
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}

/// Marks a run as `completed` with its final reconciled counters and sets
/// `completed_at = NOW()`.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not `running`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn complete_run(pool: &PgPool, id: i64, counters: RunCounters) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE runs \
         SET status = 'completed', counters = $1, completed_at = NOW() \
         WHERE id = $2 AND status = 'running'",
    )
    .bind(Json(counters))
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Marks a run as `error` with a message and sets `completed_at = NOW()`.
///
/// Transitions from any non-terminal status: a run can fail while pending
/// (source resolution), running, or paused.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is already terminal,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn fail_run(pool: &PgPool, id: i64, error_message: &str) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE runs \
         SET status = 'error', error_message = $1, completed_at = NOW() \
         WHERE id = $2 AND status IN ('pending', 'running', 'paused')",
    )
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "pending, running, or paused",
        });
    }

    Ok(())
}

/// Marks a running run as `paused`.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not `running`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn pause_run(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query("UPDATE runs SET status = 'paused' WHERE id = $1 AND status = 'running'")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Marks a paused run as `running` again.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not `paused`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn resume_run(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query("UPDATE runs SET status = 'running' WHERE id = $1 AND status = 'paused'")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "paused",
        });
    }

    Ok(())
}
