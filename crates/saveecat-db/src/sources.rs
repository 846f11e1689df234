//! Database operations for the `sources` table.

use chrono::{DateTime, Utc};
use saveecat_core::{SourceKind, SourceStatus};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `sources` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SourceRow {
    pub id: i64,
    pub public_id: Uuid,
    pub url: String,
    pub kind: String,
    pub username: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SourceRow {
    /// Rebuilds the typed kind from the stored columns.
    #[must_use]
    pub fn source_kind(&self) -> Option<SourceKind> {
        SourceKind::from_stored(&self.kind, self.username.as_deref())
    }
}

const SOURCE_COLUMNS: &str = "id, public_id, url, kind, username, status, created_at, updated_at";

/// Finds the source row for `url`, creating it in `active` status if absent.
///
/// Safe under concurrent callers: the insert is `ON CONFLICT (url) DO
/// NOTHING` followed by a fetch, so exactly one row exists per URL.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert or fetch fails, or
/// [`DbError::NotFound`] if the row vanishes between insert and fetch.
pub async fn create_or_get_source(
    pool: &PgPool,
    url: &str,
    kind: &SourceKind,
) -> Result<SourceRow, DbError> {
    let public_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO sources (public_id, url, kind, username, status) \
         VALUES ($1, $2, $3, $4, 'active') \
         ON CONFLICT (url) DO NOTHING",
    )
    .bind(public_id)
    .bind(url)
    .bind(kind.as_str())
    .bind(kind.username())
    .execute(pool)
    .await?;

    let row = sqlx::query_as::<_, SourceRow>(&format!(
        "SELECT {SOURCE_COLUMNS} FROM sources WHERE url = $1"
    ))
    .bind(url)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Fetches a single source by its internal `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_source(pool: &PgPool, id: i64) -> Result<SourceRow, DbError> {
    let row = sqlx::query_as::<_, SourceRow>(&format!(
        "SELECT {SOURCE_COLUMNS} FROM sources WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Fetches just the status column for a source. Runs poll this between
/// items, so it stays a single-column read.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_source_status(pool: &PgPool, id: i64) -> Result<SourceStatus, DbError> {
    let status: String = sqlx::query_scalar("SELECT status FROM sources WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)?;

    SourceStatus::parse(&status).ok_or(DbError::NotFound)
}

/// Sets a source's status.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn set_source_status(
    pool: &PgPool,
    id: i64,
    status: SourceStatus,
) -> Result<(), DbError> {
    let result = sqlx::query("UPDATE sources SET status = $1, updated_at = NOW() WHERE id = $2")
        .bind(status.as_str())
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}
