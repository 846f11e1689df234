//! Database operations for the `profiles` and `profile_blocks` tables.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `profiles` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProfileRow {
    pub id: i64,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Inserts a profile, or refreshes its display name and avatar if the
/// username already exists. NULL fields in the new data keep the stored
/// values.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_profile(
    pool: &PgPool,
    username: &str,
    display_name: Option<&str>,
    avatar_key: Option<&str>,
) -> Result<ProfileRow, DbError> {
    let row = sqlx::query_as::<_, ProfileRow>(
        "INSERT INTO profiles (username, display_name, avatar_key) \
         VALUES ($1, $2, $3) \
         ON CONFLICT (username) DO UPDATE SET \
             display_name = COALESCE(EXCLUDED.display_name, profiles.display_name), \
             avatar_key   = COALESCE(EXCLUDED.avatar_key, profiles.avatar_key), \
             updated_at   = NOW() \
         RETURNING id, username, display_name, avatar_key, created_at, updated_at",
    )
    .bind(username)
    .bind(display_name)
    .bind(avatar_key)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Links a block to the profile it was saved by. Idempotent on
/// `(profile_id, block_id)`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn link_profile_block(pool: &PgPool, profile_id: i64, block_id: i64) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO profile_blocks (profile_id, block_id) \
         VALUES ($1, $2) \
         ON CONFLICT (profile_id, block_id) DO NOTHING",
    )
    .bind(profile_id)
    .bind(block_id)
    .execute(pool)
    .await?;

    Ok(())
}
