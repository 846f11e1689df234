//! Database operations for the `blocks` table and its provenance rows.
//!
//! `blocks.external_id` is unique site-wide. The upsert is first-writer-wins
//! on attribution: a conflicting insert refreshes metadata but never rewrites
//! `source_id` or `run_id`, so the run that first persisted an item keeps
//! credit for it no matter how many later runs re-sight it.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use saveecat_core::ScrapedItem;
use sqlx::PgPool;

use crate::DbError;

/// A row from the `blocks` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BlockRow {
    pub id: i64,
    pub external_id: String,
    pub source_id: i64,
    pub run_id: i64,
    pub page_url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub media_kind: Option<String>,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub og_image_url: Option<String>,
    pub og_url: Option<String>,
    pub original_source_url: Option<String>,
    pub source_api_url: Option<String>,
    pub storage_key: Option<String>,
    pub poster_key: Option<String>,
    pub tags: Vec<String>,
    pub ai_tags: Vec<String>,
    pub color_hexes: Vec<String>,
    pub status: String,
    pub saved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct UpsertedBlockRow {
    #[sqlx(flatten)]
    block: BlockRow,
    is_new: bool,
}

/// Insert payload for [`upsert_block`].
#[derive(Debug)]
pub struct NewBlock<'a> {
    pub source_id: i64,
    pub run_id: i64,
    pub item: &'a ScrapedItem,
    pub storage_key: Option<&'a str>,
    pub poster_key: Option<&'a str>,
}

const BLOCK_COLUMNS: &str = "id, external_id, source_id, run_id, page_url, title, description, \
     media_kind, image_url, video_url, thumbnail_url, og_image_url, og_url, \
     original_source_url, source_api_url, storage_key, poster_key, tags, ai_tags, \
     color_hexes, status, saved_at, created_at, updated_at";

/// Inserts a block, or refreshes its metadata if `external_id` already
/// exists. Returns the row and whether this call created it.
///
/// On conflict the update touches metadata and storage keys (keeping any
/// existing key when the new one is NULL) but never `source_id`/`run_id`.
/// Newness is read from `xmax = 0`: an inserted row has no update
/// transaction, a conflicted one does.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_block(pool: &PgPool, new: NewBlock<'_>) -> Result<(BlockRow, bool), DbError> {
    let item = new.item;
    let status = if new.storage_key.is_some() {
        "uploaded"
    } else {
        "scraped"
    };

    let sql = format!(
        "INSERT INTO blocks \
             (external_id, source_id, run_id, page_url, title, description, media_kind, \
              image_url, video_url, thumbnail_url, og_image_url, og_url, \
              original_source_url, source_api_url, storage_key, poster_key, tags, ai_tags, \
              color_hexes, status, saved_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, \
                 $18, $19, $20, $21) \
         ON CONFLICT (external_id) DO UPDATE SET \
             title               = COALESCE(EXCLUDED.title, blocks.title), \
             description         = COALESCE(EXCLUDED.description, blocks.description), \
             media_kind          = COALESCE(EXCLUDED.media_kind, blocks.media_kind), \
             image_url           = COALESCE(EXCLUDED.image_url, blocks.image_url), \
             video_url           = COALESCE(EXCLUDED.video_url, blocks.video_url), \
             thumbnail_url       = COALESCE(EXCLUDED.thumbnail_url, blocks.thumbnail_url), \
             og_image_url        = COALESCE(EXCLUDED.og_image_url, blocks.og_image_url), \
             og_url              = COALESCE(EXCLUDED.og_url, blocks.og_url), \
             original_source_url = COALESCE(EXCLUDED.original_source_url, blocks.original_source_url), \
             source_api_url      = COALESCE(EXCLUDED.source_api_url, blocks.source_api_url), \
             storage_key         = COALESCE(EXCLUDED.storage_key, blocks.storage_key), \
             poster_key          = COALESCE(EXCLUDED.poster_key, blocks.poster_key), \
             tags                = EXCLUDED.tags, \
             ai_tags             = EXCLUDED.ai_tags, \
             color_hexes         = EXCLUDED.color_hexes, \
             saved_at            = COALESCE(EXCLUDED.saved_at, blocks.saved_at), \
             updated_at          = NOW() \
         RETURNING {BLOCK_COLUMNS}, (xmax = 0) AS is_new"
    );

    let row = sqlx::query_as::<_, UpsertedBlockRow>(&sql)
        .bind(&item.external_id)
        .bind(new.source_id)
        .bind(new.run_id)
        .bind(&item.page_url)
        .bind(item.title.as_deref())
        .bind(item.description.as_deref())
        .bind(item.media_kind.map(saveecat_core::MediaKind::as_str))
        .bind(item.image_url.as_deref())
        .bind(item.video_url.as_deref())
        .bind(item.thumbnail_url.as_deref())
        .bind(item.og_image_url.as_deref())
        .bind(item.og_url.as_deref())
        .bind(item.original_source_url.as_deref())
        .bind(item.source_api_url.as_deref())
        .bind(new.storage_key)
        .bind(new.poster_key)
        .bind(&item.tags)
        .bind(&item.ai_tags)
        .bind(&item.color_hexes)
        .bind(status)
        .bind(item.saved_at)
        .fetch_one(pool)
        .await?;

    Ok((row.block, row.is_new))
}

/// Whether a block with `external_id` was persisted by this run.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn block_exists_in_run(
    pool: &PgPool,
    run_id: i64,
    external_id: &str,
) -> Result<bool, DbError> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM blocks WHERE run_id = $1 AND external_id = $2)",
    )
    .bind(run_id)
    .bind(external_id)
    .fetch_one(pool)
    .await?;

    Ok(exists)
}

/// Whether any block with `external_id` exists.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn block_exists(pool: &PgPool, external_id: &str) -> Result<bool, DbError> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM blocks WHERE external_id = $1)")
            .bind(external_id)
            .fetch_one(pool)
            .await?;

    Ok(exists)
}

/// Finds a block whose stored media URL exactly equals `url`, on any of the
/// four media columns.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_block_by_media_url(pool: &PgPool, url: &str) -> Result<Option<BlockRow>, DbError> {
    let sql = format!(
        "SELECT {BLOCK_COLUMNS} FROM blocks \
         WHERE image_url = $1 OR video_url = $1 OR thumbnail_url = $1 OR og_image_url = $1 \
         LIMIT 1"
    );
    let row = sqlx::query_as::<_, BlockRow>(&sql)
        .bind(url)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Finds a block whose stored media URLs contain `fingerprint` as a
/// substring, case-insensitively. This is the fuzzy fallback for CDN
/// renditions whose full URLs differ.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_block_by_fingerprint(
    pool: &PgPool,
    fingerprint: &str,
) -> Result<Option<BlockRow>, DbError> {
    let pattern = format!("%{fingerprint}%");
    let sql = format!(
        "SELECT {BLOCK_COLUMNS} FROM blocks \
         WHERE image_url ILIKE $1 OR video_url ILIKE $1 \
            OR thumbnail_url ILIKE $1 OR og_image_url ILIKE $1 \
         LIMIT 1"
    );
    let row = sqlx::query_as::<_, BlockRow>(&sql)
        .bind(&pattern)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Loads recent external ids for the fast-path dedup caches: the newest
/// `source_limit` ids persisted from `source_id`, and the newest
/// `global_limit` ids site-wide.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if either query fails.
pub async fn load_known_external_ids(
    pool: &PgPool,
    source_id: i64,
    source_limit: i64,
    global_limit: i64,
) -> Result<(HashSet<String>, HashSet<String>), DbError> {
    let source_ids: Vec<String> = sqlx::query_scalar(
        "SELECT external_id FROM blocks \
         WHERE source_id = $1 \
         ORDER BY created_at DESC, id DESC \
         LIMIT $2",
    )
    .bind(source_id)
    .bind(source_limit)
    .fetch_all(pool)
    .await?;

    let global_ids: Vec<String> = sqlx::query_scalar(
        "SELECT external_id FROM blocks \
         ORDER BY created_at DESC, id DESC \
         LIMIT $1",
    )
    .bind(global_limit)
    .fetch_all(pool)
    .await?;

    Ok((
        source_ids.into_iter().collect(),
        global_ids.into_iter().collect(),
    ))
}

/// Counts blocks attributed to `run_id`. This is the persisted truth the
/// run's `uploaded` counter is reconciled against at completion.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_blocks_for_run(pool: &PgPool, run_id: i64) -> Result<i64, DbError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM blocks WHERE run_id = $1")
        .bind(run_id)
        .fetch_one(pool)
        .await?;

    Ok(count)
}

/// Records that `source_id` sighted `block_id` during `run_id`. Idempotent
/// on `(block_id, source_id)`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn record_provenance(
    pool: &PgPool,
    block_id: i64,
    source_id: i64,
    run_id: i64,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO block_sources (block_id, source_id, run_id) \
         VALUES ($1, $2, $3) \
         ON CONFLICT (block_id, source_id) DO NOTHING",
    )
    .bind(block_id)
    .bind(source_id)
    .bind(run_id)
    .execute(pool)
    .await?;

    Ok(())
}
