//! Trait seams between the orchestrator and its backing services.
//!
//! The orchestrator only speaks these traits, so its loop logic is tested
//! against in-memory fakes while production wires in Postgres and the blob
//! store.

use std::collections::HashSet;

use async_trait::async_trait;
use saveecat_core::{RunCounters, RunKind, ScrapedItem, SourceKind, SourceStatus};
use saveecat_storage::{UploadManager, UploadedMedia};
use sqlx::PgPool;

use crate::error::WorkerError;

/// A persisted block, as the orchestrator needs to see it.
#[derive(Debug, Clone)]
pub struct PersistedBlock {
    pub block_id: i64,
    /// `true` if this call created the row; `false` if another run won the
    /// insert race and this call only refreshed metadata.
    pub is_new: bool,
}

/// Snapshot of a run row used when resuming by id.
#[derive(Debug, Clone)]
pub struct RunSnapshot {
    pub source_id: i64,
    pub kind: Option<RunKind>,
    pub counters: RunCounters,
    pub max_items: Option<i32>,
}

/// Catalog operations the run loop needs.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn resolve_source(&self, url: &str, kind: &SourceKind) -> Result<i64, WorkerError>;
    async fn source_status(&self, source_id: i64) -> Result<SourceStatus, WorkerError>;

    async fn create_run(
        &self,
        source_id: i64,
        kind: RunKind,
        max_items: Option<i32>,
    ) -> Result<i64, WorkerError>;
    async fn load_run(&self, run_id: i64) -> Result<RunSnapshot, WorkerError>;
    async fn start_run(&self, run_id: i64) -> Result<(), WorkerError>;
    async fn pause_run(&self, run_id: i64) -> Result<(), WorkerError>;
    async fn resume_run(&self, run_id: i64) -> Result<(), WorkerError>;
    async fn update_progress(&self, run_id: i64, counters: RunCounters) -> Result<(), WorkerError>;
    async fn complete_run(&self, run_id: i64, counters: RunCounters) -> Result<(), WorkerError>;
    async fn fail_run(&self, run_id: i64, message: &str) -> Result<(), WorkerError>;

    async fn persist_item(
        &self,
        source_id: i64,
        run_id: i64,
        item: &ScrapedItem,
        storage_key: Option<&str>,
        poster_key: Option<&str>,
    ) -> Result<PersistedBlock, WorkerError>;
    async fn block_known(&self, external_id: &str) -> Result<bool, WorkerError>;
    async fn media_url_known(&self, url: &str) -> Result<bool, WorkerError>;
    async fn fingerprint_known(&self, fingerprint: &str) -> Result<bool, WorkerError>;
    async fn known_id_windows(
        &self,
        source_id: i64,
        source_limit: i64,
        global_limit: i64,
    ) -> Result<(HashSet<String>, HashSet<String>), WorkerError>;
    async fn count_run_blocks(&self, run_id: i64) -> Result<i64, WorkerError>;
    async fn record_provenance(
        &self,
        block_id: i64,
        source_id: i64,
        run_id: i64,
    ) -> Result<(), WorkerError>;

    async fn upsert_profile(
        &self,
        username: &str,
        display_name: Option<&str>,
        avatar_key: Option<&str>,
    ) -> Result<i64, WorkerError>;
    async fn link_profile_block(&self, profile_id: i64, block_id: i64) -> Result<(), WorkerError>;
}

/// Media storage operations the run loop needs.
#[async_trait]
pub trait MediaStore: Send {
    async fn store_image(&mut self, url: &str, base_key: &str) -> Result<String, WorkerError>;
    async fn store_video(
        &mut self,
        url: &str,
        base_key: &str,
        poster_url: Option<&str>,
    ) -> Result<UploadedMedia, WorkerError>;
    async fn store_avatar(&mut self, username: &str, url: &str) -> Result<String, WorkerError>;
}

/// Production [`CatalogStore`] over a Postgres pool.
#[derive(Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogStore for PgCatalog {
    async fn resolve_source(&self, url: &str, kind: &SourceKind) -> Result<i64, WorkerError> {
        let row = saveecat_db::create_or_get_source(&self.pool, url, kind).await?;
        Ok(row.id)
    }

    async fn source_status(&self, source_id: i64) -> Result<SourceStatus, WorkerError> {
        Ok(saveecat_db::get_source_status(&self.pool, source_id).await?)
    }

    async fn create_run(
        &self,
        source_id: i64,
        kind: RunKind,
        max_items: Option<i32>,
    ) -> Result<i64, WorkerError> {
        let row = saveecat_db::create_run(&self.pool, source_id, kind, max_items).await?;
        Ok(row.id)
    }

    async fn load_run(&self, run_id: i64) -> Result<RunSnapshot, WorkerError> {
        let row = saveecat_db::get_run(&self.pool, run_id).await?;
        Ok(RunSnapshot {
            source_id: row.source_id,
            kind: row.run_kind(),
            counters: row.counters.0,
            max_items: row.max_items,
        })
    }

    async fn start_run(&self, run_id: i64) -> Result<(), WorkerError> {
        Ok(saveecat_db::start_run(&self.pool, run_id).await?)
    }

    async fn pause_run(&self, run_id: i64) -> Result<(), WorkerError> {
        Ok(saveecat_db::pause_run(&self.pool, run_id).await?)
    }

    async fn resume_run(&self, run_id: i64) -> Result<(), WorkerError> {
        Ok(saveecat_db::resume_run(&self.pool, run_id).await?)
    }

    async fn update_progress(&self, run_id: i64, counters: RunCounters) -> Result<(), WorkerError> {
        Ok(saveecat_db::update_run_progress(&self.pool, run_id, counters).await?)
    }

    async fn complete_run(&self, run_id: i64, counters: RunCounters) -> Result<(), WorkerError> {
        Ok(saveecat_db::complete_run(&self.pool, run_id, counters).await?)
    }

    async fn fail_run(&self, run_id: i64, message: &str) -> Result<(), WorkerError> {
        Ok(saveecat_db::fail_run(&self.pool, run_id, message).await?)
    }

    async fn persist_item(
        &self,
        source_id: i64,
        run_id: i64,
        item: &ScrapedItem,
        storage_key: Option<&str>,
        poster_key: Option<&str>,
    ) -> Result<PersistedBlock, WorkerError> {
        let (row, is_new) = saveecat_db::upsert_block(
            &self.pool,
            saveecat_db::NewBlock {
                source_id,
                run_id,
                item,
                storage_key,
                poster_key,
            },
        )
        .await?;
        Ok(PersistedBlock {
            block_id: row.id,
            is_new,
        })
    }

    async fn block_known(&self, external_id: &str) -> Result<bool, WorkerError> {
        Ok(saveecat_db::block_exists(&self.pool, external_id).await?)
    }

    async fn media_url_known(&self, url: &str) -> Result<bool, WorkerError> {
        Ok(saveecat_db::find_block_by_media_url(&self.pool, url)
            .await?
            .is_some())
    }

    async fn fingerprint_known(&self, fingerprint: &str) -> Result<bool, WorkerError> {
        Ok(saveecat_db::find_block_by_fingerprint(&self.pool, fingerprint)
            .await?
            .is_some())
    }

    async fn known_id_windows(
        &self,
        source_id: i64,
        source_limit: i64,
        global_limit: i64,
    ) -> Result<(HashSet<String>, HashSet<String>), WorkerError> {
        Ok(saveecat_db::load_known_external_ids(&self.pool, source_id, source_limit, global_limit)
            .await?)
    }

    async fn count_run_blocks(&self, run_id: i64) -> Result<i64, WorkerError> {
        Ok(saveecat_db::count_blocks_for_run(&self.pool, run_id).await?)
    }

    async fn record_provenance(
        &self,
        block_id: i64,
        source_id: i64,
        run_id: i64,
    ) -> Result<(), WorkerError> {
        Ok(saveecat_db::record_provenance(&self.pool, block_id, source_id, run_id).await?)
    }

    async fn upsert_profile(
        &self,
        username: &str,
        display_name: Option<&str>,
        avatar_key: Option<&str>,
    ) -> Result<i64, WorkerError> {
        let row =
            saveecat_db::upsert_profile(&self.pool, username, display_name, avatar_key).await?;
        Ok(row.id)
    }

    async fn link_profile_block(&self, profile_id: i64, block_id: i64) -> Result<(), WorkerError> {
        Ok(saveecat_db::link_profile_block(&self.pool, profile_id, block_id).await?)
    }
}

/// Production [`MediaStore`] over the blob-store upload manager.
pub struct BlobMedia {
    manager: UploadManager,
}

impl BlobMedia {
    #[must_use]
    pub fn new(manager: UploadManager) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl MediaStore for BlobMedia {
    async fn store_image(&mut self, url: &str, base_key: &str) -> Result<String, WorkerError> {
        Ok(self.manager.upload_image(url, base_key).await?)
    }

    async fn store_video(
        &mut self,
        url: &str,
        base_key: &str,
        poster_url: Option<&str>,
    ) -> Result<UploadedMedia, WorkerError> {
        Ok(self.manager.upload_video(url, base_key, poster_url).await?)
    }

    async fn store_avatar(&mut self, username: &str, url: &str) -> Result<String, WorkerError> {
        Ok(self.manager.upload_avatar(username, url).await?)
    }
}
