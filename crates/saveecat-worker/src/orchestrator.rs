//! The run loop: pulls items from an extractor, deduplicates, stores media,
//! and persists blocks, driving run-row state transitions along the way.

use std::time::Duration;

use saveecat_core::{
    AppConfig, MediaKind, RunCounters, RunKind, ScrapedItem, SourceKind, SourceStatus,
};
use saveecat_extract::{ContentExtractor, ExtractError};

use crate::dedup::{DedupEngine, SkipReason, Verdict};
use crate::error::WorkerError;
use crate::gateway::{CatalogStore, MediaStore};

/// Loop tuning knobs, lifted out of [`AppConfig`] so tests can set them
/// directly.
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Consecutive known items before a run exits early.
    pub known_streak_exit: u32,
    /// Minimum items pulled before the streak exit may fire.
    pub min_items_before_exit: u32,
    pub source_cache_window: i64,
    pub global_cache_window: i64,
    /// How often a paused run re-checks its source status.
    pub pause_poll_secs: u64,
}

impl RunSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            known_streak_exit: config.known_streak_exit,
            min_items_before_exit: config.min_items_before_exit,
            source_cache_window: config.source_cache_window,
            global_cache_window: config.global_cache_window,
            pause_poll_secs: config.pause_poll_secs,
        }
    }
}

/// Identity and starting state of the run to drive.
#[derive(Debug, Clone)]
pub struct RunParams {
    pub run_id: i64,
    pub source_id: i64,
    pub kind: RunKind,
    pub source_kind: SourceKind,
    pub max_items: Option<i32>,
    /// Non-zero when resuming a paused run.
    pub counters: RunCounters,
}

/// What happened to one pulled item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A new block row was created for this run.
    Persisted,
    Skipped(SkipReason),
    /// The item's row exists but its media could not be stored.
    Failed(String),
}

/// Why the loop stopped pulling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The extractor ran dry.
    Exhausted,
    /// The run hit its item cap.
    MaxItems,
    /// Enough consecutive known items to conclude the listing has no more
    /// new content.
    KnownStreak,
    /// A scheduled run saw a known item after uploading something new.
    ScheduledKnown,
    /// The source was completed or errored out from under the run.
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct RunResult {
    pub run_id: i64,
    pub counters: RunCounters,
    pub exit: ExitReason,
}

/// Drives `params` to a terminal state: `completed` with reconciled
/// counters on success, `error` on a fatal failure.
///
/// # Errors
///
/// Returns the fatal error after marking the run failed. Per-item errors
/// are counted, not returned.
pub async fn execute(
    catalog: &dyn CatalogStore,
    media: &mut dyn MediaStore,
    extractor: &mut dyn ContentExtractor,
    settings: &RunSettings,
    params: RunParams,
) -> Result<RunResult, WorkerError> {
    let run_id = params.run_id;
    match drive(catalog, media, extractor, settings, params).await {
        Ok(result) => Ok(result),
        Err(err) => {
            if let Err(mark_err) = catalog.fail_run(run_id, &err.to_string()).await {
                tracing::error!(run_id, error = %mark_err, "failed to mark run as errored");
            }
            Err(err)
        }
    }
}

async fn drive(
    catalog: &dyn CatalogStore,
    media: &mut dyn MediaStore,
    extractor: &mut dyn ContentExtractor,
    settings: &RunSettings,
    params: RunParams,
) -> Result<RunResult, WorkerError> {
    let RunParams {
        run_id,
        source_id,
        kind,
        source_kind,
        max_items,
        mut counters,
    } = params;

    catalog.start_run(run_id).await?;
    tracing::info!(run_id, source_id, kind = kind.as_str(), "run started");

    // User sources get their profile row refreshed up front so every block
    // can be linked as it lands.
    let profile_id = match source_kind.username() {
        Some(username) => {
            Some(refresh_profile(catalog, media, extractor, run_id, username).await?)
        }
        None => None,
    };

    let (source_window, global_window) = catalog
        .known_id_windows(
            source_id,
            settings.source_cache_window,
            settings.global_cache_window,
        )
        .await?;
    let mut dedup = DedupEngine::new(source_window, global_window);

    let mut known_streak = 0u32;
    let exit = loop {
        if let Some(exit) = wait_while_paused(catalog, run_id, source_id, settings).await {
            break exit;
        }

        if let Some(max) = max_items {
            if max > 0 && counters.found >= i64::from(max) {
                break ExitReason::MaxItems;
            }
        }

        let item = match extractor.next_item().await {
            Ok(Some(item)) => item,
            Ok(None) => break ExitReason::Exhausted,
            Err(ExtractError::Item { url, reason }) => {
                tracing::warn!(run_id, url = %url, reason = %reason, "item extraction failed");
                counters.record_found();
                counters.record_error();
                push_progress(catalog, run_id, counters).await;
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        counters.record_found();
        let external_id = item.external_id.clone();

        let outcome = match dedup.classify(catalog, &item).await? {
            Verdict::Known(reason) => {
                counters.record_skipped();
                known_streak += 1;
                Outcome::Skipped(reason)
            }
            Verdict::New => {
                let outcome =
                    persist_new_item(catalog, media, source_id, run_id, profile_id, &item).await?;
                match &outcome {
                    Outcome::Persisted => {
                        counters.record_uploaded();
                        known_streak = 0;
                    }
                    Outcome::Failed(_) => {
                        counters.record_error();
                        known_streak = 0;
                    }
                    Outcome::Skipped(_) => {
                        // Lost the insert race to a concurrent run.
                        counters.record_skipped();
                        known_streak += 1;
                    }
                }
                outcome
            }
        };
        dedup.note_processed(&external_id);
        tracing::debug!(run_id, external_id = %external_id, outcome = ?outcome, "item processed");
        push_progress(catalog, run_id, counters).await;

        if matches!(outcome, Outcome::Skipped(_))
            && kind == RunKind::Scheduled
            && counters.uploaded >= 1
            && counters.found >= i64::from(settings.min_items_before_exit)
        {
            break ExitReason::ScheduledKnown;
        }
        if known_streak >= settings.known_streak_exit
            && counters.found >= i64::from(settings.min_items_before_exit)
        {
            break ExitReason::KnownStreak;
        }
    };

    // The store is the authority on what this run actually persisted.
    let persisted = catalog.count_run_blocks(run_id).await?;
    counters.reconcile(persisted);
    catalog.complete_run(run_id, counters).await?;
    tracing::info!(
        run_id,
        found = counters.found,
        uploaded = counters.uploaded,
        skipped = counters.skipped,
        errors = counters.errors,
        exit = ?exit,
        "run completed"
    );

    Ok(RunResult {
        run_id,
        counters,
        exit,
    })
}

/// Refreshes the profile row from the listing page's metadata. An avatar
/// storage failure keeps whatever key the row already holds.
async fn refresh_profile(
    catalog: &dyn CatalogStore,
    media: &mut dyn MediaStore,
    extractor: &mut dyn ContentExtractor,
    run_id: i64,
    username: &str,
) -> Result<i64, WorkerError> {
    let meta = extractor.profile().await?.unwrap_or_default();
    let avatar_key = match meta.avatar_url.as_deref() {
        Some(url) => match media.store_avatar(username, url).await {
            Ok(key) => Some(key),
            Err(err) => {
                tracing::warn!(run_id, username, error = %err, "avatar upload failed");
                None
            }
        },
        None => None,
    };
    catalog
        .upsert_profile(username, meta.display_name.as_deref(), avatar_key.as_deref())
        .await
}

/// Stores the item's media and persists its block row. A storage failure
/// downgrades the item to metadata-only instead of losing it.
async fn persist_new_item(
    catalog: &dyn CatalogStore,
    media: &mut dyn MediaStore,
    source_id: i64,
    run_id: i64,
    profile_id: Option<i64>,
    item: &ScrapedItem,
) -> Result<Outcome, WorkerError> {
    let base_key = format!("things/{}", item.external_id);

    let (stored, storage_failure) = match store_media(media, item, &base_key).await {
        Ok(stored) => (stored, None),
        Err(err) => {
            tracing::warn!(
                run_id,
                external_id = %item.external_id,
                error = %err,
                "media storage failed, persisting metadata only"
            );
            (StoredMedia::default(), Some(err.to_string()))
        }
    };

    let persisted = catalog
        .persist_item(
            source_id,
            run_id,
            item,
            stored.storage_key.as_deref(),
            stored.poster_key.as_deref(),
        )
        .await?;

    if let Err(err) = catalog
        .record_provenance(persisted.block_id, source_id, run_id)
        .await
    {
        tracing::warn!(run_id, block_id = persisted.block_id, error = %err, "provenance insert failed");
    }
    if let Some(profile_id) = profile_id {
        if let Err(err) = catalog
            .link_profile_block(profile_id, persisted.block_id)
            .await
        {
            tracing::warn!(run_id, profile_id, error = %err, "profile link failed");
        }
    }

    if !persisted.is_new {
        return Ok(Outcome::Skipped(SkipReason::AlreadyPersisted));
    }
    match storage_failure {
        Some(reason) => Ok(Outcome::Failed(reason)),
        None => Ok(Outcome::Persisted),
    }
}

#[derive(Debug, Default)]
struct StoredMedia {
    storage_key: Option<String>,
    poster_key: Option<String>,
}

async fn store_media(
    media: &mut dyn MediaStore,
    item: &ScrapedItem,
    base_key: &str,
) -> Result<StoredMedia, WorkerError> {
    match item.media_kind {
        Some(MediaKind::Video) => {
            let Some(video_url) = item.video_url.as_deref() else {
                return Ok(StoredMedia::default());
            };
            let poster_url = item.thumbnail_url.as_deref().or(item.og_image_url.as_deref());
            let uploaded = media.store_video(video_url, base_key, poster_url).await?;
            Ok(StoredMedia {
                storage_key: Some(uploaded.storage_key),
                poster_key: uploaded.poster_key,
            })
        }
        _ => {
            let Some(url) = item.primary_media_url() else {
                return Ok(StoredMedia::default());
            };
            let storage_key = media.store_image(url, base_key).await?;
            Ok(StoredMedia {
                storage_key: Some(storage_key),
                poster_key: None,
            })
        }
    }
}

/// Blocks while the source is paused, polling its status. Returns
/// `Some(Cancelled)` when the source leaves the active/paused pair.
async fn wait_while_paused(
    catalog: &dyn CatalogStore,
    run_id: i64,
    source_id: i64,
    settings: &RunSettings,
) -> Option<ExitReason> {
    let mut paused = false;
    loop {
        match catalog.source_status(source_id).await {
            Ok(SourceStatus::Active) => {
                if paused {
                    if let Err(err) = catalog.resume_run(run_id).await {
                        tracing::warn!(run_id, error = %err, "resume transition failed");
                    }
                    tracing::info!(run_id, "source reactivated, resuming run");
                }
                return None;
            }
            Ok(SourceStatus::Paused) => {
                if !paused {
                    if let Err(err) = catalog.pause_run(run_id).await {
                        tracing::warn!(run_id, error = %err, "pause transition failed");
                    }
                    tracing::info!(run_id, source_id, "source paused, holding run");
                    paused = true;
                }
            }
            Ok(SourceStatus::Completed | SourceStatus::Error) => {
                // The run row must be back in `running` before it can be
                // completed by the finalizer.
                if paused {
                    if let Err(err) = catalog.resume_run(run_id).await {
                        tracing::warn!(run_id, error = %err, "resume transition failed");
                    }
                }
                tracing::info!(run_id, source_id, "source left active state, cancelling run");
                return Some(ExitReason::Cancelled);
            }
            Err(err) => {
                tracing::warn!(run_id, error = %err, "source status poll failed");
            }
        }
        tokio::time::sleep(Duration::from_secs(settings.pause_poll_secs)).await;
    }
}

/// Progress rows are advisory; a failed write never stops the run.
async fn push_progress(catalog: &dyn CatalogStore, run_id: i64, counters: RunCounters) {
    if let Err(err) = catalog.update_progress(run_id, counters).await {
        tracing::warn!(run_id, error = %err, "progress update failed");
    }
}

#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod tests;
