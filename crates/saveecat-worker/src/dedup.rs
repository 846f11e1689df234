//! Layered duplicate detection for pulled items.
//!
//! Checks run from cheapest to most expensive: the in-run set, the preloaded
//! id windows, an indexed id lookup, an exact media-URL lookup, and finally
//! the fuzzy fingerprint match. The first layer that recognises the item
//! wins.

use std::collections::HashSet;

use saveecat_core::{asset_fingerprint, ScrapedItem};

use crate::error::WorkerError;
use crate::gateway::CatalogStore;

/// Why an item was skipped instead of persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Seen earlier in this same run.
    SeenThisRun,
    /// Matched one of the preloaded recent-id windows.
    KnownFromCache,
    /// An id lookup found an existing row.
    AlreadyPersisted,
    /// One of its media URLs matches a stored row exactly.
    ExactUrlMatch,
    /// Its asset fingerprint matches a stored row's media URL.
    FingerprintMatch,
}

impl SkipReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::SeenThisRun => "seen_this_run",
            SkipReason::KnownFromCache => "known_from_cache",
            SkipReason::AlreadyPersisted => "already_persisted",
            SkipReason::ExactUrlMatch => "exact_url_match",
            SkipReason::FingerprintMatch => "fingerprint_match",
        }
    }
}

/// What the dedup layers concluded about one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    New,
    Known(SkipReason),
}

pub struct DedupEngine {
    seen_this_run: HashSet<String>,
    source_window: HashSet<String>,
    global_window: HashSet<String>,
}

impl DedupEngine {
    #[must_use]
    pub fn new(source_window: HashSet<String>, global_window: HashSet<String>) -> Self {
        Self {
            seen_this_run: HashSet::new(),
            source_window,
            global_window,
        }
    }

    /// Classifies `item` against every dedup layer.
    ///
    /// # Errors
    ///
    /// Propagates catalog lookup failures; a failed lookup never silently
    /// classifies an item as new.
    pub async fn classify(
        &self,
        catalog: &dyn CatalogStore,
        item: &ScrapedItem,
    ) -> Result<Verdict, WorkerError> {
        if self.seen_this_run.contains(&item.external_id) {
            return Ok(Verdict::Known(SkipReason::SeenThisRun));
        }
        if self.source_window.contains(&item.external_id)
            || self.global_window.contains(&item.external_id)
        {
            return Ok(Verdict::Known(SkipReason::KnownFromCache));
        }
        if catalog.block_known(&item.external_id).await? {
            return Ok(Verdict::Known(SkipReason::AlreadyPersisted));
        }
        for url in item.media_urls() {
            if catalog.media_url_known(url).await? {
                return Ok(Verdict::Known(SkipReason::ExactUrlMatch));
            }
        }
        for url in item.media_urls() {
            if let Some(fingerprint) = asset_fingerprint(url) {
                if catalog.fingerprint_known(&fingerprint).await? {
                    return Ok(Verdict::Known(SkipReason::FingerprintMatch));
                }
            }
        }
        Ok(Verdict::New)
    }

    /// Marks an item as handled by this run, whatever the outcome. Every
    /// later sighting of the id in the same run is a duplicate.
    pub fn note_processed(&mut self, external_id: &str) {
        self.seen_this_run.insert(external_id.to_string());
    }
}
