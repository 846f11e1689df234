use async_trait::async_trait;
use saveecat_core::ScrapedItem;

use crate::error::ExtractError;

/// A finite, pull-based stream of items discovered from a source.
///
/// Callers pull one item at a time so pause checks and early exit happen at
/// item boundaries without buffering a whole listing. `Ok(None)` marks
/// exhaustion; a stream is not restartable once exhausted.
///
/// An `Err` applies to the current item only; callers may keep pulling
/// afterwards, and the stream skips past the failed item.
/// Profile metadata behind a stream, available for user sources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileMeta {
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

#[async_trait]
pub trait ContentExtractor: Send {
    async fn next_item(&mut self) -> Result<Option<ScrapedItem>, ExtractError>;

    /// Who saved the items in this stream. Sources without a profile page
    /// yield `Ok(None)`.
    async fn profile(&mut self) -> Result<Option<ProfileMeta>, ExtractError> {
        Ok(None)
    }
}
