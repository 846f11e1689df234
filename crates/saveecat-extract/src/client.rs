//! HTTP-backed [`ContentExtractor`] over a savee.com listing page.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use saveecat_core::{MediaKind, ScrapedItem};

use crate::error::ExtractError;
use crate::listing::{
    extract_ai_tags, extract_color_hexes, extract_item_ids, extract_og_meta,
    extract_source_api_url, extract_tags,
};
use crate::stream::{ContentExtractor, ProfileMeta};

/// Pulls items from one listing page: fetches the listing once on the first
/// `next_item`, then lazily fetches each item page as it is pulled.
pub struct ListingExtractor {
    client: Client,
    listing_url: String,
    origin: String,
    queue: VecDeque<String>,
    started: bool,
    profile_meta: Option<ProfileMeta>,
}

impl ListingExtractor {
    /// Creates an extractor for `listing_url`. Item pages are fetched from
    /// the same origin, so pointing `listing_url` at a mock server routes
    /// everything through it.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`ExtractError::Listing`] if `listing_url`
    /// has no recognisable origin.
    pub fn new(
        listing_url: &str,
        user_agent: &str,
        timeout_secs: u64,
    ) -> Result<Self, ExtractError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        let origin = extract_origin(listing_url).ok_or_else(|| ExtractError::Listing {
            url: listing_url.to_string(),
            reason: "not an absolute http(s) URL".to_string(),
        })?;

        Ok(Self {
            client,
            listing_url: listing_url.to_string(),
            origin,
            queue: VecDeque::new(),
            started: false,
            profile_meta: None,
        })
    }

    async fn fetch_page(&self, url: &str) -> Result<String, ExtractError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExtractError::Listing {
                url: url.to_string(),
                reason: format!("status {status}"),
            });
        }
        Ok(response.text().await?)
    }

    async fn load_listing(&mut self) -> Result<(), ExtractError> {
        let html = self.fetch_page(&self.listing_url).await?;
        let ids = extract_item_ids(&html);
        tracing::debug!(url = %self.listing_url, count = ids.len(), "listing parsed");
        // On a user listing the page-level og meta is the profile: og:title
        // carries the display name and og:image the avatar.
        let meta = extract_og_meta(&html);
        self.profile_meta = Some(ProfileMeta {
            display_name: meta.title,
            avatar_url: meta.image,
        });
        self.queue = ids.into();
        self.started = true;
        Ok(())
    }

    fn absolutize(&self, url: String) -> String {
        if url.starts_with('/') {
            format!("{}{url}", self.origin)
        } else {
            url
        }
    }

    async fn fetch_item(&self, external_id: &str) -> Result<ScrapedItem, ExtractError> {
        let page_url = format!("{}/i/{external_id}", self.origin);
        let html = self
            .fetch_page(&page_url)
            .await
            .map_err(|err| ExtractError::Item {
                url: page_url.clone(),
                reason: err.to_string(),
            })?;

        let meta = extract_og_meta(&html);
        let mut item = ScrapedItem::from_id(external_id);
        item.title = meta.title;
        item.description = meta.description;
        item.og_url = meta.url;
        item.tags = extract_tags(&html);
        item.ai_tags = extract_ai_tags(&html);
        item.color_hexes = extract_color_hexes(&html);
        item.source_api_url = extract_source_api_url(&html).map(|url| self.absolutize(url));

        if let Some(video_url) = meta.video {
            item.media_kind = Some(MediaKind::Video);
            item.video_url = Some(video_url);
            // For videos the og:image is the poster frame.
            item.thumbnail_url = meta.image.clone();
        } else if let Some(image_url) = &meta.image {
            item.media_kind = Some(if image_url.to_ascii_lowercase().ends_with(".gif") {
                MediaKind::Gif
            } else {
                MediaKind::Image
            });
            item.image_url = meta.image.clone();
        }
        item.og_image_url = meta.image;

        Ok(item)
    }
}

#[async_trait]
impl ContentExtractor for ListingExtractor {
    async fn next_item(&mut self) -> Result<Option<ScrapedItem>, ExtractError> {
        if !self.started {
            self.load_listing().await?;
        }

        // The id is consumed before fetching, so an item failure is skipped
        // on the next pull rather than retried forever.
        let Some(external_id) = self.queue.pop_front() else {
            return Ok(None);
        };

        self.fetch_item(&external_id).await.map(Some)
    }

    async fn profile(&mut self) -> Result<Option<ProfileMeta>, ExtractError> {
        if !self.started {
            self.load_listing().await?;
        }
        Ok(self.profile_meta.clone())
    }
}

/// `scheme://host[:port]` prefix of an absolute http(s) URL.
fn extract_origin(url: &str) -> Option<String> {
    let scheme_end = url.find("://")?;
    let scheme = &url[..scheme_end];
    if scheme != "http" && scheme != "https" {
        return None;
    }
    let rest = &url[scheme_end + 3..];
    let host = rest.split(['/', '?', '#']).next()?;
    if host.is_empty() {
        return None;
    }
    Some(format!("{scheme}://{host}"))
}
