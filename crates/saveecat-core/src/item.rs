//! Scraped item model and identifier validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel strings that templating bugs on the site occasionally leak into
/// DOM ids. None of these is ever a real item id.
const INVALID_ID_SENTINELS: &[&str] = &["undefined", "null", "None", ""];

/// What kind of media an item carries. Gifs are stored like images but keep
/// their original bytes rather than being re-encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    Image,
    Video,
    Gif,
}

impl MediaKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Gif => "gif",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "image" => Some(MediaKind::Image),
            "video" => Some(MediaKind::Video),
            "gif" => Some(MediaKind::Gif),
            _ => None,
        }
    }
}

/// One item extracted from a listing, carrying everything the pipeline
/// needs to deduplicate, upload, and persist it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScrapedItem {
    /// Site-native identifier, unique across all of savee.com.
    pub external_id: String,
    /// Canonical item page (`https://savee.com/i/{id}`).
    pub page_url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub media_kind: Option<MediaKind>,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub og_image_url: Option<String>,
    pub og_url: Option<String>,
    /// The site the item was originally saved from, when exposed.
    pub original_source_url: Option<String>,
    /// Site API endpoint that redirects to the item's original source.
    pub source_api_url: Option<String>,
    pub tags: Vec<String>,
    /// Machine-suggested tags, rendered without the `#` prefix user tags get.
    pub ai_tags: Vec<String>,
    pub color_hexes: Vec<String>,
    pub saved_at: Option<DateTime<Utc>>,
}

impl ScrapedItem {
    /// A bare item known only by id, to be enriched from its page.
    #[must_use]
    pub fn from_id(external_id: &str) -> Self {
        Self {
            external_id: external_id.to_string(),
            page_url: format!("https://savee.com/i/{external_id}"),
            ..Self::default()
        }
    }

    /// The best URL to fingerprint this item's media by, in preference
    /// order: full image, video, og:image, thumbnail.
    #[must_use]
    pub fn primary_media_url(&self) -> Option<&str> {
        self.image_url
            .as_deref()
            .or(self.video_url.as_deref())
            .or(self.og_image_url.as_deref())
            .or(self.thumbnail_url.as_deref())
    }

    /// Every media URL the item carries, for exact-match lookups.
    pub fn media_urls(&self) -> impl Iterator<Item = &str> {
        [
            self.image_url.as_deref(),
            self.video_url.as_deref(),
            self.thumbnail_url.as_deref(),
            self.og_image_url.as_deref(),
        ]
        .into_iter()
        .flatten()
    }
}

/// Validates a candidate item id: 5–24 chars of `[A-Za-z0-9_-]`, and not a
/// templating sentinel.
#[must_use]
pub fn is_valid_item_id(candidate: &str) -> bool {
    if INVALID_ID_SENTINELS.contains(&candidate) {
        return false;
    }
    if candidate.len() < 5 || candidate.len() > 24 {
        return false;
    }
    candidate
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_typical_ids() {
        assert!(is_valid_item_id("kB3xW9"));
        assert!(is_valid_item_id("5f8a2c91e07b4d3a9f61"));
        assert!(is_valid_item_id("a_b-C1"));
    }

    #[test]
    fn rejects_sentinels() {
        assert!(!is_valid_item_id("undefined"));
        assert!(!is_valid_item_id("null"));
        assert!(!is_valid_item_id("None"));
        assert!(!is_valid_item_id(""));
    }

    #[test]
    fn rejects_bad_lengths_and_characters() {
        assert!(!is_valid_item_id("abcd"));
        assert!(!is_valid_item_id(&"x".repeat(25)));
        assert!(!is_valid_item_id("abc/def"));
        assert!(!is_valid_item_id("abc def"));
    }

    #[test]
    fn from_id_builds_page_url() {
        let item = ScrapedItem::from_id("kB3xW9");
        assert_eq!(item.page_url, "https://savee.com/i/kB3xW9");
        assert!(item.primary_media_url().is_none());
    }

    #[test]
    fn media_urls_skips_absent_fields() {
        let mut item = ScrapedItem::from_id("kB3xW9");
        item.video_url = Some("https://dr.savee-cdn.com/videos/v.mp4".into());
        item.og_image_url = Some("https://dr.savee-cdn.com/things/og.jpg".into());
        let urls: Vec<&str> = item.media_urls().collect();
        assert_eq!(
            urls,
            vec![
                "https://dr.savee-cdn.com/videos/v.mp4",
                "https://dr.savee-cdn.com/things/og.jpg"
            ]
        );
    }

    #[test]
    fn primary_media_url_preference_order() {
        let mut item = ScrapedItem::from_id("kB3xW9");
        item.thumbnail_url = Some("https://dr.savee-cdn.com/things/thumbnail_abc.jpg".into());
        item.og_image_url = Some("https://dr.savee-cdn.com/things/og_abc.jpg".into());
        assert_eq!(
            item.primary_media_url(),
            Some("https://dr.savee-cdn.com/things/og_abc.jpg")
        );
        item.image_url = Some("https://dr.savee-cdn.com/things/abc.jpg".into());
        assert_eq!(
            item.primary_media_url(),
            Some("https://dr.savee-cdn.com/things/abc.jpg")
        );
    }
}
