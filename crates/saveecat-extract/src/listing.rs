//! Pure HTML extraction for savee.com listing and item pages.
//!
//! The site is a client-rendered grid, but the server HTML carries enough
//! to work from: grid cells expose `grid-item-<ID>` DOM ids and `/i/<ID>`
//! hrefs, and item pages carry OpenGraph meta plus tag/color search links.

use regex::Regex;
use saveecat_core::is_valid_item_id;

/// OpenGraph metadata scraped from an item page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OgMeta {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub video: Option<String>,
    pub url: Option<String>,
}

/// Extracts item ids from a listing page in DOM order, de-duplicated.
///
/// Ids are discovered from `grid-item-<ID>` element ids and `/i/<ID>` hrefs;
/// both sets are merged by document position so the returned order matches
/// the grid order the site renders.
#[must_use]
pub fn extract_item_ids(html: &str) -> Vec<String> {
    let grid_re =
        Regex::new(r#"grid-item-([A-Za-z0-9_-]{5,24})"#).expect("valid grid item regex");
    let href_re = Regex::new(r#"/i/([A-Za-z0-9_-]{5,24})"#).expect("valid item href regex");

    let mut positioned: Vec<(usize, &str)> = Vec::new();
    for cap in grid_re.captures_iter(html) {
        if let Some(m) = cap.get(1) {
            positioned.push((m.start(), m.as_str()));
        }
    }
    for cap in href_re.captures_iter(html) {
        if let Some(m) = cap.get(1) {
            positioned.push((m.start(), m.as_str()));
        }
    }
    positioned.sort_by_key(|(pos, _)| *pos);

    let mut seen = std::collections::HashSet::new();
    positioned
        .into_iter()
        .filter(|(_, id)| is_valid_item_id(id))
        .filter(|(_, id)| seen.insert(id.to_string()))
        .map(|(_, id)| id.to_string())
        .collect()
}

/// Extracts OpenGraph metadata from an item page.
///
/// For the image, falls back through `og:image:secure_url`, `og:image`, and
/// `twitter:image` in that order.
#[must_use]
pub fn extract_og_meta(html: &str) -> OgMeta {
    let image = meta_content(html, "og:image:secure_url")
        .or_else(|| meta_content(html, "og:image"))
        .or_else(|| meta_content(html, "twitter:image"));
    let video = meta_content(html, "og:video:secure_url")
        .or_else(|| meta_content(html, "og:video:url"))
        .or_else(|| meta_content(html, "og:video"));

    OgMeta {
        title: meta_content(html, "og:title"),
        description: meta_content(html, "og:description"),
        image,
        video,
        url: meta_content(html, "og:url"),
    }
}

/// Extracts user tags from `/search/?q=` anchors on an item page.
///
/// The site renders user tags with a `#` prefix in the anchor text; the
/// prefix is stripped and the tag lowercased. Anchors without the prefix
/// are machine suggestions ([`extract_ai_tags`]), and anchors with no text
/// at all are the color swatches, which never count as tags.
#[must_use]
pub fn extract_tags(html: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    search_anchor_texts(html)
        .into_iter()
        .filter_map(|text| text.strip_prefix('#').map(str::to_lowercase))
        .filter(|tag| !tag.is_empty())
        .filter(|tag| seen.insert(tag.clone()))
        .collect()
}

/// Extracts machine-suggested tags: `/search/?q=` anchors whose text lacks
/// the `#` prefix user tags carry.
#[must_use]
pub fn extract_ai_tags(html: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    search_anchor_texts(html)
        .into_iter()
        .filter(|text| !text.is_empty() && !text.starts_with('#'))
        .map(|text| text.to_lowercase())
        .filter(|tag| seen.insert(tag.clone()))
        .collect()
}

/// Extracts the `/api/items/<id>/source/` link that resolves to the item's
/// original source, when the page carries one.
#[must_use]
pub fn extract_source_api_url(html: &str) -> Option<String> {
    let re = Regex::new(r#"href\s*=\s*["']([^"']*/api/items/[A-Za-z0-9_-]+/source/?)["']"#)
        .expect("valid source api regex");
    re.captures(html)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().to_string())
}

/// Visible texts of the `/search/?q=` anchors, in document order with inner
/// markup stripped.
fn search_anchor_texts(html: &str) -> Vec<String> {
    let re = Regex::new(r#"(?is)<a[^>]+href\s*=\s*["'][^"']*/search/\?q=[^"']*["'][^>]*>(.*?)</a>"#)
        .expect("valid search anchor regex");
    let inner_tag = Regex::new(r"<[^>]*>").expect("valid inner tag regex");

    re.captures_iter(html)
        .filter_map(|cap| cap.get(1))
        .map(|m| inner_tag.replace_all(m.as_str(), "").trim().to_string())
        .collect()
}

/// Extracts dominant-color hexes from the "Search by #xxxxxx" swatch links.
#[must_use]
pub fn extract_color_hexes(html: &str) -> Vec<String> {
    let re = Regex::new(r"Search by #([0-9a-fA-F]{6})").expect("valid color swatch regex");

    let mut seen = std::collections::HashSet::new();
    re.captures_iter(html)
        .filter_map(|cap| cap.get(1))
        .map(|m| m.as_str().to_lowercase())
        .filter(|hex| seen.insert(hex.clone()))
        .collect()
}

/// Pulls the `content` attribute of a `<meta property=...>` tag, handling
/// both attribute orders. Also matches `name=` for twitter cards.
fn meta_content(html: &str, property: &str) -> Option<String> {
    let escaped = regex::escape(property);
    let re = Regex::new(&format!(
        r#"(?is)<meta[^>]+(?:property|name)\s*=\s*["']{escaped}["'][^>]+content\s*=\s*["'](.*?)["'][^>]*>"#
    ))
    .expect("valid meta regex");

    if let Some(cap) = re.captures(html) {
        return non_empty(cap.get(1).map_or("", |m| m.as_str()));
    }

    let re_swapped = Regex::new(&format!(
        r#"(?is)<meta[^>]+content\s*=\s*["'](.*?)["'][^>]+(?:property|name)\s*=\s*["']{escaped}["'][^>]*>"#
    ))
    .expect("valid meta fallback regex");

    re_swapped
        .captures(html)
        .and_then(|cap| cap.get(1).map(|m| m.as_str()))
        .and_then(non_empty)
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
