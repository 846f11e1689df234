//! Content extraction: pull-based item discovery over savee.com listings.

pub mod client;
pub mod error;
pub mod listing;
pub mod stream;

pub use client::ListingExtractor;
pub use error::ExtractError;
pub use listing::{
    extract_ai_tags, extract_color_hexes, extract_item_ids, extract_og_meta,
    extract_source_api_url, extract_tags, OgMeta,
};
pub use stream::{ContentExtractor, ProfileMeta};
