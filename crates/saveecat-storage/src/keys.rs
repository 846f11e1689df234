//! Content-addressed storage key derivation.
//!
//! Keys take the form `{base}/{variant}_{hash}{ext}` where `hash` is the
//! first 16 hex chars of the content's SHA-256. Re-uploading identical bytes
//! lands on the same key, so uploads are idempotent without an existence
//! probe.

use sha2::{Digest, Sha256};

/// Hex length of the truncated content hash embedded in keys.
const HASH_PREFIX_LEN: usize = 16;

/// First 16 hex chars of the SHA-256 of `bytes`.
#[must_use]
pub fn short_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(HASH_PREFIX_LEN);
    for byte in digest.iter().take(HASH_PREFIX_LEN / 2) {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Builds a `{base}/{variant}_{hash}{ext}` key from content bytes.
#[must_use]
pub fn content_key(base: &str, variant: &str, bytes: &[u8], ext: &str) -> String {
    let base = base.trim_end_matches('/');
    let hash = short_hash(bytes);
    format!("{base}/{variant}_{hash}{ext}")
}

/// Maps a media URL to a storage file extension, defaulting to `.jpg`.
///
/// Looks at the URL path only; query strings are ignored.
#[must_use]
pub fn file_extension(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let lowered = path.to_ascii_lowercase();
    for (suffix, ext) in [
        (".jpeg", ".jpg"),
        (".jpg", ".jpg"),
        (".png", ".png"),
        (".webp", ".webp"),
        (".gif", ".gif"),
        (".mp4", ".mp4"),
        (".webm", ".webm"),
        (".mov", ".mov"),
    ] {
        if lowered.ends_with(suffix) {
            return ext;
        }
    }
    ".jpg"
}

/// Content type for a storage extension produced by [`file_extension`].
#[must_use]
pub fn content_type_for_extension(ext: &str) -> &'static str {
    match ext {
        ".png" => "image/png",
        ".webp" => "image/webp",
        ".gif" => "image/gif",
        ".mp4" => "video/mp4",
        ".webm" => "video/webm",
        ".mov" => "video/quicktime",
        _ => "image/jpeg",
    }
}
