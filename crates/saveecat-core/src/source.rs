//! Source, run, and status vocabulary for the ingestion pipeline.
//!
//! [`SourceKind`] is a closed enum: every supported listing shape is named
//! here, and unknown savee.com URLs are rejected at the boundary instead of
//! being carried around as loose strings.

use serde::{Deserialize, Serialize};

/// Path segments that can never be usernames on savee.com.
const RESERVED_SEGMENTS: &[&str] = &[
    "i", "pop", "s", "search", "login", "signup", "api", "about", "jobs", "terms", "privacy",
];

/// The kind of listing a collection run walks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    /// The savee.com front page feed.
    Home,
    /// The trending (`/pop`) feed.
    Pop,
    /// A user's saves page (`/{username}`).
    User(String),
    /// Items fed in from an external list rather than a crawled page.
    BulkImport,
}

impl SourceKind {
    /// Classifies a savee.com URL into a source kind.
    ///
    /// Returns `None` for URLs on other hosts, item pages (`/i/...`), and
    /// reserved paths that are not listings.
    #[must_use]
    pub fn from_url(url: &str) -> Option<Self> {
        let rest = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"))?;
        let (host, path) = match rest.split_once('/') {
            Some((h, p)) => (h, p),
            None => (rest, ""),
        };
        let host = host.split(':').next().unwrap_or(host);
        if !matches!(host, "savee.com" | "www.savee.com" | "savee.it" | "www.savee.it") {
            return None;
        }

        let path = path.split(['?', '#']).next().unwrap_or("");
        let mut segments = path.split('/').filter(|s| !s.is_empty());
        match segments.next() {
            None => Some(SourceKind::Home),
            Some("pop") => Some(SourceKind::Pop),
            Some(seg) => {
                if RESERVED_SEGMENTS.contains(&seg) {
                    return None;
                }
                Some(SourceKind::User(seg.to_string()))
            }
        }
    }

    /// The canonical listing URL this kind crawls. Bulk imports have no
    /// listing page.
    #[must_use]
    pub fn listing_url(&self) -> Option<String> {
        match self {
            SourceKind::Home => Some("https://savee.com/".to_string()),
            SourceKind::Pop => Some("https://savee.com/pop/".to_string()),
            SourceKind::User(name) => Some(format!("https://savee.com/{name}/")),
            SourceKind::BulkImport => None,
        }
    }

    /// Stable string form for database storage.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            SourceKind::Home => "home",
            SourceKind::Pop => "pop",
            SourceKind::User(_) => "user",
            SourceKind::BulkImport => "bulk_import",
        }
    }

    /// The username behind a [`SourceKind::User`] source.
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        match self {
            SourceKind::User(name) => Some(name),
            _ => None,
        }
    }

    /// Rebuilds a kind from its stored string form plus the optional
    /// username column.
    #[must_use]
    pub fn from_stored(kind: &str, username: Option<&str>) -> Option<Self> {
        match kind {
            "home" => Some(SourceKind::Home),
            "pop" => Some(SourceKind::Pop),
            "bulk_import" => Some(SourceKind::BulkImport),
            "user" => username.map(|u| SourceKind::User(u.to_string())),
            _ => None,
        }
    }
}

/// Lifecycle state of a source row. Runs poll this between items so an
/// operator flipping a source to `Paused` takes effect at the next item
/// boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceStatus {
    Active,
    Paused,
    Completed,
    Error,
}

impl SourceStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SourceStatus::Active => "active",
            SourceStatus::Paused => "paused",
            SourceStatus::Completed => "completed",
            SourceStatus::Error => "error",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(SourceStatus::Active),
            "paused" => Some(SourceStatus::Paused),
            "completed" => Some(SourceStatus::Completed),
            "error" => Some(SourceStatus::Error),
            _ => None,
        }
    }
}

/// Lifecycle state of a run row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Error,
}

impl RunStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Paused => "paused",
            RunStatus::Completed => "completed",
            RunStatus::Error => "error",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RunStatus::Pending),
            "running" => Some(RunStatus::Running),
            "paused" => Some(RunStatus::Paused),
            "completed" => Some(RunStatus::Completed),
            "error" => Some(RunStatus::Error),
            _ => None,
        }
    }
}

/// Whether a run was started by an operator or by the dispatcher.
/// Scheduled runs exit on the first known item once something new has been
/// uploaded; manual runs keep probing to the configured streak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunKind {
    Manual,
    Scheduled,
}

impl RunKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RunKind::Manual => "manual",
            RunKind::Scheduled => "scheduled",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "manual" => Some(RunKind::Manual),
            "scheduled" => Some(RunKind::Scheduled),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_url_home() {
        assert_eq!(SourceKind::from_url("https://savee.com"), Some(SourceKind::Home));
        assert_eq!(SourceKind::from_url("https://savee.com/"), Some(SourceKind::Home));
        assert_eq!(
            SourceKind::from_url("https://www.savee.it/"),
            Some(SourceKind::Home)
        );
    }

    #[test]
    fn from_url_pop() {
        assert_eq!(SourceKind::from_url("https://savee.com/pop"), Some(SourceKind::Pop));
        assert_eq!(
            SourceKind::from_url("https://savee.com/pop/?page=2"),
            Some(SourceKind::Pop)
        );
    }

    #[test]
    fn from_url_user() {
        assert_eq!(
            SourceKind::from_url("https://savee.com/gestalten"),
            Some(SourceKind::User("gestalten".to_string()))
        );
        assert_eq!(
            SourceKind::from_url("https://savee.com/gestalten/boards"),
            Some(SourceKind::User("gestalten".to_string()))
        );
    }

    #[test]
    fn from_url_rejects_item_pages_and_reserved_paths() {
        assert_eq!(SourceKind::from_url("https://savee.com/i/abc123XY"), None);
        assert_eq!(SourceKind::from_url("https://savee.com/search/?q=type"), None);
        assert_eq!(SourceKind::from_url("https://savee.com/login"), None);
    }

    #[test]
    fn from_url_rejects_other_hosts() {
        assert_eq!(SourceKind::from_url("https://example.com/pop"), None);
        assert_eq!(SourceKind::from_url("ftp://savee.com/"), None);
    }

    #[test]
    fn listing_url_round_trip() {
        let kind = SourceKind::User("gestalten".to_string());
        let url = kind.listing_url().unwrap();
        assert_eq!(SourceKind::from_url(&url), Some(kind));
        assert_eq!(SourceKind::BulkImport.listing_url(), None);
    }

    #[test]
    fn stored_form_round_trip() {
        let kind = SourceKind::User("gestalten".to_string());
        assert_eq!(
            SourceKind::from_stored(kind.as_str(), Some("gestalten")),
            Some(kind)
        );
        assert_eq!(SourceKind::from_stored("home", None), Some(SourceKind::Home));
        assert_eq!(SourceKind::from_stored("user", None), None);
        assert_eq!(SourceKind::from_stored("feed", None), None);
    }

    #[test]
    fn status_string_round_trips() {
        for status in [
            RunStatus::Pending,
            RunStatus::Running,
            RunStatus::Paused,
            RunStatus::Completed,
            RunStatus::Error,
        ] {
            assert_eq!(RunStatus::parse(status.as_str()), Some(status));
        }
        for status in [
            SourceStatus::Active,
            SourceStatus::Paused,
            SourceStatus::Completed,
            SourceStatus::Error,
        ] {
            assert_eq!(SourceStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(RunKind::parse("scheduled"), Some(RunKind::Scheduled));
        assert_eq!(RunKind::parse("cron"), None);
    }
}
