//! Error types for media download and blob-store operations.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    /// Network-level failure talking to the blob store or a media host.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// A media download returned a non-success status.
    #[error("download of {url} failed with status {status}")]
    Download { url: String, status: u16 },

    /// The store rejected the request because its clock and ours disagree.
    /// Recovered by rebuilding the client and retrying with backoff.
    #[error("blob store rejected request for clock skew")]
    SkewedClock,

    /// Credentials were rejected outright. Not retriable.
    #[error("blob store rejected credentials")]
    Unauthorized,

    /// Any other unexpected blob-store status.
    #[error("blob store returned unexpected status {status} for {key}")]
    UnexpectedStatus { key: String, status: u16 },

    /// Decoding or re-encoding media bytes failed.
    #[error("image processing failed: {0}")]
    Image(#[from] image::ImageError),

    /// The store's list response did not parse.
    #[error("malformed list response: {0}")]
    MalformedList(#[from] serde_json::Error),
}

impl StorageError {
    /// `true` for conditions worth retrying after a backoff delay: clock
    /// skew, network failures, and 5xx store responses.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            StorageError::SkewedClock => true,
            StorageError::Http(_) => true,
            StorageError::UnexpectedStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
