use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    /// Network-level failure fetching a page.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The listing page could not be fetched or yielded nothing usable.
    #[error("listing {url} failed: {reason}")]
    Listing { url: String, reason: String },

    /// One item page failed. The stream continues past this.
    #[error("item {url} failed: {reason}")]
    Item { url: String, reason: String },
}
