use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Db(#[from] saveecat_db::DbError),

    #[error(transparent)]
    Storage(#[from] saveecat_storage::StorageError),

    #[error(transparent)]
    Extract(#[from] saveecat_extract::ExtractError),

    #[error("scheduler request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("scheduler endpoint {url} returned status {status}")]
    UnexpectedStatus { url: String, status: u16 },

    /// The run cannot proceed: source resolution, run creation, or a
    /// condition with no per-item recovery.
    #[error("{0}")]
    Fatal(String),
}
