//! Media storage: blob-store gateway, content-addressed keys, and the
//! upload manager that turns scraped media URLs into stored objects.

pub mod client;
pub mod error;
pub mod keys;
pub mod upload;

pub use client::BlobClient;
pub use error::StorageError;
pub use keys::{content_key, content_type_for_extension, file_extension, short_hash};
pub use upload::{StorageConfig, UploadManager, UploadedMedia};
