//! Shared domain types and configuration for the saveecat pipeline.

use thiserror::Error;

pub mod app_config;
pub mod config;
pub mod counters;
pub mod fingerprint;
pub mod item;
pub mod source;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use counters::RunCounters;
pub use fingerprint::asset_fingerprint;
pub use item::{is_valid_item_id, MediaKind, ScrapedItem};
pub use source::{RunKind, RunStatus, SourceKind, SourceStatus};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for environment variable {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
