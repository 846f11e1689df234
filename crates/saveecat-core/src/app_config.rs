#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub log_level: String,

    pub blob_endpoint: String,
    pub blob_bucket: String,
    pub blob_token: Option<String>,

    pub cms_url: Option<String>,
    pub cms_token: Option<String>,

    pub known_streak_exit: u32,
    pub min_items_before_exit: u32,
    pub source_cache_window: i64,
    pub global_cache_window: i64,

    pub poll_interval_secs: u64,
    pub max_parallel_runs: usize,
    pub job_max_retries: u32,
    pub pause_poll_secs: u64,

    pub upload_max_retries: u32,
    pub download_max_retries: u32,

    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,

    pub http_timeout_secs: u64,
    pub user_agent: String,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("blob_endpoint", &self.blob_endpoint)
            .field("blob_bucket", &self.blob_bucket)
            .field("blob_token", &self.blob_token.as_ref().map(|_| "[redacted]"))
            .field("cms_url", &self.cms_url)
            .field("cms_token", &self.cms_token.as_ref().map(|_| "[redacted]"))
            .field("known_streak_exit", &self.known_streak_exit)
            .field("min_items_before_exit", &self.min_items_before_exit)
            .field("source_cache_window", &self.source_cache_window)
            .field("global_cache_window", &self.global_cache_window)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("max_parallel_runs", &self.max_parallel_runs)
            .field("job_max_retries", &self.job_max_retries)
            .field("pause_poll_secs", &self.pause_poll_secs)
            .field("upload_max_retries", &self.upload_max_retries)
            .field("download_max_retries", &self.download_max_retries)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}
