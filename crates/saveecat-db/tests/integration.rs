//! Offline unit tests for saveecat-db pool configuration and row types.
//! These tests do not require a live database connection.

use saveecat_core::{AppConfig, Environment, RunCounters};
use saveecat_db::{BlockRow, PoolConfig, RunRow, SourceRow};

fn test_app_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://example".to_string(),
        env: Environment::Test,
        log_level: "info".to_string(),
        blob_endpoint: "https://blob.internal.example".to_string(),
        blob_bucket: "savee-media".to_string(),
        blob_token: None,
        cms_url: None,
        cms_token: None,
        known_streak_exit: 12,
        min_items_before_exit: 5,
        source_cache_window: 500,
        global_cache_window: 2000,
        poll_interval_secs: 20,
        max_parallel_runs: 2,
        job_max_retries: 3,
        pause_poll_secs: 15,
        upload_max_retries: 6,
        download_max_retries: 3,
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        http_timeout_secs: 30,
        user_agent: "ua".to_string(),
    }
}

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let pool_config = PoolConfig::from_app_config(&test_app_config());
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

/// Compile-time smoke test: confirm that [`RunRow`] has all expected fields
/// with the correct types. No database required.
#[test]
fn run_row_has_expected_fields() {
    use chrono::Utc;
    use sqlx::types::Json;
    use uuid::Uuid;

    let row = RunRow {
        id: 1_i64,
        public_id: Uuid::new_v4(),
        source_id: 2_i64,
        kind: "manual".to_string(),
        status: "pending".to_string(),
        counters: Json(RunCounters::default()),
        max_items: Some(100_i32),
        error_message: None,
        started_at: None,
        completed_at: None,
        created_at: Utc::now(),
    };

    assert_eq!(row.run_kind(), Some(saveecat_core::RunKind::Manual));
    assert_eq!(row.run_status(), Some(saveecat_core::RunStatus::Pending));
    assert_eq!(row.counters.0.found, 0);
}

#[test]
fn source_row_rebuilds_typed_kind() {
    use chrono::Utc;
    use uuid::Uuid;

    let row = SourceRow {
        id: 1_i64,
        public_id: Uuid::new_v4(),
        url: "https://savee.com/gestalten/".to_string(),
        kind: "user".to_string(),
        username: Some("gestalten".to_string()),
        status: "active".to_string(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    assert_eq!(
        row.source_kind(),
        Some(saveecat_core::SourceKind::User("gestalten".to_string()))
    );
}

#[test]
fn block_row_has_expected_fields() {
    use chrono::Utc;

    let row = BlockRow {
        id: 1_i64,
        external_id: "kB3xW9abc".to_string(),
        source_id: 1_i64,
        run_id: 1_i64,
        page_url: "https://savee.com/i/kB3xW9abc".to_string(),
        title: None,
        description: None,
        media_kind: Some("image".to_string()),
        image_url: Some("https://dr.savee-cdn.com/things/original_ab12cd34ef.jpg".to_string()),
        video_url: None,
        thumbnail_url: None,
        og_image_url: None,
        og_url: None,
        original_source_url: None,
        source_api_url: None,
        storage_key: Some("things/kB3xW9abc/original_ab12cd34ef56ab78.jpg".to_string()),
        poster_key: None,
        tags: vec!["typography".to_string()],
        ai_tags: vec![],
        color_hexes: vec![],
        status: "uploaded".to_string(),
        saved_at: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    assert_eq!(row.external_id, "kB3xW9abc");
    assert_eq!(row.status, "uploaded");
    assert!(row.poster_key.is_none());
}
