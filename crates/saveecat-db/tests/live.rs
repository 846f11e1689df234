//! Live integration tests for saveecat-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. The `migrations` path is relative to the crate root
//! (`crates/saveecat-db/`), so `"../../migrations"` resolves to the workspace
//! migration directory.

use saveecat_core::{RunCounters, RunKind, ScrapedItem, SourceKind, SourceStatus};
use saveecat_db::{
    block_exists, block_exists_in_run, complete_run, count_blocks_for_run, create_or_get_source,
    create_run, fail_run, find_block_by_fingerprint, find_block_by_media_url, get_run,
    get_source_status, link_profile_block, load_known_external_ids, pause_run, record_provenance,
    resume_run, set_source_status, start_run, upsert_block, upsert_profile, NewBlock,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_item(external_id: &str) -> ScrapedItem {
    let mut item = ScrapedItem::from_id(external_id);
    item.title = Some(format!("Item {external_id}"));
    item.image_url = Some(format!(
        "https://dr.savee-cdn.com/things/original_{external_id}abcdef0123.jpg"
    ));
    item.tags = vec!["typography".to_string()];
    item
}

async fn seed_source_and_run(pool: &sqlx::PgPool) -> (i64, i64) {
    let source = create_or_get_source(pool, "https://savee.com/pop/", &SourceKind::Pop)
        .await
        .expect("create_or_get_source failed");
    let run = create_run(pool, source.id, RunKind::Manual, None)
        .await
        .expect("create_run failed");
    start_run(pool, run.id).await.expect("start_run failed");
    (source.id, run.id)
}

// ---------------------------------------------------------------------------
// Section 1: Source and run lifecycle
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn create_or_get_source_is_idempotent(pool: sqlx::PgPool) {
    let kind = SourceKind::User("gestalten".to_string());
    let first = create_or_get_source(&pool, "https://savee.com/gestalten/", &kind)
        .await
        .expect("first create failed");
    let second = create_or_get_source(&pool, "https://savee.com/gestalten/", &kind)
        .await
        .expect("second create failed");

    assert_eq!(first.id, second.id);
    assert_eq!(second.username.as_deref(), Some("gestalten"));
    assert_eq!(second.status, "active");
}

#[sqlx::test(migrations = "../../migrations")]
async fn source_status_round_trips(pool: sqlx::PgPool) {
    let source = create_or_get_source(&pool, "https://savee.com/", &SourceKind::Home)
        .await
        .expect("create failed");

    set_source_status(&pool, source.id, SourceStatus::Paused)
        .await
        .expect("set status failed");
    let status = get_source_status(&pool, source.id)
        .await
        .expect("get status failed");
    assert_eq!(status, SourceStatus::Paused);
}

#[sqlx::test(migrations = "../../migrations")]
async fn run_lifecycle_pending_to_completed(pool: sqlx::PgPool) {
    let source = create_or_get_source(&pool, "https://savee.com/pop/", &SourceKind::Pop)
        .await
        .expect("create source failed");
    let run = create_run(&pool, source.id, RunKind::Scheduled, Some(50))
        .await
        .expect("create run failed");

    assert_eq!(run.status, "pending");
    assert_eq!(run.max_items, Some(50));
    assert!(run.started_at.is_none());
    assert_eq!(run.counters.0, RunCounters::default());

    start_run(&pool, run.id).await.expect("start failed");

    let counters = RunCounters {
        found: 3,
        uploaded: 2,
        skipped: 1,
        errors: 0,
    };
    complete_run(&pool, run.id, counters)
        .await
        .expect("complete failed");

    let row = get_run(&pool, run.id).await.expect("get failed");
    assert_eq!(row.status, "completed");
    assert!(row.completed_at.is_some());
    assert_eq!(row.counters.0, counters);
}

#[sqlx::test(migrations = "../../migrations")]
async fn interrupted_run_can_be_started_again_by_id(pool: sqlx::PgPool) {
    let (_, run_id) = seed_source_and_run(&pool).await;

    // A worker died mid-run; the row is still `running`. A replacement
    // worker resuming by id must be able to start it again.
    start_run(&pool, run_id).await.expect("restart failed");

    let row = get_run(&pool, run_id).await.expect("get failed");
    assert_eq!(row.status, "running");

    // Terminal runs still reject a start.
    complete_run(&pool, run_id, RunCounters::default())
        .await
        .expect("complete failed");
    start_run(&pool, run_id)
        .await
        .expect_err("starting a completed run should fail");
}

#[sqlx::test(migrations = "../../migrations")]
async fn run_pause_and_resume(pool: sqlx::PgPool) {
    let (_, run_id) = seed_source_and_run(&pool).await;

    pause_run(&pool, run_id).await.expect("pause failed");
    let row = get_run(&pool, run_id).await.expect("get failed");
    assert_eq!(row.status, "paused");

    resume_run(&pool, run_id).await.expect("resume failed");
    let row = get_run(&pool, run_id).await.expect("get failed");
    assert_eq!(row.status, "running");

    // Pausing a run that is not running is an invalid transition.
    resume_run(&pool, run_id)
        .await
        .expect_err("resume of a running run should fail");
}

#[sqlx::test(migrations = "../../migrations")]
async fn fail_run_records_message_from_any_active_status(pool: sqlx::PgPool) {
    let source = create_or_get_source(&pool, "https://savee.com/", &SourceKind::Home)
        .await
        .expect("create source failed");
    let run = create_run(&pool, source.id, RunKind::Manual, None)
        .await
        .expect("create run failed");

    // Still pending: source resolution can fail before the loop starts.
    fail_run(&pool, run.id, "listing fetch failed")
        .await
        .expect("fail_run failed");

    let row = get_run(&pool, run.id).await.expect("get failed");
    assert_eq!(row.status, "error");
    assert_eq!(row.error_message.as_deref(), Some("listing fetch failed"));

    // Terminal runs reject further transitions.
    fail_run(&pool, run.id, "again")
        .await
        .expect_err("failing a terminal run should error");
}

// ---------------------------------------------------------------------------
// Section 2: Block uniqueness and attribution
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn duplicate_upsert_keeps_one_row_and_first_attribution(pool: sqlx::PgPool) {
    let (source_id, run_id) = seed_source_and_run(&pool).await;

    let item = make_item("kB3xW9abc");
    let (first, is_new) = upsert_block(
        &pool,
        NewBlock {
            source_id,
            run_id,
            item: &item,
            storage_key: Some("things/kB3xW9abc/original_9f3b2c81aa04de17.jpg"),
            poster_key: None,
        },
    )
    .await
    .expect("first upsert failed");
    assert!(is_new);
    assert_eq!(first.status, "uploaded");

    // A second run sights the same item with fresher metadata.
    let other_source = create_or_get_source(
        &pool,
        "https://savee.com/gestalten/",
        &SourceKind::User("gestalten".to_string()),
    )
    .await
    .expect("create source failed");
    let other_run = create_run(&pool, other_source.id, RunKind::Manual, None)
        .await
        .expect("create run failed");
    start_run(&pool, other_run.id).await.expect("start failed");

    let mut newer = make_item("kB3xW9abc");
    newer.description = Some("now with a description".to_string());
    let (second, is_new) = upsert_block(
        &pool,
        NewBlock {
            source_id: other_source.id,
            run_id: other_run.id,
            item: &newer,
            storage_key: None,
            poster_key: None,
        },
    )
    .await
    .expect("second upsert failed");

    assert!(!is_new);
    assert_eq!(second.id, first.id);
    // Metadata refreshed, attribution and storage key untouched.
    assert_eq!(second.description.as_deref(), Some("now with a description"));
    assert_eq!(second.source_id, source_id);
    assert_eq!(second.run_id, run_id);
    assert_eq!(second.storage_key, first.storage_key);

    assert_eq!(count_blocks_for_run(&pool, run_id).await.unwrap(), 1);
    assert_eq!(count_blocks_for_run(&pool, other_run.id).await.unwrap(), 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn block_round_trips_tag_and_origin_metadata(pool: sqlx::PgPool) {
    let (source_id, run_id) = seed_source_and_run(&pool).await;

    let mut item = make_item("tGg45678");
    item.ai_tags = vec!["brutalism".to_string(), "poster".to_string()];
    item.source_api_url = Some("https://savee.com/api/items/tGg45678/source/".to_string());
    let (block, _) = upsert_block(
        &pool,
        NewBlock {
            source_id,
            run_id,
            item: &item,
            storage_key: None,
            poster_key: None,
        },
    )
    .await
    .expect("upsert failed");

    assert_eq!(block.tags, vec!["typography"]);
    assert_eq!(block.ai_tags, vec!["brutalism", "poster"]);
    assert_eq!(
        block.source_api_url.as_deref(),
        Some("https://savee.com/api/items/tGg45678/source/")
    );
}

#[sqlx::test(migrations = "../../migrations")]
async fn exists_checks_scope_by_run(pool: sqlx::PgPool) {
    let (source_id, run_id) = seed_source_and_run(&pool).await;
    let item = make_item("zQ81mNp4x");
    upsert_block(
        &pool,
        NewBlock {
            source_id,
            run_id,
            item: &item,
            storage_key: None,
            poster_key: None,
        },
    )
    .await
    .expect("upsert failed");

    assert!(block_exists(&pool, "zQ81mNp4x").await.unwrap());
    assert!(block_exists_in_run(&pool, run_id, "zQ81mNp4x").await.unwrap());
    assert!(!block_exists_in_run(&pool, run_id + 1000, "zQ81mNp4x")
        .await
        .unwrap());
    assert!(!block_exists(&pool, "missing99").await.unwrap());
}

#[sqlx::test(migrations = "../../migrations")]
async fn media_url_lookup_exact_and_fuzzy(pool: sqlx::PgPool) {
    let (source_id, run_id) = seed_source_and_run(&pool).await;

    let mut item = ScrapedItem::from_id("vT72kLm9q");
    item.image_url =
        Some("https://dr.savee-cdn.com/things/6/8/original_9f3b2c81aa04de175c2b.jpg".to_string());
    upsert_block(
        &pool,
        NewBlock {
            source_id,
            run_id,
            item: &item,
            storage_key: None,
            poster_key: None,
        },
    )
    .await
    .expect("upsert failed");

    let exact = find_block_by_media_url(
        &pool,
        "https://dr.savee-cdn.com/things/6/8/original_9f3b2c81aa04de175c2b.jpg",
    )
    .await
    .expect("exact lookup failed");
    assert_eq!(
        exact.map(|b| b.external_id).as_deref(),
        Some("vT72kLm9q")
    );

    // A different rendition of the same asset matches via its fingerprint.
    let fuzzy = find_block_by_fingerprint(&pool, "9f3b2c81aa04de175c2b")
        .await
        .expect("fuzzy lookup failed");
    assert_eq!(fuzzy.map(|b| b.external_id).as_deref(), Some("vT72kLm9q"));

    let miss = find_block_by_fingerprint(&pool, "deadbeef00deadbeef00")
        .await
        .expect("fuzzy lookup failed");
    assert!(miss.is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn known_id_windows_split_source_and_global(pool: sqlx::PgPool) {
    let (source_id, run_id) = seed_source_and_run(&pool).await;
    let other_source = create_or_get_source(&pool, "https://savee.com/", &SourceKind::Home)
        .await
        .expect("create source failed");
    let other_run = create_run(&pool, other_source.id, RunKind::Manual, None)
        .await
        .expect("create run failed");
    start_run(&pool, other_run.id).await.expect("start failed");

    for id in ["popAAA11", "popBBB22"] {
        let item = make_item(id);
        upsert_block(
            &pool,
            NewBlock {
                source_id,
                run_id,
                item: &item,
                storage_key: None,
                poster_key: None,
            },
        )
        .await
        .expect("upsert failed");
    }
    let item = make_item("homeCCC33");
    upsert_block(
        &pool,
        NewBlock {
            source_id: other_source.id,
            run_id: other_run.id,
            item: &item,
            storage_key: None,
            poster_key: None,
        },
    )
    .await
    .expect("upsert failed");

    let (per_source, global) = load_known_external_ids(&pool, source_id, 500, 2000)
        .await
        .expect("load failed");
    assert!(per_source.contains("popAAA11"));
    assert!(per_source.contains("popBBB22"));
    assert!(!per_source.contains("homeCCC33"));
    assert!(global.contains("homeCCC33"));
    assert_eq!(global.len(), 3);
}

// ---------------------------------------------------------------------------
// Section 3: Provenance and profiles
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn provenance_is_idempotent_per_source(pool: sqlx::PgPool) {
    let (source_id, run_id) = seed_source_and_run(&pool).await;
    let item = make_item("pRv12345");
    let (block, _) = upsert_block(
        &pool,
        NewBlock {
            source_id,
            run_id,
            item: &item,
            storage_key: None,
            poster_key: None,
        },
    )
    .await
    .expect("upsert failed");

    record_provenance(&pool, block.id, source_id, run_id)
        .await
        .expect("first provenance failed");
    record_provenance(&pool, block.id, source_id, run_id)
        .await
        .expect("second provenance failed");

    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM block_sources WHERE block_id = $1")
            .bind(block.id)
            .fetch_one(&pool)
            .await
            .expect("count failed");
    assert_eq!(count, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn profile_upsert_refreshes_without_duplicating(pool: sqlx::PgPool) {
    let first = upsert_profile(&pool, "gestalten", None, None)
        .await
        .expect("first upsert failed");
    let second = upsert_profile(
        &pool,
        "gestalten",
        Some("Gestalten"),
        Some("users/gestalten/avatar/original_ab12cd34ef56ab78.jpg"),
    )
    .await
    .expect("second upsert failed");

    assert_eq!(first.id, second.id);
    assert_eq!(second.display_name.as_deref(), Some("Gestalten"));

    // NULLs in later refreshes keep the stored values.
    let third = upsert_profile(&pool, "gestalten", None, None)
        .await
        .expect("third upsert failed");
    assert_eq!(third.display_name.as_deref(), Some("Gestalten"));

    let (source_id, run_id) = seed_source_and_run(&pool).await;
    let item = make_item("uBk98765");
    let (block, _) = upsert_block(
        &pool,
        NewBlock {
            source_id,
            run_id,
            item: &item,
            storage_key: None,
            poster_key: None,
        },
    )
    .await
    .expect("upsert failed");

    link_profile_block(&pool, first.id, block.id)
        .await
        .expect("first link failed");
    link_profile_block(&pool, first.id, block.id)
        .await
        .expect("second link failed");

    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM profile_blocks WHERE profile_id = $1")
            .bind(first.id)
            .fetch_one(&pool)
            .await
            .expect("count failed");
    assert_eq!(count, 1);
}
