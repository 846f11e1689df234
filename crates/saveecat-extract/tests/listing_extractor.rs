//! Integration tests for `ListingExtractor` against a wiremock server.

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use saveecat_extract::{ContentExtractor, ExtractError, ListingExtractor};

fn listing_html() -> &'static str {
    r#"
    <div id="grid-item-kB3xW9abc"><a href="/i/kB3xW9abc"></a></div>
    <div id="grid-item-zQ81mNp4x"><a href="/i/zQ81mNp4x"></a></div>
    <div id="grid-item-vT72kLm9q"><a href="/i/vT72kLm9q"></a></div>
    "#
}

fn image_item_html(title: &str) -> String {
    format!(
        r#"
        <meta property="og:title" content="{title}" />
        <meta property="og:image" content="https://dr.savee-cdn.com/things/original_9f3b2c81aa04de17.jpg" />
        <meta property="og:url" content="https://savee.com/i/kB3xW9abc" />
        <a href="/search/?q=typography">#typography</a>
        <a href="/search/?q=brutalism">brutalism</a>
        <a href="/api/items/kB3xW9abc/source/">Visit</a>
        <a title="Search by #1a2b3c" href="/search/?q=%231a2b3c"></a>
        "#
    )
}

fn video_item_html() -> &'static str {
    r#"
    <meta property="og:image" content="https://dr.savee-cdn.com/things/poster_abc123def456789012.jpg" />
    <meta property="og:video" content="https://dr.savee-cdn.com/videos/video_abc123def456789012.mp4" />
    "#
}

async fn extractor_for(server: &MockServer, listing_path: &str) -> ListingExtractor {
    ListingExtractor::new(
        &format!("{}{listing_path}", server.uri()),
        "test-agent/0.1",
        5,
    )
    .expect("failed to build ListingExtractor")
}

#[tokio::test]
async fn pulls_items_in_listing_order_until_exhausted() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/pop/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_html()))
        .expect(1)
        .mount(&server)
        .await;
    for id in ["kB3xW9abc", "zQ81mNp4x", "vT72kLm9q"] {
        Mock::given(method("GET"))
            .and(path(format!("/i/{id}")))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(image_item_html(&format!("Item {id}"))),
            )
            .mount(&server)
            .await;
    }

    let mut extractor = extractor_for(&server, "/pop/").await;

    let first = extractor.next_item().await.expect("pull failed").expect("stream empty");
    assert_eq!(first.external_id, "kB3xW9abc");
    assert_eq!(first.title.as_deref(), Some("Item kB3xW9abc"));
    assert_eq!(
        first.image_url.as_deref(),
        Some("https://dr.savee-cdn.com/things/original_9f3b2c81aa04de17.jpg")
    );
    assert_eq!(first.tags, vec!["typography"]);
    assert_eq!(first.ai_tags, vec!["brutalism"]);
    assert_eq!(first.color_hexes, vec!["1a2b3c"]);
    assert_eq!(
        first.source_api_url.as_deref(),
        Some(format!("{}/api/items/kB3xW9abc/source/", server.uri()).as_str())
    );

    let second = extractor.next_item().await.expect("pull failed").expect("stream empty");
    assert_eq!(second.external_id, "zQ81mNp4x");
    let third = extractor.next_item().await.expect("pull failed").expect("stream empty");
    assert_eq!(third.external_id, "vT72kLm9q");

    assert!(extractor.next_item().await.expect("pull failed").is_none());
    // Exhausted streams stay exhausted.
    assert!(extractor.next_item().await.expect("pull failed").is_none());
}

#[tokio::test]
async fn item_failure_is_scoped_and_stream_continues() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/pop/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_html()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/i/kB3xW9abc"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    for id in ["zQ81mNp4x", "vT72kLm9q"] {
        Mock::given(method("GET"))
            .and(path(format!("/i/{id}")))
            .respond_with(ResponseTemplate::new(200).set_body_string(image_item_html("ok")))
            .mount(&server)
            .await;
    }

    let mut extractor = extractor_for(&server, "/pop/").await;

    let err = extractor.next_item().await.expect_err("expected item failure");
    assert!(matches!(err, ExtractError::Item { .. }), "got: {err:?}");

    // The failed item is consumed; the stream moves on.
    let next = extractor.next_item().await.expect("pull failed").expect("stream empty");
    assert_eq!(next.external_id, "zQ81mNp4x");
}

#[tokio::test]
async fn video_items_carry_video_url_and_poster_thumbnail() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<div id="grid-item-vid789xyz"><a href="/i/vid789xyz"></a></div>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/i/vid789xyz"))
        .respond_with(ResponseTemplate::new(200).set_body_string(video_item_html()))
        .mount(&server)
        .await;

    let mut extractor = extractor_for(&server, "/").await;
    let item = extractor.next_item().await.expect("pull failed").expect("stream empty");

    assert_eq!(item.media_kind, Some(saveecat_core::MediaKind::Video));
    assert_eq!(
        item.video_url.as_deref(),
        Some("https://dr.savee-cdn.com/videos/video_abc123def456789012.mp4")
    );
    assert_eq!(
        item.thumbnail_url.as_deref(),
        Some("https://dr.savee-cdn.com/things/poster_abc123def456789012.jpg")
    );
}

#[tokio::test]
async fn user_listing_exposes_profile_meta_without_refetching() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/gestalten/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"
            <meta property="og:title" content="Gestalten" />
            <meta property="og:image" content="https://dr.savee-cdn.com/avatars/gestalten_9f3b2c81aa04de17.jpg" />
            <div id="grid-item-kB3xW9abc"><a href="/i/kB3xW9abc"></a></div>
            "#,
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/i/kB3xW9abc"))
        .respond_with(ResponseTemplate::new(200).set_body_string(image_item_html("ok")))
        .mount(&server)
        .await;

    let mut extractor = extractor_for(&server, "/gestalten/").await;
    let meta = extractor
        .profile()
        .await
        .expect("profile failed")
        .expect("no profile meta");
    assert_eq!(meta.display_name.as_deref(), Some("Gestalten"));
    assert_eq!(
        meta.avatar_url.as_deref(),
        Some("https://dr.savee-cdn.com/avatars/gestalten_9f3b2c81aa04de17.jpg")
    );

    // The listing fetched for the profile is reused for the item queue.
    let item = extractor.next_item().await.expect("pull failed").expect("stream empty");
    assert_eq!(item.external_id, "kB3xW9abc");
}

#[tokio::test]
async fn listing_fetch_failure_is_fatal_for_the_stream() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/pop/"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut extractor = extractor_for(&server, "/pop/").await;
    let err = extractor.next_item().await.expect_err("expected listing failure");
    assert!(matches!(err, ExtractError::Listing { .. }), "got: {err:?}");
}
