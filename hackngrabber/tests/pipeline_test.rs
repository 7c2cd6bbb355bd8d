use common::{init_db_pool, FailurePolicy, ScraperConfig};
use hackngrabber::fingerprint::derive_id;
use hackngrabber::poller::Poller;
use hackngrabber::query::PageRequest;
use hackngrabber::storage;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Notify;

const FRONT_PAGE: &str = r#"
<html>
  <body>
    <table class="itemlist">
      <tr class="athing"><td class="title"><a href="/a" class="storylink">A</a></td></tr>
      <tr class="athing"><td class="title"><a href="/b" class="storylink">B</a></td></tr>
      <tr class="athing"><td class="title"><a href="/c" class="storylink">C</a></td></tr>
    </table>
  </body>
</html>
"#;

async fn setup_test_db() -> (TempDir, SqlitePool) {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("news.db");
    let pool = init_db_pool(&db_path.to_string_lossy()).await.expect("init pool");
    storage::ensure_schema(&pool).await;
    (dir, pool)
}

fn scraper_config(url: String, on_failure: FailurePolicy) -> ScraperConfig {
    ScraperConfig {
        source_url: url,
        interval_seconds: 1,
        fetch_timeout_seconds: 5,
        on_failure,
        ..ScraperConfig::default()
    }
}

#[tokio::test]
async fn second_identical_cycle_adds_nothing() {
    let (_dir, pool) = setup_test_db().await;
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(FRONT_PAGE)
        .expect(2)
        .create_async()
        .await;

    let poller = Poller::new(
        pool.clone(),
        &scraper_config(format!("{}/", server.url()), FailurePolicy::Continue),
    )
    .expect("poller");

    let first = poller.poll_once().await.expect("first cycle");
    assert_eq!(first.extracted, 3);
    assert_eq!(first.stored.inserted, 3);

    let second = poller.poll_once().await.expect("second cycle");
    assert_eq!(second.extracted, 3);
    assert_eq!(second.stored.inserted, 0);
    assert_eq!(second.stored.ignored, 3);

    assert_eq!(storage::count_stories(&pool).await.expect("count"), 3);

    let rows = storage::select_page(&pool, &PageRequest::default()).await.expect("select");
    let stored: Vec<_> = rows.iter().map(|r| (r.id, r.title.as_str(), r.url.as_str())).collect();
    assert_eq!(
        stored,
        vec![
            (derive_id("A"), "A", "/a"),
            (derive_id("B"), "B", "/b"),
            (derive_id("C"), "C", "/c"),
        ]
    );

    mock.assert_async().await;
}

#[tokio::test]
async fn page_without_container_is_a_parse_error() {
    let (_dir, pool) = setup_test_db().await;
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/")
        .with_status(200)
        .with_body("<html><body><p>maintenance</p></body></html>")
        .create_async()
        .await;

    let poller = Poller::new(
        pool.clone(),
        &scraper_config(format!("{}/", server.url()), FailurePolicy::Continue),
    )
    .expect("poller");

    let err = poller.poll_once().await.expect_err("no container");
    assert!(err.is_parse());
    assert_eq!(storage::count_stories(&pool).await.expect("count"), 0);
}

#[tokio::test]
async fn stop_policy_ends_the_loop_on_failure() {
    let (_dir, pool) = setup_test_db().await;
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/")
        .with_status(500)
        .create_async()
        .await;

    let poller = Poller::new(
        pool.clone(),
        &scraper_config(format!("{}/", server.url()), FailurePolicy::Stop),
    )
    .expect("poller");

    let result = tokio::time::timeout(Duration::from_secs(10), poller.run(Arc::new(Notify::new())))
        .await
        .expect("poller must stop by itself");

    let err = result.expect_err("stop policy returns the error");
    assert!(err.is_network());
}

#[tokio::test]
async fn continue_policy_keeps_polling_until_shutdown() {
    let (_dir, pool) = setup_test_db().await;
    let mut server = mockito::Server::new_async().await;
    let failing = server
        .mock("GET", "/")
        .with_status(502)
        .expect_at_least(2)
        .create_async()
        .await;

    let poller = Poller::new(
        pool.clone(),
        &scraper_config(format!("{}/", server.url()), FailurePolicy::Continue),
    )
    .expect("poller");

    let shutdown = Arc::new(Notify::new());
    let handle = tokio::spawn(poller.run(shutdown.clone()));

    // interval is 1s: the first cycle runs at once, the second after a second
    tokio::time::sleep(Duration::from_millis(1800)).await;
    assert!(!handle.is_finished(), "failures must not end the loop");

    shutdown.notify_one();
    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("poller stops after shutdown")
        .expect("poller task did not panic");
    assert!(result.is_ok());

    failing.assert_async().await;
}

#[tokio::test]
async fn app_context_runs_poller_and_shuts_down() {
    use common::{Config, DatabaseConfig};
    use hackngrabber::app::AppContext;

    let dir = tempfile::tempdir().expect("tempdir");
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/")
        .with_status(200)
        .with_body(FRONT_PAGE)
        .create_async()
        .await;

    let config = Config {
        database: DatabaseConfig {
            path: dir.path().join("app.db").to_string_lossy().to_string(),
        },
        scraper: scraper_config(format!("{}/", server.url()), FailurePolicy::Continue),
        server: None,
    };

    let ctx = AppContext::start(&config, true).await.expect("start");

    let mut stored = 0;
    for _ in 0..50 {
        stored = storage::count_stories(&ctx.db).await.expect("count");
        if stored == 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(stored, 3);

    tokio::time::timeout(Duration::from_secs(10), ctx.shutdown(Duration::from_secs(5)))
        .await
        .expect("shutdown completes");
}
