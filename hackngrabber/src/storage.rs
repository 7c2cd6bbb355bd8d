use chrono::DateTime;
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use tracing::{error, info, warn};

use crate::error::GrabError;
use crate::query::PageRequest;

/// A scraped story as persisted in the `news` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Story {
    /// Title fingerprint, see `fingerprint::derive_id`
    pub id: i64,
    pub title: String,
    pub url: String,
    /// Unix seconds at first scrape
    pub created: i64,
}

/// A story as returned by the read API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoryView {
    pub id: i64,
    pub title: String,
    pub url: String,
    /// UTC, `YYYY-MM-DDTHH:MM:SS`
    pub created: String,
}

/// Per-row outcome of `insert_many`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InsertReport {
    pub inserted: usize,
    /// Rows whose id already existed
    pub ignored: usize,
    pub failed: usize,
}

// `hash int` (not INTEGER) keeps the fingerprint out of the rowid, so rowid
// order stays insertion order.
const CREATE_NEWS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS news (
        hash int PRIMARY KEY,
        title text,
        url text,
        created int
    )
"#;

/// Create the `news` table if it is absent.
///
/// Best effort: a failure is logged and otherwise ignored, the poller and
/// the read path will report their own errors if the table is really missing.
pub async fn ensure_schema(pool: &SqlitePool) {
    match sqlx::query(CREATE_NEWS_TABLE).execute(pool).await {
        Ok(_) => info!("storage: news table ensured"),
        Err(e) => error!("storage: failed to check or create news table: {}", e),
    }
}

/// Insert-or-ignore every story, in one transaction committed at the end.
///
/// A failing row is logged and counted; it never prevents the rows after it
/// from being attempted. An existing id keeps its original `created`.
pub async fn insert_many(pool: &SqlitePool, stories: &[Story]) -> InsertReport {
    let mut report = InsertReport::default();
    if stories.is_empty() {
        return report;
    }

    let mut tx = match pool.begin().await {
        Ok(tx) => tx,
        Err(e) => {
            error!("storage: failed to open transaction for {} stories: {}", stories.len(), e);
            report.failed = stories.len();
            return report;
        }
    };

    for story in stories {
        let res = sqlx::query("INSERT OR IGNORE INTO news (hash, title, url, created) VALUES (?, ?, ?, ?)")
            .bind(story.id)
            .bind(&story.title)
            .bind(&story.url)
            .bind(story.created)
            .execute(&mut tx)
            .await;

        match res {
            Ok(done) if done.rows_affected() > 0 => report.inserted += 1,
            Ok(_) => report.ignored += 1,
            Err(e) => {
                warn!(id = story.id, title = %story.title, "storage: failed to insert story: {}", e);
                report.failed += 1;
            }
        }
    }

    if let Err(e) = tx.commit().await {
        error!("storage: failed to commit {} inserted stories: {}", report.inserted, e);
        report.failed += report.inserted;
        report.inserted = 0;
    }

    report
}

/// One page of stories in the requested order.
///
/// `request` is trusted: its order column and direction are closed enums whose
/// SQL text is fixed, and limit/offset are bound parameters. Only a
/// `PageRequest` produced by `query::validate` should reach this function.
pub async fn select_page(pool: &SqlitePool, request: &PageRequest) -> Result<Vec<StoryView>, GrabError> {
    let sql = format!(
        "SELECT hash, title, url, created FROM news ORDER BY {} {} LIMIT ? OFFSET ?",
        request.order.as_sql(),
        request.direction.as_sql()
    );

    let rows = sqlx::query(&sql)
        .bind(request.limit)
        .bind(request.offset)
        .fetch_all(pool)
        .await?;

    let stories = rows
        .into_iter()
        .map(|r| StoryView {
            id: r.get::<i64, _>("hash"),
            title: r.get::<Option<String>, _>("title").unwrap_or_default(),
            url: r.get::<Option<String>, _>("url").unwrap_or_default(),
            created: format_created(r.get::<Option<i64>, _>("created").unwrap_or(0)),
        })
        .collect();

    Ok(stories)
}

/// Number of stored stories.
pub async fn count_stories(pool: &SqlitePool) -> Result<i64, GrabError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM news")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

fn format_created(ts: i64) -> String {
    DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S").to_string())
        .unwrap_or_default()
}
