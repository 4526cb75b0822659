//! Paginated reads of stored news, newest first.

use super::NEWS_TABLE;
use crate::error::Result;
use crate::models::{NewsPage, StoredNews};
use sqlx::postgres::PgPool;
use tracing::{debug, instrument};

/// Number of pages needed for `total` rows at `page_size` per page.
pub fn total_pages(total: i64, page_size: u32) -> i64 {
    let size = i64::from(page_size.max(1));
    (total.max(0) + size - 1) / size
}

/// Fetch one page (1-based) of news, optionally restricted to one `news_type`.
#[instrument(level = "info", skip(pool))]
pub async fn list_news(
    pool: &PgPool,
    page: u32,
    page_size: u32,
    category: Option<&str>,
) -> Result<NewsPage> {
    let page = page.max(1);
    let page_size = page_size.max(1);
    let offset = i64::from(page - 1) * i64::from(page_size);

    let news: Vec<StoredNews> = sqlx::query_as(&format!(
        r#"
        SELECT id, news_type, href, title, datetime, content
        FROM {NEWS_TABLE}
        WHERE ($1::text IS NULL OR news_type = $1)
        ORDER BY datetime DESC NULLS LAST, id
        LIMIT $2 OFFSET $3
        "#
    ))
    .bind(category)
    .bind(i64::from(page_size))
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM {NEWS_TABLE} WHERE ($1::text IS NULL OR news_type = $1)"
    ))
    .bind(category)
    .fetch_one(pool)
    .await?;
    debug!(returned = news.len(), total, "Listed news");

    Ok(NewsPage {
        news,
        total_pages: total_pages(total, page_size),
        current_page: page,
    })
}
