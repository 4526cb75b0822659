//! Feed scraping: the [`FeedSource`] seam and the parsing it relies on.
//!
//! Collection is a two-step pattern per article:
//!
//! 1. **Feed page**: POST a channel/page request and pull `title`, `url` and
//!    source-tag values out of the JSON with recursive path queries
//! 2. **Article page**: GET the article and read its
//!    `<meta property="article:published_time">` tag
//!
//! | Source | Module | Method |
//! |--------|--------|--------|
//! | Tencent News web feed | [`tencent`] | JSON feed + HTML meta scraping |

pub mod tencent;

use crate::error::{EtlError, Result};
use itertools::izip;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde_json::Value;
use serde_json_path::JsonPath;
use tracing::debug;

/// A paged article feed plus the article pages it links to.
///
/// Implementations report failures as errors; the collector decides that a
/// failed request means "no data".
pub trait FeedSource {
    /// Fetch one page of a channel's feed as raw JSON.
    async fn fetch_page(&self, channel_id: &str, page: u32) -> Result<Value>;

    /// Fetch an article page and return its published-time meta content.
    async fn fetch_published_time(&self, url: &str) -> Result<Option<String>>;
}

/// An article entry pulled out of a feed page, before its page is fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    pub url: String,
    pub source_name: String,
}

const TITLE_QUERY: &str = "$..title";
const URL_QUERY: &str = "$..url";
const SOURCE_QUERY: &str = "$..chl_name";

static PUBLISHED_TIME_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"meta[property="article:published_time"]"#)
        .expect("published_time selector is valid")
});

/// Run a recursive path query and return every match as text.
///
/// Strings are returned as-is; other scalars use their JSON rendering.
pub fn query_strings(data: &Value, query: &str) -> Result<Vec<String>> {
    let path = JsonPath::parse(query).map_err(|e| EtlError::JsonPath {
        query: query.to_string(),
        message: e.to_string(),
    })?;

    Ok(path
        .query(data)
        .all()
        .into_iter()
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect())
}

/// Extract feed items from a feed page.
///
/// Titles, urls and source tags are matched anywhere in the document and
/// zipped by position; the shortest list bounds the result.
pub fn extract_feed_items(data: &Value) -> Result<Vec<FeedItem>> {
    let titles = query_strings(data, TITLE_QUERY)?;
    let urls = query_strings(data, URL_QUERY)?;
    let sources = query_strings(data, SOURCE_QUERY)?;
    debug!(
        titles = titles.len(),
        urls = urls.len(),
        sources = sources.len(),
        "Feed page query matches"
    );

    Ok(izip!(titles, urls, sources)
        .map(|(title, url, source_name)| FeedItem {
            title,
            url,
            source_name,
        })
        .collect())
}

/// Read the `article:published_time` meta tag from an article page.
pub fn extract_published_time(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    document
        .select(&PUBLISHED_TIME_SELECTOR)
        .find_map(|el| el.value().attr("content"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
