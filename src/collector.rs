//! Category-by-category feed collection.
//!
//! For every [`Category`] the collector walks feed pages until it has
//! `per_category_limit` records or a page comes back without articles. Each
//! accepted article gets its published time scraped and is appended to the
//! sink straight away.
//!
//! Failed requests are never retried: a failed feed page counts as an empty
//! page, and a failed article page yields a record without a published time.

use crate::error::Result;
use crate::models::{ArticleRecord, Category};
use crate::outputs::spreadsheet::RecordSink;
use crate::scrapers::{FeedSource, extract_feed_items};
use crate::utils::truncate_for_log;
use rand::{Rng, rng};
use std::ops::RangeInclusive;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

/// Tunables for one collection run.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Records to collect per category before moving on.
    pub per_category_limit: usize,
    /// Pause after each feed request, in whole seconds, picked uniformly.
    pub delay_secs: RangeInclusive<u64>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            per_category_limit: 5,
            delay_secs: 2..=6,
        }
    }
}

/// Records collected per category, in collection order.
#[derive(Debug, Default)]
pub struct CollectionSummary {
    pub per_category: Vec<(Category, usize)>,
}

impl CollectionSummary {
    pub fn total(&self) -> usize {
        self.per_category.iter().map(|(_, n)| n).sum()
    }
}

/// Collect every category in `categories` order.
#[instrument(level = "info", skip_all, fields(categories = categories.len()))]
pub async fn collect_all<F, S>(
    feed: &F,
    sink: &mut S,
    categories: &[Category],
    config: &CollectorConfig,
) -> Result<CollectionSummary>
where
    F: FeedSource,
    S: RecordSink,
{
    let mut summary = CollectionSummary::default();
    for &category in categories {
        let count = collect_category(feed, sink, category, config).await?;
        summary.per_category.push((category, count));
    }
    info!(total = summary.total(), "Collection finished");
    Ok(summary)
}

/// Collect one category. Returns how many records were appended.
///
/// Only sink failures are returned as errors.
#[instrument(level = "info", skip(feed, sink, config), fields(channel = category.channel_id()))]
pub async fn collect_category<F, S>(
    feed: &F,
    sink: &mut S,
    category: Category,
    config: &CollectorConfig,
) -> Result<usize>
where
    F: FeedSource,
    S: RecordSink,
{
    info!(%category, "Collecting category");
    let mut counter = 0usize;
    let mut page = 1u32;

    while counter < config.per_category_limit {
        let data = match feed.fetch_page(category.channel_id(), page).await {
            Ok(data) => Some(data),
            Err(e) => {
                error!(page, error = %e, "Feed request failed");
                None
            }
        };
        polite_pause(&config.delay_secs).await;

        let items = match data.as_ref().map(extract_feed_items).transpose() {
            Ok(items) => items.unwrap_or_default(),
            Err(e) => {
                warn!(page, error = %e, "Could not query feed page");
                Vec::new()
            }
        };

        if items.is_empty() {
            info!(page, counter, "Feed exhausted");
            break;
        }
        debug!(page, items = items.len(), "Feed page parsed");

        for item in items {
            if counter >= config.per_category_limit {
                break;
            }

            let published_at = match feed.fetch_published_time(&item.url).await {
                Ok(found) => found,
                Err(e) => {
                    warn!(url = %item.url, error = %e, "Could not fetch published time");
                    None
                }
            };

            let record = ArticleRecord {
                title: item.title,
                url: item.url,
                source_name: item.source_name,
                category,
                published_at,
            };
            info!(
                title = %truncate_for_log(&record.title, 60),
                url = %record.url,
                source = %record.source_name,
                published_at = record.published_at.as_deref().unwrap_or("-"),
                "Collected article"
            );
            sink.append(&record)?;
            counter += 1;
        }

        page += 1;
    }

    info!(%category, collected = counter, "Category done");
    Ok(counter)
}

async fn polite_pause(range: &RangeInclusive<u64>) {
    if range.is_empty() {
        return;
    }
    let secs = rng().random_range(range.clone());
    if secs > 0 {
        debug!(secs, "Pausing between feed requests");
        sleep(Duration::from_secs(secs)).await;
    }
}
