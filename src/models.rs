//! Data models shared by the collect, export, load and reorder stages.
//!
//! - [`Category`]: the fixed set of feed categories and their channel ids
//! - [`ArticleRecord`]: one collected article, one spreadsheet row
//! - [`ExportedRow`]: a record shaped for the `news` table, one CSV row
//! - [`StoredNews`]: a persisted `news` row
//! - [`NewsPage`]: a page of stored news for the `list` command

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Spreadsheet header row, in column order: title, url, source name,
/// category, published time.
pub const SHEET_HEADERS: [&str; 5] = ["新闻标题", "新闻链接", "新闻媒体", "新闻分类", "发布时间"];

pub const COL_TITLE: &str = SHEET_HEADERS[0];
pub const COL_URL: &str = SHEET_HEADERS[1];
pub const COL_SOURCE: &str = SHEET_HEADERS[2];
pub const COL_CATEGORY: &str = SHEET_HEADERS[3];
pub const COL_PUBLISHED: &str = SHEET_HEADERS[4];

/// Timestamp format used in the CSV and in log output.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A news category and the feed channel that serves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Top,
    Finance,
    Tech,
    Entertainment,
    Sports,
    World,
    Military,
    Auto,
    Education,
    Health,
    Games,
    Science,
    History,
}

impl Category {
    /// Every category, in collection order.
    pub const ALL: [Category; 13] = [
        Category::Top,
        Category::Finance,
        Category::Tech,
        Category::Entertainment,
        Category::Sports,
        Category::World,
        Category::Military,
        Category::Auto,
        Category::Education,
        Category::Health,
        Category::Games,
        Category::Science,
        Category::History,
    ];

    /// Label written to the spreadsheet and stored as `news_type`.
    pub fn label(self) -> &'static str {
        match self {
            Category::Top => "要闻",
            Category::Finance => "财经",
            Category::Tech => "科技",
            Category::Entertainment => "娱乐",
            Category::Sports => "体育",
            Category::World => "国际",
            Category::Military => "军事",
            Category::Auto => "汽车",
            Category::Education => "教育",
            Category::Health => "健康",
            Category::Games => "游戏",
            Category::Science => "科学",
            Category::History => "历史",
        }
    }

    /// Feed channel identifier sent as `channel_id`.
    pub fn channel_id(self) -> &'static str {
        match self {
            Category::Top => "news_news_top",
            Category::Finance => "news_news_finance",
            Category::Tech => "news_news_tech",
            Category::Entertainment => "news_news_ent",
            Category::Sports => "news_news_sports",
            Category::World => "news_news_world",
            Category::Military => "news_news_mil",
            Category::Auto => "news_news_auto",
            Category::Education => "news_news_edu",
            Category::Health => "news_news_antip",
            Category::Games => "news_news_game",
            Category::Science => "news_news_kepu",
            Category::History => "news_news_history",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = String;

    /// Accepts either the label or the channel id.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Category::ALL
            .into_iter()
            .find(|c| c.label() == s || c.channel_id() == s)
            .ok_or_else(|| format!("unknown category: {s}"))
    }
}

/// One article collected from the feed.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleRecord {
    pub title: String,
    pub url: String,
    pub source_name: String,
    pub category: Category,
    /// Raw `article:published_time` meta content, if the page had one.
    pub published_at: Option<String>,
}

impl ArticleRecord {
    /// Cells in [`SHEET_HEADERS`] order. `None` is written as an empty cell.
    pub fn sheet_cells(&self) -> [Option<String>; 5] {
        [
            Some(self.title.clone()),
            Some(self.url.clone()),
            Some(self.source_name.clone()),
            Some(self.category.label().to_string()),
            self.published_at.clone(),
        ]
    }
}

/// A record shaped like the `news` table, in its column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportedRow {
    pub id: i32,
    pub news_type: String,
    pub href: String,
    pub title: String,
    #[serde(serialize_with = "serialize_timestamp")]
    pub datetime: NaiveDateTime,
    pub content: String,
}

fn serialize_timestamp<S>(ts: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(&ts.format(TIMESTAMP_FORMAT))
}

/// A row of the `news` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct StoredNews {
    pub id: i32,
    pub news_type: Option<String>,
    pub href: Option<String>,
    pub title: Option<String>,
    pub datetime: Option<NaiveDateTime>,
    pub content: String,
}

/// One page of stored news, newest first.
#[derive(Debug, Serialize)]
pub struct NewsPage {
    pub news: Vec<StoredNews>,
    pub total_pages: i64,
    pub current_page: u32,
}
