//! Command-line interface definitions.
//!
//! Each stage is its own subcommand and runs top to bottom on its own; the
//! operator chains them by hand:
//!
//! ```sh
//! news_etl collect                 # feed → 腾讯新闻_全分类.xlsx
//! news_etl export                  # xlsx → news_data.csv
//! news_etl load                    # csv  → news table
//! news_etl reorder                 # renumber ids newest-first
//! ```
//!
//! Every option has a default matching the usual setup and can also be set
//! through the environment. `DATABASE_URL` may come from a `.env` file.

use crate::db::reorder::DEFAULT_SHIFT_OFFSET;
use crate::exporter::DEFAULT_ID_OFFSET;
use crate::models::Category;
use crate::scrapers::tencent::{DEFAULT_DEVICE_ID, DEFAULT_FEED_URL, DEFAULT_USER_AGENT};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub const DEFAULT_SHEET: &str = "腾讯新闻_全分类.xlsx";
pub const DEFAULT_CSV: &str = "news_data.csv";

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scrape every feed category into the spreadsheet
    Collect(CollectArgs),
    /// Convert the spreadsheet into a CSV shaped for the news table
    Export(ExportArgs),
    /// Bulk-copy the CSV into the news table
    Load(LoadArgs),
    /// Renumber news ids from 0, newest first
    Reorder(ReorderArgs),
    /// Create the news table if it does not exist
    InitDb(DbArgs),
    /// Print a page of stored news as JSON
    List(ListArgs),
}

#[derive(Args, Debug)]
pub struct CollectArgs {
    /// Feed endpoint
    #[arg(long, env = "NEWS_FEED_URL", default_value = DEFAULT_FEED_URL)]
    pub feed_url: String,

    /// Cookie header sent with every request
    #[arg(long, env = "NEWS_FEED_COOKIE")]
    pub cookie: Option<String>,

    /// User-Agent header sent with every request
    #[arg(long, env = "NEWS_FEED_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Device id sent in the feed payload
    #[arg(long, env = "NEWS_FEED_DEVICE_ID", default_value = DEFAULT_DEVICE_ID)]
    pub device_id: String,

    /// Articles to collect per category
    #[arg(long, default_value_t = 5)]
    pub per_category: usize,

    /// Items requested per feed page
    #[arg(long, default_value_t = 20)]
    pub page_size: u32,

    /// Shortest pause after a feed request, in seconds
    #[arg(long, default_value_t = 2)]
    pub min_delay: u64,

    /// Longest pause after a feed request, in seconds
    #[arg(long, default_value_t = 6)]
    pub max_delay: u64,

    /// Only collect these categories (label or channel id); repeatable
    #[arg(long = "category", value_parser = clap::value_parser!(Category))]
    pub categories: Vec<Category>,

    /// Spreadsheet to append to
    #[arg(short, long, env = "NEWS_SHEET", default_value = DEFAULT_SHEET)]
    pub sheet: PathBuf,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Spreadsheet to read
    #[arg(short, long, env = "NEWS_SHEET", default_value = DEFAULT_SHEET)]
    pub sheet: PathBuf,

    /// CSV to write
    #[arg(short, long, env = "NEWS_CSV", default_value = DEFAULT_CSV)]
    pub output: PathBuf,

    /// First id assigned to exported rows
    #[arg(long, default_value_t = DEFAULT_ID_OFFSET)]
    pub id_offset: i32,
}

#[derive(Args, Debug)]
pub struct DbArgs {
    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,
}

#[derive(Args, Debug)]
pub struct LoadArgs {
    #[command(flatten)]
    pub db: DbArgs,

    /// CSV to import
    #[arg(short, long, env = "NEWS_CSV", default_value = DEFAULT_CSV)]
    pub input: PathBuf,
}

#[derive(Args, Debug)]
pub struct ReorderArgs {
    #[command(flatten)]
    pub db: DbArgs,

    /// Minimum amount ids are shifted by before renumbering
    #[arg(long, default_value_t = DEFAULT_SHIFT_OFFSET)]
    pub shift_offset: i32,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub db: DbArgs,

    /// Page number, starting at 1
    #[arg(long, default_value_t = 1)]
    pub page: u32,

    /// Rows per page
    #[arg(long, default_value_t = 10)]
    pub page_size: u32,

    /// Only list this news_type
    #[arg(long)]
    pub category: Option<String>,
}
