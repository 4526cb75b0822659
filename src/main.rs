//! # news_etl
//!
//! Collects categorized articles from the Tencent News web feed into a
//! spreadsheet, exports them to a CSV shaped for a Postgres `news` table,
//! bulk-loads the CSV, and renumbers the table's ids by publication time.
//!
//! ## Usage
//!
//! ```sh
//! news_etl collect
//! news_etl export
//! DATABASE_URL=postgres://postgres@localhost/news news_etl load
//! DATABASE_URL=postgres://postgres@localhost/news news_etl reorder
//! ```
//!
//! ## Stages
//!
//! 1. **Collect**: page through each category's feed, scrape published times,
//!    append rows to the spreadsheet (saved after every row)
//! 2. **Export**: rename columns, default bad timestamps to now, assign ids
//! 3. **Load**: `COPY` the CSV in and resync `news_id_seq`
//! 4. **Reorder**: renumber ids `0..n` newest-first in a single transaction
//!
//! Stages never call each other; each runs once and exits.

use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod collector;
mod db;
mod error;
mod exporter;
mod models;
mod outputs;
mod scrapers;
mod utils;

use cli::{Cli, CollectArgs, Command, ExportArgs, ListArgs, LoadArgs, ReorderArgs};
use collector::CollectorConfig;
use models::Category;
use outputs::spreadsheet::XlsxSheet;
use scrapers::tencent::TencentFeed;
use utils::ensure_parent_dir;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    if let Err(e) = dotenvy::dotenv() {
        debug!(error = %e, "No .env file loaded");
    }

    let start_time = std::time::Instant::now();
    let args = Cli::parse();
    debug!(?args.command, "Parsed CLI arguments");

    let outcome = match args.command {
        Command::Collect(args) => run_collect(args).await,
        Command::Export(args) => run_export(args).await,
        Command::Load(args) => run_load(args).await,
        Command::Reorder(args) => run_reorder(args).await,
        Command::InitDb(args) => run_init_db(&args.database_url).await,
        Command::List(args) => run_list(args).await,
    };

    let elapsed = start_time.elapsed();
    match outcome {
        Ok(()) => {
            info!(?elapsed, secs = elapsed.as_secs(), "Execution complete");
            Ok(())
        }
        Err(e) => {
            error!(?elapsed, error = %e, "Execution failed");
            Err(e.into())
        }
    }
}

async fn run_collect(args: CollectArgs) -> error::Result<()> {
    ensure_parent_dir(&args.sheet).await?;
    let mut sheet = XlsxSheet::open_or_create(&args.sheet)?;
    let feed = TencentFeed::new(
        &args.feed_url,
        args.cookie.as_deref(),
        &args.user_agent,
        &args.device_id,
        args.page_size,
    )?;

    let categories: Vec<Category> = if args.categories.is_empty() {
        Category::ALL.to_vec()
    } else {
        args.categories
    };
    let config = CollectorConfig {
        per_category_limit: args.per_category,
        delay_secs: args.min_delay..=args.max_delay.max(args.min_delay),
    };

    let summary = collector::collect_all(&feed, &mut sheet, &categories, &config).await?;
    for (category, count) in &summary.per_category {
        debug!(%category, count, "Category total");
    }
    info!(
        path = %sheet.path().display(),
        total = summary.total(),
        sheet_rows = sheet.row_count(),
        "Collected articles saved"
    );
    Ok(())
}

async fn run_export(args: ExportArgs) -> error::Result<()> {
    ensure_parent_dir(&args.output).await?;
    let written = exporter::export_file(&args.sheet, &args.output, args.id_offset)?;
    info!(path = %args.output.display(), rows = written, "Export complete");
    Ok(())
}

async fn run_load(args: LoadArgs) -> error::Result<()> {
    let pool = db::connect(&args.db.database_url).await?;
    let summary = db::loader::load_csv(&pool, &args.input).await?;
    info!(rows = summary.rows, next_id = summary.next_id, "Import succeeded");
    pool.close().await;
    Ok(())
}

async fn run_reorder(args: ReorderArgs) -> error::Result<()> {
    let pool = db::connect(&args.db.database_url).await?;
    let summary = db::reorder::reorder_ids(&pool, args.shift_offset).await?;
    info!(
        rows = summary.rows,
        next_id = summary.next_id,
        "Ids renumbered newest-first from 0"
    );
    pool.close().await;
    Ok(())
}

async fn run_init_db(database_url: &str) -> error::Result<()> {
    let pool = db::connect(database_url).await?;
    db::init_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

async fn run_list(args: ListArgs) -> error::Result<()> {
    let pool = db::connect(&args.db.database_url).await?;
    let page = db::query::list_news(
        &pool,
        args.page,
        args.page_size,
        args.category.as_deref(),
    )
    .await?;
    println!("{}", serde_json::to_string_pretty(&page)?);
    pool.close().await;
    Ok(())
}
