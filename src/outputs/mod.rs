//! File outputs of the collect and export stages.
//!
//! - [`spreadsheet`]: the append-only xlsx workbook the collector fills
//! - [`csv_export`]: the BOM-prefixed CSV the loader copies into Postgres
//!
//! ```text
//! collect ──► 腾讯新闻_全分类.xlsx ──► export ──► news_data.csv ──► load
//! ```

pub mod csv_export;
pub mod spreadsheet;
