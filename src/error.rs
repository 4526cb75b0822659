//! Error type shared by every stage.
//!
//! Collector HTTP failures are logged and downgraded to "no data" by the
//! caller; everything else propagates to `main` and aborts the run.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EtlError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("invalid URL {url}: {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid JSON path query {query}: {message}")]
    JsonPath { query: String, message: String },

    #[error("failed to read spreadsheet: {0}")]
    SheetRead(#[from] calamine::XlsxError),

    #[error("failed to write spreadsheet: {0}")]
    SheetWrite(#[from] rust_xlsxwriter::XlsxError),

    #[error("spreadsheet {path} has no worksheet")]
    EmptyWorkbook { path: String },

    #[error("spreadsheet header is missing column {0:?}")]
    MissingColumn(String),

    #[error("id {0} cannot be shifted by {1} without overflowing")]
    IdOverflow(i32, i32),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = EtlError> = std::result::Result<T, E>;
