//! CSV output shaped for the `news` table.
//!
//! The file is UTF-8 with a byte-order mark and always carries the header
//! row, even when there are no data rows.

use crate::error::Result;
use crate::models::ExportedRow;
use csv::WriterBuilder;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{info, instrument};

pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Column order of the CSV and of the `COPY` target list.
pub const CSV_HEADERS: [&str; 6] = ["id", "news_type", "href", "title", "datetime", "content"];

/// Serialize rows as CSV into any writer, BOM and header first.
pub fn write_rows<W: Write>(out: W, rows: &[ExportedRow]) -> Result<()> {
    let mut out = out;
    out.write_all(UTF8_BOM)?;

    let mut writer = WriterBuilder::new().has_headers(false).from_writer(out);
    writer.write_record(CSV_HEADERS)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write rows to `path`, replacing any existing file.
#[instrument(level = "info", skip_all, fields(path = %path.display(), rows = rows.len()))]
pub fn write_csv(path: &Path, rows: &[ExportedRow]) -> Result<()> {
    let file = BufWriter::new(File::create(path)?);
    write_rows(file, rows)?;
    info!("Wrote CSV");
    Ok(())
}
