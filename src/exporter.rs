//! Spreadsheet → `news`-shaped rows.
//!
//! Columns are located by header name and renamed to the table's names;
//! the source-name column must be present but is dropped, because the table
//! has nowhere to keep it. Timestamps that do not parse become the export
//! time, content becomes a single space, and ids run contiguously from the
//! configured offset in sheet order.

use crate::error::{EtlError, Result};
use crate::models::{
    COL_CATEGORY, COL_PUBLISHED, COL_SOURCE, COL_TITLE, COL_URL, ExportedRow,
};
use crate::outputs::csv_export::write_csv;
use crate::outputs::spreadsheet::{SheetRow, read_rows};
use crate::utils::parse_timestamp;
use chrono::{Local, NaiveDateTime, Timelike};
use std::path::Path;
use tracing::{debug, info, instrument};

/// Placeholder for the `content` column, which is NOT NULL in the table.
pub const CONTENT_PLACEHOLDER: &str = " ";

/// First synthetic id handed out by default.
pub const DEFAULT_ID_OFFSET: i32 = 1000;

struct ColumnIndex {
    title: usize,
    url: usize,
    category: usize,
    published: usize,
}

impl ColumnIndex {
    fn from_header(header: &SheetRow) -> Result<Self> {
        let find = |name: &str| {
            header
                .iter()
                .position(|cell| cell.as_deref().map(str::trim) == Some(name))
                .ok_or_else(|| EtlError::MissingColumn(name.to_string()))
        };
        find(COL_SOURCE)?;
        Ok(Self {
            title: find(COL_TITLE)?,
            url: find(COL_URL)?,
            category: find(COL_CATEGORY)?,
            published: find(COL_PUBLISHED)?,
        })
    }
}

fn cell(row: &SheetRow, idx: usize) -> Option<&str> {
    row.get(idx).and_then(|c| c.as_deref())
}

/// Transform sheet rows (header first) into exported rows.
///
/// An empty sheet, without even a header, yields no rows.
#[instrument(level = "info", skip(rows), fields(row_count = rows.len()))]
pub fn export_rows(rows: &[SheetRow], id_offset: i32, now: NaiveDateTime) -> Result<Vec<ExportedRow>> {
    let Some((header, body)) = rows.split_first() else {
        info!("Spreadsheet is empty");
        return Ok(Vec::new());
    };
    let cols = ColumnIndex::from_header(header)?;

    let mut defaulted = 0usize;
    let exported = body
        .iter()
        .enumerate()
        .map(|(idx, row)| -> Result<ExportedRow> {
            let step = i32::try_from(idx).map_err(|_| EtlError::IdOverflow(id_offset, i32::MAX))?;
            let id = id_offset
                .checked_add(step)
                .ok_or(EtlError::IdOverflow(id_offset, step))?;
            let datetime = match cell(row, cols.published).and_then(parse_timestamp) {
                Some(ts) => ts,
                None => {
                    defaulted += 1;
                    debug!(id, raw = ?cell(row, cols.published), "Timestamp missing or invalid; using export time");
                    now
                }
            };
            Ok(ExportedRow {
                id,
                news_type: cell(row, cols.category).unwrap_or_default().to_string(),
                href: cell(row, cols.url).unwrap_or_default().to_string(),
                title: cell(row, cols.title).unwrap_or_default().to_string(),
                datetime,
                content: CONTENT_PLACEHOLDER.to_string(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    info!(exported = exported.len(), defaulted, "Rows exported");
    Ok(exported)
}

/// Read the spreadsheet at `sheet`, transform it, and write the CSV at `csv`.
///
/// The fallback timestamp is the local time at the start of the export,
/// truncated to whole seconds. Returns the number of data rows written.
#[instrument(level = "info", skip_all, fields(sheet = %sheet.display(), csv = %csv.display()))]
pub fn export_file(sheet: &Path, csv: &Path, id_offset: i32) -> Result<usize> {
    let now = Local::now().naive_local();
    let now = now.with_nanosecond(0).unwrap_or(now);

    let rows = read_rows(sheet)?;
    let exported = export_rows(&rows, id_offset, now)?;
    write_csv(csv, &exported)?;
    Ok(exported.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SHEET_HEADERS;
    use chrono::NaiveDate;

    fn header() -> SheetRow {
        SHEET_HEADERS.iter().map(|h| Some(h.to_string())).collect()
    }

    fn sheet_row(title: &str, published: Option<&str>) -> SheetRow {
        vec![
            Some(title.to_string()),
            Some(format!("https://news.qq.com/rain/a/{title}")),
            Some("Outlet".to_string()),
            Some("财经".to_string()),
            published.map(str::to_string),
        ]
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap()
    }

    #[test]
    fn test_ids_are_contiguous_from_offset() {
        let rows: Vec<SheetRow> = std::iter::once(header())
            .chain((0..7).map(|i| sheet_row(&format!("t{i}"), Some("2025-05-06 10:00:00"))))
            .collect();

        let out = export_rows(&rows, 1000, now()).unwrap();
        let ids: Vec<i32> = out.iter().map(|r| r.id).collect();
        assert_eq!(ids, (1000..1007).collect::<Vec<_>>());
    }

    #[test]
    fn test_ids_may_end_at_i32_max() {
        let rows = vec![header(), sheet_row("a", None), sheet_row("b", None)];
        let out = export_rows(&rows, i32::MAX - 1, now()).unwrap();
        let ids: Vec<i32> = out.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![i32::MAX - 1, i32::MAX]);
    }

    #[test]
    fn test_id_overflow_is_an_error() {
        let rows = vec![
            header(),
            sheet_row("a", None),
            sheet_row("b", None),
            sheet_row("c", None),
        ];
        let err = export_rows(&rows, i32::MAX - 1, now()).unwrap_err();
        assert!(matches!(err, EtlError::IdOverflow(base, 2) if base == i32::MAX - 1));
    }

    #[test]
    fn test_columns_renamed_and_source_dropped() {
        let rows = vec![header(), sheet_row("headline", Some("2025-05-06T10:20:30+08:00"))];
        let out = export_rows(&rows, 1, now()).unwrap();

        assert_eq!(
            out[0],
            ExportedRow {
                id: 1,
                news_type: "财经".to_string(),
                href: "https://news.qq.com/rain/a/headline".to_string(),
                title: "headline".to_string(),
                datetime: NaiveDate::from_ymd_opt(2025, 5, 6)
                    .unwrap()
                    .and_hms_opt(10, 20, 30)
                    .unwrap(),
                content: " ".to_string(),
            }
        );
    }

    #[test]
    fn test_missing_published_time_uses_now_and_space_content() {
        let rows = vec![header(), sheet_row("no time", None)];
        let out = export_rows(&rows, 1000, now()).unwrap();
        assert_eq!(out[0].datetime, now());
        assert_eq!(out[0].content, " ");
    }

    #[test]
    fn test_unparseable_published_time_uses_now() {
        let rows = vec![
            header(),
            sheet_row("bad", Some("not a date")),
            sheet_row("good", Some("2025-05-06 10:00:00")),
        ];
        let out = export_rows(&rows, 1000, now()).unwrap();
        assert_eq!(out[0].datetime, now());
        assert_ne!(out[1].datetime, now());
    }

    #[test]
    fn test_short_rows_are_tolerated() {
        let short: SheetRow = vec![Some("only title".to_string())];
        let rows = vec![header(), short];
        let out = export_rows(&rows, 5, now()).unwrap();
        assert_eq!(out[0].title, "only title");
        assert_eq!(out[0].href, "");
        assert_eq!(out[0].datetime, now());
    }

    #[test]
    fn test_columns_found_by_name_not_position() {
        let header: SheetRow = ["发布时间", "新闻分类", "新闻媒体", "新闻链接", "新闻标题"]
            .iter()
            .map(|h| Some(h.to_string()))
            .collect();
        let row: SheetRow = vec![
            Some("2025-05-06".to_string()),
            Some("体育".to_string()),
            Some("Outlet".to_string()),
            Some("https://x.test/1".to_string()),
            Some("Reordered".to_string()),
        ];
        let out = export_rows(&[header, row], 0, now()).unwrap();
        assert_eq!(out[0].title, "Reordered");
        assert_eq!(out[0].news_type, "体育");
        assert_eq!(out[0].href, "https://x.test/1");
    }

    #[test]
    fn test_missing_header_column_is_an_error() {
        let mut h = header();
        h[2] = Some("media".to_string());
        let err = export_rows(&[h], 1000, now()).unwrap_err();
        assert!(matches!(err, EtlError::MissingColumn(c) if c == "新闻媒体"));
    }

    #[test]
    fn test_export_file_end_to_end() {
        use crate::models::{ArticleRecord, Category};
        use crate::outputs::spreadsheet::{RecordSink, XlsxSheet};

        let tmp = tempfile::tempdir().unwrap();
        let sheet_path = tmp.path().join("news.xlsx");
        let csv_path = tmp.path().join("news_data.csv");

        let mut sheet = XlsxSheet::open_or_create(&sheet_path).unwrap();
        for (title, published) in [("dated", Some("2025-05-06 10:20:30")), ("undated", None)] {
            sheet
                .append(&ArticleRecord {
                    title: title.to_string(),
                    url: format!("https://news.qq.com/rain/a/{title}"),
                    source_name: "Outlet".to_string(),
                    category: Category::Sports,
                    published_at: published.map(str::to_string),
                })
                .unwrap();
        }

        let before = Local::now().naive_local().with_nanosecond(0).unwrap();
        let written = export_file(&sheet_path, &csv_path, 1000).unwrap();
        let after = Local::now().naive_local();
        assert_eq!(written, 2);

        let bytes = std::fs::read(&csv_path).unwrap();
        let mut reader = csv::Reader::from_reader(&bytes[3..]);
        let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        let headers: Vec<String> = reader.headers().unwrap().iter().map(str::to_string).collect();
        assert_eq!(headers, ["id", "news_type", "href", "title", "datetime", "content"]);
        assert_eq!(&records[0][0], "1000");
        assert_eq!(&records[0][1], "体育");
        assert_eq!(&records[0][4], "2025-05-06 10:20:30");
        assert_eq!(&records[1][0], "1001");
        assert_eq!(&records[1][3], "undated");
        assert_eq!(&records[1][5], " ");

        let fallback = NaiveDateTime::parse_from_str(&records[1][4], "%Y-%m-%d %H:%M:%S").unwrap();
        assert!(fallback >= before && fallback <= after);
    }

    #[test]
    fn test_empty_sheet_exports_nothing() {
        assert!(export_rows(&[], 1000, now()).unwrap().is_empty());
        assert!(export_rows(&[header()], 1000, now()).unwrap().is_empty());
    }
}
