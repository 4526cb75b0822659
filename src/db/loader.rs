//! Bulk load of the exported CSV with `COPY … FROM STDIN`.
//!
//! The copy and the sequence resync share one transaction: either every row
//! lands and `news_id_seq` points past the new maximum, or nothing changes.

use super::{NEWS_TABLE, resync_sequence};
use crate::error::Result;
use crate::outputs::csv_export::{CSV_HEADERS, UTF8_BOM};
use sqlx::postgres::PgPool;
use sqlx::{Postgres, Transaction};
use std::path::Path;
use tracing::{error, info, instrument, warn};

const COPY_CHUNK: usize = 64 * 1024;

/// Outcome of a successful load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadSummary {
    pub rows: u64,
    pub next_id: i64,
}

fn copy_statement() -> String {
    format!(
        "COPY {NEWS_TABLE} ({}) FROM STDIN WITH (FORMAT CSV)",
        CSV_HEADERS.join(", ")
    )
}

/// Strip an optional UTF-8 BOM and the header line, leaving the CSV body.
pub fn csv_body(raw: &[u8]) -> &[u8] {
    let raw = raw.strip_prefix(UTF8_BOM).unwrap_or(raw);
    match raw.iter().position(|&b| b == b'\n') {
        Some(nl) => &raw[nl + 1..],
        None => &[],
    }
}

/// Copy the CSV at `path` into `news` and resync the id sequence.
///
/// Any failure rolls the whole load back.
#[instrument(level = "info", skip(pool), fields(path = %path.display()))]
pub async fn load_csv(pool: &PgPool, path: &Path) -> Result<LoadSummary> {
    let raw = tokio::fs::read(path).await?;
    let body = csv_body(&raw);
    info!(bytes = body.len(), "Read CSV body");

    let mut tx = pool.begin().await?;
    match copy_and_resync(&mut tx, body).await {
        Ok(summary) => {
            tx.commit().await?;
            info!(rows = summary.rows, next_id = summary.next_id, "Import committed");
            Ok(summary)
        }
        Err(e) => {
            error!(error = %e, "Import failed; rolling back");
            if let Err(rb) = tx.rollback().await {
                warn!(error = %rb, "Rollback failed");
            }
            Err(e)
        }
    }
}

async fn copy_and_resync(tx: &mut Transaction<'_, Postgres>, body: &[u8]) -> Result<LoadSummary> {
    let mut copy = tx.copy_in_raw(&copy_statement()).await?;
    for chunk in body.chunks(COPY_CHUNK) {
        if let Err(e) = copy.send(chunk).await {
            if let Err(abort) = copy.abort(e.to_string()).await {
                warn!(error = %abort, "Aborting COPY failed");
            }
            return Err(e.into());
        }
    }
    let rows = copy.finish().await?;
    info!(rows, "COPY finished");

    let next_id = resync_sequence(tx).await?;
    Ok(LoadSummary { rows, next_id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support;
    use crate::models::ExportedRow;
    use crate::outputs::csv_export::write_csv;
    use chrono::NaiveDate;

    #[test]
    fn test_copy_statement_matches_csv_columns() {
        assert_eq!(
            copy_statement(),
            "COPY news (id, news_type, href, title, datetime, content) FROM STDIN WITH (FORMAT CSV)"
        );
    }

    #[test]
    fn test_csv_body_strips_bom_and_header() {
        let raw = "\u{feff}id,news_type,href,title,datetime,content\n1000,科技,h,t,2025-05-06 10:00:00, \n";
        assert_eq!(
            csv_body(raw.as_bytes()),
            "1000,科技,h,t,2025-05-06 10:00:00, \n".as_bytes()
        );
    }

    #[test]
    fn test_csv_body_without_bom() {
        let raw = b"id,news_type\r\n1,a\r\n";
        assert_eq!(csv_body(raw), b"1,a\r\n");
    }

    #[test]
    fn test_csv_body_header_only_or_empty() {
        assert!(csv_body(b"id,news_type,href,title,datetime,content").is_empty());
        assert!(csv_body(b"").is_empty());
        assert!(csv_body(UTF8_BOM).is_empty());
    }

    fn exported(id: i32, title: &str, day: u32) -> ExportedRow {
        ExportedRow {
            id,
            news_type: "科技".to_string(),
            href: format!("https://news.qq.com/rain/a/{id}"),
            title: title.to_string(),
            datetime: NaiveDate::from_ymd_opt(2025, 5, day)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            content: " ".to_string(),
        }
    }

    #[tokio::test]
    #[ignore = "requires a live Postgres at DATABASE_URL"]
    async fn test_load_copies_rows_and_resyncs_sequence() {
        let (_guard, pool) = test_support::scratch_pool().await;
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("news_data.csv");
        write_csv(
            &path,
            &[
                exported(1000, "first", 1),
                exported(1001, "标题, with a comma", 2),
                exported(1002, "third", 3),
            ],
        )
        .unwrap();

        let summary = load_csv(&pool, &path).await.unwrap();
        assert_eq!(summary, LoadSummary { rows: 3, next_id: 1003 });

        let stored = test_support::ids_and_titles(&pool).await;
        assert_eq!(
            stored,
            vec![
                (1000, "first".to_string()),
                (1001, "标题, with a comma".to_string()),
                (1002, "third".to_string()),
            ]
        );
        let max = test_support::max_id(&pool).await.unwrap();
        assert!(test_support::next_sequence_value(&pool).await > i64::from(max));
    }

    #[tokio::test]
    #[ignore = "requires a live Postgres at DATABASE_URL"]
    async fn test_failed_load_leaves_table_untouched() {
        let (_guard, pool) = test_support::scratch_pool().await;
        test_support::insert_news(&pool, 7, "科技", "existing", None).await;

        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("news_data.csv");
        write_csv(&path, &[exported(8, "new", 1), exported(7, "duplicate id", 2)]).unwrap();

        assert!(matches!(
            load_csv(&pool, &path).await,
            Err(crate::error::EtlError::Db(_))
        ));
        assert_eq!(
            test_support::ids_and_titles(&pool).await,
            vec![(7, "existing".to_string())]
        );
    }
}
