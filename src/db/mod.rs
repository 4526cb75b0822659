//! Postgres access for the `news` table.
//!
//! - [`loader`]: bulk `COPY` of the exported CSV
//! - [`reorder`]: transactional renumbering of ids by timestamp
//! - [`query`]: paginated reads for the `list` command
//!
//! All statements are runtime-checked (`sqlx::query` + `.bind`), so the crate
//! builds without a live database.

pub mod loader;
pub mod query;
pub mod reorder;

use crate::error::Result;
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};

pub const NEWS_TABLE: &str = "news";
pub const NEWS_ID_SEQ: &str = "news_id_seq";

/// Open a small pool; every command works through one connection at a time.
#[instrument(level = "info", skip_all)]
pub async fn connect(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await?;
    info!("Connected to Postgres");
    Ok(pool)
}

/// Create the `news` table (and its `news_id_seq` sequence) if missing.
#[instrument(level = "info", skip_all)]
pub async fn init_schema(pool: &PgPool) -> Result<()> {
    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {NEWS_TABLE} (
            id        SERIAL PRIMARY KEY,
            news_type TEXT,
            href      TEXT,
            title     TEXT,
            datetime  TIMESTAMP,
            content   TEXT NOT NULL
        )
        "#
    ))
    .execute(pool)
    .await?;
    info!(table = NEWS_TABLE, "Schema ready");
    Ok(())
}

/// Point `news_id_seq` one past the largest id. Returns the next value the
/// sequence will hand out.
pub async fn resync_sequence(conn: &mut PgConnection) -> Result<i64> {
    let next: i64 = sqlx::query_scalar(&format!(
        "SELECT setval($1::regclass, COALESCE(MAX(id), 0)::bigint + 1, false) FROM {NEWS_TABLE}"
    ))
    .bind(NEWS_ID_SEQ)
    .fetch_one(&mut *conn)
    .await?;
    info!(sequence = NEWS_ID_SEQ, next, "Sequence resynchronized");
    Ok(next)
}
