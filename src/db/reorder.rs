//! Renumber `news.id` densely from 0 in newest-first order.
//!
//! Every phase runs inside one transaction, so a failure at any point
//! (including after the column default has been dropped) rolls the table
//! back to exactly how it was:
//!
//! ```text
//! BEGIN → DefaultDropped → Planned → Staged → OffsetApplied
//!       → Renumbered → SequenceReset → DefaultRestored → COMMIT
//! ```
//!
//! Ids are first shifted past the current maximum so that no intermediate
//! state collides with the primary key. The `(old_id, new_id)` mapping is
//! staged in a temporary table dropped at commit, and applied with a single
//! joined UPDATE.
//!
//! Not safe to run while other writers insert into `news`; the `ALTER TABLE`
//! at the start holds an exclusive lock for the rest of the transaction.

use super::{NEWS_ID_SEQ, NEWS_TABLE, resync_sequence};
use crate::error::{EtlError, Result};
use chrono::NaiveDateTime;
use sqlx::postgres::PgPool;
use sqlx::{Postgres, Transaction};
use std::cmp::Reverse;
use tracing::{error, info, instrument, warn};

/// Minimum amount ids are shifted by before renumbering.
pub const DEFAULT_SHIFT_OFFSET: i32 = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    DefaultDropped,
    Planned,
    Staged,
    OffsetApplied,
    Renumbered,
    SequenceReset,
    DefaultRestored,
}

/// Old and new id for one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdMove {
    pub old_id: i32,
    pub new_id: i32,
}

/// Outcome of a committed renumbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReorderSummary {
    pub rows: usize,
    pub shift: i32,
    pub next_id: i64,
}

/// Assign ids `0..n` by descending timestamp.
///
/// Rows without a timestamp sort after all dated rows; ties keep ascending
/// old-id order.
pub fn plan_renumbering(mut rows: Vec<(i32, Option<NaiveDateTime>)>) -> Vec<IdMove> {
    rows.sort_by_key(|&(id, ts)| (ts.is_none(), Reverse(ts), id));
    rows.into_iter()
        .zip(0..)
        .map(|((old_id, _), new_id)| IdMove { old_id, new_id })
        .collect()
}

/// Shift applied before renumbering: at least `min_shift`, and always past
/// the largest existing id so shifted ids cannot collide with unshifted ones.
pub fn shift_for(moves: &[IdMove], min_shift: i32) -> Result<i32> {
    let Some(max_id) = moves.iter().map(|m| m.old_id).max() else {
        return Ok(min_shift);
    };
    let past_max = max_id
        .checked_add(1)
        .ok_or(EtlError::IdOverflow(max_id, 1))?;
    let shift = min_shift.max(past_max);
    max_id
        .checked_add(shift)
        .ok_or(EtlError::IdOverflow(max_id, shift))?;
    Ok(shift)
}

/// Renumber the whole table. See the module docs for the phase order.
#[instrument(level = "info", skip(pool))]
pub async fn reorder_ids(pool: &PgPool, min_shift: i32) -> Result<ReorderSummary> {
    let mut tx = pool.begin().await?;
    match renumber(&mut tx, min_shift).await {
        Ok(summary) => {
            tx.commit().await?;
            info!(
                rows = summary.rows,
                shift = summary.shift,
                next_id = summary.next_id,
                "Renumbering committed"
            );
            Ok(summary)
        }
        Err(e) => {
            error!(error = %e, "Renumbering failed; rolling back");
            if let Err(rb) = tx.rollback().await {
                warn!(error = %rb, "Rollback failed");
            }
            Err(e)
        }
    }
}

async fn renumber(tx: &mut Transaction<'_, Postgres>, min_shift: i32) -> Result<ReorderSummary> {
    sqlx::query(&format!("ALTER TABLE {NEWS_TABLE} ALTER COLUMN id DROP DEFAULT"))
        .execute(&mut **tx)
        .await?;
    info!(phase = ?Phase::DefaultDropped);

    let rows: Vec<(i32, Option<NaiveDateTime>)> = sqlx::query_as(&format!(
        "SELECT id, datetime FROM {NEWS_TABLE} ORDER BY datetime DESC NULLS LAST, id"
    ))
    .fetch_all(&mut **tx)
    .await?;
    let moves = plan_renumbering(rows);
    let shift = shift_for(&moves, min_shift)?;
    info!(phase = ?Phase::Planned, rows = moves.len(), shift);

    let (old_ids, new_ids): (Vec<i32>, Vec<i32>) =
        moves.iter().map(|m| (m.old_id, m.new_id)).unzip();
    sqlx::query(
        "CREATE TEMP TABLE news_renumber (old_id integer PRIMARY KEY, new_id integer NOT NULL) ON COMMIT DROP",
    )
    .execute(&mut **tx)
    .await?;
    sqlx::query(
        "INSERT INTO news_renumber (old_id, new_id) SELECT * FROM UNNEST($1::int4[], $2::int4[])",
    )
    .bind(old_ids)
    .bind(new_ids)
    .execute(&mut **tx)
    .await?;
    info!(phase = ?Phase::Staged);

    let shifted = sqlx::query(&format!("UPDATE {NEWS_TABLE} SET id = id + $1"))
        .bind(shift)
        .execute(&mut **tx)
        .await?
        .rows_affected();
    info!(phase = ?Phase::OffsetApplied, shifted);

    let renumbered = sqlx::query(&format!(
        "UPDATE {NEWS_TABLE} AS n SET id = r.new_id FROM news_renumber r WHERE n.id = r.old_id + $1"
    ))
    .bind(shift)
    .execute(&mut **tx)
    .await?
    .rows_affected();
    info!(phase = ?Phase::Renumbered, renumbered);

    let next_id = resync_sequence(tx).await?;
    info!(phase = ?Phase::SequenceReset, next_id);

    sqlx::query(&format!(
        "ALTER TABLE {NEWS_TABLE} ALTER COLUMN id SET DEFAULT nextval('{NEWS_ID_SEQ}'::regclass)"
    ))
    .execute(&mut **tx)
    .await?;
    info!(phase = ?Phase::DefaultRestored);

    Ok(ReorderSummary {
        rows: moves.len(),
        shift,
        next_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support;
    use chrono::NaiveDate;
    use std::collections::HashSet;

    fn at(day: u32, hour: u32) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(2025, 5, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
    }

    #[test]
    fn test_plan_is_dense_and_newest_first() {
        let rows = vec![
            (1000, at(1, 9)),
            (1001, at(3, 9)),
            (1002, at(2, 9)),
            (1003, at(3, 12)),
        ];
        let moves = plan_renumbering(rows);

        assert_eq!(
            moves,
            vec![
                IdMove { old_id: 1003, new_id: 0 },
                IdMove { old_id: 1001, new_id: 1 },
                IdMove { old_id: 1002, new_id: 2 },
                IdMove { old_id: 1000, new_id: 3 },
            ]
        );
    }

    #[test]
    fn test_plan_ids_are_exactly_zero_to_n() {
        let rows: Vec<_> = (0..50).map(|i| (i * 7 + 3, at(1 + (i as u32 % 28), 0))).collect();
        let moves = plan_renumbering(rows);

        let new_ids: HashSet<i32> = moves.iter().map(|m| m.new_id).collect();
        assert_eq!(new_ids, (0..50).collect::<HashSet<_>>());
        let old_ids: HashSet<i32> = moves.iter().map(|m| m.old_id).collect();
        assert_eq!(old_ids.len(), 50);
    }

    #[test]
    fn test_plan_ties_and_missing_timestamps() {
        let rows = vec![(5, None), (9, at(4, 8)), (2, at(4, 8)), (1, None)];
        let moves = plan_renumbering(rows);
        let order: Vec<i32> = moves.iter().map(|m| m.old_id).collect();
        assert_eq!(order, vec![2, 9, 1, 5]);
    }

    #[test]
    fn test_plan_empty_table() {
        assert!(plan_renumbering(Vec::new()).is_empty());
    }

    #[test]
    fn test_shift_uses_minimum_when_ids_are_small() {
        let moves = vec![IdMove { old_id: 1042, new_id: 0 }];
        assert_eq!(shift_for(&moves, DEFAULT_SHIFT_OFFSET).unwrap(), 100_000);
        assert_eq!(shift_for(&[], DEFAULT_SHIFT_OFFSET).unwrap(), 100_000);
    }

    #[test]
    fn test_shift_clears_large_ids() {
        let moves = vec![
            IdMove { old_id: 250_000, new_id: 0 },
            IdMove { old_id: 3, new_id: 1 },
        ];
        let shift = shift_for(&moves, DEFAULT_SHIFT_OFFSET).unwrap();
        assert_eq!(shift, 250_001);
        assert!(moves.iter().all(|m| m.old_id + shift > 250_000));
    }

    #[test]
    fn test_shift_overflow_is_an_error() {
        let moves = vec![IdMove { old_id: i32::MAX - 10, new_id: 0 }];
        assert!(matches!(
            shift_for(&moves, DEFAULT_SHIFT_OFFSET),
            Err(EtlError::IdOverflow(_, _))
        ));
    }

    #[tokio::test]
    #[ignore = "requires a live Postgres at DATABASE_URL"]
    async fn test_reorder_renumbers_table_newest_first() {
        let (_guard, pool) = test_support::scratch_pool().await;
        for (id, title, ts) in [
            (1000, "may 1", at(1, 9)),
            (1001, "may 3", at(3, 9)),
            (1002, "undated", None),
            (1003, "may 2", at(2, 9)),
            (250_000, "may 4", at(4, 9)),
        ] {
            test_support::insert_news(&pool, id, "科技", title, ts).await;
        }

        let summary = reorder_ids(&pool, DEFAULT_SHIFT_OFFSET).await.unwrap();
        assert_eq!(
            summary,
            ReorderSummary {
                rows: 5,
                shift: 250_001,
                next_id: 5,
            }
        );

        let stored = test_support::ids_and_titles(&pool).await;
        let expected: Vec<(i32, String)> = ["may 4", "may 3", "may 2", "may 1", "undated"]
            .into_iter()
            .zip(0..)
            .map(|(title, id)| (id, title.to_string()))
            .collect();
        assert_eq!(stored, expected);

        assert_eq!(
            test_support::id_column_default(&pool).await.as_deref(),
            Some("nextval('news_id_seq'::regclass)")
        );
        assert_eq!(test_support::next_sequence_value(&pool).await, 5);
    }

    #[tokio::test]
    #[ignore = "requires a live Postgres at DATABASE_URL"]
    async fn test_reorder_empty_table() {
        let (_guard, pool) = test_support::scratch_pool().await;
        let summary = reorder_ids(&pool, DEFAULT_SHIFT_OFFSET).await.unwrap();
        assert_eq!(summary.rows, 0);
        assert_eq!(summary.next_id, 1);
        assert_eq!(
            test_support::id_column_default(&pool).await.as_deref(),
            Some("nextval('news_id_seq'::regclass)")
        );
    }

    #[tokio::test]
    #[ignore = "requires a live Postgres at DATABASE_URL"]
    async fn test_failure_after_dropping_default_rolls_back() {
        let (_guard, pool) = test_support::scratch_pool().await;
        test_support::insert_news(&pool, 3, "科技", "small", at(1, 9)).await;
        test_support::insert_news(&pool, i32::MAX - 10, "科技", "huge", at(2, 9)).await;

        // Planning fails on the shift after the default is already gone.
        let err = reorder_ids(&pool, DEFAULT_SHIFT_OFFSET).await.unwrap_err();
        assert!(matches!(err, EtlError::IdOverflow(_, _)));

        assert_eq!(
            test_support::id_column_default(&pool).await.as_deref(),
            Some("nextval('news_id_seq'::regclass)")
        );
        assert_eq!(
            test_support::ids_and_titles(&pool).await,
            vec![(3, "small".to_string()), (i32::MAX - 10, "huge".to_string())]
        );
    }
}
