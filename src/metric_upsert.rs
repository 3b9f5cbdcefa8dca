//! Per-slice metric value writes.

use chrono::Utc;
use rusqlite::{Transaction, params};
use tracing::{debug, warn};

use crate::cell::{MetricCellError, RowRecord};
use crate::metrics_catalog::MetricCatalog;

/// Writes every catalog metric present in `row` for (player, slice) and
/// returns how many were stored. Unparseable and non-finite cells are skipped
/// one at a time; re-running with the same row overwrites the same values.
pub fn write_metrics(
    tx: &Transaction<'_>,
    catalog: &MetricCatalog,
    player_id: i64,
    slice_id: i64,
    row: &RowRecord,
) -> rusqlite::Result<usize> {
    let now = Utc::now().to_rfc3339();
    let mut stmt = tx.prepare_cached(
        r#"
        INSERT INTO player_statistics (player_id, slice_id, metric_code, metric_value, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        ON CONFLICT(player_id, slice_id, metric_code) DO UPDATE SET
            metric_value = excluded.metric_value,
            updated_at = excluded.updated_at
        "#,
    )?;

    let mut written = 0usize;
    for metric in catalog.iter() {
        let Some(cell) = row.get(metric.label) else {
            continue;
        };
        let value = match cell.as_metric_value() {
            Ok(Some(v)) => v,
            Ok(None) => continue,
            Err(MetricCellError::NotNumeric(raw)) => {
                warn!(player_id, metric = metric.code, value = %raw, "cannot convert metric value");
                continue;
            }
            Err(MetricCellError::NonFinite(v)) => {
                debug!(player_id, metric = metric.code, value = %v, "dropping non-finite metric value");
                continue;
            }
        };
        stmt.execute(params![player_id, slice_id, metric.code, value, now])?;
        written += 1;
    }
    Ok(written)
}
