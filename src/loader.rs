//! Batch ingestion: one slice, many rows, one transaction.
//!
//! Rows fail independently. A skipped row is logged and counted; a storage
//! error drops the transaction, which rolls back every write of the batch.

use anyhow::{Context, Result, anyhow};
use chrono::{Datelike, Utc};
use rusqlite::{Connection, Transaction, TransactionBehavior, params};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::cell::{RowRecord, columns};
use crate::error::{RowError, SkippedRow};
use crate::identity::{PlayerProfile, resolve_player};
use crate::metric_upsert::write_metrics;
use crate::metrics_catalog::{MetricCatalog, ensure_catalog};
use crate::slice::{
    PeriodKind, RolloverCheck, StatKind, bump_revision, resolve_slice, season_rollover_check,
};
use crate::tournament::{advance_current_round, get_tournament, tournament_season_or_default};

const PROGRESS_EVERY: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub tournament_id: i64,
    pub stat_kind: StatKind,
    pub period_kind: PeriodKind,
    /// Season label or round number. `None` on a SEASON load means the
    /// tournament's configured season.
    pub period_value: Option<String>,
    pub force_new_season: bool,
}

impl LoadRequest {
    pub fn season(tournament_id: i64, stat_kind: StatKind, season: Option<&str>) -> Self {
        Self {
            tournament_id,
            stat_kind,
            period_kind: PeriodKind::Season,
            period_value: season.map(str::to_string),
            force_new_season: false,
        }
    }

    pub fn round(tournament_id: i64, stat_kind: StatKind, round: u32) -> Self {
        Self {
            tournament_id,
            stat_kind,
            period_kind: PeriodKind::Round,
            period_value: Some(round.to_string()),
            force_new_season: false,
        }
    }

    pub fn force_new(mut self) -> Self {
        self.force_new_season = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadSummary {
    pub players_loaded: usize,
    pub stats_loaded: usize,
    pub slice_id: i64,
    pub is_new_slice: bool,
    pub slice_revision: i64,
    pub period_value: String,
    pub rows_total: usize,
    pub skipped: Vec<SkippedRow>,
    pub rollover: RolloverCheck,
}

impl LoadSummary {
    /// "created" for a fresh slice, "updated" otherwise.
    pub fn action(&self) -> &'static str {
        if self.is_new_slice { "created" } else { "updated" }
    }
}

/// Drives identity resolution and metric writes for a batch of rows.
pub struct StatsLoader<'a> {
    catalog: &'a MetricCatalog,
    reference_year: i32,
}

impl<'a> StatsLoader<'a> {
    pub fn new(catalog: &'a MetricCatalog) -> Self {
        Self {
            catalog,
            reference_year: Utc::now().year(),
        }
    }

    /// Year used to turn ages into birth years and as the fallback season.
    pub fn with_reference_year(mut self, year: i32) -> Self {
        self.reference_year = year;
        self
    }

    pub fn load(
        &self,
        conn: &mut Connection,
        rows: &[RowRecord],
        request: &LoadRequest,
    ) -> Result<LoadSummary> {
        info!(
            tournament_id = request.tournament_id,
            stat_kind = %request.stat_kind,
            period_kind = %request.period_kind,
            period_value = request.period_value.as_deref().unwrap_or("-"),
            rows = rows.len(),
            "loading batch"
        );
        match self.load_inner(conn, rows, request) {
            Ok(summary) => Ok(summary),
            Err(err) => {
                error!(error = %err, "batch rolled back");
                Err(err)
            }
        }
    }

    fn load_inner(
        &self,
        conn: &mut Connection,
        rows: &[RowRecord],
        request: &LoadRequest,
    ) -> Result<LoadSummary> {
        if get_tournament(conn, request.tournament_id)?.is_none() {
            return Err(anyhow!("unknown tournament id {}", request.tournament_id));
        }
        let period_value = self.period_value(conn, request)?;
        let round = match request.period_kind {
            PeriodKind::Round => Some(parse_round(&period_value)?),
            PeriodKind::Season => None,
        };

        let started_at = Utc::now().to_rfc3339();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("begin ingest transaction")?;
        ensure_catalog(&tx, self.catalog)?;

        let rollover = match request.period_kind {
            PeriodKind::Season => {
                season_rollover_check(&tx, request.tournament_id, request.stat_kind, &period_value)?
            }
            PeriodKind::Round => RolloverCheck::default(),
        };
        if rollover.needs_new_season && !request.force_new_season {
            warn!(
                current = rollover.current_period_value.as_deref().unwrap_or("-"),
                candidate = %period_value,
                "new season detected; a separate slice will hold it"
            );
        }

        let slice = resolve_slice(
            &tx,
            request.tournament_id,
            request.stat_kind,
            request.period_kind,
            Some(&period_value),
            request.force_new_season,
        )?;

        let mut players_loaded = 0usize;
        let mut stats_loaded = 0usize;
        let mut skipped = Vec::new();

        for (idx, row) in rows.iter().enumerate() {
            match self.load_row(&tx, row, request.tournament_id, slice.slice_id) {
                Ok(written) => {
                    players_loaded += 1;
                    stats_loaded += written;
                }
                Err(RowError::Skip(reason)) => {
                    warn!(row = idx, reason = %reason, "skipping row");
                    skipped.push(SkippedRow {
                        row_index: idx,
                        player_name: row.text(columns::PLAYER_NAME),
                        reason,
                    });
                }
                Err(RowError::Storage(err)) => {
                    return Err(err).with_context(|| format!("storage failure on row {idx}"));
                }
            }
            if (idx + 1) % PROGRESS_EVERY == 0 {
                info!("processed {}/{} rows", idx + 1, rows.len());
            }
        }

        if let Some(round) = round {
            advance_current_round(&tx, request.tournament_id, round)
                .context("advance current round")?;
        }
        let slice_revision = bump_revision(&tx, slice.slice_id)?;
        record_run(
            &tx,
            &started_at,
            request.tournament_id,
            slice.slice_id,
            slice_revision,
            rows.len(),
            players_loaded,
            stats_loaded,
            &skipped,
        )?;
        tx.commit().context("commit ingest transaction")?;

        info!(
            slice_id = slice.slice_id,
            players_loaded,
            stats_loaded,
            skipped = skipped.len(),
            "batch committed"
        );

        Ok(LoadSummary {
            players_loaded,
            stats_loaded,
            slice_id: slice.slice_id,
            is_new_slice: slice.is_new,
            slice_revision,
            period_value,
            rows_total: rows.len(),
            skipped,
            rollover,
        })
    }

    fn load_row(
        &self,
        tx: &Transaction<'_>,
        row: &RowRecord,
        tournament_id: i64,
        slice_id: i64,
    ) -> Result<usize, RowError> {
        let profile = PlayerProfile::from_row(row, self.reference_year)?;
        let player_id = resolve_player(tx, &profile, tournament_id)?;
        Ok(write_metrics(tx, self.catalog, player_id, slice_id, row)?)
    }

    fn period_value(&self, conn: &Connection, request: &LoadRequest) -> Result<String> {
        let explicit = request
            .period_value
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        match (request.period_kind, explicit) {
            (_, Some(value)) => Ok(value.to_string()),
            (PeriodKind::Season, None) => {
                tournament_season_or_default(conn, request.tournament_id, self.reference_year)
            }
            (PeriodKind::Round, None) => Err(anyhow!("round uploads require a round number")),
        }
    }
}

/// Fails when any required identity column is absent from the header set.
pub fn validate_columns<'h>(headers: impl IntoIterator<Item = &'h str>) -> Result<()> {
    let headers = headers.into_iter().map(str::trim).collect::<Vec<_>>();
    let missing = columns::REQUIRED
        .iter()
        .filter(|required| !headers.contains(required))
        .copied()
        .collect::<Vec<_>>();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(anyhow!("missing required columns: {}", missing.join(", ")))
    }
}

fn parse_round(raw: &str) -> Result<i64> {
    match raw.trim().parse::<i64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(anyhow!("round number must be a positive integer, got `{raw}`")),
    }
}

#[allow(clippy::too_many_arguments)]
fn record_run(
    tx: &Transaction<'_>,
    started_at: &str,
    tournament_id: i64,
    slice_id: i64,
    slice_revision: i64,
    rows_total: usize,
    players_loaded: usize,
    stats_loaded: usize,
    skipped: &[SkippedRow],
) -> Result<()> {
    let skipped_json = serde_json::to_string(skipped).unwrap_or_else(|_| "[]".to_string());
    tx.execute(
        r#"
        INSERT INTO ingest_runs (
            started_at, finished_at, tournament_id, slice_id, slice_revision,
            rows_total, players_loaded, stats_loaded, skipped_json
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
        params![
            started_at,
            Utc::now().to_rfc3339(),
            tournament_id,
            slice_id,
            slice_revision,
            rows_total as i64,
            players_loaded as i64,
            stats_loaded as i64,
            skipped_json
        ],
    )
    .context("insert ingest run")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_columns_names_what_is_missing() {
        assert!(validate_columns(["Игрок", "Команда", " Позиция ", "Голы"]).is_ok());
        let err = validate_columns(["Игрок", "Голы"]).expect_err("missing columns");
        assert_eq!(
            err.to_string(),
            "missing required columns: Команда, Позиция"
        );
    }

    #[test]
    fn round_numbers_must_be_positive() {
        assert_eq!(parse_round(" 31 ").expect("round"), 31);
        assert!(parse_round("0").is_err());
        assert!(parse_round("1-15").is_err());
    }
}
