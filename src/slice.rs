//! Statistical slices: the (tournament, stat kind, period) containers every
//! metric value hangs off.
//!
//! SEASON slices are updated in place while the period value stays the same;
//! ROUND slices are append-only history and are created on every upload.

use std::fmt;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StatKind {
    Total,
    Per90,
}

impl StatKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StatKind::Total => "TOTAL",
            StatKind::Per90 => "PER90",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "TOTAL" => Some(StatKind::Total),
            "PER90" => Some(StatKind::Per90),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PeriodKind {
    Season,
    Round,
}

impl PeriodKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PeriodKind::Season => "SEASON",
            PeriodKind::Round => "ROUND",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "SEASON" => Some(PeriodKind::Season),
            "ROUND" => Some(PeriodKind::Round),
            _ => None,
        }
    }
}

impl fmt::Display for StatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for PeriodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatSlice {
    pub slice_id: i64,
    pub tournament_id: i64,
    pub stat_kind: StatKind,
    pub period_kind: PeriodKind,
    pub period_value: Option<String>,
    pub description: Option<String>,
    pub revision: i64,
    pub uploaded_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedSlice {
    pub slice_id: i64,
    pub is_new: bool,
}

/// Advisory comparison of the latest SEASON slice against a candidate value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct RolloverCheck {
    pub needs_new_season: bool,
    pub current_period_value: Option<String>,
}

/// Finds or creates the slice for a batch.
pub fn resolve_slice(
    tx: &Transaction<'_>,
    tournament_id: i64,
    stat_kind: StatKind,
    period_kind: PeriodKind,
    period_value: Option<&str>,
    force_new: bool,
) -> Result<ResolvedSlice> {
    let now = Utc::now().to_rfc3339();

    if period_kind == PeriodKind::Season && !force_new {
        let existing = tx
            .query_row(
                r#"
                SELECT slice_id
                FROM stat_slices
                WHERE tournament_id = ?1
                  AND slice_type = ?2
                  AND period_type = ?3
                  AND period_value IS ?4
                ORDER BY uploaded_at DESC, slice_id DESC
                LIMIT 1
                "#,
                params![
                    tournament_id,
                    stat_kind.as_str(),
                    period_kind.as_str(),
                    period_value
                ],
                |row| row.get::<_, i64>(0),
            )
            .optional()
            .context("look up season slice")?;

        if let Some(slice_id) = existing {
            tx.execute(
                "UPDATE stat_slices SET uploaded_at = ?1, description = ?2 WHERE slice_id = ?3",
                params![
                    now,
                    format!(
                        "{} {} {} (updated)",
                        stat_kind,
                        period_kind,
                        period_value.unwrap_or_default()
                    ),
                    slice_id
                ],
            )
            .context("touch season slice")?;
            info!(slice_id, "updating existing season slice");
            return Ok(ResolvedSlice {
                slice_id,
                is_new: false,
            });
        }
    }

    tx.execute(
        r#"
        INSERT INTO stat_slices (tournament_id, slice_type, period_type, period_value, description, revision, uploaded_at)
        VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)
        "#,
        params![
            tournament_id,
            stat_kind.as_str(),
            period_kind.as_str(),
            period_value,
            format!(
                "{} {} {}",
                stat_kind,
                period_kind,
                period_value.unwrap_or_default()
            ),
            now
        ],
    )
    .context("insert slice")?;
    let slice_id = tx.last_insert_rowid();
    info!(slice_id, %stat_kind, %period_kind, "created new slice");
    Ok(ResolvedSlice {
        slice_id,
        is_new: true,
    })
}

/// Bumps the slice revision and returns the new value.
pub fn bump_revision(tx: &Transaction<'_>, slice_id: i64) -> Result<i64> {
    tx.query_row(
        "UPDATE stat_slices SET revision = revision + 1 WHERE slice_id = ?1 RETURNING revision",
        params![slice_id],
        |row| row.get::<_, i64>(0),
    )
    .context("bump slice revision")
}

/// Read-only: compares the most recently uploaded SEASON slice for
/// (tournament, stat kind) with `candidate`.
pub fn season_rollover_check(
    conn: &Connection,
    tournament_id: i64,
    stat_kind: StatKind,
    candidate: &str,
) -> Result<RolloverCheck> {
    let current = conn
        .query_row(
            r#"
            SELECT period_value
            FROM stat_slices
            WHERE tournament_id = ?1
              AND slice_type = ?2
              AND period_type = 'SEASON'
            ORDER BY uploaded_at DESC, slice_id DESC
            LIMIT 1
            "#,
            params![tournament_id, stat_kind.as_str()],
            |row| row.get::<_, Option<String>>(0),
        )
        .optional()
        .context("query latest season slice")?
        .flatten();

    let needs_new_season = current
        .as_deref()
        .is_some_and(|existing| existing != candidate);
    Ok(RolloverCheck {
        needs_new_season,
        current_period_value: current,
    })
}

pub fn get_slice(conn: &Connection, slice_id: i64) -> Result<Option<StatSlice>> {
    conn.query_row(
        &format!("{SLICE_COLUMNS} WHERE slice_id = ?1"),
        params![slice_id],
        slice_from_row,
    )
    .optional()
    .context("query slice")
}

/// Newest first.
pub fn list_slices(conn: &Connection, tournament_id: i64) -> Result<Vec<StatSlice>> {
    let mut stmt = conn
        .prepare(&format!(
            "{SLICE_COLUMNS} WHERE tournament_id = ?1 ORDER BY uploaded_at DESC, slice_id DESC"
        ))
        .context("prepare list slices query")?;
    let rows = stmt
        .query_map(params![tournament_id], slice_from_row)
        .context("query slices")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode slice row")?);
    }
    Ok(out)
}

pub fn latest_slice(
    conn: &Connection,
    tournament_id: i64,
    stat_kind: StatKind,
    period_kind: PeriodKind,
) -> Result<Option<StatSlice>> {
    conn.query_row(
        &format!(
            "{SLICE_COLUMNS} WHERE tournament_id = ?1 AND slice_type = ?2 AND period_type = ?3 \
             ORDER BY uploaded_at DESC, slice_id DESC LIMIT 1"
        ),
        params![tournament_id, stat_kind.as_str(), period_kind.as_str()],
        slice_from_row,
    )
    .optional()
    .context("query latest slice")
}

const SLICE_COLUMNS: &str = "SELECT slice_id, tournament_id, slice_type, period_type, period_value, description, revision, uploaded_at FROM stat_slices";

fn slice_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StatSlice> {
    let stat_raw: String = row.get(2)?;
    let period_raw: String = row.get(3)?;
    let stat_kind = StatKind::parse(&stat_raw).ok_or_else(|| invalid_column(2, &stat_raw))?;
    let period_kind =
        PeriodKind::parse(&period_raw).ok_or_else(|| invalid_column(3, &period_raw))?;
    Ok(StatSlice {
        slice_id: row.get(0)?,
        tournament_id: row.get(1)?,
        stat_kind,
        period_kind,
        period_value: row.get(4)?,
        description: row.get(5)?,
        revision: row.get(6)?,
        uploaded_at: row.get(7)?,
    })
}

fn invalid_column(idx: usize, raw: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        anyhow!("unexpected slice dimension {raw}").into(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::open_in_memory;

    fn resolve(
        conn: &mut Connection,
        period_kind: PeriodKind,
        value: &str,
        force_new: bool,
    ) -> ResolvedSlice {
        let tx = conn.transaction().expect("tx");
        let resolved =
            resolve_slice(&tx, 0, StatKind::Total, period_kind, Some(value), force_new)
                .expect("resolve");
        tx.commit().expect("commit");
        resolved
    }

    #[test]
    fn season_slice_is_reused_for_same_value() {
        let mut conn = open_in_memory().expect("db");
        let first = resolve(&mut conn, PeriodKind::Season, "2025", false);
        let second = resolve(&mut conn, PeriodKind::Season, "2025", false);
        assert!(first.is_new);
        assert!(!second.is_new);
        assert_eq!(first.slice_id, second.slice_id);
        let slice = get_slice(&conn, first.slice_id).expect("query").expect("exists");
        assert_eq!(slice.description.as_deref(), Some("TOTAL SEASON 2025 (updated)"));
    }

    #[test]
    fn season_rollover_and_force_new_create_slices() {
        let mut conn = open_in_memory().expect("db");
        let y2025 = resolve(&mut conn, PeriodKind::Season, "2025", false);
        let y2026 = resolve(&mut conn, PeriodKind::Season, "2026", false);
        let forced = resolve(&mut conn, PeriodKind::Season, "2026", true);
        assert!(y2026.is_new && forced.is_new);
        assert_ne!(y2025.slice_id, y2026.slice_id);
        assert_ne!(y2026.slice_id, forced.slice_id);
    }

    #[test]
    fn round_slices_never_merge() {
        let mut conn = open_in_memory().expect("db");
        let a = resolve(&mut conn, PeriodKind::Round, "31", false);
        let b = resolve(&mut conn, PeriodKind::Round, "31", false);
        assert!(a.is_new && b.is_new);
        assert_ne!(a.slice_id, b.slice_id);
        assert_eq!(list_slices(&conn, 0).expect("list").len(), 2);
    }

    #[test]
    fn rollover_check_is_advisory_and_read_only() {
        let mut conn = open_in_memory().expect("db");
        let empty = season_rollover_check(&conn, 0, StatKind::Total, "2025").expect("check");
        assert_eq!(empty, RolloverCheck::default());

        resolve(&mut conn, PeriodKind::Season, "2025", false);
        let same = season_rollover_check(&conn, 0, StatKind::Total, "2025").expect("check");
        assert!(!same.needs_new_season);

        let next = season_rollover_check(&conn, 0, StatKind::Total, "2026").expect("check");
        assert!(next.needs_new_season);
        assert_eq!(next.current_period_value.as_deref(), Some("2025"));

        let per90 = season_rollover_check(&conn, 0, StatKind::Per90, "2026").expect("check");
        assert!(!per90.needs_new_season);
        assert_eq!(list_slices(&conn, 0).expect("list").len(), 1);
    }

    #[test]
    fn revision_increments() {
        let mut conn = open_in_memory().expect("db");
        let slice = resolve(&mut conn, PeriodKind::Season, "2025", false);
        let tx = conn.transaction().expect("tx");
        assert_eq!(bump_revision(&tx, slice.slice_id).expect("bump"), 1);
        assert_eq!(bump_revision(&tx, slice.slice_id).expect("bump"), 2);
        tx.commit().expect("commit");
    }

    #[test]
    fn kinds_round_trip_through_labels() {
        assert_eq!(StatKind::parse("per90"), Some(StatKind::Per90));
        assert_eq!(PeriodKind::parse(" round "), Some(PeriodKind::Round));
        assert_eq!(StatKind::parse("avg"), None);
    }
}
