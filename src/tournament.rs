use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;

use crate::slice::{PeriodKind, StatKind};

static ROUND_IN_FILENAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_?(\d+)tur").expect("round filename pattern"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tournament {
    pub tournament_id: i64,
    pub name: String,
    pub full_name: String,
    pub short_code: String,
    pub season: Option<String>,
    pub current_round: i64,
    pub is_active: bool,
}

pub fn get_tournament(conn: &Connection, tournament_id: i64) -> Result<Option<Tournament>> {
    conn.query_row(
        r#"
        SELECT tournament_id, name, full_name, short_code, season, current_round, is_active
        FROM tournaments
        WHERE tournament_id = ?1
        "#,
        params![tournament_id],
        tournament_from_row,
    )
    .optional()
    .context("query tournament")
}

pub fn list_tournaments(conn: &Connection) -> Result<Vec<Tournament>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT tournament_id, name, full_name, short_code, season, current_round, is_active
            FROM tournaments
            ORDER BY tournament_id ASC
            "#,
        )
        .context("prepare list tournaments query")?;
    let rows = stmt
        .query_map([], tournament_from_row)
        .context("query tournaments")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode tournament row")?);
    }
    Ok(out)
}

pub fn set_tournament_season(conn: &Connection, tournament_id: i64, season: &str) -> Result<()> {
    let updated = conn
        .execute(
            "UPDATE tournaments SET season = ?1, updated_at = ?2 WHERE tournament_id = ?3",
            params![season.trim(), Utc::now().to_rfc3339(), tournament_id],
        )
        .context("update tournament season")?;
    if updated == 0 {
        return Err(anyhow!("unknown tournament id {tournament_id}"));
    }
    Ok(())
}

/// The tournament's configured season, or the reference year when none is set.
pub fn tournament_season_or_default(
    conn: &Connection,
    tournament_id: i64,
    reference_year: i32,
) -> Result<String> {
    let season = conn
        .query_row(
            "SELECT season FROM tournaments WHERE tournament_id = ?1",
            params![tournament_id],
            |row| row.get::<_, Option<String>>(0),
        )
        .optional()
        .context("query tournament season")?
        .flatten()
        .filter(|s| !s.trim().is_empty());
    Ok(season.unwrap_or_else(|| reference_year.to_string()))
}

/// Raises `current_round`; never lowers it.
pub fn advance_current_round(
    conn: &Connection,
    tournament_id: i64,
    round: i64,
) -> rusqlite::Result<()> {
    conn.execute(
        r#"
        UPDATE tournaments
        SET current_round = ?1, updated_at = ?2
        WHERE tournament_id = ?3 AND current_round < ?1
        "#,
        params![round, Utc::now().to_rfc3339(), tournament_id],
    )?;
    Ok(())
}

pub fn find_position_id(conn: &Connection, code: &str) -> rusqlite::Result<Option<i64>> {
    conn.query_row(
        "SELECT position_id FROM positions WHERE code = ?1 LIMIT 1",
        params![code],
        |row| row.get(0),
    )
    .optional()
}

pub fn ensure_position(conn: &Connection, code: &str, name: &str) -> Result<i64> {
    let code = code.trim();
    if code.is_empty() {
        return Err(anyhow!("position code must not be empty"));
    }
    conn.execute(
        "INSERT INTO positions (code, name) VALUES (?1, ?2) ON CONFLICT(code) DO UPDATE SET name = excluded.name",
        params![code, name.trim()],
    )
    .context("upsert position")?;
    find_position_id(conn, code)
        .context("query position")?
        .ok_or_else(|| anyhow!("position {code} missing after upsert"))
}

pub fn tournament_from_filename(filename: &str) -> Option<i64> {
    let lower = filename.to_lowercase();
    if lower.contains("mfl") {
        Some(0)
    } else if lower.contains("yfl1") || lower.contains("yfl-1") {
        Some(1)
    } else if lower.contains("yfl2") || lower.contains("yfl-2") {
        Some(2)
    } else if lower.contains("yfl3") || lower.contains("yfl-3") {
        Some(3)
    } else {
        None
    }
}

/// `mfl_30tur.xlsx` is round 30; anything else is a season file whose value
/// the caller has to supply.
pub fn period_from_filename(filename: &str) -> (PeriodKind, Option<String>) {
    let lower = filename.to_lowercase();
    match ROUND_IN_FILENAME.captures(&lower) {
        Some(caps) => (PeriodKind::Round, Some(caps[1].to_string())),
        None => (PeriodKind::Season, None),
    }
}

pub fn stat_kind_from_filename(filename: &str) -> StatKind {
    let lower = filename.to_lowercase();
    if lower.contains("90") {
        StatKind::Per90
    } else {
        StatKind::Total
    }
}

/// Rejects uploads whose file name points at another tournament.
pub fn check_tournament_matches_file(requested: i64, filename: &str) -> Result<()> {
    match tournament_from_filename(filename) {
        Some(detected) if detected != requested => Err(anyhow!(
            "file {filename} belongs to tournament {detected}, not {requested}"
        )),
        _ => Ok(()),
    }
}

fn tournament_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Tournament> {
    Ok(Tournament {
        tournament_id: row.get(0)?,
        name: row.get(1)?,
        full_name: row.get(2)?,
        short_code: row.get(3)?,
        season: row.get(4)?,
        current_round: row.get(5)?,
        is_active: row.get::<_, i64>(6)? != 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::open_in_memory;

    #[test]
    fn detects_tournament_from_filename() {
        assert_eq!(tournament_from_filename("MFL_season.xlsx"), Some(0));
        assert_eq!(tournament_from_filename("yfl-2_30tur.xlsx"), Some(2));
        assert_eq!(tournament_from_filename("yfl3.xlsx"), Some(3));
        assert_eq!(tournament_from_filename("cup.xlsx"), None);
    }

    #[test]
    fn detects_round_and_kind_from_filename() {
        assert_eq!(
            period_from_filename("mfl_30tur_average90min.xlsx"),
            (PeriodKind::Round, Some("30".to_string()))
        );
        assert_eq!(period_from_filename("mfl.xlsx"), (PeriodKind::Season, None));
        assert_eq!(stat_kind_from_filename("mfl_average_90min.xlsx"), StatKind::Per90);
        assert_eq!(stat_kind_from_filename("mfl.xlsx"), StatKind::Total);
    }

    #[test]
    fn mismatched_tournament_file_is_rejected() {
        assert!(check_tournament_matches_file(0, "mfl.xlsx").is_ok());
        assert!(check_tournament_matches_file(1, "export.xlsx").is_ok());
        assert!(check_tournament_matches_file(1, "yfl2.xlsx").is_err());
    }

    #[test]
    fn season_defaults_to_reference_year() {
        let conn = open_in_memory().expect("db");
        assert_eq!(
            tournament_season_or_default(&conn, 0, 2025).expect("season"),
            "2025"
        );
        set_tournament_season(&conn, 0, "2026").expect("set season");
        assert_eq!(
            tournament_season_or_default(&conn, 0, 2025).expect("season"),
            "2026"
        );
        assert!(set_tournament_season(&conn, 9, "2026").is_err());
    }

    #[test]
    fn current_round_only_moves_forward() {
        let conn = open_in_memory().expect("db");
        advance_current_round(&conn, 1, 12).expect("advance");
        advance_current_round(&conn, 1, 7).expect("advance");
        let t = get_tournament(&conn, 1).expect("query").expect("exists");
        assert_eq!(t.current_round, 12);
        assert_eq!(t.short_code, "YFL1");
    }

    #[test]
    fn ensure_position_is_idempotent() {
        let conn = open_in_memory().expect("db");
        let first = ensure_position(&conn, "SS", "Second striker").expect("insert");
        let second = ensure_position(&conn, "SS", "Second striker").expect("upsert");
        assert_eq!(first, second);
        assert_eq!(find_position_id(&conn, "XX").expect("query"), None);
    }
}
