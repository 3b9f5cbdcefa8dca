use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::Connection;

const BUSY_TIMEOUT_SECS: u64 = 30;

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    conn.busy_timeout(Duration::from_secs(BUSY_TIMEOUT_SECS))
        .context("set busy timeout")?;
    conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get::<_, String>(0))
        .context("enable wal")?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS tournaments (
            tournament_id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            full_name TEXT NOT NULL,
            short_code TEXT NOT NULL UNIQUE,
            season TEXT NULL,
            current_round INTEGER NOT NULL DEFAULT 0,
            is_active INTEGER NOT NULL DEFAULT 1,
            updated_at TEXT NULL
        );

        CREATE TABLE IF NOT EXISTS positions (
            position_id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS players (
            player_id INTEGER PRIMARY KEY AUTOINCREMENT,
            full_name TEXT NOT NULL,
            birth_year INTEGER NULL,
            team_name TEXT NOT NULL,
            tournament_id INTEGER NOT NULL REFERENCES tournaments(tournament_id),
            position_id INTEGER NOT NULL REFERENCES positions(position_id),
            height INTEGER NULL,
            weight INTEGER NULL,
            citizenship TEXT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (full_name, birth_year, team_name, tournament_id)
        );
        CREATE INDEX IF NOT EXISTS idx_players_tournament ON players(tournament_id);
        CREATE INDEX IF NOT EXISTS idx_players_team ON players(team_name);

        CREATE TABLE IF NOT EXISTS metrics_catalog (
            metric_code TEXT PRIMARY KEY,
            source_label TEXT NOT NULL,
            display_name TEXT NOT NULL,
            data_type TEXT NOT NULL,
            is_key_metric INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS stat_slices (
            slice_id INTEGER PRIMARY KEY AUTOINCREMENT,
            tournament_id INTEGER NOT NULL REFERENCES tournaments(tournament_id),
            slice_type TEXT NOT NULL,
            period_type TEXT NOT NULL,
            period_value TEXT NULL,
            description TEXT NULL,
            revision INTEGER NOT NULL DEFAULT 0,
            uploaded_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_slices_lookup
            ON stat_slices(tournament_id, slice_type, period_type, period_value);

        CREATE TABLE IF NOT EXISTS player_statistics (
            player_id INTEGER NOT NULL REFERENCES players(player_id) ON DELETE CASCADE,
            slice_id INTEGER NOT NULL REFERENCES stat_slices(slice_id) ON DELETE CASCADE,
            metric_code TEXT NOT NULL,
            metric_value REAL NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (player_id, slice_id, metric_code)
        );
        CREATE INDEX IF NOT EXISTS idx_stats_slice_metric
            ON player_statistics(slice_id, metric_code);

        CREATE TABLE IF NOT EXISTS ingest_runs (
            run_id INTEGER PRIMARY KEY AUTOINCREMENT,
            started_at TEXT NOT NULL,
            finished_at TEXT NOT NULL,
            tournament_id INTEGER NOT NULL,
            slice_id INTEGER NOT NULL,
            slice_revision INTEGER NOT NULL,
            rows_total INTEGER NOT NULL,
            players_loaded INTEGER NOT NULL,
            stats_loaded INTEGER NOT NULL,
            skipped_json TEXT NOT NULL
        );

        INSERT INTO tournaments (tournament_id, name, full_name, short_code) VALUES
            (0, 'МФЛ', 'Молодежная Футбольная Лига', 'MFL'),
            (1, 'ЮФЛ-1', 'Юношеская Футбольная Лига - Первенство 1', 'YFL1'),
            (2, 'ЮФЛ-2', 'Юношеская Футбольная Лига - Первенство 2', 'YFL2'),
            (3, 'ЮФЛ-3', 'Юношеская Футбольная Лига - Первенство 3', 'YFL3')
        ON CONFLICT(tournament_id) DO NOTHING;

        INSERT INTO positions (code, name) VALUES
            ('GK', 'Goalkeeper'),
            ('DF', 'Defender'),
            ('CB', 'Centre back'),
            ('LB', 'Left back'),
            ('RB', 'Right back'),
            ('LWB', 'Left wing back'),
            ('RWB', 'Right wing back'),
            ('MF', 'Midfielder'),
            ('DM', 'Defensive midfielder'),
            ('CM', 'Central midfielder'),
            ('AM', 'Attacking midfielder'),
            ('LM', 'Left midfielder'),
            ('RM', 'Right midfielder'),
            ('LW', 'Left winger'),
            ('RW', 'Right winger'),
            ('FW', 'Forward'),
            ('CF', 'Centre forward'),
            ('ST', 'Striker')
        ON CONFLICT(code) DO NOTHING;
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_schema_is_idempotent_and_seeds_reference_rows() {
        let conn = open_in_memory().expect("open db");
        init_schema(&conn).expect("second init");

        let tournaments: i64 = conn
            .query_row("SELECT COUNT(*) FROM tournaments", [], |row| row.get(0))
            .expect("count tournaments");
        assert_eq!(tournaments, 4);

        let positions: i64 = conn
            .query_row("SELECT COUNT(*) FROM positions WHERE code = 'FW'", [], |row| {
                row.get(0)
            })
            .expect("count positions");
        assert_eq!(positions, 1);
    }

    #[test]
    fn open_db_creates_parent_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("stats.sqlite");
        let conn = open_db(&path).expect("open file db");
        drop(conn);
        assert!(path.exists());
    }
}
