//! Player identity resolution.
//!
//! A player is the tuple (full name, birth year, team, tournament). The same
//! person at a different team is a different row; that keeps separate stat
//! lines for each club spell.

use chrono::Utc;
use rusqlite::{OptionalExtension, Transaction, params};
use tracing::warn;

use crate::cell::{RowRecord, columns};
use crate::error::{RowError, SkipReason};
use crate::tournament::find_position_id;

/// Values from the age column at or above this are birth years, not ages.
const BIRTH_YEAR_FLOOR: i64 = 1900;

/// Identity and profile fields extracted from one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerProfile {
    pub full_name: String,
    pub team_name: String,
    pub position_code: String,
    pub birth_year: Option<i64>,
    pub height: Option<i64>,
    pub weight: Option<i64>,
    pub citizenship: Option<String>,
}

impl PlayerProfile {
    pub fn from_row(row: &RowRecord, reference_year: i32) -> Result<Self, SkipReason> {
        let full_name = required_text(row, columns::PLAYER_NAME)?;
        let team_name = required_text(row, columns::TEAM_NAME)?;
        let position_code = required_text(row, columns::POSITION)?;

        let age_or_year = match row.get(columns::AGE) {
            Some(cell) => cell
                .as_whole_number()
                .map_err(|value| SkipReason::InvalidField {
                    column: columns::AGE,
                    value,
                })?,
            None => None,
        };

        Ok(Self {
            full_name,
            team_name,
            position_code,
            birth_year: birth_year_from(age_or_year, reference_year),
            height: optional_whole(row, columns::HEIGHT),
            weight: optional_whole(row, columns::WEIGHT),
            citizenship: row.text(columns::CITIZENSHIP),
        })
    }
}

/// `reference_year - age` for a positive age; a four-digit value is taken as
/// the birth year itself.
pub fn birth_year_from(age_or_year: Option<i64>, reference_year: i32) -> Option<i64> {
    match age_or_year {
        Some(v) if v >= BIRTH_YEAR_FLOOR => Some(v),
        Some(v) if v > 0 => Some(i64::from(reference_year) - v),
        _ => None,
    }
}

/// Finds or creates the player and returns its id.
///
/// On a match the position is overwritten and height, weight and citizenship
/// are only replaced by non-null values.
pub fn resolve_player(
    tx: &Transaction<'_>,
    profile: &PlayerProfile,
    tournament_id: i64,
) -> Result<i64, RowError> {
    let position_id = find_position_id(tx, &profile.position_code)?
        .ok_or_else(|| SkipReason::UnknownPosition(profile.position_code.clone()))?;
    let now = Utc::now().to_rfc3339();

    let existing = tx
        .query_row(
            r#"
            SELECT player_id
            FROM players
            WHERE full_name = ?1
              AND birth_year IS ?2
              AND team_name = ?3
              AND tournament_id = ?4
            LIMIT 1
            "#,
            params![
                profile.full_name,
                profile.birth_year,
                profile.team_name,
                tournament_id
            ],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;

    if let Some(player_id) = existing {
        tx.execute(
            r#"
            UPDATE players SET
                position_id = ?1,
                height = COALESCE(?2, height),
                weight = COALESCE(?3, weight),
                citizenship = COALESCE(?4, citizenship),
                updated_at = ?5
            WHERE player_id = ?6
            "#,
            params![
                position_id,
                profile.height,
                profile.weight,
                profile.citizenship,
                now,
                player_id
            ],
        )?;
        return Ok(player_id);
    }

    tx.execute(
        r#"
        INSERT INTO players (
            full_name, birth_year, team_name, tournament_id, position_id,
            height, weight, citizenship, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
        "#,
        params![
            profile.full_name,
            profile.birth_year,
            profile.team_name,
            tournament_id,
            position_id,
            profile.height,
            profile.weight,
            profile.citizenship,
            now
        ],
    )?;
    Ok(tx.last_insert_rowid())
}

fn required_text(row: &RowRecord, column: &'static str) -> Result<String, SkipReason> {
    row.text(column)
        .filter(|s| !s.is_empty())
        .ok_or(SkipReason::MissingField(column))
}

fn optional_whole(row: &RowRecord, column: &'static str) -> Option<i64> {
    let cell = row.get(column)?;
    match cell.as_whole_number() {
        Ok(v) => v.filter(|n| *n > 0),
        Err(raw) => {
            warn!(column, value = %raw, "ignoring unparseable profile value");
            None
        }
    }
}
