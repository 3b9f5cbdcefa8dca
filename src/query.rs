//! Read side: paged player tables for one slice, plus summary and admin
//! helpers.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use anyhow::{Context, Result, anyhow};
use rusqlite::{Connection, params};
use serde::Serialize;
use tracing::info;

use crate::metrics_catalog::{MetricCatalog, PercentScale};
use crate::slice::{PeriodKind, StatKind, StatSlice, get_slice, latest_slice};

pub const DEFAULT_PER_PAGE: usize = 50;
pub const MAX_PER_PAGE: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SliceSelector {
    Id(i64),
    Latest {
        stat_kind: StatKind,
        period_kind: PeriodKind,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortKey {
    Name,
    Team,
    BirthYear,
    /// A catalog metric code.
    Metric(String),
}

impl SortKey {
    /// `name`, `team`, `birth_year`, anything else is taken as a metric code.
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "name" | "full_name" => SortKey::Name,
            "team" | "team_name" => SortKey::Team,
            "birth_year" => SortKey::BirthYear,
            code => SortKey::Metric(code.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerQuery {
    pub tournament_id: i64,
    pub slice: SliceSelector,
    pub team: Option<String>,
    pub position: Option<String>,
    pub name_contains: Option<String>,
    pub sort: SortKey,
    pub descending: bool,
    /// 1-based.
    pub page: usize,
    pub per_page: usize,
}

impl PlayerQuery {
    /// Latest season totals, sorted by name.
    pub fn new(tournament_id: i64) -> Self {
        Self {
            tournament_id,
            slice: SliceSelector::Latest {
                stat_kind: StatKind::Total,
                period_kind: PeriodKind::Season,
            },
            team: None,
            position: None,
            name_contains: None,
            sort: SortKey::Name,
            descending: false,
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }

    pub fn slice(mut self, slice: SliceSelector) -> Self {
        self.slice = slice;
        self
    }

    pub fn team(mut self, team: &str) -> Self {
        self.team = Some(team.to_string());
        self
    }

    pub fn position(mut self, code: &str) -> Self {
        self.position = Some(code.to_string());
        self
    }

    pub fn name_contains(mut self, needle: &str) -> Self {
        self.name_contains = Some(needle.to_string());
        self
    }

    pub fn sort_by(mut self, key: SortKey, descending: bool) -> Self {
        self.sort = key;
        self.descending = descending;
        self
    }

    pub fn page(mut self, page: usize, per_page: usize) -> Self {
        self.page = page;
        self.per_page = per_page;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerRow {
    pub player_id: i64,
    pub full_name: String,
    pub team_name: String,
    pub position_code: String,
    pub birth_year: Option<i64>,
    pub height: Option<i64>,
    pub weight: Option<i64>,
    pub citizenship: Option<String>,
    /// Metric code → display value.
    pub metrics: BTreeMap<String, f64>,
}

impl PlayerRow {
    pub fn metric(&self, code: &str) -> Option<f64> {
        self.metrics.get(code).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerPage {
    /// `None` when no slice matched the selector.
    pub slice: Option<StatSlice>,
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
    pub rows: Vec<PlayerRow>,
}

impl PlayerPage {
    pub fn total_pages(&self) -> usize {
        self.total.div_ceil(self.per_page.max(1))
    }
}

pub fn query_players(
    conn: &Connection,
    catalog: &MetricCatalog,
    scale: PercentScale,
    query: &PlayerQuery,
) -> Result<PlayerPage> {
    if let SortKey::Metric(code) = &query.sort {
        if catalog.resolve(code).is_none() {
            return Err(anyhow!("unknown sort metric `{code}`"));
        }
    }
    let page = query.page.max(1);
    let per_page = query.per_page.clamp(1, MAX_PER_PAGE);

    let slice = match &query.slice {
        SliceSelector::Id(id) => {
            let slice = get_slice(conn, *id)?.ok_or_else(|| anyhow!("unknown slice id {id}"))?;
            if slice.tournament_id != query.tournament_id {
                return Err(anyhow!(
                    "slice {id} belongs to tournament {}, not {}",
                    slice.tournament_id,
                    query.tournament_id
                ));
            }
            Some(slice)
        }
        SliceSelector::Latest {
            stat_kind,
            period_kind,
        } => latest_slice(conn, query.tournament_id, *stat_kind, *period_kind)?,
    };
    let Some(slice) = slice else {
        return Ok(PlayerPage {
            slice: None,
            total: 0,
            page,
            per_page,
            rows: Vec::new(),
        });
    };

    let mut rows = players_in_slice(conn, query.tournament_id, slice.slice_id)?;
    let team = query.team.as_deref().map(|t| t.trim().to_lowercase());
    let position = query.position.as_deref().map(str::trim);
    let needle = query.name_contains.as_deref().map(|n| n.trim().to_lowercase());
    rows.retain(|row| {
        team.as_deref()
            .is_none_or(|t| row.team_name.to_lowercase() == t)
            && position.is_none_or(|p| row.position_code == p)
            && needle
                .as_deref()
                .is_none_or(|n| row.full_name.to_lowercase().contains(n))
    });

    let mut values = slice_metric_values(conn, slice.slice_id)?;
    for row in rows.iter_mut() {
        if let Some(stored) = values.remove(&row.player_id) {
            row.metrics = stored
                .into_iter()
                .map(|(code, value)| {
                    let shown = catalog
                        .resolve(&code)
                        .map_or(value, |def| def.display_value(value, scale));
                    (code, shown)
                })
                .collect();
        }
    }

    sort_rows(&mut rows, &query.sort, query.descending);
    let total = rows.len();
    let rows = rows
        .into_iter()
        .skip((page - 1).saturating_mul(per_page))
        .take(per_page)
        .collect();

    Ok(PlayerPage {
        slice: Some(slice),
        total,
        page,
        per_page,
        rows,
    })
}

fn players_in_slice(conn: &Connection, tournament_id: i64, slice_id: i64) -> Result<Vec<PlayerRow>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT p.player_id, p.full_name, p.team_name, pos.code, p.birth_year,
                   p.height, p.weight, p.citizenship
            FROM players p
            JOIN positions pos ON pos.position_id = p.position_id
            WHERE p.tournament_id = ?1
              AND EXISTS (
                  SELECT 1 FROM player_statistics s
                  WHERE s.player_id = p.player_id AND s.slice_id = ?2
              )
            "#,
        )
        .context("prepare slice players query")?;
    let rows = stmt
        .query_map(params![tournament_id, slice_id], |row| {
            Ok(PlayerRow {
                player_id: row.get(0)?,
                full_name: row.get(1)?,
                team_name: row.get(2)?,
                position_code: row.get(3)?,
                birth_year: row.get(4)?,
                height: row.get(5)?,
                weight: row.get(6)?,
                citizenship: row.get(7)?,
                metrics: BTreeMap::new(),
            })
        })
        .context("query slice players")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode player row")?);
    }
    Ok(out)
}

fn slice_metric_values(
    conn: &Connection,
    slice_id: i64,
) -> Result<HashMap<i64, Vec<(String, f64)>>> {
    let mut stmt = conn
        .prepare(
            "SELECT player_id, metric_code, metric_value FROM player_statistics WHERE slice_id = ?1",
        )
        .context("prepare slice metrics query")?;
    let rows = stmt
        .query_map(params![slice_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
            ))
        })
        .context("query slice metrics")?;

    let mut out: HashMap<i64, Vec<(String, f64)>> = HashMap::new();
    for row in rows {
        let (player_id, code, value) = row.context("decode metric row")?;
        out.entry(player_id).or_default().push((code, value));
    }
    Ok(out)
}

fn sort_rows(rows: &mut [PlayerRow], key: &SortKey, descending: bool) {
    let directed = |ord: Ordering| if descending { ord.reverse() } else { ord };
    rows.sort_by(|a, b| {
        let primary = match key {
            SortKey::Name => directed(a.full_name.cmp(&b.full_name)),
            SortKey::Team => directed(a.team_name.cmp(&b.team_name)),
            SortKey::BirthYear => nulls_last(a.birth_year, b.birth_year, |x, y| directed(x.cmp(&y))),
            SortKey::Metric(code) => nulls_last(a.metric(code), b.metric(code), |x, y| {
                directed(x.total_cmp(&y))
            }),
        };
        primary.then(a.player_id.cmp(&b.player_id))
    });
}

fn nulls_last<T>(a: Option<T>, b: Option<T>, cmp: impl Fn(T, T) -> Ordering) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => cmp(x, y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StatsSummary {
    pub players: usize,
    pub slices: usize,
    pub statistics: usize,
}

pub fn stats_summary(conn: &Connection, tournament_id: i64) -> Result<StatsSummary> {
    let count = |sql: &str| -> Result<usize> {
        conn.query_row(sql, params![tournament_id], |row| row.get::<_, i64>(0))
            .map(|n| n as usize)
            .with_context(|| format!("count: {sql}"))
    };
    Ok(StatsSummary {
        players: count("SELECT COUNT(*) FROM players WHERE tournament_id = ?1")?,
        slices: count("SELECT COUNT(*) FROM stat_slices WHERE tournament_id = ?1")?,
        statistics: count(
            "SELECT COUNT(*) FROM player_statistics s \
             JOIN stat_slices sl ON sl.slice_id = s.slice_id \
             WHERE sl.tournament_id = ?1",
        )?,
    })
}

/// Removes every player of the tournament; their metric values cascade.
pub fn delete_tournament_players(conn: &Connection, tournament_id: i64) -> Result<usize> {
    let deleted = conn
        .execute(
            "DELETE FROM players WHERE tournament_id = ?1",
            params![tournament_id],
        )
        .context("delete tournament players")?;
    info!(tournament_id, deleted, "deleted tournament players");
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: i64, name: &str, goals: Option<f64>) -> PlayerRow {
        PlayerRow {
            player_id: id,
            full_name: name.to_string(),
            team_name: "CSKA".to_string(),
            position_code: "FW".to_string(),
            birth_year: None,
            height: None,
            weight: None,
            citizenship: None,
            metrics: goals.map(|g| ("goals".to_string(), g)).into_iter().collect(),
        }
    }

    fn ids(rows: &[PlayerRow]) -> Vec<i64> {
        rows.iter().map(|r| r.player_id).collect()
    }

    #[test]
    fn metric_sort_keeps_missing_values_last_both_ways() {
        let mut rows = vec![
            row(1, "A", None),
            row(2, "B", Some(3.0)),
            row(3, "C", Some(7.0)),
            row(4, "D", Some(3.0)),
        ];
        let key = SortKey::Metric("goals".to_string());
        sort_rows(&mut rows, &key, true);
        assert_eq!(ids(&rows), vec![3, 2, 4, 1]);
        sort_rows(&mut rows, &key, false);
        assert_eq!(ids(&rows), vec![2, 4, 3, 1]);
    }

    #[test]
    fn sort_key_parse() {
        assert_eq!(SortKey::parse("team"), SortKey::Team);
        assert_eq!(SortKey::parse(" xg "), SortKey::Metric("xg".to_string()));
    }

    #[test]
    fn total_pages_rounds_up() {
        let page = PlayerPage {
            slice: None,
            total: 101,
            page: 1,
            per_page: 50,
            rows: Vec::new(),
        };
        assert_eq!(page.total_pages(), 3);
    }
}
