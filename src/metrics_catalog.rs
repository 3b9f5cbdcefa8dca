//! Registry of the metric columns found in the source workbooks.

use std::collections::HashMap;

use anyhow::{Context, Result};
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use tracing::info;

/// How a metric's numbers behave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricKind {
    Integer,
    Percentage,
    Float,
}

impl MetricKind {
    /// Upper-case label stored in `metrics_catalog.data_type`.
    pub fn as_db_str(self) -> &'static str {
        match self {
            MetricKind::Integer => "INTEGER",
            MetricKind::Percentage => "PERCENTAGE",
            MetricKind::Float => "FLOAT",
        }
    }

    pub fn from_db_str(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "INTEGER" => Some(MetricKind::Integer),
            "PERCENTAGE" => Some(MetricKind::Percentage),
            "FLOAT" => Some(MetricKind::Float),
            _ => None,
        }
    }
}

/// Scale of percentage values in the uploaded files. Stored values keep the
/// source scale; only the read side converts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PercentScale {
    /// `0.75` means 75%.
    #[default]
    Fraction,
    /// `75.0` means 75%.
    Points,
}

impl PercentScale {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "fraction" | "fractions" => Some(PercentScale::Fraction),
            "points" | "percent" => Some(PercentScale::Points),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricDef {
    pub code: &'static str,
    /// Column header in the source workbook.
    pub label: &'static str,
    pub display_name: &'static str,
    pub kind: MetricKind,
    pub is_key: bool,
}

impl MetricDef {
    /// Converts a stored value to what a reader should see.
    pub fn display_value(&self, stored: f64, scale: PercentScale) -> f64 {
        match (self.kind, scale) {
            (MetricKind::Percentage, PercentScale::Fraction) => stored * 100.0,
            _ => stored,
        }
    }
}

const KEY_METRICS: &[&str] = &[
    "goals",
    "assists",
    "xg",
    "xa",
    "shots",
    "shots_on_target",
    "passes_accurate_pct",
    "duels_success_pct",
    "minutes",
    "index",
];

use MetricKind::{Float, Integer, Percentage};

// (code, workbook column, display name, kind)
const STANDARD_METRICS: &[(&str, &str, &str, MetricKind)] = &[
    ("index", "Index", "Индекс", Integer),
    ("minutes", "Минут на поле", "Минуты", Integer),
    ("goal_errors", "Голевые ошибки", "Голевые ошибки", Integer),
    ("gross_errors", "Грубые ошибки", "Грубые ошибки", Integer),
    ("goals", "Голы", "Голы", Integer),
    ("assists", "Передачи голевые", "Передачи голевые", Integer),
    ("goal_chances", "Голевые моменты", "Голевые моменты", Integer),
    ("goal_chances_success", "Голевые моменты удачные", "Голевые моменты удачные", Integer),
    ("goal_chances_success_pct", "Голевые моменты удачные, %", "Голевые моменты удачные, %", Percentage),
    ("goal_chances_created", "Голевые моменты создал", "Голевые моменты создал", Integer),
    ("goal_attacks", "Участие в голевых атаках", "Участие в голевых атаках", Integer),
    ("shots", "Удары", "Удары", Integer),
    ("shots_on_target", "Удары в створ", "Удары в створ", Integer),
    ("shots_accurate_pct", "Удары точные, %", "Удары точные, %", Percentage),
    ("shots_off_target", "Удары мимо", "Удары мимо", Integer),
    ("shots_blocked", "Удары перехваченные", "Удары перехваченные", Integer),
    ("shots_head", "Удары головой", "Удары головой", Integer),
    ("shots_woodwork", "Удары в каркас ворот", "Удары в каркас", Integer),
    ("yellow_cards", "Желтые карточки", "Желтые карточки", Integer),
    ("red_cards", "Красные карточки", "Красные карточки", Integer),
    ("fouls", "Фолы", "Фолы", Integer),
    ("fouls_on_player", "Фолы на игроке", "Фолы на игроке", Integer),
    ("passes", "Передачи", "Передачи", Integer),
    ("passes_accurate", "Передачи точные", "Передачи точные", Integer),
    ("passes_accurate_pct", "Передачи точные, %", "Передачи точные, %", Percentage),
    ("key_passes", "Передачи ключевые", "Передачи ключевые", Integer),
    ("key_passes_accurate", "Передачи ключевые точные", "Передачи ключевые точные", Integer),
    ("key_passes_accurate_pct", "Передачи ключевые точные, %", "Передачи ключевые точные, %", Percentage),
    ("crosses", "Навесы", "Навесы", Integer),
    ("crosses_accurate", "Навесы точные", "Навесы точные", Integer),
    ("crosses_accurate_pct", "Навесы точные, %", "Навесы точные, %", Percentage),
    ("progressive_passes", "Передачи прогрессивные", "Передачи прогрессивные", Integer),
    ("progressive_passes_accurate", "Передачи прогрессивные точные", "Передачи прогрессивные точные", Integer),
    ("progressive_passes_accurate_pct", "Передачи прогрессивные точные, %", "Передачи прогрессивные точные, %", Percentage),
    ("progressive_passes_clean", "Передачи прогрессивные чистые", "Передачи прогрессивные чистые", Integer),
    ("long_passes", "Передачи длинные", "Передачи длинные", Integer),
    ("long_passes_accurate", "Передачи длинные точные", "Передачи длинные точные", Integer),
    ("long_passes_accurate_pct", "Передачи длинные точные, %", "Передачи длинные точные, %", Percentage),
    ("super_long_passes", "Передачи сверхдлинные", "Передачи сверхдлинные", Integer),
    ("super_long_passes_accurate", "Передачи сверхдлинные точные", "Передачи сверхдлинные точные", Integer),
    ("super_long_passes_accurate_pct", "Передачи сверхдлинные точные, %", "Передачи сверхдлинные точные, %", Percentage),
    ("passes_to_final_third", "Передачи вперед в финальную треть", "Передачи в финальную треть", Integer),
    ("passes_to_final_third_accurate", "Передачи вперед в финальную треть точные", "Передачи в финальную треть точные", Integer),
    ("passes_to_final_third_accurate_pct", "Передачи вперед в финальную треть точные, %", "Передачи в финальную треть точные, %", Percentage),
    ("passes_to_penalty_area", "Передачи в штрафную", "Передачи в штрафную", Integer),
    ("passes_to_penalty_area_accurate", "Передачи в штрафную точные", "Передачи в штрафную точные", Integer),
    ("passes_to_penalty_area_accurate_pct", "Передачи в штрафную точные, %", "Передачи в штрафную точные, %", Percentage),
    ("passes_for_shot", "Передачи под удар", "Передачи под удар", Integer),
    ("duels", "Единоборства", "Единоборства", Integer),
    ("duels_success", "Единоборства удачные", "Единоборства удачные", Integer),
    ("duels_success_pct", "Единоборства удачные, %", "Единоборства удачные, %", Percentage),
    ("duels_unsuccessful", "Единоборства неудачные", "Единоборства неудачные", Integer),
    ("defensive_duels", "Единоборства в обороне", "Единоборства в обороне", Integer),
    ("defensive_duels_success", "Единоборства в обороне удачные", "Единоборства в обороне удачные", Integer),
    ("defensive_duels_success_pct", "Единоборства в обороне удачные, %", "Единоборства в обороне удачные, %", Percentage),
    ("offensive_duels", "Единоборства в атаке", "Единоборства в атаке", Integer),
    ("offensive_duels_success", "Единоборства в атаке удачные", "Единоборства в атаке удачные", Integer),
    ("offensive_duels_success_pct", "Единоборства в атаке удачные, %", "Единоборства в атаке удачные, %", Percentage),
    ("aerial_duels", "Единоборства вверху", "Единоборства вверху", Integer),
    ("aerial_duels_success", "Единоборства вверху удачные", "Единоборства вверху удачные", Integer),
    ("aerial_duels_success_pct", "Единоборства вверху удачные, %", "Единоборства вверху удачные, %", Percentage),
    ("dribbles", "Обводки", "Обводки", Integer),
    ("dribbles_success", "Обводки удачные", "Обводки удачные", Integer),
    ("dribbles_success_pct", "Обводки удачные, %", "Обводки удачные, %", Percentage),
    ("dribbles_unsuccessful", "Обводки неудачные", "Обводки неудачные", Integer),
    ("dribbles_final_third", "Обводки в финальной трети", "Обводки в финальной трети", Integer),
    ("dribbles_final_third_success", "Обводки в финальной трети удачные", "Обводки в финальной трети удачные", Integer),
    ("dribbles_final_third_success_pct", "Обводки в финальной трети удачные, %", "Обводки в финальной трети удачные, %", Percentage),
    ("tackles", "Отборы", "Отборы", Integer),
    ("tackles_success", "Отборы удачные", "Отборы удачные", Integer),
    ("tackles_success_pct", "Отборы удачные, %", "Отборы удачные, %", Percentage),
    ("interceptions", "Перехваты", "Перехваты", Integer),
    ("recoveries", "Подборы", "Подборы", Integer),
    ("matches_played", "Матчей сыграно", "Матчей сыграно", Integer),
    ("starting_lineup", "Появление в стартовом составе", "В старте", Integer),
    ("substituted_off", "Был заменен", "Был заменен", Integer),
    ("substituted_on", "Вышел на замену", "Вышел на замену", Integer),
    ("ttd_total", "ТТД", "ТТД", Integer),
    ("ttd_success", "ТТД удачные", "ТТД удачные", Integer),
    ("ttd_success_pct", "ТТД удачные, %", "ТТД удачные, %", Percentage),
    ("ttd_unsuccessful", "ТТД неудачные", "ТТД неудачные", Integer),
    ("ttd_in_opponent_box", "ТТД в штрафной соперника", "ТТД в штрафной", Integer),
    ("ttd_in_opponent_box_success", "ТТД в штрафной соперника удачные", "ТТД в штрафной удачные", Integer),
    ("ttd_in_opponent_box_success_pct", "ТТД в штрафной соперника удачные, %", "ТТД в штрафной удачные, %", Percentage),
    ("final_third_entries", "Входы в финальную треть", "Входы в фин. треть", Integer),
    ("final_third_entries_pass", "Входы в финальную треть через пас", "Входы через пас", Integer),
    ("final_third_entries_pass_pct", "Входы в финальную треть через пас, % от всего", "Входы через пас, %", Percentage),
    ("final_third_entries_dribble", "Входы в финальную треть через продвижение", "Входы через продвижение", Integer),
    ("final_third_entries_dribble_pct", "Входы в финальную треть через продвижение, % от всего", "Входы через продвижение, %", Percentage),
    ("losses", "Потери", "Потери", Integer),
    ("losses_own_half", "Потери мяча на своей половине", "Потери на своей половине", Integer),
    ("losses_passes", "Потери при передачах", "Потери при передачах", Integer),
    ("losses_individual", "Потери индивидуальные", "Потери индивидуальные", Integer),
    ("bad_touches", "Обработки мяча неудачные", "Обработки неудачные", Integer),
    ("offsides", "Офсайды", "Офсайды", Integer),
    ("ball_recoveries", "Овладевания мячом", "Овладевания мячом", Integer),
    ("ball_recoveries_opponent_half", "Овладевания мячом на половине поля соперника", "Овладевания на чужой половине", Integer),
    ("carries", "Ведения мяча", "Ведения мяча", Integer),
    ("xg", "xG (ожидаемые голы)", "xG", Float),
    ("xa", "xA (ожидаемые передачи)", "xA", Float),
];

/// Immutable metric registry. Build once at startup and pass by reference.
#[derive(Debug, Clone)]
pub struct MetricCatalog {
    metrics: Vec<MetricDef>,
    by_code: HashMap<&'static str, usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CatalogSyncReport {
    pub added: usize,
    pub updated: usize,
}

impl MetricCatalog {
    /// The metric set of the league exports.
    pub fn standard() -> Self {
        Self::from_defs(
            STANDARD_METRICS
                .iter()
                .map(|&(code, label, display_name, kind)| MetricDef {
                    code,
                    label,
                    display_name,
                    kind,
                    is_key: KEY_METRICS.contains(&code),
                })
                .collect(),
        )
    }

    /// Later duplicates of a code are ignored.
    pub fn from_defs(defs: Vec<MetricDef>) -> Self {
        let mut metrics = Vec::with_capacity(defs.len());
        let mut by_code = HashMap::with_capacity(defs.len());
        for def in defs {
            if by_code.contains_key(def.code) {
                continue;
            }
            by_code.insert(def.code, metrics.len());
            metrics.push(def);
        }
        Self { metrics, by_code }
    }

    pub fn resolve(&self, code: &str) -> Option<&MetricDef> {
        self.by_code.get(code).map(|idx| &self.metrics[*idx])
    }

    pub fn all_codes(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.metrics.iter().map(|m| m.code)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetricDef> {
        self.metrics.iter()
    }

    pub fn key_metrics(&self) -> impl Iterator<Item = &MetricDef> {
        self.metrics.iter().filter(|m| m.is_key)
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

/// Upserts every catalog entry by code in its own transaction. Safe to re-run.
pub fn sync_catalog(conn: &mut Connection, catalog: &MetricCatalog) -> Result<CatalogSyncReport> {
    let tx = conn.transaction().context("begin catalog sync transaction")?;
    let report = upsert_catalog(&tx, catalog)?;
    tx.commit().context("commit catalog sync transaction")?;
    info!(added = report.added, updated = report.updated, "metric catalog synced");
    Ok(report)
}

/// Upserts every catalog entry on `conn` without committing; callers own the
/// surrounding transaction.
pub fn upsert_catalog(conn: &Connection, catalog: &MetricCatalog) -> Result<CatalogSyncReport> {
    let mut report = CatalogSyncReport::default();
    for def in catalog.iter() {
        let exists = conn
            .query_row(
                "SELECT COUNT(*) FROM metrics_catalog WHERE metric_code = ?1",
                params![def.code],
                |row| row.get::<_, i64>(0),
            )
            .context("look up catalog entry")?
            > 0;
        conn.execute(
            r#"
            INSERT INTO metrics_catalog (metric_code, source_label, display_name, data_type, is_key_metric)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(metric_code) DO UPDATE SET
                source_label = excluded.source_label,
                display_name = excluded.display_name,
                data_type = excluded.data_type,
                is_key_metric = excluded.is_key_metric
            "#,
            params![
                def.code,
                def.label,
                def.display_name,
                def.kind.as_db_str(),
                def.is_key as i64
            ],
        )
        .with_context(|| format!("upsert catalog entry {}", def.code))?;
        if exists {
            report.updated += 1;
        } else {
            report.added += 1;
        }
    }
    Ok(report)
}

/// Fills an empty persisted catalog. Runs on the caller's connection or
/// transaction, so a rolled-back batch leaves no catalog rows behind.
pub fn ensure_catalog(conn: &Connection, catalog: &MetricCatalog) -> Result<()> {
    let count = conn
        .query_row("SELECT COUNT(*) FROM metrics_catalog", [], |row| {
            row.get::<_, i64>(0)
        })
        .context("count catalog entries")?;
    if count == 0 {
        let report = upsert_catalog(conn, catalog)?;
        info!(added = report.added, "metric catalog seeded");
    }
    Ok(())
}
