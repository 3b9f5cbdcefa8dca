use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::metrics_catalog::MetricCatalog;
use crate::query::PlayerPage;

const PLAYER_COLUMNS: [&str; 8] = [
    "Player ID",
    "Player",
    "Team",
    "Position",
    "Birth Year",
    "Height",
    "Weight",
    "Citizenship",
];

pub struct ExportReport {
    pub players: usize,
    pub metric_columns: usize,
}

/// Writes the page to a single "Players" worksheet. Metric columns follow
/// catalog order and only include metrics that have a value on the page.
pub fn export_player_page(
    path: &Path,
    catalog: &MetricCatalog,
    page: &PlayerPage,
) -> Result<ExportReport> {
    let metrics = catalog
        .iter()
        .filter(|def| page.rows.iter().any(|row| row.metrics.contains_key(def.code)))
        .collect::<Vec<_>>();

    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Players")?;

        let header = PLAYER_COLUMNS
            .iter()
            .map(|s| s.to_string())
            .chain(metrics.iter().map(|def| def.display_name.to_string()))
            .collect::<Vec<_>>();
        write_header(sheet, &header)?;

        for (idx, row) in page.rows.iter().enumerate() {
            let r = idx as u32 + 1;
            write_text(sheet, r, 0, &row.player_id.to_string())?;
            write_text(sheet, r, 1, &row.full_name)?;
            write_text(sheet, r, 2, &row.team_name)?;
            write_text(sheet, r, 3, &row.position_code)?;
            write_opt_number(sheet, r, 4, row.birth_year.map(|v| v as f64))?;
            write_opt_number(sheet, r, 5, row.height.map(|v| v as f64))?;
            write_opt_number(sheet, r, 6, row.weight.map(|v| v as f64))?;
            write_text(sheet, r, 7, row.citizenship.as_deref().unwrap_or(""))?;
            for (offset, def) in metrics.iter().enumerate() {
                let col = (PLAYER_COLUMNS.len() + offset) as u16;
                write_opt_number(sheet, r, col, row.metric(def.code))?;
            }
        }
    }

    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;

    Ok(ExportReport {
        players: page.rows.len(),
        metric_columns: metrics.len(),
    })
}

fn write_header(worksheet: &mut Worksheet, header: &[String]) -> Result<()> {
    for (col_idx, value) in header.iter().enumerate() {
        write_text(worksheet, 0, col_idx as u16, value)?;
    }
    Ok(())
}

fn write_text(worksheet: &mut Worksheet, row: u32, col: u16, value: &str) -> Result<()> {
    worksheet
        .write_string(row, col, value)
        .with_context(|| format!("write cell ({row},{col})"))?;
    Ok(())
}

fn write_opt_number(worksheet: &mut Worksheet, row: u32, col: u16, value: Option<f64>) -> Result<()> {
    if let Some(v) = value {
        worksheet
            .write_number(row, col, v)
            .with_context(|| format!("write cell ({row},{col})"))?;
    }
    Ok(())
}
