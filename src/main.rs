use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

use football_stats::config::{self, Settings, flag_value, has_flag};
use football_stats::loader::{LoadRequest, LoadSummary, StatsLoader, validate_columns};
use football_stats::metrics_catalog::MetricCatalog;
use football_stats::row_source::read_rows_csv;
use football_stats::slice::{PeriodKind, StatKind};
use football_stats::store::open_db;
use football_stats::tournament::{
    check_tournament_matches_file, period_from_filename, stat_kind_from_filename,
    tournament_from_filename,
};

const USAGE: &str = "usage: football_stats --file <export.csv> [--db <path>] [--tournament <id>] \
[--kind TOTAL|PER90] [--period SEASON|ROUND] [--value <season|round>] [--force-new-season]";

fn main() -> Result<()> {
    config::load_dotenv();
    let settings = Settings::from_env();
    config::init_tracing(&settings.log_filter);

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("{USAGE}");
        return Ok(());
    }

    let file = flag_value(&args, "--file")
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("missing --file\n{USAGE}"))?;
    let db_path = flag_value(&args, "--db")
        .map(PathBuf::from)
        .unwrap_or_else(|| settings.db_path.clone());
    let request = build_request(&args, &file)?;

    let table = read_rows_csv(&file)?;
    validate_columns(table.header_refs())
        .with_context(|| format!("{} is not a player stats export", file.display()))?;

    let catalog = MetricCatalog::standard();
    let mut conn = open_db(&db_path)?;
    let summary = StatsLoader::new(&catalog).load(&mut conn, &table.rows, &request)?;

    print_summary(&db_path, &request, &summary);
    Ok(())
}

fn build_request(args: &[String], file: &Path) -> Result<LoadRequest> {
    let filename = file
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();

    let tournament_id = match flag_value(args, "--tournament") {
        Some(raw) => raw
            .parse::<i64>()
            .with_context(|| format!("invalid --tournament {raw}"))?,
        None => tournament_from_filename(filename)
            .ok_or_else(|| anyhow!("cannot detect tournament from {filename}; pass --tournament"))?,
    };
    check_tournament_matches_file(tournament_id, filename)?;

    let stat_kind = match flag_value(args, "--kind") {
        Some(raw) => StatKind::parse(&raw).ok_or_else(|| anyhow!("invalid --kind {raw}"))?,
        None => stat_kind_from_filename(filename),
    };

    let (detected_period, detected_value) = period_from_filename(filename);
    let period_kind = match flag_value(args, "--period") {
        Some(raw) => PeriodKind::parse(&raw).ok_or_else(|| anyhow!("invalid --period {raw}"))?,
        None => detected_period,
    };
    let period_value = flag_value(args, "--value").or(match period_kind {
        PeriodKind::Round => detected_value,
        PeriodKind::Season => None,
    });

    Ok(LoadRequest {
        tournament_id,
        stat_kind,
        period_kind,
        period_value,
        force_new_season: has_flag(args, "--force-new-season"),
    })
}

fn print_summary(db_path: &Path, request: &LoadRequest, summary: &LoadSummary) {
    println!("Stats ingest complete");
    println!("DB: {}", db_path.display());
    println!(
        "Slice {} {} ({} {} {}), revision {}",
        summary.slice_id,
        summary.action(),
        request.stat_kind,
        request.period_kind,
        summary.period_value,
        summary.slice_revision
    );
    println!(
        "Players loaded: {}/{}",
        summary.players_loaded, summary.rows_total
    );
    println!("Metric values written: {}", summary.stats_loaded);
    if summary.rollover.needs_new_season && !request.force_new_season {
        println!(
            "Note: latest season slice is {}; this upload went to a separate season slice",
            summary
                .rollover
                .current_period_value
                .as_deref()
                .unwrap_or("-")
        );
    }
    if !summary.skipped.is_empty() {
        println!("Skipped rows: {}", summary.skipped.len());
        for skipped in summary.skipped.iter().take(8) {
            println!(
                " - row {} ({}): {}",
                skipped.row_index + 1,
                skipped.player_name.as_deref().unwrap_or("?"),
                skipped.reason
            );
        }
    }
}
