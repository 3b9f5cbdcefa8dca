use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use football_stats::config::{self, Settings, flag_value, has_flag};
use football_stats::export::export_player_page;
use football_stats::metrics_catalog::MetricCatalog;
use football_stats::query::{PlayerQuery, SliceSelector, SortKey, query_players, stats_summary};
use football_stats::slice::{PeriodKind, StatKind};
use football_stats::store::open_db;

const USAGE: &str = "usage: stats_export --tournament <id> --out <file.xlsx> [--db <path>] \
[--slice <id> | --kind TOTAL|PER90 --period SEASON|ROUND] [--team <name>] [--position <code>] \
[--name <substring>] [--sort name|team|birth_year|<metric>] [--desc] [--page <n>] [--per-page <n>]";

fn main() -> Result<()> {
    config::load_dotenv();
    let settings = Settings::from_env();
    config::init_tracing(&settings.log_filter);

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("{USAGE}");
        return Ok(());
    }

    let tournament_id = flag_value(&args, "--tournament")
        .ok_or_else(|| anyhow!("missing --tournament\n{USAGE}"))?
        .parse::<i64>()
        .context("invalid --tournament")?;
    let out = flag_value(&args, "--out")
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("missing --out\n{USAGE}"))?;
    let db_path = flag_value(&args, "--db")
        .map(PathBuf::from)
        .unwrap_or_else(|| settings.db_path.clone());

    let slice = match flag_value(&args, "--slice") {
        Some(raw) => SliceSelector::Id(raw.parse::<i64>().context("invalid --slice")?),
        None => SliceSelector::Latest {
            stat_kind: match flag_value(&args, "--kind") {
                Some(raw) => StatKind::parse(&raw).ok_or_else(|| anyhow!("invalid --kind {raw}"))?,
                None => StatKind::Total,
            },
            period_kind: match flag_value(&args, "--period") {
                Some(raw) => {
                    PeriodKind::parse(&raw).ok_or_else(|| anyhow!("invalid --period {raw}"))?
                }
                None => PeriodKind::Season,
            },
        },
    };

    let page = parse_usize(&args, "--page")?.unwrap_or(1);
    let per_page = parse_usize(&args, "--per-page")?.unwrap_or(settings.page_size);

    let mut query = PlayerQuery::new(tournament_id)
        .slice(slice)
        .sort_by(
            flag_value(&args, "--sort")
                .map(|raw| SortKey::parse(&raw))
                .unwrap_or(SortKey::Name),
            has_flag(&args, "--desc"),
        )
        .page(page, per_page);
    if let Some(team) = flag_value(&args, "--team") {
        query = query.team(&team);
    }
    if let Some(position) = flag_value(&args, "--position") {
        query = query.position(&position);
    }
    if let Some(name) = flag_value(&args, "--name") {
        query = query.name_contains(&name);
    }

    let catalog = MetricCatalog::standard();
    let conn = open_db(&db_path)?;
    let summary = stats_summary(&conn, tournament_id)?;
    let result = query_players(&conn, &catalog, settings.percent_scale, &query)?;
    let Some(slice) = result.slice.as_ref() else {
        println!("No matching slice for tournament {tournament_id}");
        return Ok(());
    };
    let report = export_player_page(&out, &catalog, &result)?;

    println!("Export complete: {}", out.display());
    println!(
        "Slice {} ({} {} {})",
        slice.slice_id,
        slice.stat_kind,
        slice.period_kind,
        slice.period_value.as_deref().unwrap_or("-")
    );
    println!(
        "Players: {} (page {}/{}, {} matching)",
        report.players,
        result.page,
        result.total_pages(),
        result.total
    );
    println!("Metric columns: {}", report.metric_columns);
    println!(
        "Tournament totals: {} players, {} slices, {} values",
        summary.players, summary.slices, summary.statistics
    );
    Ok(())
}

fn parse_usize(args: &[String], name: &str) -> Result<Option<usize>> {
    flag_value(args, name)
        .map(|raw| {
            raw.parse::<usize>()
                .with_context(|| format!("invalid {name} {raw}"))
        })
        .transpose()
}
