use std::path::PathBuf;

use anyhow::Result;

use football_stats::config::{self, Settings, flag_value};
use football_stats::metrics_catalog::{MetricCatalog, sync_catalog};
use football_stats::store::open_db;

fn main() -> Result<()> {
    config::load_dotenv();
    let settings = Settings::from_env();
    config::init_tracing(&settings.log_filter);

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let db_path = flag_value(&args, "--db")
        .map(PathBuf::from)
        .unwrap_or(settings.db_path);

    let catalog = MetricCatalog::standard();
    let mut conn = open_db(&db_path)?;
    let report = sync_catalog(&mut conn, &catalog)?;

    println!("Metric catalog sync complete");
    println!("DB: {}", db_path.display());
    println!("Metrics: {}", catalog.len());
    println!("Added: {}", report.added);
    println!("Updated: {}", report.updated);
    println!(
        "Key metrics: {}",
        catalog
            .key_metrics()
            .map(|m| m.code)
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(())
}
