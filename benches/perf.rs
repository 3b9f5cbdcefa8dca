use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use football_stats::cell::{CellValue, RowRecord, columns};
use football_stats::loader::{LoadRequest, StatsLoader};
use football_stats::metrics_catalog::{MetricCatalog, PercentScale};
use football_stats::query::{PlayerQuery, SortKey, query_players};
use football_stats::row_source::read_rows_from_reader;
use football_stats::slice::StatKind;
use football_stats::store::open_in_memory;

const POSITIONS: [&str; 4] = ["GK", "DF", "MF", "FW"];

fn sample_rows(catalog: &MetricCatalog, players: usize) -> Vec<RowRecord> {
    (0..players)
        .map(|i| {
            let mut row = RowRecord::new()
                .with(columns::PLAYER_NAME, format!("Player {i}").as_str())
                .with(columns::TEAM_NAME, format!("Team {}", i % 16).as_str())
                .with(columns::POSITION, POSITIONS[i % POSITIONS.len()])
                .with(columns::AGE, (16 + i % 5) as f64);
            for (m, def) in catalog.iter().enumerate() {
                let value = if (i + m) % 17 == 0 {
                    CellValue::Text("-".to_string())
                } else {
                    CellValue::Number(((i * 7 + m * 3) % 50) as f64 / 10.0)
                };
                row.insert(def.label, value);
            }
            row
        })
        .collect()
}

fn sample_csv(catalog: &MetricCatalog, players: usize) -> String {
    let mut out = String::from("Игрок;Команда;Позиция;Возраст");
    for def in catalog.iter() {
        out.push(';');
        out.push_str(def.label);
    }
    out.push('\n');
    for i in 0..players {
        out.push_str(&format!("Player {i};Team {};FW;17", i % 16));
        for m in 0..catalog.len() {
            out.push_str(&format!(";{},{}", (i + m) % 9, m % 10));
        }
        out.push('\n');
    }
    out
}

fn bench_load_season(c: &mut Criterion) {
    let catalog = MetricCatalog::standard();
    let rows = sample_rows(&catalog, 300);
    let request = LoadRequest::season(0, StatKind::Total, Some("2025"));
    c.bench_function("load_season_300_rows", |b| {
        b.iter(|| {
            let mut conn = open_in_memory().unwrap();
            let summary = StatsLoader::new(&catalog)
                .with_reference_year(2025)
                .load(&mut conn, black_box(&rows), &request)
                .unwrap();
            black_box(summary.stats_loaded);
        })
    });
}

fn bench_reload_season(c: &mut Criterion) {
    let catalog = MetricCatalog::standard();
    let rows = sample_rows(&catalog, 300);
    let request = LoadRequest::season(0, StatKind::Total, Some("2025"));
    let mut conn = open_in_memory().unwrap();
    let loader = StatsLoader::new(&catalog).with_reference_year(2025);
    loader.load(&mut conn, &rows, &request).unwrap();
    c.bench_function("reload_season_300_rows", |b| {
        b.iter(|| {
            let summary = loader.load(&mut conn, black_box(&rows), &request).unwrap();
            black_box(summary.slice_revision);
        })
    });
}

fn bench_read_csv(c: &mut Criterion) {
    let catalog = MetricCatalog::standard();
    let csv = sample_csv(&catalog, 300);
    c.bench_function("read_csv_300_rows", |b| {
        b.iter(|| {
            let table = read_rows_from_reader(black_box(csv.as_bytes())).unwrap();
            black_box(table.rows.len());
        })
    });
}

fn bench_query_page(c: &mut Criterion) {
    let catalog = MetricCatalog::standard();
    let rows = sample_rows(&catalog, 300);
    let mut conn = open_in_memory().unwrap();
    StatsLoader::new(&catalog)
        .with_reference_year(2025)
        .load(
            &mut conn,
            &rows,
            &LoadRequest::season(0, StatKind::Total, Some("2025")),
        )
        .unwrap();
    let query = PlayerQuery::new(0).sort_by(SortKey::Metric("xg".to_string()), true);
    c.bench_function("query_page_sorted_by_metric", |b| {
        b.iter(|| {
            let page = query_players(&conn, &catalog, PercentScale::Fraction, black_box(&query))
                .unwrap();
            black_box(page.total);
        })
    });
}

criterion_group!(
    benches,
    bench_load_season,
    bench_reload_season,
    bench_read_csv,
    bench_query_page
);
criterion_main!(benches);
