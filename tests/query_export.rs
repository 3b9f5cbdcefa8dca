use rusqlite::Connection;

use football_stats::cell::{RowRecord, columns};
use football_stats::export::export_player_page;
use football_stats::loader::{LoadRequest, LoadSummary, StatsLoader};
use football_stats::metrics_catalog::{MetricCatalog, PercentScale};
use football_stats::query::{
    PlayerQuery, SliceSelector, SortKey, delete_tournament_players, query_players, stats_summary,
};
use football_stats::slice::{PeriodKind, StatKind};
use football_stats::store::{open_db, open_in_memory};

fn player(name: &str, team: &str, position: &str, age: f64) -> RowRecord {
    RowRecord::new()
        .with(columns::PLAYER_NAME, name)
        .with(columns::TEAM_NAME, team)
        .with(columns::POSITION, position)
        .with(columns::AGE, age)
}

fn seed(conn: &mut Connection, catalog: &MetricCatalog) -> LoadSummary {
    let rows = vec![
        player("Ivanov Ivan", "CSKA", "FW", 17.0)
            .with("Голы", 5.0)
            .with("Удары точные, %", 0.45),
        player("Petrov Petr", "CSKA", "MF", 18.0).with("Голы", 2.0),
        player("Sidorov Oleg", "Zenit", "FW", 19.0)
            .with("Голы", 7.0)
            .with("Удары точные, %", 0.6),
        player("Orlov Ivan", "Zenit", "DF", 20.0),
    ];
    StatsLoader::new(catalog)
        .with_reference_year(2025)
        .load(
            conn,
            &rows,
            &LoadRequest::season(0, StatKind::Total, Some("2025")),
        )
        .expect("seed load")
}

fn names(page: &football_stats::query::PlayerPage) -> Vec<&str> {
    page.rows.iter().map(|r| r.full_name.as_str()).collect()
}

#[test]
fn latest_slice_page_sorted_by_metric() {
    let catalog = MetricCatalog::standard();
    let mut conn = open_in_memory().expect("db");
    let loaded = seed(&mut conn, &catalog);

    let page = query_players(
        &conn,
        &catalog,
        PercentScale::Fraction,
        &PlayerQuery::new(0).sort_by(SortKey::Metric("goals".to_string()), true),
    )
    .expect("query");

    assert_eq!(page.slice.as_ref().map(|s| s.slice_id), Some(loaded.slice_id));
    // Orlov has no metric values in the slice, so he is not part of it.
    assert_eq!(page.total, 3);
    assert_eq!(names(&page), vec!["Sidorov Oleg", "Ivanov Ivan", "Petrov Petr"]);
    assert_eq!(page.rows[0].birth_year, Some(2006));
}

#[test]
fn percentages_scale_only_on_read() {
    let catalog = MetricCatalog::standard();
    let mut conn = open_in_memory().expect("db");
    seed(&mut conn, &catalog);

    let query = PlayerQuery::new(0).name_contains("ivanov");
    let fraction = query_players(&conn, &catalog, PercentScale::Fraction, &query).expect("query");
    let points = query_players(&conn, &catalog, PercentScale::Points, &query).expect("query");

    let shown = fraction.rows[0].metric("shots_accurate_pct").expect("pct");
    assert!((shown - 45.0).abs() < 1e-9);
    assert_eq!(points.rows[0].metric("shots_accurate_pct"), Some(0.45));
    assert_eq!(fraction.rows[0].metric("goals"), Some(5.0));

    let stored: f64 = conn
        .query_row(
            "SELECT metric_value FROM player_statistics WHERE metric_code = 'shots_accurate_pct' ORDER BY player_id LIMIT 1",
            [],
            |row| row.get(0),
        )
        .expect("stored");
    assert_eq!(stored, 0.45);
}

#[test]
fn filters_and_pagination() {
    let catalog = MetricCatalog::standard();
    let mut conn = open_in_memory().expect("db");
    seed(&mut conn, &catalog);

    let zenit = query_players(
        &conn,
        &catalog,
        PercentScale::Fraction,
        &PlayerQuery::new(0).team("zenit"),
    )
    .expect("team filter");
    assert_eq!(names(&zenit), vec!["Sidorov Oleg"]);

    let forwards = query_players(
        &conn,
        &catalog,
        PercentScale::Fraction,
        &PlayerQuery::new(0).position("FW"),
    )
    .expect("position filter");
    assert_eq!(names(&forwards), vec!["Ivanov Ivan", "Sidorov Oleg"]);

    let second_page = query_players(
        &conn,
        &catalog,
        PercentScale::Fraction,
        &PlayerQuery::new(0).page(2, 2),
    )
    .expect("page 2");
    assert_eq!(second_page.total, 3);
    assert_eq!(second_page.total_pages(), 2);
    assert_eq!(names(&second_page), vec!["Sidorov Oleg"]);

    let clamped = query_players(
        &conn,
        &catalog,
        PercentScale::Fraction,
        &PlayerQuery::new(0).page(0, 0),
    )
    .expect("clamped");
    assert_eq!((clamped.page, clamped.per_page), (1, 1));
    assert_eq!(clamped.rows.len(), 1);

    let far = query_players(
        &conn,
        &catalog,
        PercentScale::Fraction,
        &PlayerQuery::new(0).page(usize::MAX, 2),
    )
    .expect("page past the end");
    assert_eq!(far.total, 3);
    assert!(far.rows.is_empty());
}

#[test]
fn slice_selection_and_errors() {
    let catalog = MetricCatalog::standard();
    let mut conn = open_in_memory().expect("db");
    let loaded = seed(&mut conn, &catalog);

    let by_id = query_players(
        &conn,
        &catalog,
        PercentScale::Fraction,
        &PlayerQuery::new(0).slice(SliceSelector::Id(loaded.slice_id)),
    )
    .expect("by id");
    assert_eq!(by_id.total, 3);

    let no_rounds = query_players(
        &conn,
        &catalog,
        PercentScale::Fraction,
        &PlayerQuery::new(0).slice(SliceSelector::Latest {
            stat_kind: StatKind::Total,
            period_kind: PeriodKind::Round,
        }),
    )
    .expect("no round slice");
    assert!(no_rounds.slice.is_none());
    assert!(no_rounds.rows.is_empty());

    assert!(
        query_players(
            &conn,
            &catalog,
            PercentScale::Fraction,
            &PlayerQuery::new(1).slice(SliceSelector::Id(loaded.slice_id)),
        )
        .is_err()
    );
    assert!(
        query_players(
            &conn,
            &catalog,
            PercentScale::Fraction,
            &PlayerQuery::new(0).sort_by(SortKey::Metric("not_a_metric".to_string()), false),
        )
        .is_err()
    );
}

#[test]
fn summary_and_bulk_delete() {
    let catalog = MetricCatalog::standard();
    let mut conn = open_in_memory().expect("db");
    seed(&mut conn, &catalog);

    let before = stats_summary(&conn, 0).expect("summary");
    assert_eq!(before.players, 4);
    assert_eq!(before.slices, 1);
    assert_eq!(before.statistics, 5);

    assert_eq!(delete_tournament_players(&conn, 0).expect("delete"), 4);
    let after = stats_summary(&conn, 0).expect("summary");
    assert_eq!(after.players, 0);
    assert_eq!(after.slices, 1);
    assert_eq!(after.statistics, 0);
}

#[test]
fn exports_page_to_workbook() {
    let catalog = MetricCatalog::standard();
    let dir = tempfile::tempdir().expect("tempdir");
    let mut conn = open_db(&dir.path().join("stats.sqlite")).expect("db");
    seed(&mut conn, &catalog);

    let page = query_players(&conn, &catalog, PercentScale::Fraction, &PlayerQuery::new(0))
        .expect("query");
    let out = dir.path().join("players.xlsx");
    let report = export_player_page(&out, &catalog, &page).expect("export");

    assert_eq!(report.players, 3);
    assert_eq!(report.metric_columns, 2);
    let size = std::fs::metadata(&out).expect("workbook written").len();
    assert!(size > 0);
}
