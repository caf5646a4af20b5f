//! Integration tests for the reporting facade

use qkpi_common::config::KpiConfig;
use qkpi_common::db::init::init_memory_database;
use qkpi_common::kpi::RawTotals;
use qkpi_common::non_quality_cost::DEFAULT_NQC_THRESHOLD;
use qkpi_common::report::{MonthlySubmission, Trend};
use qkpi_common::thresholds::ThresholdStatus;
use qkpi_common::{Error, Kpi, KpiReports};
use sqlx::SqlitePool;

async fn setup() -> (SqlitePool, KpiReports) {
    let pool = init_memory_database().await.unwrap();
    let reports = KpiReports::new(pool.clone(), &KpiConfig::default());
    (pool, reports)
}

fn manchon_march() -> MonthlySubmission {
    MonthlySubmission {
        month: 3,
        year: 2025,
        workshop: "Manchon".to_string(),
        sub_unit: "Ligne 1".to_string(),
        counters: RawTotals {
            exported: 1000.0,
            claimed: 5.0,
            alerted: 2.0,
            inspected: 800.0,
            reworked: 40.0,
            scrapped: 16.0,
            scrap_cost: 250.0,
            official_complaints: 1.0,
        },
    }
}

#[tokio::test]
async fn test_submit_month_returns_preview() {
    let (pool, reports) = setup().await;

    let preview = reports.submit_month(&manchon_march()).await.unwrap();
    assert_eq!(preview.kpis.ppm_official, 5000.0);
    assert_eq!(preview.kpis.ppm_unofficial, 2000.0);
    assert_eq!(preview.kpis.rework_rate_pct, 5.0);
    assert_eq!(preview.kpis.scrap_rate_pct, 2.0);
    assert_eq!(preview.kpis.scrap_cost, 250.0);

    // Written under each family's primary key
    let exported_key: String =
        sqlx::query_scalar("SELECT workshop FROM exported_pieces WHERE month = 3 AND year = 2025")
            .fetch_one(&pool)
            .await
            .unwrap();
    let cost_key: String =
        sqlx::query_scalar("SELECT workshop FROM scrap_cost WHERE month = 3 AND year = 2025")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(exported_key, "Manchons");
    assert_eq!(cost_key, "manchons");

    let series = reports.get_series(Some("Manchon"), None, 2025).await.unwrap();
    assert_eq!(series.series.months[2].kpis, preview.kpis);
}

fn month_of(workshop: &str, scrap_cost: f64, complaints: f64) -> MonthlySubmission {
    MonthlySubmission {
        month: 5,
        year: 2025,
        workshop: workshop.to_string(),
        sub_unit: "Ligne 1".to_string(),
        counters: RawTotals {
            scrap_cost,
            official_complaints: complaints,
            ..RawTotals::default()
        },
    }
}

#[tokio::test]
async fn test_workshops_with_legacy_shared_keys_keep_their_own_rows() {
    let (pool, reports) = setup().await;

    reports
        .submit_month(&month_of("Isolation Souple", 300.0, 4.0))
        .await
        .unwrap();
    reports
        .submit_month(&month_of("Atelier de Visualisation", 100.0, 1.0))
        .await
        .unwrap();

    let souple = reports
        .get_series(Some("Isolation Souple"), None, 2025)
        .await
        .unwrap();
    assert_eq!(souple.series.months[4].kpis.scrap_cost, 300.0);
    assert_eq!(souple.series.months[4].kpis.official_complaints, 4.0);

    let plant = reports.get_series(None, None, 2025).await.unwrap();
    assert_eq!(plant.series.months[4].kpis.scrap_cost, 400.0);
    assert_eq!(plant.series.months[4].kpis.official_complaints, 5.0);

    let cost_rows: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM scrap_cost WHERE month = 5 AND year = 2025",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(cost_rows, 2);
}

#[tokio::test]
async fn test_submission_rejects_shared_primary_key() {
    use qkpi_common::kpi::CounterFamily;
    use qkpi_common::store::SqliteStore;
    use qkpi_common::workshops::AliasTable;
    use std::sync::Arc;

    let pool = init_memory_database().await.unwrap();
    let mut aliases = AliasTable::standard();
    aliases.insert(
        CounterFamily::ScrapCost,
        "Atelier de Visualisation",
        vec!["isolation souple".to_string()],
    );
    let store = Arc::new(SqliteStore::new(pool));
    let reports = KpiReports::with_stores(
        store.clone(),
        store.clone(),
        store,
        aliases,
        &KpiConfig::default(),
    );

    let result = reports
        .submit_month(&month_of("Atelier de Visualisation", 100.0, 1.0))
        .await;
    assert!(matches!(result, Err(Error::InvalidInput(_))));
}

#[tokio::test]
async fn test_resubmission_replaces_values() {
    let (_pool, reports) = setup().await;
    reports.submit_month(&manchon_march()).await.unwrap();

    let mut corrected = manchon_march();
    corrected.counters.claimed = 10.0;
    let preview = reports.submit_month(&corrected).await.unwrap();

    assert_eq!(preview.raw.claimed, 10.0);
    assert_eq!(preview.kpis.ppm_official, 10_000.0);
}

#[tokio::test]
async fn test_negative_counters_are_clamped() {
    let (_pool, reports) = setup().await;
    let mut submission = manchon_march();
    submission.counters.scrapped = -4.0;

    let preview = reports.submit_month(&submission).await.unwrap();
    assert_eq!(preview.raw.scrapped, 0.0);
    assert_eq!(preview.kpis.scrap_rate_pct, 0.0);
}

#[tokio::test]
async fn test_submission_validation() {
    let (_pool, reports) = setup().await;

    let mut bad_month = manchon_march();
    bad_month.month = 13;
    assert!(matches!(
        reports.submit_month(&bad_month).await,
        Err(Error::InvalidInput(_))
    ));

    let mut group = manchon_march();
    group.workshop = "UAP2".to_string();
    assert!(matches!(
        reports.submit_month(&group).await,
        Err(Error::InvalidInput(_))
    ));

    let mut no_sub_unit = manchon_march();
    no_sub_unit.sub_unit = " ".to_string();
    assert!(matches!(
        reports.submit_month(&no_sub_unit).await,
        Err(Error::InvalidInput(_))
    ));

    let mut not_a_number = manchon_march();
    not_a_number.counters.exported = f64::NAN;
    assert!(matches!(
        reports.submit_month(&not_a_number).await,
        Err(Error::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_strict_scopes_reject_unknown_workshops() {
    let pool = init_memory_database().await.unwrap();
    let config = KpiConfig {
        strict_scopes: true,
        ..Default::default()
    };
    let reports = KpiReports::new(pool, &config);

    let mut submission = manchon_march();
    submission.workshop = "Extrusion".to_string();
    assert!(matches!(
        reports.submit_month(&submission).await,
        Err(Error::InvalidScope(_))
    ));
    assert!(matches!(
        reports.get_series(Some("Extrusion"), None, 2025).await,
        Err(Error::InvalidScope(_))
    ));
}

#[tokio::test]
async fn test_malformed_scope_is_an_error() {
    let (_pool, reports) = setup().await;
    assert!(matches!(
        reports.get_ytd(Some("Manchon,,Rack"), None, 2025, Some(3)).await,
        Err(Error::InvalidScope(_))
    ));
}

#[tokio::test]
async fn test_threshold_administration() {
    let (_pool, reports) = setup().await;

    reports
        .set_threshold("UAP 1", Kpi::ScrapRate, 2.5, Some("alice"))
        .await
        .unwrap();
    reports
        .set_threshold("UAP1", Kpi::ScrapRate, 3.5, Some("bob"))
        .await
        .unwrap();
    reports
        .set_threshold("Usine Complète", Kpi::PpmOfficial, 80.0, None)
        .await
        .unwrap();

    let history = reports.threshold_history(Kpi::ScrapRate).await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|record| record.scope_key == "UAP1"));

    let current = reports.current_thresholds().await.unwrap();
    assert_eq!(current.len(), 2);
    let scrap = current
        .iter()
        .find(|record| record.indicator == "Taux de Rebut")
        .unwrap();
    assert_eq!(scrap.value, 3.5);
    assert_eq!(scrap.modified_by.as_deref(), Some("bob"));

    let report = reports.get_thresholds(Some("UAP1"), None).await.unwrap();
    assert_eq!(report.thresholds.scrap_rate_pct, 3.5);

    let total = reports.get_thresholds(None, None).await.unwrap();
    assert_eq!(total.thresholds.ppm_official, 80.0);

    assert!(matches!(
        reports.set_threshold("Rack", Kpi::ScrapRate, -1.0, None).await,
        Err(Error::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_non_quality_cost_threshold_only_for_plant() {
    let (_pool, reports) = setup().await;

    let total = reports.get_thresholds(Some("Total"), Some(2025)).await.unwrap();
    assert_eq!(total.thresholds.non_quality_cost_index, DEFAULT_NQC_THRESHOLD);

    reports
        .non_quality_cost()
        .record_monthly_value(2025, 2, 3.0, Some(9.0))
        .await
        .unwrap();
    let total = reports.get_thresholds(None, Some(2025)).await.unwrap();
    assert_eq!(total.thresholds.non_quality_cost_index, 9.0);

    let group = reports.get_thresholds(Some("UAP2"), Some(2025)).await.unwrap();
    assert_eq!(group.thresholds.non_quality_cost_index, 0.0);
}

#[tokio::test]
async fn test_ytd_overview() {
    let (_pool, reports) = setup().await;
    for (year, month, claimed) in [(2024, 2, 3.0), (2024, 11, 7.0), (2025, 2, 1.0)] {
        let mut submission = manchon_march();
        submission.year = year;
        submission.month = month;
        submission.counters.claimed = claimed;
        reports.submit_month(&submission).await.unwrap();
    }

    let overview = reports
        .get_ytd_overview(Some("Manchon"), None, 2025, Some(3))
        .await
        .unwrap();

    assert_eq!(overview.current.raw.claimed, 1.0);
    assert_eq!(overview.previous_same_period.raw.claimed, 3.0);
    assert_eq!(overview.previous_full_year.raw.claimed, 10.0);
    assert_eq!(overview.previous_full_year.through_month, 12);
}

#[tokio::test]
async fn test_conformity_report() {
    let (_pool, reports) = setup().await;
    reports
        .set_threshold("Manchon", Kpi::ScrapRate, 2.0, None)
        .await
        .unwrap();

    // 2.0 % in March, 4.0 % in April
    reports.submit_month(&manchon_march()).await.unwrap();
    let mut april = manchon_march();
    april.month = 4;
    april.counters.scrapped = 32.0;
    reports.submit_month(&april).await.unwrap();

    let report = reports
        .get_conformity(Some("Manchon"), None, 2025, Some(4))
        .await
        .unwrap();
    assert_eq!(report.indicators.len(), Kpi::ALL.len());

    let scrap = report
        .indicators
        .iter()
        .find(|indicator| indicator.kpi == Kpi::ScrapRate)
        .unwrap();
    assert_eq!(scrap.threshold, 2.0);
    assert_eq!(scrap.months.len(), 4);
    assert!(scrap.months[2].conformant);
    assert_eq!(scrap.months[2].status, ThresholdStatus::Warning);
    assert!(!scrap.months[3].conformant);
    assert_eq!(scrap.months[3].status, ThresholdStatus::Critical);
    assert_eq!(scrap.conformant_months, 3);

    // No threshold configured
    let rework = report
        .indicators
        .iter()
        .find(|indicator| indicator.kpi == Kpi::ReworkRate)
        .unwrap();
    assert_eq!(rework.conformant_months, 4);
    assert_eq!(rework.months[2].status, ThresholdStatus::Info);
}

#[tokio::test]
async fn test_indicator_analysis() {
    let (_pool, reports) = setup().await;
    reports
        .set_threshold("Manchon", Kpi::OfficialComplaints, 3.0, None)
        .await
        .unwrap();

    for (year, complaints) in [(2024, 6.0), (2025, 3.0)] {
        let mut submission = manchon_march();
        submission.year = year;
        submission.counters.official_complaints = complaints;
        reports.submit_month(&submission).await.unwrap();
    }

    let analysis = reports
        .get_indicator_analysis(Kpi::OfficialComplaints, Some("Manchon"), None, 2025)
        .await
        .unwrap();

    assert_eq!(analysis.previous_year, 2024);
    assert_eq!(analysis.current.len(), 12);
    assert_eq!(analysis.current[2], 3.0);
    assert_eq!(analysis.previous[2], 6.0);
    assert_eq!(analysis.current_average, 0.25);
    assert_eq!(analysis.previous_average, 0.5);
    assert_eq!(analysis.improvement_pct, 50.0);
    assert_eq!(analysis.trend, Trend::Improving);
    assert_eq!(analysis.current_violations, 0);
    assert_eq!(analysis.previous_violations, 1);
}

#[tokio::test]
async fn test_indicator_analysis_without_history_is_stable() {
    let (_pool, reports) = setup().await;
    let analysis = reports
        .get_indicator_analysis(Kpi::PpmOfficial, None, None, 2025)
        .await
        .unwrap();

    assert_eq!(analysis.improvement_pct, 0.0);
    assert_eq!(analysis.trend, Trend::Stable);
    assert_eq!(analysis.current_violations, 0);
}
