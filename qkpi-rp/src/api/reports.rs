//! Read-only KPI report endpoints
//!
//! Every report takes an optional `scope` (workshop, comma-separated list,
//! group tag or `Total`) and an optional `sub_unit` filter. A missing `year`
//! means the current year.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::Datelike;
use serde::Deserialize;

use qkpi_common::aggregator::Breakdown;
use qkpi_common::db::ThresholdRecord;
use qkpi_common::report::{
    ComparisonReport, ConformityReport, IndicatorAnalysis, SeriesReport, ThresholdReport,
    YtdOverview, YtdReport,
};
use qkpi_common::{time, Kpi};

use super::error::ApiResult;
use crate::AppState;

/// Common query parameters of report endpoints
#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    pub scope: Option<String>,
    pub sub_unit: Option<String>,
    pub year: Option<i32>,
    pub month: Option<u32>,
}

impl ReportQuery {
    fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// Blank sub-unit means no filter
    fn sub_unit(&self) -> Option<&str> {
        self.sub_unit.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    fn year(&self) -> i32 {
        self.year.unwrap_or_else(|| time::now().year())
    }
}

#[derive(Debug, Deserialize)]
pub struct ComparisonQuery {
    pub scope: Option<String>,
    pub sub_unit: Option<String>,
    pub year_a: i32,
    pub year_b: i32,
}

/// GET /api/kpi/series
pub async fn get_series(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> ApiResult<SeriesReport> {
    let report = state
        .reports
        .get_series(query.scope(), query.sub_unit(), query.year())
        .await?;
    Ok(Json(report))
}

/// GET /api/kpi/ytd
///
/// `month` is the last month of the window; it defaults to the previous
/// month for the current year and December otherwise.
pub async fn get_ytd(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> ApiResult<YtdReport> {
    let report = state
        .reports
        .get_ytd(query.scope(), query.sub_unit(), query.year(), query.month)
        .await?;
    Ok(Json(report))
}

/// GET /api/kpi/ytd/overview
pub async fn get_ytd_overview(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> ApiResult<YtdOverview> {
    let report = state
        .reports
        .get_ytd_overview(query.scope(), query.sub_unit(), query.year(), query.month)
        .await?;
    Ok(Json(report))
}

/// GET /api/kpi/comparison
pub async fn get_comparison(
    State(state): State<AppState>,
    Query(query): Query<ComparisonQuery>,
) -> ApiResult<ComparisonReport> {
    let sub_unit = query
        .sub_unit
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let report = state
        .reports
        .get_comparison(query.scope.as_deref(), sub_unit, query.year_a, query.year_b)
        .await?;
    Ok(Json(report))
}

/// GET /api/kpi/conformity
pub async fn get_conformity(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> ApiResult<ConformityReport> {
    let report = state
        .reports
        .get_conformity(query.scope(), query.sub_unit(), query.year(), query.month)
        .await?;
    Ok(Json(report))
}

/// GET /api/kpi/breakdown
///
/// Requires `month`.
pub async fn get_breakdown(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Breakdown> {
    let month = query.month.ok_or_else(|| {
        qkpi_common::Error::InvalidInput("month is required".to_string())
    })?;
    let report = state
        .reports
        .get_breakdown(query.scope(), query.sub_unit(), month, query.year())
        .await?;
    Ok(Json(report))
}

/// GET /api/kpi/analysis/:indicator
///
/// `indicator` accepts the API key (`scrap_rate_pct`) or the stored name.
pub async fn get_indicator_analysis(
    State(state): State<AppState>,
    Path(indicator): Path<String>,
    Query(query): Query<ReportQuery>,
) -> ApiResult<IndicatorAnalysis> {
    let kpi: Kpi = indicator.parse()?;
    let report = state
        .reports
        .get_indicator_analysis(kpi, query.scope(), query.sub_unit(), query.year())
        .await?;
    Ok(Json(report))
}

/// GET /api/thresholds
pub async fn get_thresholds(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> ApiResult<ThresholdReport> {
    let report = state
        .reports
        .get_thresholds(query.scope(), query.year)
        .await?;
    Ok(Json(report))
}

/// GET /api/thresholds/current
pub async fn get_current_thresholds(
    State(state): State<AppState>,
) -> ApiResult<Vec<ThresholdRecord>> {
    Ok(Json(state.reports.current_thresholds().await?))
}

/// GET /api/thresholds/history/:indicator
pub async fn get_threshold_history(
    State(state): State<AppState>,
    Path(indicator): Path<String>,
) -> ApiResult<Vec<ThresholdRecord>> {
    let kpi: Kpi = indicator.parse()?;
    Ok(Json(state.reports.threshold_history(kpi).await?))
}

/// Build report routes
pub fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/api/kpi/series", get(get_series))
        .route("/api/kpi/ytd", get(get_ytd))
        .route("/api/kpi/ytd/overview", get(get_ytd_overview))
        .route("/api/kpi/comparison", get(get_comparison))
        .route("/api/kpi/conformity", get(get_conformity))
        .route("/api/kpi/breakdown", get(get_breakdown))
        .route("/api/kpi/analysis/:indicator", get(get_indicator_analysis))
        .route("/api/thresholds", get(get_thresholds))
        .route("/api/thresholds/current", get(get_current_thresholds))
        .route("/api/thresholds/history/:indicator", get(get_threshold_history))
}
