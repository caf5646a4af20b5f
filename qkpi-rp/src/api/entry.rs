//! Data entry and administration endpoints

use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use qkpi_common::aggregator::MonthKpis;
use qkpi_common::db::ThresholdRecord;
use qkpi_common::report::MonthlySubmission;
use qkpi_common::Kpi;

use super::error::ApiResult;
use crate::AppState;

/// POST /api/entries
///
/// Stores every counter of a workshop's month and returns the derived KPIs.
pub async fn submit_month(
    State(state): State<AppState>,
    Json(submission): Json<MonthlySubmission>,
) -> ApiResult<MonthKpis> {
    Ok(Json(state.reports.submit_month(&submission).await?))
}

#[derive(Debug, Deserialize)]
pub struct ThresholdRequest {
    /// Workshop, group tag or `Total`
    pub scope: String,
    /// API key or stored indicator name
    pub indicator: String,
    pub value: f64,
    pub modified_by: Option<String>,
}

/// POST /api/admin/thresholds
pub async fn set_threshold(
    State(state): State<AppState>,
    Json(request): Json<ThresholdRequest>,
) -> ApiResult<ThresholdRecord> {
    let kpi: Kpi = request.indicator.parse()?;
    let record = state
        .reports
        .set_threshold(
            &request.scope,
            kpi,
            request.value,
            request.modified_by.as_deref(),
        )
        .await?;
    Ok(Json(record))
}

/// Plant non-quality-cost state of a year
#[derive(Debug, Serialize)]
pub struct NqcStatus {
    pub year: i32,
    pub threshold: f64,
    pub ytd_snapshot: f64,
}

/// GET /api/nqc/:year
pub async fn get_nqc(
    State(state): State<AppState>,
    Path(year): Path<i32>,
) -> ApiResult<NqcStatus> {
    let nqc = state.reports.non_quality_cost();
    Ok(Json(NqcStatus {
        year,
        threshold: nqc.threshold(Some(year)).await?,
        ytd_snapshot: nqc.year_to_date_snapshot(year).await?,
    }))
}

#[derive(Debug, Deserialize)]
pub struct NqcValueRequest {
    pub year: i32,
    pub month: u32,
    pub value: f64,
    /// New threshold applied to every plant record
    pub threshold: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct Updated {
    pub status: String,
    pub updated: u64,
}

impl Updated {
    fn ok(updated: u64) -> Json<Self> {
        Json(Self {
            status: "ok".to_string(),
            updated,
        })
    }
}

/// POST /api/admin/nqc
pub async fn record_nqc_value(
    State(state): State<AppState>,
    Json(request): Json<NqcValueRequest>,
) -> ApiResult<Updated> {
    state
        .reports
        .non_quality_cost()
        .record_monthly_value(request.year, request.month, request.value, request.threshold)
        .await?;
    Ok(Updated::ok(1))
}

#[derive(Debug, Deserialize)]
pub struct NqcThresholdRequest {
    pub threshold: f64,
}

/// PUT /api/admin/nqc/threshold
pub async fn update_nqc_threshold(
    State(state): State<AppState>,
    Json(request): Json<NqcThresholdRequest>,
) -> ApiResult<Updated> {
    let changed = state
        .reports
        .non_quality_cost()
        .update_threshold(request.threshold)
        .await?;
    Ok(Updated::ok(changed))
}

#[derive(Debug, Deserialize)]
pub struct NqcSnapshotRequest {
    pub year: i32,
    pub value: f64,
}

/// PUT /api/admin/nqc/ytd
pub async fn record_nqc_snapshot(
    State(state): State<AppState>,
    Json(request): Json<NqcSnapshotRequest>,
) -> ApiResult<Updated> {
    state
        .reports
        .non_quality_cost()
        .record_ytd_snapshot(request.year, request.value)
        .await?;
    Ok(Updated::ok(1))
}

/// Build data entry and administration routes
pub fn entry_routes() -> Router<AppState> {
    Router::new()
        .route("/api/entries", post(submit_month))
        .route("/api/admin/thresholds", post(set_threshold))
        .route("/api/nqc/:year", get(get_nqc))
        .route("/api/admin/nqc", post(record_nqc_value))
        .route("/api/admin/nqc/threshold", put(update_nqc_threshold))
        .route("/api/admin/nqc/ytd", put(record_nqc_snapshot))
}
