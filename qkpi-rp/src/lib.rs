//! qkpi-rp library - Quality KPI reporting service
//!
//! JSON surface over the reporting facade: KPI series, year-to-date and
//! comparison reports, threshold administration and monthly data entry.

use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use qkpi_common::KpiReports;

pub mod api;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub reports: Arc<KpiReports>,
}

impl AppState {
    pub fn new(reports: KpiReports) -> Self {
        Self {
            reports: Arc::new(reports),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::report_routes())
        .merge(api::entry_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
