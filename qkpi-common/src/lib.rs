//! # QKPI Common Library
//!
//! Shared code for the quality KPI services including:
//! - Database initialization, migrations and records
//! - Counter, threshold and non-quality-cost stores
//! - Workshop scope resolution and storage-key aliases
//! - KPI aggregation, threshold resolution and reporting
//! - Configuration loading

pub mod aggregator;
pub mod config;
pub mod db;
pub mod error;
pub mod kpi;
pub mod non_quality_cost;
pub mod report;
pub mod scope;
pub mod store;
pub mod thresholds;
pub mod time;
pub mod workshops;

pub use error::{Error, Result};
pub use kpi::{CounterKind, Kpi, KpiValues, RawTotals};
pub use report::KpiReports;
pub use scope::{ScopeResolution, ScopeResolver};
