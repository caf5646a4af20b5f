//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of the thresholds history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ThresholdRecord {
    pub id: i64,
    /// Workshop display name, group tag or `Total`
    pub scope_key: String,
    pub indicator: String,
    pub value: f64,
    pub modified_by: Option<String>,
    pub modified_at: DateTime<Utc>,
}

/// Plant-level non-quality-cost row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct NqcRecord {
    pub month: i64,
    pub year: i64,
    pub workshop: String,
    pub value: f64,
    pub threshold: Option<f64>,
    pub ytd_snapshot: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update of a non-quality-cost row
///
/// `None` fields keep their stored value (or NULL on insert, except `value`
/// which defaults to 0).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NqcUpdate {
    pub value: Option<f64>,
    pub threshold: Option<f64>,
    pub ytd_snapshot: Option<f64>,
}
