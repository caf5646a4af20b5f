//! Storage collaborators of the KPI engine
//!
//! Three object-safe traits describe what the engine reads and writes;
//! [`SqliteStore`] implements all of them over one connection pool.

mod counters;
mod nqc;
mod thresholds;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::db::{NqcRecord, NqcUpdate, ThresholdRecord};
use crate::kpi::CounterKind;
use crate::Result;

/// Raw monthly counters keyed by (month, year, storage key, sub-unit)
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Sum of one counter for a storage key in a month
    ///
    /// Returns 0 when no row matches. With `sub_unit` only exact matches count.
    async fn sum(
        &self,
        kind: CounterKind,
        month: u32,
        year: i32,
        workshop: &str,
        sub_unit: Option<&str>,
    ) -> Result<f64>;

    /// Insert or replace the counter value for a key
    async fn upsert(
        &self,
        kind: CounterKind,
        month: u32,
        year: i32,
        workshop: &str,
        sub_unit: &str,
        value: f64,
    ) -> Result<()>;
}

/// Versioned threshold history
#[async_trait]
pub trait ThresholdStore: Send + Sync {
    /// Most recently modified row for (scope key, indicator)
    async fn latest(&self, scope_key: &str, indicator: &str) -> Result<Option<ThresholdRecord>>;

    /// Every row for an indicator, newest first
    async fn all_for_indicator(&self, indicator: &str) -> Result<Vec<ThresholdRecord>>;

    /// Append a history row
    async fn record(
        &self,
        scope_key: &str,
        indicator: &str,
        value: f64,
        modified_by: Option<&str>,
        modified_at: DateTime<Utc>,
    ) -> Result<ThresholdRecord>;

    /// Every row, newest first
    async fn all(&self) -> Result<Vec<ThresholdRecord>>;
}

/// Plant-level non-quality-cost records
#[async_trait]
pub trait NqcStore: Send + Sync {
    async fn get(&self, year: i32, month: u32) -> Result<Option<NqcRecord>>;

    /// Insert or partially update the plant record of a month
    async fn upsert(&self, year: i32, month: u32, update: NqcUpdate) -> Result<()>;

    /// Latest non-null threshold, restricted to `year` when given
    async fn latest_threshold(&self, year: Option<i32>) -> Result<Option<f64>>;

    /// Overwrite the threshold on every plant record; returns rows changed
    async fn set_threshold_everywhere(&self, threshold: f64) -> Result<u64>;
}

/// SQLite implementation of every store trait
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
