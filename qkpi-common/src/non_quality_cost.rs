//! Non-quality-cost index handling
//!
//! The index is entered directly as a percentage for the whole plant; it is
//! never derived from counters. Each plant record also carries the threshold
//! in force, and the January record of a year holds the year-to-date snapshot.

use std::sync::Arc;
use tracing::info;

use crate::db::NqcUpdate;
use crate::store::NqcStore;
use crate::time::is_valid_month;
use crate::{Error, Result};

/// Threshold used when no plant record carries one
pub const DEFAULT_NQC_THRESHOLD: f64 = 15.0;

/// Month whose record holds the year-to-date snapshot
pub const SNAPSHOT_MONTH: u32 = 1;

/// Reads and writes the plant-level non-quality-cost index
#[derive(Clone)]
pub struct NonQualityCost {
    store: Arc<dyn NqcStore>,
    default_threshold: f64,
}

impl NonQualityCost {
    pub fn new(store: Arc<dyn NqcStore>, default_threshold: f64) -> Self {
        Self {
            store,
            default_threshold,
        }
    }

    /// Index for a month, 0 if nothing was entered
    pub async fn monthly_value(&self, year: i32, month: u32) -> Result<f64> {
        Ok(self
            .store
            .get(year, month)
            .await?
            .map(|record| record.value)
            .unwrap_or(0.0))
    }

    /// Threshold in force for a year
    ///
    /// Falls back to the latest threshold of any year, then to the configured
    /// default.
    pub async fn threshold(&self, year: Option<i32>) -> Result<f64> {
        if let Some(year) = year {
            if let Some(threshold) = self.store.latest_threshold(Some(year)).await? {
                return Ok(threshold);
            }
        }

        Ok(self
            .store
            .latest_threshold(None)
            .await?
            .unwrap_or(self.default_threshold))
    }

    /// Stored year-to-date snapshot, 0 if absent or not positive
    pub async fn year_to_date_snapshot(&self, year: i32) -> Result<f64> {
        Ok(self
            .store
            .get(year, SNAPSHOT_MONTH)
            .await?
            .and_then(|record| record.ytd_snapshot)
            .filter(|snapshot| *snapshot > 0.0)
            .unwrap_or(0.0))
    }

    /// Record a monthly index
    ///
    /// The record carries `threshold` when given, which then also replaces the
    /// threshold of every other plant record. Otherwise the threshold
    /// currently in force is copied onto the record.
    pub async fn record_monthly_value(
        &self,
        year: i32,
        month: u32,
        value: f64,
        threshold: Option<f64>,
    ) -> Result<()> {
        validate_period(year, month)?;
        validate_percent("Non-quality cost", value)?;
        if let Some(threshold) = threshold {
            validate_percent("Non-quality cost threshold", threshold)?;
        }

        let applied = match threshold {
            Some(threshold) => threshold,
            None => self.threshold(None).await?,
        };

        self.store
            .upsert(
                year,
                month,
                NqcUpdate {
                    value: Some(value),
                    threshold: Some(applied),
                    ytd_snapshot: None,
                },
            )
            .await?;

        if let Some(threshold) = threshold {
            self.store.set_threshold_everywhere(threshold).await?;
        }

        info!(
            "Recorded non-quality cost {:02}/{}: {}% (threshold {}%)",
            month, year, value, applied
        );
        Ok(())
    }

    /// Replace the threshold on every plant record
    pub async fn update_threshold(&self, threshold: f64) -> Result<u64> {
        validate_percent("Non-quality cost threshold", threshold)?;
        let changed = self.store.set_threshold_everywhere(threshold).await?;
        info!(
            "Non-quality cost threshold set to {}% on {} records",
            threshold, changed
        );
        Ok(changed)
    }

    /// Record the year-to-date snapshot of a year
    pub async fn record_ytd_snapshot(&self, year: i32, value: f64) -> Result<()> {
        validate_period(year, SNAPSHOT_MONTH)?;
        validate_percent("Non-quality cost year-to-date value", value)?;

        self.store
            .upsert(
                year,
                SNAPSHOT_MONTH,
                NqcUpdate {
                    ytd_snapshot: Some(value),
                    ..Default::default()
                },
            )
            .await?;

        info!("Recorded non-quality cost snapshot for {}: {}%", year, value);
        Ok(())
    }
}

fn validate_period(year: i32, month: u32) -> Result<()> {
    if year <= 0 {
        return Err(Error::InvalidInput(format!("Invalid year: {}", year)));
    }
    if !is_valid_month(month) {
        return Err(Error::InvalidInput(format!("Invalid month: {}", month)));
    }
    Ok(())
}

fn validate_percent(what: &str, value: f64) -> Result<()> {
    if !(0.0..=100.0).contains(&value) {
        return Err(Error::InvalidInput(format!(
            "{} must be between 0 and 100%, got {}",
            what, value
        )));
    }
    Ok(())
}
