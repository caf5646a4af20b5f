//! Threshold resolution, conformity and status classification

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::kpi::Kpi;
use crate::scope::ScopeResolution;
use crate::store::ThresholdStore;
use crate::Result;

/// Resolves the threshold in force for an indicator over a scope
#[derive(Clone)]
pub struct ThresholdResolver {
    store: Arc<dyn ThresholdStore>,
}

impl ThresholdResolver {
    pub fn new(store: Arc<dyn ThresholdStore>) -> Self {
        Self { store }
    }

    /// Threshold for `kpi` over `scope`, 0 meaning "no limit configured"
    ///
    /// A row stored under the scope's own key wins. Without one, scopes
    /// spanning several workshops use [`Self::group_average_fallback`].
    pub async fn current_threshold(&self, kpi: Kpi, scope: &ScopeResolution) -> Result<f64> {
        if let Some(key) = &scope.threshold_key {
            if let Some(record) = self.store.latest(key, kpi.indicator_name()).await? {
                return Ok(record.value);
            }
        }

        if scope.is_multi_workshop() {
            return self.group_average_fallback(kpi, &scope.workshops).await;
        }

        Ok(0.0)
    }

    /// Mean of each workshop's latest threshold
    ///
    /// Workshops without a threshold count as 0 and still weigh in the mean,
    /// so a partially configured group gets a lower limit.
    pub async fn group_average_fallback(&self, kpi: Kpi, workshops: &[String]) -> Result<f64> {
        if workshops.is_empty() {
            return Ok(0.0);
        }

        let mut total = 0.0;
        for workshop in workshops {
            if let Some(record) = self.store.latest(workshop, kpi.indicator_name()).await? {
                total += record.value;
            }
        }

        let average = total / workshops.len() as f64;
        debug!(
            "Group average threshold for {} over {} workshops: {}",
            kpi,
            workshops.len(),
            average
        );
        Ok(average)
    }
}

/// Whether `value` respects `threshold`
///
/// A threshold of 0 or less means no limit, so every value conforms.
pub fn is_conformant(value: f64, threshold: f64) -> bool {
    threshold <= 0.0 || value <= threshold
}

/// Which way an indicator improves
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Defect rates and costs
    #[default]
    LowerIsBetter,
    /// Volumes such as delivered or inspected pieces
    HigherIsBetter,
}

/// Traffic-light status of a value against its threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdStatus {
    Ok,
    Warning,
    Critical,
    /// No threshold configured
    Info,
}

/// Classify `value` by its ratio to `threshold`
pub fn classify(value: f64, threshold: f64, direction: Direction) -> ThresholdStatus {
    if threshold <= 0.0 {
        return ThresholdStatus::Info;
    }

    let ratio = value / threshold;
    match direction {
        Direction::LowerIsBetter => {
            if ratio <= 0.8 {
                ThresholdStatus::Ok
            } else if ratio <= 1.0 {
                ThresholdStatus::Warning
            } else {
                ThresholdStatus::Critical
            }
        }
        Direction::HigherIsBetter => {
            if ratio >= 1.2 {
                ThresholdStatus::Ok
            } else if ratio >= 0.8 {
                ThresholdStatus::Warning
            } else {
                ThresholdStatus::Critical
            }
        }
    }
}
