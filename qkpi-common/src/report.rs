//! Reporting facade
//!
//! [`KpiReports`] is the single entry point used by services: it resolves
//! scope tags, runs the aggregator, attaches thresholds and handles monthly
//! data entry and threshold administration.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::aggregator::{Breakdown, KpiAggregator, MonthKpis, YearSeries, YearToDate};
use crate::config::KpiConfig;
use crate::db::ThresholdRecord;
use crate::kpi::{CounterKind, Kpi, KpiValues, RawTotals};
use crate::non_quality_cost::NonQualityCost;
use crate::scope::{ScopeKind, ScopeResolution, ScopeResolver};
use crate::store::{CounterStore, NqcStore, SqliteStore, ThresholdStore};
use crate::thresholds::{classify, is_conformant, Direction, ThresholdResolver, ThresholdStatus};
use crate::time::{self, default_ytd_month, is_valid_month};
use crate::workshops::{is_total_tag, AliasTable, Group, TOTAL_TAG};
use crate::{Error, Result};

/// Twelve months of indicators for a scope
#[derive(Debug, Clone, Serialize)]
pub struct SeriesReport {
    pub scope: String,
    pub sub_unit: Option<String>,
    #[serde(flatten)]
    pub series: YearSeries,
}

#[derive(Debug, Clone, Serialize)]
pub struct YtdReport {
    pub scope: String,
    pub sub_unit: Option<String>,
    #[serde(flatten)]
    pub ytd: YearToDate,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub scope: String,
    pub sub_unit: Option<String>,
    pub year_a: YearSeries,
    pub year_b: YearSeries,
}

/// Thresholds in force for every indicator of a scope
#[derive(Debug, Clone, Serialize)]
pub struct ThresholdReport {
    pub scope: String,
    pub thresholds: KpiValues,
}

/// Current year to date next to the previous year
#[derive(Debug, Clone, Serialize)]
pub struct YtdOverview {
    pub scope: String,
    pub current: YearToDate,
    pub previous_same_period: YearToDate,
    pub previous_full_year: YearToDate,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthConformity {
    pub month: u32,
    pub value: f64,
    pub conformant: bool,
    pub status: ThresholdStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndicatorConformity {
    pub kpi: Kpi,
    pub indicator_name: &'static str,
    pub threshold: f64,
    pub months: Vec<MonthConformity>,
    pub conformant_months: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConformityReport {
    pub scope: String,
    pub year: i32,
    pub through_month: u32,
    pub indicators: Vec<IndicatorConformity>,
}

/// Direction of change between two yearly averages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Degrading,
    Stable,
}

/// One indicator over a year and the year before
#[derive(Debug, Clone, Serialize)]
pub struct IndicatorAnalysis {
    pub kpi: Kpi,
    pub indicator_name: &'static str,
    pub scope: String,
    pub year: i32,
    pub previous_year: i32,
    pub current: Vec<f64>,
    pub previous: Vec<f64>,
    pub threshold: f64,
    pub current_average: f64,
    pub previous_average: f64,
    /// Reduction of the average relative to the previous year, in percent
    pub improvement_pct: f64,
    pub current_violations: usize,
    pub previous_violations: usize,
    pub trend: Trend,
}

/// All counters of one workshop and sub-unit for a month
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlySubmission {
    pub month: u32,
    pub year: i32,
    pub workshop: String,
    pub sub_unit: String,
    #[serde(flatten)]
    pub counters: RawTotals,
}

/// Reporting facade over the stores
#[derive(Clone)]
pub struct KpiReports {
    scopes: ScopeResolver,
    aggregator: KpiAggregator,
    resolver: ThresholdResolver,
    thresholds: Arc<dyn ThresholdStore>,
    counters: Arc<dyn CounterStore>,
    nqc: NonQualityCost,
}

impl KpiReports {
    /// Facade over a SQLite pool with the standard alias table
    pub fn new(pool: SqlitePool, config: &KpiConfig) -> Self {
        let store = Arc::new(SqliteStore::new(pool));
        Self::with_stores(
            store.clone(),
            store.clone(),
            store,
            AliasTable::standard(),
            config,
        )
    }

    pub fn with_stores(
        counters: Arc<dyn CounterStore>,
        thresholds: Arc<dyn ThresholdStore>,
        nqc_store: Arc<dyn NqcStore>,
        aliases: AliasTable,
        config: &KpiConfig,
    ) -> Self {
        let nqc = NonQualityCost::new(nqc_store, config.nqc_default_threshold);
        Self {
            scopes: ScopeResolver::new(config.strict_scopes),
            aggregator: KpiAggregator::new(counters.clone(), nqc.clone(), Arc::new(aliases)),
            resolver: ThresholdResolver::new(thresholds.clone()),
            thresholds,
            counters,
            nqc,
        }
    }

    pub fn non_quality_cost(&self) -> &NonQualityCost {
        &self.nqc
    }

    pub fn resolve_scope(&self, scope: Option<&str>) -> Result<ScopeResolution> {
        self.scopes.resolve(scope)
    }

    /// Twelve monthly results of `year`
    pub async fn get_series(
        &self,
        scope: Option<&str>,
        sub_unit: Option<&str>,
        year: i32,
    ) -> Result<SeriesReport> {
        let resolved = self.scopes.resolve(scope)?;
        let series = self
            .aggregator
            .compute_series(&CounterKind::ALL, &resolved, sub_unit, year, 1..=12)
            .await?;

        Ok(SeriesReport {
            scope: resolved.label(),
            sub_unit: sub_unit.map(str::to_string),
            series,
        })
    }

    /// Year to date through `through_month`, or the default horizon
    pub async fn get_ytd(
        &self,
        scope: Option<&str>,
        sub_unit: Option<&str>,
        year: i32,
        through_month: Option<u32>,
    ) -> Result<YtdReport> {
        let resolved = self.scopes.resolve(scope)?;
        let through_month = through_month.unwrap_or_else(|| default_ytd_month(year, time::now()));
        let ytd = self
            .aggregator
            .compute_year_to_date(&resolved, sub_unit, year, through_month)
            .await?;

        Ok(YtdReport {
            scope: resolved.label(),
            sub_unit: sub_unit.map(str::to_string),
            ytd,
        })
    }

    pub async fn get_comparison(
        &self,
        scope: Option<&str>,
        sub_unit: Option<&str>,
        year_a: i32,
        year_b: i32,
    ) -> Result<ComparisonReport> {
        let resolved = self.scopes.resolve(scope)?;
        let comparison = self
            .aggregator
            .compute_comparison(&resolved, sub_unit, year_a, year_b)
            .await?;

        Ok(ComparisonReport {
            scope: resolved.label(),
            sub_unit: sub_unit.map(str::to_string),
            year_a: comparison.year_a,
            year_b: comparison.year_b,
        })
    }

    /// Threshold of every indicator for a scope
    ///
    /// The non-quality-cost threshold comes from the plant records of `year`
    /// and only applies to the plant-total scope.
    pub async fn get_thresholds(&self, scope: Option<&str>, year: Option<i32>) -> Result<ThresholdReport> {
        let resolved = self.scopes.resolve(scope)?;
        let thresholds = self.thresholds_for(&resolved, year).await?;

        Ok(ThresholdReport {
            scope: resolved.label(),
            thresholds,
        })
    }

    /// Current YTD, same period of the previous year and the previous full year
    pub async fn get_ytd_overview(
        &self,
        scope: Option<&str>,
        sub_unit: Option<&str>,
        year: i32,
        through_month: Option<u32>,
    ) -> Result<YtdOverview> {
        let resolved = self.scopes.resolve(scope)?;
        let through_month = through_month.unwrap_or_else(|| default_ytd_month(year, time::now()));
        let previous = previous_year(year)?;

        let (current, previous_same_period, previous_full_year) = futures::try_join!(
            self.aggregator
                .compute_year_to_date(&resolved, sub_unit, year, through_month),
            self.aggregator
                .compute_year_to_date(&resolved, sub_unit, previous, through_month),
            self.aggregator
                .compute_year_to_date(&resolved, sub_unit, previous, 12),
        )?;

        Ok(YtdOverview {
            scope: resolved.label(),
            current,
            previous_same_period,
            previous_full_year,
        })
    }

    /// Monthly conformity of every indicator against its threshold
    pub async fn get_conformity(
        &self,
        scope: Option<&str>,
        sub_unit: Option<&str>,
        year: i32,
        through_month: Option<u32>,
    ) -> Result<ConformityReport> {
        let resolved = self.scopes.resolve(scope)?;
        let through_month = through_month.unwrap_or_else(|| default_ytd_month(year, time::now()));
        if !is_valid_month(through_month) {
            return Err(Error::InvalidInput(format!("Invalid month: {}", through_month)));
        }

        let thresholds = self.thresholds_for(&resolved, Some(year)).await?;
        let series = self
            .aggregator
            .compute_series(&CounterKind::ALL, &resolved, sub_unit, year, 1..=through_month)
            .await?;

        let indicators = Kpi::ALL
            .into_iter()
            .map(|kpi| {
                let threshold = thresholds.get(kpi);
                let months: Vec<MonthConformity> = series
                    .months
                    .iter()
                    .map(|month| {
                        let value = month.kpis.get(kpi);
                        MonthConformity {
                            month: month.month,
                            value,
                            conformant: is_conformant(value, threshold),
                            status: classify(value, threshold, Direction::LowerIsBetter),
                        }
                    })
                    .collect();
                IndicatorConformity {
                    kpi,
                    indicator_name: kpi.indicator_name(),
                    threshold,
                    conformant_months: months.iter().filter(|m| m.conformant).count(),
                    months,
                }
            })
            .collect();

        Ok(ConformityReport {
            scope: resolved.label(),
            year,
            through_month,
            indicators,
        })
    }

    /// One indicator for `year` against `year - 1`
    pub async fn get_indicator_analysis(
        &self,
        kpi: Kpi,
        scope: Option<&str>,
        sub_unit: Option<&str>,
        year: i32,
    ) -> Result<IndicatorAnalysis> {
        let resolved = self.scopes.resolve(scope)?;
        let previous_year = previous_year(year)?;
        let kinds = crate::kpi::kinds_for(&[kpi]);

        let (current, previous) = futures::try_join!(
            self.aggregator
                .compute_series(&kinds, &resolved, sub_unit, year, 1..=12),
            self.aggregator
                .compute_series(&kinds, &resolved, sub_unit, previous_year, 1..=12),
        )?;
        let threshold = self.threshold_for(kpi, &resolved, Some(year)).await?;

        let current: Vec<f64> = current.months.iter().map(|m| m.kpis.get(kpi)).collect();
        let previous: Vec<f64> = previous.months.iter().map(|m| m.kpis.get(kpi)).collect();
        let current_average = average(&current);
        let previous_average = average(&previous);

        let improvement_pct = if previous_average > 0.0 {
            (previous_average - current_average) / previous_average * 100.0
        } else {
            0.0
        };
        let trend = if improvement_pct > 0.0 {
            Trend::Improving
        } else if improvement_pct < 0.0 {
            Trend::Degrading
        } else {
            Trend::Stable
        };

        Ok(IndicatorAnalysis {
            kpi,
            indicator_name: kpi.indicator_name(),
            scope: resolved.label(),
            year,
            previous_year,
            current_violations: violations(&current, threshold),
            previous_violations: violations(&previous, threshold),
            current,
            previous,
            threshold,
            current_average,
            previous_average,
            improvement_pct,
            trend,
        })
    }

    /// Aggregate month with each workshop of the scope
    pub async fn get_breakdown(
        &self,
        scope: Option<&str>,
        sub_unit: Option<&str>,
        month: u32,
        year: i32,
    ) -> Result<Breakdown> {
        let resolved = self.scopes.resolve(scope)?;
        self.aggregator
            .compute_breakdown(&resolved, sub_unit, month, year)
            .await
    }

    /// Store every counter of a monthly submission
    ///
    /// Each counter is written under the workshop's primary key for its
    /// family. Negative counts are stored as 0. Returns the month as it now
    /// reads for that workshop and sub-unit.
    pub async fn submit_month(&self, submission: &MonthlySubmission) -> Result<MonthKpis> {
        if submission.year <= 0 {
            return Err(Error::InvalidInput(format!("Invalid year: {}", submission.year)));
        }
        if !is_valid_month(submission.month) {
            return Err(Error::InvalidInput(format!(
                "Invalid month: {}",
                submission.month
            )));
        }
        let sub_unit = submission.sub_unit.trim();
        if sub_unit.is_empty() {
            return Err(Error::InvalidInput("Sub-unit is required".to_string()));
        }
        let workshop = submission.workshop.trim();
        if workshop.is_empty() {
            return Err(Error::InvalidInput("Workshop is required".to_string()));
        }

        let scope = self.scopes.resolve(Some(workshop))?;
        if scope.kind != ScopeKind::Single {
            return Err(Error::InvalidInput(format!(
                "Data must be entered for a single workshop, got '{}'",
                workshop
            )));
        }

        for kind in CounterKind::ALL {
            let value = submission.counters.get(kind);
            if !value.is_finite() {
                return Err(Error::InvalidInput(format!("Invalid value for {}", kind)));
            }
            if let Some(other) = self
                .aggregator
                .aliases()
                .primary_key_shared_with(kind.family(), workshop)
            {
                return Err(Error::InvalidInput(format!(
                    "{} shares its {} storage key with {}",
                    workshop, kind, other
                )));
            }
        }

        for kind in CounterKind::ALL {
            let mut value = submission.counters.get(kind);
            if value < 0.0 {
                warn!(
                    "Negative {} ({}) for {} {:02}/{}, storing 0",
                    kind, value, workshop, submission.month, submission.year
                );
                value = 0.0;
            }
            let key = self.aggregator.aliases().primary_key(kind.family(), workshop);
            self.counters
                .upsert(
                    kind,
                    submission.month,
                    submission.year,
                    &key,
                    sub_unit,
                    value,
                )
                .await?;
        }

        info!(
            "Stored counters for {} / {} {:02}/{}",
            workshop, sub_unit, submission.month, submission.year
        );

        self.aggregator
            .compute_month(
                &CounterKind::ALL,
                &scope,
                Some(sub_unit),
                submission.month,
                submission.year,
            )
            .await
    }

    /// Append a threshold version for a scope key
    pub async fn set_threshold(
        &self,
        scope_key: &str,
        kpi: Kpi,
        value: f64,
        modified_by: Option<&str>,
    ) -> Result<ThresholdRecord> {
        if !value.is_finite() || value < 0.0 {
            return Err(Error::InvalidInput(format!(
                "Threshold must be a non-negative number, got {}",
                value
            )));
        }
        let key = normalize_threshold_key(scope_key)?;

        let record = self
            .thresholds
            .record(&key, kpi.indicator_name(), value, modified_by, time::now())
            .await?;
        info!(
            "Threshold {} for {} set to {} by {}",
            kpi.indicator_name(),
            key,
            value,
            modified_by.unwrap_or("unknown")
        );
        Ok(record)
    }

    /// Latest row of every (scope key, indicator) pair
    pub async fn current_thresholds(&self) -> Result<Vec<ThresholdRecord>> {
        let mut seen = HashSet::new();
        let mut current: Vec<ThresholdRecord> = self
            .thresholds
            .all()
            .await?
            .into_iter()
            .filter(|record| seen.insert((record.scope_key.clone(), record.indicator.clone())))
            .collect();

        current.sort_by(|a, b| {
            a.scope_key
                .cmp(&b.scope_key)
                .then_with(|| a.indicator.cmp(&b.indicator))
        });
        Ok(current)
    }

    /// Every version of an indicator's thresholds, newest first
    pub async fn threshold_history(&self, kpi: Kpi) -> Result<Vec<ThresholdRecord>> {
        self.thresholds.all_for_indicator(kpi.indicator_name()).await
    }

    async fn thresholds_for(&self, scope: &ScopeResolution, year: Option<i32>) -> Result<KpiValues> {
        let mut values = KpiValues::default();
        for kpi in Kpi::ALL {
            let threshold = self.threshold_for(kpi, scope, year).await?;
            match kpi {
                Kpi::PpmOfficial => values.ppm_official = threshold,
                Kpi::PpmUnofficial => values.ppm_unofficial = threshold,
                Kpi::ScrapRate => values.scrap_rate_pct = threshold,
                Kpi::ReworkRate => values.rework_rate_pct = threshold,
                Kpi::ScrapCost => values.scrap_cost = threshold,
                Kpi::OfficialComplaints => values.official_complaints = threshold,
                Kpi::NonQualityCostIndex => values.non_quality_cost_index = threshold,
            }
        }
        Ok(values)
    }

    async fn threshold_for(&self, kpi: Kpi, scope: &ScopeResolution, year: Option<i32>) -> Result<f64> {
        match kpi {
            Kpi::NonQualityCostIndex if scope.is_plant_total() => self.nqc.threshold(year).await,
            Kpi::NonQualityCostIndex => Ok(0.0),
            _ => self.resolver.current_threshold(kpi, scope).await,
        }
    }
}

/// Canonical spelling of a threshold scope key
fn normalize_threshold_key(scope_key: &str) -> Result<String> {
    let key = scope_key.trim();
    if key.is_empty() {
        return Err(Error::InvalidInput("Threshold scope is required".to_string()));
    }
    if key.contains(',') {
        return Err(Error::InvalidScope(format!(
            "Thresholds are stored per workshop, group or plant, got '{}'",
            key
        )));
    }
    if is_total_tag(key) {
        return Ok(TOTAL_TAG.to_string());
    }
    if let Some(group) = Group::from_tag(key) {
        return Ok(group.tag().to_string());
    }
    Ok(key.to_string())
}

fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn previous_year(year: i32) -> Result<i32> {
    year.checked_sub(1)
        .ok_or_else(|| Error::InvalidInput(format!("Invalid year: {}", year)))
}

fn violations(values: &[f64], threshold: f64) -> usize {
    if threshold <= 0.0 {
        return 0;
    }
    values.iter().filter(|value| **value > threshold).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_key_normalization() {
        assert_eq!(normalize_threshold_key("Usine Complète").unwrap(), "Total");
        assert_eq!(normalize_threshold_key(" UAP 2 ").unwrap(), "UAP2");
        assert_eq!(normalize_threshold_key("Rack").unwrap(), "Rack");
        assert!(matches!(
            normalize_threshold_key("Rack,Moulage"),
            Err(Error::InvalidScope(_))
        ));
        assert!(matches!(
            normalize_threshold_key("  "),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_violations_ignore_missing_threshold() {
        assert_eq!(violations(&[5.0, 10.0, 15.0], 9.0), 2);
        assert_eq!(violations(&[5.0, 10.0, 15.0], 0.0), 0);
    }

    #[test]
    fn test_previous_year_does_not_overflow() {
        assert_eq!(previous_year(2025).unwrap(), 2024);
        assert!(matches!(previous_year(i32::MIN), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_average_of_empty_is_zero() {
        assert_eq!(average(&[]), 0.0);
        assert_eq!(average(&[1.0, 2.0, 3.0]), 2.0);
    }
}
