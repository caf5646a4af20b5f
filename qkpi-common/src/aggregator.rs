//! KPI aggregation over scopes and periods
//!
//! Counters are summed per (kind, month) across every storage key of the
//! scope's workshops, then the indicators are derived from the sums. Sums are
//! never averaged: a multi-month or multi-workshop ratio is the ratio of the
//! summed counters.

use futures::future::try_join_all;
use serde::Serialize;
use std::ops::RangeInclusive;
use std::sync::Arc;
use tracing::debug;

use crate::kpi::{CounterKind, KpiValues, RawTotals};
use crate::non_quality_cost::NonQualityCost;
use crate::scope::ScopeResolution;
use crate::store::CounterStore;
use crate::time::is_valid_month;
use crate::workshops::AliasTable;
use crate::{Error, Result};

/// Raw totals and indicators of one month
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthKpis {
    pub month: u32,
    pub year: i32,
    pub raw: RawTotals,
    pub kpis: KpiValues,
}

/// Consecutive months of one year
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearSeries {
    pub year: i32,
    pub months: Vec<MonthKpis>,
}

impl YearSeries {
    /// Sum of the raw totals of every month in the series
    pub fn raw_total(&self) -> RawTotals {
        let mut total = RawTotals::default();
        for month in &self.months {
            total += &month.raw;
        }
        total
    }
}

/// Accumulated January..through_month window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearToDate {
    pub year: i32,
    pub through_month: u32,
    pub raw: RawTotals,
    pub kpis: KpiValues,
}

/// Two full years side by side
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub year_a: YearSeries,
    pub year_b: YearSeries,
}

/// One workshop's share of a multi-workshop month
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkshopKpis {
    pub workshop: String,
    pub raw: RawTotals,
    pub kpis: KpiValues,
}

/// Aggregate month with its per-workshop detail
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Breakdown {
    pub aggregate: MonthKpis,
    pub workshops: Vec<WorkshopKpis>,
}

/// Sums counters for a scope and derives the indicators
#[derive(Clone)]
pub struct KpiAggregator {
    counters: Arc<dyn CounterStore>,
    nqc: NonQualityCost,
    aliases: Arc<AliasTable>,
}

impl KpiAggregator {
    pub fn new(counters: Arc<dyn CounterStore>, nqc: NonQualityCost, aliases: Arc<AliasTable>) -> Self {
        Self {
            counters,
            nqc,
            aliases,
        }
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    /// Indicators of one month
    ///
    /// Only `kinds` are read; every other counter stays 0. The
    /// non-quality-cost index is filled for the plant-total scope only.
    pub async fn compute_month(
        &self,
        kinds: &[CounterKind],
        scope: &ScopeResolution,
        sub_unit: Option<&str>,
        month: u32,
        year: i32,
    ) -> Result<MonthKpis> {
        check_month(month)?;

        let raw = self
            .sum_counters(kinds, &scope.workshops, sub_unit, month, year)
            .await?;
        let nqc = if scope.is_plant_total() {
            self.nqc.monthly_value(year, month).await?
        } else {
            0.0
        };

        Ok(MonthKpis {
            month,
            year,
            kpis: KpiValues::derive(&raw, nqc),
            raw,
        })
    }

    /// Independent per-month results, in month order
    pub async fn compute_series(
        &self,
        kinds: &[CounterKind],
        scope: &ScopeResolution,
        sub_unit: Option<&str>,
        year: i32,
        months: RangeInclusive<u32>,
    ) -> Result<YearSeries> {
        if months.is_empty() {
            return Err(Error::InvalidInput(format!(
                "Empty month range {}..={}",
                months.start(),
                months.end()
            )));
        }
        check_month(*months.start())?;
        check_month(*months.end())?;

        let months = try_join_all(
            months.map(|month| self.compute_month(kinds, scope, sub_unit, month, year)),
        )
        .await?;

        Ok(YearSeries { year, months })
    }

    /// January through `through_month`, indicators derived from the summed
    /// counters
    ///
    /// The non-quality-cost index is the stored year-to-date snapshot rather
    /// than a sum of monthly indexes.
    pub async fn compute_year_to_date(
        &self,
        scope: &ScopeResolution,
        sub_unit: Option<&str>,
        year: i32,
        through_month: u32,
    ) -> Result<YearToDate> {
        check_month(through_month)?;

        let series = self
            .compute_series(&CounterKind::ALL, scope, sub_unit, year, 1..=through_month)
            .await?;
        let raw = series.raw_total();
        let nqc = if scope.is_plant_total() {
            self.nqc.year_to_date_snapshot(year).await?
        } else {
            0.0
        };

        debug!(
            "YTD {} through {:02}/{}: {:?}",
            scope.label(),
            through_month,
            year,
            raw
        );

        Ok(YearToDate {
            year,
            through_month,
            kpis: KpiValues::derive(&raw, nqc),
            raw,
        })
    }

    /// Twelve months of `year_a` and of `year_b`
    pub async fn compute_comparison(
        &self,
        scope: &ScopeResolution,
        sub_unit: Option<&str>,
        year_a: i32,
        year_b: i32,
    ) -> Result<Comparison> {
        let (year_a, year_b) = futures::try_join!(
            self.compute_series(&CounterKind::ALL, scope, sub_unit, year_a, 1..=12),
            self.compute_series(&CounterKind::ALL, scope, sub_unit, year_b, 1..=12),
        )?;

        Ok(Comparison { year_a, year_b })
    }

    /// Aggregate month plus each workshop computed on its own
    pub async fn compute_breakdown(
        &self,
        scope: &ScopeResolution,
        sub_unit: Option<&str>,
        month: u32,
        year: i32,
    ) -> Result<Breakdown> {
        let aggregate = self
            .compute_month(&CounterKind::ALL, scope, sub_unit, month, year)
            .await?;

        let mut workshops = Vec::with_capacity(scope.workshops.len());
        for workshop in &scope.workshops {
            let raw = self
                .sum_counters(
                    &CounterKind::ALL,
                    std::slice::from_ref(workshop),
                    sub_unit,
                    month,
                    year,
                )
                .await?;
            workshops.push(WorkshopKpis {
                workshop: workshop.clone(),
                kpis: KpiValues::derive(&raw, 0.0),
                raw,
            });
        }

        Ok(Breakdown {
            aggregate,
            workshops,
        })
    }

    async fn sum_counters(
        &self,
        kinds: &[CounterKind],
        workshops: &[String],
        sub_unit: Option<&str>,
        month: u32,
        year: i32,
    ) -> Result<RawTotals> {
        let mut raw = RawTotals::default();
        for &kind in kinds {
            for key in self.storage_keys(kind, workshops) {
                let value = self.counters.sum(kind, month, year, &key, sub_unit).await?;
                raw.add(kind, value);
            }
        }
        Ok(raw)
    }

    /// Distinct storage keys of the workshops for one counter kind
    ///
    /// Several workshops may share a legacy key; it is read once.
    fn storage_keys(&self, kind: CounterKind, workshops: &[String]) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        for workshop in workshops {
            for key in self.aliases.storage_keys(kind.family(), workshop) {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        keys
    }
}

fn check_month(month: u32) -> Result<()> {
    if !is_valid_month(month) {
        return Err(Error::InvalidInput(format!("Invalid month: {}", month)));
    }
    Ok(())
}
