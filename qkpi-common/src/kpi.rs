//! Counter kinds, KPI definitions and KPI derivation
//!
//! Raw counters are summed into [`RawTotals`]; the seven reported KPIs are
//! derived from those totals by [`KpiValues::derive`]. Every ratio uses the
//! same zero-denominator policy: a zero or negative denominator yields 0.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::AddAssign;
use std::str::FromStr;

use crate::Error;

/// Scale factor for parts-per-million indicators
pub const PPM_SCALE: f64 = 1_000_000.0;

/// Scale factor for percentage indicators
pub const PERCENT_SCALE: f64 = 100.0;

/// Raw counter families, each stored in its own fact table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterKind {
    Exported,
    Claimed,
    Alerted,
    Reworked,
    Scrapped,
    Inspected,
    ScrapCost,
    OfficialComplaints,
}

/// Storage-key family of a counter kind
///
/// Counter tables were historically filled by different data-entry forms, so
/// the same workshop is keyed differently depending on the family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterFamily {
    Production,
    ScrapCost,
    Complaints,
}

impl CounterKind {
    pub const ALL: [CounterKind; 8] = [
        CounterKind::Exported,
        CounterKind::Claimed,
        CounterKind::Alerted,
        CounterKind::Reworked,
        CounterKind::Scrapped,
        CounterKind::Inspected,
        CounterKind::ScrapCost,
        CounterKind::OfficialComplaints,
    ];

    /// Fact table holding this counter
    pub fn table(self) -> &'static str {
        match self {
            CounterKind::Exported => "exported_pieces",
            CounterKind::Claimed => "claimed_pieces",
            CounterKind::Alerted => "alerts",
            CounterKind::Reworked => "reworked_pieces",
            CounterKind::Scrapped => "scrapped_pieces",
            CounterKind::Inspected => "inspected_pieces",
            CounterKind::ScrapCost => "scrap_cost",
            CounterKind::OfficialComplaints => "official_complaints",
        }
    }

    /// Value column of the fact table
    pub fn value_column(self) -> &'static str {
        match self {
            CounterKind::ScrapCost => "amount",
            _ => "quantity",
        }
    }

    /// Whether the counter holds a monetary amount rather than a piece count
    pub fn is_monetary(self) -> bool {
        matches!(self, CounterKind::ScrapCost)
    }

    pub fn family(self) -> CounterFamily {
        match self {
            CounterKind::ScrapCost => CounterFamily::ScrapCost,
            CounterKind::OfficialComplaints => CounterFamily::Complaints,
            _ => CounterFamily::Production,
        }
    }
}

impl fmt::Display for CounterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// The seven reported indicators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Kpi {
    #[serde(rename = "ppm_official")]
    PpmOfficial,
    #[serde(rename = "ppm_unofficial")]
    PpmUnofficial,
    #[serde(rename = "scrap_rate_pct")]
    ScrapRate,
    #[serde(rename = "rework_rate_pct")]
    ReworkRate,
    #[serde(rename = "scrap_cost")]
    ScrapCost,
    #[serde(rename = "official_complaints")]
    OfficialComplaints,
    #[serde(rename = "non_quality_cost_index")]
    NonQualityCostIndex,
}

impl Kpi {
    pub const ALL: [Kpi; 7] = [
        Kpi::PpmOfficial,
        Kpi::PpmUnofficial,
        Kpi::ScrapRate,
        Kpi::ReworkRate,
        Kpi::ScrapCost,
        Kpi::OfficialComplaints,
        Kpi::NonQualityCostIndex,
    ];

    /// Key used in API payloads
    pub fn key(self) -> &'static str {
        match self {
            Kpi::PpmOfficial => "ppm_official",
            Kpi::PpmUnofficial => "ppm_unofficial",
            Kpi::ScrapRate => "scrap_rate_pct",
            Kpi::ReworkRate => "rework_rate_pct",
            Kpi::ScrapCost => "scrap_cost",
            Kpi::OfficialComplaints => "official_complaints",
            Kpi::NonQualityCostIndex => "non_quality_cost_index",
        }
    }

    /// Indicator name as stored in the thresholds table
    pub fn indicator_name(self) -> &'static str {
        match self {
            Kpi::PpmOfficial => "PPM Officiel",
            Kpi::PpmUnofficial => "PPM Non Officiel",
            Kpi::ScrapRate => "Taux de Rebut",
            Kpi::ReworkRate => "Taux de Retouche",
            Kpi::ScrapCost => "Coût de Rebut",
            Kpi::OfficialComplaints => "Nombre de reclamation",
            Kpi::NonQualityCostIndex => "CNQ",
        }
    }

    /// Counter kinds the indicator is derived from
    ///
    /// The non-quality-cost index is stored directly and needs no counters.
    pub fn required_kinds(self) -> &'static [CounterKind] {
        match self {
            Kpi::PpmOfficial => &[CounterKind::Claimed, CounterKind::Exported],
            Kpi::PpmUnofficial => &[CounterKind::Alerted, CounterKind::Exported],
            Kpi::ScrapRate => &[CounterKind::Scrapped, CounterKind::Inspected],
            Kpi::ReworkRate => &[CounterKind::Reworked, CounterKind::Inspected],
            Kpi::ScrapCost => &[CounterKind::ScrapCost],
            Kpi::OfficialComplaints => &[CounterKind::OfficialComplaints],
            Kpi::NonQualityCostIndex => &[],
        }
    }
}

impl fmt::Display for Kpi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Kpi {
    type Err = Error;

    /// Accepts either the API key or the stored indicator name
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Kpi::ALL
            .into_iter()
            .find(|kpi| kpi.key() == s || kpi.indicator_name() == s)
            .ok_or_else(|| Error::InvalidInput(format!("Unknown indicator: {}", s)))
    }
}

/// Distinct counter kinds needed to derive the given indicators
pub fn kinds_for(kpis: &[Kpi]) -> Vec<CounterKind> {
    let mut kinds: Vec<CounterKind> = kpis
        .iter()
        .flat_map(|kpi| kpi.required_kinds().iter().copied())
        .collect();
    kinds.sort();
    kinds.dedup();
    kinds
}

/// Summed raw counters for one (scope, period)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawTotals {
    pub exported: f64,
    pub claimed: f64,
    pub alerted: f64,
    pub reworked: f64,
    pub scrapped: f64,
    pub inspected: f64,
    pub scrap_cost: f64,
    pub official_complaints: f64,
}

impl RawTotals {
    pub fn get(&self, kind: CounterKind) -> f64 {
        match kind {
            CounterKind::Exported => self.exported,
            CounterKind::Claimed => self.claimed,
            CounterKind::Alerted => self.alerted,
            CounterKind::Reworked => self.reworked,
            CounterKind::Scrapped => self.scrapped,
            CounterKind::Inspected => self.inspected,
            CounterKind::ScrapCost => self.scrap_cost,
            CounterKind::OfficialComplaints => self.official_complaints,
        }
    }

    pub fn add(&mut self, kind: CounterKind, value: f64) {
        let slot = match kind {
            CounterKind::Exported => &mut self.exported,
            CounterKind::Claimed => &mut self.claimed,
            CounterKind::Alerted => &mut self.alerted,
            CounterKind::Reworked => &mut self.reworked,
            CounterKind::Scrapped => &mut self.scrapped,
            CounterKind::Inspected => &mut self.inspected,
            CounterKind::ScrapCost => &mut self.scrap_cost,
            CounterKind::OfficialComplaints => &mut self.official_complaints,
        };
        *slot += value;
    }
}

impl AddAssign<&RawTotals> for RawTotals {
    fn add_assign(&mut self, other: &RawTotals) {
        for kind in CounterKind::ALL {
            self.add(kind, other.get(kind));
        }
    }
}

/// `numerator / denominator * scale`, or 0 when the denominator is not positive
pub fn ratio(numerator: f64, denominator: f64, scale: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator * scale
    } else {
        0.0
    }
}

/// Derived indicators for one (scope, period)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct KpiValues {
    pub ppm_official: f64,
    pub ppm_unofficial: f64,
    pub scrap_rate_pct: f64,
    pub rework_rate_pct: f64,
    pub scrap_cost: f64,
    pub official_complaints: f64,
    pub non_quality_cost_index: f64,
}

impl KpiValues {
    /// Derive all indicators from raw totals
    ///
    /// `non_quality_cost_index` is not derivable from counters and is passed
    /// through as supplied by the caller.
    pub fn derive(raw: &RawTotals, non_quality_cost_index: f64) -> Self {
        Self {
            ppm_official: ratio(raw.claimed, raw.exported, PPM_SCALE),
            ppm_unofficial: ratio(raw.alerted, raw.exported, PPM_SCALE),
            scrap_rate_pct: ratio(raw.scrapped, raw.inspected, PERCENT_SCALE),
            rework_rate_pct: ratio(raw.reworked, raw.inspected, PERCENT_SCALE),
            scrap_cost: raw.scrap_cost,
            official_complaints: raw.official_complaints,
            non_quality_cost_index,
        }
    }

    pub fn get(&self, kpi: Kpi) -> f64 {
        match kpi {
            Kpi::PpmOfficial => self.ppm_official,
            Kpi::PpmUnofficial => self.ppm_unofficial,
            Kpi::ScrapRate => self.scrap_rate_pct,
            Kpi::ReworkRate => self.rework_rate_pct,
            Kpi::ScrapCost => self.scrap_cost,
            Kpi::OfficialComplaints => self.official_complaints,
            Kpi::NonQualityCostIndex => self.non_quality_cost_index,
        }
    }
}
