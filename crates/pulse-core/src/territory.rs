//! Territory records anchoring each population counter to official
//! statistics.
//!
//! A [`Territory`] is a tracked population region with a growth anchor:
//! an official reference population at a reference timestamp, advanced
//! deterministically by the annual growth rate. The supplementary
//! demographic fields (annual births/deaths, crude rates, fertility,
//! life expectancy) are served by the data API and drive the derived
//! daily counters; only the anchor triple participates in projection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Seconds in an average Gregorian year (365.25 days, accounting for
/// leap years).
pub const SECONDS_PER_YEAR: f64 = 365.25 * 86_400.0;

/// Days in an average Gregorian year.
pub const DAYS_PER_YEAR: f64 = 365.25;

/// Official demographic data for one tracked territory.
///
/// Deserialized directly from the `population.territories` list in the
/// configuration file. `annual_growth_rate` is a fraction per year
/// (`-0.0021` means −0.21 % per year), not a percentage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Territory {
    /// Machine name used as the lookup key (e.g. `south_korea`).
    pub name: String,

    /// Human-readable name shown on the dashboard. Falls back to
    /// `name` when empty.
    #[serde(default)]
    pub display_name: String,

    /// Official population count at `reference_timestamp`.
    pub reference_population: u64,

    /// Instant the reference count was taken. Must not be in the
    /// future.
    pub reference_timestamp: DateTime<Utc>,

    /// Net annual growth as a fraction of the reference population.
    pub annual_growth_rate: f64,

    /// Births per year from the same statistical release.
    #[serde(default)]
    pub annual_births: u64,

    /// Deaths per year from the same statistical release.
    #[serde(default)]
    pub annual_deaths: u64,

    /// Crude birth rate per 1000 inhabitants.
    #[serde(default)]
    pub birth_rate: f64,

    /// Crude death rate per 1000 inhabitants.
    #[serde(default)]
    pub death_rate: f64,

    /// Total fertility rate (children per woman).
    #[serde(default)]
    pub fertility_rate: f64,

    /// Life expectancy at birth in years.
    #[serde(default)]
    pub life_expectancy: f64,

    /// Name of the statistical source the anchor was taken from.
    #[serde(default)]
    pub data_source: String,
}

impl Territory {
    /// The name to display on rendered pages.
    pub fn label(&self) -> &str {
        if self.display_name.is_empty() {
            &self.name
        } else {
            &self.display_name
        }
    }

    /// Births per second implied by the annual birth count.
    #[allow(clippy::cast_precision_loss)]
    pub fn births_per_second(&self) -> f64 {
        self.annual_births as f64 / SECONDS_PER_YEAR
    }

    /// Deaths per second implied by the annual death count.
    #[allow(clippy::cast_precision_loss)]
    pub fn deaths_per_second(&self) -> f64 {
        self.annual_deaths as f64 / SECONDS_PER_YEAR
    }

    /// Cross-check the stated growth rate against the crude birth and
    /// death rates.
    ///
    /// The implied rate is `(birth_rate - death_rate) / 1000` (both
    /// crude rates are per 1000 inhabitants). Statistical releases
    /// round these independently, so a small discrepancy is expected;
    /// the report flags anything above one percentage point.
    #[allow(clippy::arithmetic_side_effects)]
    pub fn rate_consistency(&self) -> RateConsistency {
        let implied = (self.birth_rate - self.death_rate) / 1000.0;
        let discrepancy = (self.annual_growth_rate - implied).abs();
        RateConsistency {
            stated_growth_rate: self.annual_growth_rate,
            implied_growth_rate: implied,
            discrepancy,
            consistent: discrepancy < 0.01,
        }
    }
}

/// Result of cross-checking a territory's stated growth rate against
/// its crude birth and death rates.
#[derive(Debug, Clone, Serialize)]
pub struct RateConsistency {
    /// The growth rate the statistical release states (fraction per
    /// year).
    pub stated_growth_rate: f64,

    /// The growth rate implied by crude birth and death rates.
    pub implied_growth_rate: f64,

    /// Absolute difference between stated and implied rates.
    pub discrepancy: f64,

    /// Whether the discrepancy is within one percentage point.
    pub consistent: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn make_territory() -> Territory {
        Territory {
            name: String::from("testland"),
            display_name: String::from("Testland"),
            reference_population: 1_000_000,
            reference_timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            annual_growth_rate: 0.001,
            annual_births: 31_557_600,
            annual_deaths: 15_778_800,
            birth_rate: 4.0,
            death_rate: 3.0,
            fertility_rate: 1.2,
            life_expectancy: 80.0,
            data_source: String::from("test"),
        }
    }

    #[test]
    fn label_falls_back_to_name() {
        let mut territory = make_territory();
        assert_eq!(territory.label(), "Testland");
        territory.display_name.clear();
        assert_eq!(territory.label(), "testland");
    }

    #[test]
    fn per_second_rates_divide_by_year_seconds() {
        // 31,557,600 = seconds per 365.25-day year, so exactly one
        // birth per second and one death every two seconds.
        let territory = make_territory();
        assert!((territory.births_per_second() - 1.0).abs() < 1e-9);
        assert!((territory.deaths_per_second() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn rate_consistency_flags_large_discrepancy() {
        let mut territory = make_territory();
        // birth 4.0/1000, death 3.0/1000 -> implied +0.001, matches stated.
        let report = territory.rate_consistency();
        assert!(report.consistent);
        assert!(report.discrepancy < 1e-9);

        territory.annual_growth_rate = 0.05;
        let report = territory.rate_consistency();
        assert!(!report.consistent);
    }
}
