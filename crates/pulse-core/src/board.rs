//! Population state holder.
//!
//! [`PopulationBoard`] is the single source of truth for every figure
//! the dashboard serves. It tracks one [`Territory`] anchor per
//! tracked region and projects the current population from the anchor
//! and elapsed time on demand. Nothing derived is ever stored: a
//! [`Snapshot`] is recomputed on each broadcast tick and on each
//! direct fetch, so restarts and concurrent readers always agree.
//!
//! Anchors can be replaced at runtime by the authenticated
//! administrative update ([`update_base`](PopulationBoard::update_base))
//! when a new official statistical release lands. The replacement is
//! atomic under a write lock; validation failures leave prior state
//! intact.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::clock::Clock;
use crate::territory::{RateConsistency, Territory, DAYS_PER_YEAR, SECONDS_PER_YEAR};

/// Errors produced by board lookups and administrative updates.
#[derive(Debug, thiserror::Error)]
pub enum PopulationError {
    /// The named territory is not tracked.
    #[error("unknown territory: {name}")]
    UnknownTerritory {
        /// The name that failed to resolve.
        name: String,
    },

    /// A population value was negative.
    #[error("population must be non-negative, got {value}")]
    NegativePopulation {
        /// The rejected value.
        value: i64,
    },

    /// An annual birth or death count was negative.
    #[error("{field} must be non-negative, got {value}")]
    NegativeCount {
        /// Which field was rejected.
        field: &'static str,
        /// The rejected value.
        value: i64,
    },

    /// A reference timestamp lies in the future.
    #[error("reference timestamp {timestamp} is in the future")]
    FutureTimestamp {
        /// The rejected timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Two configured territories share a name.
    #[error("duplicate territory: {name}")]
    DuplicateTerritory {
        /// The name that appeared twice.
        name: String,
    },
}

/// A point-in-time computed population figure.
///
/// Derived, never persisted. `births_today` and `deaths_today` are the
/// deterministic daily counters: the annual rate scaled by the
/// fraction of the current day already elapsed in the board's
/// reporting timezone.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    /// Machine name of the territory.
    pub territory: String,

    /// Projected current population.
    pub population: u64,

    /// Signed change since the reference anchor.
    pub delta_since_reference: i64,

    /// Births so far today in the reporting timezone.
    pub births_today: u64,

    /// Deaths so far today in the reporting timezone.
    pub deaths_today: u64,

    /// The instant this snapshot was computed.
    pub computed_at: DateTime<Utc>,
}

/// A replacement anchor for one territory, as accepted by the
/// administrative update.
///
/// `population` is signed so that negative inputs reach validation
/// instead of failing opaquely at deserialization.
#[derive(Debug, Clone)]
pub struct BaseUpdate {
    /// New reference population. Rejected if negative.
    pub population: i64,

    /// New reference timestamp. Rejected if in the future.
    pub timestamp: DateTime<Utc>,

    /// Optional new annual growth rate (fraction per year).
    pub annual_growth_rate: Option<f64>,

    /// Optional new annual birth count. Rejected if negative.
    pub annual_births: Option<i64>,

    /// Optional new annual death count. Rejected if negative.
    pub annual_deaths: Option<i64>,
}

/// Process-wide population state, keyed by territory name.
pub struct PopulationBoard {
    territories: RwLock<BTreeMap<String, Territory>>,
    reporting_tz: Tz,
    clock: Arc<dyn Clock>,
}

impl PopulationBoard {
    /// Build a board from configured territories.
    ///
    /// Daily counters are computed against `reporting_tz` so "today"
    /// matches the dashboard's audience rather than UTC.
    ///
    /// # Errors
    ///
    /// Returns [`PopulationError::FutureTimestamp`] if any anchor lies
    /// in the future, or [`PopulationError::DuplicateTerritory`] if
    /// two entries share a name.
    pub fn new(
        territories: Vec<Territory>,
        reporting_tz: Tz,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, PopulationError> {
        let now = clock.now();
        let mut map = BTreeMap::new();
        for territory in territories {
            if territory.reference_timestamp > now {
                return Err(PopulationError::FutureTimestamp {
                    timestamp: territory.reference_timestamp,
                });
            }
            let name = territory.name.clone();
            if map.insert(name.clone(), territory).is_some() {
                return Err(PopulationError::DuplicateTerritory { name });
            }
        }
        Ok(Self {
            territories: RwLock::new(map),
            reporting_tz,
            clock,
        })
    }

    /// Compute the current snapshot for one territory.
    ///
    /// # Errors
    ///
    /// Returns [`PopulationError::UnknownTerritory`] if the name is
    /// not tracked.
    pub async fn current(&self, name: &str) -> Result<Snapshot, PopulationError> {
        let now = self.clock.now();
        let territories = self.territories.read().await;
        let territory = territories
            .get(name)
            .ok_or_else(|| PopulationError::UnknownTerritory {
                name: name.to_owned(),
            })?;
        Ok(project(territory, now, self.reporting_tz))
    }

    /// Compute current snapshots for every tracked territory.
    ///
    /// All snapshots in one call share the same `computed_at` instant.
    /// Ordering follows territory name.
    pub async fn current_all(&self) -> Vec<Snapshot> {
        let now = self.clock.now();
        let territories = self.territories.read().await;
        territories
            .values()
            .map(|territory| project(territory, now, self.reporting_tz))
            .collect()
    }

    /// Replace a territory's anchor atomically.
    ///
    /// All inputs are validated before the write lock is taken, so a
    /// rejected update observably never touches state.
    ///
    /// # Errors
    ///
    /// Returns a validation error for negative populations or counts,
    /// future timestamps, and unknown territories.
    pub async fn update_base(
        &self,
        name: &str,
        update: BaseUpdate,
    ) -> Result<Territory, PopulationError> {
        let population =
            u64::try_from(update.population).map_err(|_| PopulationError::NegativePopulation {
                value: update.population,
            })?;
        let births = match update.annual_births {
            Some(value) => Some(u64::try_from(value).map_err(|_| {
                PopulationError::NegativeCount {
                    field: "annual_births",
                    value,
                }
            })?),
            None => None,
        };
        let deaths = match update.annual_deaths {
            Some(value) => Some(u64::try_from(value).map_err(|_| {
                PopulationError::NegativeCount {
                    field: "annual_deaths",
                    value,
                }
            })?),
            None => None,
        };
        if update.timestamp > self.clock.now() {
            return Err(PopulationError::FutureTimestamp {
                timestamp: update.timestamp,
            });
        }

        let mut territories = self.territories.write().await;
        let territory =
            territories
                .get_mut(name)
                .ok_or_else(|| PopulationError::UnknownTerritory {
                    name: name.to_owned(),
                })?;

        territory.reference_population = population;
        territory.reference_timestamp = update.timestamp;
        if let Some(rate) = update.annual_growth_rate {
            territory.annual_growth_rate = rate;
        }
        if let Some(births) = births {
            territory.annual_births = births;
        }
        if let Some(deaths) = deaths {
            territory.annual_deaths = deaths;
        }

        tracing::info!(
            territory = name,
            reference_population = territory.reference_population,
            reference_timestamp = %territory.reference_timestamp,
            "territory anchor replaced"
        );

        Ok(territory.clone())
    }

    /// Clone the current territory records (static demographic data).
    pub async fn territories(&self) -> Vec<Territory> {
        let territories = self.territories.read().await;
        territories.values().cloned().collect()
    }

    /// Growth-rate consistency reports for every territory.
    pub async fn rate_consistency(&self) -> BTreeMap<String, RateConsistency> {
        let territories = self.territories.read().await;
        territories
            .iter()
            .map(|(name, territory)| (name.clone(), territory.rate_consistency()))
            .collect()
    }
}

/// Project a territory's population from its anchor to `now`.
///
/// `current = reference + reference * rate * (elapsed / seconds_per_year)`,
/// rounded to the nearest integer and clamped at zero. Daily counters
/// scale the annual birth/death counts by the fraction of the day
/// elapsed in the reporting timezone.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::arithmetic_side_effects
)]
fn project(territory: &Territory, now: DateTime<Utc>, tz: Tz) -> Snapshot {
    let reference = territory.reference_population as f64;
    let elapsed_seconds =
        (now - territory.reference_timestamp).num_milliseconds() as f64 / 1000.0;
    let growth = reference * territory.annual_growth_rate * (elapsed_seconds / SECONDS_PER_YEAR);
    let population = (reference + growth).round().max(0.0) as u64;
    let delta_since_reference = population as i64 - territory.reference_population as i64;

    let seconds_today = now.with_timezone(&tz).time().num_seconds_from_midnight();
    let day_fraction = f64::from(seconds_today) / 86_400.0;
    let births_today = (territory.annual_births as f64 / DAYS_PER_YEAR * day_fraction) as u64;
    let deaths_today = (territory.annual_deaths as f64 / DAYS_PER_YEAR * day_fraction) as u64;

    Snapshot {
        territory: territory.name.clone(),
        population,
        delta_since_reference,
        births_today,
        deaths_today,
        computed_at: now,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, TimeZone};

    use crate::clock::ManualClock;

    use super::*;

    fn reference_instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn make_territory(name: &str, population: u64, rate: f64) -> Territory {
        Territory {
            name: name.to_owned(),
            display_name: String::new(),
            reference_population: population,
            reference_timestamp: reference_instant(),
            annual_growth_rate: rate,
            annual_births: 365_250,
            annual_deaths: 730_500,
            birth_rate: 4.2,
            death_rate: 6.3,
            fertility_rate: 0.748,
            life_expectancy: 75.5,
            data_source: String::from("test"),
        }
    }

    fn make_board(territories: Vec<Territory>, clock: Arc<ManualClock>) -> PopulationBoard {
        PopulationBoard::new(territories, chrono_tz::UTC, clock).unwrap()
    }

    #[tokio::test]
    async fn current_at_reference_equals_reference_population() {
        let clock = Arc::new(ManualClock::new(reference_instant()));
        let board = make_board(
            vec![make_territory("testland", 51_751_065, -0.0017)],
            Arc::clone(&clock),
        );

        let snapshot = board.current("testland").await.unwrap();
        assert_eq!(snapshot.population, 51_751_065);
        assert_eq!(snapshot.delta_since_reference, 0);
        assert_eq!(snapshot.computed_at, reference_instant());
    }

    #[tokio::test]
    async fn one_year_projection_matches_growth_rate() {
        // reference 51,751,065 at t0, rate -0.0017: after exactly one
        // 365.25-day year the projection is reference * (1 - 0.0017),
        // about 51,663,041 within rounding.
        let clock = Arc::new(ManualClock::new(reference_instant()));
        let board = make_board(
            vec![make_territory("testland", 51_751_065, -0.0017)],
            Arc::clone(&clock),
        );

        clock.advance(Duration::days(365) + Duration::hours(6));
        let snapshot = board.current("testland").await.unwrap();

        let expected: i64 = 51_663_041;
        let diff = i64::try_from(snapshot.population).unwrap() - expected;
        assert!(
            diff.abs() <= 100,
            "one-year projection {} too far from {expected}",
            snapshot.population
        );
        assert!(snapshot.delta_since_reference < 0);
    }

    #[tokio::test]
    async fn projection_is_monotonic_in_time() {
        let clock = Arc::new(ManualClock::new(reference_instant()));
        let board = make_board(
            vec![
                make_territory("growing", 25_971_909, 0.004),
                make_territory("shrinking", 51_628_117, -0.0021),
            ],
            Arc::clone(&clock),
        );

        let mut previous_growing = board.current("growing").await.unwrap().population;
        let mut previous_shrinking = board.current("shrinking").await.unwrap().population;

        for _ in 0..12 {
            clock.advance(Duration::days(30));
            let growing = board.current("growing").await.unwrap().population;
            let shrinking = board.current("shrinking").await.unwrap().population;
            assert!(growing > previous_growing, "positive rate must increase");
            assert!(shrinking < previous_shrinking, "negative rate must decrease");
            previous_growing = growing;
            previous_shrinking = shrinking;
        }
    }

    #[tokio::test]
    async fn daily_counters_scale_with_day_fraction() {
        // annual_births 365,250 over a 365.25-day year is exactly
        // 1000 births per day; at noon UTC half of them have happened.
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        ));
        let board = make_board(
            vec![make_territory("testland", 1_000_000, 0.0)],
            Arc::clone(&clock),
        );

        let snapshot = board.current("testland").await.unwrap();
        assert_eq!(snapshot.births_today, 500);
        assert_eq!(snapshot.deaths_today, 1000);
    }

    #[tokio::test]
    async fn unknown_territory_is_an_error() {
        let clock = Arc::new(ManualClock::new(reference_instant()));
        let board = make_board(
            vec![make_territory("testland", 1_000, 0.0)],
            Arc::clone(&clock),
        );

        let result = board.current("atlantis").await;
        assert!(matches!(
            result,
            Err(PopulationError::UnknownTerritory { .. })
        ));
    }

    #[tokio::test]
    async fn update_base_replaces_anchor() {
        let clock = Arc::new(ManualClock::new(reference_instant()));
        let board = make_board(
            vec![make_territory("testland", 1_000_000, 0.001)],
            Arc::clone(&clock),
        );

        clock.advance(Duration::days(400));
        let new_anchor = clock.now() - Duration::days(1);
        let updated = board
            .update_base(
                "testland",
                BaseUpdate {
                    population: 2_000_000,
                    timestamp: new_anchor,
                    annual_growth_rate: Some(0.002),
                    annual_births: Some(50_000),
                    annual_deaths: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.reference_population, 2_000_000);
        assert_eq!(updated.reference_timestamp, new_anchor);
        assert_eq!(updated.annual_births, 50_000);
        // Untouched optional field keeps its prior value.
        assert_eq!(updated.annual_deaths, 730_500);

        let snapshot = board.current("testland").await.unwrap();
        assert!(snapshot.population >= 2_000_000);
    }

    #[tokio::test]
    async fn update_base_rejects_negative_population() {
        let clock = Arc::new(ManualClock::new(reference_instant()));
        let board = make_board(
            vec![make_territory("testland", 1_000_000, 0.001)],
            Arc::clone(&clock),
        );

        let result = board
            .update_base(
                "testland",
                BaseUpdate {
                    population: -5,
                    timestamp: reference_instant(),
                    annual_growth_rate: None,
                    annual_births: None,
                    annual_deaths: None,
                },
            )
            .await;
        assert!(matches!(
            result,
            Err(PopulationError::NegativePopulation { value: -5 })
        ));

        // Prior state intact.
        let snapshot = board.current("testland").await.unwrap();
        assert_eq!(snapshot.population, 1_000_000);
    }

    #[tokio::test]
    async fn update_base_rejects_future_timestamp() {
        let clock = Arc::new(ManualClock::new(reference_instant()));
        let board = make_board(
            vec![make_territory("testland", 1_000_000, 0.001)],
            Arc::clone(&clock),
        );

        let result = board
            .update_base(
                "testland",
                BaseUpdate {
                    population: 1_500_000,
                    timestamp: clock.now() + Duration::days(1),
                    annual_growth_rate: None,
                    annual_births: None,
                    annual_deaths: None,
                },
            )
            .await;
        assert!(matches!(result, Err(PopulationError::FutureTimestamp { .. })));

        let snapshot = board.current("testland").await.unwrap();
        assert_eq!(snapshot.population, 1_000_000);
    }

    #[tokio::test]
    async fn board_rejects_future_reference_at_construction() {
        let clock = Arc::new(ManualClock::new(reference_instant()));
        let mut territory = make_territory("testland", 1_000, 0.0);
        territory.reference_timestamp = reference_instant() + Duration::days(1);

        let result = PopulationBoard::new(vec![territory], chrono_tz::UTC, clock);
        assert!(matches!(result, Err(PopulationError::FutureTimestamp { .. })));
    }

    #[tokio::test]
    async fn board_rejects_duplicate_names() {
        let clock = Arc::new(ManualClock::new(reference_instant()));
        let result = PopulationBoard::new(
            vec![
                make_territory("testland", 1_000, 0.0),
                make_territory("testland", 2_000, 0.0),
            ],
            chrono_tz::UTC,
            clock,
        );
        assert!(matches!(
            result,
            Err(PopulationError::DuplicateTerritory { .. })
        ));
    }
}
