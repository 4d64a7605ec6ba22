//! Periodic broadcast loop pushing population ticks to live
//! connections.
//!
//! A single background task wakes on a fixed interval, recomputes a
//! [`Snapshot`] per territory from the [`PopulationBoard`], serializes
//! one JSON [`TickMessage`], and delivers it through the
//! [`ConnectionRegistry`]. A failed delivery evicts that connection
//! and nothing else; a failed tick is logged and the loop continues on
//! the next interval. The loop runs until the shared
//! [`BroadcastControl`] requests a stop, checked cooperatively at each
//! tick boundary.
//!
//! The tick body is a separately callable [`Broadcaster::tick`] so
//! tests drive single ticks against a manual clock instead of waiting
//! on real delays.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::board::{PopulationBoard, Snapshot};
use crate::clock::Clock;
use crate::registry::ConnectionRegistry;

/// Errors that can occur while assembling a broadcast tick.
#[derive(Debug, thiserror::Error)]
pub enum BroadcastError {
    /// The tick message could not be serialized.
    #[error("failed to serialize tick message: {source}")]
    Serialize {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },
}

/// Discriminator for outbound live messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// First message after a connection opens, carrying the figures at
    /// connect time.
    InitialState,
    /// One periodic broadcast tick.
    Tick,
}

/// Per-territory figures carried in one outbound message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerritoryFigures {
    /// Projected current population.
    pub population: u64,
    /// Signed change since the reference anchor.
    pub delta: i64,
    /// Births so far today in the reporting timezone.
    pub births_today: u64,
    /// Deaths so far today in the reporting timezone.
    pub deaths_today: u64,
    /// When the figure was computed.
    pub timestamp: DateTime<Utc>,
}

/// One outbound live message: territory name mapped to its figures,
/// plus the combined total.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickMessage {
    /// Message discriminator (`initial_state` or `tick`).
    #[serde(rename = "type")]
    pub kind: MessageKind,

    /// When the carried figures were computed.
    pub computed_at: DateTime<Utc>,

    /// Figures keyed by territory name.
    pub territories: BTreeMap<String, TerritoryFigures>,

    /// Sum of all territory populations.
    pub total_population: u64,
}

impl TickMessage {
    /// Assemble a message from board snapshots.
    pub fn from_snapshots(
        kind: MessageKind,
        computed_at: DateTime<Utc>,
        snapshots: &[Snapshot],
    ) -> Self {
        let territories: BTreeMap<String, TerritoryFigures> = snapshots
            .iter()
            .map(|snapshot| {
                (
                    snapshot.territory.clone(),
                    TerritoryFigures {
                        population: snapshot.population,
                        delta: snapshot.delta_since_reference,
                        births_today: snapshot.births_today,
                        deaths_today: snapshot.deaths_today,
                        timestamp: snapshot.computed_at,
                    },
                )
            })
            .collect();
        let total_population = territories
            .values()
            .fold(0_u64, |total, figures| {
                total.saturating_add(figures.population)
            });
        Self {
            kind,
            computed_at,
            territories,
            total_population,
        }
    }
}

/// Cooperative stop flag shared between the broadcast loop and the
/// process shutdown path.
#[derive(Debug, Default)]
pub struct BroadcastControl {
    stop_requested: AtomicBool,
}

impl BroadcastControl {
    /// Create a control with no stop requested.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a cooperative stop. The loop exits at the next tick
    /// boundary.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
    }

    /// Whether a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }
}

/// The periodic broadcast task.
///
/// Owns its collaborators explicitly (board, registry, clock,
/// control) so the loop is constructible and testable in isolation;
/// nothing here is ambient global state.
pub struct Broadcaster {
    board: Arc<PopulationBoard>,
    registry: Arc<ConnectionRegistry>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    control: Arc<BroadcastControl>,
}

impl Broadcaster {
    /// Create a broadcaster that ticks on the given interval.
    pub fn new(
        board: Arc<PopulationBoard>,
        registry: Arc<ConnectionRegistry>,
        clock: Arc<dyn Clock>,
        interval: Duration,
        control: Arc<BroadcastControl>,
    ) -> Self {
        Self {
            board,
            registry,
            clock,
            interval,
            control,
        }
    }

    /// Execute one broadcast tick: recompute, serialize, deliver.
    ///
    /// Returns the number of connections the message reached.
    ///
    /// # Errors
    ///
    /// Returns [`BroadcastError::Serialize`] if the message cannot be
    /// encoded. Delivery failures are not errors; the affected
    /// connections are evicted by the registry.
    pub async fn tick(&self) -> Result<usize, BroadcastError> {
        let snapshots = self.board.current_all().await;
        let message =
            TickMessage::from_snapshots(MessageKind::Tick, self.clock.now(), &snapshots);
        let encoded = serde_json::to_string(&message)?;
        Ok(self.registry.broadcast(&encoded))
    }

    /// Run the loop until a stop is requested.
    ///
    /// A failed tick is logged and the loop continues on the next
    /// interval rather than terminating the broadcast feature.
    pub async fn run(self) {
        info!(interval = ?self.interval, "population broadcast loop starting");
        loop {
            if self.control.is_stop_requested() {
                break;
            }
            match self.tick().await {
                Ok(delivered) => {
                    debug!(delivered, connections = self.registry.len(), "broadcast tick");
                }
                Err(error) => {
                    warn!(error = %error, "broadcast tick failed, continuing");
                }
            }
            tokio::time::sleep(self.interval).await;
        }
        info!("population broadcast loop stopped");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use tokio::sync::mpsc;

    use crate::board::PopulationBoard;
    use crate::clock::ManualClock;
    use crate::territory::Territory;

    use super::*;

    fn make_territory(name: &str, population: u64, rate: f64) -> Territory {
        Territory {
            name: name.to_owned(),
            display_name: String::new(),
            reference_population: population,
            reference_timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            annual_growth_rate: rate,
            annual_births: 216_215,
            annual_deaths: 325_162,
            birth_rate: 4.2,
            death_rate: 6.3,
            fertility_rate: 0.748,
            life_expectancy: 75.5,
            data_source: String::from("test"),
        }
    }

    fn make_broadcaster(
        interval: Duration,
    ) -> (Broadcaster, Arc<ConnectionRegistry>, Arc<BroadcastControl>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
        ));
        let board = Arc::new(
            PopulationBoard::new(
                vec![
                    make_territory("north", 25_971_909, 0.004),
                    make_territory("south", 51_628_117, -0.0021),
                ],
                chrono_tz::UTC,
                Arc::clone(&clock) as Arc<dyn crate::clock::Clock>,
            )
            .unwrap(),
        );
        let registry = Arc::new(ConnectionRegistry::new());
        let control = Arc::new(BroadcastControl::new());
        let broadcaster = Broadcaster::new(
            board,
            Arc::clone(&registry),
            clock,
            interval,
            Arc::clone(&control),
        );
        (broadcaster, registry, control)
    }

    #[tokio::test]
    async fn tick_delivers_parseable_message_with_every_territory() {
        let (broadcaster, registry, _control) = make_broadcaster(Duration::from_secs(1));
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.register(tx);

        let delivered = broadcaster.tick().await.unwrap();
        assert_eq!(delivered, 1);

        let raw = rx.try_recv().unwrap();
        let message: TickMessage = serde_json::from_str(&raw).unwrap();
        assert_eq!(message.kind, MessageKind::Tick);
        assert_eq!(message.territories.len(), 2);
        assert!(message.territories.contains_key("north"));
        assert!(message.territories.contains_key("south"));

        let north = message.territories.get("north").unwrap();
        let south = message.territories.get("south").unwrap();
        assert_eq!(
            message.total_population,
            north.population.saturating_add(south.population)
        );
    }

    #[tokio::test]
    async fn tick_with_one_broken_connection_still_reaches_the_healthy_one() {
        let (broadcaster, registry, _control) = make_broadcaster(Duration::from_secs(1));
        let (tx_broken, rx_broken) = mpsc::unbounded_channel();
        let (tx_healthy, mut rx_healthy) = mpsc::unbounded_channel();
        registry.register(tx_broken);
        registry.register(tx_healthy);
        drop(rx_broken);

        let delivered = broadcaster.tick().await.unwrap();
        assert_eq!(delivered, 1);
        assert_eq!(registry.len(), 1);
        assert!(rx_healthy.try_recv().is_ok());
    }

    #[tokio::test]
    async fn run_stops_cooperatively_at_tick_boundary() {
        let (broadcaster, registry, control) = make_broadcaster(Duration::from_millis(5));
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.register(tx);

        let handle = tokio::spawn(broadcaster.run());

        // Let a few ticks happen, then request a stop.
        tokio::time::sleep(Duration::from_millis(30)).await;
        control.request_stop();
        handle.await.unwrap();

        assert!(rx.try_recv().is_ok(), "at least one tick was delivered");
    }

    #[test]
    fn message_kind_serializes_snake_case() {
        let json = serde_json::to_string(&MessageKind::InitialState).unwrap();
        assert_eq!(json, "\"initial_state\"");
        let json = serde_json::to_string(&MessageKind::Tick).unwrap();
        assert_eq!(json, "\"tick\"");
    }
}
