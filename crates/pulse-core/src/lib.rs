//! Core engine for the Pulse demographic dashboard.
//!
//! This crate holds the pieces with real design content and nothing
//! HTTP-shaped, so they are constructible and testable without a
//! server:
//!
//! - [`board`] -- the population state holder: per-territory anchors
//!   advanced deterministically by elapsed time and the annual growth
//!   rate, recomputed on demand
//! - [`broadcast`] -- the periodic broadcast loop and its outbound
//!   message types
//! - [`registry`] -- the mutex-guarded registry of live connection
//!   handles
//! - [`clock`] -- the injectable time source ([`SystemClock`] in
//!   production, [`ManualClock`] in tests)
//! - [`territory`] -- territory records and demographic rate
//!   derivations
//! - [`config`] -- typed YAML configuration with defaults and env
//!   overrides

pub mod board;
pub mod broadcast;
pub mod clock;
pub mod config;
pub mod registry;
pub mod territory;

// Re-export primary types for convenience.
pub use board::{BaseUpdate, PopulationBoard, PopulationError, Snapshot};
pub use broadcast::{
    BroadcastControl, BroadcastError, Broadcaster, MessageKind, TerritoryFigures, TickMessage,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AppConfig, ConfigError};
pub use registry::{ConnectionId, ConnectionRegistry};
pub use territory::{RateConsistency, Territory};
