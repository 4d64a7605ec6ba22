//! Axum HTTP + `WebSocket` server for the Pulse demographic
//! dashboard.
//!
//! This crate provides the web layer over [`pulse_core`]:
//!
//! - **`WebSocket` endpoint** (`/ws/population`) streaming an
//!   `initial_state` message on connect and one `tick` message per
//!   broadcast interval
//! - **REST endpoints** for current snapshots, demographic data, and
//!   the growth-rate consistency report
//! - **Inline HTML status page** (`GET /`) showing current figures
//!   and links to the API endpoints
//! - **Administrative endpoints** for anchor replacement and contact
//!   message review, guarded by a pre-shared key
//! - **Contact form intake** with validation and a configured
//!   fixed-window rate limit
//!
//! # Architecture
//!
//! Handlers read through the shared [`AppState`]; every population
//! figure is recomputed from the board on demand. `WebSocket` clients
//! each own an unbounded channel registered with the core connection
//! registry; the broadcast loop writes into the channels and each
//! connection's forwarding task writes to its socket.
//!
//! [`AppState`]: state::AppState

pub mod admin;
pub mod contact;
pub mod error;
pub mod handlers;
pub mod limit;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use error::ApiError;
pub use router::build_router;
pub use server::{start_server, ServerError};
pub use state::{AppState, ContactState};
