//! Shared application state for the Pulse server.
//!
//! [`AppState`] holds the population board, the live connection
//! registry, the contact intake collaborators, and the administrative
//! credential. It is wrapped in [`Arc`] and injected via Axum's
//! `State` extractor. Every collaborator is owned explicitly and
//! passed in at construction, so handlers are testable with manual
//! clocks and in-memory sinks.

use std::sync::Arc;

use axum::http::HeaderMap;
use pulse_core::config::AppConfig;
use pulse_core::{Clock, ConnectionRegistry, PopulationBoard};

use crate::contact::{ContactNotifier, ContactSink, LogNotifier, MemoryContactSink};
use crate::error::ApiError;
use crate::limit::RateLimiter;

/// Contact intake collaborators.
pub struct ContactState {
    /// Destination for accepted messages.
    pub sink: Arc<dyn ContactSink>,

    /// Side-channel notification for accepted messages.
    pub notifier: Arc<dyn ContactNotifier>,

    /// Per-client submission rate limiter.
    pub limiter: RateLimiter,
}

/// Shared state for the Axum application.
pub struct AppState {
    /// The population state holder.
    pub board: Arc<PopulationBoard>,

    /// Registry of live `WebSocket` connections.
    pub registry: Arc<ConnectionRegistry>,

    /// The time source handlers stamp responses with.
    pub clock: Arc<dyn Clock>,

    /// Contact intake collaborators.
    pub contact: ContactState,

    admin_key: Option<String>,
}

impl AppState {
    /// Assemble application state from configuration and the core
    /// collaborators, with the bundled in-memory contact sink and
    /// logging notifier.
    pub fn new(
        config: &AppConfig,
        board: Arc<PopulationBoard>,
        registry: Arc<ConnectionRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let contact = ContactState {
            sink: Arc::new(MemoryContactSink::new(config.contact.max_stored_messages)),
            notifier: Arc::new(LogNotifier),
            limiter: RateLimiter::new(
                config.contact.rate_limit_max_requests,
                config.contact.rate_limit_window_seconds,
                Arc::clone(&clock),
            ),
        };
        Self::with_contact(config, board, registry, clock, contact)
    }

    /// Assemble application state with explicit contact
    /// collaborators (custom sink or notifier).
    pub fn with_contact(
        config: &AppConfig,
        board: Arc<PopulationBoard>,
        registry: Arc<ConnectionRegistry>,
        clock: Arc<dyn Clock>,
        contact: ContactState,
    ) -> Self {
        let admin_key = if config.admin.update_key.is_empty() {
            None
        } else {
            Some(config.admin.update_key.clone())
        };
        Self {
            board,
            registry,
            clock,
            contact,
            admin_key,
        }
    }

    /// Enforce the pre-shared administrative credential.
    ///
    /// The key is read from the `x-admin-key` header. When no key is
    /// configured the administrative surface is disabled and every
    /// request is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unauthorized`] when the credential is
    /// missing or wrong.
    pub fn require_admin(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        let Some(expected) = self.admin_key.as_deref() else {
            return Err(ApiError::Unauthorized);
        };
        match headers.get("x-admin-key").and_then(|value| value.to_str().ok()) {
            Some(provided) if provided == expected => Ok(()),
            _ => Err(ApiError::Unauthorized),
        }
    }
}
