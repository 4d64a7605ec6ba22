//! Fixed-window rate limiter for the contact form.
//!
//! Both the window length and the per-window maximum are explicit
//! configuration values rather than baked-in constants. The limiter
//! runs over the injectable [`Clock`] so tests advance time instead
//! of sleeping.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::http::HeaderMap;
use chrono::{DateTime, Duration, Utc};
use pulse_core::Clock;

/// One client's current window.
#[derive(Debug, Clone, Copy)]
struct WindowState {
    started_at: DateTime<Utc>,
    count: u32,
}

/// Per-client fixed-window rate limiter.
///
/// Expired windows are pruned on every check, so the map never holds
/// more entries than clients seen within one window.
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    clock: Arc<dyn Clock>,
    windows: Mutex<HashMap<String, WindowState>>,
}

impl RateLimiter {
    /// Create a limiter allowing `max_requests` per `window_seconds`
    /// per client key.
    #[allow(clippy::cast_possible_wrap)]
    pub fn new(max_requests: u32, window_seconds: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            max_requests,
            window: Duration::seconds(window_seconds as i64),
            clock,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Record one request for `key`.
    ///
    /// # Errors
    ///
    /// Returns the number of seconds until the client's window resets
    /// when the request would exceed the configured maximum.
    pub fn check(&self, key: &str) -> Result<(), u64> {
        let now = self.clock.now();
        let mut windows = self.lock();
        windows.retain(|_, window| now.signed_duration_since(window.started_at) < self.window);

        match windows.get_mut(key) {
            Some(window) if window.count >= self.max_requests => {
                let reset_in = self
                    .window
                    .checked_sub(&now.signed_duration_since(window.started_at))
                    .map_or(1, |remaining| remaining.num_seconds().max(1));
                Err(u64::try_from(reset_in).unwrap_or(1))
            }
            Some(window) => {
                window.count = window.count.saturating_add(1);
                Ok(())
            }
            None => {
                windows.insert(
                    key.to_owned(),
                    WindowState {
                        started_at: now,
                        count: 1,
                    },
                );
                Ok(())
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, WindowState>> {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Derive the rate-limit key for a request.
///
/// Uses the first hop of `x-forwarded-for` when present (the expected
/// deployment sits behind a reverse proxy), otherwise a shared
/// `"local"` bucket. Kept header-based so the router stays drivable
/// without a bound socket in tests.
pub fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map_or_else(|| String::from("local"), str::to_owned)
}
