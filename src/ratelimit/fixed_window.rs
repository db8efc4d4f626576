//! Fixed-window rate limiting strategy.

use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, trace, warn};

use super::clock::{Clock, SystemClock};
use super::strategy::Strategy;
use super::window::{ClientState, Transition, Window};
use crate::error::{GateError, Result};

/// Label reported by [`FixedWindow::kind`].
pub const FIXED_WINDOW: &str = "FixedWindow";

/// Counts requests per client inside clock-aligned windows of equal length.
///
/// Windows start at multiples of `window` since the Unix epoch. A client
/// seen for the first time is admitted and counted before the limit is
/// consulted, so a limit of zero still admits one request per client per
/// window. Once the clock moves backward past a client's recorded window,
/// that client is refused until time catches up.
///
/// This struct is thread-safe and can be shared across threads. Calls for the
/// same client are serialized by the map's shard locks.
pub struct FixedWindow<C: Clock = SystemClock> {
    /// Requests admitted per client per window
    limit: u64,
    /// Length of every window
    window: Duration,
    /// Per-client state indexed by client identifier
    clients: DashMap<String, ClientState>,
    /// Time source
    clock: C,
}

/// A read-only copy of one client's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientUsage {
    /// Requests admitted in the window of the last observation.
    pub request_count: u64,
    /// When the client was last observed, admitted or not.
    pub last_seen: DateTime<Utc>,
}

impl FixedWindow<SystemClock> {
    /// Create a fixed-window strategy reading the system clock.
    pub fn new(limit: u64, window: Duration) -> Result<Self> {
        Self::with_clock(limit, window, SystemClock)
    }
}

impl<C: Clock> FixedWindow<C> {
    /// Create a fixed-window strategy reading `clock`.
    ///
    /// Fails with a configuration error when `window` is zero.
    pub fn with_clock(limit: u64, window: Duration, clock: C) -> Result<Self> {
        if window.is_zero() {
            return Err(GateError::configuration(
                "fixed window size must be greater than zero",
            ));
        }

        Ok(Self {
            limit,
            window,
            clients: DashMap::new(),
            clock,
        })
    }

    /// Decide whether `client_id` may act now.
    pub fn allow(&self, client_id: &str) -> Result<bool> {
        if client_id.is_empty() {
            return Err(GateError::InvalidIdentifier);
        }

        let now = self.clock.now();
        let window = Window::containing(&now, self.window);

        trace!(
            client_id = %client_id,
            window_start = %window.start_nanos(),
            limit = self.limit,
            "Checking rate limit"
        );

        let transition = match self.clients.get_mut(client_id) {
            Some(mut state) => state.observe(now, &window, self.limit),
            None => match self.clients.entry(client_id.to_owned()) {
                // Another caller created the entry between the lookup and here.
                Entry::Occupied(mut occupied) => {
                    occupied.get_mut().observe(now, &window, self.limit)
                }
                Entry::Vacant(vacant) => {
                    debug!(
                        client_id = %client_id,
                        limit = self.limit,
                        window = ?self.window,
                        "Creating client state"
                    );
                    vacant.insert(ClientState::first_seen(now));
                    return Ok(true);
                }
            },
        };

        match transition {
            Transition::Reset => {
                debug!(client_id = %client_id, "Window rolled over, count reset");
                Ok(true)
            }
            Transition::Counted => Ok(true),
            Transition::Exhausted => {
                debug!(client_id = %client_id, limit = self.limit, "Rate limit exceeded");
                Err(GateError::QuotaExceeded)
            }
            Transition::Skewed => {
                warn!(
                    client_id = %client_id,
                    now = %now,
                    "Clock moved behind the recorded window, refusing request"
                );
                Err(GateError::QuotaExceeded)
            }
        }
    }

    /// Get a snapshot of a client's state without touching it.
    ///
    /// Returns `None` if the client has no state.
    pub fn usage(&self, client_id: &str) -> Option<ClientUsage> {
        self.clients.get(client_id).map(|state| ClientUsage {
            request_count: state.request_count(),
            last_seen: state.last_seen(),
        })
    }

    /// Remove every client whose last activity predates the current window.
    ///
    /// Such a client would have its count reset on its next request anyway,
    /// so removing it does not change any future decision.
    pub fn evict_expired(&self) -> usize {
        let window = Window::containing(&self.clock.now(), self.window);
        let mut removed = 0;

        self.clients.retain(|_, state| {
            let expired = state.is_expired(&window);
            if expired {
                removed += 1;
            }
            !expired
        });

        if removed > 0 {
            debug!(removed, remaining = self.clients.len(), "Evicted expired clients");
        }
        removed
    }

    /// Clear all client state.
    pub fn clear(&self) {
        self.clients.clear();
    }

    /// Get the number of clients holding state.
    pub fn tracked_clients(&self) -> usize {
        self.clients.len()
    }

    /// Requests admitted per client per window.
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Length of every window.
    pub fn window(&self) -> Duration {
        self.window
    }
}

impl<C: Clock> Strategy for FixedWindow<C> {
    fn allow(&self, client_id: &str) -> Result<bool> {
        FixedWindow::allow(self, client_id)
    }

    fn kind(&self) -> &'static str {
        FIXED_WINDOW
    }

    fn evict_expired(&self) -> usize {
        FixedWindow::evict_expired(self)
    }

    fn tracked_clients(&self) -> usize {
        FixedWindow::tracked_clients(self)
    }
}

impl<C: Clock> std::fmt::Debug for FixedWindow<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixedWindow")
            .field("limit", &self.limit)
            .field("window", &self.window)
            .field("clients", &self.clients.len())
            .finish()
    }
}
