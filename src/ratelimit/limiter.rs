//! The rate limiter facade.

use std::time::Duration;
use tracing::{debug, info, trace};

use super::clock::{Clock, SystemClock};
use super::fixed_window::FixedWindow;
use super::strategy::Strategy;
use crate::error::{GateError, Result};

/// A construction option for [`RateLimit`].
///
/// Options are applied in order. Each one either installs a strategy,
/// replacing whatever an earlier option installed, or does nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyOption {
    /// Count requests inside clock-aligned windows.
    FixedWindow {
        /// Requests admitted per client per window
        limit: u64,
        /// Length of every window
        window: Duration,
    },
    /// Reserved for a token bucket strategy. Installs nothing.
    TokenBucket,
}

/// Select the fixed-window strategy.
pub fn with_fixed_window(limit: u64, window: Duration) -> StrategyOption {
    StrategyOption::FixedWindow { limit, window }
}

/// Reserve a slot for the token bucket strategy. Currently a no-op.
pub fn with_token_bucket() -> StrategyOption {
    StrategyOption::TokenBucket
}

impl StrategyOption {
    /// Build the strategy this option describes, if any.
    fn build<C>(self, clock: &C) -> Result<Option<Box<dyn Strategy>>>
    where
        C: Clock + Clone + 'static,
    {
        match self {
            StrategyOption::FixedWindow { limit, window } => {
                let strategy = FixedWindow::with_clock(limit, window, clock.clone())?;
                Ok(Some(Box::new(strategy)))
            }
            StrategyOption::TokenBucket => Ok(None),
        }
    }
}

/// Uniform admission gate over one configured strategy.
///
/// The strategy is chosen once at construction and never changes. This
/// struct is thread-safe and can be shared across threads behind an `Arc`.
pub struct RateLimit {
    strategy: Box<dyn Strategy>,
}

impl RateLimit {
    /// Build a rate limiter reading the system clock.
    ///
    /// Every option is applied even if an earlier one failed, and all
    /// problems are reported together in a single
    /// [`GateError::Configuration`]. Ending up with no strategy is itself a
    /// configuration problem.
    pub fn new<I>(options: I) -> Result<Self>
    where
        I: IntoIterator<Item = StrategyOption>,
    {
        Self::with_clock(options, SystemClock)
    }

    /// Build a rate limiter whose strategies read `clock`.
    pub fn with_clock<I, C>(options: I, clock: C) -> Result<Self>
    where
        I: IntoIterator<Item = StrategyOption>,
        C: Clock + Clone + 'static,
    {
        let mut active: Option<Box<dyn Strategy>> = None;
        let mut problems = Vec::new();

        for option in options {
            trace!(option = ?option, "Applying rate limiter option");
            match option.build(&clock) {
                Ok(Some(strategy)) => {
                    if let Some(previous) = active.replace(strategy) {
                        debug!(replaced = previous.kind(), "Replacing configured strategy");
                    }
                }
                Ok(None) => {}
                Err(GateError::Configuration { problems: found }) => problems.extend(found),
                Err(other) => problems.push(other.to_string()),
            }
        }

        if active.is_none() {
            problems.push("no rate limiting strategy configured".to_string());
        }

        match active {
            Some(strategy) if problems.is_empty() => Ok(Self::from_strategy(strategy)),
            _ => Err(GateError::Configuration { problems }),
        }
    }

    /// Wrap a strategy built by the caller.
    pub fn from_strategy(strategy: Box<dyn Strategy>) -> Self {
        info!(kind = strategy.kind(), "Rate limiter initialized");
        Self { strategy }
    }

    /// Decide whether `client_id` may act now.
    ///
    /// Returns `Ok(true)` when admitted. Refusals carry
    /// [`GateError::InvalidIdentifier`] or [`GateError::QuotaExceeded`].
    pub fn allow(&self, client_id: &str) -> Result<bool> {
        self.strategy.allow(client_id)
    }

    /// Label of the active strategy.
    pub fn kind(&self) -> &str {
        self.strategy.kind()
    }

    /// Drop client state that can no longer influence a decision.
    pub fn evict_expired(&self) -> usize {
        self.strategy.evict_expired()
    }

    /// Get the number of clients holding state.
    pub fn tracked_clients(&self) -> usize {
        self.strategy.tracked_clients()
    }
}

impl std::fmt::Debug for RateLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimit")
            .field("kind", &self.kind())
            .field("tracked_clients", &self.tracked_clients())
            .finish()
    }
}
