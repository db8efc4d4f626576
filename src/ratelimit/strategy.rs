//! Strategy trait for abstracting over admission algorithms.

use crate::error::Result;

/// An admission algorithm.
///
/// `RateLimit` holds exactly one strategy and forwards every decision to it,
/// so callers never depend on which algorithm is active.
///
/// Implementations must serialize the read-check-update sequence per client:
/// concurrent calls for the same identifier may never admit more requests
/// than the quota allows.
pub trait Strategy: Send + Sync {
    /// Decide whether `client_id` may act now.
    ///
    /// Returns `Ok(true)` when admitted. A refusal carries its reason as
    /// [`GateError::InvalidIdentifier`](crate::error::GateError::InvalidIdentifier)
    /// or [`GateError::QuotaExceeded`](crate::error::GateError::QuotaExceeded).
    fn allow(&self, client_id: &str) -> Result<bool>;

    /// Human-readable label for diagnostics.
    fn kind(&self) -> &'static str;

    /// Drop state that can no longer influence a decision.
    ///
    /// Returns how many client entries were removed.
    fn evict_expired(&self) -> usize {
        0
    }

    /// Number of clients currently holding state.
    fn tracked_clients(&self) -> usize;
}
