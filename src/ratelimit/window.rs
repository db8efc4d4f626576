//! Clock-aligned windows and the per-client state tracked inside them.

use std::time::Duration;

use chrono::{DateTime, Utc};

const NANOS_PER_SEC: i128 = 1_000_000_000;

/// Nanoseconds since the Unix epoch. Negative before 1970.
fn unix_nanos(at: &DateTime<Utc>) -> i128 {
    i128::from(at.timestamp()) * NANOS_PER_SEC + i128::from(at.timestamp_subsec_nanos())
}

/// A half-open interval `[start, end)` aligned to a multiple of its size
/// since the Unix epoch.
///
/// Boundaries depend only on wall-clock time, never on when a client first
/// showed up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// Inclusive start, in Unix nanoseconds.
    start: i128,
    /// Exclusive end, in Unix nanoseconds.
    end: i128,
}

/// Where an instant falls relative to a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Strictly before the window start.
    Before,
    /// Inside `[start, end)`.
    Within,
    /// At or after the window end.
    After,
}

impl Window {
    /// The window of length `size` that contains `now`.
    ///
    /// `size` must be non-zero.
    pub fn containing(now: &DateTime<Utc>, size: Duration) -> Self {
        let span = size.as_nanos() as i128;
        debug_assert!(span > 0, "window size must be positive");

        let stamp = unix_nanos(now);
        let start = stamp - stamp.rem_euclid(span);
        Self {
            start,
            end: start + span,
        }
    }

    /// Classify an instant against this window.
    pub fn place(&self, at: &DateTime<Utc>) -> Placement {
        let stamp = unix_nanos(at);
        if stamp < self.start {
            Placement::Before
        } else if stamp < self.end {
            Placement::Within
        } else {
            Placement::After
        }
    }

    /// Inclusive start, in Unix nanoseconds.
    pub fn start_nanos(&self) -> i128 {
        self.start
    }

    /// Exclusive end, in Unix nanoseconds.
    pub fn end_nanos(&self) -> i128 {
        self.end
    }
}

/// What a single admission attempt did to a client's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The previous activity belonged to an older window; the count restarted at 1.
    Reset,
    /// Same window, quota left; the count was incremented.
    Counted,
    /// Same window, quota used up; the count is unchanged.
    Exhausted,
    /// The previous activity lies after the current window, meaning the clock
    /// moved backward. Refused.
    Skewed,
}

impl Transition {
    /// Whether the attempt was admitted.
    pub fn admitted(self) -> bool {
        matches!(self, Transition::Reset | Transition::Counted)
    }
}

/// Per-client bookkeeping for the fixed-window strategy.
#[derive(Debug, Clone)]
pub struct ClientState {
    /// Requests admitted in the window `last_seen` belongs to.
    request_count: u64,
    /// When this client was last observed, admitted or not.
    last_seen: DateTime<Utc>,
}

impl ClientState {
    /// State for a client seen for the first time. The first request is
    /// counted before any limit is consulted.
    pub fn first_seen(now: DateTime<Utc>) -> Self {
        Self {
            request_count: 1,
            last_seen: now,
        }
    }

    /// Apply one admission attempt made at `now` against `window`.
    ///
    /// `last_seen` is refreshed on every path, including refusals.
    pub fn observe(&mut self, now: DateTime<Utc>, window: &Window, limit: u64) -> Transition {
        let previous = std::mem::replace(&mut self.last_seen, now);

        match window.place(&previous) {
            Placement::Before => {
                self.request_count = 1;
                Transition::Reset
            }
            Placement::Within if self.request_count >= limit => Transition::Exhausted,
            Placement::Within => {
                self.request_count += 1;
                Transition::Counted
            }
            Placement::After => Transition::Skewed,
        }
    }

    /// Whether this state can only ever be reset by its next observation.
    pub fn is_expired(&self, current: &Window) -> bool {
        current.place(&self.last_seen) == Placement::Before
    }

    /// Requests admitted in the window of the last observation.
    pub fn request_count(&self) -> u64 {
        self.request_count
    }

    /// When this client was last observed.
    pub fn last_seen(&self) -> DateTime<Utc> {
        self.last_seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64, millis: u32) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, millis * 1_000_000).unwrap()
    }

    #[test]
    fn test_window_aligns_to_epoch_multiples() {
        let window = Window::containing(&at(1_700_000_007, 250), Duration::from_secs(10));
        assert_eq!(window.start_nanos(), 1_700_000_000 * NANOS_PER_SEC);
        assert_eq!(window.end_nanos(), 1_700_000_010 * NANOS_PER_SEC);
    }

    #[test]
    fn test_window_start_is_inclusive_end_is_exclusive() {
        let size = Duration::from_secs(5);
        let window = Window::containing(&at(100, 0), size);

        assert_eq!(window.place(&at(100, 0)), Placement::Within);
        assert_eq!(window.place(&at(104, 999)), Placement::Within);
        assert_eq!(window.place(&at(105, 0)), Placement::After);
        assert_eq!(window.place(&at(99, 999)), Placement::Before);
    }

    #[test]
    fn test_window_before_epoch() {
        let window = Window::containing(&at(-3, 0), Duration::from_secs(10));
        assert_eq!(window.start_nanos(), -10 * NANOS_PER_SEC);
        assert_eq!(window.end_nanos(), 0);
    }

    #[test]
    fn test_sub_second_windows() {
        let window = Window::containing(&at(10, 730), Duration::from_millis(250));
        assert_eq!(window.start_nanos(), 10 * NANOS_PER_SEC + 500_000_000);
        assert_eq!(window.end_nanos(), 10 * NANOS_PER_SEC + 750_000_000);
    }

    #[test]
    fn test_observe_counts_until_limit() {
        let size = Duration::from_secs(10);
        let now = at(1_000, 0);
        let window = Window::containing(&now, size);
        let mut state = ClientState::first_seen(now);

        assert_eq!(state.observe(now, &window, 3), Transition::Counted);
        assert_eq!(state.observe(now, &window, 3), Transition::Counted);
        assert_eq!(state.request_count(), 3);

        assert_eq!(state.observe(now, &window, 3), Transition::Exhausted);
        assert_eq!(state.request_count(), 3);
    }

    #[test]
    fn test_observe_resets_in_new_window() {
        let size = Duration::from_secs(10);
        let earlier = at(1_005, 0);
        let mut state = ClientState::first_seen(earlier);

        let later = at(1_012, 0);
        let window = Window::containing(&later, size);
        assert_eq!(state.observe(later, &window, 1), Transition::Reset);
        assert_eq!(state.request_count(), 1);
        assert_eq!(state.last_seen(), later);
    }

    #[test]
    fn test_observe_refuses_when_clock_moves_backward() {
        let size = Duration::from_secs(10);
        let mut state = ClientState::first_seen(at(1_025, 0));

        let rewound = at(1_011, 0);
        let window = Window::containing(&rewound, size);
        assert_eq!(state.observe(rewound, &window, 100), Transition::Skewed);
        assert_eq!(state.request_count(), 1);
        assert_eq!(state.last_seen(), rewound);
    }

    #[test]
    fn test_expiry_tracks_window_start() {
        let size = Duration::from_secs(10);
        let state = ClientState::first_seen(at(1_009, 999));

        assert!(!state.is_expired(&Window::containing(&at(1_009, 999), size)));
        assert!(state.is_expired(&Window::containing(&at(1_010, 0), size)));
    }

    #[test]
    fn test_transition_admitted() {
        assert!(Transition::Reset.admitted());
        assert!(Transition::Counted.admitted());
        assert!(!Transition::Exhausted.admitted());
        assert!(!Transition::Skewed.admitted());
    }
}
