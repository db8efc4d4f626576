//! Quota Gate - embeddable admission control
//!
//! This crate decides whether a client's next action fits inside its quota.
//! A [`ratelimit::RateLimit`] wraps one pluggable [`ratelimit::Strategy`];
//! the built-in strategy counts requests per client inside clock-aligned
//! fixed windows.
//!
//! ```
//! use std::time::Duration;
//! use quota_gate::error::GateError;
//! use quota_gate::ratelimit::{with_fixed_window, ManualClock, RateLimit};
//!
//! // `RateLimit::new` reads the system clock; a manual clock keeps this example deterministic.
//! let clock = ManualClock::starting_now();
//! let limiter =
//!     RateLimit::with_clock([with_fixed_window(2, Duration::from_secs(60))], clock).unwrap();
//! assert_eq!(limiter.kind(), "FixedWindow");
//!
//! assert!(limiter.allow("user123").unwrap());
//! assert!(limiter.allow("user123").unwrap());
//! assert!(matches!(limiter.allow("user123"), Err(GateError::QuotaExceeded)));
//! assert!(matches!(limiter.allow(""), Err(GateError::InvalidIdentifier)));
//! ```

pub mod config;
pub mod error;
pub mod ratelimit;
