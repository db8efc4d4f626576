//! Rate limiting strategies and the facade that selects between them.

mod clock;
mod fixed_window;
mod limiter;
mod strategy;
mod sweeper;
mod window;

pub use clock::{Clock, ManualClock, SystemClock};
pub use fixed_window::{ClientUsage, FixedWindow, FIXED_WINDOW};
pub use limiter::{with_fixed_window, with_token_bucket, RateLimit, StrategyOption};
pub use strategy::Strategy;
pub use sweeper::Sweeper;
pub use window::{ClientState, Placement, Transition, Window};
