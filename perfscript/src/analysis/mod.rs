//! Analysis over parsed events
//!
//! Pure state machines fed by the stack source, separated from parsing and
//! export.

pub mod blocked_time;

pub use blocked_time::{BlockedTimeAnalyzer, BlockedTimeReport, PeriodEnd, ThreadPeriod};
