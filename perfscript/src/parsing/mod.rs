//! perf-script record parsing
//!
//! - [`event_parser`] - header line + frame section → [`crate::trace_data::LinuxEvent`]
//! - [`frame_line`] - one stack frame line → [`perfscript_common::Frame`]
//! - [`sched_switch`] - `sched_switch` detail payload

pub mod event_parser;
pub mod frame_line;
pub mod sched_switch;

pub use event_parser::{EventParser, ParsedRecord, ParserStats};
pub use frame_line::{
    read_frame, remove_outer_brackets, split_map_symbol, strip_directories, FrameLine,
    TRUNCATION_LINE,
};
pub use sched_switch::read_schedule_switch;
