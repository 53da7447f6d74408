//! `sched_switch` detail line parsing
//!
//! ```text
//! sched_switch: prev_comm=bash prev_pid=10 prev_prio=120 prev_state=S ==> next_comm=swapper/0 next_pid=0 next_prio=120
//! ```
//!
//! Fields are read positionally by skipping to each `=`. Every skip is
//! bounded by the current line, so a malformed line leaves the remaining
//! fields at their absent values instead of eating the next record.

use std::io::{Read, Seek};

use crate::scanning::ByteCursor;
use crate::trace_data::ScheduleSwitch;

/// Detail-line prefix that marks a scheduler event
pub const SCHED_SWITCH_PREFIX: &str = "sched_switch";

/// Parse a switch payload starting anywhere before `prev_comm=` on the current line.
///
/// The cursor is left on the same line, after the last field read.
pub fn read_schedule_switch<R: Read + Seek>(cursor: &mut ByteCursor<R>) -> ScheduleSwitch {
    let mut switch = ScheduleSwitch {
        prev_tid: -1,
        prev_priority: -1,
        next_tid: -1,
        next_priority: -1,
        ..ScheduleSwitch::default()
    };

    if !skip_to_value(cursor) {
        return switch;
    }
    switch.prev_command = cursor.read_until_any(b" \t\n");

    if !skip_to_value(cursor) {
        return switch;
    }
    switch.prev_tid = cursor.read_i32();

    if !skip_to_value(cursor) {
        return switch;
    }
    switch.prev_priority = cursor.read_i32();

    if !skip_to_value(cursor) {
        return switch;
    }
    let state = cursor.current();
    if state.is_ascii_graphic() {
        switch.prev_state = char::from(state);
        cursor.advance();
    }

    // Step over the `==>` separator; its '=' signs are not field delimiters.
    if !cursor.skip_up_to_on_line(b'>') {
        return switch;
    }
    cursor.advance();

    if !skip_to_value(cursor) {
        return switch;
    }
    switch.next_command = cursor.read_until_any(b" \t\n");

    if !skip_to_value(cursor) {
        return switch;
    }
    switch.next_tid = cursor.read_i32();

    if !skip_to_value(cursor) {
        return switch;
    }
    switch.next_priority = cursor.read_i32();

    switch
}

fn skip_to_value<R: Read + Seek>(cursor: &mut ByteCursor<R>) -> bool {
    if cursor.skip_up_to_on_line(b'=') {
        cursor.advance();
        true
    } else {
        false
    }
}
