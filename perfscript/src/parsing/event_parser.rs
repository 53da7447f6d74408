//! # perf-script Record Parser
//!
//! Turns a stream of `perf script` text into [`LinuxEvent`]s, one record at
//! a time.
//!
//! ## Record Layout
//!
//! ```text
//! my app  1234/1235 [003] 5021.123456:     250000 cycles:  ffffffff81 do_syscall_64 (...)
//! ──┬───  ──┬─ ──┬─  ─┬─  ─────┬─────      ───┬──  ───┬──  ──────────────┬──────────────
//! command  pid  tid  cpu     time        time property  name          details
//!         ffffffff81000000 do_syscall_64 ([kernel.kallsyms])      ← frame lines,
//!             7f3a2c10 __libc_read+0x10 (/usr/lib/libc.so.6)         deepest first
//!                                                                 ← blank line ends the record
//! ```
//!
//! `/tid`, `[cpu]` and the time property are optional. A missing tid
//! falls back to the pid and a missing cpu reads as `-1`.
//!
//! ## Filtering
//!
//! When a filter regex is set, records whose event name does not match are
//! skipped up to the end-of-sample boundary without reading their frames.

use std::io::{self, Cursor, Read, Seek};

use log::trace;
use perfscript_common::Frame;
use regex::Regex;

use super::frame_line::{read_frame, FrameLine};
use super::sched_switch::{read_schedule_switch, SCHED_SWITCH_PREFIX};
use crate::domain::{CpuId, Pid, Tid};
use crate::scanning::{is_end_of_sample, ByteCursor};
use crate::trace_data::{EventKind, LinuxEvent};

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// Outcome of one [`EventParser::parse_record`] call
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedRecord {
    Event(Box<LinuxEvent>),
    /// The record's event name did not match the filter; its bytes were consumed
    Filtered,
}

/// Running counts for one parser
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParserStats {
    /// Records returned as events
    pub records: usize,
    /// Records skipped by the event-name filter
    pub filtered: usize,
    /// Returned records that were cut short at a chunk boundary
    pub truncated: usize,
}

impl ParserStats {
    /// Accumulate another parser's counts (one per worker)
    pub fn merge(&mut self, other: ParserStats) {
        self.records += other.records;
        self.filtered += other.filtered;
        self.truncated += other.truncated;
    }
}

/// Lazy, forward-only record reader.
///
/// Also an [`Iterator`] over the matching events.
pub struct EventParser<R> {
    cursor: ByteCursor<R>,
    filter: Option<Regex>,
    stats: ParserStats,
    preamble_skipped: bool,
}

impl EventParser<Cursor<Vec<u8>>> {
    /// Parser over one in-memory chunk
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self::from_cursor(ByteCursor::from_bytes(bytes))
    }
}

impl<R: Read + Seek> EventParser<R> {
    pub fn new(reader: R) -> Self {
        Self::from_cursor(ByteCursor::new(reader))
    }

    #[must_use]
    pub fn from_cursor(cursor: ByteCursor<R>) -> Self {
        Self {
            cursor,
            filter: None,
            stats: ParserStats::default(),
            preamble_skipped: false,
        }
    }

    /// Only return events whose name matches `filter`.
    #[must_use]
    pub fn with_filter(mut self, filter: Option<Regex>) -> Self {
        self.filter = filter;
        self
    }

    #[must_use]
    pub fn stats(&self) -> ParserStats {
        self.stats
    }

    /// First I/O error seen by the underlying cursor, if any.
    pub fn take_error(&mut self) -> Option<io::Error> {
        self.cursor.take_error()
    }

    /// Parse the next record.
    ///
    /// Returns `None` once the stream is exhausted.
    pub fn parse_record(&mut self) -> Option<ParsedRecord> {
        if !self.preamble_skipped {
            self.skip_preamble();
        }

        let cursor = &mut self.cursor;
        cursor.skip_whitespace();
        if cursor.is_at_end() {
            return None;
        }

        let command = read_command(cursor);

        let pid = cursor.read_i32();
        let tid = if cursor.current() == b'/' {
            cursor.advance();
            cursor.read_i32()
        } else {
            pid
        };

        cursor.skip_spaces();
        let cpu = if cursor.current() == b'[' {
            cursor.advance();
            let cpu = cursor.read_i32();
            if cursor.current() == b']' {
                cursor.advance();
            }
            cpu
        } else {
            -1
        };

        cursor.skip_spaces();
        let time = cursor.read_until_any(b":\n").trim().parse::<f64>().unwrap_or(-1.0);
        if cursor.current() == b':' {
            cursor.advance();
        }

        cursor.skip_spaces();
        let time_property = if cursor.current().is_ascii_digit() {
            cursor.read_int()
        } else {
            -1
        };

        cursor.skip_spaces();
        let event_name = cursor.read_until_any(b":\n").trim().to_string();
        if cursor.current() == b':' {
            cursor.advance();
        }

        let details_start = cursor.mark();
        let event_details = cursor.read_until(b'\n').trim().to_string();

        if let Some(filter) = &self.filter {
            if !filter.is_match(&event_name) {
                skip_to_end_of_sample(cursor);
                self.stats.filtered += 1;
                trace!("Filtered record '{event_name}' from {command}");
                return Some(ParsedRecord::Filtered);
            }
        }

        let (kind, schedule_switch) = if event_details.starts_with(SCHED_SWITCH_PREFIX) {
            cursor.restore_to(details_start);
            let switch = read_schedule_switch(cursor);
            cursor.skip_up_to(b'\n');
            (EventKind::Scheduler, Some(switch))
        } else {
            (EventKind::Cpu, None)
        };

        let mut frames = Vec::new();
        let mut truncated = false;
        while !is_end_of_sample(cursor) {
            cursor.advance();
            match read_frame(cursor) {
                FrameLine::Frame(frame) => frames.push(frame),
                FrameLine::TruncationMarker => truncated = true,
                FrameLine::Blank => {}
            }
        }
        frames.push(Frame::thread(tid));
        frames.push(Frame::process(command.clone()));

        self.stats.records += 1;
        if truncated {
            self.stats.truncated += 1;
        }

        Some(ParsedRecord::Event(Box::new(LinuxEvent {
            kind,
            command,
            pid: Pid(pid),
            tid: Tid(tid),
            cpu: CpuId(cpu),
            time,
            time_property,
            event_name,
            event_details,
            frames,
            schedule_switch,
            truncated,
        })))
    }

    fn skip_preamble(&mut self) {
        self.preamble_skipped = true;
        let cursor = &mut self.cursor;
        if cursor.current() == UTF8_BOM[0]
            && cursor.peek(1) == UTF8_BOM[1]
            && cursor.peek(2) == UTF8_BOM[2]
        {
            cursor.consume(UTF8_BOM.len());
        }
    }
}

impl<R: Read + Seek> Iterator for EventParser<R> {
    type Item = LinuxEvent;

    fn next(&mut self) -> Option<LinuxEvent> {
        loop {
            match self.parse_record()? {
                ParsedRecord::Event(event) => return Some(*event),
                ParsedRecord::Filtered => {}
            }
        }
    }
}

/// Join whitespace-separated tokens until one starts with a digit.
///
/// Command names may contain spaces; the pid is the first numeric token.
fn read_command<R: Read + Seek>(cursor: &mut ByteCursor<R>) -> String {
    let mut command = String::new();
    loop {
        cursor.skip_spaces();
        let c = cursor.current();
        if cursor.is_at_end() || c == b'\n' || c.is_ascii_digit() {
            break;
        }
        let token = cursor.read_until_any(b" \t\n");
        if !command.is_empty() {
            command.push(' ');
        }
        command.push_str(&token);
    }
    command
}

/// Consume bytes until the cursor rests on the boundary that ends this sample.
fn skip_to_end_of_sample<R: Read + Seek>(cursor: &mut ByteCursor<R>) {
    while !is_end_of_sample(cursor) {
        cursor.advance();
    }
}
