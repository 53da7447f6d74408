//! Trace data models produced by the record parser
//!
//! A [`LinuxEvent`] is the transient, fully-parsed form of one perf-script
//! record. Events are turned into [`Sample`]s (time + interned stack id) and
//! then dropped; only samples survive into the stack source.

use perfscript_common::{Frame, StackId};
use serde::Serialize;

use crate::domain::{CpuId, Pid, Tid};

/// Classification of a record by its detail line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventKind {
    /// Any sampling event (cycles, cpu-clock, ...)
    #[default]
    Cpu,
    /// `sched:sched_switch` tracepoint
    Scheduler,
}

/// Payload of a `sched_switch` detail line:
///
/// ```text
/// prev_comm=bash prev_pid=10 prev_prio=120 prev_state=S ==> next_comm=swapper next_pid=0 next_prio=120
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScheduleSwitch {
    pub prev_command: String,
    pub prev_tid: i32,
    pub prev_priority: i32,
    /// Single-letter task state (`S`, `R`, `D`, ...)
    pub prev_state: char,
    pub next_command: String,
    pub next_tid: i32,
    pub next_priority: i32,
}

/// One parsed perf-script record
#[derive(Debug, Clone, PartialEq)]
pub struct LinuxEvent {
    pub kind: EventKind,
    pub command: String,
    pub pid: Pid,
    pub tid: Tid,
    /// `-1` when the record had no `[cpu]` column
    pub cpu: CpuId,
    /// Seconds as printed; `-1.0` if the field was malformed
    pub time: f64,
    /// Optional integer printed right after the timestamp (`-1` when absent)
    pub time_property: i64,
    pub event_name: String,
    /// Remainder of the header line after the event name, trimmed
    pub event_details: String,
    /// Deepest frame first; the last two are always the thread and process frames
    pub frames: Vec<Frame>,
    /// Present iff `kind == EventKind::Scheduler`
    pub schedule_switch: Option<ScheduleSwitch>,
    /// The record was cut short at a chunk boundary
    pub truncated: bool,
}

impl LinuxEvent {
    /// Number of frames excluding the trailing thread/process pseudo-frames
    #[must_use]
    pub fn code_frame_count(&self) -> usize {
        self.frames.len().saturating_sub(2)
    }

    /// The thread and process pseudo-frames at the root-ward end of the stack
    #[must_use]
    pub fn root_frames(&self) -> &[Frame] {
        let start = self.frames.len().saturating_sub(2);
        &self.frames[start..]
    }
}

/// One observed point in time and its call stack
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    pub stack: StackId,
    /// Seconds since the first sample of the session (after normalisation)
    pub time: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(frames: Vec<Frame>) -> LinuxEvent {
        LinuxEvent {
            kind: EventKind::Cpu,
            command: "comm".to_string(),
            pid: Pid(1),
            tid: Tid(1),
            cpu: CpuId(0),
            time: 0.0,
            time_property: -1,
            event_name: "cycles".to_string(),
            event_details: String::new(),
            frames,
            schedule_switch: None,
            truncated: false,
        }
    }

    #[test]
    fn test_root_frames() {
        let e = event(vec![
            Frame::Symbol {
                address: "1".to_string(),
                module: "m".to_string(),
                symbol: "s".to_string(),
            },
            Frame::thread(1),
            Frame::process("comm"),
        ]);
        assert_eq!(e.code_frame_count(), 1);
        assert_eq!(e.root_frames(), &[Frame::thread(1), Frame::process("comm")]);
    }

    #[test]
    fn test_root_frames_on_short_sequence() {
        let e = event(vec![Frame::thread(1)]);
        assert_eq!(e.code_frame_count(), 0);
        assert_eq!(e.root_frames().len(), 1);
    }
}
