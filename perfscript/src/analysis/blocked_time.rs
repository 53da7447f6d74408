//! Blocked-time derivation from scheduler and CPU events.
//!
//! Every thread is either running or blocked. Threads start out running and
//! move between the two states on evidence from the event stream:
//!
//! ```text
//!                  sched_switch with prev_tid == T
//!        ┌─────────┐ ─────────────────────────────► ┌─────────┐
//!        │ Running │                                │ Blocked │
//!        └─────────┘ ◄───────────────────────────── └─────────┘
//!                  sched_switch with next_tid == T      (Explicit)
//!                  CPU sample shows T's CPU moved on    (Induced)
//!                  end of stream                        (Flushed)
//! ```
//!
//! Each Blocked → Running transition emits one [`ThreadPeriod`].
//!
//! # Precedence
//!
//! Within one scheduler event the switched-in thread is unblocked before the
//! switched-out thread is blocked. An induced unblock only applies to threads
//! still in the blocked set, so when a scheduler event has already closed a
//! period at the same timestamp, the explicit close stands.
//!
//! # Concurrency
//!
//! The analyzer is plain mutable state and sees events in source order; the
//! stack source forces a single worker whenever it is enabled.

use std::collections::HashMap;

use log::debug;
use perfscript_common::ThreadState;
use serde::Serialize;

use crate::domain::{types::is_present, Tid};
use crate::trace_data::{EventKind, LinuxEvent};

// =============================================================================
// OUTPUT TYPES
// =============================================================================

/// How a blocked period was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PeriodEnd {
    /// A `sched_switch` switched the thread back in
    Explicit,
    /// A CPU sample showed the thread's last CPU running another thread
    Induced,
    /// Still blocked at end of stream; closed at the last observed time
    Flushed,
}

/// One closed blocked interval of a thread.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThreadPeriod {
    pub tid: Tid,
    pub start: f64,
    pub end: f64,
    pub end_reason: PeriodEnd,
}

impl ThreadPeriod {
    /// Length of the period (`end - start`)
    #[must_use]
    pub fn period(&self) -> f64 {
        self.end - self.start
    }
}

/// Final result of a blocked-time analysis, sorted by start time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockedTimeReport {
    periods: Vec<ThreadPeriod>,
}

impl BlockedTimeReport {
    #[must_use]
    pub fn periods(&self) -> &[ThreadPeriod] {
        &self.periods
    }

    /// Sum of every period's length
    #[must_use]
    pub fn total_blocked_time(&self) -> f64 {
        self.periods.iter().map(ThreadPeriod::period).sum()
    }

    /// Shift every period so that `time_zero` becomes 0.
    pub fn rebase(&mut self, time_zero: f64) {
        for period in &mut self.periods {
            period.start -= time_zero;
            period.end -= time_zero;
        }
    }
}

// =============================================================================
// ANALYZER
// =============================================================================

/// Thread currently in the blocked set
#[derive(Debug, Clone, Copy)]
struct ThreadInfo {
    block_start: f64,
}

/// Incremental Running/Blocked state machine over the event stream.
#[derive(Debug, Default)]
pub struct BlockedTimeAnalyzer {
    /// tid → blocked thread info
    blocked: HashMap<i32, ThreadInfo>,
    /// cpu → last thread seen on it
    cpu_threads: HashMap<i32, i32>,
    periods: Vec<ThreadPeriod>,
    last_time: Option<f64>,
}

impl BlockedTimeAnalyzer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one event, in source order.
    pub fn observe(&mut self, event: &LinuxEvent) {
        let time = event.time;
        self.last_time = Some(self.last_time.map_or(time, |last| last.max(time)));

        match (event.kind, &event.schedule_switch) {
            (EventKind::Scheduler, Some(switch)) => {
                self.unblock(switch.next_tid, time, PeriodEnd::Explicit);
                self.blocked
                    .entry(switch.prev_tid)
                    .or_insert(ThreadInfo { block_start: time });
            }
            _ => {
                if let Some(&previous) = self.cpu_threads.get(&event.cpu.0) {
                    if previous != event.tid.0 {
                        self.unblock(previous, time, PeriodEnd::Induced);
                    }
                }
            }
        }

        if is_present(event.cpu.0) {
            self.cpu_threads.insert(event.cpu.0, event.tid.0);
        }
    }

    #[must_use]
    pub fn is_blocked(&self, tid: Tid) -> bool {
        self.blocked.contains_key(&tid.0)
    }

    /// State pseudo-frame for `tid` in thread-time stacks
    #[must_use]
    pub fn state_of(&self, tid: Tid) -> ThreadState {
        if self.is_blocked(tid) {
            ThreadState::Blocked
        } else {
            ThreadState::Cpu
        }
    }

    /// Close every still-blocked thread at the last observed time and sort the periods.
    #[must_use]
    pub fn finish(mut self) -> BlockedTimeReport {
        let end = self.last_time.unwrap_or(0.0);
        let mut flushed: Vec<(i32, ThreadInfo)> = self.blocked.drain().collect();
        flushed.sort_by_key(|(tid, _)| *tid);
        if !flushed.is_empty() {
            debug!("Flushing {} still-blocked threads at {end}", flushed.len());
        }
        for (tid, info) in flushed {
            self.periods.push(ThreadPeriod {
                tid: Tid(tid),
                start: info.block_start,
                end,
                end_reason: PeriodEnd::Flushed,
            });
        }

        self.periods.sort_by(|a, b| a.start.total_cmp(&b.start));
        BlockedTimeReport { periods: self.periods }
    }

    fn unblock(&mut self, tid: i32, time: f64, end_reason: PeriodEnd) {
        if let Some(info) = self.blocked.remove(&tid) {
            self.periods.push(ThreadPeriod {
                tid: Tid(tid),
                start: info.block_start,
                end: time,
                end_reason,
            });
        }
    }
}
