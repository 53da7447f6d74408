//! # perf-script Stack Source
//!
//! One parse session: input → chunks → workers → interned stacks + samples.
//!
//! ```text
//!  InputStream ──► ChunkScheduler ──┬──► worker 0: EventParser ─┐
//!                  (master cursor)  ├──► worker 1: EventParser ─┤   StackInterner
//!                                   ├──► worker 2: EventParser ─┼──► (shared, locked)
//!                                   └──► worker 3: EventParser ─┘
//!                                                 │
//!                                   per-worker Vec<Sample>
//!                                                 │
//!                           concat → sort by time → rebase to time zero
//! ```
//!
//! In thread-time mode a single worker runs and a [`BlockedTimeAnalyzer`]
//! sees every accepted event before it is interned. Each sample's stack is
//! then `process → thread → Blocked|CPU`, with the code frames dropped.

use std::io::{Read, Seek};
use std::ops::ControlFlow;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, info};
use perfscript_common::{Frame, FrameId, StackId, StackInterner, StackNode, ThreadState};
use regex::Regex;

use crate::analysis::{BlockedTimeAnalyzer, BlockedTimeReport, ThreadPeriod};
use crate::domain::IngestError;
use crate::ingest::{open_input, Chunk, ChunkScheduler};
use crate::parsing::{EventParser, ParsedRecord, ParserStats};
use crate::scanning::DEFAULT_BUFFER_LEN;
use crate::trace_data::{LinuxEvent, Sample};

/// Worker pool width when thread-time analysis is off
pub const DEFAULT_WORKERS: usize = 4;

// =============================================================================
// OPTIONS
// =============================================================================

/// Knobs for one parse session.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Keep only events whose name matches
    pub filter: Option<Regex>,
    /// Derive blocked time and build `Blocked`/`CPU` stacks (forces one worker)
    pub thread_time: bool,
    pub workers: usize,
    /// Master cursor buffer length in bytes
    pub buffer_len: usize,
    /// Stop after this many samples
    pub max_samples: Option<usize>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            filter: None,
            thread_time: false,
            workers: DEFAULT_WORKERS,
            buffer_len: DEFAULT_BUFFER_LEN,
            max_samples: None,
        }
    }
}

impl ParseOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_filter(mut self, filter: Regex) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Compile `pattern` as the event-name filter.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::InvalidFilter`] if the pattern does not compile.
    pub fn with_filter_pattern(self, pattern: &str) -> Result<Self, IngestError> {
        Ok(self.with_filter(Regex::new(pattern)?))
    }

    #[must_use]
    pub fn with_thread_time(mut self, thread_time: bool) -> Self {
        self.thread_time = thread_time;
        self
    }

    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    #[must_use]
    pub fn with_buffer_len(mut self, buffer_len: usize) -> Self {
        self.buffer_len = buffer_len;
        self
    }

    #[must_use]
    pub fn with_max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = Some(max_samples);
        self
    }

    /// Worker count actually used: 1 in thread-time mode, otherwise at least 1.
    #[must_use]
    pub fn effective_workers(&self) -> usize {
        if self.thread_time {
            1
        } else {
            self.workers.max(1)
        }
    }
}

// =============================================================================
// WORKER STATE
// =============================================================================

#[derive(Default)]
struct WorkerOutput {
    samples: Vec<Sample>,
    stats: ParserStats,
    analyzer: Option<BlockedTimeAnalyzer>,
}

/// Reserve one slot under the sample cap; false once the cap is reached.
fn claim_sample(accepted: &AtomicUsize, cap: Option<usize>) -> bool {
    match cap {
        None => {
            accepted.fetch_add(1, Ordering::Relaxed);
            true
        }
        Some(cap) => accepted
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| (n < cap).then_some(n + 1))
            .is_ok(),
    }
}

/// Intern `process → thread → state` for thread-time stacks.
fn intern_thread_time(interner: &StackInterner, event: &LinuxEvent, state: ThreadState) -> StackId {
    let mut frames = Vec::with_capacity(3);
    frames.push(Frame::State(state));
    frames.extend_from_slice(event.root_frames());
    interner.intern_frames(&frames, StackId::ROOT)
}

// =============================================================================
// STACK SOURCE
// =============================================================================

/// Interned frames, stacks, and time-sorted samples of one trace.
#[derive(Debug)]
pub struct PerfScriptStackSource {
    frames: Vec<Frame>,
    stacks: Vec<StackNode>,
    samples: Vec<Sample>,
    blocked: Option<BlockedTimeReport>,
    stats: ParserStats,
}

impl PerfScriptStackSource {
    /// Open and parse a `.data.txt`, `.data.dump` or `.trace.zip` file.
    ///
    /// # Errors
    ///
    /// Fails on unsupported or unreadable input; see [`IngestError`].
    pub fn open(path: &Path, options: &ParseOptions) -> Result<Self, IngestError> {
        let input = open_input(path)?;
        info!("Parsing {}", path.display());
        Self::from_reader(input, options)
    }

    /// Parse perf-script text from any seekable reader.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Io`] if reading the stream fails.
    pub fn from_reader<R: Read + Seek + Send>(
        reader: R,
        options: &ParseOptions,
    ) -> Result<Self, IngestError> {
        let workers = options.effective_workers();
        let interner = StackInterner::new();
        let scheduler = ChunkScheduler::new(reader, options.buffer_len);
        let accepted = AtomicUsize::new(0);

        debug!(
            "Starting {workers} workers (buffer {} bytes, thread time {})",
            options.buffer_len, options.thread_time
        );

        let outputs = scheduler.run(
            workers,
            |_| WorkerOutput {
                analyzer: options.thread_time.then(BlockedTimeAnalyzer::new),
                ..WorkerOutput::default()
            },
            |output: &mut WorkerOutput, chunk: Chunk| {
                parse_chunk(chunk, output, &interner, &accepted, options)
            },
        );

        if let Some(err) = scheduler.take_error() {
            return Err(err.into());
        }

        let mut samples = Vec::new();
        let mut stats = ParserStats::default();
        let mut blocked = None;
        for (worker, output) in outputs.into_iter().enumerate() {
            debug!("Worker {worker} produced {} samples", output.samples.len());
            samples.extend(output.samples);
            stats.merge(output.stats);
            if let Some(analyzer) = output.analyzer {
                blocked = Some(analyzer.finish());
            }
        }

        samples.sort_by(|a, b| a.time.total_cmp(&b.time));
        let time_zero = samples.first().map_or(0.0, |sample| sample.time);
        for sample in &mut samples {
            sample.time -= time_zero;
        }
        if let Some(report) = &mut blocked {
            report.rebase(time_zero);
        }

        if options.max_samples.is_some_and(|cap| samples.len() >= cap) {
            info!("Sample cap of {} reached", samples.len());
        }

        let (frames, stacks) = interner.into_tables();
        info!(
            "Parsed {} samples: {} frames, {} stacks, {} filtered, {} truncated",
            samples.len(),
            frames.len(),
            stacks.len(),
            stats.filtered,
            stats.truncated
        );

        Ok(Self { frames, stacks, samples, blocked, stats })
    }

    /// Frame table indexed by [`FrameId`]
    #[must_use]
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Stack table indexed by [`StackId`]
    #[must_use]
    pub fn stacks(&self) -> &[StackNode] {
        &self.stacks
    }

    /// Samples in ascending time order, first at 0.0
    #[must_use]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn frame(&self, id: FrameId) -> Option<&Frame> {
        self.frames.get(id.0 as usize)
    }

    #[must_use]
    pub fn stack(&self, id: StackId) -> Option<&StackNode> {
        self.stacks.get(id.index()?)
    }

    /// Frames of `id` from the deepest up to the process frame.
    #[must_use]
    pub fn call_stack(&self, id: StackId) -> Vec<&Frame> {
        let mut frames = Vec::new();
        let mut current = id;
        while let Some(node) = self.stack(current) {
            if let Some(frame) = self.frame(node.frame) {
                frames.push(frame);
            }
            current = node.caller;
        }
        frames
    }

    /// Sum of all blocked periods (0.0 unless thread time was enabled)
    #[must_use]
    pub fn total_blocked_time(&self) -> f64 {
        self.blocked.as_ref().map_or(0.0, BlockedTimeReport::total_blocked_time)
    }

    /// Blocked periods sorted by start, on the same time base as the samples
    #[must_use]
    pub fn blocked_periods(&self) -> &[ThreadPeriod] {
        match &self.blocked {
            Some(report) => report.periods(),
            None => &[],
        }
    }

    /// Time of the last sample, relative to the first
    #[must_use]
    pub fn sample_end_time(&self) -> f64 {
        self.samples.last().map_or(0.0, |sample| sample.time)
    }

    #[must_use]
    pub fn stats(&self) -> ParserStats {
        self.stats
    }
}

fn parse_chunk(
    chunk: Chunk,
    output: &mut WorkerOutput,
    interner: &StackInterner,
    accepted: &AtomicUsize,
    options: &ParseOptions,
) -> ControlFlow<()> {
    let mut parser = EventParser::from_bytes(chunk.bytes).with_filter(options.filter.clone());
    let mut flow = ControlFlow::Continue(());

    while let Some(record) = parser.parse_record() {
        let ParsedRecord::Event(event) = record else {
            continue;
        };
        if !claim_sample(accepted, options.max_samples) {
            flow = ControlFlow::Break(());
            break;
        }

        let stack = match &mut output.analyzer {
            Some(analyzer) => {
                analyzer.observe(&event);
                intern_thread_time(interner, &event, analyzer.state_of(event.tid))
            }
            None => interner.intern_frames(&event.frames, StackId::ROOT),
        };
        output.samples.push(Sample { stack, time: event.time });
    }

    output.stats.merge(parser.stats());
    flow
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(text: &str, options: &ParseOptions) -> PerfScriptStackSource {
        PerfScriptStackSource::from_reader(Cursor::new(text.as_bytes().to_vec()), options).unwrap()
    }

    #[test]
    fn test_options_defaults_and_thread_time_forces_one_worker() {
        let options = ParseOptions::new();
        assert_eq!(options.effective_workers(), DEFAULT_WORKERS);
        assert_eq!(options.with_thread_time(true).effective_workers(), 1);
        assert_eq!(ParseOptions::new().with_workers(0).effective_workers(), 1);
    }

    #[test]
    fn test_invalid_filter_pattern() {
        let err = ParseOptions::new().with_filter_pattern("(").unwrap_err();
        assert!(matches!(err, IngestError::InvalidFilter(_)));
    }

    #[test]
    fn test_samples_are_sorted_and_zeroed() {
        let text = "a 1/1 [0] 5.0: cycles:\n  1 f (m)\n\n\
                    a 1/1 [0] 3.0: cycles:\n  1 f (m)\n\n\
                    a 1/1 [0] 4.0: cycles:\n  1 g (m)\n\n";
        let source = parse(text, &ParseOptions::new());
        let times: Vec<f64> = source.samples().iter().map(|s| s.time).collect();
        assert_eq!(times, vec![0.0, 1.0, 2.0]);
        assert!((source.sample_end_time() - 2.0).abs() < f64::EPSILON);
        assert_eq!(source.stacks().len(), 4);
    }

    #[test]
    fn test_call_stack_walks_to_process() {
        let source = parse("comm 0/0 [0] 0.0: cycles:\n  0 symbol (module)\n\n", &ParseOptions::new());
        let top = source.samples()[0].stack;
        let names: Vec<String> = source.call_stack(top).iter().map(|f| f.display_key()).collect();
        assert_eq!(names, vec!["module!symbol", "Thread (0)", "comm"]);
    }

    #[test]
    fn test_sample_cap() {
        let text: String = (0..50)
            .map(|i| format!("a 1/1 [0] {i}.0: cycles:\n  1 f (m)\n\n"))
            .collect();
        let source = parse(&text, &ParseOptions::new().with_max_samples(7).with_buffer_len(512));
        assert_eq!(source.sample_count(), 7);
    }

    #[test]
    fn test_thread_time_stacks() {
        let text = "a 1/1 [0] 1.0: sched:sched_switch: prev_comm=a prev_pid=1 prev_prio=120 prev_state=S ==> next_comm=b next_pid=2 next_prio=120\n  1 schedule (k)\n\n\
                    b 2/2 [0] 2.0: cycles:\n  2 work (app)\n\n";
        let source = parse(text, &ParseOptions::new().with_thread_time(true));

        let first: Vec<String> = source
            .call_stack(source.samples()[0].stack)
            .iter()
            .map(|f| f.display_key())
            .collect();
        assert_eq!(first, vec!["Blocked", "Thread (1)", "a"]);

        let second: Vec<String> = source
            .call_stack(source.samples()[1].stack)
            .iter()
            .map(|f| f.display_key())
            .collect();
        assert_eq!(second, vec!["CPU", "Thread (2)", "b"]);
        assert!(source.frames().iter().all(|f| !f.display_key().contains("schedule")));
    }

    #[test]
    fn test_total_blocked_time_without_thread_time_is_zero() {
        let source = parse("a 1/1 [0] 1.0: cycles:\n\n", &ParseOptions::new());
        assert!(source.total_blocked_time().abs() < f64::EPSILON);
        assert!(source.blocked_periods().is_empty());
    }
}
