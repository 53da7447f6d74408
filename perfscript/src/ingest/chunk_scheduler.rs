//! # Chunk Scheduler
//!
//! Splits one trace stream into in-memory chunks that each hold whole
//! samples, and runs a pool of workers over them.
//!
//! ## Cutting a Window
//!
//! ```text
//!  master cursor window (buffered, unread bytes)
//!  ┌──────────────────────────────────────────────────────────────┐
//!  │ sample │ sample │ sample ...            │    scan 1    │ ░░░ │
//!  └──────────────────────────────────────────────────────────────┘
//!  0                                  0.72·len   0.8·len        len
//!                                         │◄─ scan 2 ─┤
//! ```
//!
//! 1. Scan `[0.8·len, len)` for a blank line (`\n` followed by `\n`/`\r`).
//!    The cut goes right after the first `\n` found.
//! 2. Nothing there: shrink the fraction by 0.9 and scan only the newly
//!    uncovered region, down to a fraction of 0.5.
//! 3. Still nothing: cut at the last blank line anywhere in the window.
//! 4. No blank line at all (one sample larger than the window): make a
//!    *truncated* cut after the first newline past the last fraction tried,
//!    or after the last newline in the window, but never inside the header
//!    line. A partial frame line is never handed out. Append the truncation
//!    marker line and move the master cursor forward to the end of that
//!    sample. The partial sample is parsed once, flagged as truncated; its
//!    tail is skipped. If the cut turns out to sit right before the blank
//!    line, the chunk is clean and gets no marker.
//! 5. A header line longer than the window is cut where the window ends.
//!
//! ## Concurrency
//!
//! The master cursor sits behind one mutex, held only while a window is
//! filled and cut. Workers parse their chunks without any other shared
//! state of their own and hand their results back over a channel at the end.

use std::io::{self, Read, Seek};
use std::ops::ControlFlow;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;

use crossbeam_channel::unbounded;
use log::{debug, warn};

use crate::parsing::TRUNCATION_LINE;
use crate::scanning::{is_boundary_bytes, is_end_of_sample, ByteCursor, MIN_BUFFER_LEN};

/// Fraction of the window where the first boundary scan starts
const INITIAL_FRACTION: f64 = 0.8;

/// Multiplier applied to the fraction after each failed scan
const FRACTION_STEP: f64 = 0.9;

/// Below this fraction the scheduler stops shrinking and falls back
const MIN_FRACTION: f64 = 0.5;

/// A run of whole samples handed to one worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Position in hand-out order (0, 1, 2, ...)
    pub index: usize,
    pub bytes: Vec<u8>,
    /// Ends with the truncation marker line
    pub truncated: bool,
}

/// Where to cut the current window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cut {
    /// Clean cut after a sample boundary
    Boundary(usize),
    /// Cut inside a sample, right after a line end
    Truncated(usize),
    /// Cut inside a sample whose header line does not fit in the window
    MidLine(usize),
}

struct Master<R> {
    cursor: ByteCursor<R>,
    next_index: usize,
}

/// Hands out sample-aligned chunks of one stream to parallel workers.
pub struct ChunkScheduler<R> {
    master: Mutex<Master<R>>,
    target_len: usize,
}

impl<R: Read + Seek + Send> ChunkScheduler<R> {
    /// Schedule chunks of `reader`, filling `buffer_len` bytes at a time.
    ///
    /// `buffer_len` is clamped to [`MIN_BUFFER_LEN`].
    pub fn new(reader: R, buffer_len: usize) -> Self {
        let buffer_len = buffer_len.max(MIN_BUFFER_LEN);
        Self {
            master: Mutex::new(Master {
                cursor: ByteCursor::with_capacity(reader, buffer_len),
                next_index: 0,
            }),
            target_len: buffer_len / 4,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Master<R>> {
        self.master.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cut the next chunk off the master stream, or `None` at end of stream.
    pub fn next_chunk(&self) -> Option<Chunk> {
        let mut master = self.lock();
        let cursor = &mut master.cursor;

        cursor.fill_window();
        let exhausted = cursor.reader_exhausted();
        let window = cursor.buffered();
        if window.is_empty() {
            return None;
        }

        let (bytes, truncated) = if window.len() <= self.target_len || exhausted {
            let bytes = window.to_vec();
            cursor.consume(bytes.len());
            (bytes, false)
        } else {
            match find_cut(window) {
                Cut::Boundary(at) => {
                    let bytes = window[..at].to_vec();
                    cursor.consume(at);
                    (bytes, false)
                }
                cut @ (Cut::Truncated(at) | Cut::MidLine(at)) => {
                    let mut bytes = window[..at].to_vec();
                    cursor.consume(at);

                    // A line-aligned cut that lands right on the blank line is clean.
                    if matches!(cut, Cut::Truncated(_)) && at_blank_line(cursor) {
                        debug!("Oversized window ended exactly at a sample boundary ({at} bytes)");
                        (bytes, false)
                    } else {
                        if bytes.last() != Some(&b'\n') {
                            bytes.push(b'\n');
                        }
                        bytes.extend_from_slice(TRUNCATION_LINE);
                        let skipped = resync(cursor);
                        warn!(
                            "Sample larger than the {} byte buffer; truncated at {} bytes, skipped {skipped} bytes",
                            cursor.capacity(),
                            at
                        );
                        (bytes, true)
                    }
                }
            }
        };

        let index = master.next_index;
        master.next_index += 1;
        debug!("Chunk {index}: {} bytes", bytes.len());
        Some(Chunk { index, bytes, truncated })
    }

    /// Run `workers` threads until the stream is exhausted or every worker breaks.
    ///
    /// Each worker builds its own state with `init(worker_index)` and folds
    /// chunks into it with `work`. Returning [`ControlFlow::Break`] stops
    /// that worker. States come back ordered by worker index.
    pub fn run<W, I, F>(&self, workers: usize, init: I, work: F) -> Vec<W>
    where
        W: Send,
        I: Fn(usize) -> W + Sync,
        F: Fn(&mut W, Chunk) -> ControlFlow<()> + Sync,
    {
        let workers = workers.max(1);
        let (tx, rx) = unbounded();
        let init = &init;
        let work = &work;

        thread::scope(|scope| {
            for worker in 0..workers {
                let tx = tx.clone();
                scope.spawn(move || {
                    let mut state = init(worker);
                    let mut chunks = 0usize;
                    while let Some(chunk) = self.next_chunk() {
                        chunks += 1;
                        if work(&mut state, chunk).is_break() {
                            break;
                        }
                    }
                    debug!("Worker {worker} done after {chunks} chunks");
                    // The receiver outlives the scope
                    let _ = tx.send((worker, state));
                });
            }
        });
        drop(tx);

        let mut results: Vec<(usize, W)> = rx.iter().collect();
        results.sort_by_key(|(worker, _)| *worker);
        results.into_iter().map(|(_, state)| state).collect()
    }

    /// First I/O error hit on the master stream, if any.
    pub fn take_error(&self) -> Option<io::Error> {
        self.lock().cursor.take_error()
    }
}

// Window lengths are far below 2^52, so the float round-trip is exact enough.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn scan_start(len: usize, fraction: f64) -> usize {
    ((len as f64) * fraction) as usize
}

fn find_cut(window: &[u8]) -> Cut {
    let len = window.len();
    let mut fraction = INITIAL_FRACTION;
    let mut scan_end = len;

    let start = loop {
        let start = scan_start(len, fraction).min(scan_end);
        if let Some(at) = (start..scan_end).find(|&i| is_boundary_bytes(window, i)) {
            return Cut::Boundary(at + 1);
        }
        if fraction < MIN_FRACTION {
            break start;
        }
        scan_end = start;
        fraction *= FRACTION_STEP;
    };

    // A boundary at index 0 would hand out a chunk with no record in it.
    if let Some(at) = (1..start).rev().find(|&i| is_boundary_bytes(window, i)) {
        return Cut::Boundary(at + 1);
    }

    // Only whole lines go into a truncated chunk, and never less than the header.
    let content = window.iter().position(|&b| b != b'\n' && b != b'\r').unwrap_or(len);
    let Some(header_end) = window[content..].iter().position(|&b| b == b'\n') else {
        return Cut::MidLine(len);
    };
    let header_end = content + header_end;

    let line_end = window[start..]
        .iter()
        .position(|&b| b == b'\n')
        .map(|offset| start + offset)
        .or_else(|| window.iter().rposition(|&b| b == b'\n'))
        .map_or(header_end, |at| at.max(header_end));
    Cut::Truncated(line_end + 1)
}

/// True when the cursor, sitting at the start of a line, is on a blank line or at the end.
fn at_blank_line<R: Read + Seek>(cursor: &ByteCursor<R>) -> bool {
    cursor.is_at_end() || matches!(cursor.current(), b'\n' | b'\r')
}

/// Advance the master to the blank line that ends a sample cut short; returns bytes skipped.
fn resync<R: Read + Seek>(cursor: &mut ByteCursor<R>) -> u64 {
    let from = cursor.position();
    while !is_end_of_sample(cursor) {
        cursor.advance();
    }
    cursor.position() - from
}
