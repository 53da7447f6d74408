//! # perfscript - Parallel perf-script Ingestion
//!
//! Turns Linux `perf script` text dumps into an interned call-stack model:
//! a frame table, a deduplicated call tree, and a time-sorted sample list,
//! optionally with per-thread blocked time derived from `sched_switch`.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │         perf.data.txt / perf.data.dump / x.trace.zip            │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ ingest::open_input
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  ChunkScheduler (master ByteCursor behind one mutex)            │
//! │  cuts sample-aligned chunks, truncating oversized samples       │
//! └───────┬──────────────┬──────────────┬──────────────┬────────────┘
//!         ▼              ▼              ▼              ▼
//!   ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────┐
//!   │ worker 0 │   │ worker 1 │   │ worker 2 │   │ worker 3 │
//!   │ Event-   │   │ Event-   │   │ Event-   │   │ Event-   │
//!   │ Parser   │   │ Parser   │   │ Parser   │   │ Parser   │
//!   └────┬─────┘   └────┬─────┘   └────┬─────┘   └────┬─────┘
//!        │ frames       │              │              │
//!        ▼              ▼              ▼              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  StackInterner (perfscript-common): frame lock + stack lock     │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ Sample { stack, time } per worker
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  PerfScriptStackSource: concat → sort → zero   (+ blocked time) │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         ▼
//!                 StackJsonExporter (JSON)
//! ```
//!
//! ## Module Structure
//!
//! - [`scanning`]: buffered [`scanning::ByteCursor`] and the end-of-sample predicate
//! - [`parsing`]: record header, frame line, and `sched_switch` parsing
//! - [`ingest`]: input containers and the [`ingest::ChunkScheduler`] worker pool
//! - [`analysis`]: the blocked-time state machine
//! - [`stack_source`]: parse session and the aggregated output surface
//! - [`export`]: JSON serialisation of a stack source
//! - [`cli`]: command-line argument parsing
//! - [`trace_data`]: parsed event and sample types
//! - [`domain`]: id newtypes and error enums
//!
//! ## Typical Usage
//!
//! ```no_run
//! use perfscript::{ParseOptions, PerfScriptStackSource};
//! use std::path::Path;
//!
//! let options = ParseOptions::new().with_thread_time(true);
//! let source = PerfScriptStackSource::open(Path::new("perf.data.txt"), &options)?;
//! println!("{} samples, {:.3}s blocked", source.sample_count(), source.total_blocked_time());
//! # Ok::<(), perfscript::domain::IngestError>(())
//! ```
//!
//! ## Key Concepts
//!
//! - **Sample**: one record, reduced to the id of its deepest stack node and a time
//! - **Interning**: equal frames and equal `(caller, frame)` pairs share one id
//! - **End-of-sample**: a blank line or the end of the stream
//! - **Thread time**: stacks become `process → thread → Blocked|CPU`

pub mod analysis;
pub mod cli;
pub mod domain;
pub mod export;
pub mod ingest;
pub mod parsing;
pub mod scanning;
pub mod stack_source;
pub mod trace_data;

pub use stack_source::{ParseOptions, PerfScriptStackSource};
