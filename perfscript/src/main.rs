//! # perfscript - Main Entry Point
//!
//! Parses one perf-script dump, prints a summary, and writes the interned
//! stack source as JSON.
//!
//! ```text
//! perfscript <INPUT> [FILTER] [--thread-time] [--workers N] [--export FILE]
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::time::Instant;

use perfscript::cli::Args;
use perfscript::domain::IngestError;
use perfscript::export::StackJsonExporter;
use perfscript::{ParseOptions, PerfScriptStackSource};

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<IngestError>() {
        Some(IngestError::UnsupportedInput(_) | IngestError::InvalidFilter(_)) => EXIT_USAGE,
        _ => EXIT_ERROR,
    }
}

fn options_from(args: &Args) -> Result<ParseOptions, IngestError> {
    let mut options = ParseOptions::new()
        .with_thread_time(args.thread_time)
        .with_workers(args.workers)
        .with_buffer_len(args.buffer_len);
    if let Some(pattern) = &args.filter {
        options = options.with_filter_pattern(pattern)?;
    }
    if let Some(max_samples) = args.max_samples {
        options = options.with_max_samples(max_samples);
    }
    Ok(options)
}

fn run() -> Result<()> {
    let args = Args::parse();
    let options = options_from(&args)?;

    let started = Instant::now();
    let source = PerfScriptStackSource::open(&args.input, &options)?;
    info!("Parsed {} in {:.2?}", args.input.display(), started.elapsed());

    if !args.quiet {
        let stats = source.stats();
        println!("Input:    {}", args.input.display());
        println!("Samples:  {}", source.sample_count());
        println!("Frames:   {}", source.frames().len());
        println!("Stacks:   {}", source.stacks().len());
        println!("Duration: {:.6} s", source.sample_end_time());
        if stats.filtered > 0 {
            println!("Filtered: {}", stats.filtered);
        }
        if stats.truncated > 0 {
            println!("Truncated samples: {}", stats.truncated);
        }
        if options.thread_time {
            println!(
                "Blocked:  {:.6} s over {} periods",
                source.total_blocked_time(),
                source.blocked_periods().len()
            );
        }
    }

    let export_path = args.export_path();
    StackJsonExporter::new(&source)
        .export_to_file(&export_path)
        .with_context(|| format!("Failed to write {}", export_path.display()))?;

    if !args.quiet {
        println!("Wrote {}", export_path.display());
    }
    Ok(())
}
