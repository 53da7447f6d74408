//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "perfscript",
    about = "Parse perf script dumps into interned call stacks",
    after_help = "\
EXAMPLES:
    perfscript perf.data.txt                        Parse every event
    perfscript perf.data.txt '^cycles$'             Keep only cycles samples
    perfscript trace.trace.zip --thread-time        Blocked/CPU stacks and blocked time
    perfscript perf.data.dump --export stacks.json  Choose the JSON output path"
)]
pub struct Args {
    /// Input file (.data.txt, .data.dump or .trace.zip)
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Regex applied to event names; non-matching records are skipped
    #[arg(value_name = "FILTER")]
    pub filter: Option<String>,

    /// Derive blocked time from sched_switch events (single worker)
    #[arg(long)]
    pub thread_time: bool,

    /// Parser worker threads
    #[arg(short, long, default_value = "4")]
    pub workers: usize,

    /// Read buffer length in bytes (minimum 512)
    #[arg(long, value_name = "BYTES", default_value = "16384")]
    pub buffer_len: usize,

    /// Stop after N samples
    #[arg(long, value_name = "N")]
    pub max_samples: Option<usize>,

    /// Write the stack source as JSON (default: <INPUT>.stacks.json)
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Export path, defaulting to `<INPUT>.stacks.json`
    #[must_use]
    pub fn export_path(&self) -> PathBuf {
        self.export.clone().unwrap_or_else(|| {
            let mut name = self.input.clone().into_os_string();
            name.push(".stacks.json");
            PathBuf::from(name)
        })
    }
}
