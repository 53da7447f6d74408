//! JSON export of a parsed stack source
//!
//! ```json
//! {"frames":[{"id":0,"name":"comm"}],
//!  "stacks":[{"id":0,"caller":-1,"frame":0}],
//!  "samples":[{"id":0,"time":0.0,"stack":0}],
//!  "totalBlockedTime":0.0}
//! ```
//!
//! `blockedPeriods` is only written when thread-time analysis produced any.

use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use perfscript_common::{FrameId, StackId};

use crate::analysis::ThreadPeriod;
use crate::domain::ExportError;
use crate::stack_source::PerfScriptStackSource;

/// Frame table row
#[derive(Debug, Serialize)]
struct FrameRecord {
    id: FrameId,
    name: String,
}

/// Stack table row; `caller` is -1 for outermost frames
#[derive(Debug, Serialize)]
struct StackRecord {
    id: StackId,
    caller: StackId,
    frame: FrameId,
}

/// Sample table row, time in seconds since the first sample
#[derive(Debug, Serialize)]
struct SampleRecord {
    id: usize,
    time: f64,
    stack: StackId,
}

/// Stack source document
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StackSourceDocument<'a> {
    frames: Vec<FrameRecord>,
    stacks: Vec<StackRecord>,
    samples: Vec<SampleRecord>,
    total_blocked_time: f64,
    #[serde(skip_serializing_if = "no_periods")]
    blocked_periods: &'a [ThreadPeriod],
}

fn no_periods(periods: &&[ThreadPeriod]) -> bool {
    periods.is_empty()
}

/// Writes a parsed stack source as one JSON document
pub struct StackJsonExporter<'a> {
    source: &'a PerfScriptStackSource,
    pretty: bool,
}

// Table sizes are bounded by the interner's u32/i32 ids.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
impl<'a> StackJsonExporter<'a> {
    /// Create an exporter for `source`
    pub fn new(source: &'a PerfScriptStackSource) -> Self {
        Self { source, pretty: false }
    }

    /// Indent the output for humans
    #[must_use]
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    fn document(&self) -> StackSourceDocument<'a> {
        let source = self.source;

        let frames = source
            .frames()
            .iter()
            .enumerate()
            .map(|(id, frame)| FrameRecord { id: FrameId(id as u32), name: frame.display_key() })
            .collect();

        let stacks = source
            .stacks()
            .iter()
            .enumerate()
            .map(|(id, node)| StackRecord {
                id: StackId(id as i32),
                caller: node.caller,
                frame: node.frame,
            })
            .collect();

        let samples = source
            .samples()
            .iter()
            .enumerate()
            .map(|(id, sample)| SampleRecord { id, time: sample.time, stack: sample.stack })
            .collect();

        StackSourceDocument {
            frames,
            stacks,
            samples,
            total_blocked_time: source.total_blocked_time(),
            blocked_periods: source.blocked_periods(),
        }
    }

    /// Write the document to `writer`
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn export<W: Write>(&self, writer: W) -> Result<(), ExportError> {
        let document = self.document();
        if self.pretty {
            serde_json::to_writer_pretty(writer, &document)?;
        } else {
            serde_json::to_writer(writer, &document)?;
        }
        Ok(())
    }

    /// Write the document to a new file at `path`
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    pub fn export_to_file(&self, path: &Path) -> Result<(), ExportError> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.export(&mut writer)?;
        writer.flush()?;
        Ok(())
    }
}
