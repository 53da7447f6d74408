//! Structured error types for perfscript
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! Only unsupported or unreadable input is an error; malformed fields inside
//! a trace are tolerated by the scanner and never reach these types.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Not a valid input file: {0} (expected .data.dump, .data.txt or .trace.zip)")]
    UnsupportedInput(PathBuf),

    #[error("No .data.dump or .data.txt entry found in archive {0}")]
    MissingArchiveEntry(PathBuf),

    #[error("Invalid event filter: {0}")]
    InvalidFilter(#[from] regex::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Archive(#[from] zip::result::ZipError),
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
