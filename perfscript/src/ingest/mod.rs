//! Getting bytes in: input containers and parallel chunking
//!
//! - [`input`] - `.data.txt` / `.data.dump` / `.trace.zip` → seekable stream
//! - [`chunk_scheduler`] - sample-aligned chunks for the worker pool

pub mod chunk_scheduler;
pub mod input;

pub use chunk_scheduler::{Chunk, ChunkScheduler};
pub use input::{is_text_trace, open_input, InputStream, TEXT_SUFFIXES, ZIP_SUFFIX};
