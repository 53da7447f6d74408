//! Byte-level scanning primitives
//!
//! - [`ByteCursor`] - buffered reader with peek-ahead and mark/restore
//! - [`boundary`] - the end-of-sample predicate shared by parser and scheduler

pub mod boundary;
pub mod byte_cursor;

pub use boundary::{is_boundary_bytes, is_end_of_sample};
pub use byte_cursor::{ByteCursor, Position, DEFAULT_BUFFER_LEN, HISTORY_LEN, MIN_BUFFER_LEN};
