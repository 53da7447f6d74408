//! Sample boundary detection
//!
//! A perf-script record ends at a blank line. The same predicate drives the
//! record parser (stop reading frames) and the chunk scheduler (where a
//! buffer may be cut), so both live here in two flavours: one over a live
//! [`ByteCursor`] and one over a raw byte window.

use std::io::{Read, Seek};

use super::ByteCursor;

/// True when the cursor sits on the newline that ends a sample.
///
/// That is: `current()` is `'\n'` and the next byte is `'\n'`, `'\r'` or
/// the sentinel, or the stream is already exhausted.
pub fn is_end_of_sample<R: Read + Seek>(cursor: &mut ByteCursor<R>) -> bool {
    if cursor.is_at_end() {
        return true;
    }
    if cursor.current() != b'\n' {
        return false;
    }
    let next = cursor.peek(1);
    next == b'\n' || next == b'\r' || next == cursor.sentinel()
}

/// True when `window[index]` ends a sample and a complete next byte is visible.
///
/// Unlike [`is_end_of_sample`] this never treats the end of the window as a
/// boundary, because more bytes may still follow in the stream.
#[must_use]
pub fn is_boundary_bytes(window: &[u8], index: usize) -> bool {
    window.get(index) == Some(&b'\n') && matches!(window.get(index + 1), Some(b'\n' | b'\r'))
}
