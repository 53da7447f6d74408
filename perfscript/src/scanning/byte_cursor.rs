//! # Buffered Byte Cursor
//!
//! A fast, forward-only ASCII scanner over any `Read + Seek` source, with
//! explicit backtracking.
//!
//! ## Model
//!
//! The cursor behaves like an enumerator: [`ByteCursor::current`] is the byte
//! under the cursor and [`ByteCursor::advance`] moves to the next one. Reading
//! past the end is not an error: `current()` returns the *sentinel* byte
//! (default `0`), so scanning loops can test "whitespace or sentinel" without
//! a separate end-of-stream branch.
//!
//! ## Buffer Layout
//!
//! ```text
//!  buffer_offset                                         (stream offset of buffer[0])
//!  │
//!  ▼
//!  ┌────────────────┬───────────────────────────────┬──────────────┐
//!  │ history (≤256) │ unread bytes                  │ free space   │
//!  └────────────────┴───────────────────────────────┴──────────────┘
//!                   ▲                               ▲
//!                   read_pos                        fill
//! ```
//!
//! Whenever the buffer is refilled, up to [`HISTORY_LEN`] already-consumed
//! bytes are slid down along with the unread tail. A [`Position`] that still
//! lies inside the buffer is restored by moving `read_pos`; anything older is
//! restored by seeking the underlying reader and discarding the buffer.
//!
//! ## Errors
//!
//! I/O errors are recorded, not returned: the cursor behaves as if the
//! stream ended, and the caller picks the error up with
//! [`ByteCursor::take_error`] once scanning is done.

// Buffer offsets are bounded by the buffer length, which always fits in usize.
#![allow(clippy::cast_possible_truncation)]

use std::io::{self, Cursor, Read, Seek, SeekFrom};

/// Default refill granularity (16 KiB)
pub const DEFAULT_BUFFER_LEN: usize = 16 * 1024;

/// Consumed bytes kept in front of `read_pos` across refills.
pub const HISTORY_LEN: usize = 256;

/// Smallest buffer that still leaves room after the history region.
pub const MIN_BUFFER_LEN: usize = 2 * HISTORY_LEN;

/// A point in the stream captured by [`ByteCursor::mark`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position(u64);

impl Position {
    /// Absolute byte offset in the underlying stream
    #[must_use]
    pub fn offset(self) -> u64 {
        self.0
    }
}

/// Buffered byte reader with peek-ahead and mark/restore.
pub struct ByteCursor<R> {
    reader: R,
    buffer: Vec<u8>,
    /// Index of `current()` in `buffer`
    read_pos: usize,
    /// One past the last valid byte in `buffer`
    fill: usize,
    /// Stream offset of `buffer[0]`; the reader always sits at `buffer_offset + fill`
    buffer_offset: u64,
    reader_done: bool,
    sentinel: u8,
    error: Option<io::Error>,
}

impl ByteCursor<Cursor<Vec<u8>>> {
    /// Cursor over an in-memory chunk, sized so the whole chunk is buffered at once.
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let capacity = bytes.len().max(MIN_BUFFER_LEN - 1) + 1;
        Self::with_capacity(Cursor::new(bytes), capacity)
    }
}

impl<R: Read + Seek> ByteCursor<R> {
    /// Create a cursor with the default buffer length
    pub fn new(reader: R) -> Self {
        Self::with_capacity(reader, DEFAULT_BUFFER_LEN)
    }

    /// Create a cursor that refills `capacity` bytes at a time.
    ///
    /// `capacity` is clamped to [`MIN_BUFFER_LEN`]. The first byte is loaded
    /// immediately, so `current()` is valid right after construction.
    pub fn with_capacity(mut reader: R, capacity: usize) -> Self {
        let (buffer_offset, error) = match reader.stream_position() {
            Ok(offset) => (offset, None),
            Err(e) => (0, Some(e)),
        };

        let mut cursor = Self {
            reader,
            buffer: vec![0; capacity.max(MIN_BUFFER_LEN)],
            read_pos: 0,
            fill: 0,
            buffer_offset,
            reader_done: error.is_some(),
            sentinel: 0,
            error,
        };
        cursor.fill_to(1);
        cursor
    }

    /// Use `sentinel` as the value of `current()` past the end of the stream.
    #[must_use]
    pub fn with_sentinel(mut self, sentinel: u8) -> Self {
        self.sentinel = sentinel;
        self
    }

    // =========================================================================
    // Core access
    // =========================================================================

    /// The byte under the cursor, or the sentinel past the end.
    #[inline]
    #[must_use]
    pub fn current(&self) -> u8 {
        if self.read_pos < self.fill {
            self.buffer[self.read_pos]
        } else {
            self.sentinel
        }
    }

    /// Move to the next byte. Returns false once the stream is exhausted.
    #[inline]
    pub fn advance(&mut self) -> bool {
        if self.read_pos < self.fill {
            self.read_pos += 1;
        }
        self.read_pos < self.fill || self.ensure(0)
    }

    /// The byte `ahead` positions past the cursor, without consuming anything.
    ///
    /// `peek(0)` is `current()`. Returns the sentinel past the end.
    pub fn peek(&mut self, ahead: usize) -> u8 {
        if self.ensure(ahead) {
            self.buffer[self.read_pos + ahead]
        } else {
            self.sentinel
        }
    }

    /// True once every byte of the stream has been consumed.
    #[must_use]
    pub fn is_at_end(&self) -> bool {
        self.read_pos >= self.fill
    }

    /// Absolute stream offset of `current()`
    #[must_use]
    pub fn position(&self) -> u64 {
        self.buffer_offset + self.read_pos as u64
    }

    #[must_use]
    pub fn sentinel(&self) -> u8 {
        self.sentinel
    }

    /// Remember the current position for a later [`ByteCursor::restore_to`].
    #[must_use]
    pub fn mark(&self) -> Position {
        Position(self.position())
    }

    /// Rewind (or fast-forward) to a previously marked position.
    ///
    /// Cheap when the position is still buffered (always true for the last
    /// [`HISTORY_LEN`] bytes); otherwise the reader is re-seeked.
    pub fn restore_to(&mut self, position: Position) {
        let window_end = self.buffer_offset + self.fill as u64;
        if position.0 >= self.buffer_offset && position.0 <= window_end {
            self.read_pos = (position.0 - self.buffer_offset) as usize;
            if self.read_pos >= self.fill {
                self.ensure(0);
            }
            return;
        }

        match self.reader.seek(SeekFrom::Start(position.0)) {
            Ok(_) => {
                self.buffer_offset = position.0;
                self.read_pos = 0;
                self.fill = 0;
                self.reader_done = false;
                self.fill_to(1);
            }
            Err(e) => {
                self.record_error(e);
                self.read_pos = self.fill;
            }
        }
    }

    /// Return the first I/O error hit while scanning, if any.
    pub fn take_error(&mut self) -> Option<io::Error> {
        self.error.take()
    }

    // =========================================================================
    // Bulk access (used by the chunk scheduler)
    // =========================================================================

    /// Fill the buffer as far as possible and return every unread byte in it.
    pub fn fill_window(&mut self) -> &[u8] {
        if !self.reader_done {
            self.slide();
            let capacity = self.buffer.len();
            self.fill_to(capacity);
        }
        &self.buffer[self.read_pos..self.fill]
    }

    /// Unread bytes currently in the buffer, without refilling.
    #[must_use]
    pub fn buffered(&self) -> &[u8] {
        &self.buffer[self.read_pos..self.fill]
    }

    /// True once the underlying reader has returned end-of-file.
    ///
    /// Buffered bytes may still be unread.
    #[must_use]
    pub fn reader_exhausted(&self) -> bool {
        self.reader_done
    }

    /// Skip `count` buffered bytes.
    pub fn consume(&mut self, count: usize) {
        self.read_pos = (self.read_pos + count).min(self.fill);
        if self.read_pos >= self.fill {
            self.ensure(0);
        }
    }

    /// Size of the refill buffer in bytes
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    // =========================================================================
    // Token helpers
    // =========================================================================

    /// Skip spaces, tabs, and line breaks.
    pub fn skip_whitespace(&mut self) {
        while self.current().is_ascii_whitespace() {
            if !self.advance() {
                break;
            }
        }
    }

    /// Skip spaces and tabs only (line breaks are significant).
    pub fn skip_spaces(&mut self) {
        while matches!(self.current(), b' ' | b'\t') {
            if !self.advance() {
                break;
            }
        }
    }

    /// Advance until `current() == target` or the stream ends.
    pub fn skip_up_to(&mut self, target: u8) {
        while self.current() != target {
            if !self.advance() {
                break;
            }
        }
    }

    /// Advance until `current() == target` without crossing a newline.
    ///
    /// Returns false (leaving the cursor on the `'\n'`) when the line has no `target`.
    pub fn skip_up_to_on_line(&mut self, target: u8) -> bool {
        loop {
            let c = self.current();
            if c == target && !self.is_at_end() {
                return true;
            }
            if c == b'\n' || !self.advance() {
                return false;
            }
        }
    }

    /// Read bytes up to (not including) `end`, leaving the cursor on `end`.
    pub fn read_until(&mut self, end: u8) -> String {
        self.read_until_true(|c| c == end)
    }

    /// Read bytes up to the first of any byte in `ends`.
    pub fn read_until_any(&mut self, ends: &[u8]) -> String {
        self.read_until_true(|c| ends.contains(&c))
    }

    /// Read one whitespace-delimited token.
    pub fn read_until_whitespace(&mut self) -> String {
        self.read_until_true(|c| c.is_ascii_whitespace())
    }

    /// Read bytes until `stop` returns true for the current byte.
    pub fn read_until_true(&mut self, mut stop: impl FnMut(u8) -> bool) -> String {
        let mut out = String::new();
        while !self.is_at_end() {
            let c = self.current();
            if stop(c) {
                break;
            }
            out.push(char::from(c));
            self.advance();
        }
        out
    }

    /// Read everything before the *last* `target` on the current line.
    ///
    /// The cursor is left on that last `target`. If the line has no
    /// `target`, nothing is consumed and an empty string is returned.
    pub fn read_until_last_on_line(&mut self, target: u8) -> String {
        let start = self.mark();
        let mut bytes = Vec::new();
        let mut last: Option<(usize, Position)> = None;

        while !self.is_at_end() && self.current() != b'\n' {
            if self.current() == target {
                last = Some((bytes.len(), self.mark()));
            }
            bytes.push(self.current());
            self.advance();
        }

        match last {
            Some((len, position)) => {
                bytes.truncate(len);
                self.restore_to(position);
            }
            None => {
                bytes.clear();
                self.restore_to(start);
            }
        }

        bytes.into_iter().map(char::from).collect()
    }

    /// Read a signed decimal (or `0x`-prefixed hex) integer.
    ///
    /// Leading spaces are skipped. Returns `-1` when no digits are present
    /// or the value does not fit in an `i64`, which callers treat as
    /// "field absent".
    pub fn read_int(&mut self) -> i64 {
        self.skip_spaces();

        let negative = self.current() == b'-';
        if negative {
            self.advance();
        }
        if !self.current().is_ascii_digit() {
            return -1;
        }

        let radix = if self.current() == b'0'
            && matches!(self.peek(1), b'x' | b'X')
            && self.peek(2).is_ascii_hexdigit()
        {
            self.advance();
            self.advance();
            16
        } else {
            10
        };

        // Digits are always consumed; an out-of-range value reads as absent.
        let mut value = Some(0i64);
        while let Some(digit) = self.digit(radix) {
            value = value
                .and_then(|v| v.checked_mul(i64::from(radix)))
                .and_then(|v| v.checked_add(i64::from(digit)));
            self.advance();
        }

        match value {
            Some(value) if negative => -value,
            Some(value) => value,
            None => -1,
        }
    }

    fn digit(&self, radix: u32) -> Option<u32> {
        if self.is_at_end() {
            return None;
        }
        char::from(self.current()).to_digit(radix)
    }

    /// [`ByteCursor::read_int`] narrowed to `i32` (out-of-range values become `-1`).
    pub fn read_i32(&mut self) -> i32 {
        i32::try_from(self.read_int()).unwrap_or(-1)
    }

    // =========================================================================
    // Buffer management
    // =========================================================================

    /// Make `buffer[read_pos + ahead]` valid if the stream is long enough.
    fn ensure(&mut self, ahead: usize) -> bool {
        if self.read_pos + ahead < self.fill {
            return true;
        }
        if self.reader_done {
            return false;
        }

        self.slide();
        let needed = self.read_pos + ahead + 1;
        if needed > self.buffer.len() {
            self.buffer.resize(needed, 0);
        }
        self.fill_to(needed);
        self.read_pos + ahead < self.fill
    }

    /// Drop consumed bytes older than the history window.
    fn slide(&mut self) {
        let keep_from = self.read_pos.saturating_sub(HISTORY_LEN);
        if keep_from == 0 {
            return;
        }
        self.buffer.copy_within(keep_from..self.fill, 0);
        self.buffer_offset += keep_from as u64;
        self.read_pos -= keep_from;
        self.fill -= keep_from;
    }

    /// Read until `fill >= needed` or the reader is exhausted.
    fn fill_to(&mut self, needed: usize) {
        while self.fill < needed && !self.reader_done {
            match self.reader.read(&mut self.buffer[self.fill..]) {
                Ok(0) => self.reader_done = true,
                Ok(count) => self.fill += count,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    self.record_error(e);
                    self.reader_done = true;
                }
            }
        }
    }

    fn record_error(&mut self, error: io::Error) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor(text: &str) -> ByteCursor<Cursor<Vec<u8>>> {
        ByteCursor::from_bytes(text.as_bytes().to_vec())
    }

    /// Reader that hands out at most `step` bytes per call, to force refills.
    struct Trickle {
        inner: Cursor<Vec<u8>>,
        step: usize,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let len = buf.len().min(self.step);
            self.inner.read(&mut buf[..len])
        }
    }

    impl Seek for Trickle {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    fn trickle(bytes: Vec<u8>, step: usize) -> ByteCursor<Trickle> {
        ByteCursor::with_capacity(Trickle { inner: Cursor::new(bytes), step }, MIN_BUFFER_LEN)
    }

    #[test]
    fn test_current_and_advance() {
        let mut c = cursor("ab");
        assert_eq!(c.current(), b'a');
        assert!(c.advance());
        assert_eq!(c.current(), b'b');
        assert!(!c.advance());
        assert!(c.is_at_end());
        assert_eq!(c.current(), 0);
        assert!(!c.advance());
    }

    #[test]
    fn test_empty_stream_is_at_end() {
        let c = cursor("");
        assert!(c.is_at_end());
        assert_eq!(c.current(), 0);
    }

    #[test]
    fn test_custom_sentinel() {
        let c = cursor("").with_sentinel(b'#');
        assert_eq!(c.current(), b'#');
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut c = cursor("xyz");
        assert_eq!(c.peek(0), b'x');
        assert_eq!(c.peek(2), b'z');
        assert_eq!(c.peek(3), 0);
        assert_eq!(c.current(), b'x');
    }

    #[test]
    fn test_peek_across_refill() {
        let bytes: Vec<u8> = (0..2000u32).map(|i| b'a' + (i % 26) as u8).collect();
        let mut c = trickle(bytes.clone(), 7);
        for _ in 0..900 {
            c.advance();
        }
        assert_eq!(c.peek(600), bytes[1500]);
        assert_eq!(c.current(), bytes[900]);
    }

    #[test]
    fn test_read_int_variants() {
        assert_eq!(cursor("  42/").read_int(), 42);
        assert_eq!(cursor("-17 ").read_int(), -17);
        assert_eq!(cursor("0x1f ").read_int(), 31);
        assert_eq!(cursor("0 ").read_int(), 0);
        assert_eq!(cursor("abc").read_int(), -1);
        assert_eq!(cursor("").read_int(), -1);
    }

    #[test]
    fn test_read_int_out_of_range_is_absent() {
        let mut c = cursor("-9223372036854775808]");
        assert_eq!(c.read_int(), -1);
        assert_eq!(c.current(), b']');

        assert_eq!(cursor("99999999999999999999 ").read_int(), -1);
        assert_eq!(cursor("0xffffffffffffffffff ").read_int(), -1);
        assert_eq!(cursor("9223372036854775807 ").read_int(), i64::MAX);
        assert_eq!(cursor("-9223372036854775807 ").read_int(), -i64::MAX);
        assert_eq!(cursor("4294967296 ").read_i32(), -1);
    }

    #[test]
    fn test_read_int_stops_at_delimiter() {
        let mut c = cursor("123/456");
        assert_eq!(c.read_int(), 123);
        assert_eq!(c.current(), b'/');
        c.advance();
        assert_eq!(c.read_int(), 456);
        assert!(c.is_at_end());
    }

    #[test]
    fn test_read_until_and_whitespace() {
        let mut c = cursor("12.5: name rest");
        assert_eq!(c.read_until(b':'), "12.5");
        assert_eq!(c.current(), b':');
        c.advance();
        c.skip_whitespace();
        assert_eq!(c.read_until_whitespace(), "name");
        assert_eq!(c.read_until_any(b"xr"), " ");
    }

    #[test]
    fn test_read_until_last_on_line() {
        let mut c = cursor("sym(int) (libfoo.so)\nnext");
        assert_eq!(c.read_until_last_on_line(b'('), "sym(int) ");
        assert_eq!(c.read_until(b'\n'), "(libfoo.so)");
    }

    #[test]
    fn test_read_until_last_on_line_without_target() {
        let mut c = cursor("no parens here\n");
        assert_eq!(c.read_until_last_on_line(b'('), "");
        assert_eq!(c.current(), b'n');
    }

    #[test]
    fn test_skip_up_to_on_line_stops_at_newline() {
        let mut c = cursor("abc\n=");
        assert!(!c.skip_up_to_on_line(b'='));
        assert_eq!(c.current(), b'\n');

        let mut c = cursor("ab=c");
        assert!(c.skip_up_to_on_line(b'='));
        assert_eq!(c.current(), b'=');
    }

    #[test]
    fn test_mark_restore_short_distance() {
        let mut c = cursor("hello world");
        c.advance();
        let mark = c.mark();
        c.skip_up_to(b'w');
        assert_eq!(c.current(), b'w');
        c.restore_to(mark);
        assert_eq!(c.current(), b'e');
        assert_eq!(c.position(), 1);
    }

    #[test]
    fn test_mark_restore_long_distance_reseeks() {
        let bytes: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8 + 1).collect();
        let mut c = trickle(bytes.clone(), 64);
        for _ in 0..10 {
            c.advance();
        }
        let mark = c.mark();
        for _ in 0..4000 {
            c.advance();
        }
        assert_eq!(c.current(), bytes[4010]);

        c.restore_to(mark);
        assert_eq!(c.position(), 10);
        assert_eq!(c.current(), bytes[10]);
        c.advance();
        assert_eq!(c.current(), bytes[11]);
    }

    #[test]
    fn test_fill_window_and_consume() {
        let mut c = cursor("abcdef");
        c.advance();
        assert_eq!(c.fill_window(), b"bcdef");
        assert!(c.reader_exhausted());
        c.consume(3);
        assert_eq!(c.current(), b'e');
        c.consume(10);
        assert!(c.is_at_end());
    }

    #[test]
    fn test_long_line_is_read_through_refills() {
        let line = "x".repeat(3000);
        let mut c = trickle(format!("{line}(mod)\n").into_bytes(), 100);
        let symbol = c.read_until_last_on_line(b'(');
        assert_eq!(symbol.len(), 3000);
        assert_eq!(c.read_until(b'\n'), "(mod)");
    }
}
