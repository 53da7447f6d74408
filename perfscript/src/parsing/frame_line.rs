//! Stack frame line parsing
//!
//! A frame line looks like:
//!
//! ```text
//! \t    7f3a2c10 __libc_read+0x10 (/usr/lib/x86_64-linux-gnu/libc.so.6)
//!       ───┬────  ──────┬───────   ────────────────┬─────────────────
//!       address    assumed symbol      assumed module (after the LAST '(')
//! ```
//!
//! Symbols may contain parentheses and spaces themselves (C++ signatures), so
//! the split happens at the last `(` on the line. JIT perf maps
//! (`/tmp/perf-<pid>.map`) print the real module as a bracketed token inside
//! the symbol text; those are re-split by [`split_map_symbol`].

use std::io::{Read, Seek};

use perfscript_common::Frame;

use crate::scanning::ByteCursor;

/// First byte of the placeholder line appended at a truncated chunk cut.
///
/// perf-script output is printable text, so this byte never starts a real line.
pub const TRUNCATION_MARKER: u8 = 0x01;

/// Complete placeholder line, including its newline
pub const TRUNCATION_LINE: &[u8] = b"\x01truncated\n";

/// Result of reading one line of a record's frame section
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameLine {
    Frame(Frame),
    /// The placeholder line written at a truncated chunk cut
    TruncationMarker,
    /// Whitespace-only line
    Blank,
}

/// Read one frame line, leaving the cursor on its terminating `'\n'` (or at the end).
pub fn read_frame<R: Read + Seek>(cursor: &mut ByteCursor<R>) -> FrameLine {
    cursor.skip_spaces();

    match cursor.current() {
        TRUNCATION_MARKER if !cursor.is_at_end() => {
            cursor.skip_up_to(b'\n');
            return FrameLine::TruncationMarker;
        }
        b'\n' | b'\r' => {
            cursor.skip_up_to(b'\n');
            return FrameLine::Blank;
        }
        _ if cursor.is_at_end() => return FrameLine::Blank,
        _ => {}
    }

    let address = cursor.read_until_any(b" \t\n");
    cursor.skip_spaces();

    let assumed_symbol = cursor.read_until_last_on_line(b'(');
    let assumed_module = cursor.read_until(b'\n');
    let assumed_module = remove_outer_brackets(assumed_module.trim());

    let (module, symbol) = if assumed_module.ends_with(".map") {
        split_map_symbol(&assumed_symbol, assumed_module)
    } else {
        (
            assumed_module.to_string(),
            remove_outer_brackets(assumed_symbol.trim()).to_string(),
        )
    };

    FrameLine::Frame(Frame::Symbol {
        address,
        module: strip_directories(&module).to_string(),
        symbol,
    })
}

/// Strip every layer of matching `(...)` or `[...]` wrapping.
///
/// `"(([libc.so]))"` → `"libc.so"`. Idempotent.
#[must_use]
pub fn remove_outer_brackets(mut text: &str) -> &str {
    while text.len() >= 2
        && ((text.starts_with('(') && text.ends_with(')'))
            || (text.starts_with('[') && text.ends_with(']')))
    {
        text = &text[1..text.len() - 1];
    }
    text
}

/// Re-split a frame whose module is a JIT perf map.
///
/// The assumed symbol text is split on spaces; the first `[bracketed]` token
/// becomes the module and everything after it the symbol. When nothing
/// follows the token, the map path itself stands in as the symbol. Without a
/// bracketed token the `(module, symbol)` pair is kept as read.
///
/// Returns `(module, symbol)`.
#[must_use]
pub fn split_map_symbol(assumed_symbol: &str, assumed_module: &str) -> (String, String) {
    let tokens: Vec<&str> = assumed_symbol.split(' ').collect();

    for (index, token) in tokens.iter().enumerate() {
        let token = token.trim();
        if token.len() >= 2 && token.starts_with('[') && token.ends_with(']') {
            let module = remove_outer_brackets(token).to_string();
            let rest = tokens[index + 1..].join(" ");
            let rest = rest.trim();
            let symbol = if rest.is_empty() { assumed_module } else { rest };
            return (module, symbol.to_string());
        }
    }

    (
        assumed_module.to_string(),
        remove_outer_brackets(assumed_symbol.trim()).to_string(),
    )
}

/// Keep only the file name of a module path: `/a/b/libc.so` → `libc.so`.
#[must_use]
pub fn strip_directories(module: &str) -> &str {
    match module.rsplit('/').next() {
        Some(name) if !name.is_empty() => name,
        _ => module,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_of(line: &str) -> FrameLine {
        let mut cursor = ByteCursor::from_bytes(line.as_bytes().to_vec());
        read_frame(&mut cursor)
    }

    fn symbol(address: &str, module: &str, symbol: &str) -> FrameLine {
        FrameLine::Frame(Frame::Symbol {
            address: address.to_string(),
            module: module.to_string(),
            symbol: symbol.to_string(),
        })
    }

    #[test]
    fn test_plain_frame() {
        assert_eq!(
            frame_of("\t    7f3a2c10 __libc_read+0x10 (/usr/lib/libc.so.6)\n"),
            symbol("7f3a2c10", "libc.so.6", "__libc_read+0x10")
        );
    }

    #[test]
    fn test_symbol_with_parentheses_splits_at_last_paren() {
        assert_eq!(
            frame_of("  400 Foo::bar(int, char) (/opt/app/bin/app)\n"),
            symbol("400", "app", "Foo::bar(int, char)")
        );
    }

    #[test]
    fn test_unknown_frame() {
        assert_eq!(
            frame_of("  0 [unknown] ([unknown])\n"),
            symbol("0", "unknown", "unknown")
        );
    }

    #[test]
    fn test_map_module_is_reinterpreted() {
        assert_eq!(
            frame_of("  7f00 [System.Private.CoreLib.dll] System.String::Concat (/tmp/perf-42.map)\n"),
            symbol("7f00", "System.Private.CoreLib.dll", "System.String::Concat")
        );
    }

    #[test]
    fn test_map_module_without_bracketed_token_keeps_values() {
        assert_eq!(
            frame_of("  7f00 jitted_method (/tmp/perf-42.map)\n"),
            symbol("7f00", "perf-42.map", "jitted_method")
        );
    }

    #[test]
    fn test_truncation_marker() {
        let mut cursor = ByteCursor::from_bytes(b"\x01truncated\nrest".to_vec());
        assert_eq!(read_frame(&mut cursor), FrameLine::TruncationMarker);
        assert_eq!(cursor.current(), b'\n');
    }

    #[test]
    fn test_blank_line() {
        assert_eq!(frame_of("   \n"), FrameLine::Blank);
        assert_eq!(frame_of(""), FrameLine::Blank);
    }

    #[test]
    fn test_remove_outer_brackets() {
        assert_eq!(remove_outer_brackets("(([libc.so]))"), "libc.so");
        assert_eq!(remove_outer_brackets("libc.so"), "libc.so");
        assert_eq!(remove_outer_brackets("(a) (b)"), "a) (b");
        assert_eq!(remove_outer_brackets("()"), "");
        assert_eq!(remove_outer_brackets("("), "(");
        assert_eq!(remove_outer_brackets(""), "");
    }

    #[test]
    fn test_remove_outer_brackets_is_idempotent() {
        let once = remove_outer_brackets("[(kernel.kallsyms)]");
        assert_eq!(remove_outer_brackets(once), once);
    }

    #[test]
    fn test_strip_directories() {
        assert_eq!(strip_directories("/a/b/libc.so"), "libc.so");
        assert_eq!(strip_directories("libc.so"), "libc.so");
        assert_eq!(strip_directories(strip_directories("/x/y")), "y");
        assert_eq!(strip_directories("/"), "/");
    }

    #[test]
    fn test_split_map_symbol_falls_back_to_map_path() {
        assert_eq!(
            split_map_symbol("[unknown]", "/tmp/perf-1.map"),
            ("unknown".to_string(), "/tmp/perf-1.map".to_string())
        );
    }
}
