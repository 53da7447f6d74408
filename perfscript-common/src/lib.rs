//! # Shared Stack Model (Parsers ↔ Viewers)
//!
//! Defines the interned call-stack model shared by every trace front end.
//! The perf-script text parser in `perfscript` builds on it, and any other
//! sample producer (for example a binary CLR event reader) can reuse the same
//! frame and stack tables without pulling in the text scanner.
//!
//! ## Key Types
//!
//! - [`FrameId`] / [`StackId`] - Dense integer identities handed out by the interner
//! - [`Frame`] - One named entry in a call stack (symbol, process/thread, state)
//! - [`StackNode`] - One `(caller, frame)` point in the shared call tree
//! - [`StackInterner`] - Thread-safe deduplicating frame and stack tables
//!
//! ## Stack Shape
//!
//! ```text
//!   ROOT (-1)
//!     └── comm               (process pseudo-frame)
//!           └── Thread (42)  (thread pseudo-frame)
//!                 └── libc.so!read
//!                       └── app!main_loop   ← sample's top stack id
//! ```

use std::fmt;

pub mod interner;

pub use interner::StackInterner;

// ============================================================================
// Identities
// ============================================================================

/// Dense frame identity (0, 1, 2, ...) assigned in first-seen order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FrameId(pub u32);

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame#{}", self.0)
    }
}

/// Dense stack identity.
///
/// Negative values are reserved: [`StackId::ROOT`] is the caller of every
/// outermost frame and never has a node of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StackId(pub i32);

impl StackId {
    /// The "no caller" sentinel.
    pub const ROOT: StackId = StackId(-1);

    /// Returns true if this id names a real stack node (non-negative)
    #[must_use]
    pub fn is_valid(self) -> bool {
        self.0 >= 0
    }

    /// Index into the stack table (None for the root sentinel)
    #[must_use]
    pub fn index(self) -> Option<usize> {
        usize::try_from(self.0).ok()
    }
}

impl fmt::Display for StackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Stack#{}", self.0)
    }
}

// ============================================================================
// Frames
// ============================================================================

/// Synthetic per-thread state used in thread-time mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ThreadState {
    /// Thread was switched out and has not been seen running since
    Blocked,
    /// Thread was running on a CPU
    Cpu,
}

impl ThreadState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ThreadState::Blocked => "Blocked",
            ThreadState::Cpu => "CPU",
        }
    }
}

/// Discriminant of a [`Frame`], for callers that only care about the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Symbol,
    ProcessThread,
    State,
}

/// One named entry in a call stack.
///
/// Two frames with the same [`Frame::display_key`] are the same frame as far
/// as interning is concerned, even if their addresses differ.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Frame {
    /// A resolved code location: `module!symbol`
    Symbol {
        /// Raw address token as printed by the profiler (kept for display only)
        address: String,
        module: String,
        symbol: String,
    },
    /// Process or thread pseudo-frame at the root-ward end of a stack.
    ///
    /// Threads carry their id (`Thread (42)`); processes are keyed by
    /// command name alone.
    ProcessThread { id: Option<i32>, name: String },
    /// `Blocked` / `CPU` pseudo-frame used in thread-time mode
    State(ThreadState),
}

impl Frame {
    /// Thread pseudo-frame, displayed as `Thread (tid)`
    #[must_use]
    pub fn thread(tid: i32) -> Self {
        Frame::ProcessThread { id: Some(tid), name: "Thread".to_string() }
    }

    /// Process pseudo-frame, displayed as the bare command name
    #[must_use]
    pub fn process(command: impl Into<String>) -> Self {
        Frame::ProcessThread { id: None, name: command.into() }
    }

    /// The interning key and the name shown to users.
    #[must_use]
    pub fn display_key(&self) -> String {
        match self {
            Frame::Symbol { module, symbol, .. } => format!("{module}!{symbol}"),
            Frame::ProcessThread { id: Some(id), name } => format!("{name} ({id})"),
            Frame::ProcessThread { id: None, name } => name.clone(),
            Frame::State(state) => state.as_str().to_string(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> FrameKind {
        match self {
            Frame::Symbol { .. } => FrameKind::Symbol,
            Frame::ProcessThread { .. } => FrameKind::ProcessThread,
            Frame::State(_) => FrameKind::State,
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_key())
    }
}

// ============================================================================
// Stack Nodes
// ============================================================================

/// One node of the shared call tree.
///
/// Immutable once created; two nodes never share the same `(caller, frame)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StackNode {
    pub frame: FrameId,
    /// `StackId::ROOT` for outermost frames
    pub caller: StackId,
}

/// Combine a `(caller, frame)` pair into one 64-bit lookup key.
///
/// Caller goes in the high 32 bits, frame in the low 32 bits. The root
/// sentinel (-1) sign-extends into the high half, which still cannot collide
/// with any non-negative caller.
#[must_use]
pub fn composite_key(caller: StackId, frame: FrameId) -> i64 {
    (i64::from(caller.0) << 32) | i64::from(frame.0)
}
