//! Thread-safe frame and stack interning.
//!
//! Parser workers call into one shared [`StackInterner`] per parse session.
//! Frames and stacks live behind two independent locks so that a worker
//! interning a frame name never waits on a worker extending the call tree.
//! Each lock is held only for the map check-and-insert.

// Ids are dense u32/i32 table indices; a session never approaches 2^31 entries.
#![allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::{composite_key, Frame, FrameId, StackId, StackNode};

#[derive(Debug, Default)]
struct FrameTable {
    ids: HashMap<String, FrameId>,
    frames: Vec<Frame>,
}

#[derive(Debug, Default)]
struct StackTable {
    ids: HashMap<i64, StackId>,
    nodes: Vec<StackNode>,
}

/// Deduplicating frame and call-tree tables.
///
/// - `intern_frame`: same display key → same [`FrameId`]
/// - `intern_stack`: same `(caller, frame)` → same [`StackId`]
///
/// Interning is append-only: ids are never reused or invalidated while the
/// interner lives.
#[derive(Debug, Default)]
pub struct StackInterner {
    frames: Mutex<FrameTable>,
    stacks: Mutex<StackTable>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Tables are append-only, so a panic mid-insert cannot leave them torn.
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl StackInterner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the id for `frame`'s display key, allocating the next id on first sight.
    pub fn intern_frame(&self, frame: &Frame) -> FrameId {
        let key = frame.display_key();
        let mut table = lock(&self.frames);
        if let Some(&id) = table.ids.get(&key) {
            return id;
        }

        let id = FrameId(table.frames.len() as u32);
        table.ids.insert(key, id);
        table.frames.push(frame.clone());
        id
    }

    /// Return the stack node for `(caller, frame)`, creating it on first sight.
    pub fn intern_stack(&self, frame: FrameId, caller: StackId) -> StackId {
        let key = composite_key(caller, frame);
        let mut table = lock(&self.stacks);
        if let Some(&id) = table.ids.get(&key) {
            return id;
        }

        let id = StackId(table.nodes.len() as i32);
        table.ids.insert(key, id);
        table.nodes.push(StackNode { frame, caller });
        id
    }

    /// Intern a whole frame sequence and return the id of its deepest node.
    ///
    /// `frames` is ordered deepest-first (leaf at index 0, process frame
    /// last), the way profilers print stacks. The tree is built root-first,
    /// so the walk runs back to front with `start` as the initial caller.
    /// An empty sequence returns `start`.
    pub fn intern_frames(&self, frames: &[Frame], start: StackId) -> StackId {
        frames.iter().rev().fold(start, |caller, frame| {
            let frame_id = self.intern_frame(frame);
            self.intern_stack(frame_id, caller)
        })
    }

    #[must_use]
    pub fn frame_count(&self) -> usize {
        lock(&self.frames).frames.len()
    }

    #[must_use]
    pub fn stack_count(&self) -> usize {
        lock(&self.stacks).nodes.len()
    }

    #[must_use]
    pub fn frame(&self, id: FrameId) -> Option<Frame> {
        lock(&self.frames).frames.get(id.0 as usize).cloned()
    }

    #[must_use]
    pub fn frame_name(&self, id: FrameId) -> Option<String> {
        self.frame(id).map(|frame| frame.display_key())
    }

    #[must_use]
    pub fn stack(&self, id: StackId) -> Option<StackNode> {
        let index = id.index()?;
        lock(&self.stacks).nodes.get(index).copied()
    }

    /// Consume the interner, yielding the frame and stack tables indexed by id.
    #[must_use]
    pub fn into_tables(self) -> (Vec<Frame>, Vec<StackNode>) {
        let frames = self.frames.into_inner().unwrap_or_else(PoisonError::into_inner);
        let stacks = self.stacks.into_inner().unwrap_or_else(PoisonError::into_inner);
        (frames.frames, stacks.nodes)
    }
}
