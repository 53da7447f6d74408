//! Stack source export
//!
//! Serialises the interned tables of a [`crate::PerfScriptStackSource`] as
//! JSON: frames (id → name), stacks (id → caller, frame), samples
//! (id → time, stack), and the total blocked time.

pub mod stack_json;

pub use stack_json::StackJsonExporter;
