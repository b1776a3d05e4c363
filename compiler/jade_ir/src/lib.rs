//! Jade IR - method intermediate representation types.
//!
//! This crate contains the per-method IR that the Jade optimization passes
//! operate on, together with the small host surfaces those passes consume:
//!
//! - [`Name`] / [`StringInterner`] — interned identifiers for classes,
//!   methods, and fields
//! - [`NodeId`], [`Op`], [`Node`] — dense value identity and the closed
//!   operation classification passes dispatch on
//! - [`IrGraph`] — the growable node arena for one compiled method,
//!   including its abstract memory edges
//! - [`RewriteSink`] — callback surface through which a pass reports the
//!   nodes it modified, so the host's worklist-driven simplification can
//!   revisit them
//!
//! # Design Philosophy
//!
//! - **Intern everything**: strings become `Name(u32)`, values become
//!   `NodeId(u32)` indices into the method's arena.
//! - **No ownership cycles**: nodes reference each other only by index,
//!   never by pointer. Edges are plain data.
//! - **Closed classification**: [`Op`] is a tagged variant set, dispatched
//!   by `match` in the passes. Operations a pass does not model fall into
//!   [`Op::Other`] and must be handled conservatively.
//!
//! Memory state is explicit: every memory-touching node carries a memory
//! operand naming the memory version it consumes, and [`Op::MemPhi`] merges
//! memory versions at control-flow joins. Passes that rewrite memory (the
//! escape analysis splitter) retarget those operands in place.

mod graph;
mod name;
mod node;

pub use graph::{CollectedRewrites, IrGraph, RewriteSink};
pub use name::{Name, StringInterner};
pub use node::{FieldRef, Node, NodeId, Op, ValueKind, UNKNOWN_OFFSET};
