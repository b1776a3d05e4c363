//! Escape analysis for the Jade JIT compiler.
//!
//! An intraprocedural, flow-insensitive adaptation of the escape analysis
//! described in:
//!
//! > \[Choi99\] Jong-Deok Choi, Manish Gupta, Mauricio Serrano,
//! > Vugranam C. Sreedhar, Sam Midkiff, "Escape Analysis for Java",
//! > Proceedings of ACM SIGPLAN OOPSLA, November 1999
//!
//! For every heap-allocating or heap-referencing value of one compiled
//! method, the analysis decides how far a reference to the object can
//! travel: confined to the method ([`EscapeState::NoEscape`]), passed
//! only through call arguments ([`EscapeState::ArgEscape`]), or visible
//! to the rest of the program ([`EscapeState::GlobalEscape`]). Two
//! optimizations consume the answer: synchronization and allocation
//! barriers are elided for objects proven not to escape, and the memory
//! splitter gives each non-escaping allocation a disjoint private memory
//! stream so scalar-replacement-style simplification can follow.
//!
//! # The connection graph
//!
//! Nodes are abstract heap objects (`JavaObject`), reference-holding
//! values (`LocalVar`), and per-object field slots (`Field`). Edges come
//! in three kinds with different propagation semantics:
//!
//! ```text
//! PointsTo   {LocalVar, Field} -> JavaObject    may reference the object
//! Deferred   {LocalVar, Field} -> {LocalVar, Field}   copy of the target
//! Field      JavaObject -> Field                the object owns the slot
//! ```
//!
//! Construction ([`graph`]) walks the IR once; joins are revisited as
//! their inputs arrive. Propagation ([`propagate`]) first eliminates
//! every deferred edge by transitive edge copying, then spreads escape
//! states outward to a fixpoint — state only ever widens, which is what
//! guarantees termination. Splitting ([`split`]) rewrites the memory
//! edges of accesses proven to target a non-escaping allocation.
//!
//! Calls are escape boundaries unless the host's [`policy`] table knows
//! better; reads through fields never observed to be written resolve to
//! a phantom object that is permanently `GlobalEscape`, so the analysis
//! can never declare "no escape" for data it never saw.

use thiserror::Error;

use jade_ir::NodeId;

pub mod graph;
pub mod node;
pub mod pass;
pub mod policy;
pub mod propagate;
pub mod split;

#[cfg(test)]
mod test_helpers;
#[cfg(test)]
mod tests;

pub use graph::ConnectionGraph;
pub use node::{Edge, EdgeKind, EscapeState, PointsToNode, PtKind};
pub use pass::{run_escape_analysis, EscapeAnalysis, EscapeOptions, EscapeSummary};
pub use policy::{ArgPolicy, CalleeEffect, EscapePolicyTable, ReturnPolicy};
pub use split::{split_unique_types, SplitReport};

/// Fatal analysis failure.
///
/// These are compiler invariant violations, not program properties: the
/// host must abandon optimizing the method and fall back to a safe
/// unoptimized compilation rather than risk wrong code. Everything the
/// analysis merely fails to understand is handled by conservative
/// widening and is never an error.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum EscapeError {
    /// A connection-graph node was reclassified as a different kind.
    #[error("connection graph node {node:?} cannot change kind from {have:?} to {want:?}")]
    KindConflict {
        node: NodeId,
        have: PtKind,
        want: PtKind,
    },
    /// A deferred edge survived Phase A elimination.
    #[error("deferred edge survived elimination on node {node:?}")]
    DeferredEdgeSurvived { node: NodeId },
}
