//! Connection-graph nodes and typed edge storage.
//!
//! A [`PointsToNode`] is one node of the connection graph: its kind, its
//! current escape state, and its outgoing typed edges. Two invariants are
//! enforced here rather than at the call sites:
//!
//! - **Kind is set-once.** A node's kind is decided the first time it is
//!   classified; reclassifying it differently is a compiler bug and is
//!   reported to the caller, never papered over.
//! - **Escape state only widens.** [`PointsToNode::widen_escape`] refuses
//!   to narrow, and reports whether it changed anything so fixpoint loops
//!   can schedule further work.

use jade_ir::{NodeId, UNKNOWN_OFFSET};
use smallvec::SmallVec;

/// Kind of a connection-graph node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PtKind {
    /// Not yet classified.
    Unknown,
    /// An abstract heap object (allocation, parameter, constant).
    JavaObject,
    /// A value that holds references (cast, projection, join).
    LocalVar,
    /// One field slot of an abstract object.
    Field,
}

/// How far outside the compiled method a reference may become observable.
///
/// The derived ordering is the widening order: `Unknown < NoEscape <
/// ArgEscape < GlobalEscape`. State transitions only ever move up this
/// order, which is what guarantees fixpoint termination.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum EscapeState {
    /// Nothing recorded yet.
    Unknown,
    /// Confined to the compiled method.
    NoEscape,
    /// Passed through call arguments, not otherwise captured.
    ArgEscape,
    /// Visible to the rest of the program.
    GlobalEscape,
}

/// Kind of a connection-graph edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdgeKind {
    /// `{LocalVar, Field} -> JavaObject`: may directly reference the object.
    PointsTo,
    /// `{LocalVar, Field} -> {LocalVar, Field}`: references whatever the
    /// target references. Eliminated before escape propagation.
    Deferred,
    /// `JavaObject -> Field`: the object owns this field slot.
    Field,
}

/// One outgoing edge: target node plus edge kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Edge {
    pub target: NodeId,
    pub kind: EdgeKind,
}

/// A single node in the connection graph.
///
/// Nodes reference each other by [`NodeId`] only; the graph owns them all
/// in an arena, so the cyclic shapes that loops produce need no special
/// ownership treatment.
#[derive(Clone, Debug)]
pub struct PointsToNode {
    kind: PtKind,
    escape: EscapeState,
    /// Field offset, [`UNKNOWN_OFFSET`] for non-field nodes and for the
    /// conservative "any field" slot.
    offset: i32,
    /// Outgoing edges. Inline capacity covers the common case; most nodes
    /// have at most a handful of edges.
    edges: SmallVec<[Edge; 4]>,
    /// Still believed to denote a single statically-distinguishable
    /// allocation. Cleared for parameters, constants, and unknown call
    /// results; consulted by the memory splitter.
    unique_type: bool,
    /// May be a call argument that the callee also returns, creating an
    /// alias this method never sees. Forces conservative treatment.
    hidden_alias: bool,
    /// Number of join inputs already folded into the edge set. Lets a
    /// join be revisited cheaply as new inputs arrive.
    inputs_processed: usize,
}

impl Default for PointsToNode {
    fn default() -> Self {
        Self {
            kind: PtKind::Unknown,
            escape: EscapeState::Unknown,
            offset: UNKNOWN_OFFSET,
            edges: SmallVec::new(),
            unique_type: true,
            hidden_alias: false,
            inputs_processed: 0,
        }
    }
}

impl PointsToNode {
    /// The node's kind.
    pub fn kind(&self) -> PtKind {
        self.kind
    }

    /// Classify the node. Setting the same kind again is a no-op; setting
    /// a *different* kind on an already-classified node returns the
    /// existing kind as the error.
    pub fn set_kind(&mut self, kind: PtKind) -> Result<(), PtKind> {
        if self.kind == PtKind::Unknown || self.kind == kind {
            self.kind = kind;
            Ok(())
        } else {
            Err(self.kind)
        }
    }

    /// Current escape state.
    pub fn escape_state(&self) -> EscapeState {
        self.escape
    }

    /// Widen the escape state. Returns `true` if the state changed;
    /// attempts to narrow are no-ops.
    pub fn widen_escape(&mut self, state: EscapeState) -> bool {
        if state > self.escape {
            self.escape = state;
            true
        } else {
            false
        }
    }

    /// Field offset ([`UNKNOWN_OFFSET`] unless this is a `Field` node with
    /// a known offset).
    pub fn offset(&self) -> i32 {
        self.offset
    }

    /// Set the field offset.
    pub fn set_offset(&mut self, offset: i32) {
        self.offset = offset;
    }

    pub fn unique_type(&self) -> bool {
        self.unique_type
    }

    pub fn set_unique_type(&mut self, unique: bool) {
        self.unique_type = unique;
    }

    pub fn hidden_alias(&self) -> bool {
        self.hidden_alias
    }

    pub fn set_hidden_alias(&mut self, hidden: bool) {
        self.hidden_alias = hidden;
    }

    pub fn inputs_processed(&self) -> usize {
        self.inputs_processed
    }

    pub fn set_inputs_processed(&mut self, count: usize) {
        self.inputs_processed = count;
    }

    /// Add an outgoing edge. Idempotent: returns `true` only if the
    /// `(target, kind)` pair was not already present.
    pub fn add_edge(&mut self, target: NodeId, kind: EdgeKind) -> bool {
        let edge = Edge { target, kind };
        if self.edges.contains(&edge) {
            false
        } else {
            self.edges.push(edge);
            true
        }
    }

    /// Remove an outgoing edge. Silent if absent.
    pub fn remove_edge(&mut self, target: NodeId, kind: EdgeKind) {
        let edge = Edge { target, kind };
        if let Some(pos) = self.edges.iter().position(|e| *e == edge) {
            self.edges.remove(pos);
        }
    }

    /// Number of outgoing edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// The `i`-th outgoing edge.
    pub fn edge(&self, i: usize) -> Edge {
        self.edges[i]
    }

    /// Iterate outgoing edges.
    pub fn edges(&self) -> impl Iterator<Item = Edge> + '_ {
        self.edges.iter().copied()
    }

    /// Does the node have any outgoing `Deferred` edge?
    pub fn has_deferred_edges(&self) -> bool {
        self.edges.iter().any(|e| e.kind == EdgeKind::Deferred)
    }
}

#[cfg(test)]
mod tests;
