//! IR nodes — dense value identity and operation classification.
//!
//! Every value in a compiled method is a [`Node`] identified by a dense
//! [`NodeId`]. The [`Op`] enum is the closed classification the analysis
//! passes dispatch on: allocation-like, copy-like, join, field access,
//! call, or [`Op::Other`] for anything a pass does not specifically model.
//!
//! Field offsets are byte offsets within the owning object;
//! [`UNKNOWN_OFFSET`] is the conservative "any field" sentinel used for
//! array elements of unknown index and unresolved fields.

use crate::name::Name;

/// Sentinel offset meaning "some field, unknown which".
///
/// An access at `UNKNOWN_OFFSET` conservatively matches every field of the
/// object it targets.
pub const UNKNOWN_OFFSET: i32 = -1;

/// Dense value identity within one compiled method.
///
/// IDs are allocated sequentially by [`IrGraph::add`](crate::IrGraph::add)
/// and are stable for the duration of the compilation. Allocation order
/// follows the host's single forward construction walk, so iterating ids in
/// order visits definitions before uses (joins excepted).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NodeId(u32);

impl NodeId {
    /// Create a node ID from a raw index.
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw `u32` value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Get the index as `usize` (for indexing into `Vec`s).
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Coarse value classification of a node's result.
///
/// The escape analysis only needs to distinguish reference-typed values
/// from everything else; memory versions get their own kind so that memory
/// edges cannot be confused with value edges.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// A heap reference.
    Ref,
    /// A primitive (integral/floating) value.
    Int,
    /// An abstract memory version.
    Mem,
    /// No result (stores to statics, returns).
    Void,
}

/// Reference to a static field slot: owning class plus field name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub class: Name,
    pub name: Name,
}

/// Operation of an IR node.
///
/// Operands are named per variant rather than kept in a uniform input
/// array; the set of operations here is exactly what the escape analysis
/// models, and a closed enum keeps the dispatch in one `match`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Op {
    /// Method entry. Source of the initial memory version.
    Start,

    // ── Allocation-like (produce a distinct abstract object) ────────
    /// Object allocation.
    New { class: Name },
    /// Array allocation.
    NewArray { elem: Name },
    /// Incoming method parameter.
    Param { index: u32 },
    /// Exception object materialized at a handler entry.
    CatchEx,
    /// Class literal.
    ClassRef { class: Name },
    /// Interned string constant.
    StrConst { value: Name },
    /// Null constant.
    NullRef,

    // ── Copy-like (value-preserving pass-through) ───────────────────
    /// Checked cast of a reference.
    Cast { value: NodeId },
    /// Reference result projected out of a call.
    ResultProj { call: NodeId },

    // ── Joins ───────────────────────────────────────────────────────
    /// Value merge at a control-flow join. Inputs may be appended after
    /// creation while the host is still constructing the IR (loop-carried
    /// values gain their back edge late).
    Phi { inputs: Vec<NodeId> },
    /// Memory merge at a control-flow join. Same incremental-input rule
    /// as `Phi`.
    MemPhi { inputs: Vec<NodeId> },

    // ── Field access ────────────────────────────────────────────────
    /// `dst = base.field` at `offset`.
    LoadField {
        base: NodeId,
        offset: i32,
        mem: NodeId,
    },
    /// `base.field = value` at `offset`. Produces a new memory version.
    StoreField {
        base: NodeId,
        offset: i32,
        value: NodeId,
        mem: NodeId,
    },
    /// Load from a static field slot.
    LoadStatic { field: FieldRef, mem: NodeId },
    /// Store to a static field slot. Produces a new memory version.
    StoreStatic {
        field: FieldRef,
        value: NodeId,
        mem: NodeId,
    },

    // ── Calls and exits ─────────────────────────────────────────────
    /// Call site. Clobbers memory (produces a new memory version); a
    /// reference result, if any, is read through `ResultProj`.
    Call {
        callee: Name,
        args: Vec<NodeId>,
        mem: NodeId,
    },
    /// Method return.
    Return {
        value: Option<NodeId>,
        mem: NodeId,
    },

    /// An operation the analysis does not model. Passes must degrade
    /// conservatively when they meet one.
    Other,
}

impl Op {
    /// Does this operation produce a distinct abstract object?
    pub fn is_allocation_like(&self) -> bool {
        matches!(
            self,
            Op::New { .. }
                | Op::NewArray { .. }
                | Op::Param { .. }
                | Op::CatchEx
                | Op::ClassRef { .. }
                | Op::StrConst { .. }
                | Op::NullRef
        )
    }

    /// Does this operation pass its operand through unchanged?
    pub fn is_copy_like(&self) -> bool {
        matches!(self, Op::Cast { .. } | Op::ResultProj { .. })
    }

    /// Is this a fresh heap allocation (eligible for memory splitting)?
    pub fn is_heap_allocation(&self) -> bool {
        matches!(self, Op::New { .. } | Op::NewArray { .. })
    }

    /// The memory version this operation consumes, if it touches memory.
    pub fn mem_input(&self) -> Option<NodeId> {
        match self {
            Op::LoadField { mem, .. }
            | Op::StoreField { mem, .. }
            | Op::LoadStatic { mem, .. }
            | Op::StoreStatic { mem, .. }
            | Op::Call { mem, .. }
            | Op::Return { mem, .. } => Some(*mem),
            _ => None,
        }
    }
}

/// A single IR node: its operation and the kind of value it produces.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    pub op: Op,
    pub kind: ValueKind,
}
