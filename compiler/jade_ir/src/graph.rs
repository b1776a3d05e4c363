//! Method IR graph — growable node arena plus rewrite notification.
//!
//! One [`IrGraph`] holds all nodes of one compiled method. Nodes reference
//! each other by [`NodeId`] only; the arena owns them all, so graph cycles
//! (loop phis) need no special ownership treatment.
//!
//! The graph is built by the host's single forward parse walk and then
//! extended in place by passes: join nodes gain inputs while parsing is
//! still in flight, and the escape-analysis splitter retargets memory
//! operands and appends new memory merges. All of that happens on the one
//! compiling thread.

use crate::node::{Node, NodeId, Op, ValueKind};

/// The IR graph for one compiled method.
pub struct IrGraph {
    nodes: Vec<Node>,
}

impl IrGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Append a node, returning its dense id.
    pub fn add(&mut self, op: Op, kind: ValueKind) -> NodeId {
        let id = u32::try_from(self.nodes.len()).unwrap_or(u32::MAX);
        self.nodes.push(Node { op, kind });
        NodeId::new(id)
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Is the graph empty?
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The node behind an id.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// The operation of a node.
    pub fn op(&self, id: NodeId) -> &Op {
        &self.nodes[id.index()].op
    }

    /// The value kind of a node.
    pub fn value_kind(&self, id: NodeId) -> ValueKind {
        self.nodes[id.index()].kind
    }

    /// Iterate all node ids in creation order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "node ids are allocated from u32"
        )]
        let len = self.nodes.len() as u32;
        (0..len).map(NodeId::new)
    }

    /// Append an input to a value join. No-op on non-`Phi` nodes.
    ///
    /// Used by the host while IR construction is still discovering a
    /// join's inputs (loop back edges arrive last).
    pub fn add_phi_input(&mut self, phi: NodeId, input: NodeId) {
        match &mut self.nodes[phi.index()].op {
            Op::Phi { inputs } => inputs.push(input),
            other => debug_assert!(false, "add_phi_input on non-phi {other:?}"),
        }
    }

    /// Append an input to a memory join. No-op on non-`MemPhi` nodes.
    pub fn add_mem_phi_input(&mut self, phi: NodeId, input: NodeId) {
        match &mut self.nodes[phi.index()].op {
            Op::MemPhi { inputs } => inputs.push(input),
            other => debug_assert!(false, "add_mem_phi_input on non-mem-phi {other:?}"),
        }
    }

    /// Replace every input of a memory join. No-op on non-`MemPhi` nodes.
    ///
    /// Used by the splitter to fill in a cloned memory phi once all of its
    /// rewritten inputs are known.
    pub fn replace_mem_phi_inputs(&mut self, phi: NodeId, new_inputs: Vec<NodeId>) {
        match &mut self.nodes[phi.index()].op {
            Op::MemPhi { inputs } => *inputs = new_inputs,
            other => debug_assert!(false, "replace_mem_phi_inputs on non-mem-phi {other:?}"),
        }
    }

    /// Retarget the memory operand of a memory-touching node.
    ///
    /// Returns `false` (and changes nothing) if the node has no memory
    /// operand.
    pub fn set_mem_input(&mut self, id: NodeId, new_mem: NodeId) -> bool {
        match &mut self.nodes[id.index()].op {
            Op::LoadField { mem, .. }
            | Op::StoreField { mem, .. }
            | Op::LoadStatic { mem, .. }
            | Op::StoreStatic { mem, .. }
            | Op::Call { mem, .. }
            | Op::Return { mem, .. } => {
                *mem = new_mem;
                true
            }
            _ => false,
        }
    }
}

impl Default for IrGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Host callback: a pass reports every IR node it modified or created, so
/// the optimizer's own worklist can revisit them.
pub trait RewriteSink {
    fn record_for_rewrite(&mut self, node: NodeId);
}

/// `RewriteSink` that collects reported ids. Suitable for tests and for
/// hosts that batch-process rewrites after a pass completes.
#[derive(Debug, Default)]
pub struct CollectedRewrites {
    pub nodes: Vec<NodeId>,
}

impl RewriteSink for CollectedRewrites {
    fn record_for_rewrite(&mut self, node: NodeId) {
        self.nodes.push(node);
    }
}
