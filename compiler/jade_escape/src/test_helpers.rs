//! Shared test utilities for the escape analysis tests.
//!
//! [`MethodBuilder`] assembles small method IRs the way the host parser
//! would: nodes in forward order, a current memory version threaded
//! through every memory-touching node. Only compiled in test builds.

use jade_ir::{FieldRef, IrGraph, Name, NodeId, Op, ValueKind};

use crate::graph::ConnectionGraph;
use crate::policy::EscapePolicyTable;

/// Shorthand for `Name::from_raw(n)`.
pub(crate) fn name(n: u32) -> Name {
    Name::from_raw(n)
}

/// `record_escape` that panics on the (test-fatal) error path.
pub(crate) fn record(graph: &mut ConnectionGraph, ir: &IrGraph, id: NodeId) {
    graph
        .record_escape(id, ir)
        .unwrap_or_else(|e| panic!("record_escape failed: {e}"));
}

/// `compute_escape` that panics on the (test-fatal) error path.
pub(crate) fn compute(graph: &mut ConnectionGraph, ir: &IrGraph) {
    graph
        .compute_escape(ir)
        .unwrap_or_else(|e| panic!("compute_escape failed: {e}"));
}

/// Builder for small test methods.
///
/// Tracks the current memory version the way a parser's memory state
/// does: every store and call advances it, loads consume it.
pub(crate) struct MethodBuilder {
    pub ir: IrGraph,
    pub start: NodeId,
    mem: NodeId,
}

impl MethodBuilder {
    pub fn new() -> Self {
        let mut ir = IrGraph::new();
        let start = ir.add(Op::Start, ValueKind::Mem);
        Self {
            ir,
            start,
            mem: start,
        }
    }

    /// The current memory version.
    pub fn mem(&self) -> NodeId {
        self.mem
    }

    /// Override the current memory version (loop wiring).
    pub fn set_mem(&mut self, mem: NodeId) {
        self.mem = mem;
    }

    pub fn new_object(&mut self) -> NodeId {
        self.ir.add(Op::New { class: name(1) }, ValueKind::Ref)
    }

    pub fn param(&mut self, index: u32) -> NodeId {
        self.ir.add(Op::Param { index }, ValueKind::Ref)
    }

    /// A primitive value the analysis does not track.
    pub fn int_value(&mut self) -> NodeId {
        self.ir.add(Op::Other, ValueKind::Int)
    }

    pub fn cast(&mut self, value: NodeId) -> NodeId {
        self.ir.add(Op::Cast { value }, ValueKind::Ref)
    }

    pub fn phi(&mut self, inputs: Vec<NodeId>) -> NodeId {
        self.ir.add(Op::Phi { inputs }, ValueKind::Ref)
    }

    pub fn mem_phi(&mut self, inputs: Vec<NodeId>) -> NodeId {
        self.ir.add(Op::MemPhi { inputs }, ValueKind::Mem)
    }

    /// `base.offset = value`; advances the current memory version.
    pub fn store(&mut self, base: NodeId, offset: i32, value: NodeId) -> NodeId {
        let store = self.ir.add(
            Op::StoreField {
                base,
                offset,
                value,
                mem: self.mem,
            },
            ValueKind::Mem,
        );
        self.mem = store;
        store
    }

    /// Reference-typed `base.offset` read at the current memory version.
    pub fn load(&mut self, base: NodeId, offset: i32) -> NodeId {
        let mem = self.mem;
        self.ir.add(Op::LoadField { base, offset, mem }, ValueKind::Ref)
    }

    /// Primitive-typed field read.
    pub fn load_int(&mut self, base: NodeId, offset: i32) -> NodeId {
        let mem = self.mem;
        self.ir.add(Op::LoadField { base, offset, mem }, ValueKind::Int)
    }

    /// `SomeClass.staticField = value`; advances the current memory
    /// version.
    pub fn store_static(&mut self, value: NodeId) -> NodeId {
        let store = self.ir.add(
            Op::StoreStatic {
                field: FieldRef {
                    class: name(90),
                    name: name(91),
                },
                value,
                mem: self.mem,
            },
            ValueKind::Mem,
        );
        self.mem = store;
        store
    }

    /// Call site; advances the current memory version.
    pub fn call(&mut self, callee: Name, args: Vec<NodeId>) -> NodeId {
        let call = self.ir.add(
            Op::Call {
                callee,
                args,
                mem: self.mem,
            },
            ValueKind::Mem,
        );
        self.mem = call;
        call
    }

    pub fn call_result(&mut self, call: NodeId) -> NodeId {
        self.ir.add(Op::ResultProj { call }, ValueKind::Ref)
    }

    pub fn ret(&mut self, value: Option<NodeId>) -> NodeId {
        let mem = self.mem;
        self.ir.add(Op::Return { value, mem }, ValueKind::Void)
    }

    /// Record every node in creation order and compute escape states,
    /// the way the pass driver does. Returns the frozen graph.
    pub fn analyze(&self) -> ConnectionGraph {
        self.analyze_with_policy(EscapePolicyTable::new())
    }

    pub fn analyze_with_policy(&self, policy: EscapePolicyTable) -> ConnectionGraph {
        let mut graph = ConnectionGraph::new(policy);
        for id in self.ir.ids() {
            if matches!(self.ir.op(id), Op::Phi { .. }) {
                graph.record_for_escape_analysis(id);
            }
            graph
                .record_escape(id, &self.ir)
                .unwrap_or_else(|e| panic!("record_escape failed: {e}"));
        }
        graph
            .compute_escape(&self.ir)
            .unwrap_or_else(|e| panic!("compute_escape failed: {e}"));
        graph
    }
}
