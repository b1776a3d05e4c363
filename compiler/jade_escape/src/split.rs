//! Memory-graph splitting for non-escaping allocations.
//!
//! An allocation the analysis proved `NoEscape` (and still believed to be
//! a single statically-distinguishable object) gets its own private memory
//! stream: every load and store proven to target that allocation's fields
//! is retargeted off the shared memory chain. Calls and unrelated stores
//! stop acting as barriers for it — a call cannot touch the fields of an
//! object that never escapes — which is what unlocks scalar-replacement-
//! style simplification downstream.
//!
//! The rewrite is strictly additive: memory operands are retargeted and
//! new [`Op::MemPhi`] merges are appended, but no node is removed and the
//! shared chain itself is never edited, so escaping objects observe
//! exactly the memory they did before.
//!
//! # Walking the original chain
//!
//! [`find_mem`](Splitter::find_mem) resolves "the memory this access
//! should see" by walking *upward* from the access's original memory
//! operand: stores to the allocation terminate the walk, unrelated
//! stores, static stores, and calls are stepped over, and memory merges
//! are cloned per allocation. The walk always follows the memory operands
//! as they were before any rewriting (a snapshot taken up front) —
//! retargeted operands describe private streams and must not leak into
//! another allocation's walk.
//!
//! Loop-carried merges make the cloning re-entrant: cloning a merge
//! resolves its inputs, and an input chain can lead back to the merge
//! being cloned. The per-`(allocation, merge)` state machine
//! `Unvisited -> Splitting -> Split` resolves the cycle: while a clone is
//! `Splitting`, a recursive request for it yields the placeholder id,
//! producing the self-referential input a loop-carried merge needs.

use rustc_hash::{FxHashMap, FxHashSet};

use jade_ir::{IrGraph, NodeId, Op, RewriteSink, ValueKind};

use crate::graph::ConnectionGraph;
use crate::node::EscapeState;

/// Split state of one `(allocation, memory merge)` pair. Absence from the
/// map is the `Unvisited` state.
#[derive(Clone, Copy, Debug)]
enum PhiSplit {
    /// Clone created, inputs still being resolved; the id is the
    /// placeholder handed to cyclic requests.
    Splitting(NodeId),
    /// Clone complete with all inputs resolved.
    Split(NodeId),
}

/// Outcome of the splitting phase.
#[derive(Debug, Default)]
pub struct SplitReport {
    /// Allocations that received a private memory stream.
    pub split_allocations: Vec<NodeId>,
    /// Allocations demoted by an ambiguous store (base could be one of
    /// several objects); their accesses stay on the shared stream.
    pub demoted: Vec<NodeId>,
}

/// Rewrite the method's memory edges so every splittable allocation gets
/// a private memory stream. Requires a frozen connection graph.
pub fn split_unique_types(
    ir: &mut IrGraph,
    cg: &ConnectionGraph,
    sink: &mut dyn RewriteSink,
) -> SplitReport {
    if cg.is_collecting() {
        // Escape states were never computed; there is nothing safe to
        // privatize.
        tracing::debug!("memory splitting requested before compute_escape, skipping");
        return SplitReport::default();
    }

    let mut splitter = Splitter::new(ir, cg);
    let report = splitter.run(ir, sink);

    tracing::debug!(
        split = report.split_allocations.len(),
        demoted = report.demoted.len(),
        "memory splitting complete"
    );
    report
}

struct Splitter<'a> {
    cg: &'a ConnectionGraph,
    /// Allocations still eligible for a private stream.
    candidates: FxHashSet<NodeId>,
    /// Memory operands as they were before any rewriting.
    orig_mem: FxHashMap<NodeId, NodeId>,
    /// Per-`(allocation, merge)` clone bookkeeping.
    phi_splits: FxHashMap<(NodeId, NodeId), PhiSplit>,
}

impl<'a> Splitter<'a> {
    fn new(ir: &IrGraph, cg: &'a ConnectionGraph) -> Self {
        let mut candidates = FxHashSet::default();
        for id in ir.ids() {
            if ir.op(id).is_heap_allocation()
                && cg.escape_state(id) == EscapeState::NoEscape
                && !cg.hidden_alias(id)
                && cg.ptnode(id).is_some_and(|p| p.unique_type())
            {
                candidates.insert(id);
            }
        }

        let mut orig_mem = FxHashMap::default();
        for id in ir.ids() {
            if let Some(mem) = ir.op(id).mem_input() {
                orig_mem.insert(id, mem);
            }
        }

        Self {
            cg,
            candidates,
            orig_mem,
            phi_splits: FxHashMap::default(),
        }
    }

    fn run(&mut self, ir: &mut IrGraph, sink: &mut dyn RewriteSink) -> SplitReport {
        let demoted = self.demote_ambiguous_stores(ir);

        // Snapshot the id range: the rewrite appends merge clones, and
        // those must not be revisited as accesses.
        let ids: Vec<NodeId> = ir.ids().collect();
        for id in ids {
            let access = match ir.op(id) {
                Op::LoadField { base, .. } => Some((*base, true)),
                Op::StoreField { base, .. } => Some((*base, false)),
                _ => None,
            };
            match access {
                Some((base, true)) => self.rewrite_load(id, base, ir, sink),
                Some((base, false)) => self.rewrite_store(id, base, ir, sink),
                None => {}
            }
        }

        let mut split_allocations: Vec<NodeId> = self.candidates.iter().copied().collect();
        split_allocations.sort_unstable();
        SplitReport {
            split_allocations,
            demoted,
        }
    }

    /// A store whose base could be one of several objects cannot be
    /// assigned to any single private stream; privatizing would lose the
    /// store for the streams it did not join. Demote every candidate such
    /// a store might hit.
    fn demote_ambiguous_stores(&mut self, ir: &IrGraph) -> Vec<NodeId> {
        let mut demoted = Vec::new();
        for id in ir.ids() {
            let Op::StoreField { base, .. } = ir.op(id) else {
                continue;
            };
            let objs = self.cg.pointed_objects(*base);
            if objs.len() > 1 {
                for obj in objs {
                    if self.candidates.remove(&obj) {
                        demoted.push(obj);
                    }
                }
            }
        }
        demoted.sort_unstable();
        demoted
    }

    /// Retarget a store that provably writes one candidate's field.
    fn rewrite_store(
        &mut self,
        store: NodeId,
        base: NodeId,
        ir: &mut IrGraph,
        sink: &mut dyn RewriteSink,
    ) {
        let objs = self.cg.pointed_objects(base);
        let [alloc] = objs.as_slice() else {
            return;
        };
        let alloc = *alloc;
        if !self.candidates.contains(&alloc) {
            return;
        }

        let Some(&old_mem) = self.orig_mem.get(&store) else {
            return;
        };
        let new_mem = self.find_mem(old_mem, alloc, ir, sink);
        if new_mem != old_mem {
            ir.set_mem_input(store, new_mem);
            sink.record_for_rewrite(store);
        }
    }

    /// Retarget a load. An exclusive base joins the allocation's private
    /// stream directly; a base that could be one of several candidates
    /// reads a fresh merge of the relevant private streams plus the
    /// shared stream, leaving the shared stream itself untouched.
    fn rewrite_load(
        &mut self,
        load: NodeId,
        base: NodeId,
        ir: &mut IrGraph,
        sink: &mut dyn RewriteSink,
    ) {
        let objs = self.cg.pointed_objects(base);
        let cands: Vec<NodeId> = objs
            .iter()
            .copied()
            .filter(|o| self.candidates.contains(o))
            .collect();
        if cands.is_empty() {
            return;
        }

        let Some(&old_mem) = self.orig_mem.get(&load) else {
            return;
        };

        if objs.len() == 1 {
            let new_mem = self.find_mem(old_mem, cands[0], ir, sink);
            if new_mem != old_mem {
                ir.set_mem_input(load, new_mem);
                sink.record_for_rewrite(load);
            }
            return;
        }

        // Ambiguous base: merge every candidate's stream with the shared
        // one. Deduplicate — candidates whose stream is still the shared
        // chain contribute nothing new.
        let mut inputs: Vec<NodeId> = Vec::with_capacity(cands.len() + 1);
        for alloc in cands {
            let m = self.find_mem(old_mem, alloc, ir, sink);
            if !inputs.contains(&m) {
                inputs.push(m);
            }
        }
        if !inputs.contains(&old_mem) {
            inputs.push(old_mem);
        }
        if inputs == [old_mem] {
            return;
        }

        let merge = ir.add(Op::MemPhi { inputs }, ValueKind::Mem);
        ir.set_mem_input(load, merge);
        sink.record_for_rewrite(merge);
        sink.record_for_rewrite(load);
    }

    /// Walk the original memory chain upward from `mem` to the nearest
    /// definition relevant to `alloc`.
    fn find_mem(
        &mut self,
        mem: NodeId,
        alloc: NodeId,
        ir: &mut IrGraph,
        sink: &mut dyn RewriteSink,
    ) -> NodeId {
        enum Step {
            /// `m` defines this allocation's stream (or the walk cannot
            /// continue): stop here.
            Stop,
            /// `m` cannot affect this allocation: step to its own memory
            /// operand.
            Over,
            /// `m` is a memory merge: clone it for this allocation.
            Merge,
        }

        let mut m = mem;
        loop {
            let step = match ir.op(m) {
                Op::StoreField { base, .. } => {
                    if self.cg.pointed_objects(*base).contains(&alloc) {
                        // Defines (at least possibly) this allocation's
                        // memory: the stream starts here.
                        Step::Stop
                    } else {
                        Step::Over
                    }
                }
                // A static store lives on a different slice entirely, and
                // a call cannot reach the fields of an object that never
                // escapes this method. Step over both.
                Op::StoreStatic { .. } | Op::Call { .. } => Step::Over,
                Op::MemPhi { .. } => Step::Merge,
                // Start is the initial memory; anything else producing
                // memory is outside the model and conservatively kept as
                // the stream head.
                _ => Step::Stop,
            };
            match step {
                Step::Stop => return m,
                Step::Merge => return self.split_memory_phi(m, alloc, ir, sink),
                Step::Over => match self.orig_mem.get(&m) {
                    Some(&prior) => m = prior,
                    None => return m,
                },
            }
        }
    }

    /// Clone a memory merge for one allocation, resolving each input
    /// through [`find_mem`](Self::find_mem).
    fn split_memory_phi(
        &mut self,
        phi: NodeId,
        alloc: NodeId,
        ir: &mut IrGraph,
        sink: &mut dyn RewriteSink,
    ) -> NodeId {
        let key = (alloc, phi);
        match self.phi_splits.get(&key) {
            Some(PhiSplit::Split(clone) | PhiSplit::Splitting(clone)) => return *clone,
            None => {}
        }

        // Placeholder first: a loop-carried merge reaches itself through
        // its own back edge, and must resolve to the clone being built.
        let clone = ir.add(Op::MemPhi { inputs: Vec::new() }, ValueKind::Mem);
        self.phi_splits.insert(key, PhiSplit::Splitting(clone));

        let orig_inputs = match ir.op(phi) {
            Op::MemPhi { inputs } => inputs.clone(),
            _ => Vec::new(),
        };
        let mut new_inputs = Vec::with_capacity(orig_inputs.len());
        for input in orig_inputs {
            new_inputs.push(self.find_mem(input, alloc, ir, sink));
        }
        ir.replace_mem_phi_inputs(clone, new_inputs);

        self.phi_splits.insert(key, PhiSplit::Split(clone));
        sink.record_for_rewrite(clone);
        clone
    }
}
