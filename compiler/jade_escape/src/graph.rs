//! Connection-graph construction.
//!
//! Walks the method IR once, synthesizing a [`PointsToNode`] for each
//! relevant value and wiring edges according to the four canonical
//! productions:
//!
//! ```text
//! (1)  p = new T()   LocalVar -PointsTo-> JavaObject   (p IS the object node)
//! (2)  p = q         LocalVar -Deferred-> LocalVar
//! (3)  p.f = q       JavaObject -Field-> Field, Field -Deferred-> LocalVar
//! (4)  p = q.f       JavaObject -Field-> Field, LocalVar -Deferred-> Field
//! ```
//!
//! Join nodes are processed incrementally: each input is folded in as it
//! becomes known, with `inputs_processed` tracking progress and the
//! deferred worklist scheduling revisits. Field accesses and calls are
//! likewise re-fanned at [`ConnectionGraph::compute_escape`] time, once
//! every join has its full input set — edge insertion is idempotent and
//! escape state only widens, so reprocessing converges to the same graph
//! regardless of the order inputs arrived in.
//!
//! Field nodes have no IR identity of their own; they are synthesized per
//! `(object, offset)` pair in a side arena, alongside the phantom object
//! and one slot node per referenced static field. Synthesized ids carry a
//! tag bit so they can never collide with IR ids.

use jade_ir::{FieldRef, IrGraph, Name, NodeId, Op, ValueKind, UNKNOWN_OFFSET};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::node::{EdgeKind, EscapeState, PointsToNode, PtKind};
use crate::policy::{ArgPolicy, EscapePolicyTable, ReturnPolicy};
use crate::EscapeError;

/// Tag bit distinguishing analysis-synthesized node ids from IR ids.
const SYNTH_BIT: u32 = 1 << 31;

#[expect(
    clippy::cast_possible_truncation,
    reason = "node counts stay far below the synthetic-id tag bit"
)]
fn ir_id(index: usize) -> NodeId {
    NodeId::new(index as u32)
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "synthetic node counts stay far below the tag bit"
)]
fn synth_id(index: usize) -> NodeId {
    NodeId::new(SYNTH_BIT | index as u32)
}

fn is_synth(id: NodeId) -> bool {
    id.raw() & SYNTH_BIT != 0
}

/// The connection graph for one compiled method.
///
/// Owned by the analysis, lifetime = one compilation. Built incrementally
/// while the host constructs IR ([`record_escape`](Self::record_escape)),
/// completed and frozen by [`compute_escape`](Self::compute_escape),
/// then consumed read-only by the memory splitter.
pub struct ConnectionGraph {
    /// Nodes keyed by IR id, grown lazily as indices are referenced.
    nodes: Vec<PointsToNode>,
    /// Analysis-synthesized nodes: the phantom object (index 0), field
    /// slots, static slots.
    synth: Vec<PointsToNode>,
    /// Field node per `(object, offset)` pair.
    fields: FxHashMap<(NodeId, i32), NodeId>,
    /// Static slot node per referenced static field.
    statics: FxHashMap<FieldRef, NodeId>,
    /// Join nodes registered for (re)processing.
    deferred: Vec<NodeId>,
    deferred_set: FxHashSet<NodeId>,
    /// Field accesses, calls, and returns; re-fanned at compute time once
    /// joins have settled.
    accesses: Vec<NodeId>,
    /// IR nodes already folded into the graph.
    processed: FxHashSet<NodeId>,
    /// True until `compute_escape` freezes the graph.
    collecting: bool,
    /// Conservative target for reads of never-written fields.
    phantom_object: NodeId,
    policy: EscapePolicyTable,
}

impl ConnectionGraph {
    /// Create an empty graph with the given call-site policy.
    pub fn new(policy: EscapePolicyTable) -> Self {
        let mut phantom = PointsToNode::default();
        // A fresh node cannot have a conflicting kind.
        let _ = phantom.set_kind(PtKind::JavaObject);
        phantom.widen_escape(EscapeState::GlobalEscape);
        phantom.set_unique_type(false);

        Self {
            nodes: Vec::new(),
            synth: vec![phantom],
            fields: FxHashMap::default(),
            statics: FxHashMap::default(),
            deferred: Vec::new(),
            deferred_set: FxHashSet::default(),
            accesses: Vec::new(),
            processed: FxHashSet::default(),
            collecting: true,
            phantom_object: synth_id(0),
            policy,
        }
    }

    /// The phantom object's node id.
    pub fn phantom_object(&self) -> NodeId {
        self.phantom_object
    }

    /// Is escape information still being collected?
    pub fn is_collecting(&self) -> bool {
        self.collecting
    }

    // ── Node storage ────────────────────────────────────────────────

    /// Read access to a connection-graph node, if one exists for `id`.
    pub fn ptnode(&self, id: NodeId) -> Option<&PointsToNode> {
        if is_synth(id) {
            self.synth.get((id.raw() & !SYNTH_BIT) as usize)
        } else {
            self.nodes.get(id.index())
        }
    }

    /// Grow the IR-keyed arena to cover `id`.
    fn grow_to(&mut self, id: NodeId) {
        debug_assert!(!is_synth(id), "grow_to on synthetic id {id:?}");
        if id.index() >= self.nodes.len() {
            self.nodes.resize_with(id.index() + 1, PointsToNode::default);
        }
    }

    fn ptn_mut(&mut self, id: NodeId) -> &mut PointsToNode {
        if is_synth(id) {
            &mut self.synth[(id.raw() & !SYNTH_BIT) as usize]
        } else {
            self.grow_to(id);
            &mut self.nodes[id.index()]
        }
    }

    fn ptn(&self, id: NodeId) -> &PointsToNode {
        if is_synth(id) {
            &self.synth[(id.raw() & !SYNTH_BIT) as usize]
        } else {
            &self.nodes[id.index()]
        }
    }

    fn new_synth(&mut self, node: PointsToNode) -> NodeId {
        let id = synth_id(self.synth.len());
        self.synth.push(node);
        id
    }

    /// Every node id in the graph: the IR range plus the synthesized side
    /// arena.
    pub(crate) fn all_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = (0..self.nodes.len()).map(ir_id).collect();
        ids.extend((0..self.synth.len()).map(synth_id));
        ids
    }

    fn set_kind(&mut self, id: NodeId, kind: PtKind) -> Result<(), EscapeError> {
        self.ptn_mut(id)
            .set_kind(kind)
            .map_err(|have| EscapeError::KindConflict {
                node: id,
                have,
                want: kind,
            })
    }

    /// Iterate the outgoing edges of a node (empty if the node does not
    /// exist).
    pub(crate) fn node_edges(
        &self,
        id: NodeId,
    ) -> impl Iterator<Item = crate::node::Edge> + '_ {
        self.ptnode(id).into_iter().flat_map(|p| p.edges())
    }

    pub(crate) fn add_edge_raw(&mut self, from: NodeId, target: NodeId, kind: EdgeKind) -> bool {
        self.ptn_mut(from).add_edge(target, kind)
    }

    pub(crate) fn remove_edge_raw(&mut self, from: NodeId, target: NodeId, kind: EdgeKind) {
        self.ptn_mut(from).remove_edge(target, kind);
    }

    pub(crate) fn widen_raw(&mut self, id: NodeId, state: EscapeState) -> bool {
        self.ptn_mut(id).widen_escape(state)
    }

    /// Add an edge, choosing `PointsTo` or `Deferred` by the target's
    /// kind. Returns whether anything was inserted.
    fn add_value_edge(&mut self, from: NodeId, to: NodeId) -> bool {
        let kind = if self.ptn(to).kind() == PtKind::JavaObject {
            EdgeKind::PointsTo
        } else {
            EdgeKind::Deferred
        };
        self.ptn_mut(from).add_edge(to, kind)
    }

    // ── Public recording surface ────────────────────────────────────

    /// Register a join-like node for (re)processing as its inputs become
    /// available. Callable multiple times for the same node.
    pub fn record_for_escape_analysis(&mut self, n: NodeId) {
        if self.deferred_set.insert(n) {
            self.deferred.push(n);
        }
    }

    /// Fold one IR node into the connection graph.
    ///
    /// Idempotent per node once fully processed. After the graph is
    /// frozen this is a no-op: no new escape information is accepted.
    pub fn record_escape(&mut self, n: NodeId, ir: &IrGraph) -> Result<(), EscapeError> {
        if !self.collecting || is_synth(n) || self.processed.contains(&n) {
            return Ok(());
        }
        self.record_escape_work(n, ir)?;
        Ok(())
    }

    fn ensure_recorded(&mut self, n: NodeId, ir: &IrGraph) -> Result<(), EscapeError> {
        if is_synth(n) || self.processed.contains(&n) {
            self.grow_to_any(n);
            return Ok(());
        }
        self.record_escape_work(n, ir)
    }

    fn grow_to_any(&mut self, n: NodeId) {
        if !is_synth(n) {
            self.grow_to(n);
        }
    }

    /// Translate one IR node into connection-graph structure.
    ///
    /// Marks the node processed up front so that cyclic shapes (a join
    /// reached through its own inputs) terminate.
    fn record_escape_work(&mut self, n: NodeId, ir: &IrGraph) -> Result<(), EscapeError> {
        self.processed.insert(n);
        self.grow_to(n);

        match ir.op(n) {
            Op::New { .. } | Op::NewArray { .. } => {
                self.set_kind(n, PtKind::JavaObject)?;
                self.ptn_mut(n).widen_escape(EscapeState::NoEscape);
            }
            Op::Param { .. } => {
                // An incoming argument is an object the caller also holds.
                self.set_kind(n, PtKind::JavaObject)?;
                self.ptn_mut(n).widen_escape(EscapeState::ArgEscape);
                self.ptn_mut(n).set_unique_type(false);
            }
            Op::CatchEx => {
                self.set_kind(n, PtKind::JavaObject)?;
                self.ptn_mut(n).widen_escape(EscapeState::ArgEscape);
                self.ptn_mut(n).set_unique_type(false);
            }
            Op::ClassRef { .. } | Op::StrConst { .. } | Op::NullRef => {
                // Shared constants are visible to the whole program.
                self.set_kind(n, PtKind::JavaObject)?;
                self.ptn_mut(n).widen_escape(EscapeState::GlobalEscape);
                self.ptn_mut(n).set_unique_type(false);
            }
            Op::Cast { value } => {
                let value = *value;
                self.set_kind(n, PtKind::LocalVar)?;
                self.ensure_recorded(value, ir)?;
                self.add_value_edge(n, value);
            }
            Op::ResultProj { call } => {
                let call = *call;
                self.process_call_result(n, call, ir)?;
            }
            Op::Phi { .. } => {
                if ir.value_kind(n) == ValueKind::Ref {
                    self.record_for_escape_analysis(n);
                    self.process_phi_escape(n, ir)?;
                }
            }
            Op::LoadField { .. }
            | Op::StoreField { .. }
            | Op::LoadStatic { .. }
            | Op::StoreStatic { .. }
            | Op::Call { .. }
            | Op::Return { .. } => {
                self.accesses.push(n);
                self.process_access(n, ir)?;
            }
            Op::Start | Op::MemPhi { .. } => {}
            Op::Other => {
                if ir.value_kind(n) == ValueKind::Ref {
                    // Modeling gap: degrade to maximal conservatism, never
                    // fail.
                    tracing::debug!(node = n.raw(), "unmodeled reference op, assuming global escape");
                    self.set_kind(n, PtKind::JavaObject)?;
                    self.ptn_mut(n).widen_escape(EscapeState::GlobalEscape);
                    self.ptn_mut(n).set_unique_type(false);
                }
            }
        }
        Ok(())
    }

    // ── Joins ───────────────────────────────────────────────────────

    /// Fold a join's not-yet-seen inputs into its edge set.
    ///
    /// Called every time the join is revisited; `inputs_processed` makes
    /// the revisit cheap, and idempotent edge insertion plus widen-only
    /// escape state make it convergent under any input arrival order.
    pub(crate) fn process_phi_escape(
        &mut self,
        phi: NodeId,
        ir: &IrGraph,
    ) -> Result<bool, EscapeError> {
        if is_synth(phi) || ir.value_kind(phi) != ValueKind::Ref {
            return Ok(false);
        }
        let inputs = match ir.op(phi) {
            Op::Phi { inputs } => inputs.clone(),
            _ => return Ok(false),
        };
        self.processed.insert(phi);
        self.set_kind(phi, PtKind::LocalVar)?;

        let start = self.ptn(phi).inputs_processed();
        let mut changed = false;
        for &input in &inputs[start.min(inputs.len())..] {
            self.ensure_recorded(input, ir)?;
            changed |= self.add_value_edge(phi, input);
        }
        self.ptn_mut(phi).set_inputs_processed(inputs.len());
        Ok(changed)
    }

    // ── Field and call productions ──────────────────────────────────

    /// (Re)apply the production for a field access, static access, call,
    /// or return. Idempotent; returns whether the graph changed.
    pub(crate) fn process_access(&mut self, n: NodeId, ir: &IrGraph) -> Result<bool, EscapeError> {
        match ir.op(n) {
            Op::LoadField { base, offset, .. } => {
                let (base, offset) = (*base, *offset);
                self.process_load_field(n, base, offset, ir)
            }
            Op::StoreField {
                base,
                offset,
                value,
                ..
            } => {
                let (base, offset, value) = (*base, *offset, *value);
                self.process_store_field(base, offset, value, ir)
            }
            Op::LoadStatic { field, .. } => {
                let field = *field;
                self.process_load_static(n, field, ir)
            }
            Op::StoreStatic { field, value, .. } => {
                let (field, value) = (*field, *value);
                self.process_store_static(field, value, ir)
            }
            Op::Call { callee, args, .. } => {
                let (callee, args) = (*callee, args.clone());
                self.process_call_arguments(callee, &args, ir)
            }
            Op::Return { value, .. } => {
                let value = *value;
                self.process_return(n, value, ir)
            }
            _ => Ok(false),
        }
    }

    /// Production (4): `p = q.f`.
    fn process_load_field(
        &mut self,
        dst: NodeId,
        base: NodeId,
        offset: i32,
        ir: &IrGraph,
    ) -> Result<bool, EscapeError> {
        if ir.value_kind(dst) != ValueKind::Ref {
            return Ok(false);
        }
        self.set_kind(dst, PtKind::LocalVar)?;

        let objs = self.points_to(base, ir)?;
        if objs.is_empty() {
            // Base resolves to nothing we model: the loaded value could be
            // anything.
            let phantom = self.phantom_object;
            return Ok(self.ptn_mut(dst).add_edge(phantom, EdgeKind::PointsTo));
        }

        let mut changed = false;
        for obj in objs {
            self.ensure_field(obj, offset);
            changed |= self.add_deferred_edge_to_fields(dst, obj, offset);
        }
        Ok(changed)
    }

    /// Production (3): `p.f = q`.
    fn process_store_field(
        &mut self,
        base: NodeId,
        offset: i32,
        value: NodeId,
        ir: &IrGraph,
    ) -> Result<bool, EscapeError> {
        if ir.value_kind(value) != ValueKind::Ref {
            return Ok(false);
        }
        self.ensure_recorded(value, ir)?;

        let objs = self.points_to(base, ir)?;
        let mut changed = false;
        for obj in objs {
            self.ensure_field(obj, offset);
            changed |= self.add_edge_from_fields(obj, value, offset);
        }
        Ok(changed)
    }

    fn process_load_static(
        &mut self,
        dst: NodeId,
        field: FieldRef,
        ir: &IrGraph,
    ) -> Result<bool, EscapeError> {
        if ir.value_kind(dst) != ValueKind::Ref {
            return Ok(false);
        }
        self.set_kind(dst, PtKind::LocalVar)?;
        let slot = self.ensure_static_slot(field);
        let phantom = self.phantom_object;
        let mut changed = self.ptn_mut(dst).add_edge(slot, EdgeKind::Deferred);
        // Other compilation units may have stored objects we never saw.
        changed |= self.ptn_mut(dst).add_edge(phantom, EdgeKind::PointsTo);
        Ok(changed)
    }

    fn process_store_static(
        &mut self,
        field: FieldRef,
        value: NodeId,
        ir: &IrGraph,
    ) -> Result<bool, EscapeError> {
        if ir.value_kind(value) != ValueKind::Ref {
            return Ok(false);
        }
        self.ensure_recorded(value, ir)?;
        let slot = self.ensure_static_slot(field);
        Ok(self.add_value_edge(slot, value))
    }

    /// Escape state for the arguments of a call site.
    fn process_call_arguments(
        &mut self,
        callee: Name,
        args: &[NodeId],
        ir: &IrGraph,
    ) -> Result<bool, EscapeError> {
        let effect = self.policy.effect(callee);
        let mut changed = false;

        for &arg in args {
            if ir.value_kind(arg) != ValueKind::Ref {
                continue;
            }
            self.ensure_recorded(arg, ir)?;

            match effect.args {
                ArgPolicy::NotCaptured => {}
                ArgPolicy::Captured => {
                    changed |= self.ptn_mut(arg).widen_escape(EscapeState::ArgEscape);
                }
                ArgPolicy::Escapes => {
                    changed |= self.ptn_mut(arg).widen_escape(EscapeState::GlobalEscape);
                }
            }

            // A callee that may hand an argument back creates an alias this
            // method never observes.
            if effect.args != ArgPolicy::NotCaptured
                && matches!(effect.ret, ReturnPolicy::MayAliasArgs | ReturnPolicy::Unknown)
            {
                for obj in self.points_to(arg, ir)? {
                    let ptn = self.ptn_mut(obj);
                    if !ptn.hidden_alias() {
                        ptn.set_hidden_alias(true);
                        changed = true;
                    }
                }
            }
        }
        Ok(changed)
    }

    /// Connection-graph node for a call's reference result.
    fn process_call_result(
        &mut self,
        proj: NodeId,
        call: NodeId,
        ir: &IrGraph,
    ) -> Result<(), EscapeError> {
        let phantom = self.phantom_object;
        let Op::Call { callee, args, .. } = ir.op(call) else {
            // Projection of something we don't model: unknown object.
            self.set_kind(proj, PtKind::LocalVar)?;
            self.ptn_mut(proj).add_edge(phantom, EdgeKind::PointsTo);
            return Ok(());
        };
        let (callee, args) = (*callee, args.clone());

        match self.policy.effect(callee).ret {
            ReturnPolicy::FreshObject => {
                // The result is a distinct object, but not one whose type
                // this method can pin down.
                self.set_kind(proj, PtKind::JavaObject)?;
                self.ptn_mut(proj).widen_escape(EscapeState::NoEscape);
                self.ptn_mut(proj).set_unique_type(false);
            }
            ReturnPolicy::MayAliasArgs => {
                self.set_kind(proj, PtKind::LocalVar)?;
                for &arg in &args {
                    if ir.value_kind(arg) == ValueKind::Ref {
                        self.ensure_recorded(arg, ir)?;
                        self.add_value_edge(proj, arg);
                    }
                }
            }
            ReturnPolicy::Unknown => {
                self.set_kind(proj, PtKind::LocalVar)?;
                self.ptn_mut(proj).add_edge(phantom, EdgeKind::PointsTo);
            }
        }
        Ok(())
    }

    /// A returned reference is visible to the caller and whatever the
    /// caller does with it.
    fn process_return(
        &mut self,
        ret: NodeId,
        value: Option<NodeId>,
        ir: &IrGraph,
    ) -> Result<bool, EscapeError> {
        let Some(value) = value else {
            return Ok(false);
        };
        if ir.value_kind(value) != ValueKind::Ref {
            return Ok(false);
        }
        self.set_kind(ret, PtKind::LocalVar)?;
        self.ensure_recorded(value, ir)?;
        let mut changed = self.ptn_mut(ret).widen_escape(EscapeState::GlobalEscape);
        changed |= self.add_value_edge(ret, value);
        Ok(changed)
    }

    // ── Field-node plumbing ─────────────────────────────────────────

    /// The field node for `(obj, offset)`, created on first reference
    /// (with the owning `Field` edge) and shared thereafter.
    fn ensure_field(&mut self, obj: NodeId, offset: i32) -> NodeId {
        if let Some(&f) = self.fields.get(&(obj, offset)) {
            return f;
        }
        let mut node = PointsToNode::default();
        let _ = node.set_kind(PtKind::Field);
        node.set_offset(offset);
        let f = self.new_synth(node);
        self.fields.insert((obj, offset), f);
        self.ptn_mut(obj).add_edge(f, EdgeKind::Field);
        f
    }

    /// The slot node for a static field: a `LocalVar` holding a reference
    /// to globally visible memory, so everything stored through it is
    /// global.
    fn ensure_static_slot(&mut self, field: FieldRef) -> NodeId {
        if let Some(&slot) = self.statics.get(&field) {
            return slot;
        }
        let mut node = PointsToNode::default();
        let _ = node.set_kind(PtKind::LocalVar);
        node.widen_escape(EscapeState::GlobalEscape);
        let slot = self.new_synth(node);
        self.statics.insert(field, slot);
        slot
    }

    fn offsets_match(a: i32, b: i32) -> bool {
        a == b || a == UNKNOWN_OFFSET || b == UNKNOWN_OFFSET
    }

    /// Add an edge to `to` from every field of `obj` whose offset matches.
    /// The edge kind follows `to`'s node kind (store production fan-in).
    fn add_edge_from_fields(&mut self, obj: NodeId, to: NodeId, offset: i32) -> bool {
        let matching = self.matching_fields(obj, offset);
        let mut changed = false;
        for f in matching {
            changed |= self.add_value_edge(f, to);
        }
        changed
    }

    /// Add a deferred edge from `from` to every field of `obj` whose
    /// offset matches (load production fan-out).
    fn add_deferred_edge_to_fields(&mut self, from: NodeId, obj: NodeId, offset: i32) -> bool {
        let matching = self.matching_fields(obj, offset);
        let mut changed = false;
        for f in matching {
            changed |= self.ptn_mut(from).add_edge(f, EdgeKind::Deferred);
        }
        changed
    }

    fn matching_fields(&self, obj: NodeId, offset: i32) -> Vec<NodeId> {
        self.ptn(obj)
            .edges()
            .filter(|e| e.kind == EdgeKind::Field)
            .filter(|e| Self::offsets_match(self.ptn(e.target).offset(), offset))
            .map(|e| e.target)
            .collect()
    }

    // ── Points-to walk ──────────────────────────────────────────────

    /// The set of abstract objects `n` may reference, walking deferred
    /// chains and processing joins encountered on the way. Returns a
    /// sorted list for deterministic downstream iteration.
    pub(crate) fn points_to(
        &mut self,
        n: NodeId,
        ir: &IrGraph,
    ) -> Result<Vec<NodeId>, EscapeError> {
        let mut result = FxHashSet::default();
        let mut visited = FxHashSet::default();
        let mut worklist = vec![n];

        while let Some(id) = worklist.pop() {
            if !visited.insert(id) {
                continue;
            }
            self.ensure_recorded(id, ir)?;
            let ptn = self.ptn(id);
            if ptn.kind() == PtKind::JavaObject {
                result.insert(id);
                continue;
            }
            for edge in ptn.edges() {
                match edge.kind {
                    EdgeKind::PointsTo => {
                        result.insert(edge.target);
                    }
                    EdgeKind::Deferred => worklist.push(edge.target),
                    EdgeKind::Field => {}
                }
            }
        }

        let mut objs: Vec<NodeId> = result.into_iter().collect();
        objs.sort_unstable();
        Ok(objs)
    }

    /// Direct points-to set of a frozen node (no deferred edges remain
    /// after Phase A, so no walking is needed).
    pub fn pointed_objects(&self, n: NodeId) -> Vec<NodeId> {
        match self.ptnode(n) {
            None => Vec::new(),
            Some(ptn) if ptn.kind() == PtKind::JavaObject => vec![n],
            Some(ptn) => ptn
                .edges()
                .filter(|e| e.kind == EdgeKind::PointsTo)
                .map(|e| e.target)
                .collect(),
        }
    }

    // ── Compute and query ───────────────────────────────────────────

    /// Complete construction, eliminate deferred edges, and propagate
    /// escape states to a fixpoint. The graph is frozen afterwards.
    pub fn compute_escape(&mut self, ir: &IrGraph) -> Result<(), EscapeError> {
        if !self.collecting {
            return Ok(());
        }
        tracing::debug!(
            ir_nodes = ir.len(),
            graph_nodes = self.nodes.len() + self.synth.len(),
            "computing escape information"
        );

        // Finish construction: joins may have gained inputs since they
        // were recorded, and every field access fanned out against a
        // points-to set that those inputs can enlarge. Reprocess both
        // until nothing changes; edge insertion is idempotent, so this
        // converges.
        loop {
            let mut changed = false;
            let mut i = 0;
            while i < self.deferred.len() {
                let phi = self.deferred[i];
                changed |= self.process_phi_escape(phi, ir)?;
                i += 1;
            }
            let mut i = 0;
            while i < self.accesses.len() {
                let access = self.accesses[i];
                changed |= self.process_access(access, ir)?;
                i += 1;
            }
            if !changed {
                break;
            }
        }

        self.seal_unset_fields();
        self.collecting = false;

        self.eliminate_deferred();
        if let Some(node) = self.find_deferred_edge() {
            return Err(EscapeError::DeferredEdgeSurvived { node });
        }

        // Hidden aliases can never be declared NoEscape, no matter how
        // quiet their observed edges are.
        for id in self.all_ids() {
            let ptn = self.ptn_mut(id);
            if ptn.hidden_alias() {
                ptn.widen_escape(EscapeState::ArgEscape);
            }
        }

        self.propagate_escape_states();

        tracing::debug!("escape analysis complete, graph frozen");
        Ok(())
    }

    /// A field that was never the target of a store production yields the
    /// phantom object when loaded: the analysis never saw what lives
    /// there, so it must assume the worst.
    fn seal_unset_fields(&mut self) {
        for i in 0..self.synth.len() {
            let id = synth_id(i);
            if self.synth[i].kind() == PtKind::Field && self.synth[i].edge_count() == 0 {
                let phantom = self.phantom_object;
                self.ptn_mut(id).add_edge(phantom, EdgeKind::PointsTo);
            }
        }
    }

    /// Escape state of an IR node. Valid after `compute_escape`; queried
    /// mid-construction the answer is conservatively `GlobalEscape`.
    pub fn escape_state(&self, n: NodeId) -> EscapeState {
        if self.collecting {
            return EscapeState::GlobalEscape;
        }
        let Some(ptn) = self.ptnode(n) else {
            return EscapeState::GlobalEscape;
        };
        match ptn.kind() {
            PtKind::JavaObject => ptn.escape_state(),
            PtKind::LocalVar | PtKind::Field => {
                // A holder escapes as far as the worst object it may hold.
                let mut state = ptn.escape_state();
                for edge in ptn.edges() {
                    if edge.kind == EdgeKind::PointsTo {
                        state = state.max(self.ptn(edge.target).escape_state());
                    }
                }
                state
            }
            PtKind::Unknown => EscapeState::GlobalEscape,
        }
    }

    /// True when the object behind `n` cannot be trusted as non-escaping
    /// even if its escape state says otherwise: analysis still running,
    /// value unseen, or flagged as a hidden alias.
    pub fn hidden_alias(&self, n: NodeId) -> bool {
        if self.collecting {
            return true;
        }
        let Some(ptn) = self.ptnode(n) else {
            return true;
        };
        ptn.hidden_alias() || self.escape_state(n) != EscapeState::NoEscape
    }
}
