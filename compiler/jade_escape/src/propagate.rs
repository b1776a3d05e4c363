//! Escape propagation — the two fixpoint phases run by `compute_escape`.
//!
//! # Phase A — deferred-edge elimination
//!
//! A deferred edge says "references whatever the target references". The
//! phase replaces every such edge by copying the target's concrete edges
//! onto the source, chasing chains of deferred hops transitively. Cycles
//! (two joins deferred to each other through a loop) terminate via a
//! per-walk visitation set: an already-visited node contributes whatever
//! edges it has and is not entered again. Afterwards the graph contains
//! only `PointsTo` and `Field` edges, and every node's reachable-object
//! set is given directly by its `PointsTo` edges.
//!
//! # Phase B — escape-state spreading
//!
//! Escape infects everything reachable: for every edge `A -> B` of kind
//! `PointsTo` or `Field`, `B` must end up at least as escaped as `A`.
//! `GlobalEscape` is spread to a fixpoint first, then the same rule runs
//! for `ArgEscape` as the weaker level. Each pass is O(V + E) and the
//! number of passes is small in practice because state only widens
//! through four levels.

use rustc_hash::FxHashSet;

use jade_ir::NodeId;

use crate::graph::ConnectionGraph;
use crate::node::{EdgeKind, EscapeState};

impl ConnectionGraph {
    /// Phase A: eliminate every deferred edge in the graph.
    pub(crate) fn eliminate_deferred(&mut self) {
        for id in self.all_ids() {
            if self.ptnode(id).is_some_and(|p| p.has_deferred_edges()) {
                self.remove_deferred(id);
            }
        }
    }

    /// Remove the outgoing deferred edges of one node, copying in the
    /// concrete edges of everything reachable through deferred chains.
    fn remove_deferred(&mut self, ni: NodeId) {
        let mut visited: FxHashSet<NodeId> = FxHashSet::default();
        visited.insert(ni);

        // Detach ni's deferred edges first; their targets seed the walk.
        let targets: Vec<NodeId> = self
            .node_edges(ni)
            .filter(|e| e.kind == EdgeKind::Deferred)
            .map(|e| e.target)
            .collect();
        for &t in &targets {
            self.remove_edge_raw(ni, t, EdgeKind::Deferred);
        }

        let mut worklist = targets;
        while let Some(t) = worklist.pop() {
            if !visited.insert(t) {
                continue;
            }
            let edges: Vec<_> = self.node_edges(t).collect();
            for edge in edges {
                match edge.kind {
                    EdgeKind::PointsTo => {
                        self.add_edge_raw(ni, edge.target, EdgeKind::PointsTo);
                    }
                    EdgeKind::Deferred => worklist.push(edge.target),
                    // LocalVar and Field nodes never own field slots.
                    EdgeKind::Field => {}
                }
            }
        }
    }

    /// Any node still carrying a deferred edge after Phase A, for the
    /// post-elimination invariant check.
    pub(crate) fn find_deferred_edge(&self) -> Option<NodeId> {
        self.all_ids()
            .into_iter()
            .find(|&id| self.ptnode(id).is_some_and(|p| p.has_deferred_edges()))
    }

    /// Phase B: spread `GlobalEscape` to a fixpoint, then `ArgEscape`.
    pub(crate) fn propagate_escape_states(&mut self) {
        self.spread(EscapeState::GlobalEscape);
        self.spread(EscapeState::ArgEscape);
    }

    /// One spreading fixpoint: every node at or above `level` pushes
    /// `level` along its `PointsTo` and `Field` edges. Re-run over all
    /// nodes until a full pass widens nothing, since escalating one node
    /// can newly qualify others.
    fn spread(&mut self, level: EscapeState) {
        let ids = self.all_ids();
        loop {
            let mut changed = false;
            for &id in &ids {
                let at_level = self
                    .ptnode(id)
                    .is_some_and(|p| p.escape_state() >= level);
                if !at_level {
                    continue;
                }
                let edges: Vec<_> = self.node_edges(id).collect();
                for edge in edges {
                    if matches!(edge.kind, EdgeKind::PointsTo | EdgeKind::Field) {
                        changed |= self.widen_raw(edge.target, level);
                    }
                }
            }
            if !changed {
                break;
            }
        }
    }
}
