//! Pass driver — one call to analyze and rewrite a finished method.
//!
//! Hosts that interleave recording with IR construction drive
//! [`ConnectionGraph`] directly; this module is the convenience entry
//! point for the common case where the IR is complete: walk it once in
//! creation order, compute escape states, and (optionally) run the
//! memory splitter.

use jade_ir::{IrGraph, Op, RewriteSink, ValueKind};

use crate::graph::ConnectionGraph;
use crate::node::EscapeState;
use crate::policy::EscapePolicyTable;
use crate::split::{split_unique_types, SplitReport};
use crate::EscapeError;

/// Tunables for the pass.
#[derive(Clone, Debug)]
pub struct EscapeOptions {
    /// Skip the pass entirely for methods with more IR nodes than this.
    /// Skipping is not a failure; every query then answers conservatively.
    pub max_graph_nodes: usize,
    /// Run the memory splitter after escape states are computed.
    pub split_memory: bool,
}

impl Default for EscapeOptions {
    fn default() -> Self {
        Self {
            max_graph_nodes: 40_000,
            split_memory: true,
        }
    }
}

/// Per-method result counts, for logging and for tests.
#[derive(Debug, Default)]
pub struct EscapeSummary {
    /// The pass skipped this method (size bailout). All queries answer
    /// conservatively.
    pub bailed_out: bool,
    /// Heap allocations per final escape state.
    pub no_escape: usize,
    pub arg_escape: usize,
    pub global_escape: usize,
    /// Splitter outcome (empty when splitting is disabled or bailed out).
    pub split: SplitReport,
}

/// Analysis output: the frozen graph for downstream queries (barrier and
/// lock elision ask per node) plus the summary.
pub struct EscapeAnalysis {
    pub graph: ConnectionGraph,
    pub summary: EscapeSummary,
}

/// Run escape analysis over a fully constructed method IR.
pub fn run_escape_analysis(
    ir: &mut IrGraph,
    policy: EscapePolicyTable,
    options: &EscapeOptions,
    sink: &mut dyn RewriteSink,
) -> Result<EscapeAnalysis, EscapeError> {
    let mut graph = ConnectionGraph::new(policy);

    if ir.len() > options.max_graph_nodes {
        tracing::debug!(
            nodes = ir.len(),
            limit = options.max_graph_nodes,
            "method too large for escape analysis, skipping"
        );
        // The graph stays in its collecting state, so every query answers
        // GlobalEscape.
        return Ok(EscapeAnalysis {
            graph,
            summary: EscapeSummary {
                bailed_out: true,
                ..EscapeSummary::default()
            },
        });
    }

    for id in ir.ids() {
        if matches!(ir.op(id), Op::Phi { .. }) && ir.value_kind(id) == ValueKind::Ref {
            graph.record_for_escape_analysis(id);
        }
        graph.record_escape(id, ir)?;
    }
    graph.compute_escape(ir)?;

    let mut summary = summarize(ir, &graph);
    if options.split_memory {
        summary.split = split_unique_types(ir, &graph, sink);
    }

    Ok(EscapeAnalysis { graph, summary })
}

fn summarize(ir: &IrGraph, graph: &ConnectionGraph) -> EscapeSummary {
    let mut summary = EscapeSummary::default();
    for id in ir.ids() {
        if !ir.op(id).is_heap_allocation() {
            continue;
        }
        match graph.escape_state(id) {
            EscapeState::NoEscape => summary.no_escape += 1,
            EscapeState::ArgEscape => summary.arg_escape += 1,
            EscapeState::GlobalEscape => summary.global_escape += 1,
            EscapeState::Unknown => {}
        }
    }
    summary
}
