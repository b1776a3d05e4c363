//! End-to-end scenarios over small method IRs, driven through the same
//! entry points the host compiler uses.

use jade_ir::CollectedRewrites;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

use crate::node::EscapeState;
use crate::pass::{run_escape_analysis, EscapeOptions};
use crate::policy::{ArgPolicy, CalleeEffect, EscapePolicyTable, ReturnPolicy};
use crate::test_helpers::{compute, name, record, MethodBuilder};
use crate::ConnectionGraph;

/// `p = new T(); return;` — p is never used: it does not escape.
#[test]
fn unused_allocation_does_not_escape() {
    let mut mb = MethodBuilder::new();
    let p = mb.new_object();
    mb.ret(None);

    let g = mb.analyze();

    assert_eq!(g.escape_state(p), EscapeState::NoEscape);
}

/// `p = new T(); some_call(p);` with no policy knowledge: at least
/// ArgEscape.
#[test]
fn plain_call_argument_escapes_to_arg() {
    let mut mb = MethodBuilder::new();
    let p = mb.new_object();
    mb.call(name(10), vec![p]);
    mb.ret(None);

    let g = mb.analyze();

    assert!(g.escape_state(p) >= EscapeState::ArgEscape);
}

/// `p = new T(); staticField = p;` — p and everything reachable from it
/// escapes globally.
#[test]
fn static_store_escapes_globally_and_transitively() {
    let mut mb = MethodBuilder::new();
    let p = mb.new_object();
    let u = mb.new_object();
    mb.store(p, 8, u);
    mb.store_static(p);

    let g = mb.analyze();

    assert_eq!(g.escape_state(p), EscapeState::GlobalEscape);
    assert_eq!(g.escape_state(u), EscapeState::GlobalEscape);
}

/// `p = new T(); p.f = new U();` with neither escaping: both NoEscape
/// and both get a private memory stream.
#[test]
fn nested_private_allocations_are_split() {
    let mut mb = MethodBuilder::new();
    let p = mb.new_object();
    let u = mb.new_object();
    mb.store(p, 8, u);
    mb.ret(None);

    let mut sink = CollectedRewrites::default();
    let analysis = run_escape_analysis(
        &mut mb.ir,
        EscapePolicyTable::new(),
        &EscapeOptions::default(),
        &mut sink,
    )
    .unwrap_or_else(|e| panic!("analysis failed: {e}"));

    assert_eq!(analysis.graph.escape_state(p), EscapeState::NoEscape);
    assert_eq!(analysis.graph.escape_state(u), EscapeState::NoEscape);
    assert_eq!(analysis.summary.no_escape, 2);
    assert_eq!(analysis.summary.split.split_allocations, vec![p, u]);
}

/// `q = cond ? p1 : p2;` where p2 is passed to an escaping call: q's
/// points-to set covers both, but p1 keeps its own state.
#[test]
fn join_merges_points_to_without_escalating_members() {
    let escaping = name(10);
    let mut policy = EscapePolicyTable::new();
    policy.insert(
        escaping,
        CalleeEffect {
            args: ArgPolicy::Escapes,
            ret: ReturnPolicy::Unknown,
        },
    );

    let mut mb = MethodBuilder::new();
    let p1 = mb.new_object();
    let p2 = mb.new_object();
    mb.call(escaping, vec![p2]);
    let q = mb.phi(vec![p1, p2]);

    let g = mb.analyze_with_policy(policy);

    assert_eq!(g.pointed_objects(q), vec![p1, p2]);
    assert_eq!(g.escape_state(q), EscapeState::GlobalEscape);
    assert_eq!(g.escape_state(p2), EscapeState::GlobalEscape);
    assert_eq!(g.escape_state(p1), EscapeState::NoEscape);
}

/// `value = obj.unsetField` — never-written fields resolve through the
/// phantom object.
#[test]
fn unset_field_load_resolves_to_phantom() {
    let mut mb = MethodBuilder::new();
    let p = mb.new_object();
    let v = mb.load(p, 8);

    let g = mb.analyze();

    assert_eq!(g.pointed_objects(v), vec![g.phantom_object()]);
    assert_eq!(g.escape_state(v), EscapeState::GlobalEscape);
    // The never-written read poisons the loaded value, not the object it
    // was read from.
    assert_eq!(g.escape_state(p), EscapeState::NoEscape);
}

#[test]
fn size_bailout_answers_conservatively_without_failing() {
    let mut mb = MethodBuilder::new();
    let p = mb.new_object();
    mb.ret(None);

    let mut sink = CollectedRewrites::default();
    let options = EscapeOptions {
        max_graph_nodes: 1,
        ..EscapeOptions::default()
    };
    let analysis = run_escape_analysis(&mut mb.ir, EscapePolicyTable::new(), &options, &mut sink)
        .unwrap_or_else(|e| panic!("analysis failed: {e}"));

    assert!(analysis.summary.bailed_out);
    assert_eq!(analysis.graph.escape_state(p), EscapeState::GlobalEscape);
    assert!(analysis.graph.hidden_alias(p));
    assert!(sink.nodes.is_empty());
}

#[test]
fn summary_counts_allocations_by_state() {
    let mut mb = MethodBuilder::new();
    let kept = mb.new_object();
    let passed = mb.new_object();
    let published = mb.new_object();
    mb.call(name(10), vec![passed]);
    mb.store_static(published);
    mb.ret(None);
    let _ = kept;

    let mut sink = CollectedRewrites::default();
    let analysis = run_escape_analysis(
        &mut mb.ir,
        EscapePolicyTable::new(),
        &EscapeOptions::default(),
        &mut sink,
    )
    .unwrap_or_else(|e| panic!("analysis failed: {e}"));

    assert_eq!(analysis.summary.no_escape, 1);
    assert_eq!(analysis.summary.arg_escape, 1);
    assert_eq!(analysis.summary.global_escape, 1);
}

/// Join convergence: feeding a join its inputs in any order, interleaved
/// with unrelated recordings, reaches the same points-to set and escape
/// states as feeding them all at once.
fn graph_for_order(
    order: &[usize],
) -> (ConnectionGraph, Vec<jade_ir::NodeId>, jade_ir::NodeId) {
    let mut mb = MethodBuilder::new();
    let p1 = mb.new_object();
    let p2 = mb.new_object();
    let p3 = mb.new_object();
    mb.store_static(p2);
    let allocs = vec![p1, p2, p3];
    let q = mb.phi(vec![]);

    let mut g = ConnectionGraph::new(EscapePolicyTable::new());
    g.record_for_escape_analysis(q);
    for id in mb.ir.ids() {
        record(&mut g, &mb.ir, id);
    }
    for &i in order {
        mb.ir.add_phi_input(q, allocs[i]);
        g.record_for_escape_analysis(q);
        // Unrelated interleaved work.
        let extra = mb.new_object();
        record(&mut g, &mb.ir, extra);
    }
    compute(&mut g, &mb.ir);
    (g, allocs, q)
}

proptest! {
    #[test]
    fn join_converges_under_any_input_order(order in Just(vec![0usize, 1, 2]).prop_shuffle()) {
        let (reference, ref_allocs, ref_q) = graph_for_order(&[0, 1, 2]);
        let (shuffled, allocs, q) = graph_for_order(&order);
        prop_assert_eq!(&allocs, &ref_allocs);
        prop_assert_eq!(q, ref_q);

        let mut expected = reference.pointed_objects(ref_q);
        expected.sort_unstable();
        let mut got = shuffled.pointed_objects(q);
        got.sort_unstable();
        prop_assert_eq!(got, expected);

        for &a in &allocs {
            prop_assert_eq!(shuffled.escape_state(a), reference.escape_state(a));
        }
        prop_assert_eq!(shuffled.escape_state(q), reference.escape_state(q));
        prop_assert_eq!(shuffled.escape_state(q), EscapeState::GlobalEscape);
    }
}
