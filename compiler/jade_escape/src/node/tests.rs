use jade_ir::NodeId;
use pretty_assertions::assert_eq;

use super::*;

fn n(raw: u32) -> NodeId {
    NodeId::new(raw)
}

#[test]
fn add_edge_is_idempotent() {
    let mut node = PointsToNode::default();
    assert!(node.add_edge(n(3), EdgeKind::PointsTo));
    assert!(!node.add_edge(n(3), EdgeKind::PointsTo));
    assert_eq!(node.edge_count(), 1);

    // Same target, different kind is a distinct edge.
    assert!(node.add_edge(n(3), EdgeKind::Deferred));
    assert_eq!(node.edge_count(), 2);
}

#[test]
fn remove_edge_is_silent_on_absence() {
    let mut node = PointsToNode::default();
    node.add_edge(n(1), EdgeKind::Deferred);

    node.remove_edge(n(2), EdgeKind::Deferred);
    node.remove_edge(n(1), EdgeKind::PointsTo);
    assert_eq!(node.edge_count(), 1);

    node.remove_edge(n(1), EdgeKind::Deferred);
    assert_eq!(node.edge_count(), 0);
}

#[test]
fn escape_state_only_widens() {
    let mut node = PointsToNode::default();
    assert!(node.widen_escape(EscapeState::NoEscape));
    assert!(node.widen_escape(EscapeState::GlobalEscape));

    // Narrowing is a no-op and reports no change.
    assert!(!node.widen_escape(EscapeState::ArgEscape));
    assert!(!node.widen_escape(EscapeState::NoEscape));
    assert_eq!(node.escape_state(), EscapeState::GlobalEscape);
}

#[test]
fn widen_to_same_state_reports_no_change() {
    let mut node = PointsToNode::default();
    assert!(node.widen_escape(EscapeState::ArgEscape));
    assert!(!node.widen_escape(EscapeState::ArgEscape));
}

#[test]
fn kind_is_set_once() {
    let mut node = PointsToNode::default();
    assert_eq!(node.set_kind(PtKind::LocalVar), Ok(()));
    // Same kind again is fine.
    assert_eq!(node.set_kind(PtKind::LocalVar), Ok(()));
    // A different kind is rejected with the existing kind.
    assert_eq!(node.set_kind(PtKind::JavaObject), Err(PtKind::LocalVar));
    assert_eq!(node.kind(), PtKind::LocalVar);
}

#[test]
fn escape_order_matches_widening_order() {
    assert!(EscapeState::Unknown < EscapeState::NoEscape);
    assert!(EscapeState::NoEscape < EscapeState::ArgEscape);
    assert!(EscapeState::ArgEscape < EscapeState::GlobalEscape);
}

#[test]
fn defaults_are_conservative_about_nothing() {
    let node = PointsToNode::default();
    assert_eq!(node.kind(), PtKind::Unknown);
    assert_eq!(node.escape_state(), EscapeState::Unknown);
    assert_eq!(node.offset(), jade_ir::UNKNOWN_OFFSET);
    assert!(node.unique_type());
    assert!(!node.hidden_alias());
    assert_eq!(node.inputs_processed(), 0);
    assert!(!node.has_deferred_edges());
}
