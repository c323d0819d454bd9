use super::Digraph;
use crate::id::{Zid, ZidSet};

fn z(value: u64) -> Zid {
    Zid::from_u64(value).expect("test zid should be valid")
}

fn chain() -> Digraph {
    let mut dg = Digraph::new();
    dg.add_edge(z(1), z(2));
    dg.add_edge(z(2), z(3));
    dg.add_edge(z(1), z(4));
    dg.add_vertex(z(9));
    dg
}

#[test]
fn originators_and_terminators_follow_edge_direction() {
    let dg = chain();
    assert_eq!(dg.originators(), [z(1), z(9)].into_iter().collect::<ZidSet>());
    assert_eq!(
        dg.terminators(),
        [z(3), z(4), z(9)].into_iter().collect::<ZidSet>()
    );
}

#[test]
fn transitive_closure_contains_reachable_vertices() {
    let mut dg = chain();
    dg.add_edge(z(3), z(1));
    let closure = dg.transitive_closure(z(2));
    let reachable = closure.reachable_vertices(z(2));
    let vertices = closure.vertices();
    for zid in reachable.iter() {
        assert!(vertices.contains(zid));
    }
    assert!(vertices.contains(z(4)));
    assert!(!vertices.contains(z(9)));
}

#[test]
fn transitive_closure_of_unknown_vertex_is_empty() {
    assert!(chain().transitive_closure(z(77)).is_empty());
}

#[test]
fn sorted_reverse_puts_successors_first() {
    let dg = chain();
    let order = dg.sorted_reverse().expect("acyclic graph should sort");
    let pos = |zid: Zid| order.iter().position(|v| *v == zid).expect("vertex present");
    assert_eq!(order.len(), 5);
    assert!(pos(z(3)) < pos(z(2)));
    assert!(pos(z(2)) < pos(z(1)));
    assert!(pos(z(4)) < pos(z(1)));
}

#[test]
fn cycles_are_detected() {
    let mut dg = chain();
    assert!(!dg.has_cycle());
    dg.add_edge(z(3), z(1));
    assert!(dg.has_cycle());
    assert!(dg.sorted_reverse().is_none());
}
