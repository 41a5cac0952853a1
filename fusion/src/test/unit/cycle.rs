use axion_graph::{Graph, NodeId};

use crate::cycle::{filter_matches, ConnectionMatrix};
use crate::matcher::match_pattern;
use crate::test::helpers::{matmul_bias_rule_with_tap, scenario_graph};

fn assert_same_reachability(a: &ConnectionMatrix, b: &ConnectionMatrix, graph: &Graph) {
    let nodes: Vec<NodeId> = graph.nodes().collect();
    for &x in &nodes {
        for &y in &nodes {
            assert_eq!(a.reachable(x, y), b.reachable(x, y), "disagree on {x:?} -> {y:?}");
        }
    }
}

#[test]
fn transitive_reachability_over_the_scenario() {
    let s = scenario_graph();
    let m = ConnectionMatrix::build(&s.graph).unwrap();

    assert!(m.reachable(s.data1, s.matmul));
    assert!(m.reachable(s.data1, s.square));
    assert!(m.reachable(s.matmul, s.square));
    assert!(!m.reachable(s.square, s.data1));
    assert!(!m.reachable(s.weight, s.bias));
    // acyclic graph: nothing reaches itself
    assert!(!m.reachable(s.matmul, s.matmul));
}

#[test]
fn straight_chain_fusion_is_cycle_safe() {
    let s = scenario_graph();
    let m = ConnectionMatrix::build(&s.graph).unwrap();
    assert!(!m.would_cycle(&s.graph, &[s.matmul, s.bias_add]).unwrap());
}

#[test]
fn fusing_across_a_bypass_path_would_cycle() {
    // a -> b -> c and a -> c: collapsing {a, c} traps b between its own
    // producer and consumer.
    let mut g = Graph::new("g");
    let a = g.add_node("a", "A", 0, 1);
    let b = g.add_node("b", "B", 1, 1);
    let c = g.add_node("c", "C", 2, 1);
    g.connect(a, 0, b, 0).unwrap();
    g.connect(b, 0, c, 0).unwrap();
    g.connect(a, 0, c, 1).unwrap();

    let m = ConnectionMatrix::build(&g).unwrap();
    assert!(m.would_cycle(&g, &[a, c]).unwrap());
    assert!(!m.would_cycle(&g, &[a, b]).unwrap());
    assert!(!m.would_cycle(&g, &[b, c]).unwrap());
    assert!(!m.would_cycle(&g, &[a, b, c]).unwrap());
}

#[test]
fn control_edges_count_for_reachability() {
    let mut g = Graph::new("g");
    let a = g.add_node("a", "A", 0, 1);
    let b = g.add_node("b", "B", 0, 1);
    let c = g.add_node("c", "C", 0, 1);
    g.connect_control(a, b).unwrap();
    g.connect_control(b, c).unwrap();

    let m = ConnectionMatrix::build(&g).unwrap();
    assert!(m.reachable(a, c));
    assert!(!m.reachable(c, a));
}

#[test]
fn patch_after_a_splice_matches_a_rebuild() {
    let mut s = scenario_graph();
    let m_before = ConnectionMatrix::build(&s.graph).unwrap();
    let mut patched = m_before.clone();

    // splice: {matmul, bias_add} -> fused
    let fused = s.graph.add_node("fused", "FusedMatMul", 3, 1);
    let to_square = s.graph.in_anchor(s.square, 0).unwrap();
    s.graph.remove_node(s.matmul).unwrap();
    s.graph.remove_node(s.bias_add).unwrap();
    s.graph.connect(s.data1, 0, fused, 0).unwrap();
    s.graph.connect(s.weight, 0, fused, 1).unwrap();
    s.graph.connect(s.bias, 0, fused, 2).unwrap();
    s.graph.link(s.graph.out_anchor(fused, 0).unwrap(), to_square).unwrap();

    patched.patch(&s.graph, &[fused], &[s.matmul, s.bias_add]).unwrap();
    let rebuilt = ConnectionMatrix::build(&s.graph).unwrap();
    assert_same_reachability(&patched, &rebuilt, &s.graph);

    assert!(patched.reachable(s.data1, s.square));
    assert!(patched.reachable(fused, s.square));
    assert!(!patched.reachable(s.square, fused));
}

#[test]
fn patch_grows_with_the_arena() {
    let mut g = Graph::new("g");
    let first = g.add_node("n0", "Op", 1, 1);
    let mut prev = first;
    let mut m = ConnectionMatrix::build(&g).unwrap();

    // push well past one bitset word
    let mut added = Vec::new();
    for i in 1..80 {
        let n = g.add_node(format!("n{i}"), "Op", 1, 1);
        g.connect(prev, 0, n, 0).unwrap();
        added.push(n);
        prev = n;
    }
    m.patch(&g, &added, &[]).unwrap();

    let rebuilt = ConnectionMatrix::build(&g).unwrap();
    assert_same_reachability(&m, &rebuilt, &g);
    assert!(m.reachable(first, prev));
}

#[test]
fn stale_matrix_treats_unknown_slots_as_unreachable() {
    let mut g = Graph::new("g");
    let a = g.add_node("a", "A", 0, 1);
    let b = g.add_node("b", "B", 1, 1);
    g.connect(a, 0, b, 0).unwrap();
    let m = ConnectionMatrix::build(&g).unwrap();

    // grow the arena well past the matrix without patching
    let mut prev = b;
    for i in 0..70 {
        let n = g.add_node(format!("x{i}"), "X", 1, 1);
        g.connect(prev, 0, n, 0).unwrap();
        prev = n;
    }

    assert!(!m.reachable(a, prev));
    assert!(!m.reachable(prev, a));
    assert!(!m.would_cycle(&g, &[a, prev]).unwrap());
    assert!(!m.would_cycle(&g, &[prev]).unwrap());
}

#[test]
fn filter_invalidates_cycle_unsafe_matches() {
    // The MatMul result detours through a Relu into the BiasAdd's second
    // input; the rule taps the MatMul out and treats the Relu as an outer
    // producer, so the match exists but fusing would trap the Relu.
    let mut g = Graph::new("g");
    let d = g.add_node("d", "Data", 0, 1);
    let w = g.add_node("w", "Data", 0, 1);
    let mm = g.add_node("mm", "MatMul", 2, 1);
    let relu = g.add_node("relu", "Relu", 1, 1);
    let ba = g.add_node("ba", "BiasAdd", 2, 1);
    let sq = g.add_node("sq", "Square", 1, 1);
    g.connect(d, 0, mm, 0).unwrap();
    g.connect(w, 0, mm, 1).unwrap();
    g.connect(mm, 0, ba, 0).unwrap();
    g.connect(mm, 0, relu, 0).unwrap();
    g.connect(relu, 0, ba, 1).unwrap();
    g.connect(ba, 0, sq, 0).unwrap();

    let rule = matmul_bias_rule_with_tap();
    let mut matches = match_pattern(&rule, &g).unwrap();
    assert_eq!(matches.len(), 1);

    let matrix = ConnectionMatrix::build(&g).unwrap();
    let excluded = filter_matches(&matrix, &g, &mut matches).unwrap();
    assert_eq!(excluded, 1);
    assert!(!matches[0].is_valid());
}
