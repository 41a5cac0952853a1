//! Shared fixtures: a small inference graph, the matmul fusion rule, and a
//! generic splice replacer that rewrites matched regions in place.

use std::collections::HashMap;

use axion_graph::{Graph, NodeId};

use crate::error::{self, Result};
use crate::matcher::MatchResult;
use crate::orchestrator::{GraphDelta, ReplaceOutcome, Replacer};
use crate::pattern::{AttrExpr, PatternBuilder, RuleNodeRole, RulePattern};

/// `Data1 -> MatMul <- Weight; MatMul -> BiasAdd <- Bias; BiasAdd -> Square`.
pub struct ScenarioGraph {
    pub graph: Graph,
    pub data1: NodeId,
    pub weight: NodeId,
    pub bias: NodeId,
    pub matmul: NodeId,
    pub bias_add: NodeId,
    pub square: NodeId,
}

pub fn scenario_graph() -> ScenarioGraph {
    let mut graph = Graph::new("scenario");
    let data1 = graph.add_node("data1", "Data", 0, 1);
    let weight = graph.add_node("weight", "Data", 0, 1);
    let bias = graph.add_node("bias", "Data", 0, 1);
    let matmul = graph.add_node("matmul", "MatMul", 2, 1);
    let bias_add = graph.add_node("bias_add", "BiasAdd", 2, 1);
    let square = graph.add_node("square", "Square", 1, 1);
    graph.connect(data1, 0, matmul, 0).unwrap();
    graph.connect(weight, 0, matmul, 1).unwrap();
    graph.connect(matmul, 0, bias_add, 0).unwrap();
    graph.connect(bias, 0, bias_add, 1).unwrap();
    graph.connect(bias_add, 0, square, 0).unwrap();
    graph.set_attr(matmul, "transpose_a", true).unwrap();
    ScenarioGraph { graph, data1, weight, bias, matmul, bias_add, square }
}

/// MatMul followed by BiasAdd collapses into FusedMatMul, carrying over the
/// transpose flag.
pub fn matmul_bias_rule() -> RulePattern {
    PatternBuilder::new("MatMulBiasAdd")
        .outer_input("x")
        .outer_input("w")
        .outer_input("b")
        .origin("matmul", &["MatMul"])
        .origin("bias_add", &["BiasAdd"])
        .replacement("fused", &["FusedMatMul"])
        .outer_output("out")
        .edge(("x", 0), ("matmul", 0))
        .edge(("w", 0), ("matmul", 1))
        .edge(("matmul", 0), ("bias_add", 0))
        .edge(("b", 0), ("bias_add", 1))
        .edge(("bias_add", 0), ("out", 0))
        .edge(("x", 0), ("fused", 0))
        .edge(("w", 0), ("fused", 1))
        .edge(("b", 0), ("fused", 2))
        .edge(("fused", 0), ("out", 0))
        .attr("fused", "transpose_a", AttrExpr::reference("matmul", "transpose_a"))
        .build()
        .unwrap()
}

/// Variant of [`matmul_bias_rule`] that also taps the intermediate MatMul
/// result out of the region, so outside consumers of it are allowed.
pub fn matmul_bias_rule_with_tap() -> RulePattern {
    PatternBuilder::new("MatMulBiasAddTap")
        .outer_input("x")
        .outer_input("w")
        .outer_input("b")
        .origin("matmul", &["MatMul"])
        .origin("bias_add", &["BiasAdd"])
        .replacement("fused", &["FusedMatMul"])
        .outer_output("out")
        .outer_output("out2")
        .edge(("x", 0), ("matmul", 0))
        .edge(("w", 0), ("matmul", 1))
        .edge(("matmul", 0), ("bias_add", 0))
        .edge(("b", 0), ("bias_add", 1))
        .edge(("bias_add", 0), ("out", 0))
        .edge(("matmul", 0), ("out2", 0))
        .edge(("x", 0), ("fused", 0))
        .edge(("w", 0), ("fused", 1))
        .edge(("b", 0), ("fused", 2))
        .edge(("fused", 0), ("out", 0))
        .build()
        .unwrap()
}

/// Rewrites a matched region by removing the origin nodes and splicing the
/// replacement nodes into the recorded boundary anchors.
///
/// Control edges on replacement nodes are declined with `NotSupported`, which
/// doubles as the test hook for that orchestrator path.
pub struct SpliceReplacer;

impl Replacer for SpliceReplacer {
    fn apply(&mut self, graph: &mut Graph, rule: &RulePattern, m: &MatchResult) -> Result<ReplaceOutcome> {
        for &rn in rule.replacements() {
            let node = rule.node(rn);
            if node.control_in().is_some() || node.control_out().is_some() {
                return Ok(ReplaceOutcome::NotSupported);
            }
        }

        let fail = |reason: &str| {
            error::ReplaceFailedSnafu { rule: rule.name().to_owned(), reason: reason.to_owned() }.build()
        };

        // Create replacement nodes first: attribute references read from the
        // matched origin nodes, which are still alive here.
        let mut new_nodes: HashMap<crate::pattern::RuleNodeId, NodeId> = HashMap::new();
        for &rn in rule.replacements() {
            let node = rule.node(rn);
            let id = graph.add_node(node.name(), &node.types()[0], node.inputs().len(), node.outputs().len());
            for (attr_name, expr) in node.attrs() {
                match expr {
                    AttrExpr::Literal(v) => graph.set_attr(id, attr_name, v.clone())?,
                    AttrExpr::Reference { node: src, attr } => {
                        let src_rn = rule.find_node(src).ok_or_else(|| fail("attr reference to unknown node"))?;
                        let src_gn = m.mapped(src_rn).ok_or_else(|| fail("attr reference to unmatched node"))?;
                        if let Some(v) = graph.attr(src_gn, attr)?.cloned() {
                            graph.set_attr(id, attr_name, v)?;
                        }
                    }
                }
            }
            new_nodes.insert(rn, id);
        }

        let removed: Vec<NodeId> = m.origin_nodes().to_vec();
        for &n in &removed {
            graph.remove_node(n)?;
        }

        // Inputs: outer producers feed the replacement nodes through the
        // anchors the match recorded; internal edges connect new nodes.
        for (&rn, &gn) in &new_nodes {
            let node = rule.node(rn);
            for (slot, &ra) in node.inputs().iter().enumerate() {
                let Some(&pp) = rule.anchor(ra).peers().first() else {
                    continue;
                };
                let to = graph.in_anchor(gn, slot)?;
                let owner = rule.anchor(pp).owner();
                match rule.node(owner).role() {
                    RuleNodeRole::OuterInput => {
                        let binding = m
                            .inputs()
                            .iter()
                            .find(|b| b.rule_src == pp)
                            .ok_or_else(|| fail("outer input without a recorded binding"))?;
                        let from = binding.origin_peer.ok_or_else(|| fail("outer input binding has no producer"))?;
                        graph.link(from, to)?;
                    }
                    RuleNodeRole::Replacement => {
                        let src_gn = new_nodes[&owner];
                        let out_slot = rule
                            .node(owner)
                            .outputs()
                            .iter()
                            .position(|a| *a == pp)
                            .ok_or_else(|| fail("internal edge from unknown output"))?;
                        graph.link(graph.out_anchor(src_gn, out_slot)?, to)?;
                    }
                    _ => return Err(fail("replacement input fed by a non-replacement producer")),
                }
            }
        }

        // Outputs: every consumer the match collected behind a boundary
        // anchor reconnects to the new producer.
        for (&rn, &gn) in &new_nodes {
            for (slot, &ro) in rule.node(rn).outputs().iter().enumerate() {
                let from = graph.out_anchor(gn, slot)?;
                for &bp in rule.anchor(ro).peers() {
                    if rule.node(rule.anchor(bp).owner()).role() != RuleNodeRole::OuterOutput {
                        continue;
                    }
                    if let Some(binding) = m.outputs().iter().find(|b| b.rule_anchor == bp) {
                        for &consumer in &binding.graph_anchors {
                            graph.link(from, consumer)?;
                        }
                    }
                }
            }
        }

        let added = new_nodes.values().copied().collect();
        Ok(ReplaceOutcome::Applied(GraphDelta { added, removed }))
    }
}
