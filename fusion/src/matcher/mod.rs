//! Subgraph pattern matching.
//!
//! [`match_pattern`] enumerates every valid embedding of one rule pattern in
//! a target graph. It is pure with respect to the graph and deterministic:
//! candidates are seeded through the type index in node insertion order, and
//! each walk visits anchors in declaration order.
//!
//! Matching is all-or-nothing per embedding. A malformed pattern fails the
//! whole call with [`Error::MalformedPattern`](crate::Error::MalformedPattern)
//! so the caller can skip the rule; a structural mismatch merely discards the
//! current candidate.

mod walk;

use std::collections::BTreeMap;

use axion_graph::{AnchorId, Graph, NodeId};
use itertools::Itertools;

use crate::error::Result;
use crate::pattern::{RuleAnchorId, RuleNodeId, RulePattern};
use walk::Walk;

/// One matched before-graph edge from outside the region into an origin node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OuterInputBinding {
    /// Producer-side boundary anchor in the pattern.
    pub rule_src: RuleAnchorId,
    /// Consumer-side anchor in the pattern (an origin node's input).
    pub rule_dst: RuleAnchorId,
    /// The bound graph input anchor of the matched origin node.
    pub graph_in: AnchorId,
    /// The producer anchor feeding `graph_in` as it existed at match time,
    /// before any later pass touches it.
    pub origin_peer: Option<AnchorId>,
}

/// One matched boundary output anchor and the graph anchors it fans out to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OuterOutputBinding {
    /// The output boundary node's input anchor in the pattern.
    pub rule_anchor: RuleAnchorId,
    /// Graph input anchors consuming the matched producer, in discovery
    /// order. Fan-out beyond the pattern's declared peers lands here too.
    pub graph_anchors: Vec<AnchorId>,
}

/// One embedding of a rule pattern in a graph.
///
/// Created fresh per match attempt and discarded after the replace step
/// consumes it; node identities do not survive a replacement.
#[derive(Debug, Clone)]
pub struct MatchResult {
    rule: String,
    generation: u64,
    node_map: BTreeMap<RuleNodeId, NodeId>,
    origin_nodes: Vec<NodeId>,
    inputs: Vec<OuterInputBinding>,
    outputs: Vec<OuterOutputBinding>,
    valid: bool,
}

impl MatchResult {
    pub fn rule(&self) -> &str {
        &self.rule
    }

    /// Graph generation this match was taken against.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Matched graph nodes of the origin set, in pattern declaration order.
    pub fn origin_nodes(&self) -> &[NodeId] {
        &self.origin_nodes
    }

    /// Graph node bound to a rule node (origin and outer-input nodes only).
    pub fn mapped(&self, rule_node: RuleNodeId) -> Option<NodeId> {
        self.node_map.get(&rule_node).copied()
    }

    pub fn inputs(&self) -> &[OuterInputBinding] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[OuterOutputBinding] {
        &self.outputs
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Exclude this match from application (e.g. it would create a cycle).
    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    /// Whether this match can still be applied to the graph. Fast path on the
    /// generation tag; after any mutation, every mapped origin node must
    /// still be alive and every recorded boundary edge must still be wired
    /// the way it was matched.
    pub fn is_applicable(&self, graph: &Graph) -> bool {
        if graph.generation() == self.generation {
            return true;
        }
        self.origin_nodes.iter().all(|n| graph.is_alive(*n))
            && self.inputs.iter().all(|b| graph.producer(b.graph_in).ok().flatten() == b.origin_peer)
            && self
                .outputs
                .iter()
                .all(|b| b.graph_anchors.iter().all(|a| graph.anchor(*a).is_ok()))
    }
}

/// Enumerate all valid embeddings of `pattern` in `graph`.
pub fn match_pattern(pattern: &RulePattern, graph: &Graph) -> Result<Vec<MatchResult>> {
    let seed_rule = pattern.first_output_origin()?;
    let seed = pattern.node(seed_rule);

    // NodeId order is insertion order, so this keeps enumeration stable even
    // when the seed node accepts several type labels.
    let candidates: Vec<NodeId> = seed
        .types()
        .iter()
        .flat_map(|ty| graph.nodes_of_type(ty))
        .copied()
        .sorted_unstable()
        .dedup()
        .collect();

    let mut results = Vec::new();
    for gn in candidates {
        let mut walk = Walk::new(pattern, graph);
        if let Some(parts) = walk.run(seed_rule, gn)? {
            results.push(MatchResult {
                rule: pattern.name().to_owned(),
                generation: graph.generation(),
                node_map: parts.node_map,
                origin_nodes: parts.origin_nodes,
                inputs: parts.inputs,
                outputs: parts.outputs,
                valid: true,
            });
        }
    }

    tracing::debug!(
        rule = pattern.name(),
        graph = graph.name(),
        matches = results.len(),
        "pattern matching finished"
    );
    Ok(results)
}
