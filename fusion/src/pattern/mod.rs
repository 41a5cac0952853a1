//! Fusion rule patterns.
//!
//! A [`RulePattern`] is the declarative before/after template of one fusion
//! rule: origin nodes that must exist in the graph, replacement nodes that
//! exist after the rewrite, and boundary nodes marking where the rewritten
//! region splices into the surrounding graph. Patterns are built once through
//! [`PatternBuilder`], are immutable afterwards, and are shared read-only
//! (`Arc`) across repeated matches.
//!
//! Rule nodes and rule anchors live in arenas inside the pattern and refer to
//! each other through [`RuleNodeId`]/[`RuleAnchorId`] handles, mirroring the
//! graph crate's storage.

pub mod builder;

pub use builder::PatternBuilder;

use std::collections::HashMap;

use axion_graph::{AnchorKind, AttrValue};
use smallvec::SmallVec;

use crate::error::{self, Result};

/// Handle to a node inside one pattern's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleNodeId(pub(crate) u32);

impl RuleNodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Handle to an anchor inside one pattern's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleAnchorId(pub(crate) u32);

impl RuleAnchorId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// What a rule node stands for in the before/after template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleNodeRole {
    /// Boundary: produces data from outside the rewritten region.
    OuterInput,
    /// Boundary: consumes data outside the rewritten region.
    OuterOutput,
    /// Must exist in the graph before the rewrite, matched exactly.
    Origin,
    /// Exists after the rewrite.
    Replacement,
}

/// Declared index of a pattern anchor.
///
/// `At(i)` must equal the matched graph anchor's index. `Any` is the unbound
/// sentinel: the first index observed during a match is frozen and every
/// later occurrence must agree with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorIndex {
    At(usize),
    Any,
}

impl AnchorIndex {
    pub fn accepts(self, actual: usize) -> bool {
        match self {
            Self::At(i) => i == actual,
            Self::Any => true,
        }
    }
}

impl From<usize> for AnchorIndex {
    fn from(i: usize) -> Self {
        Self::At(i)
    }
}

/// Attribute expression on a replacement node.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrExpr {
    /// A fixed value.
    Literal(AttrValue),
    /// Copy this attribute from the matched graph node at rewrite time.
    Reference { node: String, attr: String },
}

impl AttrExpr {
    pub fn literal(value: impl Into<AttrValue>) -> Self {
        Self::Literal(value.into())
    }

    pub fn reference(node: impl Into<String>, attr: impl Into<String>) -> Self {
        Self::Reference { node: node.into(), attr: attr.into() }
    }
}

/// A connection point of a rule node. Peer and owner relations are handle
/// lists; control anchors admit multiple peers.
#[derive(Debug, Clone)]
pub struct RuleAnchor {
    pub(crate) kind: AnchorKind,
    pub(crate) index: AnchorIndex,
    pub(crate) name: String,
    pub(crate) owner: RuleNodeId,
    pub(crate) peers: SmallVec<[RuleAnchorId; 2]>,
}

impl RuleAnchor {
    pub fn kind(&self) -> AnchorKind {
        self.kind
    }

    pub fn index(&self) -> AnchorIndex {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> RuleNodeId {
        self.owner
    }

    pub fn peers(&self) -> &[RuleAnchorId] {
        &self.peers
    }
}

/// One node of the template.
#[derive(Debug, Clone)]
pub struct RuleNode {
    pub(crate) name: String,
    /// Acceptable type labels; any of them matches. Empty for boundary nodes.
    pub(crate) types: SmallVec<[String; 2]>,
    pub(crate) role: RuleNodeRole,
    pub(crate) inputs: Vec<RuleAnchorId>,
    pub(crate) outputs: Vec<RuleAnchorId>,
    pub(crate) control_in: Option<RuleAnchorId>,
    pub(crate) control_out: Option<RuleAnchorId>,
    pub(crate) attrs: HashMap<String, AttrExpr>,
}

impl RuleNode {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn types(&self) -> &[String] {
        &self.types
    }

    pub fn role(&self) -> RuleNodeRole {
        self.role
    }

    pub fn matches_type(&self, ty: &str) -> bool {
        self.types.iter().any(|t| t == ty)
    }

    /// Data input anchors in declaration order.
    pub fn inputs(&self) -> &[RuleAnchorId] {
        &self.inputs
    }

    /// Data output anchors in declaration order.
    pub fn outputs(&self) -> &[RuleAnchorId] {
        &self.outputs
    }

    pub fn control_in(&self) -> Option<RuleAnchorId> {
        self.control_in
    }

    pub fn control_out(&self) -> Option<RuleAnchorId> {
        self.control_out
    }

    pub fn attrs(&self) -> &HashMap<String, AttrExpr> {
        &self.attrs
    }
}

/// Immutable in-memory representation of one fusion rule.
#[derive(Debug)]
pub struct RulePattern {
    name: String,
    nodes: Vec<RuleNode>,
    anchors: Vec<RuleAnchor>,
    inputs: Vec<RuleNodeId>,
    outputs: Vec<RuleNodeId>,
    origins: Vec<RuleNodeId>,
    replacements: Vec<RuleNodeId>,
    check_cycles: bool,
}

impl RulePattern {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        name: String,
        nodes: Vec<RuleNode>,
        anchors: Vec<RuleAnchor>,
        inputs: Vec<RuleNodeId>,
        outputs: Vec<RuleNodeId>,
        origins: Vec<RuleNodeId>,
        replacements: Vec<RuleNodeId>,
        check_cycles: bool,
    ) -> Self {
        Self { name, nodes, anchors, inputs, outputs, origins, replacements, check_cycles }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node(&self, id: RuleNodeId) -> &RuleNode {
        &self.nodes[id.index()]
    }

    pub fn anchor(&self, id: RuleAnchorId) -> &RuleAnchor {
        &self.anchors[id.index()]
    }

    pub fn node_ids(&self) -> impl Iterator<Item = RuleNodeId> + '_ {
        (0..self.nodes.len()).map(|i| RuleNodeId(i as u32))
    }

    pub fn find_node(&self, name: &str) -> Option<RuleNodeId> {
        self.nodes.iter().position(|n| n.name == name).map(|i| RuleNodeId(i as u32))
    }

    /// Ordered input boundary nodes.
    pub fn inputs(&self) -> &[RuleNodeId] {
        &self.inputs
    }

    /// Ordered output boundary nodes.
    pub fn outputs(&self) -> &[RuleNodeId] {
        &self.outputs
    }

    /// Origin nodes, in declaration order.
    pub fn origins(&self) -> &[RuleNodeId] {
        &self.origins
    }

    /// Replacement nodes, in declaration order.
    pub fn replacements(&self) -> &[RuleNodeId] {
        &self.replacements
    }

    /// Whether matches of this rule go through the cycle-safety filter.
    pub fn check_cycles(&self) -> bool {
        self.check_cycles
    }

    /// The origin-graph predecessor of the first declared output boundary
    /// node; every match walk starts there.
    ///
    /// Fails with [`Error::MalformedPattern`](crate::Error::MalformedPattern)
    /// if the boundary node has other than exactly one input anchor, that
    /// anchor has other than exactly one peer, or the peer's owner is not in
    /// the origin set.
    pub fn first_output_origin(&self) -> Result<RuleNodeId> {
        let malformed = |reason: &str| {
            error::MalformedPatternSnafu { rule: self.name.clone(), reason: reason.to_owned() }.build()
        };

        let out = *self.outputs.first().ok_or_else(|| malformed("no output boundary node declared"))?;
        let node = self.node(out);
        let total_inputs = node.inputs.len() + usize::from(node.control_in.is_some());
        if total_inputs != 1 {
            return Err(malformed("first output boundary node must have exactly one input anchor"));
        }

        let Some(anchor_id) = node.inputs.first().copied().or(node.control_in) else {
            return Err(malformed("first output boundary node must have exactly one input anchor"));
        };
        let anchor = self.anchor(anchor_id);
        // The boundary anchor is shared with the after graph; only the
        // origin-owned peer counts here.
        let mut origin_peers = anchor
            .peers()
            .iter()
            .filter(|p| self.node(self.anchor(**p).owner()).role == RuleNodeRole::Origin);
        let peer = match (origin_peers.next(), origin_peers.next()) {
            (Some(p), None) => *p,
            _ => return Err(malformed("first output boundary node must be fed by exactly one origin node")),
        };
        Ok(self.anchor(peer).owner())
    }

    /// Number of before-graph pattern edges leaving input boundary nodes
    /// (edges into origin nodes; replacement-side wiring from the same
    /// boundary anchors is not part of the match). Every match must record
    /// exactly this many outer-input bindings.
    pub fn outer_input_anchor_count(&self) -> usize {
        self.inputs
            .iter()
            .map(|id| {
                let node = self.node(*id);
                node.outputs
                    .iter()
                    .chain(node.control_out.iter())
                    .flat_map(|a| self.anchor(*a).peers())
                    .filter(|p| self.node(self.anchor(**p).owner()).role == RuleNodeRole::Origin)
                    .count()
            })
            .sum()
    }

    /// Number of input anchors on output boundary nodes. Every match must
    /// record exactly this many outer-output bindings (each binding holds a
    /// set of graph anchors).
    pub fn outer_output_anchor_count(&self) -> usize {
        self.outputs
            .iter()
            .map(|id| {
                let node = self.node(*id);
                node.inputs.len() + usize::from(node.control_in.is_some())
            })
            .sum()
    }
}
