//! Fluent construction of rule patterns.
//!
//! The builder is the in-process stand-in for the external pattern loader:
//! whatever parses rule files ends up driving exactly these calls. Validation
//! here is per-rule; a failing `build()` rejects this rule only.

use std::collections::HashMap;

use axion_graph::AnchorKind;
use smallvec::SmallVec;

use crate::error::{self, Error, Result};
use crate::pattern::{AnchorIndex, AttrExpr, RuleAnchor, RuleAnchorId, RuleNode, RuleNodeId, RuleNodeRole, RulePattern};

/// Builds one [`RulePattern`].
///
/// ```
/// use axion_fusion::pattern::{AttrExpr, PatternBuilder};
///
/// let rule = PatternBuilder::new("MatMulBiasAdd")
///     .outer_input("x")
///     .outer_input("w")
///     .outer_input("b")
///     .origin("matmul", &["MatMul"])
///     .origin("bias_add", &["BiasAdd"])
///     .replacement("fused", &["FusedMatMul"])
///     .outer_output("out")
///     .edge(("x", 0), ("matmul", 0))
///     .edge(("w", 0), ("matmul", 1))
///     .edge(("matmul", 0), ("bias_add", 0))
///     .edge(("b", 0), ("bias_add", 1))
///     .edge(("bias_add", 0), ("out", 0))
///     .edge(("x", 0), ("fused", 0))
///     .edge(("w", 0), ("fused", 1))
///     .edge(("b", 0), ("fused", 2))
///     .edge(("fused", 0), ("out", 0))
///     .attr("fused", "transpose_a", AttrExpr::reference("matmul", "transpose_a"))
///     .build()
///     .unwrap();
/// assert_eq!(rule.origins().len(), 2);
/// ```
pub struct PatternBuilder {
    name: String,
    nodes: Vec<RuleNode>,
    anchors: Vec<RuleAnchor>,
    by_name: HashMap<String, RuleNodeId>,
    inputs: Vec<RuleNodeId>,
    outputs: Vec<RuleNodeId>,
    origins: Vec<RuleNodeId>,
    replacements: Vec<RuleNodeId>,
    check_cycles: bool,
    error: Option<Error>,
}

impl PatternBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            anchors: Vec::new(),
            by_name: HashMap::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            origins: Vec::new(),
            replacements: Vec::new(),
            check_cycles: true,
            error: None,
        }
    }

    /// Declare an input boundary node.
    pub fn outer_input(self, name: &str) -> Self {
        self.add_node(name, &[], RuleNodeRole::OuterInput)
    }

    /// Declare an output boundary node.
    pub fn outer_output(self, name: &str) -> Self {
        self.add_node(name, &[], RuleNodeRole::OuterOutput)
    }

    /// Declare an origin node with its acceptable type labels.
    pub fn origin(self, name: &str, types: &[&str]) -> Self {
        self.add_node(name, types, RuleNodeRole::Origin)
    }

    /// Declare a replacement node.
    pub fn replacement(self, name: &str, types: &[&str]) -> Self {
        self.add_node(name, types, RuleNodeRole::Replacement)
    }

    /// Declare a data edge from `(producer, output index)` to
    /// `(consumer, input index)`. Pass [`AnchorIndex::Any`] for an unbound
    /// index.
    pub fn edge(
        mut self,
        src: (&str, impl Into<AnchorIndex>),
        dst: (&str, impl Into<AnchorIndex>),
    ) -> Self {
        if self.error.is_some() {
            return self;
        }
        if let Err(e) = self.try_edge(src.0, src.1.into(), dst.0, dst.1.into()) {
            self.error = Some(e);
        }
        self
    }

    /// Declare a control edge between two nodes.
    pub fn control_edge(mut self, src: &str, dst: &str) -> Self {
        if self.error.is_some() {
            return self;
        }
        if let Err(e) = self.try_control_edge(src, dst) {
            self.error = Some(e);
        }
        self
    }

    /// Attach an attribute expression to a node.
    pub fn attr(mut self, node: &str, attr: &str, value: AttrExpr) -> Self {
        if self.error.is_some() {
            return self;
        }
        match self.lookup(node) {
            Ok(id) => {
                self.nodes[id.index()].attrs.insert(attr.to_owned(), value);
            }
            Err(e) => self.error = Some(e),
        }
        self
    }

    /// Skip the cycle-safety filter for matches of this rule.
    pub fn unchecked_cycles(mut self) -> Self {
        self.check_cycles = false;
        self
    }

    pub fn build(self) -> Result<RulePattern> {
        if let Some(e) = self.error {
            return Err(e);
        }
        Ok(RulePattern::from_parts(
            self.name,
            self.nodes,
            self.anchors,
            self.inputs,
            self.outputs,
            self.origins,
            self.replacements,
            self.check_cycles,
        ))
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn add_node(mut self, name: &str, types: &[&str], role: RuleNodeRole) -> Self {
        if self.error.is_some() {
            return self;
        }
        if self.by_name.contains_key(name) {
            self.error =
                Some(error::DuplicateRuleNodeSnafu { rule: self.name.clone(), name: name.to_owned() }.build());
            return self;
        }
        if types.is_empty() && matches!(role, RuleNodeRole::Origin | RuleNodeRole::Replacement) {
            self.error =
                Some(error::MissingTypeLabelsSnafu { rule: self.name.clone(), name: name.to_owned() }.build());
            return self;
        }

        let id = RuleNodeId(self.nodes.len() as u32);
        self.by_name.insert(name.to_owned(), id);
        self.nodes.push(RuleNode {
            name: name.to_owned(),
            types: types.iter().map(|t| (*t).to_owned()).collect::<SmallVec<_>>(),
            role,
            inputs: Vec::new(),
            outputs: Vec::new(),
            control_in: None,
            control_out: None,
            attrs: HashMap::new(),
        });
        match role {
            RuleNodeRole::OuterInput => self.inputs.push(id),
            RuleNodeRole::OuterOutput => self.outputs.push(id),
            RuleNodeRole::Origin => self.origins.push(id),
            RuleNodeRole::Replacement => self.replacements.push(id),
        }
        self
    }

    fn lookup(&self, name: &str) -> Result<RuleNodeId> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| error::UnknownRuleNodeSnafu { rule: self.name.clone(), name: name.to_owned() }.build())
    }

    fn alloc_anchor(&mut self, kind: AnchorKind, index: AnchorIndex, owner: RuleNodeId) -> RuleAnchorId {
        let id = RuleAnchorId(self.anchors.len() as u32);
        let slot = match index {
            AnchorIndex::At(i) => i.to_string(),
            AnchorIndex::Any => "?".to_owned(),
        };
        let side = match kind {
            AnchorKind::DataIn => "in",
            AnchorKind::DataOut => "out",
            AnchorKind::ControlIn => "ctl_in",
            AnchorKind::ControlOut => "ctl_out",
        };
        let name = format!("{}.{side}{slot}", self.nodes[owner.index()].name);
        self.anchors.push(RuleAnchor { kind, index, name, owner, peers: SmallVec::new() });
        id
    }

    /// Find or create the producer-side anchor. A concrete index names one
    /// anchor, so repeated edges from the same output share it (fan-out);
    /// every unbound edge gets its own anchor.
    fn out_anchor_for(&mut self, node: RuleNodeId, index: AnchorIndex) -> RuleAnchorId {
        if let AnchorIndex::At(_) = index
            && let Some(existing) = self.nodes[node.index()]
                .outputs
                .iter()
                .find(|a| self.anchors[a.index()].index == index)
        {
            return *existing;
        }
        let id = self.alloc_anchor(AnchorKind::DataOut, index, node);
        self.nodes[node.index()].outputs.push(id);
        id
    }

    /// Create the consumer-side anchor. Data inputs take a single producer,
    /// so a second edge to the same concrete input is rejected — except on
    /// output boundary nodes, whose anchors are shared between the before
    /// graph (origin producer) and the after graph (replacement producer).
    fn in_anchor_for(&mut self, node: RuleNodeId, index: AnchorIndex) -> Result<RuleAnchorId> {
        if self.nodes[node.index()].role == RuleNodeRole::OuterOutput
            && let AnchorIndex::At(_) = index
            && let Some(existing) =
                self.nodes[node.index()].inputs.iter().find(|a| self.anchors[a.index()].index == index)
        {
            return Ok(*existing);
        }
        if let AnchorIndex::At(_) = index
            && self.nodes[node.index()].inputs.iter().any(|a| self.anchors[a.index()].index == index)
        {
            let slot = match index {
                AnchorIndex::At(i) => i.to_string(),
                AnchorIndex::Any => "?".to_owned(),
            };
            return error::DuplicatePatternEdgeSnafu {
                rule: self.name.clone(),
                name: self.nodes[node.index()].name.clone(),
                index: slot,
            }
            .fail();
        }
        let id = self.alloc_anchor(AnchorKind::DataIn, index, node);
        self.nodes[node.index()].inputs.push(id);
        Ok(id)
    }

    fn try_edge(&mut self, src: &str, src_idx: AnchorIndex, dst: &str, dst_idx: AnchorIndex) -> Result<()> {
        let src_node = self.lookup(src)?;
        let dst_node = self.lookup(dst)?;
        let from = self.out_anchor_for(src_node, src_idx);
        let to = self.in_anchor_for(dst_node, dst_idx)?;
        self.anchors[from.index()].peers.push(to);
        self.anchors[to.index()].peers.push(from);
        Ok(())
    }

    fn try_control_edge(&mut self, src: &str, dst: &str) -> Result<()> {
        let src_node = self.lookup(src)?;
        let dst_node = self.lookup(dst)?;
        let from = match self.nodes[src_node.index()].control_out {
            Some(a) => a,
            None => {
                let a = self.alloc_anchor(AnchorKind::ControlOut, AnchorIndex::At(0), src_node);
                self.nodes[src_node.index()].control_out = Some(a);
                a
            }
        };
        let to = match self.nodes[dst_node.index()].control_in {
            Some(a) => a,
            None => {
                let a = self.alloc_anchor(AnchorKind::ControlIn, AnchorIndex::At(0), dst_node);
                self.nodes[dst_node.index()].control_in = Some(a);
                a
            }
        };
        self.anchors[from.index()].peers.push(to);
        self.anchors[to.index()].peers.push(from);
        Ok(())
    }
}
