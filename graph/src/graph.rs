//! Arena-backed graph storage and mutation.

use std::collections::HashMap;

use smallvec::SmallVec;
use snafu::ensure;

use crate::anchor::{Anchor, AnchorId, AnchorKind};
use crate::attr::AttrValue;
use crate::error::{self, Error, Result};
use crate::node::{Node, NodeId};

/// Directed attributed graph over arena-allocated nodes and anchors.
///
/// Node enumeration order is insertion order and stays stable across
/// removals, which makes matching deterministic. Removed slots are tombstoned
/// rather than reused, so a [`NodeId`] never changes meaning within one
/// graph's lifetime.
#[derive(Debug, Clone)]
pub struct Graph {
    name: String,
    nodes: Vec<Option<Node>>,
    anchors: Vec<Option<Anchor>>,
    /// Bumped on every structural mutation; used to detect stale match results.
    generation: u64,
    /// Type label -> alive nodes carrying it, in insertion order.
    type_index: HashMap<String, Vec<NodeId>>,
}

impl Graph {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), nodes: Vec::new(), anchors: Vec::new(), generation: 0, type_index: HashMap::new() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current mutation generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of alive nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    /// Arena capacity: one past the largest node slot ever allocated.
    pub fn node_slots(&self) -> usize {
        self.nodes.len()
    }

    // ========================================================================
    // Construction
    // ========================================================================

    /// Add a node with `n_inputs` data inputs and `n_outputs` data outputs.
    /// Control anchors are always created alongside.
    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        op_type: impl Into<String>,
        n_inputs: usize,
        n_outputs: usize,
    ) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        let op_type = op_type.into();

        let inputs: SmallVec<[AnchorId; 4]> =
            (0..n_inputs).map(|i| self.alloc_anchor(AnchorKind::DataIn, i, id)).collect();
        let outputs: SmallVec<[AnchorId; 2]> =
            (0..n_outputs).map(|i| self.alloc_anchor(AnchorKind::DataOut, i, id)).collect();
        let control_in = self.alloc_anchor(AnchorKind::ControlIn, 0, id);
        let control_out = self.alloc_anchor(AnchorKind::ControlOut, 0, id);

        self.type_index.entry(op_type.clone()).or_default().push(id);
        self.nodes.push(Some(Node {
            name: name.into(),
            op_type,
            inputs,
            outputs,
            control_in,
            control_out,
            attrs: HashMap::new(),
        }));
        self.generation += 1;
        id
    }

    fn alloc_anchor(&mut self, kind: AnchorKind, index: usize, owner: NodeId) -> AnchorId {
        let id = AnchorId(self.anchors.len() as u32);
        self.anchors.push(Some(Anchor::new(kind, index, owner)));
        id
    }

    /// Link a data output anchor to a free data input anchor.
    pub fn link(&mut self, from: AnchorId, to: AnchorId) -> Result<()> {
        let from_kind = self.anchor(from)?.kind();
        let to_kind = self.anchor(to)?.kind();
        ensure!(
            from_kind == AnchorKind::DataOut && to_kind == AnchorKind::DataIn,
            error::LinkKindMismatchSnafu { from_kind, to_kind }
        );

        let dst = self.anchor(to)?;
        ensure!(dst.peers.is_empty(), error::InputOccupiedSnafu { node: dst.owner, index: dst.index });

        self.anchor_mut(from)?.peers.push(to);
        self.anchor_mut(to)?.peers.push(from);
        self.generation += 1;
        Ok(())
    }

    /// Link a control output anchor to a control input anchor. Both sides
    /// admit multiple peers.
    pub fn link_control(&mut self, from: AnchorId, to: AnchorId) -> Result<()> {
        let from_kind = self.anchor(from)?.kind();
        let to_kind = self.anchor(to)?.kind();
        ensure!(
            from_kind == AnchorKind::ControlOut && to_kind == AnchorKind::ControlIn,
            error::LinkKindMismatchSnafu { from_kind, to_kind }
        );

        if !self.anchor(from)?.peers.contains(&to) {
            self.anchor_mut(from)?.peers.push(to);
            self.anchor_mut(to)?.peers.push(from);
            self.generation += 1;
        }
        Ok(())
    }

    /// Remove the edge between two anchors.
    pub fn unlink(&mut self, from: AnchorId, to: AnchorId) -> Result<()> {
        let present = self.anchor(from)?.peers.contains(&to);
        ensure!(present, error::EdgeNotFoundSnafu { from, to });

        self.anchor_mut(from)?.peers.retain(|p| *p != to);
        self.anchor_mut(to)?.peers.retain(|p| *p != from);
        self.generation += 1;
        Ok(())
    }

    /// Connect data output `src_idx` of `src` to data input `dst_idx` of `dst`.
    pub fn connect(&mut self, src: NodeId, src_idx: usize, dst: NodeId, dst_idx: usize) -> Result<()> {
        let from = self.out_anchor(src, src_idx)?;
        let to = self.in_anchor(dst, dst_idx)?;
        self.link(from, to)
    }

    /// Add a control edge from `src` to `dst`.
    pub fn connect_control(&mut self, src: NodeId, dst: NodeId) -> Result<()> {
        let from = self.node(src)?.control_out;
        let to = self.node(dst)?.control_in;
        self.link_control(from, to)
    }

    /// Remove a node, detaching every edge that touched it.
    pub fn remove_node(&mut self, id: NodeId) -> Result<()> {
        let node = self.nodes.get_mut(id.index()).and_then(Option::take).ok_or(Error::NodeNotFound { node: id })?;

        let mut own_anchors: Vec<AnchorId> = node.inputs.iter().chain(node.outputs.iter()).copied().collect();
        own_anchors.push(node.control_in);
        own_anchors.push(node.control_out);

        for a in own_anchors {
            let peers: Vec<AnchorId> = self.anchors[a.index()].as_ref().map(|x| x.peers.to_vec()).unwrap_or_default();
            for p in peers {
                if let Some(peer) = self.anchors[p.index()].as_mut() {
                    peer.peers.retain(|q| *q != a);
                }
            }
            self.anchors[a.index()] = None;
        }

        if let Some(ids) = self.type_index.get_mut(&node.op_type) {
            ids.retain(|n| *n != id);
        }
        self.generation += 1;
        Ok(())
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    pub fn is_alive(&self, id: NodeId) -> bool {
        matches!(self.nodes.get(id.index()), Some(Some(_)))
    }

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(id.index()).and_then(Option::as_ref).ok_or(Error::NodeNotFound { node: id })
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes.get_mut(id.index()).and_then(Option::as_mut).ok_or(Error::NodeNotFound { node: id })
    }

    pub fn anchor(&self, id: AnchorId) -> Result<&Anchor> {
        self.anchors.get(id.index()).and_then(Option::as_ref).ok_or(Error::AnchorNotFound { anchor: id })
    }

    fn anchor_mut(&mut self, id: AnchorId) -> Result<&mut Anchor> {
        self.anchors.get_mut(id.index()).and_then(Option::as_mut).ok_or(Error::AnchorNotFound { anchor: id })
    }

    pub fn in_anchor(&self, node: NodeId, index: usize) -> Result<AnchorId> {
        let n = self.node(node)?;
        n.inputs.get(index).copied().ok_or(Error::AnchorIndexOutOfRange {
            node,
            kind: AnchorKind::DataIn,
            index,
            count: n.inputs.len(),
        })
    }

    pub fn out_anchor(&self, node: NodeId, index: usize) -> Result<AnchorId> {
        let n = self.node(node)?;
        n.outputs.get(index).copied().ok_or(Error::AnchorIndexOutOfRange {
            node,
            kind: AnchorKind::DataOut,
            index,
            count: n.outputs.len(),
        })
    }

    /// Peers of an anchor.
    pub fn peers(&self, id: AnchorId) -> Result<&[AnchorId]> {
        Ok(self.anchor(id)?.peers())
    }

    /// The producing output anchor of a data input, if connected.
    pub fn producer(&self, in_anchor: AnchorId) -> Result<Option<AnchorId>> {
        Ok(self.anchor(in_anchor)?.peers().first().copied())
    }

    /// Alive node handles in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().enumerate().filter_map(|(i, n)| n.as_ref().map(|_| NodeId(i as u32)))
    }

    /// Alive nodes carrying the given type label, in insertion order.
    pub fn nodes_of_type(&self, op_type: &str) -> &[NodeId] {
        self.type_index.get(op_type).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First alive node with the given name.
    pub fn find_node(&self, name: &str) -> Result<NodeId> {
        self.nodes()
            .find(|id| self.nodes[id.index()].as_ref().is_some_and(|n| n.name == name))
            .ok_or_else(|| Error::NodeNameNotFound { name: name.to_owned() })
    }

    /// Direct successors through data and control edges, in anchor order.
    /// A successor reachable through several edges appears once.
    pub fn successors(&self, id: NodeId) -> Result<Vec<NodeId>> {
        let n = self.node(id)?;
        let mut out = Vec::new();
        for a in n.outputs.iter().chain(std::iter::once(&n.control_out)) {
            for p in self.anchor(*a)?.peers() {
                let owner = self.anchor(*p)?.owner();
                if !out.contains(&owner) {
                    out.push(owner);
                }
            }
        }
        Ok(out)
    }

    /// Direct predecessors through data and control edges, in anchor order.
    pub fn predecessors(&self, id: NodeId) -> Result<Vec<NodeId>> {
        let n = self.node(id)?;
        let mut out = Vec::new();
        for a in n.inputs.iter().chain(std::iter::once(&n.control_in)) {
            for p in self.anchor(*a)?.peers() {
                let owner = self.anchor(*p)?.owner();
                if !out.contains(&owner) {
                    out.push(owner);
                }
            }
        }
        Ok(out)
    }

    // ========================================================================
    // Attributes
    // ========================================================================

    pub fn set_attr(&mut self, node: NodeId, name: impl Into<String>, value: impl Into<AttrValue>) -> Result<()> {
        self.node_mut(node)?.attrs.insert(name.into(), value.into());
        self.generation += 1;
        Ok(())
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Result<Option<&AttrValue>> {
        Ok(self.node(node)?.attr(name))
    }
}
