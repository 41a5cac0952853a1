//! Graph nodes.

use std::collections::HashMap;

use smallvec::SmallVec;

use crate::anchor::AnchorId;
use crate::attr::AttrValue;

/// Stable handle into a graph's node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Arena slot index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One operator instance in the graph.
///
/// A node owns its anchors for its whole lifetime: the data anchor lists are
/// fixed at creation, and the two control anchors always exist (a control
/// anchor with no peers simply carries no control edges).
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) name: String,
    pub(crate) op_type: String,
    pub(crate) inputs: SmallVec<[AnchorId; 4]>,
    pub(crate) outputs: SmallVec<[AnchorId; 2]>,
    pub(crate) control_in: AnchorId,
    pub(crate) control_out: AnchorId,
    pub(crate) attrs: HashMap<String, AttrValue>,
}

impl Node {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn op_type(&self) -> &str {
        &self.op_type
    }

    /// Data input anchors in declaration order.
    pub fn inputs(&self) -> &[AnchorId] {
        &self.inputs
    }

    /// Data output anchors in declaration order.
    pub fn outputs(&self) -> &[AnchorId] {
        &self.outputs
    }

    pub fn control_in(&self) -> AnchorId {
        self.control_in
    }

    pub fn control_out(&self) -> AnchorId {
        self.control_out
    }

    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attrs.get(name)
    }

    pub fn attrs(&self) -> &HashMap<String, AttrValue> {
        &self.attrs
    }
}
