use snafu::Snafu;

use crate::anchor::{AnchorId, AnchorKind};
use crate::node::NodeId;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Node handle points at a removed or never-allocated slot.
    #[snafu(display("node {node:?} does not exist in this graph"))]
    NodeNotFound { node: NodeId },

    /// Anchor handle points at a removed or never-allocated slot.
    #[snafu(display("anchor {anchor:?} does not exist in this graph"))]
    AnchorNotFound { anchor: AnchorId },

    /// Anchor index is outside the node's declared anchor list.
    #[snafu(display("node {node:?} has {count} {kind:?} anchors, index {index} is out of range"))]
    AnchorIndexOutOfRange { node: NodeId, kind: AnchorKind, index: usize, count: usize },

    /// Attempted to link two anchors whose kinds do not pair up.
    #[snafu(display("cannot link {from_kind:?} anchor to {to_kind:?} anchor"))]
    LinkKindMismatch { from_kind: AnchorKind, to_kind: AnchorKind },

    /// Data input anchors accept exactly one producer.
    #[snafu(display("input anchor {index} of node {node:?} already has a producer"))]
    InputOccupied { node: NodeId, index: usize },

    /// The requested edge does not exist.
    #[snafu(display("no edge between anchors {from:?} and {to:?}"))]
    EdgeNotFound { from: AnchorId, to: AnchorId },

    /// No node with the given name exists.
    #[snafu(display("no node named {name:?} in graph"))]
    NodeNameNotFound { name: String },
}
