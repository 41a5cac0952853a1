//! Anchors: the connection points of a node.
//!
//! Every edge in the graph is a pair of peer anchors. Data edges run from a
//! `DataOut` anchor to a `DataIn` anchor; control edges from `ControlOut` to
//! `ControlIn`. A data input holds at most one peer (a single producer), all
//! other anchor kinds hold arbitrarily many.

use smallvec::SmallVec;

use crate::node::NodeId;

/// Stable handle into a graph's anchor arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnchorId(pub(crate) u32);

impl AnchorId {
    /// Arena slot index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Which side and lane of a node an anchor sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnchorKind {
    DataIn,
    DataOut,
    ControlIn,
    ControlOut,
}

impl AnchorKind {
    pub fn is_input(self) -> bool {
        matches!(self, Self::DataIn | Self::ControlIn)
    }

    pub fn is_control(self) -> bool {
        matches!(self, Self::ControlIn | Self::ControlOut)
    }

    /// The kind an anchor of this kind may be linked to.
    pub fn peer_kind(self) -> Self {
        match self {
            Self::DataIn => Self::DataOut,
            Self::DataOut => Self::DataIn,
            Self::ControlIn => Self::ControlOut,
            Self::ControlOut => Self::ControlIn,
        }
    }
}

/// A single connection point. Owner and peers are handles, never references.
#[derive(Debug, Clone)]
pub struct Anchor {
    pub(crate) kind: AnchorKind,
    pub(crate) index: usize,
    pub(crate) owner: NodeId,
    pub(crate) peers: SmallVec<[AnchorId; 2]>,
}

impl Anchor {
    pub(crate) fn new(kind: AnchorKind, index: usize, owner: NodeId) -> Self {
        Self { kind, index, owner, peers: SmallVec::new() }
    }

    pub fn kind(&self) -> AnchorKind {
        self.kind
    }

    /// Position within the owner's anchor list of this kind. Control anchors
    /// always report index 0.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn owner(&self) -> NodeId {
        self.owner
    }

    pub fn peers(&self) -> &[AnchorId] {
        &self.peers
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }
}
