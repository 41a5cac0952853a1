//! Directed attributed compute graph for the Axion fusion engine.
//!
//! Nodes and anchors live in arenas and are addressed by stable integer
//! handles ([`NodeId`], [`AnchorId`]). Every connection point of a node is an
//! [`Anchor`]: indexed data inputs/outputs plus one control input and one
//! control output. Peer and owner relations are plain handle lists, so the
//! structure can be walked in both directions without reference cycles.
//!
//! The graph is mutated destructively during rewriting; a monotonically
//! increasing generation counter is bumped on every mutation so consumers can
//! detect stale references to nodes that have since been replaced.

pub mod anchor;
pub mod attr;
pub mod error;
pub mod graph;
pub mod node;

pub use anchor::{Anchor, AnchorId, AnchorKind};
pub use attr::AttrValue;
pub use error::{Error, Result};
pub use graph::Graph;
pub use node::{Node, NodeId};
