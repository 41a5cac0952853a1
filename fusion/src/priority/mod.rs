//! Ordering and gating of fusion work.
//!
//! Passes and rules register into a [`FusionCatalog`], split into custom and
//! built-in populations. The plan builder in [`merge`] consults the switch
//! resolver ([`switch`]) to drop disabled items, assigns each survivor a sort
//! key from the configured priority bands, and emits a phase-ordered
//! [`ExecutionPlan`] the orchestrator runs.

pub mod catalog;
pub mod merge;
pub mod switch;

pub use catalog::{CatalogEntry, FusionCatalog};
pub use merge::{build_plan, ExecutionPlan, PlanEntry};
pub use switch::{LicenseGate, OpenLicense};

use std::sync::Arc;

use axion_graph::Graph;

use crate::error::Result;
use crate::pattern::RulePattern;

/// Pipeline phases, in execution order. Phase names double as configuration
/// category keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FusionPhase {
    GraphFusion,
    BufferFusion,
    QuantFusion,
}

impl FusionPhase {
    pub const ALL: [FusionPhase; 3] = [Self::GraphFusion, Self::BufferFusion, Self::QuantFusion];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::GraphFusion => "GraphFusion",
            Self::BufferFusion => "BufferFusion",
            Self::QuantFusion => "QuantFusion",
        }
    }
}

/// What a catalog item is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Pass,
    Rule,
}

/// Which population a catalog item registered through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Custom,
    BuiltIn,
}

/// A whole-graph transformation that is not expressed as a rewrite rule.
pub trait FusionPass: Send + Sync {
    fn name(&self) -> &str;

    fn run(&self, graph: &mut Graph) -> Result<()>;
}

/// The executable payload behind a catalog entry.
#[derive(Clone)]
pub enum ItemPayload {
    Pass(Arc<dyn FusionPass>),
    Rule(Arc<RulePattern>),
}

impl ItemPayload {
    pub fn kind(&self) -> ItemKind {
        match self {
            Self::Pass(_) => ItemKind::Pass,
            Self::Rule(_) => ItemKind::Rule,
        }
    }
}

impl std::fmt::Debug for ItemPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pass(p) => f.debug_tuple("Pass").field(&p.name()).finish(),
            Self::Rule(r) => f.debug_tuple("Rule").field(&r.name()).finish(),
        }
    }
}
