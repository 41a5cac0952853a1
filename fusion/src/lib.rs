//! Rule-driven graph fusion.
//!
//! This crate turns declarative rewrite rules into graph transformations:
//!
//! * [`pattern`] defines the rule templates and their builder,
//! * [`matcher`] enumerates embeddings of a rule in an
//!   [`axion_graph::Graph`],
//! * [`cycle`] keeps rewrites from creating cycles,
//! * [`priority`] decides which rules run and in what order,
//! * [`orchestrator`] drives everything to a fixpoint and collects
//!   [`stats`].
//!
//! The replace step is intentionally not here: backends implement
//! [`Replacer`] and the orchestrator calls out to it per match.

pub mod config;
pub mod cycle;
pub mod error;
pub mod matcher;
pub mod orchestrator;
pub mod pattern;
pub mod priority;
pub mod stats;

pub use config::{FusionConfig, SwitchState};
pub use cycle::ConnectionMatrix;
pub use error::{Error, Result};
pub use matcher::{match_pattern, MatchResult};
pub use orchestrator::{GraphDelta, Orchestrator, ReplaceOutcome, Replacer, RuleRunReport};
pub use pattern::{AttrExpr, PatternBuilder, RulePattern};
pub use priority::{build_plan, ExecutionPlan, FusionCatalog, FusionPass, FusionPhase};
pub use stats::MatchStats;

#[cfg(test)]
pub mod test;
