//! Fixpoint rewrite driver.
//!
//! The orchestrator owns a graph, its [`ConnectionMatrix`], and the rewrite
//! statistics. [`run_rule`](Orchestrator::run_rule) drives one rule to its
//! fixpoint; [`run_plan`](Orchestrator::run_plan) executes a whole
//! [`ExecutionPlan`] phase by phase.
//!
//! The replace step itself is pluggable through [`Replacer`], since how a
//! matched region turns into target operations is a backend concern. The
//! orchestrator only requires an honest [`GraphDelta`] back so the matrix
//! can be patched instead of rebuilt.

use axion_graph::{Graph, NodeId};
use tracing::{debug, warn};

use crate::cycle::{filter_matches, ConnectionMatrix};
use crate::error::{Error, Result};
use crate::matcher::{match_pattern, MatchResult};
use crate::pattern::RulePattern;
use crate::priority::{ExecutionPlan, FusionPhase, ItemPayload};
use crate::stats::MatchStats;

/// Nodes a replacement added and removed, so the reachability matrix can be
/// patched in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphDelta {
    pub added: Vec<NodeId>,
    pub removed: Vec<NodeId>,
}

/// Outcome of one replacement attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplaceOutcome {
    /// The region was rewritten; the delta describes the node churn.
    Applied(GraphDelta),
    /// The backend cannot express this rewrite. Not an error: the rule stops
    /// for this graph and the graph is left untouched.
    NotSupported,
}

/// Performs the rewrite for a matched region.
pub trait Replacer {
    fn apply(&mut self, graph: &mut Graph, rule: &RulePattern, m: &MatchResult) -> Result<ReplaceOutcome>;
}

/// What one rule's fixpoint run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleRunReport {
    /// Match-and-apply rounds executed, including the final empty round.
    pub iterations: usize,
    /// Matches found across all rounds, before any filtering.
    pub matches_found: usize,
    /// Matches invalidated by the cycle check.
    pub excluded_by_cycle: usize,
    /// Rewrites actually applied.
    pub applied: usize,
    /// The replacer declined a match; the run stopped early.
    pub stopped_unsupported: bool,
}

/// Owns a graph through one fusion session.
pub struct Orchestrator {
    graph: Graph,
    matrix: ConnectionMatrix,
    stats: MatchStats,
}

impl Orchestrator {
    pub fn new(graph: Graph) -> Result<Self> {
        let matrix = ConnectionMatrix::build(&graph)?;
        Ok(Self { graph, matrix, stats: MatchStats::new() })
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn stats(&self) -> &MatchStats {
        &self.stats
    }

    pub fn into_graph(self) -> Graph {
        self.graph
    }

    /// Run one rule to its fixpoint.
    ///
    /// Each round matches the pattern afresh, filters cycle-unsafe matches,
    /// and applies the survivors in match order. Matches staled by an earlier
    /// application in the same round are skipped, not retried; the next round
    /// picks up whatever is still there. The loop ends when a round finds no
    /// match or applies nothing.
    pub fn run_rule(&mut self, rule: &RulePattern, replacer: &mut dyn Replacer) -> Result<RuleRunReport> {
        let mut report = RuleRunReport::default();
        'rounds: loop {
            report.iterations += 1;
            let mut matches = match_pattern(rule, &self.graph)?;
            report.matches_found += matches.len();
            self.stats.record_found(rule.name(), self.graph.name(), matches.len());
            if matches.is_empty() {
                break;
            }
            if rule.check_cycles() {
                report.excluded_by_cycle += filter_matches(&self.matrix, &self.graph, &mut matches)?;
            }

            let mut applied_this_round = 0;
            for m in &matches {
                if !m.is_valid() || !m.is_applicable(&self.graph) {
                    continue;
                }
                match replacer.apply(&mut self.graph, rule, m)? {
                    ReplaceOutcome::Applied(delta) => {
                        self.matrix.patch(&self.graph, &delta.added, &delta.removed)?;
                        self.stats.record_applied(rule.name(), self.graph.name());
                        report.applied += 1;
                        applied_this_round += 1;
                    }
                    ReplaceOutcome::NotSupported => {
                        report.stopped_unsupported = true;
                        break 'rounds;
                    }
                }
            }
            if applied_this_round == 0 {
                break;
            }
        }
        debug!(
            rule = rule.name(),
            graph = self.graph.name(),
            iterations = report.iterations,
            applied = report.applied,
            excluded = report.excluded_by_cycle,
            "rule run finished"
        );
        Ok(report)
    }

    /// Execute a plan phase by phase.
    ///
    /// Passes run as opaque graph transformations; the matrix is rebuilt
    /// afterwards since a pass reports no delta. A malformed rule is logged
    /// and skipped so one bad rule cannot sink the whole plan; every other
    /// error aborts.
    pub fn run_plan(&mut self, plan: &ExecutionPlan, replacer: &mut dyn Replacer) -> Result<()> {
        for phase in FusionPhase::ALL {
            for entry in plan.phase_entries(phase) {
                match entry.payload() {
                    ItemPayload::Pass(pass) => {
                        debug!(pass = entry.name(), phase = phase.as_str(), "running pass");
                        pass.run(&mut self.graph)?;
                        self.matrix = ConnectionMatrix::build(&self.graph)?;
                    }
                    ItemPayload::Rule(rule) => match self.run_rule(rule, replacer) {
                        Ok(_) => {}
                        Err(Error::MalformedPattern { rule, reason }) => {
                            warn!(rule = %rule, reason = %reason, "skipping malformed rule");
                        }
                        Err(e) => return Err(e),
                    },
                }
            }
        }
        Ok(())
    }
}
