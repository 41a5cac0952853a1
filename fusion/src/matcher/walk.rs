//! One candidate walk: a worklist traversal over (rule-node, graph-node)
//! pairs starting from the seed origin node.
//!
//! The walk binds anchors as it goes and never backtracks: an unbound
//! (`Any`) index is frozen at its first observed value, and every later
//! occurrence must agree. Any structural disagreement aborts the walk; the
//! caller moves on to the next candidate.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use axion_graph::{AnchorId, Graph, NodeId};

use crate::error::Result;
use crate::matcher::{OuterInputBinding, OuterOutputBinding};
use crate::pattern::{AnchorIndex, RuleAnchorId, RuleNodeId, RuleNodeRole, RulePattern};

/// Everything a successful walk hands back to `match_pattern`.
pub(crate) struct WalkOutput {
    pub node_map: BTreeMap<RuleNodeId, NodeId>,
    pub origin_nodes: Vec<NodeId>,
    pub inputs: Vec<OuterInputBinding>,
    pub outputs: Vec<OuterOutputBinding>,
}

pub(crate) struct Walk<'p, 'g> {
    pattern: &'p RulePattern,
    graph: &'g Graph,

    /// Origin and outer-input rule nodes to their graph nodes.
    node_map: BTreeMap<RuleNodeId, NodeId>,
    /// Reverse mapping restricted to origin nodes; enforces injectivity.
    origin_rev: HashMap<NodeId, RuleNodeId>,

    /// Pattern anchor to the graph anchor it bound.
    pat2graph: HashMap<RuleAnchorId, AnchorId>,
    /// Graph anchor back to the first pattern anchor that bound it. Two
    /// pattern anchors may share one graph anchor only when both are owned
    /// by outer-input boundary nodes.
    graph2pat: HashMap<AnchorId, RuleAnchorId>,

    /// Frozen indices for `Any` anchors.
    frozen: HashMap<RuleAnchorId, usize>,
    /// Graph input anchors already paired with a pattern edge.
    used_graph_in: HashSet<AnchorId>,

    inputs: Vec<OuterInputBinding>,
    outputs: BTreeMap<RuleAnchorId, Vec<AnchorId>>,

    queue: VecDeque<RuleNodeId>,
    expanded: HashSet<RuleNodeId>,
}

impl<'p, 'g> Walk<'p, 'g> {
    pub(crate) fn new(pattern: &'p RulePattern, graph: &'g Graph) -> Self {
        Self {
            pattern,
            graph,
            node_map: BTreeMap::new(),
            origin_rev: HashMap::new(),
            pat2graph: HashMap::new(),
            graph2pat: HashMap::new(),
            frozen: HashMap::new(),
            used_graph_in: HashSet::new(),
            inputs: Vec::new(),
            outputs: BTreeMap::new(),
            queue: VecDeque::new(),
            expanded: HashSet::new(),
        }
    }

    /// Run the walk from a seed pair. `Ok(None)` means this candidate does
    /// not embed the pattern.
    pub(crate) fn run(&mut self, seed_rule: RuleNodeId, seed_graph: NodeId) -> Result<Option<WalkOutput>> {
        if !self.bind_origin(seed_rule, seed_graph)? {
            return Ok(None);
        }
        while let Some(rn) = self.queue.pop_front() {
            if !self.expand_origin(rn)? {
                return Ok(None);
            }
        }
        Ok(self.verify())
    }

    // ========================================================================
    // Node binding
    // ========================================================================

    /// Bind an origin rule node to a graph node, checking type membership and
    /// injectivity. Newly bound nodes are queued for expansion.
    fn bind_origin(&mut self, rn: RuleNodeId, gn: NodeId) -> Result<bool> {
        if let Some(&bound) = self.node_map.get(&rn) {
            return Ok(bound == gn);
        }
        if !self.pattern.node(rn).matches_type(self.graph.node(gn)?.op_type()) {
            return Ok(false);
        }
        if self.origin_rev.contains_key(&gn) {
            return Ok(false);
        }
        self.node_map.insert(rn, gn);
        self.origin_rev.insert(gn, rn);
        self.queue.push_back(rn);
        Ok(true)
    }

    /// Bind an outer-input boundary node. Boundary nodes are unconstrained on
    /// type and never expanded; they only need a consistent graph node.
    fn bind_outer_input(&mut self, rn: RuleNodeId, gn: NodeId) -> bool {
        match self.node_map.get(&rn) {
            Some(&bound) => bound == gn,
            None => {
                self.node_map.insert(rn, gn);
                true
            }
        }
    }

    // ========================================================================
    // Anchor bookkeeping
    // ========================================================================

    /// Record a pattern-anchor/graph-anchor binding and enforce consistency:
    /// a pattern anchor always rebinds the same graph anchor, and a graph
    /// anchor is shared only between outer-input pattern anchors.
    fn bind_anchor(&mut self, pa: RuleAnchorId, ga: AnchorId) -> bool {
        if let Some(&bound) = self.pat2graph.get(&pa) {
            return bound == ga;
        }
        if let Some(&other) = self.graph2pat.get(&ga) {
            let both_outer = self.owner_role(pa) == RuleNodeRole::OuterInput
                && self.owner_role(other) == RuleNodeRole::OuterInput;
            if !both_outer {
                return false;
            }
        } else {
            self.graph2pat.insert(ga, pa);
        }
        self.pat2graph.insert(pa, ga);
        true
    }

    /// Declared-index agreement: concrete indices must be equal, an unbound
    /// index is frozen at its first observed value.
    fn freeze(&mut self, pa: RuleAnchorId, actual: usize) -> bool {
        match self.pattern.anchor(pa).index() {
            AnchorIndex::At(i) => i == actual,
            AnchorIndex::Any => match self.frozen.get(&pa) {
                Some(&f) => f == actual,
                None => {
                    self.frozen.insert(pa, actual);
                    true
                }
            },
        }
    }

    /// Whether `actual` is acceptable for the pattern anchor without
    /// committing a freeze.
    fn index_compatible(&self, pa: RuleAnchorId, actual: usize) -> bool {
        match self.pattern.anchor(pa).index() {
            AnchorIndex::At(i) => i == actual,
            AnchorIndex::Any => self.frozen.get(&pa).is_none_or(|f| *f == actual),
        }
    }

    fn owner_role(&self, pa: RuleAnchorId) -> RuleNodeRole {
        self.pattern.node(self.pattern.anchor(pa).owner()).role()
    }

    // ========================================================================
    // Origin expansion
    // ========================================================================

    /// Match every declared anchor of an origin node against its graph
    /// counterpart, successors first, then predecessors. Undeclared graph
    /// anchors must be idle: an origin node may not connect to the
    /// ungoverned rest of the graph outside its declared anchors.
    fn expand_origin(&mut self, rn: RuleNodeId) -> Result<bool> {
        if !self.expanded.insert(rn) {
            return Ok(true);
        }
        let gn = self.node_map[&rn];
        let node = self.pattern.node(rn);
        let gnode = self.graph.node(gn)?;

        // Successors.
        for &ra in node.outputs() {
            if !self.match_out_anchor(gn, ra)? {
                return Ok(false);
            }
        }
        for &ga in gnode.outputs() {
            if !self.graph2pat.contains_key(&ga) && !self.graph.peers(ga)?.is_empty() {
                return Ok(false);
            }
        }
        let g_cout = gnode.control_out();
        let has_graph_cout = !self.graph.peers(g_cout)?.is_empty();
        match (node.control_out(), has_graph_cout) {
            (Some(ra), true) => {
                if !self.match_control_out(ra, g_cout)? {
                    return Ok(false);
                }
            }
            (None, false) => {}
            // A control anchor is present in the pattern iff the graph
            // control anchor has at least one peer.
            _ => return Ok(false),
        }

        // Predecessors.
        for &ra in node.inputs() {
            if !self.match_in_anchor(gn, ra)? {
                return Ok(false);
            }
        }
        for &ga in gnode.inputs() {
            if !self.used_graph_in.contains(&ga) && self.graph.producer(ga)?.is_some() {
                return Ok(false);
            }
        }
        let g_cin = gnode.control_in();
        let has_graph_cin = !self.graph.peers(g_cin)?.is_empty();
        match (node.control_in(), has_graph_cin) {
            (Some(ra), true) => {
                if !self.match_control_in(ra, g_cin)? {
                    return Ok(false);
                }
            }
            (None, false) => {}
            _ => return Ok(false),
        }

        Ok(true)
    }

    /// Resolve the graph output anchor for a pattern output anchor of `gn`.
    fn resolve_out(&mut self, gn: NodeId, ra: RuleAnchorId) -> Result<Option<AnchorId>> {
        if let Some(&ga) = self.pat2graph.get(&ra) {
            return Ok(Some(ga));
        }
        let gnode = self.graph.node(gn)?;
        let idx = match self.pattern.anchor(ra).index() {
            AnchorIndex::At(i) => Some(i),
            AnchorIndex::Any => self.frozen.get(&ra).copied(),
        };
        let ga = match idx {
            Some(i) => match gnode.outputs().get(i) {
                Some(&a) => a,
                None => return Ok(None),
            },
            // Unbound and unfrozen: take the first output anchor no pattern
            // anchor has claimed yet; the index freezes below.
            None => match gnode.outputs().iter().find(|a| !self.graph2pat.contains_key(*a)) {
                Some(&a) => a,
                None => return Ok(None),
            },
        };
        Ok(Some(ga))
    }

    /// Match one declared output anchor of an origin node: bind the graph
    /// anchor, then pair the pattern's peer anchors with the graph peers.
    ///
    /// Peer counts must agree exactly, with one exception: extra graph-side
    /// peers are tolerated when the pattern side reaches an outer-output
    /// boundary through this anchor; those unmatched peers become additional
    /// outer-output bindings instead of failures.
    fn match_out_anchor(&mut self, gn: NodeId, ra: RuleAnchorId) -> Result<bool> {
        let Some(ga) = self.resolve_out(gn, ra)? else {
            return Ok(false);
        };
        if !self.bind_anchor(ra, ga) || !self.freeze(ra, self.graph.anchor(ga)?.index()) {
            return Ok(false);
        }

        let ppeers: Vec<RuleAnchorId> = self.pattern.anchor(ra).peers().to_vec();
        let gpeers: Vec<AnchorId> = self.graph.peers(ga)?.to_vec();
        let mut used = vec![false; gpeers.len()];
        let mut boundary_peers: Vec<RuleAnchorId> = Vec::new();

        for pp in ppeers {
            match self.owner_role(pp) {
                RuleNodeRole::OuterOutput => boundary_peers.push(pp),
                RuleNodeRole::Origin => {
                    if !self.pair_origin_consumer(pp, &gpeers, &mut used)? {
                        return Ok(false);
                    }
                }
                // An origin output never feeds outer-input or replacement
                // nodes in a well-formed pattern; discard the candidate.
                _ => return Ok(false),
            }
        }

        let leftovers: Vec<AnchorId> =
            gpeers.iter().zip(&used).filter(|(_, u)| !**u).map(|(g, _)| *g).collect();

        if boundary_peers.is_empty() {
            return Ok(leftovers.is_empty());
        }
        if leftovers.len() < boundary_peers.len() {
            // A declared escape to the outside needs at least one consumer.
            return Ok(false);
        }
        let mut taken = vec![false; leftovers.len()];
        // Concrete-index boundary anchors claim a matching consumer first, so
        // positional order cannot hand their consumer to an unbound anchor.
        for &bp in &boundary_peers {
            let AnchorIndex::At(i) = self.pattern.anchor(bp).index() else {
                continue;
            };
            let mut found = false;
            for (k, &gp) in leftovers.iter().enumerate() {
                if !taken[k] && self.graph.anchor(gp)?.index() == i {
                    taken[k] = true;
                    self.used_graph_in.insert(gp);
                    self.outputs.entry(bp).or_default().push(gp);
                    found = true;
                    break;
                }
            }
            if !found {
                return Ok(false);
            }
        }
        for &bp in &boundary_peers {
            if self.pattern.anchor(bp).index() != AnchorIndex::Any {
                continue;
            }
            // The count check above guarantees a free consumer remains.
            let Some(k) = taken.iter().position(|t| !*t) else {
                return Ok(false);
            };
            taken[k] = true;
            self.used_graph_in.insert(leftovers[k]);
            self.outputs.entry(bp).or_default().push(leftovers[k]);
        }
        // Remaining fan-out is recorded against the first boundary anchor.
        for (k, &gp) in leftovers.iter().enumerate() {
            if !taken[k] {
                self.used_graph_in.insert(gp);
                self.outputs.entry(boundary_peers[0]).or_default().push(gp);
            }
        }
        Ok(true)
    }

    /// Find a graph peer for an origin-owned consumer anchor and bind the
    /// consumer node. First structurally feasible graph peer wins.
    fn pair_origin_consumer(&mut self, pp: RuleAnchorId, gpeers: &[AnchorId], used: &mut [bool]) -> Result<bool> {
        let owner = self.pattern.anchor(pp).owner();
        for (k, &gp) in gpeers.iter().enumerate() {
            if used[k] {
                continue;
            }
            let ganchor = self.graph.anchor(gp)?;
            if !self.index_compatible(pp, ganchor.index()) {
                continue;
            }
            let gowner = ganchor.owner();
            match self.node_map.get(&owner) {
                Some(&bound) if bound != gowner => continue,
                Some(_) => {}
                None => {
                    if !self.pattern.node(owner).matches_type(self.graph.node(gowner)?.op_type())
                        || self.origin_rev.contains_key(&gowner)
                    {
                        continue;
                    }
                }
            }
            used[k] = true;
            if !self.bind_anchor(pp, gp) || !self.freeze(pp, ganchor.index()) {
                return Ok(false);
            }
            self.used_graph_in.insert(gp);
            return self.bind_origin(owner, gowner);
        }
        Ok(false)
    }

    /// Match one declared input anchor of an origin node against the graph,
    /// walking the producer edge backwards.
    fn match_in_anchor(&mut self, gn: NodeId, ra: RuleAnchorId) -> Result<bool> {
        let ga = match self.pat2graph.get(&ra) {
            Some(&g) => g,
            None => {
                let gnode = self.graph.node(gn)?;
                let idx = match self.pattern.anchor(ra).index() {
                    AnchorIndex::At(i) => Some(i),
                    AnchorIndex::Any => self.frozen.get(&ra).copied(),
                };
                match idx {
                    Some(i) => match gnode.inputs().get(i) {
                        Some(&a) => a,
                        None => return Ok(false),
                    },
                    None => {
                        match gnode.inputs().iter().find(|a| !self.used_graph_in.contains(*a)) {
                            Some(&a) => a,
                            None => return Ok(false),
                        }
                    }
                }
            }
        };
        if !self.bind_anchor(ra, ga) || !self.freeze(ra, self.graph.anchor(ga)?.index()) {
            return Ok(false);
        }
        self.used_graph_in.insert(ga);

        // Data inputs carry at most one peer on both sides; counts must agree.
        let ppeer = self.pattern.anchor(ra).peers().first().copied();
        let gpeer = self.graph.producer(ga)?;
        match (ppeer, gpeer) {
            (None, None) => Ok(true),
            (Some(pp), Some(gp)) => self.pair_producer(pp, ra, ga, gp),
            _ => Ok(false),
        }
    }

    /// Bind the producer side of an input edge: either another origin node
    /// (walk continues) or an outer-input boundary (binding recorded).
    fn pair_producer(&mut self, pp: RuleAnchorId, ra: RuleAnchorId, ga: AnchorId, gp: AnchorId) -> Result<bool> {
        let ganchor = self.graph.anchor(gp)?;
        if !self.index_compatible(pp, ganchor.index()) {
            return Ok(false);
        }
        let owner = self.pattern.anchor(pp).owner();
        match self.pattern.node(owner).role() {
            RuleNodeRole::Origin => {
                if !self.bind_anchor(pp, gp) || !self.freeze(pp, ganchor.index()) {
                    return Ok(false);
                }
                self.bind_origin(owner, ganchor.owner())
            }
            RuleNodeRole::OuterInput => {
                if !self.bind_anchor(pp, gp) || !self.freeze(pp, ganchor.index()) {
                    return Ok(false);
                }
                if !self.bind_outer_input(owner, ganchor.owner()) {
                    return Ok(false);
                }
                self.inputs.push(OuterInputBinding {
                    rule_src: pp,
                    rule_dst: ra,
                    graph_in: ga,
                    origin_peer: Some(gp),
                });
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Match an origin node's control output. Same pairing discipline as data
    /// outputs, minus index handling (control anchors are unindexed).
    fn match_control_out(&mut self, ra: RuleAnchorId, ga: AnchorId) -> Result<bool> {
        if !self.bind_anchor(ra, ga) {
            return Ok(false);
        }
        let ppeers: Vec<RuleAnchorId> = self.pattern.anchor(ra).peers().to_vec();
        let gpeers: Vec<AnchorId> = self.graph.peers(ga)?.to_vec();
        let mut used = vec![false; gpeers.len()];
        let mut boundary_peers: Vec<RuleAnchorId> = Vec::new();

        for pp in ppeers {
            match self.owner_role(pp) {
                RuleNodeRole::OuterOutput => boundary_peers.push(pp),
                RuleNodeRole::Origin => {
                    if !self.pair_origin_consumer(pp, &gpeers, &mut used)? {
                        return Ok(false);
                    }
                }
                _ => return Ok(false),
            }
        }

        let leftovers: Vec<AnchorId> =
            gpeers.iter().zip(&used).filter(|(_, u)| !**u).map(|(g, _)| *g).collect();
        if boundary_peers.is_empty() {
            return Ok(leftovers.is_empty());
        }
        if leftovers.len() < boundary_peers.len() {
            return Ok(false);
        }
        for (bp, gp) in boundary_peers.iter().zip(&leftovers) {
            self.outputs.entry(*bp).or_default().push(*gp);
        }
        for gp in &leftovers[boundary_peers.len()..] {
            self.outputs.entry(boundary_peers[0]).or_default().push(*gp);
        }
        Ok(true)
    }

    /// Match an origin node's control input: every pattern peer needs a
    /// distinct graph peer and no graph peer may be left over.
    fn match_control_in(&mut self, ra: RuleAnchorId, ga: AnchorId) -> Result<bool> {
        if !self.bind_anchor(ra, ga) {
            return Ok(false);
        }
        let ppeers: Vec<RuleAnchorId> = self.pattern.anchor(ra).peers().to_vec();
        let gpeers: Vec<AnchorId> = self.graph.peers(ga)?.to_vec();
        if ppeers.len() != gpeers.len() {
            return Ok(false);
        }
        let mut used = vec![false; gpeers.len()];

        for pp in ppeers {
            let owner = self.pattern.anchor(pp).owner();
            let role = self.pattern.node(owner).role();
            let mut found = false;
            for (k, &gp) in gpeers.iter().enumerate() {
                if used[k] {
                    continue;
                }
                let gowner = self.graph.anchor(gp)?.owner();
                let feasible = match role {
                    RuleNodeRole::Origin => match self.node_map.get(&owner) {
                        Some(&bound) => bound == gowner,
                        None => {
                            self.pattern.node(owner).matches_type(self.graph.node(gowner)?.op_type())
                                && !self.origin_rev.contains_key(&gowner)
                        }
                    },
                    RuleNodeRole::OuterInput => true,
                    _ => false,
                };
                if !feasible {
                    continue;
                }
                used[k] = true;
                if !self.bind_anchor(pp, gp) {
                    return Ok(false);
                }
                match role {
                    RuleNodeRole::Origin => {
                        if !self.bind_origin(owner, gowner)? {
                            return Ok(false);
                        }
                    }
                    RuleNodeRole::OuterInput => {
                        if !self.bind_outer_input(owner, gowner) {
                            return Ok(false);
                        }
                        self.inputs.push(OuterInputBinding {
                            rule_src: pp,
                            rule_dst: ra,
                            graph_in: ga,
                            origin_peer: Some(gp),
                        });
                    }
                    _ => return Ok(false),
                }
                found = true;
                break;
            }
            if !found {
                return Ok(false);
            }
        }
        Ok(true)
    }

    // ========================================================================
    // Verification
    // ========================================================================

    /// After the queue drains: the origin mapping must be total, and the
    /// recorded bindings must cover every boundary anchor of the pattern,
    /// counted by pattern-anchor identity, not by underlying graph anchor.
    fn verify(&mut self) -> Option<WalkOutput> {
        for &o in self.pattern.origins() {
            if !self.node_map.contains_key(&o) {
                return None;
            }
        }
        if self.inputs.len() != self.pattern.outer_input_anchor_count() {
            return None;
        }
        if self.outputs.len() != self.pattern.outer_output_anchor_count() {
            return None;
        }

        let origin_nodes = self.pattern.origins().iter().map(|o| self.node_map[o]).collect();
        let outputs = std::mem::take(&mut self.outputs)
            .into_iter()
            .map(|(rule_anchor, graph_anchors)| OuterOutputBinding { rule_anchor, graph_anchors })
            .collect();
        Some(WalkOutput {
            node_map: std::mem::take(&mut self.node_map),
            origin_nodes,
            inputs: std::mem::take(&mut self.inputs),
            outputs,
        })
    }
}
