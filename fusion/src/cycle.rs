//! Cycle safety for fusion rewrites.
//!
//! Fusing a matched region collapses several nodes into one; if some outside
//! node sits both downstream and upstream of the region, the collapse would
//! create a cycle. [`ConnectionMatrix`] keeps full transitive reachability as
//! a bitset per node slot so that check is a couple of row scans instead of a
//! graph traversal per match.
//!
//! The matrix is built once per pass over a graph and patched incrementally
//! after each applied rewrite. Rows are indexed by node slot; tombstoned
//! slots keep an empty row.

use std::collections::VecDeque;

use axion_graph::{Graph, NodeId};

use crate::error::Result;
use crate::matcher::MatchResult;

const WORD_BITS: usize = u64::BITS as usize;

/// Transitive reachability over a graph's node slots.
///
/// `reachable(a, b)` holds iff there is a path of one or more data or control
/// edges from `a` to `b`. A node does not reach itself unless it sits on a
/// cycle.
#[derive(Debug, Clone)]
pub struct ConnectionMatrix {
    /// Words per row.
    stride: usize,
    /// `slots * stride` words, row-major.
    rows: Vec<u64>,
    slots: usize,
}

impl ConnectionMatrix {
    /// Build the matrix from scratch.
    ///
    /// Nodes are processed in reverse topological order, so one sweep settles
    /// a DAG; a graph that already contains cycles converges after extra
    /// sweeps instead of producing a wrong answer.
    pub fn build(graph: &Graph) -> Result<Self> {
        let slots = graph.node_slots();
        let stride = slots.div_ceil(WORD_BITS).max(1);
        let mut matrix = Self { stride, rows: vec![0; slots * stride], slots };

        let order = reverse_topological(graph)?;
        loop {
            let mut changed = false;
            for &n in &order {
                changed |= matrix.refresh_row(graph, n)?;
            }
            if !changed {
                break;
            }
        }
        Ok(matrix)
    }

    /// Whether `from` reaches `to` through at least one edge.
    pub fn reachable(&self, from: NodeId, to: NodeId) -> bool {
        let (word, mask) = self.locate(to);
        self.row(from).get(word).is_some_and(|w| w & mask != 0)
    }

    /// Whether collapsing `group` into a single node would create a cycle:
    /// some node outside the group is reachable from the group and reaches
    /// back into it.
    pub fn would_cycle(&self, graph: &Graph, group: &[NodeId]) -> Result<bool> {
        // Union of everything the group reaches.
        let mut downstream = vec![0u64; self.stride];
        for &g in group {
            for (acc, w) in downstream.iter_mut().zip(self.row(g)) {
                *acc |= *w;
            }
        }
        let mut member = vec![0u64; self.stride];
        for &g in group {
            let (word, mask) = self.locate(g);
            if let Some(m) = member.get_mut(word) {
                *m |= mask;
            }
        }

        // Slots past the matrix read as unreachable, so a caller holding a
        // stale matrix gets a conservative answer instead of a panic.
        for n in graph.nodes() {
            let (word, mask) = self.locate(n);
            if member.get(word).is_some_and(|m| m & mask != 0) {
                continue;
            }
            if !downstream.get(word).is_some_and(|w| w & mask != 0) {
                continue;
            }
            // n is strictly downstream of the group; a path back in closes
            // the loop.
            if self.row(n).iter().zip(&member).any(|(w, m)| w & m != 0) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Patch the matrix after a rewrite removed and added nodes.
    ///
    /// Removed slots are cleared as rows and as columns. Added rows are
    /// computed from their successors, then pushed upstream to every node
    /// that reaches a predecessor of an added node. Iterates to a fixpoint so
    /// chains of added nodes settle regardless of order.
    pub fn patch(&mut self, graph: &Graph, added: &[NodeId], removed: &[NodeId]) -> Result<()> {
        if graph.node_slots() > self.slots {
            self.grow(graph.node_slots());
        }

        for &r in removed {
            let start = r.index() * self.stride;
            self.rows[start..start + self.stride].fill(0);
        }
        let mut removed_mask = vec![0u64; self.stride];
        for &r in removed {
            let (word, mask) = self.locate(r);
            removed_mask[word] |= mask;
        }
        for row in self.rows.chunks_mut(self.stride) {
            for (w, m) in row.iter_mut().zip(&removed_mask) {
                *w &= !*m;
            }
        }

        loop {
            let mut changed = false;
            for &a in added {
                changed |= self.refresh_row(graph, a)?;
            }
            // Upstream propagation: anything reaching a predecessor of an
            // added node now also reaches the added node and its downstream.
            for &a in added {
                let mut closure = self.row(a).to_vec();
                let (word, mask) = self.locate(a);
                closure[word] |= mask;

                for p in graph.predecessors(a)? {
                    for n in graph.nodes() {
                        if n != p && !self.reachable(n, p) {
                            continue;
                        }
                        let start = n.index() * self.stride;
                        for (w, c) in self.rows[start..start + self.stride].iter_mut().zip(&closure) {
                            if *w | *c != *w {
                                *w |= *c;
                                changed = true;
                            }
                        }
                    }
                }
            }
            if !changed {
                break;
            }
        }
        Ok(())
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// A node's reachability row; empty for slots beyond the matrix.
    fn row(&self, n: NodeId) -> &[u64] {
        let start = n.index() * self.stride;
        self.rows.get(start..start + self.stride).unwrap_or(&[])
    }

    fn locate(&self, n: NodeId) -> (usize, u64) {
        (n.index() / WORD_BITS, 1u64 << (n.index() % WORD_BITS))
    }

    /// Recompute one row as the union of its successors' closures. Returns
    /// whether the row changed.
    fn refresh_row(&mut self, graph: &Graph, n: NodeId) -> Result<bool> {
        let mut new_row = vec![0u64; self.stride];
        for s in graph.successors(n)? {
            let (word, mask) = self.locate(s);
            new_row[word] |= mask;
            for (acc, w) in new_row.iter_mut().zip(self.row(s)) {
                *acc |= *w;
            }
        }
        let start = n.index() * self.stride;
        let current = &mut self.rows[start..start + self.stride];
        if current == new_row.as_slice() {
            return Ok(false);
        }
        current.copy_from_slice(&new_row);
        Ok(true)
    }

    fn grow(&mut self, slots: usize) {
        let stride = slots.div_ceil(WORD_BITS).max(1);
        let mut rows = vec![0u64; slots * stride];
        for i in 0..self.slots {
            let src = i * self.stride;
            let dst = i * stride;
            rows[dst..dst + self.stride].copy_from_slice(&self.rows[src..src + self.stride]);
        }
        self.stride = stride;
        self.rows = rows;
        self.slots = slots;
    }
}

/// Invalidate every match whose application would create a cycle. Returns the
/// number of matches excluded.
pub fn filter_matches(matrix: &ConnectionMatrix, graph: &Graph, matches: &mut [MatchResult]) -> Result<usize> {
    let mut excluded = 0;
    for m in matches.iter_mut() {
        if !m.is_valid() {
            continue;
        }
        if matrix.would_cycle(graph, m.origin_nodes())? {
            m.invalidate();
            excluded += 1;
        }
    }
    if excluded > 0 {
        tracing::debug!(graph = graph.name(), excluded, "matches excluded by cycle check");
    }
    Ok(excluded)
}

/// Alive nodes, sinks first. Cycle members that never reach in-degree zero
/// are appended at the end in insertion order.
fn reverse_topological(graph: &Graph) -> Result<Vec<NodeId>> {
    let slots = graph.node_slots();
    let mut in_degree = vec![0usize; slots];
    let mut alive = vec![false; slots];
    for n in graph.nodes() {
        alive[n.index()] = true;
        in_degree[n.index()] = graph.predecessors(n)?.len();
    }

    let mut queue: VecDeque<NodeId> = graph.nodes().filter(|n| in_degree[n.index()] == 0).collect();
    let mut order = Vec::with_capacity(graph.node_count());
    let mut seen = vec![false; slots];
    while let Some(n) = queue.pop_front() {
        seen[n.index()] = true;
        order.push(n);
        for s in graph.successors(n)? {
            in_degree[s.index()] -= 1;
            if in_degree[s.index()] == 0 {
                queue.push_back(s);
            }
        }
    }
    for n in graph.nodes() {
        if !seen[n.index()] {
            order.push(n);
        }
    }
    order.reverse();
    Ok(order)
}
