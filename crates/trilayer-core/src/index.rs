//! # Graph Index
//!
//! A directed multigraph mirroring the entity records of a
//! [`UniversalGraph`], used purely for traversal.
//!
//! The index is derived: it is rebuilt from the records on first read after
//! any mutation and is never mutated from outside. One node exists per
//! `(layer, id)`; edges are:
//!
//! | Relation       | From     | To       | Source record                          |
//! |----------------|----------|----------|----------------------------------------|
//! | `Performs`     | Form     | Function | performs links                         |
//! | `HasFailure`   | Function | Failure  | `FailureMode::affects_functions`       |
//! | `HasFailure`   | Form     | Failure  | `FailureMode::affects_forms`           |
//! | `FunctionFlow` | Function | Function | one edge per `FunctionBranch`          |
//! | `PropagatesTo` | Failure  | Failure  | `FailureMode::propagates_to`           |
//!
//! Neighbor queries return unique nodes in index order; degree counts
//! parallel edges.

use crate::graph::UniversalGraph;
use crate::types::TrilayerError;
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;
use std::collections::{BTreeMap, VecDeque};
use std::sync::OnceLock;

// =============================================================================
// NODE & EDGE LABELS
// =============================================================================

/// The three layers of the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Layer {
    Form,
    Function,
    Failure,
}

/// Node label: which layer, which id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeKey {
    pub layer: Layer,
    pub id: String,
}

/// Edge label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    Performs,
    HasFailure,
    FunctionFlow,
    PropagatesTo,
}

/// One node reached by [`GraphIndex::bfs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visit {
    pub node: NodeIndex,
    /// Hops from the start node.
    pub depth: usize,
    /// Node this one was discovered from; `None` for the start node.
    pub parent: Option<NodeIndex>,
}

// =============================================================================
// GRAPH INDEX
// =============================================================================

/// Traversal index over all three layers.
#[derive(Debug, Clone, Default)]
pub struct GraphIndex {
    graph: DiGraph<NodeKey, Relation>,
    lookup: BTreeMap<Layer, BTreeMap<String, NodeIndex>>,
    betweenness: OnceLock<Vec<f64>>,
}

impl GraphIndex {
    /// Derive the index from the entity records of a graph.
    ///
    /// Nodes are inserted layer by layer in id order, so node indices (and
    /// every ordering built on them) are deterministic.
    #[must_use]
    pub fn build(source: &UniversalGraph) -> Self {
        let mut index = Self::default();

        for id in source.form_elements().keys() {
            index.insert_node(Layer::Form, id.as_str());
        }
        for id in source.functions().keys() {
            index.insert_node(Layer::Function, id.as_str());
        }
        for id in source.failure_modes().keys() {
            index.insert_node(Layer::Failure, id.as_str());
        }

        for (form, function) in source.performs() {
            index.connect(
                (Layer::Form, form.as_str()),
                (Layer::Function, function.as_str()),
                Relation::Performs,
            );
        }

        for (id, failure) in source.failure_modes() {
            let this = (Layer::Failure, id.as_str());
            for function in &failure.affects_functions {
                index.connect((Layer::Function, function.as_str()), this, Relation::HasFailure);
            }
            for form in &failure.affects_forms {
                index.connect((Layer::Form, form.as_str()), this, Relation::HasFailure);
            }
            for target in &failure.propagates_to {
                index.connect(this, (Layer::Failure, target.as_str()), Relation::PropagatesTo);
            }
        }

        for branch in source.function_branches() {
            index.connect(
                (Layer::Function, branch.source.as_str()),
                (Layer::Function, branch.target.as_str()),
                Relation::FunctionFlow,
            );
        }

        index
    }

    fn insert_node(&mut self, layer: Layer, id: &str) {
        let key = NodeKey {
            layer,
            id: id.to_string(),
        };
        let idx = self.graph.add_node(key);
        self.lookup
            .entry(layer)
            .or_default()
            .insert(id.to_string(), idx);
    }

    fn connect(&mut self, from: (Layer, &str), to: (Layer, &str), relation: Relation) {
        if let (Some(a), Some(b)) = (self.node(from.0, from.1), self.node(to.0, to.1)) {
            self.graph.add_edge(a, b, relation);
        }
    }

    // =========================================================================
    // LOOKUP
    // =========================================================================

    /// Number of nodes across all layers.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of edges, parallel edges included.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Node of an entity, if it exists.
    #[must_use]
    pub fn node(&self, layer: Layer, id: &str) -> Option<NodeIndex> {
        self.lookup.get(&layer)?.get(id).copied()
    }

    /// Label of a node.
    #[must_use]
    pub fn key(&self, node: NodeIndex) -> Option<&NodeKey> {
        self.graph.node_weight(node)
    }

    /// All nodes of one layer, in id order.
    pub fn layer_nodes(&self, layer: Layer) -> impl Iterator<Item = (&str, NodeIndex)> {
        self.lookup
            .get(&layer)
            .into_iter()
            .flat_map(|m| m.iter().map(|(id, idx)| (id.as_str(), *idx)))
    }

    // =========================================================================
    // NEIGHBORHOOD
    // =========================================================================

    /// Unique neighbors of a node in one direction, optionally filtered by
    /// relation, in index order.
    #[must_use]
    pub fn neighbors(
        &self,
        node: NodeIndex,
        direction: Direction,
        relation: Option<Relation>,
    ) -> Vec<NodeIndex> {
        let mut out: Vec<NodeIndex> = self
            .graph
            .edges_directed(node, direction)
            .filter(|e| relation.is_none_or(|r| *e.weight() == r))
            .map(|e| match direction {
                Direction::Outgoing => e.target(),
                Direction::Incoming => e.source(),
            })
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Unique successors, optionally filtered by relation.
    #[must_use]
    pub fn successors(&self, node: NodeIndex, relation: Option<Relation>) -> Vec<NodeIndex> {
        self.neighbors(node, Direction::Outgoing, relation)
    }

    /// Unique predecessors, optionally filtered by relation.
    #[must_use]
    pub fn predecessors(&self, node: NodeIndex, relation: Option<Relation>) -> Vec<NodeIndex> {
        self.neighbors(node, Direction::Incoming, relation)
    }

    /// Ids one hop away from an entity along a relation.
    ///
    /// Unknown entities have no neighbors.
    #[must_use]
    pub fn neighbor_ids(
        &self,
        layer: Layer,
        id: &str,
        direction: Direction,
        relation: Relation,
    ) -> Vec<&str> {
        let Some(node) = self.node(layer, id) else {
            return Vec::new();
        };
        self.neighbors(node, direction, Some(relation))
            .into_iter()
            .filter_map(|n| self.key(n).map(|k| k.id.as_str()))
            .collect()
    }

    /// In-degree plus out-degree, counting parallel edges.
    #[must_use]
    pub fn degree(&self, node: NodeIndex) -> usize {
        self.graph.edges_directed(node, Direction::Outgoing).count()
            + self.graph.edges_directed(node, Direction::Incoming).count()
    }

    // =========================================================================
    // TRAVERSAL
    // =========================================================================

    /// Breadth-first traversal from `start`, start node included.
    ///
    /// Neighbors are expanded in index order. `max_depth` bounds the hop
    /// count of reported nodes.
    #[must_use]
    pub fn bfs(
        &self,
        start: NodeIndex,
        direction: Direction,
        relation: Option<Relation>,
        max_depth: Option<usize>,
    ) -> Vec<Visit> {
        let mut seen = vec![false; self.graph.node_count()];
        let Some(slot) = seen.get_mut(start.index()) else {
            return Vec::new();
        };
        *slot = true;

        let mut order = vec![Visit {
            node: start,
            depth: 0,
            parent: None,
        }];
        let mut queue = VecDeque::from([(start, 0usize)]);

        while let Some((current, depth)) = queue.pop_front() {
            if max_depth.is_some_and(|limit| depth >= limit) {
                continue;
            }
            for next in self.neighbors(current, direction, relation) {
                if seen[next.index()] {
                    continue;
                }
                seen[next.index()] = true;
                order.push(Visit {
                    node: next,
                    depth: depth + 1,
                    parent: Some(current),
                });
                queue.push_back((next, depth + 1));
            }
        }

        order
    }

    /// All simple paths from `from` to `to` along one relation with at most
    /// `max_hops` edges.
    ///
    /// Parallel edges collapse into a single path. Every path found consumes
    /// one unit of `budget`; the search stops when it reaches zero.
    #[must_use]
    pub fn simple_paths(
        &self,
        from: NodeIndex,
        to: NodeIndex,
        relation: Relation,
        max_hops: usize,
        budget: &mut usize,
    ) -> Vec<Vec<NodeIndex>> {
        let n = self.graph.node_count();
        if from == to || max_hops == 0 || from.index() >= n || to.index() >= n {
            return Vec::new();
        }

        let mut on_path = vec![false; n];
        on_path[from.index()] = true;

        let mut walk = PathWalk {
            index: self,
            target: to,
            relation,
            max_hops,
            path: vec![from],
            on_path,
            budget,
            found: Vec::new(),
        };
        walk.extend(from);
        walk.found
    }

    // =========================================================================
    // CENTRALITY
    // =========================================================================

    /// Degree centrality: degree / max(1, n − 1), indexed by node.
    #[must_use]
    pub fn degree_centrality(&self) -> Vec<f64> {
        let denom = self.graph.node_count().saturating_sub(1).max(1) as f64;
        self.graph
            .node_indices()
            .map(|n| self.degree(n) as f64 / denom)
            .collect()
    }

    /// Normalized betweenness centrality, indexed by node.
    ///
    /// Brandes over unique successors, scaled by 1 / ((n − 1)(n − 2)) when
    /// n > 2. Computed once per index.
    pub fn betweenness(&self) -> Result<&[f64], TrilayerError> {
        if self.graph.node_count() == 0 {
            return Err(TrilayerError::TraversalFailed(
                "betweenness is undefined on an empty graph".to_string(),
            ));
        }
        Ok(self
            .betweenness
            .get_or_init(|| self.compute_betweenness())
            .as_slice())
    }

    fn compute_betweenness(&self) -> Vec<f64> {
        let n = self.graph.node_count();
        let adjacency: Vec<Vec<usize>> = self
            .graph
            .node_indices()
            .map(|v| {
                self.successors(v, None)
                    .into_iter()
                    .map(NodeIndex::index)
                    .filter(|&w| w != v.index())
                    .collect()
            })
            .collect();

        let mut centrality = vec![0.0; n];
        for s in 0..n {
            let mut stack = Vec::with_capacity(n);
            let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
            let mut sigma = vec![0.0_f64; n];
            let mut dist: Vec<Option<usize>> = vec![None; n];
            sigma[s] = 1.0;
            dist[s] = Some(0);

            let mut queue = VecDeque::from([s]);
            while let Some(v) = queue.pop_front() {
                stack.push(v);
                let Some(dv) = dist[v] else { continue };
                for &w in &adjacency[v] {
                    if dist[w].is_none() {
                        dist[w] = Some(dv + 1);
                        queue.push_back(w);
                    }
                    if dist[w] == Some(dv + 1) {
                        sigma[w] += sigma[v];
                        preds[w].push(v);
                    }
                }
            }

            let mut delta = vec![0.0_f64; n];
            while let Some(w) = stack.pop() {
                for &v in &preds[w] {
                    delta[v] += sigma[v] / sigma[w] * (1.0 + delta[w]);
                }
                if w != s {
                    centrality[w] += delta[w];
                }
            }
        }

        if n > 2 {
            let scale = 1.0 / ((n - 1) * (n - 2)) as f64;
            for c in &mut centrality {
                *c *= scale;
            }
        }
        centrality
    }

    /// Closeness centrality over incoming distances, indexed by node.
    ///
    /// `(r − 1) / Σd × (r − 1) / (n − 1)` where `r` counts nodes that reach
    /// this one (itself included). Nodes nothing reaches score 0.
    #[must_use]
    pub fn closeness(&self) -> Vec<f64> {
        let n = self.graph.node_count();
        self.graph
            .node_indices()
            .map(|v| {
                let visits = self.bfs(v, Direction::Incoming, None, None);
                let total: usize = visits.iter().map(|visit| visit.depth).sum();
                if total == 0 || n < 2 {
                    return 0.0;
                }
                let reached = (visits.len() - 1) as f64;
                (reached / total as f64) * (reached / (n - 1) as f64)
            })
            .collect()
    }

    // =========================================================================
    // CONNECTIVITY
    // =========================================================================

    /// Weakly connected components, each in index order, ordered by their
    /// first node.
    #[must_use]
    pub fn weak_components(&self) -> Vec<Vec<NodeIndex>> {
        let n = self.graph.node_count();
        let mut sets = UnionFind::<usize>::new(n);
        for edge in self.graph.edge_references() {
            sets.union(edge.source().index(), edge.target().index());
        }

        let mut groups: BTreeMap<usize, Vec<NodeIndex>> = BTreeMap::new();
        for node in self.graph.node_indices() {
            groups
                .entry(sets.find(node.index()))
                .or_default()
                .push(node);
        }

        let mut components: Vec<Vec<NodeIndex>> = groups.into_values().collect();
        components.sort_by_key(|c| c.first().copied());
        components
    }

    /// Edge density `m / (n (n − 1))`; 0 for fewer than two nodes.
    #[must_use]
    pub fn density(&self) -> f64 {
        let n = self.graph.node_count();
        if n < 2 {
            return 0.0;
        }
        self.graph.edge_count() as f64 / (n * (n - 1)) as f64
    }

    /// Mean of in + out degree over all nodes; 0 when empty.
    #[must_use]
    pub fn average_degree(&self) -> f64 {
        let n = self.graph.node_count();
        if n == 0 {
            return 0.0;
        }
        (2 * self.graph.edge_count()) as f64 / n as f64
    }
}

// =============================================================================
// PATH ENUMERATION
// =============================================================================

struct PathWalk<'a> {
    index: &'a GraphIndex,
    target: NodeIndex,
    relation: Relation,
    max_hops: usize,
    path: Vec<NodeIndex>,
    on_path: Vec<bool>,
    budget: &'a mut usize,
    found: Vec<Vec<NodeIndex>>,
}

impl PathWalk<'_> {
    fn extend(&mut self, node: NodeIndex) {
        // path.len() - 1 hops taken; one more must stay within max_hops
        if self.path.len() > self.max_hops {
            return;
        }
        for next in self.index.successors(node, Some(self.relation)) {
            if *self.budget == 0 {
                return;
            }
            if self.on_path[next.index()] {
                continue;
            }
            self.path.push(next);
            if next == self.target {
                self.found.push(self.path.clone());
                *self.budget -= 1;
            } else {
                self.on_path[next.index()] = true;
                self.extend(next);
                self.on_path[next.index()] = false;
            }
            self.path.pop();
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FailureMode, FormElement, Function, FunctionBranch};

    fn chain_graph() -> UniversalGraph {
        let mut g = UniversalGraph::new();
        for id in ["a", "b", "c"] {
            g.add_function(Function::new(id, id));
        }
        g.add_function_branch(FunctionBranch::new("a", "b"));
        g.add_function_branch(FunctionBranch::new("b", "c"));
        g
    }

    #[test]
    fn build_mirrors_records() {
        let mut g = UniversalGraph::new();
        g.add_form_element(FormElement::new("pump", "pump"));
        g.add_function(Function::new("F1", "Move fluid"));
        g.add_failure_mode(FailureMode::new("M1", "Seal leak"));
        assert!(g.link_form_to_function("pump", "F1"));
        assert!(g.link_function_to_failure("F1", "M1"));

        let index = g.index();
        assert_eq!(index.node_count(), 3);
        assert_eq!(index.edge_count(), 2);
        assert_eq!(
            index.neighbor_ids(Layer::Form, "pump", Direction::Outgoing, Relation::Performs),
            vec!["F1"]
        );
        assert_eq!(
            index.neighbor_ids(Layer::Failure, "M1", Direction::Incoming, Relation::HasFailure),
            vec!["F1"]
        );
    }

    #[test]
    fn same_id_in_two_layers_is_two_nodes() {
        let mut g = UniversalGraph::new();
        g.add_form_element(FormElement::new("X", "thing"));
        g.add_function(Function::new("X", "do thing"));
        let index = g.index();
        assert_eq!(index.node_count(), 2);
        assert_ne!(index.node(Layer::Form, "X"), index.node(Layer::Function, "X"));
    }

    #[test]
    fn parallel_edges_count_in_degree_not_neighbors() {
        let mut g = chain_graph();
        g.add_function_branch(FunctionBranch::new("a", "b").with_latency(5.0));
        let index = g.index();
        let a = index.node(Layer::Function, "a").expect("a");
        assert_eq!(index.successors(a, None).len(), 1);
        assert_eq!(index.degree(a), 2);
    }

    #[test]
    fn betweenness_of_chain_middle() {
        let g = chain_graph();
        let index = g.index();
        let scores = index.betweenness().expect("non-empty");
        let b = index.node(Layer::Function, "b").expect("b");
        // one pair (a, c) routed through b, scaled by 1 / (2 × 1)
        assert!((scores[b.index()] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn betweenness_on_empty_graph_fails() {
        let g = UniversalGraph::new();
        assert!(matches!(
            g.index().betweenness(),
            Err(TrilayerError::TraversalFailed(_))
        ));
    }

    #[test]
    fn closeness_uses_incoming_distance() {
        let g = chain_graph();
        let index = g.index();
        let scores = index.closeness();
        let a = index.node(Layer::Function, "a").expect("a");
        let c = index.node(Layer::Function, "c").expect("c");
        assert!(scores[a.index()].abs() < 1e-12);
        // c is reached by b (1 hop) and a (2 hops): (2/3) × (2/2)
        assert!((scores[c.index()] - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn bfs_respects_depth_limit() {
        let g = chain_graph();
        let index = g.index();
        let a = index.node(Layer::Function, "a").expect("a");
        let visits = index.bfs(a, Direction::Outgoing, Some(Relation::FunctionFlow), Some(1));
        assert_eq!(visits.len(), 2);
        assert_eq!(visits[1].depth, 1);
        assert_eq!(visits[1].parent, Some(a));
    }

    #[test]
    fn simple_paths_respect_hops_and_budget() {
        let mut g = chain_graph();
        g.add_function_branch(FunctionBranch::new("a", "c"));
        let index = g.index();
        let a = index.node(Layer::Function, "a").expect("a");
        let c = index.node(Layer::Function, "c").expect("c");

        let mut budget = 100;
        let all = index.simple_paths(a, c, Relation::FunctionFlow, 10, &mut budget);
        assert_eq!(all.len(), 2);
        assert_eq!(budget, 98);

        let mut budget = 100;
        let short = index.simple_paths(a, c, Relation::FunctionFlow, 1, &mut budget);
        assert_eq!(short, vec![vec![a, c]]);

        let mut budget = 1;
        let capped = index.simple_paths(a, c, Relation::FunctionFlow, 10, &mut budget);
        assert_eq!(capped.len(), 1);
        assert_eq!(budget, 0);
    }

    #[test]
    fn components_and_density() {
        let mut g = chain_graph();
        g.add_function(Function::new("lonely", "isolated"));
        let index = g.index();
        let components = index.weak_components();
        assert_eq!(components.len(), 2);
        assert_eq!(components[0].len(), 3);
        assert!((index.density() - 2.0 / 12.0).abs() < 1e-12);
        assert!((index.average_degree() - 1.0).abs() < 1e-12);
    }
}
