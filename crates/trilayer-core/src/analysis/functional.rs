//! # Functional Analysis
//!
//! Hierarchy, bottlenecks, redundancy and critical paths over the Function
//! layer.
//!
//! The hierarchy comes from the function arena (parent / children ids);
//! flow metrics come from `FunctionBranch` records and the `function_flow`
//! edges of the index.

use crate::config::AnalysisConfig;
use crate::graph::{UniversalGraph, WiringIssue};
use crate::index::{Layer, Relation};
use crate::primitives::{
    FUNCTION_CRITICAL_SCORE, IN_DEGREE_WEIGHT, LATENCY_SATURATION, LATENCY_WEIGHT,
    MAX_ENUMERATED_PATHS, UNRELIABILITY_WEIGHT,
};
use crate::types::{Function, FunctionBranch, FunctionId};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

// =============================================================================
// REPORT TYPES
// =============================================================================

/// Full functional analysis result.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FunctionalReport {
    pub hierarchy: FunctionHierarchy,
    pub bottlenecks: Vec<FunctionBottleneck>,
    pub redundancy: RedundancyReport,
    pub critical_paths: Vec<CriticalPath>,
    pub performance_metrics: PerformanceSummary,
    pub wiring_issues: Vec<WiringIssue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FunctionHierarchy {
    pub roots: Vec<FunctionTree>,
    pub total_functions: usize,
    /// Longest ancestor chain; a root has depth 0.
    pub max_depth: usize,
}

/// One function and its subtree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionTree {
    pub id: FunctionId,
    pub name: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub children: Vec<FunctionTree>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionBottleneck {
    pub function_id: FunctionId,
    pub function_name: String,
    pub bottleneck_score: f64,
    pub in_degree: usize,
    pub out_degree: usize,
    pub avg_reliability: f64,
    pub avg_latency: f64,
    pub is_critical: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RedundancyReport {
    pub redundant_paths: Vec<RedundantGroup>,
    pub single_points_of_failure: Vec<SinglePointOfFailure>,
    pub redundancy_score: f64,
}

/// Functions producing the same output set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RedundantGroup {
    pub outputs: Vec<String>,
    pub functions: Vec<FunctionId>,
    pub redundancy_level: usize,
}

/// A function whose output set nothing else produces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SinglePointOfFailure {
    pub function_id: FunctionId,
    pub function_name: String,
    pub outputs: Vec<String>,
}

/// A root-to-leaf flow path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CriticalPath {
    pub path: Vec<FunctionId>,
    /// Node count.
    pub length: usize,
    pub reliability: f64,
    pub latency: f64,
    pub criticality: f64,
}

/// Branch-level averages over the whole function layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceSummary {
    pub avg_reliability: f64,
    pub avg_latency: f64,
    pub total_functions: usize,
    pub total_branches: usize,
}

impl Default for PerformanceSummary {
    fn default() -> Self {
        Self {
            avg_reliability: 1.0,
            avg_latency: 0.0,
            total_functions: 0,
            total_branches: 0,
        }
    }
}

// =============================================================================
// ENTRY POINT
// =============================================================================

/// Run every functional analysis.
#[must_use]
pub fn analyze_functions(graph: &UniversalGraph, config: &AnalysisConfig) -> FunctionalReport {
    FunctionalReport {
        hierarchy: build_function_hierarchy(graph),
        bottlenecks: identify_function_bottlenecks(graph, config.bottleneck_top_n),
        redundancy: compute_function_redundancy(graph),
        critical_paths: find_critical_function_paths(
            graph,
            config.critical_path_max_hops,
            config.critical_path_top_n,
        ),
        performance_metrics: analyze_function_performance(graph),
        wiring_issues: graph.wiring_issues(),
    }
}

// =============================================================================
// HIERARCHY
// =============================================================================

/// Trees rendered from every root function.
///
/// A child already on the current branch is skipped, so corrupted wiring
/// cannot recurse forever.
#[must_use]
pub fn build_function_hierarchy(graph: &UniversalGraph) -> FunctionHierarchy {
    let mut on_branch: BTreeSet<&str> = BTreeSet::new();
    let roots = graph
        .root_functions()
        .into_iter()
        .map(|root| build_tree(graph, root, &mut on_branch))
        .collect();

    let max_depth = graph
        .functions()
        .keys()
        .map(|id| graph.ancestors(id.as_str()).len())
        .max()
        .unwrap_or(0);

    FunctionHierarchy {
        roots,
        total_functions: graph.functions().len(),
        max_depth,
    }
}

fn build_tree<'a>(
    graph: &'a UniversalGraph,
    function: &'a Function,
    on_branch: &mut BTreeSet<&'a str>,
) -> FunctionTree {
    on_branch.insert(function.id.as_str());
    let children = graph
        .child_functions(function.id.as_str())
        .filter(|child| !on_branch.contains(child.id.as_str()))
        .collect::<Vec<_>>()
        .into_iter()
        .map(|child| build_tree(graph, child, on_branch))
        .collect();
    on_branch.remove(function.id.as_str());

    FunctionTree {
        id: function.id.clone(),
        name: function.name.clone(),
        inputs: function.inputs.clone(),
        outputs: function.outputs.clone(),
        children,
    }
}

// =============================================================================
// BOTTLENECKS
// =============================================================================

/// Top-N functions by bottleneck score.
///
/// `in_degree × 0.3 + (1 − avg reliability) × 0.4 + min(avg latency / 100, 1) × 0.3`,
/// averages over branches touching the function. Degrees count unique
/// neighbors across all relations. Zero scores are dropped.
#[must_use]
pub fn identify_function_bottlenecks(
    graph: &UniversalGraph,
    top_n: usize,
) -> Vec<FunctionBottleneck> {
    let index = graph.index();
    let mut bottlenecks: Vec<FunctionBottleneck> = graph
        .functions()
        .iter()
        .filter_map(|(id, function)| {
            let (in_degree, out_degree) = index
                .node(Layer::Function, id.as_str())
                .map(|n| (index.predecessors(n, None).len(), index.successors(n, None).len()))
                .unwrap_or((0, 0));

            let related: Vec<&FunctionBranch> = graph
                .function_branches()
                .iter()
                .filter(|b| b.source == *id || b.target == *id)
                .collect();
            let (avg_reliability, avg_latency) = if related.is_empty() {
                (1.0, 0.0)
            } else {
                let n = related.len() as f64;
                (
                    related.iter().map(|b| b.reliability).sum::<f64>() / n,
                    related.iter().map(|b| b.latency).sum::<f64>() / n,
                )
            };

            let score = in_degree as f64 * IN_DEGREE_WEIGHT
                + (1.0 - avg_reliability) * UNRELIABILITY_WEIGHT
                + (avg_latency / LATENCY_SATURATION).min(1.0) * LATENCY_WEIGHT;

            (score > 0.0).then(|| FunctionBottleneck {
                function_id: id.clone(),
                function_name: function.name.clone(),
                bottleneck_score: score,
                in_degree,
                out_degree,
                avg_reliability,
                avg_latency,
                is_critical: score > FUNCTION_CRITICAL_SCORE,
            })
        })
        .collect();

    bottlenecks.sort_by(|a, b| b.bottleneck_score.total_cmp(&a.bottleneck_score));
    bottlenecks.truncate(top_n);
    bottlenecks
}

// =============================================================================
// REDUNDANCY
// =============================================================================

/// Group functions by output set.
///
/// Groups of more than one function with a non-empty output set are
/// redundant; a function alone with a non-empty output set is a single point
/// of failure. The score is the share of functions in any group of size > 1.
#[must_use]
pub fn compute_function_redundancy(graph: &UniversalGraph) -> RedundancyReport {
    if graph.functions().is_empty() {
        return RedundancyReport::default();
    }

    let mut groups: BTreeMap<Vec<String>, Vec<&Function>> = BTreeMap::new();
    for function in graph.functions().values() {
        groups
            .entry(function.output_signature())
            .or_default()
            .push(function);
    }

    let mut report = RedundancyReport::default();
    let mut redundant_functions = 0usize;
    for (outputs, members) in &groups {
        if members.len() > 1 {
            redundant_functions += members.len();
            if !outputs.is_empty() {
                report.redundant_paths.push(RedundantGroup {
                    outputs: outputs.clone(),
                    functions: members.iter().map(|f| f.id.clone()).collect(),
                    redundancy_level: members.len(),
                });
            }
        } else if !outputs.is_empty() {
            report
                .single_points_of_failure
                .extend(members.iter().map(|f| SinglePointOfFailure {
                    function_id: f.id.clone(),
                    function_name: f.name.clone(),
                    outputs: f.outputs.clone(),
                }));
        }
    }
    report
        .single_points_of_failure
        .sort_by(|a, b| a.function_id.cmp(&b.function_id));
    report.redundancy_score = redundant_functions as f64 / graph.functions().len() as f64;
    report
}

// =============================================================================
// CRITICAL PATHS
// =============================================================================

/// Top-N root-to-leaf flow paths by `(1 − reliability) × length`.
///
/// Roots have no resolvable parent, leaves no resolvable child. Paths follow
/// `function_flow` edges, at most `max_hops` long; enumeration stops after
/// `MAX_ENUMERATED_PATHS` paths.
#[must_use]
pub fn find_critical_function_paths(
    graph: &UniversalGraph,
    max_hops: usize,
    top_n: usize,
) -> Vec<CriticalPath> {
    let index = graph.index();
    let roots = graph.root_functions();
    let leaves = graph.leaf_functions();
    let mut budget = MAX_ENUMERATED_PATHS;
    let mut paths = Vec::new();

    'roots: for root in &roots {
        let Some(from) = index.node(Layer::Function, root.id.as_str()) else {
            continue;
        };
        for leaf in &leaves {
            if root.id == leaf.id {
                continue;
            }
            let Some(to) = index.node(Layer::Function, leaf.id.as_str()) else {
                continue;
            };
            for nodes in index.simple_paths(from, to, Relation::FunctionFlow, max_hops, &mut budget)
            {
                let ids: Vec<FunctionId> = nodes
                    .iter()
                    .filter_map(|n| index.key(*n))
                    .map(|k| FunctionId::from(k.id.as_str()))
                    .collect();
                paths.push(measure_path(graph.function_branches(), ids));
            }
            if budget == 0 {
                debug!(limit = MAX_ENUMERATED_PATHS, "critical path enumeration capped");
                break 'roots;
            }
        }
    }

    paths.sort_by(|a, b| b.criticality.total_cmp(&a.criticality));
    paths.truncate(top_n);
    paths
}

/// First matching branch per consecutive pair; unmatched pairs contribute
/// nothing.
fn measure_path(branches: &[FunctionBranch], path: Vec<FunctionId>) -> CriticalPath {
    let mut reliability = 1.0;
    let mut latency = 0.0;
    for pair in path.windows(2) {
        if let Some(branch) = branches
            .iter()
            .find(|b| b.source == pair[0] && b.target == pair[1])
        {
            reliability *= branch.reliability;
            latency += branch.latency;
        }
    }
    let length = path.len();
    CriticalPath {
        path,
        length,
        reliability,
        latency,
        criticality: (1.0 - reliability) * length as f64,
    }
}

// =============================================================================
// PERFORMANCE
// =============================================================================

/// Mean branch reliability and latency across the function layer.
#[must_use]
pub fn analyze_function_performance(graph: &UniversalGraph) -> PerformanceSummary {
    let branches = graph.function_branches();
    let mut summary = PerformanceSummary {
        total_functions: graph.functions().len(),
        total_branches: branches.len(),
        ..PerformanceSummary::default()
    };
    if !branches.is_empty() {
        let n = branches.len() as f64;
        summary.avg_reliability = branches.iter().map(|b| b.reliability).sum::<f64>() / n;
        summary.avg_latency = branches.iter().map(|b| b.latency).sum::<f64>() / n;
    }
    summary
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FormElement;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn flow_graph() -> UniversalGraph {
        let mut g = UniversalGraph::new();
        for id in ["A", "B", "C"] {
            g.add_function(Function::new(id, format!("Step {id}")));
        }
        g.add_function_branch(FunctionBranch::new("A", "C").with_reliability(0.9).with_latency(50.0));
        g.add_function_branch(FunctionBranch::new("B", "C").with_reliability(0.7).with_latency(150.0));
        g
    }

    #[test]
    fn bottleneck_scores_follow_weights() {
        let g = flow_graph();
        let ranked = identify_function_bottlenecks(&g, 5);
        let ids: Vec<_> = ranked.iter().map(|b| b.function_id.as_str()).collect();
        assert_eq!(ids, vec!["C", "B", "A"]);

        assert_eq!(ranked[0].in_degree, 2);
        assert!(close(ranked[0].avg_reliability, 0.8));
        assert!(close(ranked[0].avg_latency, 100.0));
        assert!(close(ranked[0].bottleneck_score, 0.98));
        assert!(ranked[0].is_critical);

        assert!(close(ranked[1].bottleneck_score, 0.42));
        assert!(!ranked[1].is_critical);
        assert!(close(ranked[2].bottleneck_score, 0.19));
        assert_eq!(identify_function_bottlenecks(&g, 1).len(), 1);
    }

    #[test]
    fn isolated_function_is_not_a_bottleneck() {
        let mut g = UniversalGraph::new();
        g.add_function(Function::new("idle", "Idle"));
        assert!(identify_function_bottlenecks(&g, 5).is_empty());
    }

    #[test]
    fn performing_form_counts_toward_in_degree() {
        let mut g = UniversalGraph::new();
        g.add_form_element(FormElement::new("CPU", "processor"));
        g.add_function(Function::new("compute", "Compute"));
        g.link_form_to_function("CPU", "compute");
        let ranked = identify_function_bottlenecks(&g, 5);
        assert_eq!(ranked.len(), 1);
        assert!(close(ranked[0].bottleneck_score, 0.3));
    }

    #[test]
    fn redundancy_groups_by_output_set() {
        let mut g = UniversalGraph::new();
        g.add_function(Function::new("X", "Primary pump").with_outputs(["flow", "pressure"]));
        g.add_function(Function::new("Y", "Backup pump").with_outputs(["pressure", "flow"]));
        g.add_function(Function::new("Z", "Heater").with_outputs(["heat"]));

        let report = compute_function_redundancy(&g);
        assert!(close(report.redundancy_score, 2.0 / 3.0));
        assert_eq!(report.redundant_paths.len(), 1);
        assert_eq!(report.redundant_paths[0].redundancy_level, 2);
        assert_eq!(
            report.redundant_paths[0].outputs,
            vec!["flow".to_string(), "pressure".to_string()]
        );
        let spof: Vec<_> = report
            .single_points_of_failure
            .iter()
            .map(|s| s.function_id.as_str())
            .collect();
        assert_eq!(spof, vec!["Z"]);
    }

    #[test]
    fn empty_outputs_are_neither_redundant_nor_spof() {
        let mut g = UniversalGraph::new();
        g.add_function(Function::new("a", "A"));
        g.add_function(Function::new("b", "B"));
        let report = compute_function_redundancy(&g);
        assert!(report.redundant_paths.is_empty());
        assert!(report.single_points_of_failure.is_empty());
        // size counts even though the shared output set is empty
        assert!(close(report.redundancy_score, 1.0));
    }

    fn tree_with_flows() -> UniversalGraph {
        let mut g = UniversalGraph::new();
        for id in ["R", "A", "B"] {
            g.add_function(Function::new(id, id));
        }
        g.add_child_function("R", "A");
        g.add_child_function("R", "B");
        g.add_function_branch(FunctionBranch::new("R", "A").with_reliability(0.9).with_latency(10.0));
        g.add_function_branch(FunctionBranch::new("A", "B").with_reliability(0.8).with_latency(5.0));
        g.add_function_branch(FunctionBranch::new("R", "B").with_reliability(0.99).with_latency(1.0));
        g
    }

    #[test]
    fn critical_paths_rank_by_unreliability_and_length() {
        let g = tree_with_flows();
        let paths = find_critical_function_paths(&g, 10, 10);
        let rendered: Vec<Vec<&str>> = paths
            .iter()
            .map(|p| p.path.iter().map(FunctionId::as_str).collect())
            .collect();
        assert_eq!(
            rendered,
            vec![vec!["R", "A", "B"], vec!["R", "A"], vec!["R", "B"]]
        );
        assert!(close(paths[0].reliability, 0.72));
        assert!(close(paths[0].latency, 15.0));
        assert!(close(paths[0].criticality, 0.28 * 3.0));
        assert_eq!(paths[0].length, 3);
    }

    #[test]
    fn critical_paths_respect_hop_limit_and_top_n() {
        let g = tree_with_flows();
        assert_eq!(find_critical_function_paths(&g, 1, 10).len(), 2);
        assert_eq!(find_critical_function_paths(&g, 10, 1).len(), 1);
    }

    #[test]
    fn parallel_branches_collapse_and_first_branch_wins() {
        let mut g = tree_with_flows();
        g.add_function_branch(FunctionBranch::new("R", "A").with_reliability(0.1));
        let paths = find_critical_function_paths(&g, 10, 10);
        assert_eq!(paths.len(), 3);
        assert!(close(paths[0].reliability, 0.72));
    }

    #[test]
    fn hierarchy_renders_trees_and_depth() {
        let mut g = tree_with_flows();
        g.add_function(Function::new("A1", "Sub-step"));
        g.add_child_function("A", "A1");
        let hierarchy = build_function_hierarchy(&g);
        assert_eq!(hierarchy.total_functions, 4);
        assert_eq!(hierarchy.max_depth, 2);
        assert_eq!(hierarchy.roots.len(), 1);
        assert_eq!(hierarchy.roots[0].children.len(), 2);
        assert_eq!(hierarchy.roots[0].children[0].children[0].id.as_str(), "A1");
    }

    #[test]
    fn performance_summary_defaults_without_branches() {
        let mut g = UniversalGraph::new();
        g.add_function(Function::new("solo", "Solo"));
        let summary = analyze_function_performance(&g);
        assert!(close(summary.avg_reliability, 1.0));
        assert_eq!(summary.total_functions, 1);
        assert_eq!(summary.total_branches, 0);

        let summary = analyze_function_performance(&tree_with_flows());
        assert!(close(summary.avg_reliability, (0.9 + 0.8 + 0.99) / 3.0));
    }
}
