//! # Structural Analysis
//!
//! Criticality, centrality, bottlenecks, clusters and connectivity over the
//! Form layer.
//!
//! Centralities are computed on the full three-layer index and then
//! restricted to Form ids. Form nodes only carry outgoing edges (`performs`,
//! `has_failure`), so in practice criticality is driven by function
//! dependency and failure impact.

use crate::config::AnalysisConfig;
use crate::graph::UniversalGraph;
use crate::index::{Layer, Relation};
use crate::primitives::{
    CENTRALITY_WEIGHT, DESCENDANT_WEIGHT, FAILURE_IMPACT_WEIGHT, FUNCTION_DEPENDENCY_WEIGHT,
    STRUCTURAL_CRITICAL_BETWEENNESS,
};
use crate::types::FormId;
use petgraph::Direction;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

// =============================================================================
// REPORT TYPES
// =============================================================================

/// Full structural analysis result.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StructuralReport {
    pub criticality_scores: BTreeMap<FormId, f64>,
    pub centrality_measures: CentralityMeasures,
    pub bottlenecks: Vec<StructuralBottleneck>,
    pub clusters: Vec<Vec<FormId>>,
    pub connectivity: Connectivity,
}

/// Per-Form centrality tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CentralityMeasures {
    pub degree: BTreeMap<FormId, f64>,
    pub betweenness: BTreeMap<FormId, f64>,
    pub closeness: BTreeMap<FormId, f64>,
}

/// A Form element many shortest paths run through.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuralBottleneck {
    pub form_id: FormId,
    pub form_type: String,
    pub bottleneck_score: f64,
    pub is_critical: bool,
}

/// Whole-index connectivity summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Connectivity {
    pub is_connected: bool,
    pub num_components: usize,
    pub density: f64,
    pub average_degree: f64,
}

// =============================================================================
// ENTRY POINTS
// =============================================================================

/// Run every structural analysis.
#[must_use]
pub fn analyze_structure(graph: &UniversalGraph, config: &AnalysisConfig) -> StructuralReport {
    StructuralReport {
        criticality_scores: compute_criticality(graph),
        centrality_measures: centrality_measures(graph),
        bottlenecks: structural_bottlenecks(graph, config.structural_top_n),
        clusters: form_clusters(graph),
        connectivity: connectivity(graph),
    }
}

/// Normalized criticality per Form element.
///
/// `0.3 × betweenness + 0.4 × function dependency + 0.3 × failure impact`,
/// divided by the maximum. Empty when there are no Form elements or the
/// maximum is zero.
#[must_use]
pub fn compute_criticality(graph: &UniversalGraph) -> BTreeMap<FormId, f64> {
    if graph.form_elements().is_empty() {
        return BTreeMap::new();
    }

    let centrality = form_betweenness(graph);
    let dependency = function_dependency(graph);
    let impact = failure_impact(graph);

    let combined: BTreeMap<FormId, f64> = graph
        .form_elements()
        .keys()
        .map(|id| {
            let score = CENTRALITY_WEIGHT * centrality.get(id).copied().unwrap_or(0.0)
                + FUNCTION_DEPENDENCY_WEIGHT * dependency.get(id).copied().unwrap_or(0.0)
                + FAILURE_IMPACT_WEIGHT * impact.get(id).copied().unwrap_or(0.0);
            (id.clone(), score)
        })
        .collect();

    let max = combined.values().copied().fold(0.0_f64, f64::max);
    if max <= 0.0 {
        return BTreeMap::new();
    }

    combined
        .into_iter()
        .map(|(id, score)| (id, (score / max).max(0.0)))
        .collect()
}

// =============================================================================
// SCORE COMPONENTS
// =============================================================================

/// Betweenness restricted to Form ids; zeros when undefined.
fn form_betweenness(graph: &UniversalGraph) -> BTreeMap<FormId, f64> {
    let index = graph.index();
    match index.betweenness() {
        Ok(scores) => graph
            .form_elements()
            .keys()
            .map(|id| {
                let score = index
                    .node(Layer::Form, id.as_str())
                    .and_then(|n| scores.get(n.index()).copied())
                    .unwrap_or(0.0);
                (id.clone(), score)
            })
            .collect(),
        Err(err) => {
            debug!(%err, "betweenness unavailable, using zeros");
            zeros(graph)
        }
    }
}

/// Σ over performed functions of `1 + 0.1 × descendants`.
fn function_dependency(graph: &UniversalGraph) -> BTreeMap<FormId, f64> {
    let index = graph.index();
    graph
        .form_elements()
        .keys()
        .map(|id| {
            let score: f64 = index
                .neighbor_ids(Layer::Form, id.as_str(), Direction::Outgoing, Relation::Performs)
                .into_iter()
                .map(|function| 1.0 + DESCENDANT_WEIGHT * graph.descendants(function).len() as f64)
                .sum();
            (id.clone(), score)
        })
        .collect()
}

/// Σ `severity × probability` over failure modes declaring the element.
fn failure_impact(graph: &UniversalGraph) -> BTreeMap<FormId, f64> {
    let mut scores = zeros(graph);
    for failure in graph.failure_modes().values() {
        let declared: BTreeSet<&FormId> = failure.affects_forms.iter().collect();
        for form in declared {
            if let Some(score) = scores.get_mut(form) {
                *score += failure.severity * failure.probability;
            }
        }
    }
    scores
}

fn zeros(graph: &UniversalGraph) -> BTreeMap<FormId, f64> {
    graph
        .form_elements()
        .keys()
        .map(|id| (id.clone(), 0.0))
        .collect()
}

// =============================================================================
// CENTRALITY, BOTTLENECKS, CLUSTERS, CONNECTIVITY
// =============================================================================

fn centrality_measures(graph: &UniversalGraph) -> CentralityMeasures {
    let index = graph.index();
    if graph.form_elements().is_empty() || index.node_count() == 0 {
        return CentralityMeasures::default();
    }

    let degree = index.degree_centrality();
    let closeness = index.closeness();
    let pick = |table: &[f64]| -> BTreeMap<FormId, f64> {
        index
            .layer_nodes(Layer::Form)
            .map(|(id, n)| (FormId::from(id), table.get(n.index()).copied().unwrap_or(0.0)))
            .collect()
    };

    CentralityMeasures {
        degree: pick(&degree),
        betweenness: form_betweenness(graph),
        closeness: pick(&closeness),
    }
}

fn structural_bottlenecks(graph: &UniversalGraph, top_n: usize) -> Vec<StructuralBottleneck> {
    rank_bottlenecks(graph, form_betweenness(graph), top_n)
}

fn rank_bottlenecks(
    graph: &UniversalGraph,
    scores: BTreeMap<FormId, f64>,
    top_n: usize,
) -> Vec<StructuralBottleneck> {
    let mut ranked: Vec<(FormId, f64)> = scores.into_iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    ranked
        .into_iter()
        .take(top_n)
        .filter(|(_, score)| *score > 0.0)
        .map(|(id, score)| StructuralBottleneck {
            form_type: graph
                .form_element(id.as_str())
                .map(|f| f.element_type.clone())
                .unwrap_or_default(),
            form_id: id,
            bottleneck_score: score,
            is_critical: score > STRUCTURAL_CRITICAL_BETWEENNESS,
        })
        .collect()
}

/// Weakly connected components restricted to Form ids, size > 1.
fn form_clusters(graph: &UniversalGraph) -> Vec<Vec<FormId>> {
    if graph.form_elements().is_empty() {
        return Vec::new();
    }
    let index = graph.index();
    index
        .weak_components()
        .into_iter()
        .map(|component| {
            component
                .into_iter()
                .filter_map(|n| index.key(n))
                .filter(|key| key.layer == Layer::Form)
                .map(|key| FormId::from(key.id.as_str()))
                .collect::<Vec<_>>()
        })
        .filter(|cluster| cluster.len() > 1)
        .collect()
}

fn connectivity(graph: &UniversalGraph) -> Connectivity {
    if graph.form_elements().is_empty() {
        return Connectivity::default();
    }
    let index = graph.index();
    let num_components = index.weak_components().len();
    Connectivity {
        is_connected: num_components == 1,
        num_components,
        density: index.density(),
        average_degree: index.average_degree(),
    }
}

// =============================================================================
// TESTS
// =============================================================================
