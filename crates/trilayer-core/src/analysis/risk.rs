//! # Risk Analysis
//!
//! Failure-layer algorithms: risk priority ranking, propagation discovery,
//! cascade simulation and critical-failure identification.
//!
//! Impact and propagation read the declared `FailureMode` lists and branch
//! records; the index is only used to walk `propagates_to` and the one-hop
//! `performs` closure.

use crate::config::AnalysisConfig;
use crate::graph::UniversalGraph;
use crate::index::{Layer, Relation};
use crate::primitives::{
    CRITICAL_IMPACT_COUNT, CRITICAL_PROPAGATION_COUNT, DEFAULT_PROPAGATION_PROBABILITY,
    IMPACT_BONUS, PROPAGATION_BONUS,
};
use crate::types::{FailureId, FailureMode, FormId, FunctionId};
use petgraph::Direction;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// REPORT TYPES
// =============================================================================

/// Full risk analysis result.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RiskReport {
    pub propagation_paths: Vec<PropagationPath>,
    pub critical_failures: Vec<CriticalFailure>,
    pub cascading_risks: CascadeReport,
    pub risk_priorities: Vec<RiskPriority>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskPriority {
    pub failure_id: FailureId,
    pub failure_name: String,
    pub risk_score: f64,
    pub severity: f64,
    pub probability: f64,
    pub detectability: f64,
    pub functions_affected: Vec<FunctionId>,
    pub forms_affected: Vec<FormId>,
    pub propagation_count: usize,
    pub mitigation_count: usize,
}

/// Failure modes reachable from one source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropagationPath {
    pub source_failure: FailureId,
    pub source_name: String,
    /// Discovery order, nearest first.
    pub reachable_failures: Vec<FailureId>,
    pub propagation_probability: f64,
    pub path_length: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CriticalFailure {
    pub failure_id: FailureId,
    pub failure_name: String,
    pub risk_score: f64,
    pub impact_count: usize,
    pub propagation_count: usize,
    pub severity: f64,
    pub probability: f64,
    pub criticality_score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CascadeReport {
    pub scenarios: Vec<CascadeScenario>,
    pub max_cascade_size: usize,
    pub total_scenarios: usize,
}

/// Everything one initiating failure can trigger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CascadeScenario {
    pub initiating_failure: FailureId,
    pub initiating_name: String,
    /// Members including the initiating failure.
    pub cascade_size: usize,
    pub cascade_failures: Vec<FailureId>,
    pub cascade_probability: f64,
    pub severity: f64,
    /// Probability of reaching each member along its discovery path.
    pub reach_probabilities: BTreeMap<FailureId, f64>,
}

// =============================================================================
// ENTRY POINT
// =============================================================================

/// Run every risk analysis.
#[must_use]
pub fn analyze_failure_propagation(graph: &UniversalGraph, config: &AnalysisConfig) -> RiskReport {
    RiskReport {
        propagation_paths: compute_propagation_paths(graph, config.propagation_max_depth),
        critical_failures: identify_critical_failures(graph, config.critical_risk_threshold),
        cascading_risks: analyze_cascading_failures(graph),
        risk_priorities: compute_risk_priority(graph),
    }
}

// =============================================================================
// RISK PRIORITY
// =============================================================================

/// Every failure mode with its risk score and traced impact, highest risk
/// first.
#[must_use]
pub fn compute_risk_priority(graph: &UniversalGraph) -> Vec<RiskPriority> {
    let mut priorities: Vec<RiskPriority> = graph
        .failure_modes()
        .values()
        .map(|failure| RiskPriority {
            failure_id: failure.id.clone(),
            failure_name: failure.name.clone(),
            risk_score: failure.risk_score(),
            severity: failure.severity,
            probability: failure.probability,
            detectability: failure.detectability,
            functions_affected: trace_function_impact(graph, failure),
            forms_affected: trace_form_impact(graph, failure),
            propagation_count: failure.propagates_to.len(),
            mitigation_count: failure.mitigated_by.len(),
        })
        .collect();

    priorities.sort_by(|a, b| b.risk_score.total_cmp(&a.risk_score));
    priorities
}

/// Declared functions plus functions performed by declared forms.
#[must_use]
pub fn trace_function_impact(graph: &UniversalGraph, failure: &FailureMode) -> Vec<FunctionId> {
    let index = graph.index();
    let mut affected: BTreeSet<FunctionId> = failure.affects_functions.iter().cloned().collect();
    for form in &failure.affects_forms {
        affected.extend(
            index
                .neighbor_ids(Layer::Form, form.as_str(), Direction::Outgoing, Relation::Performs)
                .into_iter()
                .map(FunctionId::from),
        );
    }
    affected.into_iter().collect()
}

/// Declared forms plus forms performing declared functions.
#[must_use]
pub fn trace_form_impact(graph: &UniversalGraph, failure: &FailureMode) -> Vec<FormId> {
    let index = graph.index();
    let mut affected: BTreeSet<FormId> = failure.affects_forms.iter().cloned().collect();
    for function in &failure.affects_functions {
        affected.extend(
            index
                .neighbor_ids(
                    Layer::Function,
                    function.as_str(),
                    Direction::Incoming,
                    Relation::Performs,
                )
                .into_iter()
                .map(FormId::from),
        );
    }
    affected.into_iter().collect()
}

// =============================================================================
// PROPAGATION
// =============================================================================

/// Failure modes reachable along `propagates_to`, per source.
///
/// Failures up to `max_depth` hops away are still expanded, so targets at
/// `max_depth + 1` hops are included. Sources that reach nothing are omitted.
#[must_use]
pub fn compute_propagation_paths(graph: &UniversalGraph, max_depth: usize) -> Vec<PropagationPath> {
    graph
        .failure_modes()
        .values()
        .filter_map(|failure| {
            let reachable = reachable_failures(graph, failure.id.as_str(), max_depth);
            if reachable.is_empty() {
                return None;
            }
            Some(PropagationPath {
                source_failure: failure.id.clone(),
                source_name: failure.name.clone(),
                propagation_probability: propagation_probability(graph, &failure.id, &reachable),
                path_length: reachable.len(),
                reachable_failures: reachable,
            })
        })
        .collect()
}

/// Nearest-first, source excluded.
fn reachable_failures(graph: &UniversalGraph, source: &str, max_depth: usize) -> Vec<FailureId> {
    let index = graph.index();
    let Some(start) = index.node(Layer::Failure, source) else {
        return Vec::new();
    };
    index
        .bfs(
            start,
            Direction::Outgoing,
            Some(Relation::PropagatesTo),
            Some(max_depth.saturating_add(1)),
        )
        .into_iter()
        .skip(1)
        .filter_map(|visit| index.key(visit.node))
        .map(|key| FailureId::from(key.id.as_str()))
        .collect()
}

/// Σ direct branch probabilities from `source` into `targets`, divided by
/// the target count and clamped to [0, 1].
fn propagation_probability(
    graph: &UniversalGraph,
    source: &FailureId,
    targets: &[FailureId],
) -> f64 {
    if targets.is_empty() {
        return 0.0;
    }
    let total: f64 = graph
        .failure_branches()
        .iter()
        .filter(|b| b.source == *source && targets.contains(&b.target))
        .map(|b| b.propagation_probability)
        .sum();
    (total / targets.len() as f64).clamp(0.0, 1.0)
}

// =============================================================================
// CRITICAL FAILURES
// =============================================================================

/// Failure modes that are risky, wide-reaching or widely propagating.
///
/// Critical when `risk_score > threshold`, more than five declared impacts
/// or more than three propagation targets. Sorted by criticality score.
#[must_use]
pub fn identify_critical_failures(graph: &UniversalGraph, threshold: f64) -> Vec<CriticalFailure> {
    let mut critical: Vec<CriticalFailure> = graph
        .failure_modes()
        .values()
        .filter_map(|failure| {
            let risk_score = failure.risk_score();
            let impact_count = failure.impact_count();
            let propagation_count = failure.propagates_to.len();
            let is_critical = risk_score > threshold
                || impact_count > CRITICAL_IMPACT_COUNT
                || propagation_count > CRITICAL_PROPAGATION_COUNT;

            is_critical.then(|| CriticalFailure {
                failure_id: failure.id.clone(),
                failure_name: failure.name.clone(),
                risk_score,
                impact_count,
                propagation_count,
                severity: failure.severity,
                probability: failure.probability,
                criticality_score: risk_score
                    * (1.0
                        + impact_count as f64 * IMPACT_BONUS
                        + propagation_count as f64 * PROPAGATION_BONUS),
            })
        })
        .collect();

    critical.sort_by(|a, b| b.criticality_score.total_cmp(&a.criticality_score));
    critical
}

// =============================================================================
// CASCADES
// =============================================================================

/// Cascade scenarios with more than one member, ranked by
/// `size × probability`.
#[must_use]
pub fn analyze_cascading_failures(graph: &UniversalGraph) -> CascadeReport {
    let mut scenarios: Vec<CascadeScenario> = graph
        .failure_modes()
        .values()
        .filter_map(|failure| simulate_cascade(graph, failure))
        .filter(|scenario| scenario.cascade_size > 1)
        .collect();

    scenarios.sort_by(|a, b| {
        let ka = a.cascade_size as f64 * a.cascade_probability;
        let kb = b.cascade_size as f64 * b.cascade_probability;
        kb.total_cmp(&ka)
    });

    CascadeReport {
        max_cascade_size: scenarios.iter().map(|s| s.cascade_size).max().unwrap_or(0),
        total_scenarios: scenarios.len(),
        scenarios,
    }
}

/// Full transitive cascade from one failure mode, source included.
///
/// Returns `None` only when the failure is missing from the index.
#[must_use]
pub fn simulate_cascade(graph: &UniversalGraph, source: &FailureMode) -> Option<CascadeScenario> {
    let index = graph.index();
    let start = index.node(Layer::Failure, source.id.as_str())?;
    let visits = index.bfs(start, Direction::Outgoing, Some(Relation::PropagatesTo), None);

    let mut members: Vec<FailureId> = Vec::with_capacity(visits.len());
    let mut reach = vec![0.0; index.node_count()];
    let mut reach_probabilities = BTreeMap::new();

    for visit in &visits {
        let Some(key) = index.key(visit.node) else {
            continue;
        };
        let id = FailureId::from(key.id.as_str());
        let probability = match visit.parent {
            None => 1.0,
            Some(parent) => {
                let hop = index
                    .key(parent)
                    .map(|p| branch_probability(graph, p.id.as_str(), id.as_str()))
                    .unwrap_or(DEFAULT_PROPAGATION_PROBABILITY);
                reach[parent.index()] * hop
            }
        };
        reach[visit.node.index()] = probability;
        reach_probabilities.insert(id.clone(), probability);
        members.push(id);
    }

    let member_set: BTreeSet<&FailureId> = members.iter().collect();
    let internal: Vec<f64> = graph
        .failure_branches()
        .iter()
        .filter(|b| member_set.contains(&b.source) && member_set.contains(&b.target))
        .map(|b| b.propagation_probability.clamp(0.0, 1.0))
        .collect();
    let cascade_probability = if internal.is_empty() {
        source.probability
    } else {
        source.probability * internal.iter().sum::<f64>() / internal.len() as f64
    };

    let severities: Vec<f64> = members
        .iter()
        .filter_map(|id| graph.failure_mode(id.as_str()))
        .map(|f| f.severity)
        .collect();
    let severity = if severities.is_empty() {
        0.0
    } else {
        severities.iter().sum::<f64>() / severities.len() as f64
    };

    Some(CascadeScenario {
        initiating_failure: source.id.clone(),
        initiating_name: source.name.clone(),
        cascade_size: members.len(),
        cascade_failures: members,
        cascade_probability,
        severity,
        reach_probabilities,
    })
}

/// First declared branch probability for one hop, clamped to [0, 1].
fn branch_probability(graph: &UniversalGraph, source: &str, target: &str) -> f64 {
    graph
        .failure_branches()
        .iter()
        .find(|b| b.source.as_str() == source && b.target.as_str() == target)
        .map_or(DEFAULT_PROPAGATION_PROBABILITY, |b| {
            b.propagation_probability.clamp(0.0, 1.0)
        })
}

// =============================================================================
// TESTS
// =============================================================================
