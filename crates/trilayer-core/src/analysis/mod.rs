//! # Analysis
//!
//! Domain-agnostic algorithms over a [`UniversalGraph`]. Every function here
//! is a pure read: the graph's records are never modified, only its derived
//! index is populated on demand.
//!
//! Submodules:
//! - `structural`: Form-layer criticality, centrality, clusters.
//! - `functional`: Function hierarchy, bottlenecks, redundancy, paths.
//! - `risk`: Failure-layer priority, propagation, cascades.
//! - `timeseries`: anomalies, trends, forecasts, correlation.

pub mod functional;
pub mod risk;
pub mod structural;
pub mod timeseries;

use crate::config::AnalysisConfig;
use crate::graph::UniversalGraph;
use functional::FunctionalReport;
use risk::RiskReport;
use serde::Serialize;
use serde_json::{Map, Value};
use structural::StructuralReport;
use timeseries::TimeSeriesReport;
use tracing::debug;

/// Entity counts and bookkeeping for one analyzed graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphSummary {
    pub form_elements: usize,
    pub functions: usize,
    pub failure_modes: usize,
    pub function_branches: usize,
    pub failure_branches: usize,
    pub performs: usize,
    pub rejected_links: usize,
    pub metadata: Map<String, Value>,
}

impl GraphSummary {
    #[must_use]
    pub fn of(graph: &UniversalGraph) -> Self {
        Self {
            form_elements: graph.form_elements().len(),
            functions: graph.functions().len(),
            failure_modes: graph.failure_modes().len(),
            function_branches: graph.function_branches().len(),
            failure_branches: graph.failure_branches().len(),
            performs: graph.performs().len(),
            rejected_links: graph.rejected_links(),
            metadata: graph.metadata().clone(),
        }
    }
}

/// Result of [`analyze`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub summary: GraphSummary,
    pub structural: StructuralReport,
    pub functional: FunctionalReport,
    pub risk: RiskReport,
    pub timeseries: TimeSeriesReport,
}

/// Run all four analyses.
#[must_use]
pub fn analyze(graph: &UniversalGraph, config: &AnalysisConfig) -> AnalysisReport {
    debug!(
        forms = graph.form_elements().len(),
        functions = graph.functions().len(),
        failures = graph.failure_modes().len(),
        "analyzing graph"
    );
    AnalysisReport {
        summary: GraphSummary::of(graph),
        structural: structural::analyze_structure(graph, config),
        functional: functional::analyze_functions(graph, config),
        risk: risk::analyze_failure_propagation(graph, config),
        timeseries: timeseries::analyze_timeseries(graph.form_elements(), config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FailureMode, FormElement, Function};

    #[test]
    fn empty_graph_yields_empty_report() {
        let report = analyze(&UniversalGraph::new(), &AnalysisConfig::default());
        assert_eq!(report.summary, GraphSummary::default());
        assert!(report.structural.criticality_scores.is_empty());
        assert!(report.functional.critical_paths.is_empty());
        assert!(report.risk.risk_priorities.is_empty());
        assert!(report.timeseries.correlations.is_empty());
    }

    #[test]
    fn summary_counts_entities_and_rejections() {
        let mut g = UniversalGraph::new();
        g.add_form_element(FormElement::new("A", "valve"));
        g.add_function(Function::new("F1", "Regulate"));
        g.add_failure_mode(FailureMode::new("M1", "Stuck"));
        g.link_form_to_function("A", "F1");
        g.link_form_to_function("A", "missing");
        g.set_metadata("domain", "process_plant");

        let report = analyze(&g, &AnalysisConfig::default());
        assert_eq!(report.summary.form_elements, 1);
        assert_eq!(report.summary.performs, 1);
        assert_eq!(report.summary.rejected_links, 1);
        assert_eq!(report.summary.metadata["domain"], "process_plant");
        assert_eq!(report.risk.risk_priorities.len(), 1);

        let json = serde_json::to_value(&report).expect("serialize");
        assert!(json["structural"]["connectivity"].is_object());
    }
}
