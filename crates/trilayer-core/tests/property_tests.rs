//! # Property-Based Tests
//!
//! Invariants that must hold for arbitrary, partially dangling and cyclic
//! input graphs.

use proptest::collection::vec;
use proptest::prelude::*;
use trilayer_core::analysis::{functional, risk, structural, timeseries};
use trilayer_core::{
    AnalysisConfig, FailureMode, FailurePropagationBranch, FormElement, Function, FunctionBranch,
    UniversalGraph, analyze, graph_from_json, graph_to_json, parse_timestamp,
};

/// Entity counts plus link endpoints as raw indices. Indices past the entity
/// count produce dangling links.
#[derive(Debug, Clone)]
struct Blueprint {
    forms: usize,
    functions: usize,
    failures: usize,
    performs: Vec<(usize, usize)>,
    hierarchy: Vec<(usize, usize)>,
    flows: Vec<(usize, usize, f64)>,
    affects: Vec<(usize, usize)>,
    propagations: Vec<(usize, usize, f64)>,
}

/// Probabilities on a 1% grid, so JSON round trips compare exactly.
fn percent() -> impl Strategy<Value = f64> {
    (0u32..=100).prop_map(|p| f64::from(p) / 100.0)
}

fn blueprint() -> impl Strategy<Value = Blueprint> {
    (
        1usize..8,
        1usize..8,
        1usize..8,
        vec((0usize..10, 0usize..10), 0..12),
        vec((0usize..10, 0usize..10), 0..8),
        vec((0usize..10, 0usize..10, percent()), 0..12),
        vec((0usize..10, 0usize..10), 0..12),
        vec((0usize..10, 0usize..10, percent()), 0..12),
    )
        .prop_map(
            |(forms, functions, failures, performs, hierarchy, flows, affects, propagations)| {
                Blueprint {
                    forms,
                    functions,
                    failures,
                    performs,
                    hierarchy,
                    flows,
                    affects,
                    propagations,
                }
            },
        )
}

fn build(bp: &Blueprint) -> UniversalGraph {
    let mut g = UniversalGraph::new();
    for i in 0..bp.forms {
        g.add_form_element(FormElement::new(format!("form{i}"), "part"));
    }
    for i in 0..bp.functions {
        g.add_function(Function::new(format!("fn{i}"), format!("Function {i}")));
    }
    for i in 0..bp.failures {
        let step = i as f64;
        g.add_failure_mode(
            FailureMode::new(format!("fm{i}"), format!("Failure {i}"))
                .with_rating(step + 1.0, (step + 1.0) / 10.0, step),
        );
    }

    for &(a, b) in &bp.performs {
        g.link_form_to_function(&format!("form{a}"), &format!("fn{b}"));
    }
    for &(p, c) in &bp.hierarchy {
        g.add_child_function(&format!("fn{p}"), &format!("fn{c}"));
    }
    for &(s, t, r) in &bp.flows {
        g.add_function_branch(
            FunctionBranch::new(format!("fn{s}"), format!("fn{t}"))
                .with_reliability(r)
                .with_latency(r * 150.0),
        );
    }
    for &(f, m) in &bp.affects {
        g.link_function_to_failure(&format!("fn{f}"), &format!("fm{m}"));
    }
    for &(s, t, p) in &bp.propagations {
        g.add_failure_branch(
            FailurePropagationBranch::new(format!("fm{s}"), format!("fm{t}")).with_probability(p),
        );
    }
    g
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Performs links are rejected exactly when an endpoint is missing.
    #[test]
    fn dangling_performs_are_counted(bp in blueprint()) {
        let g = build(&bp);
        let expected_rejections = bp
            .performs
            .iter()
            .filter(|(a, b)| *a >= bp.forms || *b >= bp.functions)
            .count();
        prop_assert_eq!(g.performs().len(), bp.performs.len() - expected_rejections);
    }

    /// The hierarchy invariant holds however links are attempted.
    #[test]
    fn hierarchy_never_has_wiring_issues(bp in blueprint()) {
        let g = build(&bp);
        prop_assert!(g.wiring_issues().is_empty());
        let hierarchy = functional::build_function_hierarchy(&g);
        prop_assert_eq!(hierarchy.total_functions, bp.functions);
        prop_assert!(hierarchy.max_depth < bp.functions);
    }

    /// Full analysis completes on arbitrary graphs and stays in range.
    #[test]
    fn analysis_is_total_and_bounded(bp in blueprint()) {
        let g = build(&bp);
        let report = analyze(&g, &AnalysisConfig::default());

        for score in report.structural.criticality_scores.values() {
            prop_assert!((0.0..=1.0 + 1e-9).contains(score));
        }
        prop_assert!((0.0..=1.0).contains(&report.functional.redundancy.redundancy_score));
        for path in &report.functional.critical_paths {
            prop_assert!((0.0..=1.0).contains(&path.reliability));
            prop_assert!(path.length >= 2);
        }
        for p in &report.risk.propagation_paths {
            prop_assert!((0.0..=1.0).contains(&p.propagation_probability));
            prop_assert!(!p.reachable_failures.contains(&p.source_failure));
        }
    }

    /// Cascade probability never exceeds the initiating probability and
    /// every reach probability is a probability.
    #[test]
    fn cascades_are_monotone(bp in blueprint()) {
        let g = build(&bp);
        for failure in g.failure_modes().values() {
            let scenario = risk::simulate_cascade(&g, failure).expect("indexed failure");
            prop_assert!(scenario.cascade_probability <= failure.probability + 1e-12);
            prop_assert!(scenario.cascade_probability >= 0.0);
            for p in scenario.reach_probabilities.values() {
                prop_assert!((0.0..=1.0).contains(p));
            }
        }
    }

    /// Serialization round trip preserves the whole model.
    #[test]
    fn round_trip_is_lossless(bp in blueprint()) {
        let g = build(&bp);
        let restored = graph_from_json(&graph_to_json(&g).expect("serialize")).expect("parse");
        prop_assert_eq!(restored.functions(), g.functions());
        prop_assert_eq!(restored.failure_modes(), g.failure_modes());
        prop_assert_eq!(restored.function_branches(), g.function_branches());
        prop_assert_eq!(restored.failure_branches(), g.failure_branches());
        prop_assert_eq!(restored.performs(), g.performs());
        prop_assert_eq!(restored.rejected_links(), 0);
    }

    /// Same input, same criticality.
    #[test]
    fn criticality_is_deterministic(bp in blueprint()) {
        let a = build(&bp);
        let b = build(&bp);
        prop_assert_eq!(structural::compute_criticality(&a), structural::compute_criticality(&b));
    }

    /// risk = severity × probability × (1 − detectability/10).
    #[test]
    fn risk_score_formula(
        severity in 0.0f64..10.0,
        probability in 0.0f64..=1.0,
        detectability in 0.0f64..10.0,
    ) {
        let failure = FailureMode::new("m", "m").with_rating(severity, probability, detectability);
        let factor = if detectability > 0.0 { 1.0 - detectability / 10.0 } else { 1.0 };
        prop_assert!((failure.risk_score() - severity * probability * factor).abs() < 1e-9);
    }

    /// Constant series have no anomalies at any threshold.
    #[test]
    fn constant_series_never_anomalous(
        value in -1.0e6f64..1.0e6,
        len in 3usize..30,
        threshold in 0.0f64..5.0,
    ) {
        let mut element = FormElement::new("s", "sensor");
        let start = parse_timestamp("2024-01-01T00:00:00").expect("timestamp");
        for i in 0..len {
            element.properties.add(start + chrono::Duration::seconds(i as i64), "v", value);
        }
        let forms = std::collections::BTreeMap::from([(element.id.clone(), element)]);
        prop_assert!(timeseries::detect_anomalies(&forms, threshold).is_empty());
    }
}
