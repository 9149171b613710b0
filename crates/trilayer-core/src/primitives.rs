//! # Innate Primitives
//!
//! Hardcoded scoring weights, thresholds and structural limits for the
//! Trilayer CORE.
//!
//! These are compiled into the binary. Tunable values (thresholds, depths,
//! top-N cut-offs) take their defaults from here through
//! [`AnalysisConfig`](crate::config::AnalysisConfig); the weights are fixed so
//! that every domain is scored by the same model.

// =============================================================================
// STRUCTURAL ANALYSIS
// =============================================================================

/// Weight of betweenness centrality in Form criticality.
pub const CENTRALITY_WEIGHT: f64 = 0.3;

/// Weight of the function-dependency score in Form criticality.
pub const FUNCTION_DEPENDENCY_WEIGHT: f64 = 0.4;

/// Weight of the failure-impact score in Form criticality.
pub const FAILURE_IMPACT_WEIGHT: f64 = 0.3;

/// Extra dependency credit per descendant of a performed function.
pub const DESCENDANT_WEIGHT: f64 = 0.1;

/// Betweenness above which a structural bottleneck is flagged critical.
pub const STRUCTURAL_CRITICAL_BETWEENNESS: f64 = 0.1;

/// Default number of bottlenecks reported (structural and functional).
pub const DEFAULT_TOP_N: usize = 5;

// =============================================================================
// FUNCTIONAL ANALYSIS
// =============================================================================

/// Weight of in-degree in the function bottleneck score.
pub const IN_DEGREE_WEIGHT: f64 = 0.3;

/// Weight of branch unreliability in the function bottleneck score.
pub const UNRELIABILITY_WEIGHT: f64 = 0.4;

/// Weight of normalized branch latency in the function bottleneck score.
pub const LATENCY_WEIGHT: f64 = 0.3;

/// Latency that saturates the latency term of the bottleneck score.
pub const LATENCY_SATURATION: f64 = 100.0;

/// Bottleneck score above which a function is flagged critical.
pub const FUNCTION_CRITICAL_SCORE: f64 = 0.5;

/// Maximum hops of an enumerated root-to-leaf function path.
pub const CRITICAL_PATH_MAX_HOPS: usize = 10;

/// Number of critical paths reported.
pub const CRITICAL_PATH_TOP_N: usize = 10;

/// Hard cap on simple paths enumerated in one analysis call.
///
/// All-simple-paths is exponential on dense graphs; the hop limit alone
/// does not bound it.
pub const MAX_ENUMERATED_PATHS: usize = 10_000;

/// Connection type given to a function branch when none is supplied.
pub const DEFAULT_CONNECTION_TYPE: &str = "sequential";

// =============================================================================
// RISK ANALYSIS
// =============================================================================

/// Detectability scale divisor: `1 - detectability / DETECTABILITY_SCALE`.
pub const DETECTABILITY_SCALE: f64 = 10.0;

/// Default hop limit for propagation-path discovery.
pub const PROPAGATION_MAX_DEPTH: usize = 5;

/// Default risk score above which a failure mode is critical.
pub const CRITICAL_RISK_THRESHOLD: f64 = 0.5;

/// Impact count above which a failure mode is critical.
pub const CRITICAL_IMPACT_COUNT: usize = 5;

/// Propagation count above which a failure mode is critical.
pub const CRITICAL_PROPAGATION_COUNT: usize = 3;

/// Criticality bonus per affected function or form.
pub const IMPACT_BONUS: f64 = 0.1;

/// Criticality bonus per propagation target.
pub const PROPAGATION_BONUS: f64 = 0.2;

/// Propagation probability assumed for a `propagates_to` entry with no branch.
pub const DEFAULT_PROPAGATION_PROBABILITY: f64 = 1.0;

// =============================================================================
// TIME-SERIES ANALYSIS
// =============================================================================

/// Minimum numeric samples before a property series is analyzed.
pub const MIN_SERIES_SAMPLES: usize = 3;

/// Default z-score magnitude that marks a sample anomalous.
pub const ANOMALY_Z_THRESHOLD: f64 = 2.0;

/// Slope magnitude below which a trend is "stable".
pub const STABLE_SLOPE: f64 = 0.01;

/// Default number of forecast steps.
pub const FORECAST_HORIZON: usize = 5;

/// Default |r| above which two series are reported as correlated.
pub const CORRELATION_THRESHOLD: f64 = 0.7;

/// |r| above which a correlation is tagged "strong".
pub const STRONG_CORRELATION: f64 = 0.9;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum size of a serialized interchange payload (256 MB).
///
/// Checked BEFORE parsing to prevent allocation-based exhaustion.
pub const MAX_INTERCHANGE_PAYLOAD_SIZE: usize = 256 * 1024 * 1024;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn criticality_weights_sum_to_one() {
        let total = CENTRALITY_WEIGHT + FUNCTION_DEPENDENCY_WEIGHT + FAILURE_IMPACT_WEIGHT;
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn bottleneck_weights_sum_to_one() {
        let total = IN_DEGREE_WEIGHT + UNRELIABILITY_WEIGHT + LATENCY_WEIGHT;
        assert!((total - 1.0).abs() < 1e-12);
    }
}
