//! # Analysis Configuration
//!
//! Tunable thresholds and cut-offs for one analysis call. Defaults come from
//! [`primitives`](crate::primitives); scoring weights are not configurable.
//!
//! Every field is optional when deserializing, so a partial TOML/JSON table
//! overrides only what it names.

use crate::primitives::{
    ANOMALY_Z_THRESHOLD, CORRELATION_THRESHOLD, CRITICAL_PATH_MAX_HOPS, CRITICAL_PATH_TOP_N,
    CRITICAL_RISK_THRESHOLD, DEFAULT_TOP_N, FORECAST_HORIZON, PROPAGATION_MAX_DEPTH,
};
use crate::types::TrilayerError;
use serde::{Deserialize, Serialize};

/// Thresholds and limits applied by the analysis modules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Structural bottlenecks reported.
    pub structural_top_n: usize,
    /// Functional bottlenecks reported.
    pub bottleneck_top_n: usize,
    /// Hop limit for root-to-leaf function paths.
    pub critical_path_max_hops: usize,
    /// Critical paths reported.
    pub critical_path_top_n: usize,
    /// Deepest failure still expanded during propagation discovery; targets
    /// one hop further are reported.
    pub propagation_max_depth: usize,
    /// Risk score above which a failure mode is critical.
    pub critical_risk_threshold: f64,
    /// z-score magnitude above which a sample is anomalous.
    pub anomaly_threshold: f64,
    /// Forecast steps per series.
    pub forecast_horizon: usize,
    /// |r| above which a property pair is reported as correlated.
    pub correlation_threshold: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            structural_top_n: DEFAULT_TOP_N,
            bottleneck_top_n: DEFAULT_TOP_N,
            critical_path_max_hops: CRITICAL_PATH_MAX_HOPS,
            critical_path_top_n: CRITICAL_PATH_TOP_N,
            propagation_max_depth: PROPAGATION_MAX_DEPTH,
            critical_risk_threshold: CRITICAL_RISK_THRESHOLD,
            anomaly_threshold: ANOMALY_Z_THRESHOLD,
            forecast_horizon: FORECAST_HORIZON,
            correlation_threshold: CORRELATION_THRESHOLD,
        }
    }
}

impl AnalysisConfig {
    /// Reject values no analysis can use.
    pub fn validate(&self) -> Result<(), TrilayerError> {
        if self.critical_path_max_hops == 0 {
            return Err(TrilayerError::ConfigError(
                "critical_path_max_hops must be at least 1".to_string(),
            ));
        }
        if self.propagation_max_depth == 0 {
            return Err(TrilayerError::ConfigError(
                "propagation_max_depth must be at least 1".to_string(),
            ));
        }
        if !(self.anomaly_threshold.is_finite() && self.anomaly_threshold >= 0.0) {
            return Err(TrilayerError::ConfigError(format!(
                "anomaly_threshold must be a non-negative number, got {}",
                self.anomaly_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.correlation_threshold) {
            return Err(TrilayerError::ConfigError(format!(
                "correlation_threshold must lie in [0, 1], got {}",
                self.correlation_threshold
            )));
        }
        if !self.critical_risk_threshold.is_finite() {
            return Err(TrilayerError::ConfigError(
                "critical_risk_threshold must be finite".to_string(),
            ));
        }
        Ok(())
    }
}
