//! Form, Function and Failure layer entities and their branch records.

use super::{FailureId, FormId, FunctionId, TimeSeriesData};
use crate::primitives::{DEFAULT_CONNECTION_TYPE, DETECTABILITY_SCALE};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// =============================================================================
// FORM LAYER
// =============================================================================

/// A physical or logical structural element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormElement {
    #[serde(default)]
    pub id: FormId,
    /// Free-form type tag ("pump", "account", "sensor", ...).
    #[serde(rename = "type", default)]
    pub element_type: String,
    /// Static characteristics of any JSON type.
    #[serde(default)]
    pub characteristics: BTreeMap<String, Value>,
    /// Time-varying properties.
    #[serde(default)]
    pub properties: TimeSeriesData,
}

impl FormElement {
    /// Create an element with no characteristics or samples.
    #[must_use]
    pub fn new(id: impl Into<FormId>, element_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            element_type: element_type.into(),
            ..Self::default()
        }
    }

    /// Set a static characteristic, replacing any previous value.
    #[must_use]
    pub fn with_characteristic(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.characteristics.insert(name.into(), value.into());
        self
    }
}

// =============================================================================
// FUNCTION LAYER
// =============================================================================

/// A node of the behavioral decomposition.
///
/// `parent` and `children` are non-owning id references into the graph's
/// function arena. Wiring is maintained by
/// [`UniversalGraph::add_child_function`](crate::UniversalGraph::add_child_function).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Function {
    #[serde(default)]
    pub id: FunctionId,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "parent_function", default)]
    pub parent: Option<FunctionId>,
    #[serde(default)]
    pub children: Vec<FunctionId>,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default)]
    pub performance_metrics: BTreeMap<String, Value>,
}

impl Function {
    /// Create an unwired function.
    #[must_use]
    pub fn new(id: impl Into<FunctionId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_inputs<I, S>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs = inputs.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_outputs<I, S>(mut self, outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outputs = outputs.into_iter().map(Into::into).collect();
        self
    }

    /// Output names sorted and deduplicated; the redundancy grouping key.
    #[must_use]
    pub fn output_signature(&self) -> Vec<String> {
        let mut sig = self.outputs.clone();
        sig.sort();
        sig.dedup();
        sig
    }
}

// =============================================================================
// FAILURE LAYER
// =============================================================================

/// A way the system can fail.
///
/// The four relationship lists are the authoritative record of impact and
/// propagation; the traversal index is derived from them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FailureMode {
    #[serde(default)]
    pub id: FailureId,
    #[serde(default)]
    pub name: String,
    /// Domain scale (FMEA uses 1-10).
    #[serde(default)]
    pub severity: f64,
    /// Occurrence probability in `[0, 1]`.
    #[serde(default)]
    pub probability: f64,
    /// Domain scale, 0 meaning "assume undetectable".
    #[serde(default)]
    pub detectability: f64,
    #[serde(default)]
    pub affects_functions: Vec<FunctionId>,
    #[serde(default)]
    pub affects_forms: Vec<FormId>,
    #[serde(default)]
    pub propagates_to: Vec<FailureId>,
    #[serde(default)]
    pub mitigated_by: Vec<String>,
}

impl FailureMode {
    #[must_use]
    pub fn new(id: impl Into<FailureId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set severity, probability and detectability in one call.
    #[must_use]
    pub fn with_rating(mut self, severity: f64, probability: f64, detectability: f64) -> Self {
        self.severity = severity;
        self.probability = probability;
        self.detectability = detectability;
        self
    }

    /// `severity × probability × (1 − detectability/10)`.
    ///
    /// A detectability of 0 applies no discount.
    #[must_use]
    pub fn risk_score(&self) -> f64 {
        let detect_factor = if self.detectability > 0.0 {
            1.0 - self.detectability / DETECTABILITY_SCALE
        } else {
            1.0
        };
        self.severity * self.probability * detect_factor
    }

    /// Number of declared affected functions and forms.
    #[must_use]
    pub fn impact_count(&self) -> usize {
        self.affects_functions.len() + self.affects_forms.len()
    }
}

// =============================================================================
// BRANCHES
// =============================================================================

fn default_connection_type() -> String {
    DEFAULT_CONNECTION_TYPE.to_string()
}

fn default_unit() -> f64 {
    1.0
}

/// Directed flow between two functions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionBranch {
    pub source: FunctionId,
    pub target: FunctionId,
    /// "sequential", "parallel", "conditional", ...
    #[serde(default = "default_connection_type")]
    pub connection_type: String,
    #[serde(default = "default_unit")]
    pub reliability: f64,
    #[serde(default)]
    pub latency: f64,
}

impl FunctionBranch {
    /// A sequential, fully reliable, zero-latency branch.
    #[must_use]
    pub fn new(source: impl Into<FunctionId>, target: impl Into<FunctionId>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            connection_type: default_connection_type(),
            reliability: 1.0,
            latency: 0.0,
        }
    }

    #[must_use]
    pub fn with_reliability(mut self, reliability: f64) -> Self {
        self.reliability = reliability;
        self
    }

    #[must_use]
    pub fn with_latency(mut self, latency: f64) -> Self {
        self.latency = latency;
        self
    }

    #[must_use]
    pub fn with_connection_type(mut self, connection_type: impl Into<String>) -> Self {
        self.connection_type = connection_type.into();
        self
    }
}

/// Directed propagation between two failure modes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailurePropagationBranch {
    pub source: FailureId,
    pub target: FailureId,
    #[serde(default = "default_unit")]
    pub propagation_probability: f64,
    #[serde(default)]
    pub propagation_mechanism: String,
}

impl FailurePropagationBranch {
    /// A certain propagation with no named mechanism.
    #[must_use]
    pub fn new(source: impl Into<FailureId>, target: impl Into<FailureId>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            propagation_probability: 1.0,
            propagation_mechanism: String::new(),
        }
    }

    #[must_use]
    pub fn with_probability(mut self, probability: f64) -> Self {
        self.propagation_probability = probability;
        self
    }

    #[must_use]
    pub fn with_mechanism(mut self, mechanism: impl Into<String>) -> Self {
        self.propagation_mechanism = mechanism.into();
        self
    }
}

// =============================================================================
// TESTS
// =============================================================================
