//! # Domain Mapper
//!
//! The boundary between a domain (automotive, process plant, finance, ...)
//! and the core. A mapper turns a domain payload into a [`UniversalGraph`]
//! and turns the domain-agnostic [`AnalysisReport`] back into a domain
//! shape.
//!
//! Mappers are selected by name through a [`DomainRegistry`]. The registry is
//! built once by the caller and passed by reference; the core holds no global
//! registry.

use crate::analysis::{AnalysisReport, analyze};
use crate::config::AnalysisConfig;
use crate::formats::graph_from_value;
use crate::graph::UniversalGraph;
use crate::types::{FailureMode, FormElement, Function, TrilayerError};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

/// Version reported by the default [`DomainMapper::metadata`].
pub const MAPPER_VERSION: &str = "1.0";

// =============================================================================
// DOMAIN MAPPER TRAIT
// =============================================================================

/// Maps one domain to and from the three-layer model.
///
/// Mappers must be `Send + Sync`; they hold configuration at most, never
/// per-call state. Any error a mapper returns reaches the caller of
/// [`run_domain_analysis`] unchanged.
pub trait DomainMapper: Send + Sync {
    /// Registry key, e.g. `"automotive"`.
    fn domain_name(&self) -> &str;

    /// Build the full graph from a domain payload.
    fn map_to_universal_graph(&self, domain_data: &Value) -> Result<UniversalGraph, TrilayerError>;

    fn map_form_element(&self, domain_element: &Value) -> Result<FormElement, TrilayerError>;

    fn map_function(&self, domain_function: &Value) -> Result<Function, TrilayerError>;

    fn map_failure_mode(&self, domain_failure: &Value) -> Result<FailureMode, TrilayerError>;

    /// Render an analysis report in the domain's vocabulary.
    fn format_results(
        &self,
        report: &AnalysisReport,
        graph: &UniversalGraph,
    ) -> Result<Value, TrilayerError>;

    /// Cheap shape check run before mapping.
    fn validate_domain_data(&self, _domain_data: &Value) -> bool {
        true
    }

    fn metadata(&self) -> Map<String, Value> {
        let mut meta = Map::new();
        meta.insert("domain".to_string(), json!(self.domain_name()));
        meta.insert("version".to_string(), json!(MAPPER_VERSION));
        meta
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

/// String-keyed set of mappers.
#[derive(Default)]
pub struct DomainRegistry {
    mappers: BTreeMap<String, Box<dyn DomainMapper>>,
}

impl fmt::Debug for DomainRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainRegistry")
            .field("domains", &self.mappers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl DomainRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in [`InterchangeMapper`].
    #[must_use]
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(InterchangeMapper);
        registry
    }

    /// Register a mapper under its `domain_name`.
    ///
    /// A mapper already registered under that name is replaced and returned.
    pub fn register(&mut self, mapper: impl DomainMapper + 'static) -> Option<Box<dyn DomainMapper>> {
        let name = mapper.domain_name().to_string();
        let previous = self.mappers.insert(name.clone(), Box::new(mapper));
        if previous.is_some() {
            warn!(domain = %name, "domain mapper replaced");
        } else {
            debug!(domain = %name, "domain mapper registered");
        }
        previous
    }

    #[must_use]
    pub fn get(&self, domain: &str) -> Option<&dyn DomainMapper> {
        self.mappers.get(domain).map(|m| m.as_ref())
    }

    /// Registered domain names in order.
    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.mappers.keys().map(String::as_str)
    }

    /// Metadata of every registered mapper.
    #[must_use]
    pub fn describe(&self) -> Vec<Map<String, Value>> {
        self.mappers.values().map(|m| m.metadata()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.mappers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mappers.is_empty()
    }
}

// =============================================================================
// PIPELINE
// =============================================================================

/// Look up, validate, map, analyze, format.
pub fn run_domain_analysis(
    registry: &DomainRegistry,
    domain: &str,
    domain_data: &Value,
    config: &AnalysisConfig,
) -> Result<Value, TrilayerError> {
    config.validate()?;
    let mapper = registry
        .get(domain)
        .ok_or_else(|| TrilayerError::UnknownDomain(domain.to_string()))?;

    if !mapper.validate_domain_data(domain_data) {
        return Err(TrilayerError::InvalidDomainData(domain.to_string()));
    }

    let graph = mapper.map_to_universal_graph(domain_data)?;
    debug!(
        domain = %domain,
        rejected_links = graph.rejected_links(),
        "domain payload mapped"
    );
    let report = analyze(&graph, config);
    mapper.format_results(&report, &graph)
}

// =============================================================================
// INTERCHANGE MAPPER
// =============================================================================

/// Identity mapper for the serialized interchange format.
#[derive(Debug, Clone, Copy, Default)]
pub struct InterchangeMapper;

impl InterchangeMapper {
    /// Registry key.
    pub const DOMAIN: &'static str = "universal";
}

fn record<T: DeserializeOwned>(value: &Value) -> Result<T, TrilayerError> {
    serde_json::from_value(value.clone())
        .map_err(|e| TrilayerError::DeserializationError(e.to_string()))
}

impl DomainMapper for InterchangeMapper {
    fn domain_name(&self) -> &str {
        Self::DOMAIN
    }

    fn map_to_universal_graph(&self, domain_data: &Value) -> Result<UniversalGraph, TrilayerError> {
        graph_from_value(domain_data.clone())
    }

    fn map_form_element(&self, domain_element: &Value) -> Result<FormElement, TrilayerError> {
        record(domain_element)
    }

    fn map_function(&self, domain_function: &Value) -> Result<Function, TrilayerError> {
        record(domain_function)
    }

    fn map_failure_mode(&self, domain_failure: &Value) -> Result<FailureMode, TrilayerError> {
        record(domain_failure)
    }

    fn format_results(
        &self,
        report: &AnalysisReport,
        _graph: &UniversalGraph,
    ) -> Result<Value, TrilayerError> {
        let results = serde_json::to_value(report)
            .map_err(|e| TrilayerError::SerializationError(e.to_string()))?;
        Ok(json!({
            "domain": self.domain_name(),
            "metadata": self.metadata(),
            "results": results,
        }))
    }

    fn validate_domain_data(&self, domain_data: &Value) -> bool {
        domain_data.is_object()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use thiserror::Error;

    #[derive(Debug, Error)]
    #[error("kitchen inventory is locked")]
    struct InventoryLocked;

    /// Appliances become forms; each appliance's hazard becomes a failure.
    struct KitchenMapper {
        locked: bool,
    }

    impl DomainMapper for KitchenMapper {
        fn domain_name(&self) -> &str {
            "kitchen"
        }

        fn map_to_universal_graph(&self, data: &Value) -> Result<UniversalGraph, TrilayerError> {
            if self.locked {
                return Err(TrilayerError::domain(InventoryLocked));
            }
            let mut graph = UniversalGraph::new();
            for appliance in data["appliances"].as_array().into_iter().flatten() {
                let form = self.map_form_element(appliance)?;
                let failure = self.map_failure_mode(appliance)?;
                let (form_id, failure_id) = (form.id.to_string(), failure.id.to_string());
                graph.add_form_element(form);
                graph.add_failure_mode(failure);
                graph.link_form_to_failure(&form_id, &failure_id);
            }
            Ok(graph)
        }

        fn map_form_element(&self, e: &Value) -> Result<FormElement, TrilayerError> {
            Ok(FormElement::new(e["name"].as_str().unwrap_or_default(), "appliance"))
        }

        fn map_function(&self, f: &Value) -> Result<Function, TrilayerError> {
            let name = f["name"].as_str().unwrap_or_default();
            Ok(Function::new(name, name))
        }

        fn map_failure_mode(&self, e: &Value) -> Result<FailureMode, TrilayerError> {
            let name = e["name"].as_str().unwrap_or_default();
            let hazard = e["hazard"].as_f64().unwrap_or_default();
            Ok(FailureMode::new(format!("{name}-hazard"), "Hazard").with_rating(hazard, 0.5, 0.0))
        }

        fn format_results(
            &self,
            report: &AnalysisReport,
            _graph: &UniversalGraph,
        ) -> Result<Value, TrilayerError> {
            let top = report.risk.risk_priorities.first().map(|p| p.failure_id.to_string());
            Ok(json!({ "most_dangerous": top }))
        }

        fn validate_domain_data(&self, data: &Value) -> bool {
            data["appliances"].is_array()
        }
    }

    fn registry() -> DomainRegistry {
        let mut registry = DomainRegistry::with_builtin();
        registry.register(KitchenMapper { locked: false });
        registry
    }

    #[test]
    fn pipeline_maps_analyzes_and_formats() {
        let data = json!({"appliances": [
            {"name": "toaster", "hazard": 3.0},
            {"name": "oven", "hazard": 8.0}
        ]});
        let out = run_domain_analysis(&registry(), "kitchen", &data, &AnalysisConfig::default())
            .expect("analysis");
        assert_eq!(out["most_dangerous"], "oven-hazard");
    }

    #[test]
    fn unknown_domain_is_reported() {
        let err = run_domain_analysis(&registry(), "bakery", &json!({}), &AnalysisConfig::default())
            .expect_err("unknown");
        assert!(matches!(err, TrilayerError::UnknownDomain(ref d) if d == "bakery"));
    }

    #[test]
    fn invalid_payload_is_rejected_before_mapping() {
        let err = run_domain_analysis(&registry(), "kitchen", &json!([]), &AnalysisConfig::default())
            .expect_err("invalid");
        assert!(matches!(err, TrilayerError::InvalidDomainData(_)));
    }

    #[test]
    fn mapper_errors_pass_through_unchanged() {
        let mut registry = DomainRegistry::new();
        registry.register(KitchenMapper { locked: true });
        let err = run_domain_analysis(
            &registry,
            "kitchen",
            &json!({"appliances": []}),
            &AnalysisConfig::default(),
        )
        .expect_err("locked");
        assert!(matches!(err, TrilayerError::Domain(_)));
        assert_eq!(err.to_string(), "kitchen inventory is locked");
    }

    #[test]
    fn re_registering_replaces_the_mapper() {
        let mut registry = registry();
        let previous = registry.register(KitchenMapper { locked: true });
        assert!(previous.is_some());
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.domains().collect::<Vec<_>>(), vec!["kitchen", "universal"]);
    }

    #[test]
    fn default_metadata_names_domain_and_version() {
        let meta = InterchangeMapper.metadata();
        assert_eq!(meta["domain"], "universal");
        assert_eq!(meta["version"], MAPPER_VERSION);
        assert_eq!(registry().describe().len(), 2);
    }

    #[test]
    fn interchange_mapper_runs_serialized_graphs() {
        let data = json!({
            "form_elements": {"A": {"type": "actuator"}},
            "functions": {"F1": {"name": "Actuate"}},
            "failure_modes": {"M1": {
                "name": "Jam", "severity": 9.0, "probability": 0.2, "detectability": 3.0,
                "affects_functions": ["F1"]
            }},
            "performs": [{"form": "A", "function": "F1"}]
        });
        let out = run_domain_analysis(
            &registry(),
            InterchangeMapper::DOMAIN,
            &data,
            &AnalysisConfig::default(),
        )
        .expect("analysis");
        assert_eq!(out["domain"], "universal");
        let top = &out["results"]["risk"]["risk_priorities"][0];
        assert!((top["risk_score"].as_f64().expect("score") - 1.26).abs() < 1e-9);
        assert_eq!(top["forms_affected"], json!(["A"]));
    }

    #[test]
    fn interchange_records_map_individually() {
        let function = InterchangeMapper
            .map_function(&json!({"id": "F1", "name": "Pump", "outputs": ["flow"]}))
            .expect("function");
        assert_eq!(function.outputs, vec!["flow".to_string()]);
        assert!(InterchangeMapper.map_failure_mode(&json!("nope")).is_err());
    }
}
