//! # Interchange Format
//!
//! JSON wire shape of a [`UniversalGraph`], used for transfer between a
//! domain adapter and the core and for saving graphs to disk.
//!
//! ```text
//! { form_elements, functions, failure_modes, function_branches,
//!   failure_branches, performs: [{form, function}], graph_metadata }
//! ```
//!
//! Every section is optional on input. A record whose `id` is missing or
//! empty takes its map key. The legacy `metadata` key is accepted for
//! `graph_metadata`.
//!
//! ## Loading order
//!
//! Functions are inserted unwired first; `parent_function` references are
//! re-applied once every function exists (a child may be serialized before
//! its parent), then each parent's children are put back in serialized order.
//! `parent_function` is authoritative: a `children` entry whose record names
//! another parent is dropped, and a declared parent that would close a cycle
//! is rejected and counted in `rejected_links`.
//!
//! ## Security
//!
//! Payload size is checked against `MAX_INTERCHANGE_PAYLOAD_SIZE` BEFORE
//! parsing.

use crate::graph::UniversalGraph;
use crate::primitives::MAX_INTERCHANGE_PAYLOAD_SIZE;
use crate::types::{
    FailureMode, FailurePropagationBranch, FormElement, FormId, Function, FunctionBranch,
    FunctionId, TrilayerError,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

// =============================================================================
// WIRE TYPES
// =============================================================================

/// One Form → Function "performs" link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformsLink {
    pub form: FormId,
    pub function: FunctionId,
}

/// Serializable snapshot of a [`UniversalGraph`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SerializedGraph {
    #[serde(default)]
    pub form_elements: BTreeMap<String, FormElement>,
    #[serde(default)]
    pub functions: BTreeMap<String, Function>,
    #[serde(default)]
    pub failure_modes: BTreeMap<String, FailureMode>,
    #[serde(default)]
    pub function_branches: Vec<FunctionBranch>,
    #[serde(default)]
    pub failure_branches: Vec<FailurePropagationBranch>,
    #[serde(default)]
    pub performs: Vec<PerformsLink>,
    #[serde(default, alias = "metadata")]
    pub graph_metadata: Map<String, Value>,
}

impl From<&UniversalGraph> for SerializedGraph {
    fn from(graph: &UniversalGraph) -> Self {
        Self {
            form_elements: graph
                .form_elements()
                .iter()
                .map(|(id, el)| (id.to_string(), el.clone()))
                .collect(),
            functions: graph
                .functions()
                .iter()
                .map(|(id, f)| (id.to_string(), f.clone()))
                .collect(),
            failure_modes: graph
                .failure_modes()
                .iter()
                .map(|(id, m)| (id.to_string(), m.clone()))
                .collect(),
            function_branches: graph.function_branches().to_vec(),
            failure_branches: graph.failure_branches().to_vec(),
            performs: graph
                .performs()
                .iter()
                .map(|(form, function)| PerformsLink {
                    form: form.clone(),
                    function: function.clone(),
                })
                .collect(),
            graph_metadata: graph.metadata().clone(),
        }
    }
}

impl From<SerializedGraph> for UniversalGraph {
    fn from(sg: SerializedGraph) -> Self {
        let mut graph = UniversalGraph::new();
        graph.replace_metadata(sg.graph_metadata);

        for (key, mut element) in sg.form_elements {
            if element.id.is_empty() {
                element.id = FormId::from(key);
            }
            graph.add_form_element(element);
        }

        // Pass 1: functions without wiring
        let mut declared: Vec<(FunctionId, Option<FunctionId>, Vec<FunctionId>)> = Vec::new();
        for (key, mut function) in sg.functions {
            if function.id.is_empty() {
                function.id = FunctionId::from(key);
            }
            let parent = function.parent.take();
            let children = std::mem::take(&mut function.children);
            declared.push((function.id.clone(), parent, children));
            graph.add_function(function);
        }

        // Pass 2: parent references, now that every function exists
        for (id, parent, _) in &declared {
            if let Some(parent) = parent {
                graph.add_child_function(parent.as_str(), id.as_str());
            }
        }

        // Pass 3: serialized child order
        for (id, _, order) in declared {
            let Some(function) = graph.function_mut(id.as_str()) else {
                continue;
            };
            let wired = std::mem::take(&mut function.children);
            let mut children: Vec<FunctionId> = Vec::with_capacity(wired.len());
            for child in order.into_iter().chain(wired.iter().cloned()) {
                if wired.contains(&child) && !children.contains(&child) {
                    children.push(child);
                }
            }
            function.children = children;
        }

        for (key, mut failure) in sg.failure_modes {
            if failure.id.is_empty() {
                failure.id = key.into();
            }
            graph.add_failure_mode(failure);
        }

        for link in sg.performs {
            graph.link_form_to_function(link.form.as_str(), link.function.as_str());
        }
        for branch in sg.function_branches {
            graph.add_function_branch(branch);
        }
        for branch in sg.failure_branches {
            graph.add_failure_branch(branch);
        }

        graph
    }
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

fn ensure_within_limit(len: usize, limit: usize) -> Result<(), TrilayerError> {
    if len > limit {
        return Err(TrilayerError::DeserializationError(format!(
            "Payload size {} bytes exceeds maximum allowed {} bytes",
            len, limit
        )));
    }
    Ok(())
}

/// Serialize a graph to pretty-printed interchange JSON.
pub fn graph_to_json(graph: &UniversalGraph) -> Result<String, TrilayerError> {
    serde_json::to_string_pretty(&SerializedGraph::from(graph))
        .map_err(|e| TrilayerError::SerializationError(e.to_string()))
}

/// Parse interchange JSON into a graph.
pub fn graph_from_json(json: &str) -> Result<UniversalGraph, TrilayerError> {
    ensure_within_limit(json.len(), MAX_INTERCHANGE_PAYLOAD_SIZE)?;
    let sg: SerializedGraph = serde_json::from_str(json)
        .map_err(|e| TrilayerError::DeserializationError(e.to_string()))?;
    Ok(UniversalGraph::from(sg))
}

/// Serialize a graph to an interchange JSON value.
pub fn graph_to_value(graph: &UniversalGraph) -> Result<Value, TrilayerError> {
    serde_json::to_value(SerializedGraph::from(graph))
        .map_err(|e| TrilayerError::SerializationError(e.to_string()))
}

/// Build a graph from an already-parsed interchange value.
pub fn graph_from_value(value: Value) -> Result<UniversalGraph, TrilayerError> {
    let sg: SerializedGraph = serde_json::from_value(value)
        .map_err(|e| TrilayerError::DeserializationError(e.to_string()))?;
    Ok(UniversalGraph::from(sg))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FailureId, parse_timestamp};
    use serde_json::json;

    fn sample() -> UniversalGraph {
        let mut g = UniversalGraph::new();
        let mut pump = FormElement::new("P1", "pump").with_characteristic("rated_kw", 15.5);
        let t = parse_timestamp("2024-02-01T06:00:00").expect("timestamp");
        pump.properties.add(t, "temperature", 61.0);
        g.add_form_element(pump);
        g.add_form_element(FormElement::new("V1", "valve"));

        g.add_function(Function::new("root", "Deliver water").with_outputs(["water"]));
        g.add_function(Function::new("pump", "Pressurize").with_inputs(["water"]));
        g.add_function(Function::new("meter", "Measure flow"));
        g.add_child_function("root", "pump");
        g.add_child_function("root", "meter");

        g.add_failure_mode(FailureMode::new("M1", "Seal leak").with_rating(7.0, 0.3, 4.0));
        g.add_failure_mode(FailureMode::new("M2", "Dry run").with_rating(9.0, 0.1, 2.0));
        g.link_form_to_function("P1", "pump");
        g.link_function_to_failure("pump", "M1");
        g.link_form_to_failure("V1", "M2");
        g.add_function_branch(FunctionBranch::new("pump", "meter").with_reliability(0.97));
        g.add_failure_branch(
            FailurePropagationBranch::new("M1", "M2")
                .with_probability(0.3)
                .with_mechanism("loss of prime"),
        );
        g.set_metadata("domain", "process_plant");
        g
    }

    #[test]
    fn json_roundtrip_preserves_everything() {
        let g = sample();
        let json = graph_to_json(&g).expect("serialize");
        let restored = graph_from_json(&json).expect("deserialize");

        assert_eq!(SerializedGraph::from(&restored), SerializedGraph::from(&g));
        assert_eq!(restored.index().edge_count(), g.index().edge_count());
        assert_eq!(restored.rejected_links(), 0);
    }

    #[test]
    fn child_listed_before_parent_is_rewired() {
        // "a_child" sorts before "z_parent", so it is inserted first
        let raw = json!({
            "functions": {
                "a_child": {"id": "a_child", "name": "Child", "parent_function": "z_parent"},
                "z_parent": {"id": "z_parent", "name": "Parent", "children": ["a_child"]}
            }
        });
        let g = graph_from_value(raw).expect("load");
        assert_eq!(
            g.function("a_child").and_then(|f| f.parent.clone()),
            Some(FunctionId::from("z_parent"))
        );
        assert_eq!(
            g.function("z_parent").map(|f| f.children.clone()),
            Some(vec![FunctionId::from("a_child")])
        );
        assert!(g.wiring_issues().is_empty());
    }

    #[test]
    fn serialized_child_order_is_kept() {
        let raw = json!({
            "functions": {
                "p": {"name": "Parent", "children": ["c3", "c1", "c2"]},
                "c1": {"name": "One", "parent_function": "p"},
                "c2": {"name": "Two", "parent_function": "p"},
                "c3": {"name": "Three", "parent_function": "p"}
            }
        });
        let g = graph_from_value(raw).expect("load");
        let order: Vec<_> = g
            .function("p")
            .map(|f| f.children.iter().map(|c| c.to_string()).collect())
            .unwrap_or_default();
        assert_eq!(order, vec!["c3", "c1", "c2"]);
    }

    #[test]
    fn missing_ids_inherit_map_keys_and_legacy_metadata_loads() {
        let raw = json!({
            "form_elements": {"T1": {"type": "tank"}},
            "failure_modes": {"M1": {"name": "Overflow", "severity": 6, "probability": 0.1}},
            "metadata": {"source": "legacy"}
        });
        let g = graph_from_value(raw).expect("load");
        assert_eq!(g.form_element("T1").map(|f| f.id.as_str()), Some("T1"));
        assert_eq!(
            g.failure_mode("M1").map(|m| m.id.clone()),
            Some(FailureId::from("M1"))
        );
        assert_eq!(g.metadata().get("source"), Some(&json!("legacy")));
    }

    #[test]
    fn dangling_branches_and_links_are_dropped() {
        let raw = json!({
            "functions": {"F1": {"name": "Only"}},
            "function_branches": [{"source": "F1", "target": "F9"}],
            "performs": [{"form": "nowhere", "function": "F1"}]
        });
        let g = graph_from_value(raw).expect("load");
        assert!(g.function_branches().is_empty());
        assert!(g.performs().is_empty());
        assert_eq!(g.rejected_links(), 2);
    }

    #[test]
    fn cyclic_declared_parents_are_rejected() {
        let raw = json!({
            "functions": {
                "a": {"name": "A", "parent_function": "b"},
                "b": {"name": "B", "parent_function": "a"}
            }
        });
        let g = graph_from_value(raw).expect("load");
        assert_eq!(g.rejected_links(), 1);
        assert!(g.wiring_issues().is_empty());
    }

    #[test]
    fn bad_timestamp_is_a_deserialization_error() {
        let raw = r#"{"form_elements": {"P1": {"type": "pump",
            "properties": {"timestamps": ["31/12/2024"], "values": {}}}}}"#;
        assert!(matches!(
            graph_from_json(raw),
            Err(TrilayerError::DeserializationError(_))
        ));
    }

    #[test]
    fn oversized_payload_rejected_before_parsing() {
        assert!(ensure_within_limit(10, 10).is_ok());
        assert!(matches!(
            ensure_within_limit(11, 10),
            Err(TrilayerError::DeserializationError(_))
        ));
    }
}
