//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use super::Section;
use crate::settings::Settings;
use serde::Serialize;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use trilayer_core::{
    AnalysisReport, DomainRegistry, InterchangeMapper, TrilayerError, UniversalGraph,
    analysis::risk::{CascadeScenario, analyze_cascading_failures, simulate_cascade},
    analyze, graph_from_json, graph_from_value, graph_to_json,
    primitives::MAX_INTERCHANGE_PAYLOAD_SIZE,
    run_domain_analysis,
};

// =============================================================================
// JSON DOCUMENTS
// =============================================================================

/// Largest input document; matches the interchange payload limit.
const MAX_INPUT_FILE_SIZE: u64 = MAX_INTERCHANGE_PAYLOAD_SIZE as u64;

/// Whether a command reads a JSON document or writes one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Read,
    Write,
}

/// Canonical location of the JSON document a command reads or writes.
///
/// Inputs must be regular files within the payload limit. Outputs need an
/// existing parent directory and must not name a directory themselves.
fn json_document(path: &Path, access: Access) -> Result<PathBuf, TrilayerError> {
    let invalid = |reason: String| {
        TrilayerError::IoError(format!("Invalid path '{}': {}", path.display(), reason))
    };

    let resolved = match access {
        Access::Read => path.canonicalize().map_err(|e| invalid(e.to_string()))?,
        Access::Write => {
            let name = path
                .file_name()
                .ok_or_else(|| invalid("no file name".to_string()))?;
            let parent = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            parent
                .canonicalize()
                .map_err(|e| invalid(format!("output directory: {}", e)))?
                .join(name)
        }
    };

    if resolved.is_dir() {
        return Err(invalid("is a directory".to_string()));
    }
    if access == Access::Read {
        let size = std::fs::metadata(&resolved)
            .map_err(|e| invalid(e.to_string()))?
            .len();
        if size > MAX_INPUT_FILE_SIZE {
            return Err(TrilayerError::DeserializationError(format!(
                "File size {} bytes exceeds maximum allowed {} bytes",
                size, MAX_INPUT_FILE_SIZE
            )));
        }
    }
    Ok(resolved)
}

/// Read a validated, size-checked input document.
pub fn read_input(path: &Path) -> Result<String, TrilayerError> {
    let document = json_document(path, Access::Read)?;
    std::fs::read_to_string(&document)
        .map_err(|e| TrilayerError::IoError(format!("Read file: {}", e)))
}

/// Load an interchange file into a graph.
pub fn load_graph(path: &Path) -> Result<UniversalGraph, TrilayerError> {
    let graph = graph_from_json(&read_input(path)?)?;
    if graph.rejected_links() > 0 {
        tracing::warn!(
            file = %path.display(),
            rejected = graph.rejected_links(),
            "dangling links dropped while loading"
        );
    }
    Ok(graph)
}

fn print_json(value: &impl Serialize) -> Result<(), TrilayerError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| TrilayerError::SerializationError(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Counts and wiring problems of a graph.
pub fn status_json(graph: &UniversalGraph) -> Value {
    json!({
        "form_elements": graph.form_elements().len(),
        "functions": graph.functions().len(),
        "failure_modes": graph.failure_modes().len(),
        "performs": graph.performs().len(),
        "function_branches": graph.function_branches().len(),
        "failure_branches": graph.failure_branches().len(),
        "root_functions": graph.root_functions().len(),
        "leaf_functions": graph.leaf_functions().len(),
        "rejected_links": graph.rejected_links(),
        "wiring_issues": graph.wiring_issues(),
    })
}

/// Show graph status.
pub fn cmd_status(file: &Path, json_mode: bool) -> Result<(), TrilayerError> {
    let graph = load_graph(file)?;

    if json_mode {
        return print_json(&status_json(&graph));
    }

    let index = graph.index();
    println!("Trilayer Graph Status");
    println!("=====================");
    println!("File: {:?}", file);
    println!();
    println!("Form elements:  {}", graph.form_elements().len());
    println!("Functions:      {}", graph.functions().len());
    println!("Failure modes:  {}", graph.failure_modes().len());
    println!("Index nodes:    {}", index.node_count());
    println!("Index edges:    {}", index.edge_count());
    println!("Rejected links: {}", graph.rejected_links());

    let issues = graph.wiring_issues();
    if !issues.is_empty() {
        println!();
        println!("Wiring issues: {}", issues.len());
        for issue in &issues {
            println!("  {:?}", issue);
        }
    }

    Ok(())
}

// =============================================================================
// ANALYZE COMMAND
// =============================================================================

/// One section of a report, or all of it.
pub fn select_section(report: &AnalysisReport, section: Section) -> Result<Value, TrilayerError> {
    let value = match section {
        Section::All => serde_json::to_value(report),
        Section::Structural => serde_json::to_value(&report.structural),
        Section::Functional => serde_json::to_value(&report.functional),
        Section::Risk => serde_json::to_value(&report.risk),
        Section::Timeseries => serde_json::to_value(&report.timeseries),
    };
    value.map_err(|e| TrilayerError::SerializationError(e.to_string()))
}

/// Run the analysis pipeline on a payload file.
///
/// Output is always JSON. `section` narrows the report and is only
/// available for the interchange domain, whose output is the raw report.
pub fn cmd_analyze(
    registry: &DomainRegistry,
    settings: &Settings,
    file: &Path,
    domain: &str,
    section: Section,
) -> Result<(), TrilayerError> {
    let data: Value = serde_json::from_str(&read_input(file)?)
        .map_err(|e| TrilayerError::DeserializationError(e.to_string()))?;

    if section == Section::All {
        let output = run_domain_analysis(registry, domain, &data, &settings.analysis)?;
        return print_json(&output);
    }

    if domain != InterchangeMapper::DOMAIN {
        return Err(TrilayerError::ConfigError(format!(
            "--section requires the '{}' domain, got '{}'",
            InterchangeMapper::DOMAIN,
            domain
        )));
    }
    settings.analysis.validate()?;
    let graph = graph_from_value(data)?;
    let report = analyze(&graph, &settings.analysis);
    print_json(&select_section(&report, section)?)
}

// =============================================================================
// CASCADE COMMAND
// =============================================================================

fn print_scenario(scenario: &CascadeScenario) {
    println!(
        "{} ({}): {} failures, probability {:.3}, severity {:.2}",
        scenario.initiating_failure,
        scenario.initiating_name,
        scenario.cascade_size,
        scenario.cascade_probability,
        scenario.severity
    );
    for member in scenario.cascade_failures.iter().skip(1) {
        let reach = scenario
            .reach_probabilities
            .get(member)
            .copied()
            .unwrap_or_default();
        println!("  -> {} (reach {:.3})", member, reach);
    }
}

/// Show cascading failure scenarios.
pub fn cmd_cascade(file: &Path, failure: Option<&str>, json_mode: bool) -> Result<(), TrilayerError> {
    let graph = load_graph(file)?;

    if let Some(id) = failure {
        let source = graph
            .failure_mode(id)
            .ok_or_else(|| TrilayerError::FailureNotFound(id.to_string()))?;
        let scenario = simulate_cascade(&graph, source)
            .ok_or_else(|| TrilayerError::FailureNotFound(id.to_string()))?;
        if json_mode {
            return print_json(&scenario);
        }
        print_scenario(&scenario);
        return Ok(());
    }

    let report = analyze_cascading_failures(&graph);
    if json_mode {
        return print_json(&report);
    }

    println!("Cascading Failures");
    println!("==================");
    println!("Scenarios:        {}", report.total_scenarios);
    println!("Max cascade size: {}", report.max_cascade_size);
    println!();
    for scenario in &report.scenarios {
        print_scenario(scenario);
    }

    Ok(())
}

// =============================================================================
// NORMALIZE COMMAND
// =============================================================================

/// Load an interchange file and write it back in canonical form.
///
/// Missing ids are filled from map keys. Performs links, branches and
/// parent links that were rejected on load are left out, so those reload
/// without rejections. Ids listed inside failure modes (`affects_*`,
/// `propagates_to`) are written back unchecked.
pub fn cmd_normalize(
    input: &Path,
    output: &Path,
    json_mode: bool,
    quiet: bool,
) -> Result<(), TrilayerError> {
    let graph = load_graph(input)?;
    let output_path = json_document(output, Access::Write)?;

    let text = graph_to_json(&graph)?;
    std::fs::write(&output_path, text)
        .map_err(|e| TrilayerError::IoError(format!("Write file: {}", e)))?;

    if json_mode {
        return print_json(&json!({
            "output": output_path.to_string_lossy(),
            "rejected_links": graph.rejected_links(),
            "status": status_json(&graph),
        }));
    }
    if !quiet {
        println!(
            "Normalized graph: {} forms, {} functions, {} failure modes ({} links dropped)",
            graph.form_elements().len(),
            graph.functions().len(),
            graph.failure_modes().len(),
            graph.rejected_links()
        );
    }

    Ok(())
}

// =============================================================================
// DOMAINS COMMAND
// =============================================================================

/// List registered domain mappers.
pub fn cmd_domains(registry: &DomainRegistry, json_mode: bool) -> Result<(), TrilayerError> {
    if json_mode {
        return print_json(&registry.describe());
    }

    println!("Registered domains ({}):", registry.len());
    for domain in registry.domains() {
        println!("  {}", domain);
    }
    Ok(())
}
