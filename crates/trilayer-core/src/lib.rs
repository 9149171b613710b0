//! # trilayer-core
//!
//! The domain-agnostic analysis engine for Trilayer - THE LOGIC.
//!
//! Any modeled system (vehicle, process plant, portfolio, bank) is described
//! as a three-layer graph:
//! - **Form**: physical or logical structure
//! - **Function**: behavioral decomposition
//! - **Failure**: failure modes and how they propagate
//!
//! Domain adapters build a [`UniversalGraph`] through a [`DomainMapper`];
//! the `analysis` module scores it with one model for every domain.
//!
//! ## Architectural Constraints
//!
//! - Pure, synchronous Rust: no async, no I/O, no global state
//! - Entity records are authoritative; the traversal index is derived
//! - Tolerant: dangling links are counted no-ops, degenerate graphs yield
//!   empty or zero-filled results, analysis never returns an error

// =============================================================================
// MODULES
// =============================================================================

pub mod analysis;
pub mod config;
pub mod formats;
pub mod graph;
pub mod index;
pub mod mapper;
pub mod primitives;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    FailureId, FailureMode, FailurePropagationBranch, FormElement, FormId, Function,
    FunctionBranch, FunctionId, TimeSeriesData, TrilayerError, parse_timestamp,
};

// =============================================================================
// RE-EXPORTS: Graph Model
// =============================================================================

pub use graph::{UniversalGraph, WiringIssue};
pub use index::{GraphIndex, Layer, Relation};

// =============================================================================
// RE-EXPORTS: Analysis
// =============================================================================

pub use analysis::{AnalysisReport, GraphSummary, analyze};
pub use config::AnalysisConfig;

// =============================================================================
// RE-EXPORTS: Formats & Mapping
// =============================================================================

pub use formats::{SerializedGraph, graph_from_json, graph_from_value, graph_to_json, graph_to_value};
pub use mapper::{DomainMapper, DomainRegistry, InterchangeMapper, run_domain_analysis};
