//! # Core Type Definitions
//!
//! This module contains all core types for the Trilayer Form / Function /
//! Failure graph:
//! - Entity identifiers (`FormId`, `FunctionId`, `FailureId`)
//! - Layer entities (`FormElement`, `Function`, `FailureMode`)
//! - Relationship records (`FunctionBranch`, `FailurePropagationBranch`)
//! - Time-stamped property storage (`TimeSeriesData`)
//! - Error types (`TrilayerError`)
//!
//! ## Determinism Guarantees
//!
//! Every identifier implements `Ord` so that id-keyed collections are
//! `BTreeMap`/`BTreeSet` and iterate in a stable order across runs.

mod entities;
mod timeseries;

pub use entities::{FailureMode, FailurePropagationBranch, FormElement, Function, FunctionBranch};
pub use timeseries::{TimeSeriesData, coerce_numeric, format_timestamp, parse_timestamp};

use std::borrow::Borrow;
use std::fmt;
use thiserror::Error;

// =============================================================================
// ENTITY IDENTIFIERS
// =============================================================================

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Default,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            serde::Serialize,
            serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create an identifier from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// True when the identifier is the empty string.
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

entity_id!(
    /// Identifier of a Form element (physical or logical structure).
    FormId
);

entity_id!(
    /// Identifier of a Function in the behavioral decomposition.
    FunctionId
);

entity_id!(
    /// Identifier of a FailureMode in the risk layer.
    FailureId
);

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Trilayer system.
///
/// Analysis algorithms never return these: they degrade to empty or
/// zero-valued results. Errors surface only at the boundaries (interchange
/// parsing, configuration, domain mapping, I/O).
#[derive(Debug, Error)]
pub enum TrilayerError {
    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// A time-series timestamp could not be parsed as ISO-8601.
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// The requested failure mode is not in the graph.
    #[error("Failure mode not found: {0}")]
    FailureNotFound(String),

    /// No mapper is registered under the requested domain name.
    #[error("Unknown domain: {0}")]
    UnknownDomain(String),

    /// A mapper rejected the payload in `validate_domain_data`.
    #[error("Invalid data for domain '{0}'")]
    InvalidDomainData(String),

    /// An error raised by a domain mapper, propagated unmodified.
    #[error(transparent)]
    Domain(Box<dyn std::error::Error + Send + Sync>),

    /// Analysis or application configuration is out of range.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A graph traversal could not be computed on the current topology.
    #[error("Traversal failed: {0}")]
    TraversalFailed(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

impl TrilayerError {
    /// Wrap an arbitrary mapper-side error.
    pub fn domain<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Domain(Box::new(err))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = FormId::new("pump_1");
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, "\"pump_1\"");

        let back: FormId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, id);
    }

    #[test]
    fn ids_lookup_by_str() {
        let mut map = BTreeMap::new();
        map.insert(FunctionId::from("F1"), 1);
        assert_eq!(map.get("F1"), Some(&1));
        assert_eq!(map.get("F2"), None);
    }

    #[test]
    fn ids_order_lexicographically() {
        let mut ids = vec![FailureId::from("m2"), FailureId::from("m10"), FailureId::from("m1")];
        ids.sort();
        let names: Vec<_> = ids.iter().map(FailureId::as_str).collect();
        assert_eq!(names, vec!["m1", "m10", "m2"]);
    }

    #[test]
    fn domain_error_is_transparent() {
        let inner = std::io::Error::other("bad payload: missing 'vin'");
        let err = TrilayerError::domain(inner);
        assert_eq!(err.to_string(), "bad payload: missing 'vin'");
    }
}
