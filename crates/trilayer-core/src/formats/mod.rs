//! # Formats
//!
//! Wire formats for Trilayer graphs. Pure transformations only: file I/O
//! lives in the app layer.

mod interchange;

pub use interchange::{
    PerformsLink, SerializedGraph, graph_from_json, graph_from_value, graph_to_json,
    graph_to_value,
};
