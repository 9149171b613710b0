//! # Trilayer application library
//!
//! CLI definitions and settings loading, exposed for integration tests.

pub mod cli;
pub mod settings;
