//! Core business logic module
//!
//! This module contains the resolution engine and graph synthesis.
//! It has NO I/O operations - those belong in [`crate::infra`].
//!
//! # Submodules
//!
//! - [`tree`] - Generic configuration tree and structural paths
//! - [`variables`] - `%{name}` substitution
//! - [`merge`] - Override merging
//! - [`parameters`] - Parameter option selection
//! - [`version`] - Version parsing and the `min_ver` gate
//! - [`validate`] - Resolved tree validation
//! - [`plugins`] - Fetcher, builder and image variants
//! - [`component`] - Typed view of components
//! - [`resolver`] - Topological ordering and cycle detection
//! - [`graph`] - Build graph synthesis
//! - [`pipeline`] - End-to-end resolution

pub mod component;
pub mod graph;
pub mod merge;
pub mod parameters;
pub mod pipeline;
pub mod plugins;
pub mod resolver;
pub mod tree;
pub mod validate;
pub mod variables;
pub mod version;
