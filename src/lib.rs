//! Kiln - configuration resolution and build graph synthesis
//!
//! Kiln reads a declarative, parameterized description of a multi-image
//! embedded build (Yocto, Android, Zephyr, disk images), resolves its
//! parameters and variables, and produces a deterministic dependency graph
//! for an external executor. Kiln never runs builds or fetches itself.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`cli`] - Command-line interface parsing and output formatting
//! - [`core`] - Resolution and graph synthesis (no I/O operations)
//! - [`infra`] - Infrastructure layer (document loading, graph writing)
//! - [`config`] - Configuration and constants
//! - [`error`] - Error types and handling
//!
//! # Example
//!
//! ```
//! use std::path::Path;
//!
//! use kiln::core::parameters::Selections;
//! use kiln::core::pipeline::resolve;
//! use kiln::infra::loader::{parse_document, DocumentFormat};
//!
//! let doc = parse_document(
//!     "desc: demo\nvariables:\n  DIR: out\ncomponents:\n  app:\n    builder:\n      type: custom_script\n      script: build.sh\n      target_images: ['%{DIR}/app.bin']\n",
//!     DocumentFormat::Yaml,
//!     Path::new("build.yaml"),
//! ).unwrap();
//! let resolved = resolve(&doc, &Selections::new()).unwrap();
//! assert_eq!(resolved.report.components, ["app"]);
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod infra;

#[cfg(test)]
pub mod test_utils;
