//! CLI command implementations
//!
//! Each command is implemented in its own submodule.

pub mod fetcher_dep;
pub mod generate;
pub mod help_config;

use std::path::Path;

use anyhow::{Context, Result};

use crate::core::tree::ConfigNode;
use crate::infra::loader;

/// Load a build description with the file name in the error
pub(crate) fn load(conf: &Path) -> Result<ConfigNode> {
    loader::load_document(conf)
        .with_context(|| format!("Failed to load build description {}", conf.display()))
}
