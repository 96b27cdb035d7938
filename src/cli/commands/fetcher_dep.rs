//! Fetcher depfile command
//!
//! Implements the hidden `kiln build.yaml --fetcherdep COMPONENT`, run by the
//! executor after a fetch to record what the fetch produced.

use std::path::Path;

use anyhow::Result;

use crate::cli::output::{info, OutputConfig};
use crate::core::parameters::Selections;
use crate::core::pipeline;
use crate::infra::emit;

/// Execute the fetcher depfile command
pub fn execute(
    conf: &Path,
    selections: &Selections,
    component: &str,
    dir: &Path,
    out: OutputConfig,
) -> Result<()> {
    let document = super::load(conf)?;
    let resolved = pipeline::resolve(&document, selections)?;
    let path = emit::write_fetcher_depfile(&resolved.tree, component, dir)?;
    info(out, &format!("Wrote {}", path.display()));
    Ok(())
}
