//! Generate command implementation
//!
//! Implements `kiln build.yaml [--PARAM value]...`: resolve the description
//! and write the build graph.

use std::path::Path;

use anyhow::{Context, Result};

use crate::cli::output::{success, OutputConfig};
use crate::cli::params::render_selections;
use crate::config::defaults::GRAPH_FILENAME;
use crate::core::graph::GeneratorRule;
use crate::core::parameters::Selections;
use crate::core::pipeline;
use crate::infra::emit;

/// Command line that regenerates the same graph
pub fn regeneration_argv(conf: &Path, selections: &Selections, output: &Path) -> Vec<String> {
    let mut argv = vec!["kiln".to_string(), conf.display().to_string()];
    argv.extend(render_selections(selections));
    if output != Path::new(GRAPH_FILENAME) {
        argv.push("-o".to_string());
        argv.push(output.display().to_string());
    }
    argv
}

/// Execute the generate command
pub fn execute(
    conf: &Path,
    selections: &Selections,
    output: &Path,
    dump: bool,
    out: OutputConfig,
) -> Result<()> {
    let document = super::load(conf)?;

    let generator = GeneratorRule {
        document: conf.display().to_string(),
        argv: regeneration_argv(conf, selections, output),
        output: output.display().to_string(),
    };
    let (resolved, graph) = pipeline::generate(&document, selections, generator)?;

    if dump {
        let yaml =
            serde_yaml::to_string(&resolved.tree).context("Failed to render processed document")?;
        print!("{yaml}");
    }

    for parameter in &resolved.parameters {
        tracing::debug!("{} = {} ({:?})", parameter.parameter, parameter.option, parameter.source);
    }

    let written = emit::write_graph(&graph, output)?;
    let message = if written {
        format!(
            "Generated {} for '{}' ({} targets)",
            output.display(),
            resolved.report.desc,
            graph.targets.len()
        )
    } else {
        format!("{} is up to date", output.display())
    };
    success(out, &message);
    Ok(())
}
