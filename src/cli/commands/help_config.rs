//! Help-config command implementation
//!
//! Implements `kiln build.yaml --help-config`: list the parameters the
//! description declares, their options and defaults.

use std::fmt::Write;
use std::path::Path;

use anyhow::Result;

use crate::core::parameters::Parameter;
use crate::core::pipeline;
use crate::core::tree::ConfigNode;

/// Render the help text for a loaded description
pub fn render_help(conf: &Path, document: &ConfigNode) -> Result<String> {
    let parameters = pipeline::document_parameters(document)?;
    let mut out = String::new();

    write!(out, "usage: kiln {}", conf.display())?;
    for parameter in &parameters {
        write!(out, " [--{} {{{}}}]", parameter.name, parameter.choices().join(","))?;
    }
    writeln!(out)?;

    if let Some(desc) = document.get("desc").and_then(ConfigNode::as_str) {
        writeln!(out, "\nConfig file description: {desc}")?;
    }

    if parameters.is_empty() {
        writeln!(out, "\nThis build description has no parameters.")?;
        return Ok(out);
    }

    writeln!(out, "\nparameters:")?;
    for parameter in &parameters {
        render_parameter(&mut out, parameter)?;
    }
    Ok(out)
}

fn render_parameter(out: &mut String, parameter: &Parameter) -> std::fmt::Result {
    writeln!(
        out,
        "  --{} {{{}}}",
        parameter.name,
        parameter.choices().join(",")
    )?;
    match parameter.default_options().as_slice() {
        [] => writeln!(out, "        {} (no default, must be given)", parameter.desc),
        [default] => writeln!(out, "        {} (default: {})", parameter.desc, default.key),
        many => {
            let keys: Vec<&str> = many.iter().map(|o| o.key.as_str()).collect();
            writeln!(
                out,
                "        {} (ambiguous defaults: {})",
                parameter.desc,
                keys.join(", ")
            )
        }
    }
}

/// Execute the help-config command
pub fn execute(conf: &Path) -> Result<()> {
    let document = super::load(conf)?;
    print!("{}", render_help(conf, &document)?);
    Ok(())
}
