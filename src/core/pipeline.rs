//! Resolution pipeline
//!
//! raw document + selections
//!   -> min_ver gate on the raw document, unless it names variables
//!   -> parameter overlays folded onto the root, in declaration order
//!   -> `variables` frozen into a scope
//!   -> every string and key expanded
//!   -> validated tree
//!   -> build graph
//!
//! Every run builds its own scope and tree; nothing is shared between runs.

use crate::core::graph::{build_graph, BuildGraph, GeneratorRule};
use crate::core::parameters::{
    apply_parameters, parse_parameters, resolve_parameters, Parameter, ResolvedParameter,
    Selections,
};
use crate::core::tree::{ConfigNode, NodePath, Scalar};
use crate::core::validate::{min_version_of, validate, ValidationReport};
use crate::core::variables::{FrozenScope, VariableScope};
use crate::core::version::check_kiln_version;
use crate::error::{KilnError, LoadError, VariableError};

/// Result of resolving a document
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    /// Merged and expanded tree, without `variables` and `parameters`
    pub tree: ConfigNode,
    /// Selected option of every parameter, in declaration order
    pub parameters: Vec<ResolvedParameter>,
    /// Expanded variables
    pub variables: FrozenScope,
    /// Top-level summary
    pub report: ValidationReport,
}

/// Parameters declared by a document, for help output and CLI parsing
pub fn document_parameters(document: &ConfigNode) -> Result<Vec<Parameter>, KilnError> {
    Ok(parse_parameters(document)?)
}

fn scope_of(tree: &ConfigNode) -> Result<VariableScope, VariableError> {
    let path = NodePath::root().key("variables");
    match tree.get("variables") {
        None | Some(ConfigNode::Scalar(Scalar::Null)) => Ok(VariableScope::new()),
        Some(ConfigNode::Mapping(vars)) => VariableScope::from_mapping(vars, &path),
        Some(other) => Err(VariableError::InvalidVariable {
            name: "variables".to_string(),
            actual: other.kind().to_string(),
            path,
        }),
    }
}

/// Apply parameters, expand variables and validate the result
pub fn resolve(document: &ConfigNode, selections: &Selections) -> Result<ResolvedConfig, KilnError> {
    if document.as_mapping().is_none() {
        return Err(LoadError::RootNotMapping {
            actual: document.kind(),
        }
        .into());
    }

    // A min_ver built from variables is only checked once expanded
    if let Some(required) = min_version_of(document)? {
        if required.contains("%{") {
            tracing::debug!("Deferring min_ver check of '{required}' until expansion");
        } else {
            check_kiln_version(&required)?;
        }
    }

    let declared = parse_parameters(document)?;
    if !declared.is_empty() {
        tracing::info!("Parameters:");
    }
    let parameters = resolve_parameters(&declared, selections)?;
    let merged = apply_parameters(&document.without_keys(&["parameters"]), &parameters)?;

    let variables = scope_of(&merged)?.freeze()?;
    for (name, value) in variables.iter() {
        tracing::debug!("  {name} = {value}");
    }

    let tree = variables.expand_tree(&merged.without_keys(&["variables", "parameters"]))?;
    let report = validate(&tree)?;

    Ok(ResolvedConfig {
        tree,
        parameters,
        variables,
        report,
    })
}

/// Resolve a document and build its graph
pub fn generate(
    document: &ConfigNode,
    selections: &Selections,
    generator: GeneratorRule,
) -> Result<(ResolvedConfig, BuildGraph), KilnError> {
    let resolved = resolve(document, selections)?;
    let graph = build_graph(&resolved.tree, generator)?;
    tracing::debug!("Synthesized {} target(s)", graph.targets.len());
    Ok((resolved, graph))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{GraphError, ParameterError, ValidationError};
    use crate::test_utils::yaml;

    fn select(name: &str, value: &str) -> Selections {
        Selections::from([(name.to_string(), value.to_string())])
    }

    const DOC: &str = r#"
desc: "Xen-based build for %{MACHINE}"
min_ver: "0.1"
variables:
  MACHINE: "unset"
  YOCTOS_WORK_DIR: "yocto"
  DEPLOY_DIR: "%{YOCTOS_WORK_DIR}/build-%{MACHINE}/tmp/deploy"
components:
  "domd-%{MACHINE}":
    builder:
      type: custom_script
      script: "build.sh"
      args: ["--machine", "%{MACHINE}", "100%%"]
      target_images:
        - "%{DEPLOY_DIR}/Image"
parameters:
  MACHINE:
    desc: "Machine"
    zc702-zynq7:
      default: true
      overrides:
        variables:
          MACHINE: "zc702-zynq7"
    qemu-zynq7:
      overrides:
        variables:
          MACHINE: "qemu-zynq7"
"#;

    #[test]
    fn test_default_option_propagates_through_expansion() {
        let resolved = resolve(&yaml(DOC), &Selections::new()).unwrap();
        assert_eq!(resolved.variables.get("MACHINE"), Some("zc702-zynq7"));
        assert_eq!(resolved.report.desc, "Xen-based build for zc702-zynq7");
        assert_eq!(resolved.report.components, ["domd-zc702-zynq7"]);

        let builder = resolved
            .tree
            .get("components")
            .and_then(|c| c.get("domd-zc702-zynq7"))
            .and_then(|c| c.get("builder"))
            .unwrap();
        assert_eq!(
            builder.get("target_images").unwrap().as_sequence().unwrap()[0].as_str(),
            Some("yocto/build-zc702-zynq7/tmp/deploy/Image")
        );
        assert_eq!(
            builder.get("args").unwrap().as_sequence().unwrap()[2].as_str(),
            Some("100%")
        );
    }

    #[test]
    fn test_cli_selection_propagates() {
        let resolved = resolve(&yaml(DOC), &select("MACHINE", "qemu-zynq7")).unwrap();
        assert_eq!(resolved.report.desc, "Xen-based build for qemu-zynq7");
        assert_eq!(resolved.parameters[0].option, "qemu-zynq7");
    }

    #[test]
    fn test_sections_are_dropped() {
        let resolved = resolve(&yaml(DOC), &Selections::new()).unwrap();
        assert!(resolved.tree.get("variables").is_none());
        assert!(resolved.tree.get("parameters").is_none());
    }

    #[test]
    fn test_unknown_option_fails() {
        let err = resolve(&yaml(DOC), &select("MACHINE", "rpi4")).unwrap_err();
        assert!(matches!(
            err,
            KilnError::Parameter(ParameterError::UnknownParameterOption { .. })
        ));
    }

    #[test]
    fn test_raw_min_ver_gate_runs_first() {
        // The broken parameter would fail later; the version gate wins
        let doc = yaml("desc: x\nmin_ver: \"99.0\"\nparameters:\n  P: {}\ncomponents: {}\n");
        let err = resolve(&doc, &Selections::new()).unwrap_err();
        assert!(matches!(
            err,
            KilnError::Validation(ValidationError::VersionTooOld { .. })
        ));
    }

    #[test]
    fn test_min_ver_from_variable() {
        let doc = |min: &str| {
            yaml(&format!(
                "desc: x\nmin_ver: \"%{{MIN}}\"\nvariables:\n  MIN: \"{min}\"\ncomponents:\n  a: {{}}\n"
            ))
        };
        let resolved = resolve(&doc("0.1"), &Selections::new()).unwrap();
        assert_eq!(resolved.report.min_ver.as_deref(), Some("0.1"));

        let err = resolve(&doc("99.0"), &Selections::new()).unwrap_err();
        assert!(matches!(
            err,
            KilnError::Validation(ValidationError::VersionTooOld { .. })
        ));
    }

    #[test]
    fn test_min_ver_from_overlay_is_checked() {
        let doc = yaml(
            "desc: x\ncomponents:\n  a: {}\nparameters:\n  P:\n    desc: p\n    new: {default: true, overrides: {min_ver: \"99.0\"}}\n",
        );
        let err = resolve(&doc, &Selections::new()).unwrap_err();
        assert!(matches!(
            err,
            KilnError::Validation(ValidationError::VersionTooOld { .. })
        ));
    }

    #[test]
    fn test_undefined_variable_has_path() {
        let doc = yaml("desc: x\ncomponents:\n  a:\n    builder:\n      script: \"%{NOPE}\"\n");
        let err = resolve(&doc, &Selections::new()).unwrap_err();
        let KilnError::Variable(VariableError::UndefinedVariable { name, path }) = err else {
            panic!("expected an undefined variable error");
        };
        assert_eq!(name, "NOPE");
        assert_eq!(path.to_string(), "components.a.builder.script");
    }

    #[test]
    fn test_root_must_be_mapping() {
        let err = resolve(&yaml("[1, 2]"), &Selections::new()).unwrap_err();
        assert!(matches!(err, KilnError::Load(LoadError::RootNotMapping { .. })));
    }

    #[test]
    fn test_generate_reports_graph_errors() {
        let doc = yaml(
            "desc: x\ncomponents:\n  a:\n    builder: {type: custom_script, script: s, additional_deps: [nothing], target_images: [a.bin]}\n",
        );
        let generator = GeneratorRule {
            document: "build.yaml".into(),
            argv: vec!["kiln".into(), "build.yaml".into()],
            output: "build.graph.json".into(),
        };
        let err = generate(&doc, &Selections::new(), generator).unwrap_err();
        assert!(matches!(
            err,
            KilnError::Graph(GraphError::UnresolvedDependency { .. })
        ));
    }

    #[test]
    fn test_runs_are_independent() {
        let doc = yaml(DOC);
        let first = resolve(&doc, &select("MACHINE", "qemu-zynq7")).unwrap();
        let second = resolve(&doc, &Selections::new()).unwrap();
        assert_ne!(first.tree, second.tree);
        assert_eq!(second, resolve(&doc, &Selections::new()).unwrap());
    }
}
