//! Parameter resolution
//!
//! A document declares build choices under `parameters`:
//!
//! ```yaml
//! parameters:
//!   MACHINE:
//!     desc: "Target machine"
//!     zc702-zynq7:
//!       default: true
//!       overrides:
//!         variables:
//!           MACHINE: "zc702-zynq7"
//!     qemu-zynq7:
//!       overrides: { ... }
//! ```
//!
//! Exactly one option is selected per parameter, either from the command
//! line or via its `default` flag. The selected overlays are applied to the
//! document in declaration order.

use indexmap::IndexMap;

use crate::core::merge::merge_at;
use crate::core::tree::{ConfigNode, NodePath};
use crate::error::ParameterError;

/// Parameter name → option key chosen on the command line
pub type Selections = IndexMap<String, String>;

/// One selectable value of a parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ParamOption {
    /// Option key as written in the document
    pub key: String,
    /// Whether this option is used when nothing is selected
    pub is_default: bool,
    /// Overlay merged onto the document root (empty mapping if absent)
    pub overrides: ConfigNode,
}

/// A named build choice
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Parameter name, also the command line flag (`--{name}`)
    pub name: String,
    /// Human readable description
    pub desc: String,
    /// Options in declaration order
    pub options: Vec<ParamOption>,
}

/// How an option ended up selected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionSource {
    /// Chosen on the command line
    Cli,
    /// The option marked `default: true`
    Default,
}

/// Selected option of one parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedParameter {
    /// Parameter name
    pub parameter: String,
    /// Selected option key
    pub option: String,
    /// Where the selection came from
    pub source: SelectionSource,
    /// The option's overlay
    pub overlay: ConfigNode,
}

impl Parameter {
    /// Option keys in declaration order
    pub fn choices(&self) -> Vec<String> {
        self.options.iter().map(|o| o.key.clone()).collect()
    }

    /// Options marked as default
    pub fn default_options(&self) -> Vec<&ParamOption> {
        self.options.iter().filter(|o| o.is_default).collect()
    }

    /// The single default option, if the parameter is well formed
    pub fn default_option(&self) -> Option<&ParamOption> {
        match self.default_options().as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }

    /// Pick an option: the selection if given, otherwise the default
    pub fn select(&self, selection: Option<&str>) -> Result<ResolvedParameter, ParameterError> {
        let (option, source) = match selection {
            Some(value) => {
                let option = self.options.iter().find(|o| o.key == value).ok_or_else(|| {
                    ParameterError::UnknownParameterOption {
                        parameter: self.name.clone(),
                        value: value.to_string(),
                        choices: self.choices(),
                    }
                })?;
                (option, SelectionSource::Cli)
            }
            None => match self.default_options().as_slice() {
                [] => {
                    return Err(ParameterError::MissingDefaultOption {
                        parameter: self.name.clone(),
                    })
                }
                [only] => (*only, SelectionSource::Default),
                many => {
                    return Err(ParameterError::MultipleDefaultOptions {
                        parameter: self.name.clone(),
                        options: many.iter().map(|o| o.key.clone()).collect(),
                    })
                }
            },
        };

        Ok(ResolvedParameter {
            parameter: self.name.clone(),
            option: option.key.clone(),
            source,
            overlay: option.overrides.clone(),
        })
    }
}

fn wrong_kind(path: NodePath, expected: &str, node: &ConfigNode) -> ParameterError {
    ParameterError::WrongKind {
        path,
        expected: expected.to_string(),
        actual: node.kind().to_string(),
    }
}

fn parse_option(key: &str, node: &ConfigNode, path: &NodePath) -> Result<ParamOption, ParameterError> {
    let Some(mapping) = node.as_mapping() else {
        return Err(wrong_kind(path.clone(), "option mapping", node));
    };

    let is_default = match mapping.get("default") {
        None => false,
        Some(value) => value
            .as_bool()
            .ok_or_else(|| wrong_kind(path.key("default"), "boolean", value))?,
    };

    let overrides = match mapping.get("overrides") {
        None => ConfigNode::empty_mapping(),
        Some(value @ ConfigNode::Mapping(_)) => value.clone(),
        Some(value) => return Err(wrong_kind(path.key("overrides"), "mapping", value)),
    };

    Ok(ParamOption {
        key: key.to_string(),
        is_default,
        overrides,
    })
}

fn parse_parameter(name: &str, node: &ConfigNode, path: &NodePath) -> Result<Parameter, ParameterError> {
    let Some(mapping) = node.as_mapping() else {
        return Err(wrong_kind(path.clone(), "parameter mapping", node));
    };

    let desc = match mapping.get("desc") {
        None => {
            return Err(ParameterError::MissingMandatoryKey {
                path: path.clone(),
                key: "desc".to_string(),
            })
        }
        Some(value) => value
            .as_str()
            .ok_or_else(|| wrong_kind(path.key("desc"), "string", value))?
            .to_string(),
    };

    let options = mapping
        .iter()
        .filter(|(key, _)| key.as_str() != "desc")
        .map(|(key, value)| parse_option(key, value, &path.key(key)))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Parameter {
        name: name.to_string(),
        desc,
        options,
    })
}

/// Read the `parameters` section of a document, in declaration order
pub fn parse_parameters(document: &ConfigNode) -> Result<Vec<Parameter>, ParameterError> {
    let path = NodePath::root().key("parameters");
    match document.get("parameters") {
        None => Ok(Vec::new()),
        Some(ConfigNode::Mapping(params)) => params
            .iter()
            .map(|(name, node)| parse_parameter(name, node, &path.key(name)))
            .collect(),
        Some(other) => Err(wrong_kind(path, "mapping", other)),
    }
}

/// Select one option per parameter, in declaration order
pub fn resolve_parameters(
    parameters: &[Parameter],
    selections: &Selections,
) -> Result<Vec<ResolvedParameter>, ParameterError> {
    if let Some(unknown) = selections
        .keys()
        .find(|name| !parameters.iter().any(|p| &p.name == *name))
    {
        return Err(ParameterError::UnknownParameter {
            name: unknown.clone(),
        });
    }

    parameters
        .iter()
        .map(|param| {
            let resolved = param.select(selections.get(&param.name).map(String::as_str))?;
            match resolved.source {
                SelectionSource::Cli => tracing::info!("  {}: {} (selected)", param.name, resolved.option),
                SelectionSource::Default => tracing::info!("  {}: {}", param.name, resolved.option),
            }
            Ok(resolved)
        })
        .collect()
}

/// Fold the selected overlays onto the document root in order
pub fn apply_parameters(
    document: &ConfigNode,
    resolved: &[ResolvedParameter],
) -> Result<ConfigNode, ParameterError> {
    resolved.iter().try_fold(document.clone(), |tree, param| {
        tracing::debug!(
            "Applying overrides of '{}' option '{}'",
            param.parameter,
            param.option
        );
        merge_at(&tree, &param.overlay, &NodePath::root()).map_err(ParameterError::from)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MergeError;
    use crate::test_utils::yaml;

    const MACHINE_DOC: &str = r#"
desc: "Zynq build"
parameters:
  MACHINE:
    desc: "Machine to build for"
    zc702-zynq7:
      default: true
      overrides:
        variables:
          MACHINE: "zc702-zynq7"
    zc706-zynq7:
      overrides:
        variables:
          MACHINE: "zc706-zynq7"
    qemu-zynq7:
      overrides:
        variables:
          MACHINE: "qemu-zynq7"
"#;

    fn selections(pairs: &[(&str, &str)]) -> Selections {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_parse_parameters_in_declaration_order() {
        let params = parse_parameters(&yaml(MACHINE_DOC)).unwrap();
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].desc, "Machine to build for");
        assert_eq!(
            params[0].choices(),
            ["zc702-zynq7", "zc706-zynq7", "qemu-zynq7"]
        );
        assert_eq!(params[0].default_option().unwrap().key, "zc702-zynq7");
    }

    #[test]
    fn test_default_option_is_selected() {
        let params = parse_parameters(&yaml(MACHINE_DOC)).unwrap();
        let resolved = resolve_parameters(&params, &Selections::new()).unwrap();
        assert_eq!(resolved[0].option, "zc702-zynq7");
        assert_eq!(resolved[0].source, SelectionSource::Default);
        assert_eq!(
            resolved[0].overlay,
            yaml("variables:\n  MACHINE: zc702-zynq7\n")
        );
    }

    #[test]
    fn test_cli_selection_wins() {
        let params = parse_parameters(&yaml(MACHINE_DOC)).unwrap();
        let resolved =
            resolve_parameters(&params, &selections(&[("MACHINE", "qemu-zynq7")])).unwrap();
        assert_eq!(resolved[0].option, "qemu-zynq7");
        assert_eq!(resolved[0].source, SelectionSource::Cli);
    }

    #[test]
    fn test_unknown_option() {
        let params = parse_parameters(&yaml(MACHINE_DOC)).unwrap();
        let err = resolve_parameters(&params, &selections(&[("MACHINE", "rpi4")])).unwrap_err();
        assert!(matches!(
            err,
            ParameterError::UnknownParameterOption { ref parameter, ref value, .. }
                if parameter == "MACHINE" && value == "rpi4"
        ));
    }

    #[test]
    fn test_unknown_parameter_name() {
        let params = parse_parameters(&yaml(MACHINE_DOC)).unwrap();
        let err = resolve_parameters(&params, &selections(&[("BOARD", "x")])).unwrap_err();
        assert_eq!(err, ParameterError::UnknownParameter { name: "BOARD".into() });
    }

    #[test]
    fn test_missing_default() {
        let doc = yaml("parameters:\n  P:\n    desc: p\n    a: {}\n    b:\n      default: false\n");
        let params = parse_parameters(&doc).unwrap();
        let err = resolve_parameters(&params, &Selections::new()).unwrap_err();
        assert_eq!(err, ParameterError::MissingDefaultOption { parameter: "P".into() });

        // An explicit selection still works
        assert!(resolve_parameters(&params, &selections(&[("P", "a")])).is_ok());
    }

    #[test]
    fn test_multiple_defaults_are_detected() {
        let doc = yaml(
            "parameters:\n  P:\n    desc: p\n    a: {default: true}\n    b: {default: true}\n",
        );
        let params = parse_parameters(&doc).unwrap();
        let err = resolve_parameters(&params, &Selections::new()).unwrap_err();
        assert_eq!(
            err,
            ParameterError::MultipleDefaultOptions {
                parameter: "P".into(),
                options: vec!["a".into(), "b".into()],
            }
        );
    }

    #[test]
    fn test_desc_is_mandatory() {
        let doc = yaml("parameters:\n  P:\n    a: {default: true}\n");
        let err = parse_parameters(&doc).unwrap_err();
        assert!(matches!(err, ParameterError::MissingMandatoryKey { ref key, .. } if key == "desc"));
    }

    #[test]
    fn test_malformed_option() {
        let doc = yaml("parameters:\n  P:\n    desc: p\n    a: {default: yes-please}\n");
        let err = parse_parameters(&doc).unwrap_err();
        assert_eq!(
            err,
            ParameterError::WrongKind {
                path: NodePath::keys(&["parameters", "P", "a", "default"]),
                expected: "boolean".into(),
                actual: "scalar".into(),
            }
        );

        let doc = yaml("parameters:\n  P:\n    desc: p\n    a: [1]\n");
        assert!(matches!(
            parse_parameters(&doc),
            Err(ParameterError::WrongKind { .. })
        ));
    }

    #[test]
    fn test_overlays_apply_in_declaration_order() {
        let doc = yaml(
            r#"
value: base
parameters:
  FIRST:
    desc: first
    on: {default: true, overrides: {value: first, list: [a]}}
  SECOND:
    desc: second
    on: {default: true, overrides: {value: second, list: [b]}}
"#,
        );
        let params = parse_parameters(&doc).unwrap();
        let resolved = resolve_parameters(&params, &Selections::new()).unwrap();
        let applied = apply_parameters(&doc.without_keys(&["parameters"]), &resolved).unwrap();
        assert_eq!(applied.get("value").unwrap().as_str(), Some("second"));
        assert_eq!(applied.get("list"), Some(&yaml("[a, b]")));
    }

    #[test]
    fn test_overlay_type_mismatch_is_reported() {
        let doc = yaml(
            "value: base\nparameters:\n  P:\n    desc: p\n    x: {default: true, overrides: {value: [1]}}\n",
        );
        let params = parse_parameters(&doc).unwrap();
        let resolved = resolve_parameters(&params, &Selections::new()).unwrap();
        let err = apply_parameters(&doc, &resolved).unwrap_err();
        assert!(matches!(
            err,
            ParameterError::Merge(MergeError::MergeTypeMismatch { .. })
        ));
    }

    #[test]
    fn test_no_parameters_section() {
        assert!(parse_parameters(&yaml("desc: x\n")).unwrap().is_empty());
    }
}
