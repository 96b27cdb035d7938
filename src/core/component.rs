//! Typed view of the `components` section

use crate::core::plugins::{type_of, BuilderKind, Capability, FetcherKind};
use crate::core::tree::{ConfigNode, Mapping, NodePath, Scalar};
use crate::error::PluginError;

/// One entry of a component's `sources` list
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSpec {
    pub kind: FetcherKind,
    pub spec: Mapping,
    pub path: NodePath,
}

/// A component's `builder`
#[derive(Debug, Clone, PartialEq)]
pub struct BuilderSpec {
    pub kind: BuilderKind,
    pub spec: Mapping,
    pub path: NodePath,
    /// Artifacts this builder produces
    pub target_images: Vec<String>,
    /// Artifacts of other components this builder consumes
    pub additional_deps: Vec<String>,
}

/// A named unit of the build: sources to fetch and one builder to run
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub name: String,
    pub build_dir: String,
    pub default: bool,
    pub sources: Vec<SourceSpec>,
    pub builder: BuilderSpec,
    pub path: NodePath,
}

fn invalid(field: &str, expected: &str, path: NodePath) -> PluginError {
    PluginError::InvalidField {
        field: field.to_string(),
        expected: expected.to_string(),
        path,
    }
}

fn parse_source(node: &ConfigNode, path: NodePath) -> Result<SourceSpec, PluginError> {
    let spec = node
        .as_mapping()
        .ok_or_else(|| invalid("sources", "a list of source mappings", path.clone()))?;
    let kind = FetcherKind::from_type(type_of(spec, &path)?, &path)?;
    kind.validate(spec, &path)?;
    Ok(SourceSpec {
        kind,
        spec: spec.clone(),
        path,
    })
}

fn parse_builder(node: &ConfigNode, path: NodePath) -> Result<BuilderSpec, PluginError> {
    let spec = node
        .as_mapping()
        .ok_or_else(|| invalid("builder", "a mapping", path.clone()))?;
    let kind = BuilderKind::from_type(type_of(spec, &path)?, &path)?;
    kind.validate(spec, &path)?;
    Ok(BuilderSpec {
        kind,
        target_images: BuilderKind::target_images(spec, &path)?,
        additional_deps: BuilderKind::additional_deps(spec, &path)?,
        spec: spec.clone(),
        path,
    })
}

fn text_field(
    component: &Mapping,
    key: &str,
    path: &NodePath,
) -> Result<Option<String>, PluginError> {
    match component.get(key) {
        None => Ok(None),
        Some(node) => node
            .as_str()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| invalid(key, "a string", path.key(key))),
    }
}

impl Component {
    /// Build the typed component from its resolved subtree
    ///
    /// `build_dir` falls back to the legacy `builder.build-dir`, then to the
    /// component name.
    pub fn parse(name: &str, node: &ConfigNode, path: &NodePath) -> Result<Self, PluginError> {
        let mapping = node
            .as_mapping()
            .ok_or_else(|| invalid(name, "a component mapping", path.clone()))?;

        let builder_node = mapping.get("builder").ok_or_else(|| PluginError::MissingField {
            field: "builder".to_string(),
            path: path.clone(),
        })?;
        let builder = parse_builder(builder_node, path.key("builder"))?;

        let build_dir = match text_field(mapping, "build_dir", path)? {
            Some(dir) => dir,
            None => match text_field(&builder.spec, "build-dir", &builder.path)? {
                Some(dir) => {
                    tracing::debug!("{name}: using legacy builder.build-dir '{dir}'");
                    dir
                }
                None => name.to_string(),
            },
        };

        let default = match mapping.get("default") {
            None => false,
            Some(node) => node
                .as_bool()
                .ok_or_else(|| invalid("default", "a boolean", path.key("default")))?,
        };

        let sources_path = path.key("sources");
        let sources = match mapping.get("sources") {
            None | Some(ConfigNode::Scalar(Scalar::Null)) => Vec::new(),
            Some(ConfigNode::Sequence(items)) => items
                .iter()
                .enumerate()
                .map(|(i, item)| parse_source(item, sources_path.index(i)))
                .collect::<Result<_, _>>()?,
            Some(_) => return Err(invalid("sources", "a list", sources_path)),
        };

        Ok(Self {
            name: name.to_string(),
            build_dir,
            default,
            sources,
            builder,
            path: path.clone(),
        })
    }

    /// Union of the fetchers' declared outputs, in source order
    pub fn fetch_outputs(&self) -> Result<Vec<String>, PluginError> {
        let mut outputs = Vec::new();
        for source in &self.sources {
            for output in source
                .kind
                .declared_outputs(&source.spec, &self.build_dir, &source.path)?
            {
                if !outputs.contains(&output) {
                    outputs.push(output);
                }
            }
        }
        Ok(outputs)
    }
}

/// Read every component of a resolved tree, in document order
pub fn components_of(root: &ConfigNode) -> Result<Vec<Component>, PluginError> {
    let components_path = NodePath::root().key("components");
    let Some(components) = root.get("components").and_then(ConfigNode::as_mapping) else {
        return Err(PluginError::MissingField {
            field: "components".to_string(),
            path: NodePath::root(),
        });
    };

    components
        .iter()
        .map(|(name, node)| Component::parse(name, node, &components_path.key(name)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::yaml;

    const DOC: &str = r#"
components:
  domd:
    build_dir: yocto
    default: true
    sources:
      - type: git
        url: "https://git.yoctoproject.org/poky"
      - type: git
        url: "https://github.com/xen-troops/meta-xt-prod-devel.git"
        dir: meta-xt
    builder:
      type: yocto
      build_target: core-image-minimal
      target_images:
        - "yocto/build/tmp/deploy/images/Image"
  legacy:
    builder:
      type: android
      build-dir: aosp
      lunch-target: xenvm-userdebug
      target_images: [aosp/out/system.img]
  plain:
    sources: []
    builder:
      type: custom_script
      script: ./make.sh
      target_images: [plain/out.bin]
"#;

    #[test]
    fn test_components_in_document_order() {
        let components = components_of(&yaml(DOC)).unwrap();
        let names: Vec<&str> = components.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["domd", "legacy", "plain"]);
    }

    #[test]
    fn test_build_dir_resolution() {
        let components = components_of(&yaml(DOC)).unwrap();
        assert_eq!(components[0].build_dir, "yocto");
        assert_eq!(components[1].build_dir, "aosp");
        assert_eq!(components[2].build_dir, "plain");
    }

    #[test]
    fn test_default_flag_and_sources() {
        let components = components_of(&yaml(DOC)).unwrap();
        assert!(components[0].default);
        assert!(!components[1].default);
        assert_eq!(components[0].sources.len(), 2);
        assert_eq!(
            components[0].fetch_outputs().unwrap(),
            ["yocto/poky", "yocto/meta-xt"]
        );
        assert!(components[1].fetch_outputs().unwrap().is_empty());
    }

    #[test]
    fn test_builder_lists() {
        let components = components_of(&yaml(DOC)).unwrap();
        assert_eq!(components[0].builder.kind, BuilderKind::Yocto);
        assert_eq!(
            components[0].builder.target_images,
            ["yocto/build/tmp/deploy/images/Image"]
        );
        assert!(components[0].builder.additional_deps.is_empty());
    }

    #[test]
    fn test_missing_builder() {
        let err = components_of(&yaml("components:\n  a:\n    sources: []\n")).unwrap_err();
        assert_eq!(
            err,
            PluginError::MissingField {
                field: "builder".into(),
                path: NodePath::keys(&["components", "a"]),
            }
        );
    }

    #[test]
    fn test_unknown_fetcher_carries_index() {
        let doc = yaml(
            "components:\n  a:\n    sources:\n      - type: git\n        url: u\n      - type: svn\n    builder:\n      type: archive\n      items: [x]\n      target_images: [a.tar]\n",
        );
        let err = components_of(&doc).unwrap_err();
        assert_eq!(err.to_string(), "Unknown fetcher type 'svn' at components.a.sources[1].type");
    }

    #[test]
    fn test_missing_type() {
        let doc = yaml("components:\n  a:\n    builder:\n      target_images: [x]\n");
        assert!(matches!(
            components_of(&doc),
            Err(PluginError::MissingField { ref field, .. }) if field == "type"
        ));
    }

    #[test]
    fn test_bare_null_fetcher() {
        let doc = yaml(
            "components:\n  a:\n    sources:\n      - type: null\n    builder:\n      type: custom_script\n      script: s\n      target_images: [a.bin]\n",
        );
        let components = components_of(&doc).unwrap();
        assert_eq!(components[0].sources[0].kind, FetcherKind::Null);
        assert!(components[0].fetch_outputs().unwrap().is_empty());
    }
}
