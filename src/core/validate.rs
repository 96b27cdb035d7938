//! Resolved-tree validation
//!
//! Checks the top-level shape of a fully expanded build description before
//! the graph builder looks at it. Component and plugin details are validated
//! later, by the typed component model.

use crate::core::tree::{ConfigNode, NodePath};
use crate::core::version::check_kiln_version;
use crate::error::ValidationError;

/// Summary of a validated document
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    /// Document description
    pub desc: String,
    /// Version requirement, if the document carries one
    pub min_ver: Option<String>,
    /// Component names in document order
    pub components: Vec<String>,
    /// Image names in document order
    pub images: Vec<String>,
}

fn wrong_kind(path: NodePath, expected: &str, node: &ConfigNode) -> ValidationError {
    ValidationError::WrongKind {
        path,
        expected: expected.to_string(),
        actual: node.kind().to_string(),
    }
}

fn mandatory<'a>(root: &'a ConfigNode, key: &str) -> Result<&'a ConfigNode, ValidationError> {
    root.get(key).ok_or_else(|| ValidationError::MissingMandatoryKey {
        path: NodePath::root(),
        key: key.to_string(),
    })
}

/// Read `min_ver` as text; numbers such as `0.3` are accepted as written
pub fn min_version_of(root: &ConfigNode) -> Result<Option<String>, ValidationError> {
    match root.get("min_ver") {
        None => Ok(None),
        Some(ConfigNode::Scalar(scalar)) => match scalar.to_text() {
            Some(text) => Ok(Some(text)),
            None => Err(wrong_kind(
                NodePath::root().key("min_ver"),
                "version string",
                &ConfigNode::Scalar(scalar.clone()),
            )),
        },
        Some(other) => Err(wrong_kind(
            NodePath::root().key("min_ver"),
            "version string",
            other,
        )),
    }
}

/// Fail early when the document asks for a newer kiln
pub fn check_min_version_gate(root: &ConfigNode) -> Result<Option<String>, ValidationError> {
    let min_ver = min_version_of(root)?;
    if let Some(required) = &min_ver {
        check_kiln_version(required)?;
    }
    Ok(min_ver)
}

/// Validate the top level of a resolved build description
///
/// Unknown top-level keys are ignored.
pub fn validate(root: &ConfigNode) -> Result<ValidationReport, ValidationError> {
    if root.as_mapping().is_none() {
        return Err(wrong_kind(NodePath::root(), "mapping", root));
    }

    let desc_node = mandatory(root, "desc")?;
    let desc = desc_node
        .as_str()
        .ok_or_else(|| wrong_kind(NodePath::root().key("desc"), "string", desc_node))?
        .to_string();

    let components_node = mandatory(root, "components")?;
    let components: Vec<String> = match components_node.as_mapping() {
        Some(map) if !map.is_empty() => map.keys().cloned().collect(),
        Some(_) => {
            return Err(wrong_kind(
                NodePath::root().key("components"),
                "non-empty mapping",
                components_node,
            ))
        }
        None => {
            return Err(wrong_kind(
                NodePath::root().key("components"),
                "mapping",
                components_node,
            ))
        }
    };

    let images: Vec<String> = match root.get("images") {
        None => Vec::new(),
        Some(ConfigNode::Mapping(map)) => map.keys().cloned().collect(),
        Some(other) => return Err(wrong_kind(NodePath::root().key("images"), "mapping", other)),
    };

    let min_ver = check_min_version_gate(root)?;

    tracing::debug!(
        "Validated document: {} component(s), {} image(s)",
        components.len(),
        images.len()
    );

    Ok(ValidationReport {
        desc,
        min_ver,
        components,
        images,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::yaml;

    #[test]
    fn test_valid_document() {
        let report = validate(&yaml(
            "desc: test\nmin_ver: \"0.1\"\ncomponents:\n  a: {}\n  b: {}\nimages:\n  full: {}\nextra: ignored\n",
        ))
        .unwrap();
        assert_eq!(report.desc, "test");
        assert_eq!(report.min_ver.as_deref(), Some("0.1"));
        assert_eq!(report.components, ["a", "b"]);
        assert_eq!(report.images, ["full"]);
    }

    #[test]
    fn test_missing_desc() {
        let err = validate(&yaml("components:\n  a: {}\n")).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingMandatoryKey {
                path: NodePath::root(),
                key: "desc".into(),
            }
        );
    }

    #[test]
    fn test_desc_must_be_string() {
        let err = validate(&yaml("desc: [a]\ncomponents:\n  a: {}\n")).unwrap_err();
        assert!(matches!(err, ValidationError::WrongKind { ref path, .. } if path.to_string() == "desc"));
    }

    #[test]
    fn test_components_must_be_non_empty_mapping() {
        let err = validate(&yaml("desc: x\n")).unwrap_err();
        assert!(matches!(err, ValidationError::MissingMandatoryKey { ref key, .. } if key == "components"));

        let err = validate(&yaml("desc: x\ncomponents: {}\n")).unwrap_err();
        assert!(matches!(err, ValidationError::WrongKind { ref expected, .. } if expected == "non-empty mapping"));

        let err = validate(&yaml("desc: x\ncomponents: [a]\n")).unwrap_err();
        assert!(matches!(err, ValidationError::WrongKind { ref actual, .. } if actual == "sequence"));
    }

    #[test]
    fn test_too_new_document() {
        let err = validate(&yaml("desc: x\nmin_ver: \"99.0\"\ncomponents:\n  a: {}\n")).unwrap_err();
        assert!(matches!(err, ValidationError::VersionTooOld { ref required, .. } if required == "99.0"));
    }

    #[test]
    fn test_numeric_min_ver() {
        assert_eq!(
            min_version_of(&yaml("min_ver: 0.3\n")).unwrap().as_deref(),
            Some("0.3")
        );
        assert!(min_version_of(&yaml("min_ver:\n")).is_err());
        assert_eq!(min_version_of(&yaml("desc: x\n")).unwrap(), None);
    }

    #[test]
    fn test_numeric_min_ver_keeps_minor_digits() {
        // 0.10 is newer than this release, 0.1 is not
        let err = check_min_version_gate(&yaml("min_ver: 0.10\n")).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::VersionTooOld { ref required, .. } if required == "0.10"
        ));
        assert!(check_min_version_gate(&yaml("min_ver: 0.1\n")).is_ok());
    }

    #[test]
    fn test_unparsable_min_ver() {
        let err = check_min_version_gate(&yaml("min_ver: latest\n")).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidVersion { .. }));
    }
}
