//! Test utilities for property-based testing
//!
//! This module provides generators and helpers for proptest.

use yaml_rust2::{Yaml, YamlLoader};

use crate::core::tree::ConfigNode;

/// Parse a YAML snippet into a tree; an empty snippet is null
pub fn yaml(doc: &str) -> ConfigNode {
    let document = YamlLoader::load_from_str(doc)
        .unwrap()
        .into_iter()
        .next()
        .unwrap_or(Yaml::Null);
    ConfigNode::from_yaml(document).unwrap()
}

#[cfg(test)]
pub mod generators {
    use proptest::prelude::*;

    use crate::core::tree::{ConfigNode, Mapping, Scalar};

    /// Generate a valid variable name (`\w[\w-]*`)
    pub fn variable_name() -> impl Strategy<Value = String> {
        "[A-Za-z_][A-Za-z0-9_-]{0,15}"
    }

    /// Generate a scalar node
    pub fn scalar_node() -> impl Strategy<Value = ConfigNode> {
        prop_oneof![
            "[a-zA-Z0-9 /._-]{0,12}".prop_map(|s| ConfigNode::Scalar(Scalar::Str(s))),
            any::<i64>().prop_map(|i| ConfigNode::Scalar(Scalar::Int(i))),
            "-?[0-9]{1,4}\\.[0-9]{1,3}".prop_map(|f| ConfigNode::Scalar(Scalar::Float(f))),
            any::<bool>().prop_map(|b| ConfigNode::Scalar(Scalar::Bool(b))),
            Just(ConfigNode::Scalar(Scalar::Null)),
        ]
    }

    /// Generate an arbitrary configuration tree of bounded depth
    pub fn config_tree() -> impl Strategy<Value = ConfigNode> {
        scalar_node().prop_recursive(4, 32, 6, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..6).prop_map(ConfigNode::Sequence),
                prop::collection::vec(("[a-z]{1,6}", inner), 0..6).prop_map(|entries| {
                    let mut map = Mapping::new();
                    for (k, v) in entries {
                        map.insert(k, v);
                    }
                    ConfigNode::Mapping(map)
                }),
            ]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::generators::*;
    use crate::core::tree::{ConfigNode, Scalar};
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn test_variable_name_matches_reference_syntax(name in variable_name()) {
            let tokens = crate::core::variables::tokenize(&format!("%{{{name}}}"));
            prop_assert_eq!(tokens, vec![crate::core::variables::Token::Ref(name)]);
        }

        #[test]
        fn test_float_text_survives_loading(text in "[0-9]{1,3}\\.[0-9]{1,3}") {
            let node = super::yaml(&format!("v: {text}\n"));
            let expected = ConfigNode::Scalar(Scalar::Float(text));
            prop_assert_eq!(node.get("v"), Some(&expected));
        }

        #[test]
        fn test_config_tree_is_equal_to_its_clone(tree in config_tree()) {
            prop_assert_eq!(tree.clone(), tree);
        }
    }
}
