//! Configuration tree model
//!
//! A loaded build description is a tree of mappings, sequences and scalars.
//! Mappings keep document order, which is what makes target ids, parameter
//! application and error reporting stable across runs.

use std::fmt;

use indexmap::IndexMap;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use yaml_rust2::Yaml;

use crate::error::LoadError;

/// Ordered mapping of keys to child nodes
pub type Mapping = IndexMap<String, ConfigNode>;

/// Scalar leaf value
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// Text value
    Str(String),
    /// Integer value
    Int(i64),
    /// Floating point value, kept as written (`5.10` stays `5.10`)
    Float(String),
    /// Boolean value
    Bool(bool),
    /// Explicit or implicit null (`key:` with no value)
    Null,
}

impl Scalar {
    /// Render the scalar the way it would appear in a command line
    pub fn to_text(&self) -> Option<String> {
        match self {
            Self::Str(s) => Some(s.clone()),
            Self::Int(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.clone()),
            Self::Bool(b) => Some(b.to_string()),
            Self::Null => None,
        }
    }
}

/// A node of the configuration tree
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigNode {
    /// Leaf value
    Scalar(Scalar),
    /// Ordered key/value pairs with unique keys
    Mapping(Mapping),
    /// Ordered list of nodes
    Sequence(Vec<ConfigNode>),
}

/// Kind of a node, used in type errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Scalar,
    Mapping,
    Sequence,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar => write!(f, "scalar"),
            Self::Mapping => write!(f, "mapping"),
            Self::Sequence => write!(f, "sequence"),
        }
    }
}

impl ConfigNode {
    /// Create an empty mapping node
    pub fn empty_mapping() -> Self {
        Self::Mapping(Mapping::new())
    }

    /// Create a string scalar node
    pub fn string(value: impl Into<String>) -> Self {
        Self::Scalar(Scalar::Str(value.into()))
    }

    /// Kind of this node
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Scalar(_) => NodeKind::Scalar,
            Self::Mapping(_) => NodeKind::Mapping,
            Self::Sequence(_) => NodeKind::Sequence,
        }
    }

    /// Returns true for a mapping without any keys
    pub fn is_empty_mapping(&self) -> bool {
        matches!(self, Self::Mapping(m) if m.is_empty())
    }

    /// Borrow as mapping
    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Self::Mapping(m) => Some(m),
            _ => None,
        }
    }

    /// Borrow as sequence
    pub fn as_sequence(&self) -> Option<&[ConfigNode]> {
        match self {
            Self::Sequence(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow as string scalar
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Scalar(Scalar::Str(s)) => Some(s),
            _ => None,
        }
    }

    /// Read as boolean scalar
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Scalar(Scalar::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// Read as integer scalar
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Scalar(Scalar::Int(i)) => Some(*i),
            _ => None,
        }
    }

    /// Look up a key when this node is a mapping
    pub fn get(&self, key: &str) -> Option<&ConfigNode> {
        self.as_mapping().and_then(|m| m.get(key))
    }

    /// Return a copy of this mapping without the given top-level keys
    #[must_use]
    pub fn without_keys(&self, keys: &[&str]) -> Self {
        match self {
            Self::Mapping(m) => Self::Mapping(
                m.iter()
                    .filter(|(k, _)| !keys.contains(&k.as_str()))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}

impl From<&str> for ConfigNode {
    fn from(value: &str) -> Self {
        Self::string(value)
    }
}

impl From<bool> for ConfigNode {
    fn from(value: bool) -> Self {
        Self::Scalar(Scalar::Bool(value))
    }
}

impl From<i64> for ConfigNode {
    fn from(value: i64) -> Self {
        Self::Scalar(Scalar::Int(value))
    }
}

impl From<Vec<ConfigNode>> for ConfigNode {
    fn from(value: Vec<ConfigNode>) -> Self {
        Self::Sequence(value)
    }
}

impl From<Mapping> for ConfigNode {
    fn from(value: Mapping) -> Self {
        Self::Mapping(value)
    }
}

impl Serialize for ConfigNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Scalar(Scalar::Str(s)) => serializer.serialize_str(s),
            Self::Scalar(Scalar::Int(i)) => serializer.serialize_i64(*i),
            Self::Scalar(Scalar::Float(f)) => match f.parse::<f64>() {
                Ok(value) if value.is_finite() => serializer.serialize_f64(value),
                _ => serializer.serialize_str(f),
            },
            Self::Scalar(Scalar::Bool(b)) => serializer.serialize_bool(*b),
            Self::Scalar(Scalar::Null) => serializer.serialize_unit(),
            Self::Mapping(m) => {
                let mut map = serializer.serialize_map(Some(m.len()))?;
                for (k, v) in m {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            Self::Sequence(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

/// One step of a [`NodePath`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Structural location of a node inside the document
///
/// Renders as `components.domd.builder.conf[2]`; the root renders as `<root>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NodePath(Vec<PathSegment>);

impl NodePath {
    /// Path of the document root
    pub fn root() -> Self {
        Self::default()
    }

    /// Path of a child mapping entry
    #[must_use]
    pub fn key(&self, key: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Key(key.to_string()));
        Self(segments)
    }

    /// Path of a child sequence item
    #[must_use]
    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Index(index));
        Self(segments)
    }

    /// Build a path from dotted keys, e.g. `NodePath::keys(&["components", "a"])`
    pub fn keys(keys: &[&str]) -> Self {
        keys.iter().fold(Self::root(), |path, k| path.key(k))
    }

    /// Returns true for the document root
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Path segments from the root
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "<root>");
        }
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Key(k) if i == 0 => write!(f, "{k}")?,
                PathSegment::Key(k) => write!(f, ".{k}")?,
                PathSegment::Index(idx) => write!(f, "[{idx}]")?,
            }
        }
        Ok(())
    }
}

/// YAML merge key, `<<: *anchor`
const MERGE_KEY: &str = "<<";

fn yaml_key_to_string(key: &Yaml, path: &NodePath) -> Result<String, LoadError> {
    match key {
        Yaml::String(s) | Yaml::Real(s) => Ok(s.clone()),
        Yaml::Integer(i) => Ok(i.to_string()),
        Yaml::Boolean(b) => Ok(b.to_string()),
        _ => Err(LoadError::NonScalarKey { path: path.clone() }),
    }
}

impl ConfigNode {
    /// Convert a parsed YAML document into a configuration tree
    ///
    /// Scalars keep their written text, and `<<` merge keys are folded in:
    /// keys written next to `<<` win, then earlier merge sources win.
    pub fn from_yaml(value: Yaml) -> Result<Self, LoadError> {
        Self::from_yaml_at(value, &NodePath::root())
    }

    fn from_yaml_at(value: Yaml, path: &NodePath) -> Result<Self, LoadError> {
        Ok(match value {
            Yaml::Null => Self::Scalar(Scalar::Null),
            Yaml::Boolean(b) => Self::Scalar(Scalar::Bool(b)),
            Yaml::Integer(i) => Self::Scalar(Scalar::Int(i)),
            Yaml::Real(text) => Self::Scalar(Scalar::Float(text)),
            Yaml::String(s) => Self::Scalar(Scalar::Str(s)),
            Yaml::Array(items) => Self::Sequence(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| Self::from_yaml_at(item, &path.index(i)))
                    .collect::<Result<_, _>>()?,
            ),
            Yaml::Hash(map) => {
                let mut out = Mapping::with_capacity(map.len());
                let mut merged = Vec::new();
                for (k, v) in map {
                    let key = yaml_key_to_string(&k, path)?;
                    if key == MERGE_KEY && matches!(k, Yaml::String(_)) {
                        merged.push(v);
                        continue;
                    }
                    let child = Self::from_yaml_at(v, &path.key(&key))?;
                    if out.insert(key.clone(), child).is_some() {
                        return Err(LoadError::DuplicateKey {
                            path: path.clone(),
                            key,
                        });
                    }
                }
                for source in merged {
                    merge_into(&mut out, source, path)?;
                }
                Self::Mapping(out)
            }
            Yaml::Alias(_) | Yaml::BadValue => {
                return Err(LoadError::InvalidValue { path: path.clone() })
            }
        })
    }

    /// Convert a parsed TOML value into a configuration tree
    pub fn from_toml(value: toml::Value) -> Self {
        match value {
            toml::Value::String(s) => Self::Scalar(Scalar::Str(s)),
            toml::Value::Integer(i) => Self::Scalar(Scalar::Int(i)),
            toml::Value::Float(f) => Self::Scalar(Scalar::Float(format!("{f:?}"))),
            toml::Value::Boolean(b) => Self::Scalar(Scalar::Bool(b)),
            toml::Value::Datetime(d) => Self::Scalar(Scalar::Str(d.to_string())),
            toml::Value::Array(items) => {
                Self::Sequence(items.into_iter().map(Self::from_toml).collect())
            }
            toml::Value::Table(table) => Self::Mapping(
                table
                    .into_iter()
                    .map(|(k, v)| (k, Self::from_toml(v)))
                    .collect(),
            ),
        }
    }
}

/// Add the entries of a `<<` source that `out` does not define yet
fn merge_into(out: &mut Mapping, source: Yaml, path: &NodePath) -> Result<(), LoadError> {
    let merge_path = path.key(MERGE_KEY);
    let sources = match source {
        Yaml::Array(items) => items,
        single => vec![single],
    };
    for source in sources {
        let ConfigNode::Mapping(entries) = ConfigNode::from_yaml_at(source, &merge_path)? else {
            return Err(LoadError::InvalidMerge { path: merge_path });
        };
        for (key, value) in entries {
            out.entry(key).or_insert(value);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::yaml;

    #[test]
    fn test_path_display() {
        let path = NodePath::keys(&["components", "domd", "builder", "conf"]).index(2);
        assert_eq!(path.to_string(), "components.domd.builder.conf[2]");
        assert_eq!(NodePath::root().to_string(), "<root>");
        assert_eq!(NodePath::root().index(0).key("a").to_string(), "[0].a");
    }

    #[test]
    fn test_yaml_keeps_document_order() {
        let node = yaml("zeta: 1\nalpha: 2\nmid: 3\n");
        let keys: Vec<&String> = node.as_mapping().unwrap().keys().collect();
        assert_eq!(keys, ["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_yaml_scalar_types() {
        let node = yaml("s: text\ni: 42\nf: 1.5\nb: true\nn:\n");
        assert_eq!(node.get("s").unwrap().as_str(), Some("text"));
        assert_eq!(node.get("i").unwrap().as_int(), Some(42));
        assert_eq!(node.get("f"), Some(&ConfigNode::Scalar(Scalar::Float("1.5".into()))));
        assert_eq!(node.get("b").unwrap().as_bool(), Some(true));
        assert_eq!(node.get("n"), Some(&ConfigNode::Scalar(Scalar::Null)));
    }

    #[test]
    fn test_yaml_numeric_keys_become_strings() {
        let node = yaml("1: one\ntrue: yes\n");
        assert!(node.get("1").is_some());
        assert!(node.get("true").is_some());
    }

    #[test]
    fn test_yaml_floats_keep_their_text() {
        let node = yaml("kver: 5.10\nmin_ver: 0.10\nexp: 1e3\n");
        let text = |key: &str| match node.get(key) {
            Some(ConfigNode::Scalar(scalar)) => scalar.to_text(),
            _ => None,
        };
        assert_eq!(text("kver").as_deref(), Some("5.10"));
        assert_eq!(text("min_ver").as_deref(), Some("0.10"));
        assert_eq!(text("exp").as_deref(), Some("1e3"));
    }

    fn load(doc: &str) -> Result<ConfigNode, LoadError> {
        let document = yaml_rust2::YamlLoader::load_from_str(doc).unwrap().remove(0);
        ConfigNode::from_yaml(document)
    }

    #[test]
    fn test_yaml_rejects_complex_keys() {
        let err = load("? [a, b]\n: c\n").unwrap_err();
        assert!(matches!(err, LoadError::NonScalarKey { .. }));
    }

    #[test]
    fn test_yaml_keys_colliding_as_text() {
        let err = load("1: a\n\"1\": b\n").unwrap_err();
        assert!(matches!(err, LoadError::DuplicateKey { ref key, .. } if key == "1"));
    }

    #[test]
    fn test_yaml_merge_keys() {
        let node = yaml(
            "a: &a {x: 1, y: 1}\nb: &b {y: 2, z: 2}\nc:\n  <<: [*a, *b]\n  x: 0\n",
        );
        let c = node.get("c").unwrap();
        assert_eq!(c.get("x").unwrap().as_int(), Some(0));
        assert_eq!(c.get("y").unwrap().as_int(), Some(1));
        assert_eq!(c.get("z").unwrap().as_int(), Some(2));
        assert!(c.get("<<").is_none());

        let err = load("c:\n  <<: [1]\n").unwrap_err();
        assert!(matches!(err, LoadError::InvalidMerge { .. }));
    }

    #[test]
    fn test_toml_conversion() {
        let value: toml::Value = toml::from_str("desc = \"x\"\n[components.a]\nlist = [1, 2]\n").unwrap();
        let node = ConfigNode::from_toml(value);
        assert_eq!(node.get("desc").unwrap().as_str(), Some("x"));
        let list = node.get("components").unwrap().get("a").unwrap().get("list").unwrap();
        assert_eq!(list.as_sequence().unwrap().len(), 2);
    }

    #[test]
    fn test_without_keys() {
        let node = yaml("a: 1\nvariables: {}\nparameters: {}\n");
        let stripped = node.without_keys(&["variables", "parameters"]);
        assert_eq!(stripped.as_mapping().unwrap().len(), 1);
        assert_eq!(node.as_mapping().unwrap().len(), 3);
    }

    #[test]
    fn test_serialize_roundtrips_through_yaml_text() {
        let node = yaml("b: [1, x]\na: {c: true}\n");
        let text = serde_yaml::to_string(&node).unwrap();
        assert_eq!(yaml(&text), node);
        assert!(text.find("b:").unwrap() < text.find("a:").unwrap());
    }
}
