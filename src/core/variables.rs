//! Variable store and `%{name}` expansion
//!
//! Variables come from the `variables` section of the merged document. Their
//! values may reference other variables; `%%` is an escape for a literal `%`
//! and always wins over token matching, so `%%{A}` never substitutes.
//!
//! Resolution walks variable references with an explicit work stack and
//! in-progress marks, so a reference loop is reported by name instead of
//! exhausting the call stack.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;

use crate::core::tree::{ConfigNode, Mapping, NodePath, Scalar};
use crate::error::VariableError;

/// Matches either the `%%` escape or a `%{name}` reference. The escape
/// alternative comes first so it takes precedence at the same position.
static TOKEN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"%%|%\{(\w[\w-]*)\}").expect("variable token regex is valid")
});

/// Piece of a tokenized string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Text copied as is
    Literal(String),
    /// `%{name}` reference
    Ref(String),
}

/// Split a string into literal text and variable references
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut last_end = 0;

    for cap in TOKEN_REGEX.captures_iter(text) {
        let Some(full) = cap.get(0) else { continue };
        literal.push_str(&text[last_end..full.start()]);
        match cap.get(1) {
            Some(name) => {
                if !literal.is_empty() {
                    tokens.push(Token::Literal(std::mem::take(&mut literal)));
                }
                tokens.push(Token::Ref(name.as_str().to_string()));
            }
            None => literal.push('%'),
        }
        last_end = full.end();
    }
    literal.push_str(&text[last_end..]);
    if !literal.is_empty() {
        tokens.push(Token::Literal(literal));
    }
    tokens
}

/// Mutable set of variables for one resolution run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableScope {
    values: IndexMap<String, String>,
}

impl VariableScope {
    /// Create an empty scope
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a scope from the `variables` mapping of a document
    pub fn from_mapping(mapping: &Mapping, path: &NodePath) -> Result<Self, VariableError> {
        let mut scope = Self::new();
        for (name, value) in mapping {
            let text = match value {
                ConfigNode::Scalar(scalar) => scalar.to_text(),
                _ => None,
            };
            let Some(text) = text else {
                return Err(VariableError::InvalidVariable {
                    name: name.clone(),
                    actual: match value {
                        ConfigNode::Scalar(_) => "null".to_string(),
                        other => other.kind().to_string(),
                    },
                    path: path.key(name),
                });
            };
            scope.set(name, text);
        }
        Ok(scope)
    }

    /// Define or redefine a variable
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.values.insert(name.to_string(), value.into());
    }

    /// Raw (unexpanded) value of a variable
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Number of variables
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true when no variables are defined
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Expand every variable and freeze the scope
    pub fn freeze(&self) -> Result<FrozenScope, VariableError> {
        let mut expander = Expander::new(self);
        for name in self.values.keys() {
            expander.resolve(name, &NodePath::keys(&["variables", name.as_str()]))?;
        }
        let values = self
            .values
            .keys()
            .filter_map(|name| {
                expander
                    .resolved
                    .get(name)
                    .map(|v| (name.clone(), v.clone()))
            })
            .collect();
        Ok(FrozenScope { values })
    }
}

/// Fully expanded, read-only variables
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrozenScope {
    values: IndexMap<String, String>,
}

impl FrozenScope {
    /// Expanded value of a variable
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Iterate variables in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Substitute references in `text`; `path` locates the text for errors
    pub fn expand(&self, text: &str, path: &NodePath) -> Result<String, VariableError> {
        let mut out = String::with_capacity(text.len());
        for token in tokenize(text) {
            match token {
                Token::Literal(s) => out.push_str(&s),
                Token::Ref(name) => match self.values.get(&name) {
                    Some(value) => out.push_str(value),
                    None => {
                        return Err(VariableError::UndefinedVariable {
                            name,
                            path: path.clone(),
                        })
                    }
                },
            }
        }
        Ok(out)
    }

    /// Expand every string scalar and mapping key in a tree
    pub fn expand_tree(&self, node: &ConfigNode) -> Result<ConfigNode, VariableError> {
        self.expand_node(node, &NodePath::root())
    }

    fn expand_node(&self, node: &ConfigNode, path: &NodePath) -> Result<ConfigNode, VariableError> {
        match node {
            ConfigNode::Scalar(Scalar::Str(s)) => {
                Ok(ConfigNode::Scalar(Scalar::Str(self.expand(s, path)?)))
            }
            ConfigNode::Scalar(other) => Ok(ConfigNode::Scalar(other.clone())),
            ConfigNode::Sequence(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| self.expand_node(item, &path.index(i)))
                .collect::<Result<Vec<_>, _>>()
                .map(ConfigNode::Sequence),
            ConfigNode::Mapping(map) => {
                let mut out = Mapping::with_capacity(map.len());
                for (key, value) in map {
                    let child_path = path.key(key);
                    let new_key = self.expand(key, &child_path)?;
                    let new_value = self.expand_node(value, &child_path)?;
                    if out.insert(new_key.clone(), new_value).is_some() {
                        return Err(VariableError::DuplicateKey {
                            key: new_key,
                            path: path.clone(),
                        });
                    }
                }
                Ok(ConfigNode::Mapping(out))
            }
        }
    }
}

/// Expand `text` against a (not yet frozen) scope.
///
/// Only the variables reachable from `text` are resolved.
///
/// # Examples
/// ```
/// use kiln::core::variables::{expand, VariableScope};
///
/// let mut scope = VariableScope::new();
/// scope.set("A", "a");
/// scope.set("B", "1%{A}%{A}");
/// assert_eq!(expand("%{B}", &scope).unwrap(), "1aa");
/// assert_eq!(expand("%%{A}", &scope).unwrap(), "%{A}");
/// ```
pub fn expand(text: &str, scope: &VariableScope) -> Result<String, VariableError> {
    let mut expander = Expander::new(scope);
    expander.expand(text, &NodePath::root())
}

/// Lazy resolver over a scope with memoized results
struct Expander<'a> {
    scope: &'a VariableScope,
    tokens: HashMap<&'a str, Vec<Token>>,
    resolved: HashMap<String, String>,
}

/// One variable being resolved on the work stack
struct Frame {
    name: String,
    next_token: usize,
    out: String,
}

impl<'a> Expander<'a> {
    fn new(scope: &'a VariableScope) -> Self {
        Self {
            scope,
            tokens: HashMap::new(),
            resolved: HashMap::new(),
        }
    }

    fn expand(&mut self, text: &str, path: &NodePath) -> Result<String, VariableError> {
        let mut out = String::with_capacity(text.len());
        for token in tokenize(text) {
            match token {
                Token::Literal(s) => out.push_str(&s),
                Token::Ref(name) => out.push_str(&self.resolve(&name, path)?),
            }
        }
        Ok(out)
    }

    fn tokens_of(&mut self, name: &str) -> Option<&[Token]> {
        let scope = self.scope;
        let (key, raw) = scope.values.get_key_value(name)?;
        Some(
            self.tokens
                .entry(key.as_str())
                .or_insert_with(|| tokenize(raw))
                .as_slice(),
        )
    }

    /// Fully expand one variable
    fn resolve(&mut self, name: &str, path: &NodePath) -> Result<String, VariableError> {
        if let Some(done) = self.resolved.get(name) {
            return Ok(done.clone());
        }
        if self.tokens_of(name).is_none() {
            return Err(VariableError::UndefinedVariable {
                name: name.to_string(),
                path: path.clone(),
            });
        }

        let mut stack = vec![Frame {
            name: name.to_string(),
            next_token: 0,
            out: String::new(),
        }];
        let mut in_progress: HashSet<String> = HashSet::from([name.to_string()]);

        while let Some(top) = stack.last() {
            let current = top.name.clone();
            let index = top.next_token;
            let token = self
                .tokens_of(&current)
                .and_then(|tokens| tokens.get(index))
                .cloned();

            let Some(token) = token else {
                // All tokens consumed
                if let Some(frame) = stack.pop() {
                    in_progress.remove(&frame.name);
                    tracing::debug!("  {} = {}", frame.name, frame.out);
                    self.resolved.insert(frame.name, frame.out);
                }
                continue;
            };

            let step = match token {
                Token::Literal(s) => Some(s),
                Token::Ref(dep) => {
                    if let Some(value) = self.resolved.get(&dep) {
                        Some(value.clone())
                    } else if in_progress.contains(&dep) {
                        let start = stack.iter().position(|f| f.name == dep).unwrap_or(0);
                        let mut cycle: Vec<String> =
                            stack[start..].iter().map(|f| f.name.clone()).collect();
                        cycle.push(dep);
                        return Err(VariableError::VariableCycle {
                            cycle,
                            path: NodePath::keys(&["variables", current.as_str()]),
                        });
                    } else if self.tokens_of(&dep).is_none() {
                        return Err(VariableError::UndefinedVariable {
                            name: dep,
                            path: NodePath::keys(&["variables", current.as_str()]),
                        });
                    } else {
                        in_progress.insert(dep.clone());
                        stack.push(Frame {
                            name: dep,
                            next_token: 0,
                            out: String::new(),
                        });
                        None
                    }
                }
            };

            if let Some(text) = step {
                if let Some(frame) = stack.last_mut() {
                    frame.out.push_str(&text);
                    frame.next_token += 1;
                }
            }
        }

        self.resolved
            .get(name)
            .cloned()
            .ok_or_else(|| VariableError::UndefinedVariable {
                name: name.to_string(),
                path: path.clone(),
            })
    }
}
