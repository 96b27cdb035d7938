//! Plugin capability interface
//!
//! Fetchers, builders and image blocks form closed sets of variants selected
//! by a `type` discriminator. The graph builder only talks to them through
//! [`Capability`]; nothing here runs a command.

pub mod builders;
pub mod fetchers;
pub mod images;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::defaults::STAMP_DIR;
use crate::core::tree::{ConfigNode, Mapping, NodePath, Scalar};
use crate::error::PluginError;

pub use builders::BuilderKind;
pub use fetchers::FetcherKind;
pub use images::{BlockEntry, ImageSpec};

/// Stage a command belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Fetch,
    Conf,
    Build,
    Image,
}

/// One step of work, described for an external emitter
///
/// `rule` names a command template; `variables` fill it in. The emitter
/// decides how the template is rendered into shell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandDescription {
    /// Stage the step runs in
    pub stage: Stage,
    /// Command template name, e.g. `git_clone`
    pub rule: String,
    /// Files the step reads, besides stage ordering
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<String>,
    /// Files the step produces
    pub outputs: Vec<String>,
    /// Template variables
    pub variables: BTreeMap<String, String>,
    /// Whether the step needs the terminal to itself
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub console: bool,
}

impl CommandDescription {
    /// Create a step with no inputs and no variables
    pub fn new(stage: Stage, rule: &str, outputs: Vec<String>) -> Self {
        Self {
            stage,
            rule: rule.to_string(),
            inputs: Vec::new(),
            outputs,
            variables: BTreeMap::new(),
            console: false,
        }
    }

    /// Add an input file
    #[must_use]
    pub fn input(mut self, input: impl Into<String>) -> Self {
        self.inputs.push(input.into());
        self
    }

    /// Add inputs
    #[must_use]
    pub fn inputs(mut self, inputs: impl IntoIterator<Item = String>) -> Self {
        self.inputs.extend(inputs);
        self
    }

    /// Set a template variable
    #[must_use]
    pub fn var(mut self, name: &str, value: impl Into<String>) -> Self {
        self.variables.insert(name.to_string(), value.into());
        self
    }

    /// Mark the step as interactive
    #[must_use]
    pub fn console(mut self) -> Self {
        self.console = true;
        self
    }
}

/// Where a step is generated for
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    /// Owning component name
    pub component: &'a str,
    /// Component build directory
    pub build_dir: &'a str,
}

/// Uniform contract of fetcher and builder variants
pub trait Capability {
    /// Structural check of the variant's mandatory and optional fields
    fn validate(&self, spec: &Mapping, path: &NodePath) -> Result<(), PluginError>;

    /// Files or directories the variant produces
    fn declared_outputs(
        &self,
        spec: &Mapping,
        build_dir: &str,
        path: &NodePath,
    ) -> Result<Vec<String>, PluginError>;

    /// Steps an emitter needs to render this variant
    fn command_description(
        &self,
        spec: &Mapping,
        ctx: StepContext<'_>,
        path: &NodePath,
    ) -> Result<Vec<CommandDescription>, PluginError>;
}

/// Join a relative path onto a base directory
///
/// `"."` and empty parts vanish; an absolute `rel` is returned as is.
pub fn join_path(base: &str, rel: &str) -> String {
    let rel = rel.trim_start_matches("./");
    if rel.is_empty() || rel == "." {
        return base.trim_end_matches('/').to_string();
    }
    if rel.starts_with('/') || base.is_empty() || base == "." {
        return rel.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), rel)
}

/// Deterministic stamp file name for a step
///
/// Parts are percent-escaped (`%`, `-`, `/`, `:`) and joined with `-`, so
/// two different non-empty part lists never share a stamp.
///
/// # Examples
/// ```
/// use kiln::core::plugins::stamp_name;
///
/// assert_eq!(stamp_name(&["domd", "yocto", "layers"]), ".stamps/domd-yocto-layers");
/// assert_eq!(stamp_name(&["meta-xt", "clone"]), ".stamps/meta%2Dxt-clone");
/// ```
pub fn stamp_name(parts: &[&str]) -> String {
    let escaped: Vec<String> = parts.iter().map(|part| escape_stamp_part(part)).collect();
    format!("{STAMP_DIR}/{}", escaped.join("-"))
}

fn escape_stamp_part(part: &str) -> String {
    let mut escaped = String::with_capacity(part.len());
    for c in part.chars() {
        match c {
            '%' => escaped.push_str("%25"),
            '-' => escaped.push_str("%2D"),
            '/' => escaped.push_str("%2F"),
            ':' => escaped.push_str("%3A"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Typed access to the fields of one variant spec
pub(crate) struct Fields<'a> {
    spec: &'a Mapping,
    path: &'a NodePath,
}

impl<'a> Fields<'a> {
    pub(crate) fn new(spec: &'a Mapping, path: &'a NodePath) -> Self {
        Self { spec, path }
    }

    fn invalid(&self, field: &str, expected: &str) -> PluginError {
        PluginError::InvalidField {
            field: field.to_string(),
            expected: expected.to_string(),
            path: self.path.key(field),
        }
    }

    fn missing(&self, field: &str) -> PluginError {
        PluginError::MissingField {
            field: field.to_string(),
            path: self.path.clone(),
        }
    }

    /// Scalar field rendered as text; numbers and booleans are accepted
    pub(crate) fn text(&self, field: &str) -> Result<Option<String>, PluginError> {
        match self.spec.get(field) {
            None => Ok(None),
            Some(ConfigNode::Scalar(scalar)) => scalar
                .to_text()
                .map(Some)
                .ok_or_else(|| self.invalid(field, "a string")),
            Some(_) => Err(self.invalid(field, "a string")),
        }
    }

    pub(crate) fn required_text(&self, field: &str) -> Result<String, PluginError> {
        self.text(field)?.ok_or_else(|| self.missing(field))
    }

    pub(crate) fn text_or(&self, field: &str, default: &str) -> Result<String, PluginError> {
        Ok(self.text(field)?.unwrap_or_else(|| default.to_string()))
    }

    pub(crate) fn int(&self, field: &str) -> Result<Option<i64>, PluginError> {
        match self.spec.get(field) {
            None => Ok(None),
            Some(node) => node
                .as_int()
                .filter(|i| *i >= 0)
                .map(Some)
                .ok_or_else(|| self.invalid(field, "a non-negative integer")),
        }
    }

    pub(crate) fn bool_or(&self, field: &str, default: bool) -> Result<bool, PluginError> {
        match self.spec.get(field) {
            None => Ok(default),
            Some(node) => node.as_bool().ok_or_else(|| self.invalid(field, "a boolean")),
        }
    }

    /// List of scalars rendered as text; absent means empty
    pub(crate) fn text_list(&self, field: &str) -> Result<Vec<String>, PluginError> {
        match self.spec.get(field) {
            None | Some(ConfigNode::Scalar(Scalar::Null)) => Ok(Vec::new()),
            Some(ConfigNode::Sequence(items)) => items
                .iter()
                .map(|item| match item {
                    ConfigNode::Scalar(s) => s.to_text(),
                    _ => None,
                })
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| self.invalid(field, "a list of strings")),
            Some(_) => Err(self.invalid(field, "a list of strings")),
        }
    }

    pub(crate) fn required_list(&self, field: &str) -> Result<Vec<String>, PluginError> {
        if !self.spec.contains_key(field) {
            return Err(self.missing(field));
        }
        let list = self.text_list(field)?;
        if list.is_empty() {
            return Err(self.invalid(field, "a non-empty list of strings"));
        }
        Ok(list)
    }

    /// Text or list of texts, e.g. `args: "-v"` or `args: ["-v", "-x"]`
    pub(crate) fn text_or_list(&self, field: &str) -> Result<Vec<String>, PluginError> {
        match self.spec.get(field) {
            None | Some(ConfigNode::Scalar(Scalar::Null) | ConfigNode::Sequence(_)) => {
                self.text_list(field)
            }
            Some(ConfigNode::Scalar(_)) => Ok(self.text(field)?.into_iter().collect()),
            Some(ConfigNode::Mapping(_)) => Err(self.invalid(field, "a string or a list of strings")),
        }
    }

    pub(crate) fn mapping(&self, field: &str) -> Result<Option<&'a Mapping>, PluginError> {
        match self.spec.get(field) {
            None => Ok(None),
            Some(node) => node
                .as_mapping()
                .map(Some)
                .ok_or_else(|| self.invalid(field, "a mapping")),
        }
    }

    pub(crate) fn path(&self) -> &'a NodePath {
        self.path
    }
}

/// Read the `type` discriminator of a variant spec
///
/// A bare `type: null` names the `null` variant.
pub(crate) fn type_of<'a>(spec: &'a Mapping, path: &NodePath) -> Result<&'a str, PluginError> {
    match spec.get("type") {
        None => Err(PluginError::MissingField {
            field: "type".to_string(),
            path: path.clone(),
        }),
        Some(ConfigNode::Scalar(Scalar::Null)) => Ok("null"),
        Some(node) => node.as_str().ok_or_else(|| PluginError::InvalidField {
            field: "type".to_string(),
            expected: "a string".to_string(),
            path: path.key("type"),
        }),
    }
}
