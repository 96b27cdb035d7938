//! Error types for kiln
//!
//! Domain-specific error types using thiserror. Every resolution stage has
//! its own enum; [`KilnError`] wraps them all. Variants carry the structural
//! path inside the document whenever one exists.

use std::path::PathBuf;
use thiserror::Error;

use crate::core::tree::{NodeKind, NodePath};

/// Filesystem errors
#[derive(Error, Debug)]
pub enum FilesystemError {
    /// Failed to read file
    #[error("Failed to read file '{path}': {error}")]
    ReadFile { path: PathBuf, error: String },

    /// Failed to write file
    #[error("Failed to write file '{path}': {error}")]
    WriteFile { path: PathBuf, error: String },

    /// Failed to create directory
    #[error("Failed to create directory '{path}': {error}")]
    CreateDir { path: PathBuf, error: String },
}

/// Document loading errors
#[derive(Error, Debug)]
pub enum LoadError {
    /// File could not be read
    #[error(transparent)]
    Read(#[from] FilesystemError),

    /// File extension names no known format
    #[error("Unsupported document format '{path}' (expected .yaml, .yml or .toml)")]
    UnsupportedFormat { path: PathBuf },

    /// YAML syntax error
    #[error("Failed to parse YAML document '{path}': {error}")]
    Yaml { path: PathBuf, error: String },

    /// TOML syntax error
    #[error("Failed to parse TOML document '{path}': {error}")]
    Toml { path: PathBuf, error: String },

    /// Mapping key is a sequence or mapping
    #[error("Mapping keys must be scalars at {path}")]
    NonScalarKey { path: NodePath },

    /// Same key twice in one mapping
    #[error("Duplicate key '{key}' at {path}")]
    DuplicateKey { path: NodePath, key: String },

    /// Scalar whose explicit tag does not fit its text, e.g. `!!int abc`
    #[error("Invalid YAML value at {path}")]
    InvalidValue { path: NodePath },

    /// `<<` merge value that is not a mapping or a list of mappings
    #[error("Merge key at {path} must name a mapping or a list of mappings")]
    InvalidMerge { path: NodePath },

    /// Document root is not a mapping
    #[error("Document root must be a mapping, got {actual}")]
    RootNotMapping { actual: NodeKind },
}

/// Variable expansion errors
#[derive(Error, Debug, PartialEq)]
pub enum VariableError {
    /// Reference to a variable that is not defined
    #[error("Reference to unknown variable '{name}' at {path}")]
    UndefinedVariable { name: String, path: NodePath },

    /// Variables refer to each other in a loop
    #[error("Circular reference in variables: {} at {path}", cycle.join(" -> "))]
    VariableCycle { cycle: Vec<String>, path: NodePath },

    /// Variable value is not a scalar
    #[error("Variable '{name}' must be a scalar value, got {actual} at {path}")]
    InvalidVariable {
        name: String,
        actual: String,
        path: NodePath,
    },

    /// Two keys of one mapping expanded to the same text
    #[error("Key '{key}' appears twice after variable expansion at {path}")]
    DuplicateKey { key: String, path: NodePath },
}

/// Override merge errors
#[derive(Error, Debug, PartialEq)]
pub enum MergeError {
    /// Overlay node kind differs from base node kind
    #[error("Incompatible types while applying overrides at {path}: base is {base_kind}, override is {overlay_kind}")]
    MergeTypeMismatch {
        path: NodePath,
        base_kind: NodeKind,
        overlay_kind: NodeKind,
    },
}

/// Parameter selection errors
#[derive(Error, Debug, PartialEq)]
pub enum ParameterError {
    /// No option marked as default and nothing selected
    #[error("Parameter '{parameter}' has no default option; select one with --{parameter}")]
    MissingDefaultOption { parameter: String },

    /// More than one option marked as default
    #[error("Parameter '{parameter}' has more than one default option: {}", options.join(", "))]
    MultipleDefaultOptions {
        parameter: String,
        options: Vec<String>,
    },

    /// Selected option does not exist
    #[error("Unknown option '{value}' for parameter '{parameter}' (choose from: {})", choices.join(", "))]
    UnknownParameterOption {
        parameter: String,
        value: String,
        choices: Vec<String>,
    },

    /// Selection names a parameter the document does not declare
    #[error("Unknown parameter '{name}'")]
    UnknownParameter { name: String },

    /// Mandatory key missing in a parameter definition
    #[error("Key '{key}' is mandatory at {path}")]
    MissingMandatoryKey { path: NodePath, key: String },

    /// Node of the wrong kind in a parameter definition
    #[error("Expected {expected} at {path}, got {actual}")]
    WrongKind {
        path: NodePath,
        expected: String,
        actual: String,
    },

    /// Applying the selected overlay failed
    #[error(transparent)]
    Merge(#[from] MergeError),
}

/// Resolved-tree validation errors
#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    /// Mandatory key missing
    #[error("Key '{key}' is mandatory at {path}")]
    MissingMandatoryKey { path: NodePath, key: String },

    /// Node of the wrong kind
    #[error("Expected {expected} at {path}, got {actual}")]
    WrongKind {
        path: NodePath,
        expected: String,
        actual: String,
    },

    /// Document needs a newer engine
    #[error("Build description requires version {required}, while you are running kiln {actual}")]
    VersionTooOld { required: String, actual: String },

    /// Version string cannot be parsed
    #[error("Invalid version '{version}': {reason}")]
    InvalidVersion { version: String, reason: String },
}

/// Plugin (fetcher/builder/image) validation errors
#[derive(Error, Debug, PartialEq)]
pub enum PluginError {
    /// Unknown fetcher discriminator
    #[error("Unknown fetcher type '{kind}' at {path}")]
    UnknownFetcherType { kind: String, path: NodePath },

    /// Unknown builder discriminator
    #[error("Unknown builder type '{kind}' at {path}")]
    UnknownBuilderType { kind: String, path: NodePath },

    /// Unknown image block entry discriminator
    #[error("Unknown image entry type '{kind}' at {path}")]
    UnknownImageEntry { kind: String, path: NodePath },

    /// Mandatory variant field missing
    #[error("Field '{field}' is mandatory at {path}")]
    MissingField { field: String, path: NodePath },

    /// Variant field has the wrong shape
    #[error("Field '{field}' at {path} must be {expected}")]
    InvalidField {
        field: String,
        expected: String,
        path: NodePath,
    },

    /// One clone directory checked out at two revisions
    #[error("Repository '{url}' cloned to '{dir}' has two revisions '{first}' and '{second}' (at {path})")]
    ConflictingRevision {
        url: String,
        dir: String,
        first: String,
        second: String,
        path: NodePath,
    },
}

/// Build graph synthesis errors
#[derive(Error, Debug, PartialEq)]
pub enum GraphError {
    /// Two components declare the same output
    #[error("Output '{path}' is produced by both '{first}' and '{second}'")]
    DuplicateOutputPath {
        path: String,
        first: String,
        second: String,
    },

    /// Cross-component dependency without a producer
    #[error("Component '{component}' depends on '{path}', which no component produces (at {location})")]
    UnresolvedDependency {
        component: String,
        path: String,
        location: NodePath,
    },

    /// Components depend on each other in a loop
    #[error("Circular dependency between components: {}", cycle.join(" -> "))]
    CyclicComponentDependency { cycle: Vec<String> },

    /// Two targets would share one id
    #[error("Target '{id}' is defined more than once")]
    DuplicateTarget { id: String },

    /// Component name not present in the document
    #[error("Unknown component '{name}'")]
    UnknownComponent { name: String },

    /// Variant validation failed
    #[error(transparent)]
    Plugin(#[from] PluginError),
}

/// Top-level kiln error type
#[derive(Error, Debug)]
pub enum KilnError {
    /// Load error
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    /// Variable error
    #[error("Variable error: {0}")]
    Variable(#[from] VariableError),

    /// Merge error
    #[error("Merge error: {0}")]
    Merge(#[from] MergeError),

    /// Parameter error
    #[error("Parameter error: {0}")]
    Parameter(#[from] ParameterError),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Plugin error
    #[error("Configuration error: {0}")]
    Plugin(#[from] PluginError),

    /// Graph error
    #[error("Build graph error: {0}")]
    Graph(#[from] GraphError),

    /// Filesystem error
    #[error("Filesystem error: {0}")]
    Filesystem(#[from] FilesystemError),

    /// Graph serialization error
    #[error("Failed to serialize build graph: {0}")]
    Serialize(String),
}
