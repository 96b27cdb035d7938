//! Build description loading
//!
//! Reads a document from disk and converts it into the generic
//! [`ConfigNode`] tree. The format is picked from the file extension:
//! `.toml` is TOML, everything else is YAML. YAML scalars keep the text
//! they were written with, so `5.10` is never read back as `5.1`.

use std::path::Path;

use yaml_rust2::{Yaml, YamlLoader};

use crate::core::tree::ConfigNode;
use crate::error::LoadError;
use crate::infra::filesystem;

/// Supported document formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Yaml,
    Toml,
}

impl DocumentFormat {
    /// Pick the format from a file extension
    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") | None => Ok(Self::Yaml),
            Some("toml") => Ok(Self::Toml),
            Some(_) => Err(LoadError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}

/// Parse document text; `path` is only used in error messages
pub fn parse_document(
    text: &str,
    format: DocumentFormat,
    path: &Path,
) -> Result<ConfigNode, LoadError> {
    let root = match format {
        DocumentFormat::Yaml => {
            let documents = YamlLoader::load_from_str(text).map_err(|e| LoadError::Yaml {
                path: path.to_path_buf(),
                error: e.to_string(),
            })?;
            if documents.len() > 1 {
                tracing::warn!(
                    "{} holds {} YAML documents, only the first is used",
                    path.display(),
                    documents.len()
                );
            }
            ConfigNode::from_yaml(documents.into_iter().next().unwrap_or(Yaml::Null))?
        }
        DocumentFormat::Toml => {
            let value: toml::Value = toml::from_str(text).map_err(|e| LoadError::Toml {
                path: path.to_path_buf(),
                error: e.to_string(),
            })?;
            ConfigNode::from_toml(value)
        }
    };

    if root.as_mapping().is_none() {
        return Err(LoadError::RootNotMapping {
            actual: root.kind(),
        });
    }
    Ok(root)
}

/// Read and parse a build description
pub fn load_document(path: &Path) -> Result<ConfigNode, LoadError> {
    let format = DocumentFormat::from_path(path)?;
    let text = filesystem::read_file(path)?;
    tracing::debug!("Loaded {} ({} bytes)", path.display(), text.len());
    parse_document(&text, format, path)
}
