//! Disk image block entries
//!
//! Images are assembled by an external tool; the engine only needs to know
//! which files each image reads so it can order `image-{name}` after the
//! components producing them.
//!
//! ```yaml
//! images:
//!   full:
//!     desc: "Full SD card image"
//!     type: gpt
//!     partitions:
//!       boot:
//!         type: raw_image
//!         image_path: "yocto/build/tmp/deploy/images/boot.img"
//!       rootfs:
//!         type: ext4
//!         files:
//!           "Image": "yocto/build/tmp/deploy/images/Image"
//! ```

use std::fmt;

use crate::core::plugins::type_of;
use crate::core::tree::{ConfigNode, Mapping, NodePath};
use crate::error::PluginError;

/// One node of an image block tree
#[derive(Debug, Clone, PartialEq)]
pub enum BlockEntry {
    /// GUID partition table with named partitions, in document order
    Gpt { partitions: Vec<(String, BlockEntry)> },
    /// Raw file copied as is
    RawImage { image_path: String },
    /// Android sparse image, expanded while writing
    AndroidSparse { image_path: String },
    /// ext4 filesystem built from `remote -> local` file pairs
    Ext4 { files: Vec<(String, String)> },
    /// Unused space
    Empty,
}

impl fmt::Display for BlockEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Gpt { .. } => "gpt",
            Self::RawImage { .. } => "raw_image",
            Self::AndroidSparse { .. } => "android_sparse",
            Self::Ext4 { .. } => "ext4",
            Self::Empty => "empty",
        })
    }
}

fn as_entry_mapping<'a>(node: &'a ConfigNode, path: &NodePath) -> Result<&'a Mapping, PluginError> {
    node.as_mapping().ok_or_else(|| PluginError::InvalidField {
        field: "type".to_string(),
        expected: "a block entry mapping".to_string(),
        path: path.clone(),
    })
}

fn image_path(spec: &Mapping, path: &NodePath) -> Result<String, PluginError> {
    match spec.get("image_path") {
        None => Err(PluginError::MissingField {
            field: "image_path".to_string(),
            path: path.clone(),
        }),
        Some(node) => node
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| PluginError::InvalidField {
                field: "image_path".to_string(),
                expected: "a file path".to_string(),
                path: path.key("image_path"),
            }),
    }
}

fn ext4_files(spec: &Mapping, path: &NodePath) -> Result<Vec<(String, String)>, PluginError> {
    let invalid = || PluginError::InvalidField {
        field: "files".to_string(),
        expected: "a mapping of 'remote': 'local' file names".to_string(),
        path: path.key("files"),
    };
    match spec.get("files") {
        None => Ok(Vec::new()),
        Some(ConfigNode::Mapping(files)) => files
            .iter()
            .map(|(remote, local)| {
                local
                    .as_str()
                    .map(|local| (remote.clone(), local.to_string()))
                    .ok_or_else(invalid)
            })
            .collect(),
        Some(_) => Err(invalid()),
    }
}

impl BlockEntry {
    /// Parse a block entry tree
    pub fn parse(node: &ConfigNode, path: &NodePath) -> Result<Self, PluginError> {
        let spec = as_entry_mapping(node, path)?;
        let kind = type_of(spec, path)?;
        Ok(match kind {
            "gpt" => {
                let partitions_path = path.key("partitions");
                let partitions = match spec.get("partitions") {
                    Some(ConfigNode::Mapping(parts)) => parts,
                    Some(_) => {
                        return Err(PluginError::InvalidField {
                            field: "partitions".to_string(),
                            expected: "a mapping of partition labels".to_string(),
                            path: partitions_path,
                        })
                    }
                    None => {
                        return Err(PluginError::MissingField {
                            field: "partitions".to_string(),
                            path: path.clone(),
                        })
                    }
                };
                Self::Gpt {
                    partitions: partitions
                        .iter()
                        .map(|(label, part)| {
                            Ok((label.clone(), Self::parse(part, &partitions_path.key(label))?))
                        })
                        .collect::<Result<_, PluginError>>()?,
                }
            }
            "raw_image" => Self::RawImage {
                image_path: image_path(spec, path)?,
            },
            "android_sparse" => Self::AndroidSparse {
                image_path: image_path(spec, path)?,
            },
            "ext4" => Self::Ext4 {
                files: ext4_files(spec, path)?,
            },
            "empty" => Self::Empty,
            other => {
                return Err(PluginError::UnknownImageEntry {
                    kind: other.to_string(),
                    path: path.key("type"),
                })
            }
        })
    }

    /// Files the entry reads, in document order
    ///
    /// Nested partitions are visited with an explicit stack.
    pub fn required_files(&self) -> Vec<String> {
        let mut files = Vec::new();
        let mut stack = vec![self];
        while let Some(entry) = stack.pop() {
            match entry {
                Self::Gpt { partitions } => {
                    stack.extend(partitions.iter().rev().map(|(_, part)| part));
                }
                Self::RawImage { image_path } | Self::AndroidSparse { image_path } => {
                    files.push(image_path.clone());
                }
                Self::Ext4 { files: pairs } => {
                    files.extend(pairs.iter().map(|(_, local)| local.clone()));
                }
                Self::Empty => {}
            }
        }
        files
    }
}

/// A named image from the `images` section
#[derive(Debug, Clone, PartialEq)]
pub struct ImageSpec {
    /// Image name (map key)
    pub name: String,
    /// Description, if given
    pub desc: Option<String>,
    /// Root block entry
    pub root: BlockEntry,
    /// Location in the document
    pub path: NodePath,
}

impl ImageSpec {
    /// Files this image needs, without duplicates, in document order
    pub fn required_files(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.root
            .required_files()
            .into_iter()
            .filter(|f| seen.insert(f.clone()))
            .collect()
    }
}

/// Read every image of the `images` section
pub fn images_of(root: &ConfigNode) -> Result<Vec<ImageSpec>, PluginError> {
    let images_path = NodePath::root().key("images");
    let Some(images) = root.get("images").and_then(ConfigNode::as_mapping) else {
        return Ok(Vec::new());
    };

    images
        .iter()
        .map(|(name, node)| {
            let path = images_path.key(name);
            Ok(ImageSpec {
                name: name.clone(),
                desc: node.get("desc").and_then(ConfigNode::as_str).map(str::to_string),
                root: BlockEntry::parse(node, &path)?,
                path,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::yaml;

    const IMAGES: &str = r#"
images:
  full:
    desc: "Full image"
    type: gpt
    partitions:
      boot:
        type: raw_image
        image_path: "boot.img"
      nested:
        type: gpt
        partitions:
          vendor:
            type: android_sparse
            image_path: "vendor.img"
      rootfs:
        type: ext4
        files:
          "Image": "kernel/Image"
          "dom0.dtb": "kernel/dom0.dtb"
      spare:
        type: empty
        size: "10 MiB"
  tiny:
    type: raw_image
    image_path: "boot.img"
"#;

    #[test]
    fn test_required_files_in_document_order() {
        let images = images_of(&yaml(IMAGES)).unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].desc.as_deref(), Some("Full image"));
        assert_eq!(
            images[0].required_files(),
            ["boot.img", "vendor.img", "kernel/Image", "kernel/dom0.dtb"]
        );
        assert_eq!(images[1].required_files(), ["boot.img"]);
    }

    #[test]
    fn test_unknown_entry_type() {
        let doc = yaml("images:\n  x:\n    type: gpt\n    partitions:\n      p:\n        type: btrfs\n");
        let err = images_of(&doc).unwrap_err();
        assert_eq!(
            err,
            PluginError::UnknownImageEntry {
                kind: "btrfs".into(),
                path: NodePath::keys(&["images", "x", "partitions", "p", "type"]),
            }
        );
    }

    #[test]
    fn test_raw_image_needs_path() {
        let doc = yaml("images:\n  x:\n    type: raw_image\n");
        assert!(matches!(
            images_of(&doc),
            Err(PluginError::MissingField { ref field, .. }) if field == "image_path"
        ));
    }

    #[test]
    fn test_gpt_needs_partitions() {
        let doc = yaml("images:\n  x:\n    type: gpt\n");
        assert!(matches!(
            images_of(&doc),
            Err(PluginError::MissingField { ref field, .. }) if field == "partitions"
        ));
    }

    #[test]
    fn test_duplicate_files_reported_once() {
        let doc = yaml(
            "images:\n  x:\n    type: gpt\n    partitions:\n      a: {type: raw_image, image_path: f}\n      b: {type: raw_image, image_path: f}\n",
        );
        assert_eq!(images_of(&doc).unwrap()[0].required_files(), ["f"]);
    }

    #[test]
    fn test_no_images_section() {
        assert!(images_of(&yaml("desc: x\n")).unwrap().is_empty());
    }
}
