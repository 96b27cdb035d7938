//! Override merging
//!
//! Folds an overlay tree onto a base tree. Mappings merge key by key,
//! sequences append, scalars are replaced. The base tree is never modified;
//! every call returns a fresh tree.

use crate::core::tree::{ConfigNode, Mapping, NodePath};
use crate::error::MergeError;

/// Merge `overlay` onto `base` and return the combined tree.
///
/// An empty mapping overlay returns `base` unchanged whatever its kind.
///
/// # Examples
/// ```
/// use kiln::core::merge::merge;
/// use kiln::core::tree::ConfigNode;
///
/// let base = ConfigNode::from(vec![ConfigNode::from("a")]);
/// let overlay = ConfigNode::from(vec![ConfigNode::from("b")]);
/// let merged = merge(&base, &overlay).unwrap();
/// assert_eq!(merged.as_sequence().unwrap().len(), 2);
/// ```
pub fn merge(base: &ConfigNode, overlay: &ConfigNode) -> Result<ConfigNode, MergeError> {
    merge_at(base, overlay, &NodePath::root())
}

/// Same as [`merge`], reporting errors relative to `path`
pub fn merge_at(
    base: &ConfigNode,
    overlay: &ConfigNode,
    path: &NodePath,
) -> Result<ConfigNode, MergeError> {
    if overlay.is_empty_mapping() {
        return Ok(base.clone());
    }

    match (base, overlay) {
        (ConfigNode::Mapping(base_map), ConfigNode::Mapping(overlay_map)) => {
            let mut result: Mapping = base_map.clone();
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.get(key) {
                    Some(base_value) => merge_at(base_value, overlay_value, &path.key(key))?,
                    None => overlay_value.clone(),
                };
                result.insert(key.clone(), merged);
            }
            Ok(ConfigNode::Mapping(result))
        }
        (ConfigNode::Sequence(base_items), ConfigNode::Sequence(overlay_items)) => {
            let mut items = Vec::with_capacity(base_items.len() + overlay_items.len());
            items.extend(base_items.iter().cloned());
            items.extend(overlay_items.iter().cloned());
            Ok(ConfigNode::Sequence(items))
        }
        (ConfigNode::Scalar(_), ConfigNode::Scalar(_)) => Ok(overlay.clone()),
        _ => Err(MergeError::MergeTypeMismatch {
            path: path.clone(),
            base_kind: base.kind(),
            overlay_kind: overlay.kind(),
        }),
    }
}

/// Fold several overlays onto `base` in order, each onto the previous result
pub fn merge_all<'a>(
    base: &ConfigNode,
    overlays: impl IntoIterator<Item = &'a ConfigNode>,
) -> Result<ConfigNode, MergeError> {
    overlays
        .into_iter()
        .try_fold(base.clone(), |acc, overlay| merge(&acc, overlay))
}
