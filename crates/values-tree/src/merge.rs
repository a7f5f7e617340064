//! Deep merge of configuration trees
//!
//! Merge semantics:
//! - Mappings: deep-merge by key (recursive)
//! - Sequences: REPLACE (override wins entirely)
//! - Scalars: override (override wins)
//! - Mismatched types: override wins, including null

use crate::tree::{ConfigTree, Mapping};

/// Deep merge `overlay` onto `base` without touching either operand.
///
/// Keys of `base` keep their position; keys only present in `overlay`
/// follow in overlay order.
pub fn deep_merge(base: &ConfigTree, overlay: &ConfigTree) -> ConfigTree {
    match (base, overlay) {
        (ConfigTree::Mapping(base_map), ConfigTree::Mapping(overlay_map)) => {
            let mut merged = Mapping::with_capacity(base_map.len() + overlay_map.len());
            for (key, base_value) in base_map {
                let value = match overlay_map.get(key) {
                    Some(overlay_value) => deep_merge(base_value, overlay_value),
                    None => base_value.clone(),
                };
                merged.insert(key.clone(), value);
            }
            for (key, overlay_value) in overlay_map {
                if !base_map.contains_key(key) {
                    merged.insert(key.clone(), overlay_value.clone());
                }
            }
            ConfigTree::Mapping(merged)
        }

        (_, overlay) => overlay.clone(),
    }
}

/// Deep merge consuming both operands. Same result as [`deep_merge`].
pub fn merge_owned(base: ConfigTree, overlay: ConfigTree) -> ConfigTree {
    match (base, overlay) {
        (ConfigTree::Mapping(mut base_map), ConfigTree::Mapping(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(slot) => {
                        let base_value = std::mem::replace(slot, ConfigTree::null());
                        *slot = merge_owned(base_value, overlay_value);
                    }
                    None => {
                        base_map.insert(key, overlay_value);
                    }
                }
            }
            ConfigTree::Mapping(base_map)
        }

        (_, overlay) => overlay,
    }
}

/// Merge layers in order (first is base, last has highest precedence).
///
/// Folds from the empty mapping, so no layers yields `{}`.
pub fn compose_layers<I>(layers: I) -> ConfigTree
where
    I: IntoIterator<Item = ConfigTree>,
{
    layers
        .into_iter()
        .fold(ConfigTree::empty_mapping(), merge_owned)
}
