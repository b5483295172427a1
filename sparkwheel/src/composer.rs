//! Tree-to-tree merge under the three composition operators (spec §3.4, §4.3).
//!
//! Grounded in the teacher's `semantic::resolver` recursion shape (walk two
//! parallel structures, dispatch per node kind) but applied to `Tree` pairs
//! instead of scope lookups.

use std::collections::BTreeSet;

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::tree::Tree;

const REPLACE: char = '=';
const REMOVE: char = '~';
const LEGACY_COMPOSE: char = '+';

/// Merges `override_` onto `base`, producing a new tree. Never mutates
/// either input (spec §4.3 invariant 1 — both deep-copied on install).
pub fn merge(base: &Tree, override_: &Tree) -> Result<Tree> {
    let (Tree::Map(base_map), Tree::Map(override_map)) = (base, override_) else {
        // Either side isn't a mapping: override wins outright.
        return Ok(override_.clone());
    };

    let mut result = base_map.clone();
    for (raw_key, value) in override_map {
        if let Some(key) = raw_key.strip_prefix(REPLACE) {
            result.insert(key.to_string(), value.clone());
        } else if let Some(key) = raw_key.strip_prefix(REMOVE) {
            apply_remove(&mut result, key, value)?;
        } else if let Some(key) = raw_key.strip_prefix(LEGACY_COMPOSE) {
            log::debug!("`+{key}`: legacy compose prefix, treated as plain `{key}`");
            compose_one(&mut result, key, value)?;
        } else {
            compose_one(&mut result, raw_key, value)?;
        }
    }
    Ok(Tree::Map(result))
}

fn compose_one(result: &mut IndexMap<String, Tree>, key: &str, value: &Tree) -> Result<()> {
    match result.get(key) {
        Some(Tree::Map(_)) if matches!(value, Tree::Map(_)) => {
            let existing = result.get(key).unwrap();
            let merged = merge(existing, value)?;
            result.insert(key.to_string(), merged);
        }
        Some(Tree::List(base_list)) if matches!(value, Tree::List(_)) => {
            let Tree::List(override_list) = value else {
                unreachable!()
            };
            let mut combined = base_list.clone();
            combined.extend(override_list.iter().cloned());
            result.insert(key.to_string(), Tree::List(combined));
        }
        _ => {
            result.insert(key.to_string(), value.clone());
        }
    }
    Ok(())
}

fn apply_remove(result: &mut IndexMap<String, Tree>, key: &str, spec: &Tree) -> Result<()> {
    match spec {
        Tree::Null => {
            result.shift_remove(key);
            Ok(())
        }
        Tree::String(s) if s.is_empty() => {
            result.shift_remove(key);
            Ok(())
        }
        Tree::List(items) => remove_batch(result, key, items),
        _ => Err(Error::merge(format!(
            "`~{key}`: value must be null, an empty string, or a list of keys/indices"
        ))),
    }
}

fn remove_batch(result: &mut IndexMap<String, Tree>, key: &str, items: &[Tree]) -> Result<()> {
    match result.get(key) {
        None => Err(Error::merge(format!(
            "`~{key}`: cannot remove sub-keys/indices, `{key}` is not present in the base"
        ))),
        Some(Tree::List(base_list)) => {
            let len = base_list.len() as i64;
            let mut drop_indices = BTreeSet::new();
            for item in items {
                let i = item.as_int().copied().ok_or_else(|| {
                    Error::merge(format!("`~{key}`: list indices must be integers"))
                })?;
                let normalized = if i < 0 { i + len } else { i };
                if normalized < 0 || normalized >= len {
                    return Err(Error::merge(format!(
                        "`~{key}`: index {i} is out of range for a list of length {len}"
                    )));
                }
                drop_indices.insert(normalized as usize);
            }
            let kept: Vec<Tree> = base_list
                .iter()
                .enumerate()
                .filter(|(i, _)| !drop_indices.contains(i))
                .map(|(_, v)| v.clone())
                .collect();
            result.insert(key.to_string(), Tree::List(kept));
            Ok(())
        }
        Some(Tree::Map(base_map)) => {
            let mut m = base_map.clone();
            for item in items {
                let sub_key = item.as_string().ok_or_else(|| {
                    Error::merge(format!("`~{key}`: dict sub-keys to remove must be strings"))
                })?;
                if m.shift_remove(sub_key).is_none() {
                    return Err(Error::merge(format!(
                        "`~{key}`: sub-key `{sub_key}` does not exist"
                    )));
                }
            }
            result.insert(key.to_string(), Tree::Map(m));
            Ok(())
        }
        Some(_) => Err(Error::merge(format!(
            "`~{key}`: batch removal requires a list or mapping base"
        ))),
    }
}
