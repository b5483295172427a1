//! The recursive config value (spec §3.1) and path-addressed access into it.
//!
//! Grounded in the teacher's `Literal` (`prqlc-ast::expr::literal`): a small
//! tagged union over `enum-as-inner` for ergonomic `as_map()`/`into_list()`
//! accessors, here extended with the two compound variants (`List`, `Map`)
//! that make it recursive.

use enum_as_inner::EnumAsInner;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::id;

/// A config tree node: a scalar, an ordered sequence, or an ordered mapping.
///
/// Mapping key order is preserved (round-tripping what the loader saw) but
/// carries no semantics; sequence order does (spec §3.1).
#[derive(Debug, Clone, PartialEq, EnumAsInner, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Tree {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Tree>),
    Map(IndexMap<String, Tree>),
}

impl Tree {
    pub fn empty_map() -> Tree {
        Tree::Map(IndexMap::new())
    }

    pub fn is_container(&self) -> bool {
        matches!(self, Tree::Map(_) | Tree::List(_))
    }

    /// True for mappings carrying the reserved `_target_` key (spec §3.6).
    pub fn is_component_spec(&self) -> bool {
        matches!(self, Tree::Map(m) if m.contains_key("_target_"))
    }

    /// Renders a scalar the way YAML/the expression host would see it as
    /// text — used for `_disabled_`'s string-truthiness rule (spec §3.6).
    pub fn as_truthy_str(&self) -> Option<String> {
        match self {
            Tree::String(s) => Some(s.clone()),
            Tree::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Looks up a single child by a raw (already-split) segment: a mapping
    /// key, or a decimal list index.
    fn child(&self, segment: &str) -> Option<&Tree> {
        match self {
            Tree::Map(m) => m.get(segment),
            Tree::List(l) => segment.parse::<usize>().ok().and_then(|i| l.get(i)),
            _ => None,
        }
    }

    fn child_mut(&mut self, segment: &str) -> Option<&mut Tree> {
        match self {
            Tree::Map(m) => m.get_mut(segment),
            Tree::List(l) => segment.parse::<usize>().ok().and_then(|i| l.get_mut(i)),
            _ => None,
        }
    }

    /// Navigates `id` from this node, treating `self` as the root.
    pub fn get_path(&self, raw_id: &str) -> Option<&Tree> {
        let mut node = self;
        for seg in id::segments(raw_id) {
            node = node.child(seg)?;
        }
        Some(node)
    }

    pub fn get_path_mut(&mut self, raw_id: &str) -> Option<&mut Tree> {
        let mut node = self;
        for seg in id::segments(raw_id) {
            node = node.child_mut(seg)?;
        }
        Some(node)
    }

    /// Writes `value` at `raw_id`, creating missing intermediate mappings
    /// (spec §4.9 `Config.set`). Fails if an existing intermediate node is
    /// a non-container that would need to be indexed into.
    pub fn set_path(&mut self, raw_id: &str, value: Tree) -> Result<()> {
        let segs = id::segments(raw_id);
        if segs.is_empty() {
            *self = value;
            return Ok(());
        }
        let mut node = self;
        for seg in &segs[..segs.len() - 1] {
            if !node.is_container() {
                *node = Tree::empty_map();
            }
            node = match node {
                Tree::Map(m) => m.entry(seg.to_string()).or_insert_with(Tree::empty_map),
                Tree::List(l) => {
                    let i: usize = seg.parse().map_err(|_| {
                        Error::merge(format!("`{seg}` is not a valid list index in `{raw_id}`"))
                    })?;
                    while l.len() <= i {
                        l.push(Tree::Null);
                    }
                    &mut l[i]
                }
                _ => unreachable!("just normalized to a container"),
            };
        }
        let last = segs.last().unwrap();
        match node {
            Tree::Map(m) => {
                m.insert(last.to_string(), value);
            }
            Tree::List(l) => {
                let i: usize = last
                    .parse()
                    .map_err(|_| Error::merge(format!("`{last}` is not a valid list index")))?;
                while l.len() <= i {
                    l.push(Tree::Null);
                }
                l[i] = value;
            }
            _ => {
                *node = Tree::Map(IndexMap::from([(last.to_string(), value)]));
            }
        }
        Ok(())
    }
}

impl From<serde_yaml::Value> for Tree {
    fn from(v: serde_yaml::Value) -> Self {
        match v {
            serde_yaml::Value::Null => Tree::Null,
            serde_yaml::Value::Bool(b) => Tree::Bool(b),
            serde_yaml::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Tree::Int(i)
                } else {
                    Tree::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_yaml::Value::String(s) => Tree::String(s),
            serde_yaml::Value::Sequence(seq) => Tree::List(seq.into_iter().map(Tree::from).collect()),
            serde_yaml::Value::Mapping(map) => Tree::Map(
                map.into_iter()
                    .map(|(k, v)| (yaml_key_to_string(k), Tree::from(v)))
                    .collect(),
            ),
            serde_yaml::Value::Tagged(t) => Tree::from(t.value),
        }
    }
}

fn yaml_key_to_string(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s,
        other => serde_yaml::to_string(&other)
            .unwrap_or_default()
            .trim()
            .to_string(),
    }
}

impl From<Tree> for serde_yaml::Value {
    fn from(t: Tree) -> Self {
        match t {
            Tree::Null => serde_yaml::Value::Null,
            Tree::Bool(b) => serde_yaml::Value::Bool(b),
            Tree::Int(i) => serde_yaml::Value::Number(i.into()),
            Tree::Float(f) => serde_yaml::Value::Number(f.into()),
            Tree::String(s) => serde_yaml::Value::String(s),
            Tree::List(l) => serde_yaml::Value::Sequence(l.into_iter().map(Into::into).collect()),
            Tree::Map(m) => serde_yaml::Value::Mapping(
                m.into_iter()
                    .map(|(k, v)| (serde_yaml::Value::String(k), v.into()))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Tree {
        Tree::Map(IndexMap::from([
            (
                "parent".to_string(),
                Tree::Map(IndexMap::from([(
                    "child".to_string(),
                    Tree::Map(IndexMap::from([("sib".to_string(), Tree::Int(1))])),
                )])),
            ),
            (
                "list".to_string(),
                Tree::List(vec![Tree::Int(10), Tree::Int(20)]),
            ),
        ]))
    }

    #[test]
    fn get_path_navigates_nested_maps_and_lists() {
        let t = sample();
        assert_eq!(t.get_path("parent::child::sib"), Some(&Tree::Int(1)));
        assert_eq!(t.get_path("list::1"), Some(&Tree::Int(20)));
        assert_eq!(t.get_path(""), Some(&t));
        assert_eq!(t.get_path("nope"), None);
    }

    #[test]
    fn set_path_creates_intermediate_mappings() {
        let mut t = Tree::empty_map();
        t.set_path("a::b::c", Tree::Int(5)).unwrap();
        assert_eq!(t.get_path("a::b::c"), Some(&Tree::Int(5)));
    }

    #[test]
    fn set_path_root_replaces_whole_tree() {
        let mut t = sample();
        t.set_path("", Tree::Int(1)).unwrap();
        assert_eq!(t, Tree::Int(1));
    }

    #[test]
    fn is_component_spec_requires_target_key() {
        let c = Tree::Map(IndexMap::from([(
            "_target_".to_string(),
            Tree::String("builtins.dict".to_string()),
        )]));
        assert!(c.is_component_spec());
        assert!(!Tree::empty_map().is_component_spec());
    }

    #[test]
    fn yaml_round_trip_preserves_shape() {
        let t = sample();
        let yaml: serde_yaml::Value = t.clone().into();
        let back: Tree = yaml.into();
        assert_eq!(t, back);
    }
}
