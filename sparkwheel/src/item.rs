//! Classifies every addressable node of a preprocessed `Tree` into a
//! `Plain`/`Expression`/`Component` item (spec §3.6, §4.5).
//!
//! The teacher's `ir/decl.rs` tags every declaration with a `DeclKind`
//! (`TableDef`, `Fn`, `Module`, ...) so the resolver can branch on kind
//! instead of downcasting; `Item` plays the same role here, one level
//! removed from the declaration table into a plain value tree.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use enum_as_inner::EnumAsInner;

use crate::id::Id;
use crate::tree::Tree;

/// The classified form of one addressable node (spec §3.6).
#[derive(Debug, Clone, EnumAsInner)]
pub enum Item {
    /// Any non-string scalar, a string not starting with `$`, or a
    /// container (mapping/list) that isn't a component spec.
    Plain(Tree),
    /// A string beginning with `$`; `EXPR` is the part after the sigil.
    Expression(String),
    /// A mapping carrying the reserved `_target_` key. Always `Tree::Map`.
    Component(Tree),
}

pub fn classify(node: &Tree) -> Item {
    if node.is_component_spec() {
        Item::Component(node.clone())
    } else if let Tree::String(s) = node {
        if let Some(expr) = s.strip_prefix('$') {
            Item::Expression(expr.to_string())
        } else {
            Item::Plain(node.clone())
        }
    } else {
        Item::Plain(node.clone())
    }
}

/// Builds the flat `Id -> Item` table for a fully preprocessed tree. Every
/// addressable node gets an entry, including containers (so they can be
/// addressed and resolved directly) — spec §4.5.
pub fn build_table(root: &Tree) -> HashMap<Id, Item> {
    let mut table = HashMap::new();
    insert(root, &Id::root(), &mut table);
    table
}

fn insert(node: &Tree, id: &Id, table: &mut HashMap<Id, Item>) {
    table.insert(id.clone(), classify(node));
    match node {
        Tree::Map(m) => {
            for (k, v) in m {
                insert(v, &id.child(k), table);
            }
        }
        Tree::List(l) => {
            for (i, v) in l.iter().enumerate() {
                insert(v, &id.child(i), table);
            }
        }
        _ => {}
    }
}

static EMBEDDED_REF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@([A-Za-z_][A-Za-z0-9_]*(?:::[A-Za-z0-9_]+)*)").unwrap());

/// Left-greedy scan for `@ID` tokens embedded anywhere in an expression
/// source (spec §3.5): each match extends through the longest run of
/// `::`-joined identifier segments.
pub fn scan_embedded_refs(expr_source: &str) -> Vec<Id> {
    EMBEDDED_REF_RE
        .captures_iter(expr_source)
        .map(|c| Id::from(c.get(1).unwrap().as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    #[test]
    fn classifies_component_by_target_key() {
        let spec = Tree::Map(IndexMap::from([(
            "_target_".to_string(),
            Tree::String("builtins.dict".to_string()),
        )]));
        assert!(matches!(classify(&spec), Item::Component(_)));
    }

    #[test]
    fn classifies_dollar_string_as_expression() {
        let item = classify(&Tree::String("$@a * 2".to_string()));
        assert_eq!(item.into_expression().unwrap(), "@a * 2");
    }

    #[test]
    fn classifies_everything_else_as_plain() {
        assert!(matches!(classify(&Tree::Int(5)), Item::Plain(_)));
        assert!(matches!(
            classify(&Tree::String("@a".to_string())),
            Item::Plain(_)
        ));
        assert!(matches!(classify(&Tree::List(vec![])), Item::Plain(_)));
    }

    #[test]
    fn build_table_enters_containers_and_leaves() {
        let t = Tree::Map(IndexMap::from([(
            "a".to_string(),
            Tree::Map(IndexMap::from([("b".to_string(), Tree::Int(1))])),
        )]));
        let table = build_table(&t);
        assert!(table.contains_key(&Id::root()));
        assert!(table.contains_key(&Id::from("a")));
        assert!(table.contains_key(&Id::from("a::b")));
    }

    #[test]
    fn scans_multiple_embedded_refs_longest_match_first() {
        let refs = scan_embedded_refs("@a::b + @c * 2");
        assert_eq!(refs, vec![Id::from("a::b"), Id::from("c")]);
    }
}
