//! Path: parse, split, normalize, and relatively-resolve identifier
//! strings (spec §3.2, §4.1).
//!
//! An [`Id`] is a thin newtype over `String`, modeled on the teacher's
//! `prqlc-parser::pr::Ident` (a dotted name addressing a declaration) but
//! using `::`-joined segments instead of `.`-joined path components, and
//! without a distinguished "last" element — every segment of a sparkwheel
//! `Id` is equally a mapping key or list index.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

/// The literal segment separator (spec §3.2).
pub const ID_SEP: &str = "::";
/// Reference sigil.
pub const ID_REF: char = '@';
/// Macro sigil.
pub const MACRO: char = '%';

/// A `::`-separated identifier. The empty id denotes the tree root.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id(String);

impl Id {
    pub fn root() -> Self {
        Id(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Splits into segments. The root id has zero segments.
    pub fn segments(&self) -> Vec<&str> {
        segments(&self.0)
    }

    pub fn depth(&self) -> usize {
        self.segments().len()
    }

    /// Appends one segment (a mapping key or list index), returning a new id.
    pub fn child(&self, segment: impl fmt::Display) -> Id {
        if self.0.is_empty() {
            Id(segment.to_string())
        } else {
            Id(format!("{}{ID_SEP}{}", self.0, segment))
        }
    }

    /// Drops the last `n` segments.
    pub fn ancestor(&self, n: usize) -> Id {
        let segs = self.segments();
        let keep = segs.len().saturating_sub(n);
        join(&segs[..keep])
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Id(s.to_string())
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Id(s)
    }
}

impl AsRef<str> for Id {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Splits a raw id string on `::`. The empty string has zero segments,
/// matching `depth("") == 0` (spec §3.2).
pub fn segments(id: &str) -> Vec<&str> {
    if id.is_empty() {
        Vec::new()
    } else {
        id.split(ID_SEP).collect()
    }
}

pub fn join(segments: &[&str]) -> Id {
    Id(segments.join(ID_SEP))
}

pub fn depth(id: &str) -> usize {
    segments(id).len()
}

static FILE_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(.+\.ya?ml)(?:::(.*))?$").unwrap());

/// Splits `s` into `(file, id)`. If `s` doesn't match `FILE.yaml[::ID]`
/// (case-insensitive extension), returns `("", s)` — the whole string is a
/// pure id (spec §3.2, §4.1 `split_file_and_id`).
pub fn split_file_and_id(s: &str) -> (String, String) {
    match FILE_ID_RE.captures(s) {
        Some(caps) => {
            let file = caps.get(1).unwrap().as_str().to_string();
            let id = caps.get(2).map(|m| m.as_str()).unwrap_or("").to_string();
            (file, id)
        }
        None => (String::new(), s.to_string()),
    }
}

static RELATIVE_PREFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[@%](?:::)+").unwrap());

/// Rewrites every relative prefix (`@::`, `%::::`, ...) found anywhere in
/// `value` into its absolute form, relative to `current_id` (spec §4.1).
///
/// One `::` means "sibling of the current node" (n=1); two means "parent's
/// sibling"; an n-`::` prefix is valid whenever `n - 1 <= depth(current_id)`,
/// with equality resolving to the root (spec §3.2 edge case). Longest
/// prefixes are substituted first so that `@::::` isn't partially shadowed
/// by a substring match against `@::`.
pub fn resolve_relative(current_id: &str, value: &str) -> Result<String, String> {
    let current = segments(current_id);
    let depth = current.len();

    let mut prefixes: Vec<String> = RELATIVE_PREFIX_RE
        .find_iter(value)
        .map(|m| m.as_str().to_string())
        .collect();
    prefixes.sort_by_key(|p| std::cmp::Reverse(p.len()));
    prefixes.dedup();

    let mut out = value.to_string();
    for p in prefixes {
        let sym = p.chars().next().unwrap();
        // every char after sym is a colon; n = count of "::" pairs
        let n = (p.len() - 1) / 2;
        // Root alone tolerates a prefix asking for one level more than it
        // has: "@::" at the root addresses "siblings of root", i.e. itself.
        // Anywhere else, asking for more levels than the current id has is
        // out of range.
        let is_root_sibling = depth == 0 && n == 1;
        if n > depth && !is_root_sibling {
            return Err(format!(
                "the relative id in `{value}` is out of the range of config content (depth {depth})"
            ));
        }
        let keep = depth.saturating_sub(n);
        let new_prefix = if keep == 0 {
            String::new()
        } else {
            format!("{}{ID_SEP}", current[..keep].join(ID_SEP))
        };
        out = out.replace(&p, &format!("{sym}{new_prefix}"));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_round_trip() {
        for id in ["", "a", "a::b", "a::0::c"] {
            let segs = segments(id);
            assert_eq!(join(&segs).as_str(), id);
        }
    }

    #[test]
    fn split_file_and_id_with_id() {
        assert_eq!(
            split_file_and_id("a.yaml::x::y"),
            ("a.yaml".to_string(), "x::y".to_string())
        );
    }

    #[test]
    fn split_file_and_id_without_id() {
        assert_eq!(
            split_file_and_id("a.yaml"),
            ("a.yaml".to_string(), "".to_string())
        );
    }

    #[test]
    fn split_file_and_id_pure_id() {
        assert_eq!(
            split_file_and_id("model::lr"),
            ("".to_string(), "model::lr".to_string())
        );
    }

    #[test]
    fn split_file_and_id_case_insensitive_yml() {
        assert_eq!(
            split_file_and_id("A.YML::x"),
            ("A.YML".to_string(), "x".to_string())
        );
    }

    #[test]
    fn resolve_relative_sibling() {
        // at "parent::child", "@::sib" means sibling of "child" -> "parent::sib"
        let out = resolve_relative("parent::child", "@::sib").unwrap();
        assert_eq!(out, "@parent::sib");
    }

    #[test]
    fn resolve_relative_grandparent() {
        // id "B::key", "@::::A" (2 levels) resolves to root-relative "@A"
        let out = resolve_relative("B::key", "@::::A").unwrap();
        assert_eq!(out, "@A");
    }

    #[test]
    fn resolve_relative_macro_prefix() {
        let out = resolve_relative("B::value2", "%::value1").unwrap();
        assert_eq!(out, "%B::value1");
    }

    #[test]
    fn resolve_relative_nested_list_index() {
        let out = resolve_relative("B::value3::2", "@::1").unwrap();
        assert_eq!(out, "@B::value3::1");
    }

    #[test]
    fn resolve_relative_root_single_prefix_is_root() {
        // depth(root) == 0; n=1 prefix satisfies n-1 <= depth, resolves to root
        let out = resolve_relative("", "@::sib").unwrap();
        assert_eq!(out, "@sib");
    }

    #[test]
    fn resolve_relative_out_of_range_errors() {
        assert!(resolve_relative("a", "@::::too_far").is_err());
    }

    #[test]
    fn resolve_relative_longest_prefix_first() {
        // ensure a 4-colon run isn't corrupted by replacing the 2-colon run first
        let out = resolve_relative("a::b::c", "@::::x and @::y").unwrap();
        assert_eq!(out, "@a::x and @a::b::y");
    }
}
