//! Rewrites relative refs to absolute ones and inlines macros (spec §4.4).
//!
//! A single pass over the composed `Tree`, threading the current `Id` the
//! way the teacher's `semantic::resolver` threads a `Context` through its
//! AST walk. Once this pass completes, no macros remain and every `@`/`%`
//! token left in the tree is absolute — the resolver never has to think
//! about either again (spec §9, "macro expansion is a pre-pass").

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::id::{self, Id};
use crate::loader;
use crate::tree::Tree;

/// Preprocesses `root`, resolving `%`-macros found relative to `base_dir`
/// (used to locate `%FILE.yaml::ID` targets; `None` rejects file macros).
pub fn preprocess(root: &Tree, base_dir: Option<&Path>) -> Result<Tree> {
    let mut expanding = Vec::new();
    walk(root, root, &Id::root(), base_dir, &mut expanding)
}

fn walk(
    node: &Tree,
    macro_root: &Tree,
    current_id: &Id,
    base_dir: Option<&Path>,
    expanding: &mut Vec<String>,
) -> Result<Tree> {
    match node {
        Tree::String(s) => process_string(s, macro_root, current_id, base_dir, expanding),
        Tree::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                out.push(walk(item, macro_root, &current_id.child(i), base_dir, expanding)?);
            }
            Ok(Tree::List(out))
        }
        Tree::Map(m) => {
            let mut out = IndexMap::with_capacity(m.len());
            for (k, v) in m {
                out.insert(
                    k.clone(),
                    walk(v, macro_root, &current_id.child(k), base_dir, expanding)?,
                );
            }
            Ok(Tree::Map(out))
        }
        other => Ok(other.clone()),
    }
}

fn process_string(
    s: &str,
    macro_root: &Tree,
    current_id: &Id,
    base_dir: Option<&Path>,
    expanding: &mut Vec<String>,
) -> Result<Tree> {
    let rewritten = id::resolve_relative(current_id.as_str(), s).map_err(Error::load)?;

    let Some(rest) = rewritten.strip_prefix('%') else {
        return Ok(Tree::String(rewritten));
    };

    if let Some(pos) = expanding.iter().position(|t| t == &rewritten) {
        let mut chain: Vec<String> = expanding[pos..].to_vec();
        chain.push(rewritten.clone());
        return Err(Error::circular_macro(chain));
    }

    let (file, target_id) = id::split_file_and_id(rest);
    if file.is_empty() && id::segments(&target_id).first() == Some(&"_meta_") {
        return Err(Error::load(format!(
            "`%{target_id}`: `_meta_` is reserved bundle metadata, not a macro target"
        )));
    }
    let source_tree = if file.is_empty() {
        macro_root.clone()
    } else {
        let path = match base_dir {
            Some(dir) => dir.join(&file),
            None => PathBuf::from(&file),
        };
        loader::load_file(&path)?.0
    };

    let sub = source_tree
        .get_path(&target_id)
        .cloned()
        .ok_or_else(|| Error::key_not_found(target_id.clone(), Vec::new()))?;

    expanding.push(rewritten.clone());
    // The inlined subtree is preprocessed in its own coordinate system: its
    // relative refs resolve against its absolute position in `source_tree`,
    // not against the macro invocation site.
    let expanded = walk(&sub, &source_tree, &Id::from(target_id), base_dir, expanding)?;
    expanding.pop();
    Ok(expanded)
}
