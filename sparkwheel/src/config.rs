//! Public façade gluing Loader, Composer, Preprocessor, Item classifier and
//! Resolver behind one `Config` type (spec §4.9).
//!
//! Grounded in the teacher's top-level `Compiler`/pipeline entry points
//! (`prqlc::compile` and friends): a thin owning struct that sequences the
//! lower-level passes and exposes one surface to callers, here kept as a
//! long-lived value (a `Config` is reused across `get`/`set`/`resolve`
//! calls, unlike a one-shot compile) per spec §3.7's lifecycle.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::composer;
use crate::error::{Error, Result};
use crate::host::{ExpressionHost, NullExpressionHost};
use crate::id::Id;
use crate::loader;
use crate::metadata::MetadataRegistry;
use crate::preprocessor;
use crate::resolver::{ResolveOptions, Resolver};
use crate::symbol::{NoSymbolsLoader, SymbolLoader};
use crate::tree::Tree;

/// The reserved root key for bundle metadata (spec §10.5). Excluded from
/// reference/expression resolution and from bare `%`-macro lookups: it is
/// always `Plain`, tracked the way upstream tracks it, separate from the
/// resolvable tree.
pub const META_KEY: &str = "_meta_";

/// One or more sources accepted by `Config::load`/`Config::merge` (spec
/// §4.9, §6.2).
pub enum Source {
    File(PathBuf),
    Files(Vec<PathBuf>),
    Tree(Tree),
}

impl From<&str> for Source {
    fn from(s: &str) -> Self {
        Source::File(PathBuf::from(s))
    }
}
impl From<PathBuf> for Source {
    fn from(p: PathBuf) -> Self {
        Source::File(p)
    }
}
impl From<Vec<PathBuf>> for Source {
    fn from(v: Vec<PathBuf>) -> Self {
        Source::Files(v)
    }
}
impl From<Tree> for Source {
    fn from(t: Tree) -> Self {
        Source::Tree(t)
    }
}

/// Owns a config tree, its metadata, the expression globals, and a lazily
/// (re)built resolver (spec §3.7, §4.9).
pub struct Config {
    data: Tree,
    metadata: MetadataRegistry,
    globals: IndexMap<String, Tree>,
    base_dir: Option<PathBuf>,
    host: Box<dyn ExpressionHost>,
    symbols: Box<dyn SymbolLoader>,
    preprocessed: Option<Tree>,
    memo: Option<IndexMap<Id, Tree>>,
}

impl Config {
    /// Builds an empty `Config` with no host/symbol loader wired in (spec
    /// §10.6 stand-ins: `NullExpressionHost`, `NoSymbolsLoader`). Use
    /// `with_host`/`with_symbols` to plug in real ones.
    pub fn new() -> Self {
        Config {
            data: Tree::empty_map(),
            metadata: MetadataRegistry::new(),
            globals: IndexMap::new(),
            base_dir: None,
            host: Box::new(NullExpressionHost),
            symbols: Box::new(NoSymbolsLoader),
            preprocessed: None,
            memo: None,
        }
    }

    pub fn with_host(mut self, host: impl ExpressionHost + 'static) -> Self {
        self.host = Box::new(host);
        self
    }

    pub fn with_symbols(mut self, symbols: impl SymbolLoader + 'static) -> Self {
        self.symbols = Box::new(symbols);
        self
    }

    pub fn with_globals(mut self, globals: IndexMap<String, Tree>) -> Self {
        self.globals = globals;
        self
    }

    /// Loads `source` (a file, a list of files merged in order, or a dict
    /// literal) into a fresh `Config` (spec §4.9 `load`). Files are composed
    /// under the default-compose operator as each is read, left to right.
    pub fn load(source: impl Into<Source>) -> Result<Self> {
        Config::new().merged(source)
    }

    fn merged(mut self, source: impl Into<Source>) -> Result<Self> {
        self.merge(source)?;
        Ok(self)
    }

    /// Raw (unresolved) lookup (spec §4.9 `get`).
    pub fn get(&self, id: &str) -> Option<&Tree> {
        self.data.get_path(id)
    }

    pub fn get_or(&self, id: &str, default: Tree) -> Tree {
        self.get(id).cloned().unwrap_or(default)
    }

    /// Writes `value` at `id`, creating missing intermediate mappings, and
    /// invalidates the resolver memo (spec §4.9 `set`, §3.7 invariant 3).
    pub fn set(&mut self, id: &str, value: Tree) -> Result<()> {
        self.data.set_path(id, value)?;
        self.invalidate();
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Returns the `_meta_` section (spec §10.5), or an empty map if none
    /// was set.
    pub fn meta(&self) -> Tree {
        self.get(META_KEY).cloned().unwrap_or_else(Tree::empty_map)
    }

    /// Reads metadata content (a file, files, or dict) into `_meta_` (spec
    /// §10.5 `read_meta`), independent of the resolvable tree.
    pub fn read_meta(&mut self, source: impl Into<Source>) -> Result<()> {
        let source = source.into();
        let (new_meta, _) = load_source(source)?;
        let merged = composer::merge(&self.meta(), &new_meta)?;
        self.set(META_KEY, merged)
    }

    /// Composes `source` into the current tree (spec §4.9 `merge`, §6.3
    /// overrides). A dict literal whose keys contain `::` (optionally
    /// `=`/`~`-prefixed) is applied as per-path updates through `set_path`'s
    /// merge contract; anything else is a structural compose.
    pub fn merge(&mut self, source: impl Into<Source>) -> Result<()> {
        match source.into() {
            Source::Tree(t) if is_path_update_map(&t) => {
                self.merge_path_updates(&t)?;
            }
            other => {
                if let Some(dir) = first_file_dir(&other) {
                    self.base_dir.get_or_insert(dir);
                }
                let (tree, meta) = load_source(other)?;
                self.data = composer::merge(&self.data, &tree)?;
                self.metadata.merge(meta);
            }
        }
        self.invalidate();
        Ok(())
    }

    /// Applies a `{"=model::lr": v, "~old::k": null, "plain::path": v}`-
    /// shaped override map: each key is an id (possibly `=`/`~`-prefixed)
    /// rather than a plain top-level key, so it's applied through a
    /// single-key compose at that path rather than a whole-tree merge
    /// (spec §6.3).
    fn merge_path_updates(&mut self, overrides: &Tree) -> Result<()> {
        let Tree::Map(m) = overrides else {
            return Err(Error::merge("path-update overrides must be a mapping"));
        };
        for (raw_key, value) in m {
            let (op, id) = split_operator(raw_key);
            match op {
                Some('=') => self.set(id, value.clone())?,
                Some('~') => self.remove_path(id, value)?,
                _ => {
                    let base = self.get(id).cloned().unwrap_or(Tree::Null);
                    let single = Tree::Map(IndexMap::from([(
                        last_segment(id).to_string(),
                        value.clone(),
                    )]));
                    let base_wrapped = Tree::Map(IndexMap::from([(
                        last_segment(id).to_string(),
                        base,
                    )]));
                    let merged = composer::merge(&base_wrapped, &single)?;
                    let merged_value = merged.get_path(last_segment(id)).cloned().unwrap_or(Tree::Null);
                    self.set(id, merged_value)?;
                }
            }
        }
        Ok(())
    }

    fn remove_path(&mut self, id: &str, spec: &Tree) -> Result<()> {
        let parent_id = Id::from(id).ancestor(1);
        let key = last_segment(id);
        let base = self
            .get(parent_id.as_str())
            .cloned()
            .unwrap_or_else(Tree::empty_map);
        let override_ = Tree::Map(IndexMap::from([(format!("~{key}"), spec.clone())]));
        let merged = composer::merge(&base, &override_)?;
        self.set(parent_id.as_str(), merged)
    }

    fn invalidate(&mut self) {
        self.memo = None;
    }

    /// Parses (lazily, unless `lazy` is false) and resolves `id` (spec §4.9
    /// `resolve`, §4.6). On first call, or whenever the tree was mutated
    /// since the last call, this re-runs Preprocessor → Item classifier →
    /// Resolver setup before evaluating.
    pub fn resolve(&mut self, id: &str, opts: ResolveOptions, lazy: bool) -> Result<Tree> {
        if self.memo.is_none() || !lazy {
            self.parse()?;
        }
        let pre = self.preprocessed.clone().expect("parse() populates preprocessed");
        let mut resolver = Resolver::new(
            &pre,
            self.globals.clone(),
            &self.metadata,
            self.host.as_mut(),
            self.symbols.as_mut(),
        );
        // Seed with whatever this generation already memoized, so repeat
        // `resolve()` calls on an unmutated tree don't re-invoke the host
        // or symbol loader (spec §3.7 invariant 4, §8.1 property 9).
        if let Some(memo) = &self.memo {
            for (k, v) in memo {
                resolver.seed(k.clone(), v.clone());
            }
        }
        let value = resolver.resolve(&Id::from(id), opts)?;
        self.memo = Some(resolver.into_memo());
        Ok(value)
    }

    fn parse(&mut self) -> Result<()> {
        let pre = preprocessor::preprocess(&self.data, self.base_dir.as_deref())?;
        self.preprocessed = Some(pre);
        self.memo = Some(IndexMap::new());
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new()
    }
}

/// Loads the raw `(Tree, MetadataRegistry)` for one source, performing no
/// preprocessing — macros and relative ids are resolved once, over the
/// whole composed tree, in `Config::parse` (spec §2 data flow: files all
/// the way through Composer *before* Preprocessor runs).
fn load_source(source: Source) -> Result<(Tree, MetadataRegistry)> {
    match source {
        Source::Tree(t) => Ok((t, MetadataRegistry::new())),
        Source::File(path) => loader::load_file(&path),
        Source::Files(paths) => {
            let mut tree = Tree::empty_map();
            let mut meta = MetadataRegistry::new();
            for path in paths {
                let (t, m) = loader::load_file(&path)?;
                tree = composer::merge(&tree, &t)?;
                meta.merge(m);
            }
            Ok((tree, meta))
        }
    }
}

/// The directory of the first concrete file path named by `source`, used to
/// seed `Config::base_dir` for resolving file-qualified `%macro.yaml::id`
/// targets relative to where the config was loaded from (spec §4.4).
fn first_file_dir(source: &Source) -> Option<PathBuf> {
    match source {
        Source::File(p) => p.parent().map(Path::to_path_buf),
        Source::Files(ps) => ps.first().and_then(|p| p.parent()).map(Path::to_path_buf),
        Source::Tree(_) => None,
    }
}

fn is_path_update_map(t: &Tree) -> bool {
    matches!(t, Tree::Map(m) if m.keys().any(|k| {
        let bare = k.trim_start_matches(['=', '~']);
        bare.contains(crate::id::ID_SEP)
    }))
}

fn split_operator(key: &str) -> (Option<char>, &str) {
    if let Some(rest) = key.strip_prefix('=') {
        (Some('='), rest)
    } else if let Some(rest) = key.strip_prefix('~') {
        (Some('~'), rest)
    } else {
        (None, key)
    }
}

fn last_segment(id: &str) -> &str {
    id.rsplit(crate::id::ID_SEP).next().unwrap_or(id)
}
