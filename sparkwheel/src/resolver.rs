//! Lazy, memoizing, cycle-detecting dependency evaluator (spec §4.6).
//!
//! Grounded in the teacher's `utils::toposort::Toposort` (`visiting`/`done`
//! node states driving a depth-first visit that raises on re-entering a
//! `visiting` node) — here the "nodes" are `Id`s in the item table and the
//! "visit" is full value resolution rather than a declaration-order sort,
//! so the state lives in two maps (`in_progress`, `resolved`) instead of a
//! dense `Vec<Node>`, keyed by `Id` rather than a compacted `usize` index.

use indexmap::IndexMap;
use itertools::Itertools;

use crate::error::{Error, Result, WithErrorInfo};
use crate::host::ExpressionHost;
use crate::id::Id;
use crate::item::{self, Item};
use crate::metadata::MetadataRegistry;
use crate::symbol::{Mode, SymbolLoader};
use crate::tree::Tree;

/// Resolution options (spec §4.6, §4.9 `Config.resolve`).
#[derive(Debug, Clone, Copy)]
pub struct ResolveOptions {
    pub instantiate: bool,
    pub eval_expr: bool,
    /// When true, a missing `@id` reference is logged and left as the
    /// literal token instead of raising `KeyNotFound` (spec §4.6, §10.3).
    pub allow_missing_reference: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        ResolveOptions {
            instantiate: true,
            eval_expr: true,
            allow_missing_reference: false,
        }
    }
}

const DISABLED_KEYS: [&str; 4] = ["_target_", "_mode_", "_disabled_", "_requires_"];

/// Owns the flat item table and the resolution memo for one parsed `Config`
/// generation; rebuilt whenever the underlying tree mutates (spec §3.7).
pub struct Resolver<'a> {
    items: IndexMap<Id, Item>,
    resolved: IndexMap<Id, Tree>,
    in_progress: Vec<Id>,
    globals: IndexMap<String, Tree>,
    metadata: &'a MetadataRegistry,
    host: &'a mut dyn ExpressionHost,
    symbols: &'a mut dyn SymbolLoader,
}

impl<'a> Resolver<'a> {
    pub fn new(
        root: &Tree,
        globals: IndexMap<String, Tree>,
        metadata: &'a MetadataRegistry,
        host: &'a mut dyn ExpressionHost,
        symbols: &'a mut dyn SymbolLoader,
    ) -> Self {
        Resolver {
            items: item::build_table(root).into_iter().collect(),
            resolved: IndexMap::new(),
            in_progress: Vec::new(),
            globals,
            metadata,
            host,
            symbols,
        }
    }

    /// Resolves `id`, returning its fully-evaluated value (spec §4.6).
    pub fn resolve(&mut self, id: &Id, opts: ResolveOptions) -> Result<Tree> {
        self.resolve_one(id, opts)
    }

    /// Pre-populates the memo, letting a caller that rebuilds a `Resolver`
    /// per call (the façade does, since it owns no long-lived resolver
    /// state of its own) still honor "resolve twice, evaluate once" across
    /// calls (spec §3.7 invariant 4, §8.1 property 9).
    pub fn seed(&mut self, id: Id, value: Tree) {
        self.resolved.insert(id, value);
    }

    /// Hands back the memo accumulated by this resolution pass, for the
    /// caller to `seed` into the next one.
    pub fn into_memo(self) -> IndexMap<Id, Tree> {
        self.resolved
    }

    /// The live globals map, including any bindings a `$import`/`_requires_`
    /// expression inserted into it during this resolution pass (spec §4.7,
    /// spec.md:361).
    pub fn globals(&self) -> &IndexMap<String, Tree> {
        &self.globals
    }

    fn resolve_one(&mut self, id: &Id, opts: ResolveOptions) -> Result<Tree> {
        if let Some(v) = self.resolved.get(id) {
            return Ok(v.clone());
        }
        if self.in_progress.contains(id) {
            let start = self.in_progress.iter().position(|x| x == id).unwrap();
            let mut chain: Vec<String> = self.in_progress[start..]
                .iter()
                .map(|i| i.as_str().to_string())
                .collect();
            chain.push(id.as_str().to_string());
            return Err(Error::circular_reference(chain));
        }
        let Some(item) = self.items.get(id).cloned() else {
            return Err(self.key_not_found(id));
        };
        self.in_progress.push(id.clone());

        let value = self.resolve_item(id, &item, opts);

        self.in_progress.pop();
        let value = value.with_location_fallback(self.metadata.get(id).cloned())?;
        self.resolved.insert(id.clone(), value.clone());
        Ok(value)
    }

    fn resolve_item(&mut self, id: &Id, item: &Item, opts: ResolveOptions) -> Result<Tree> {
        match item {
            Item::Plain(tree) => self.resolve_plain(id, tree, opts),
            Item::Expression(src) => self.resolve_expression(id, src, opts),
            Item::Component(spec) => self.resolve_component(id, spec, opts),
        }
    }

    /// A plain scalar/container. A bare `@X` scalar becomes the referenced
    /// value verbatim (any type); a container is rebuilt from its already-
    /// resolved children, dropping any child that resolved to a
    /// `_disabled_`-null component (spec §4.6).
    fn resolve_plain(&mut self, id: &Id, tree: &Tree, opts: ResolveOptions) -> Result<Tree> {
        match tree {
            Tree::String(s) => {
                if let Some(rest) = s.strip_prefix('@') {
                    let target = Id::from(rest);
                    return match self.resolve_one(&target, opts) {
                        Ok(v) => Ok(v),
                        Err(e) if opts.allow_missing_reference && is_key_not_found(&e) => {
                            log::warn!("missing reference `@{rest}`, leaving token textual");
                            Ok(Tree::String(s.clone()))
                        }
                        Err(e) => Err(e),
                    };
                }
                Ok(tree.clone())
            }
            Tree::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, child) in items.iter().enumerate() {
                    let child_id = id.child(i);
                    let resolved = self.resolve_one(&child_id, opts)?;
                    if resolved != Tree::Null || !self.drops_to_null(&child_id) {
                        out.push(resolved);
                    }
                }
                Ok(Tree::List(out))
            }
            Tree::Map(m) => {
                let mut out = IndexMap::with_capacity(m.len());
                for k in m.keys() {
                    let child_id = id.child(k);
                    let resolved = self.resolve_one(&child_id, opts)?;
                    if resolved != Tree::Null || !self.drops_to_null(&child_id) {
                        out.insert(k.clone(), resolved);
                    }
                }
                Ok(Tree::Map(out))
            }
            other => Ok(other.clone()),
        }
    }

    /// True when `child_id` is a disabled `Component` (and so should vanish
    /// from its parent's resolved container rather than appear as `null`,
    /// spec §4.6 "disabled drop"). A plain value that happens to resolve to
    /// `null` is kept.
    fn drops_to_null(&self, child_id: &Id) -> bool {
        matches!(self.items.get(child_id), Some(Item::Component(spec)) if is_disabled(spec))
    }

    fn resolve_expression(&mut self, id: &Id, src: &str, opts: ResolveOptions) -> Result<Tree> {
        if !opts.eval_expr {
            return Ok(Tree::String(format!("${src}")));
        }
        let refs = item::scan_embedded_refs(src);
        let mut local_refs = IndexMap::new();
        for r in longest_first(refs) {
            let v = self.resolve_one(&r, opts)?;
            local_refs.insert(format!("@{r}"), v);
        }
        self.host
            .evaluate(src, &mut self.globals, &local_refs)
            .with_location_fallback(self.metadata.get(id).cloned())
    }

    fn resolve_component(&mut self, id: &Id, spec: &Tree, opts: ResolveOptions) -> Result<Tree> {
        let Tree::Map(spec_map) = spec else {
            unreachable!("Component items are always Tree::Map");
        };

        // `_requires_` (typically imports) resolves before anything else
        // the component depends on, and unconditionally — even for a
        // disabled component, since its imports may populate globals other
        // components depend on (spec §4.6 step 2, step 4's disabled check
        // only gates instantiation itself).
        if let Some(Tree::List(reqs)) = spec_map.get("_requires_") {
            for i in 0..reqs.len() {
                self.resolve_one(&id.child("_requires_").child(i), opts)?;
            }
        }

        if is_disabled(spec) {
            return Ok(Tree::Null);
        }
        if !opts.instantiate {
            return Ok(spec.clone());
        }

        let target = spec_map
            .get("_target_")
            .cloned()
            .ok_or_else(|| Error::evaluation("component is missing required `_target_`"))?;
        let mode = match spec_map.get("_mode_") {
            Some(Tree::String(s)) => Mode::parse(s)?,
            Some(_) => {
                return Err(Error::evaluation("`_mode_` must be a string"));
            }
            None => Mode::default(),
        };

        let mut kwargs = IndexMap::new();
        for (k, _) in spec_map {
            if DISABLED_KEYS.contains(&k.as_str()) {
                continue;
            }
            let resolved = self.resolve_one(&id.child(k), opts)?;
            kwargs.insert(k.clone(), resolved);
        }

        self.symbols
            .invoke(&target, mode, kwargs)
            .with_location_fallback(self.metadata.get(id).cloned())
    }

    fn key_not_found(&self, id: &Id) -> Error {
        let parent = id.ancestor(1);
        let available: Vec<String> = self
            .items
            .keys()
            .filter(|k| k.ancestor(1) == parent && k.depth() == id.depth())
            .map(|k| k.as_str().to_string())
            .sorted()
            .collect();
        let last_segment = id.segments().last().copied().unwrap_or("");
        let mut err = Error::key_not_found(id.as_str(), available.clone());
        if let Some(suggestion) = crate::error::suggest(last_segment, &available) {
            err = err.push_hint(format!("did you mean `{suggestion}`?"));
        }
        err
    }
}

fn is_disabled(spec: &Tree) -> bool {
    match spec.get_path("_disabled_") {
        Some(Tree::Bool(b)) => *b,
        Some(Tree::String(s)) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn is_key_not_found(e: &Error) -> bool {
    matches!(e.kind, crate::error::ErrorKind::KeyNotFound { .. })
}

/// Sorts embedded-ref ids longest-string-first, matching §4.6's reference
/// substitution rule ("applied longest-id-first to avoid prefix
/// collisions") — here applied to resolution order rather than textual
/// substitution, since each ref is resolved independently into the
/// `local_refs` map the host receives.
fn longest_first(mut ids: Vec<Id>) -> Vec<Id> {
    ids.sort_by_key(|id| std::cmp::Reverse(id.as_str().len()));
    ids.dedup_by(|a, b| a == b);
    ids
}
