//! The expression-host contract (spec §4.7): a pluggable evaluator for
//! `$`-expressions. This crate does not fix the expression language — it
//! only specifies the scope an implementation receives and the error it
//! must surface on failure.

use indexmap::IndexMap;

use crate::error::Result;
use crate::tree::Tree;

/// Evaluates `$`-expression sources in a two-part scope, mirroring the
/// resolver's own split between long-lived `globals` and the per-call
/// `local_refs` dictionary of already-substituted `@id` lookups (spec §4.6
/// "reference substitution", §4.7). This crate passes the two maps
/// separately rather than the single merged Python-style namespace the
/// original nests them into, matching the "globals are a value, not a
/// module" design note (spec §9).
pub trait ExpressionHost {
    /// `source` is the text *after* the leading `$`. `globals` is bound
    /// once per `Config` (spec §3.7) and passed mutably: an `$import X` /
    /// `$from X import Y [as Z]` source performs a module import by
    /// inserting the imported module/symbol into `globals` under its bound
    /// name, in addition to returning it as the expression's own value
    /// (spec §4.7, spec.md:361 "Imports executed via `_requires_` return a
    /// Value ... that is inserted into that map"). `local_refs` holds one
    /// entry per `@id` token found in `source`, keyed by that exact token
    /// text (e.g. `"@a::b"`), value already resolved (spec §4.6).
    fn evaluate(
        &mut self,
        source: &str,
        globals: &mut IndexMap<String, Tree>,
        local_refs: &IndexMap<String, Tree>,
    ) -> Result<Tree>;
}

/// The trivial stand-in shipped so this crate is usable without a real host
/// (spec §10.6). Handles only the single-bare-reference shape `$@x`
/// (becomes `local_refs["@x"]` verbatim); `$import`/`$from` sources bind a
/// placeholder module/symbol handle into `globals` under the imported name
/// (spec §4.7, spec.md:361) and return that same handle; anything else is
/// returned as the literal `$`-prefixed source, unresolved but clearly
/// marked as such.
///
/// This is not a reference implementation of "the" expression language —
/// see the trait doc and spec §1/§4.7.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullExpressionHost;

impl ExpressionHost for NullExpressionHost {
    fn evaluate(
        &mut self,
        source: &str,
        globals: &mut IndexMap<String, Tree>,
        local_refs: &IndexMap<String, Tree>,
    ) -> Result<Tree> {
        let trimmed = source.trim();
        if let Some(rest) = trimmed.strip_prefix("import ") {
            // "import a.b.c" binds the first dotted segment's name to a
            // placeholder module handle (no real module system backs this
            // stand-in). The first of several comma-separated imports wins
            // (spec §4.7: "discouraged ... the first symbol is taken").
            let module = rest.split(',').next().unwrap_or(rest).trim();
            let name = module.split('.').next().unwrap_or(module).to_string();
            let handle = Tree::String(format!("<module {module}>"));
            globals.insert(name, handle.clone());
            return Ok(handle);
        }
        if let Some(rest) = trimmed.strip_prefix("from ") {
            // "from pkg.mod import Sym [as alias]"
            let (module, imports) = rest
                .split_once(" import ")
                .ok_or_else(|| crate::error::Error::evaluation(format!("malformed `from` import: `{trimmed}`")))?;
            let first = imports.split(',').next().unwrap_or(imports).trim();
            let (sym, alias) = match first.split_once(" as ") {
                Some((sym, alias)) => (sym.trim(), alias.trim()),
                None => (first, first),
            };
            let handle = Tree::String(format!("<symbol {}.{sym}>", module.trim()));
            globals.insert(alias.to_string(), handle.clone());
            return Ok(handle);
        }
        if trimmed.starts_with('@') && !trimmed[1..].contains(|c: char| c.is_whitespace()) {
            if let Some(v) = local_refs.get(trimmed) {
                return Ok(v.clone());
            }
        }
        Ok(Tree::String(format!("${source}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_ref_expression_returns_the_referenced_value() {
        let mut host = NullExpressionHost;
        let locals = IndexMap::from([("@a".to_string(), Tree::Int(10))]);
        let got = host.evaluate("@a", &mut IndexMap::new(), &locals).unwrap();
        assert_eq!(got, Tree::Int(10));
    }

    #[test]
    fn import_statement_binds_the_module_name_into_globals() {
        let mut host = NullExpressionHost;
        let mut globals = IndexMap::new();
        let got = host.evaluate("import os", &mut globals, &IndexMap::new()).unwrap();
        assert_eq!(got, Tree::String("<module os>".to_string()));
        assert_eq!(globals.get("os"), Some(&Tree::String("<module os>".to_string())));
    }

    #[test]
    fn from_import_binds_the_alias_when_present() {
        let mut host = NullExpressionHost;
        let mut globals = IndexMap::new();
        let got = host
            .evaluate("from pkg.mod import Sym as S", &mut globals, &IndexMap::new())
            .unwrap();
        assert_eq!(got, Tree::String("<symbol pkg.mod.Sym>".to_string()));
        assert_eq!(globals.get("S"), Some(&Tree::String("<symbol pkg.mod.Sym>".to_string())));
        assert!(!globals.contains_key("Sym"));
    }

    #[test]
    fn from_import_binds_the_plain_name_without_an_alias() {
        let mut host = NullExpressionHost;
        let mut globals = IndexMap::new();
        host.evaluate("from pkg import Sym", &mut globals, &IndexMap::new()).unwrap();
        assert_eq!(globals.get("Sym"), Some(&Tree::String("<symbol pkg.Sym>".to_string())));
    }

    #[test]
    fn anything_else_passes_through_marked() {
        let mut host = NullExpressionHost;
        let got = host
            .evaluate("@a * 2", &mut IndexMap::new(), &IndexMap::new())
            .unwrap();
        assert_eq!(got, Tree::String("$@a * 2".to_string()));
    }
}
