//! The symbol-loader contract (spec §4.8): resolves a dotted `_target_`
//! name to a callable and invokes it under one of three modes.

use indexmap::IndexMap;

use crate::error::{Error, Result, WithErrorInfo};
use crate::tree::Tree;

/// Instantiation mode, from a component's `_mode_` key (spec §3.6, §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Call the symbol, return the result.
    #[default]
    Default,
    /// Empty kwargs → the raw symbol; non-empty → a bound partial.
    Callable,
    /// Like `Default`, plus an implementation-defined debugging hook.
    Debug,
}

impl Mode {
    pub fn parse(raw: &str) -> Result<Mode> {
        match raw {
            "default" => Ok(Mode::Default),
            "callable" => Ok(Mode::Callable),
            "debug" => Ok(Mode::Debug),
            other => Err(Error::evaluation(format!("unknown `_mode_`: `{other}`"))
                .push_hint("expected one of: default, callable, debug")),
        }
    }
}

/// Resolves a dotted symbol name (or accepts an already-resolved callable)
/// and invokes it with keyword arguments (spec §4.8).
pub trait SymbolLoader {
    /// `target` is the `_target_` value as written. `kwargs` excludes the
    /// reserved `_target_`/`_mode_`/`_disabled_`/`_requires_` keys.
    fn invoke(&mut self, target: &Tree, mode: Mode, kwargs: IndexMap<String, Tree>) -> Result<Tree>;
}

/// The trivial stand-in shipped so `Component` resolution has deterministic
/// behavior without a real host runtime (spec §10.6): always fails with
/// `ModuleNotFoundError`, listing the dotted prefixes of the requested
/// target as a hint (there being no real namespace to search for a closer
/// match). Disabled components and `instantiate: false` requests never
/// reach this loader and work fully without one.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSymbolsLoader;

impl SymbolLoader for NoSymbolsLoader {
    fn invoke(&mut self, target: &Tree, _mode: Mode, _kwargs: IndexMap<String, Tree>) -> Result<Tree> {
        let name = match target {
            Tree::String(s) => s.clone(),
            other => format!("{other:?}"),
        };
        let prefixes = dotted_prefixes(&name);
        Err(Error::module_not_found(name).push_hint(format!(
            "no symbol loader is configured; attempted prefixes: {}",
            prefixes.join(", ")
        )))
    }
}

fn dotted_prefixes(target: &str) -> Vec<String> {
    let mut acc = String::new();
    let mut prefixes = Vec::new();
    for (i, seg) in target.split('.').enumerate() {
        if i > 0 {
            acc.push('.');
        }
        acc.push_str(seg);
        prefixes.push(acc.clone());
    }
    prefixes
}
