//! Sparkwheel: a structured-configuration engine for declaring composable
//! systems in YAML (spec §1).
//!
//! A config tree may contain cross-references (`@path::to::value`),
//! expressions (`$expr`), macros (`%file.yaml::path`), and component specs
//! that name an external symbol to instantiate (`_target_: "module.Class"`).
//! Multiple files and ad-hoc overrides compose deterministically through
//! explicit merge operators (spec §3.4).
//!
//! This crate implements the *core* pipeline — composition, preprocessing,
//! item classification, and lazy resolution — and defines the expression
//! evaluator and symbol loader as traits (spec §4.7, §4.8) an embedder
//! plugs in. CLI argument parsing, pretty error formatting, schema
//! validation, and the expression language itself are explicitly out of
//! scope (spec §1).
//!
//! ```
//! use sparkwheel::{Config, ResolveOptions};
//! use sparkwheel::Tree;
//! use indexmap::IndexMap;
//!
//! let mut config = Config::load(Tree::Map(IndexMap::from([
//!     ("lr".to_string(), Tree::Float(0.001)),
//! ]))).unwrap();
//! let lr = config.resolve("lr", ResolveOptions::default(), true).unwrap();
//! assert_eq!(lr, Tree::Float(0.001));
//! ```

pub mod composer;
pub mod config;
pub mod error;
pub mod host;
pub mod id;
pub mod item;
pub mod loader;
pub mod metadata;
pub mod preprocessor;
pub mod resolver;
pub mod symbol;
pub mod tree;

pub use config::{Config, Source};
pub use error::{Error, ErrorKind, Result, WithErrorInfo};
pub use host::{ExpressionHost, NullExpressionHost};
pub use id::Id;
pub use item::Item;
pub use metadata::{MetadataRegistry, SourceLocation};
pub use resolver::{ResolveOptions, Resolver};
pub use symbol::{Mode, NoSymbolsLoader, SymbolLoader};
pub use tree::Tree;
