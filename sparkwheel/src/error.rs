//! Typed errors with source-location attachment (spec §7).
//!
//! Mirrors the teacher's `prqlc-parser::error` module: one `Error` struct
//! carrying a `kind` discriminant plus optional location and hints, rather
//! than a family of `thiserror`-derived types. Pretty-printing (color,
//! source snippets, terminal diffing) is explicitly out of scope (spec §1)
//! and left to the caller.

use std::fmt;

use crate::metadata::SourceLocation;

/// A sparkwheel error: a taxonomy discriminant plus optional provenance.
#[derive(Debug, Clone)]
pub struct Error {
    pub kind: ErrorKind,
    pub location: Option<SourceLocation>,
    pub hints: Vec<String>,
}

/// The error taxonomy of spec §7.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    /// YAML syntax, unreadable file, wrong extension.
    Load(String),
    /// Operator misuse during composition: type mismatch on `~`, invalid
    /// index, missing dict sub-key.
    Merge(String),
    /// Lookup or reference resolution failed.
    KeyNotFound { id: String, available: Vec<String> },
    /// A cycle was detected in the `@` reference graph.
    CircularReference { chain: Vec<String> },
    /// A cycle was detected while expanding `%` macros.
    CircularMacro { chain: Vec<String> },
    /// The expression host rejected or failed a `$` source.
    Evaluation(String),
    /// A component's target could not be instantiated.
    Instantiation { target: String, cause: String },
    /// A dotted `_target_` symbol could not be located.
    ModuleNotFound { target: String },
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Error {
            kind,
            location: None,
            hints: Vec::new(),
        }
    }

    pub fn load<S: Into<String>>(msg: S) -> Self {
        Error::new(ErrorKind::Load(msg.into()))
    }

    pub fn merge<S: Into<String>>(msg: S) -> Self {
        Error::new(ErrorKind::Merge(msg.into()))
    }

    pub fn key_not_found<S: Into<String>>(id: S, available: Vec<String>) -> Self {
        Error::new(ErrorKind::KeyNotFound {
            id: id.into(),
            available,
        })
    }

    pub fn circular_reference(chain: Vec<String>) -> Self {
        Error::new(ErrorKind::CircularReference { chain })
    }

    pub fn circular_macro(chain: Vec<String>) -> Self {
        Error::new(ErrorKind::CircularMacro { chain })
    }

    pub fn evaluation<S: Into<String>>(msg: S) -> Self {
        Error::new(ErrorKind::Evaluation(msg.into()))
    }

    pub fn instantiation<S: Into<String>, C: Into<String>>(target: S, cause: C) -> Self {
        Error::new(ErrorKind::Instantiation {
            target: target.into(),
            cause: cause.into(),
        })
    }

    pub fn module_not_found<S: Into<String>>(target: S) -> Self {
        Error::new(ErrorKind::ModuleNotFound {
            target: target.into(),
        })
    }

    fn reason(&self) -> String {
        match &self.kind {
            ErrorKind::Load(msg) => msg.clone(),
            ErrorKind::Merge(msg) => msg.clone(),
            ErrorKind::KeyNotFound { id, .. } => format!("key not found: `{id}`"),
            ErrorKind::CircularReference { chain } => {
                format!("circular reference: {}", chain.join(" -> "))
            }
            ErrorKind::CircularMacro { chain } => {
                format!("circular macro reference: {}", chain.join(" -> "))
            }
            ErrorKind::Evaluation(msg) => msg.clone(),
            ErrorKind::Instantiation { target, cause } => {
                format!("failed to instantiate `{target}`: {cause}")
            }
            ErrorKind::ModuleNotFound { target } => format!("symbol `{target}` not found"),
        }
    }
}

/// Builder-style trait for attaching provenance to an `Error`, usable both
/// on `Error` directly and on `Result<T, Error>` (so call sites can chain
/// `foo().push_hint("...")?` without an intermediate `match`).
pub trait WithErrorInfo: Sized {
    fn with_location(self, location: Option<SourceLocation>) -> Self;
    fn with_location_fallback(self, location: Option<SourceLocation>) -> Self;
    fn push_hint<S: Into<String>>(self, hint: S) -> Self;
}

impl WithErrorInfo for Error {
    fn with_location(mut self, location: Option<SourceLocation>) -> Self {
        self.location = location;
        self
    }

    fn with_location_fallback(mut self, location: Option<SourceLocation>) -> Self {
        self.location = self.location.or(location);
        self
    }

    fn push_hint<S: Into<String>>(mut self, hint: S) -> Self {
        self.hints.push(hint.into());
        self
    }
}

impl<T> WithErrorInfo for Result<T, Error> {
    fn with_location(self, location: Option<SourceLocation>) -> Self {
        self.map_err(|e| e.with_location(location))
    }

    fn with_location_fallback(self, location: Option<SourceLocation>) -> Self {
        self.map_err(|e| e.with_location_fallback(location))
    }

    fn push_hint<S: Into<String>>(self, hint: S) -> Self {
        self.map_err(|e| e.push_hint(hint))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Location goes on the first line so a caller only showing the
        // first line of the message (e.g. a truncated log) still sees it.
        if let Some(loc) = &self.location {
            write!(f, "{loc}: {}", self.reason())?;
        } else {
            write!(f, "{}", self.reason())?;
        }
        for hint in &self.hints {
            write!(f, "\n  hint: {hint}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Suggests the closest of `candidates` to `query` via Damerau-Levenshtein
/// distance, if any candidate is close enough (spec §4.8, §7).
pub fn suggest<'a>(query: &str, candidates: impl IntoIterator<Item = &'a String>) -> Option<&'a str> {
    let threshold = std::cmp::max(1, query.len() / 4);
    candidates
        .into_iter()
        .map(|c| (c, strsim::damerau_levenshtein(query, c)))
        .filter(|(_, dist)| *dist <= threshold)
        .min_by_key(|(_, dist)| *dist)
        .map(|(c, _)| c.as_str())
}
