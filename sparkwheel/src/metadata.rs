//! Source-location tracking, kept out of the `Tree` itself (spec §3.3).
//!
//! Grounded in the teacher's `prqlc-parser::span::Span`, adapted from a
//! byte-offset span (meaningful for a single parsed token stream) to a
//! file/line/column triple keyed by `Id` (meaningful across many files
//! composed together, which is this crate's situation).

use std::collections::HashMap;
use std::fmt;

use crate::id::Id;

/// Where a config node came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub id: Id,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: usize, column: usize, id: impl Into<Id>) -> Self {
        SourceLocation {
            file: file.into(),
            line,
            column,
            id: id.into(),
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// `Id -> SourceLocation` side table populated during YAML load.
///
/// Kept separate from the `Tree` so the tree itself never carries synthetic
/// keys (spec §3.3 invariant).
#[derive(Debug, Clone, Default)]
pub struct MetadataRegistry {
    entries: HashMap<Id, SourceLocation>,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: Id, location: SourceLocation) {
        self.entries.insert(id, location);
    }

    pub fn get(&self, id: &Id) -> Option<&SourceLocation> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merges `other` into `self`. On key collision `other` wins, matching
    /// how a later-loaded file's locations take precedence after a
    /// structural merge (`Config::merge`/`Config::load` chain).
    pub fn merge(&mut self, other: MetadataRegistry) {
        self.entries.extend(other.entries);
    }
}
