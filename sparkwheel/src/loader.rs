//! Loads a YAML document into a `(Tree, MetadataRegistry)` pair (spec §4.2).
//!
//! `serde_yaml` (used everywhere else in this crate for its `Value`
//! conversions) does not retain per-node source positions. To populate the
//! `MetadataRegistry` we instead drive `yaml_rust2`'s low-level event parser
//! directly and build the `Tree` ourselves off its `Marker`-tagged
//! container-start events — the same event-driven construction its own
//! `YamlLoader` uses internally, just keyed by our `Id` instead of a node
//! index.

use std::collections::HashSet;
use std::path::Path;

use indexmap::IndexMap;
use yaml_rust2::parser::{Event, MarkedEventReceiver, Parser};
use yaml_rust2::scanner::{Marker, TScalarStyle};

use crate::error::{Error, Result, WithErrorInfo};
use crate::id::Id;
use crate::metadata::{MetadataRegistry, SourceLocation};
use crate::tree::Tree;

/// Reads the `SPARKWHEEL_STRICT_KEYS` toggle (spec §4.2, §10.3): when set to
/// a truthy value, duplicate mapping keys are fatal instead of a warning.
pub fn strict_keys_enabled() -> bool {
    std::env::var("SPARKWHEEL_STRICT_KEYS")
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

/// Loads `path`, rejecting anything that isn't `.yaml`/`.yml` (case
/// insensitive). Path traversal (`..`) is permitted but logged.
pub fn load_file(path: &Path) -> Result<(Tree, MetadataRegistry)> {
    let ext_ok = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"))
        .unwrap_or(false);
    if !ext_ok {
        return Err(Error::load(format!(
            "`{}` does not have a .yaml/.yml extension",
            path.display()
        )));
    }
    if path.components().any(|c| c.as_os_str() == "..") {
        log::warn!("loading `{}`: path contains `..` traversal", path.display());
    }

    let source = std::fs::read_to_string(path)
        .map_err(|e| Error::load(format!("failed to read `{}`: {e}", path.display())))?;
    let file_label = path.to_string_lossy().to_string();
    parse_str(&source, &file_label)
}

/// Parses raw YAML text, labeling every `MetadataRegistry` entry with
/// `file_label` (a path, or a synthetic label for an in-memory literal).
pub fn parse_str(source: &str, file_label: &str) -> Result<(Tree, MetadataRegistry)> {
    let mut builder = Builder::new(file_label, strict_keys_enabled());
    let mut parser = Parser::new(source.chars());
    parser
        .load(&mut builder, false)
        .map_err(|e| Error::load(format!("{file_label}: {e}")))?;
    builder.finish()
}

enum Frame {
    Map {
        id: Id,
        entries: Vec<(String, Tree)>,
        seen_keys: HashSet<String>,
        pending_key: Option<String>,
        awaiting_key: bool,
    },
    List {
        id: Id,
        items: Vec<Tree>,
    },
}

impl Frame {
    fn id(&self) -> &Id {
        match self {
            Frame::Map { id, .. } => id,
            Frame::List { id, .. } => id,
        }
    }

    /// The id the *next* child placed into this frame will receive.
    fn next_child_id(&self) -> Id {
        match self {
            Frame::Map { id, pending_key, .. } => {
                id.child(pending_key.as_deref().unwrap_or_default())
            }
            Frame::List { id, items, .. } => id.child(items.len()),
        }
    }
}

struct Builder {
    file: String,
    strict_keys: bool,
    stack: Vec<Frame>,
    registry: MetadataRegistry,
    root: Option<Tree>,
    error: Option<Error>,
}

impl Builder {
    fn new(file: &str, strict_keys: bool) -> Self {
        Builder {
            file: file.to_string(),
            strict_keys,
            stack: Vec::new(),
            registry: MetadataRegistry::new(),
            root: None,
            error: None,
        }
    }

    fn finish(self) -> Result<(Tree, MetadataRegistry)> {
        if let Some(e) = self.error {
            return Err(e);
        }
        let root = self.root.unwrap_or(Tree::Null);
        Ok((root, self.registry))
    }

    fn location(&self, id: Id, mark: &Marker) -> SourceLocation {
        SourceLocation::new(self.file.clone(), mark.line(), mark.col() + 1, id)
    }

    fn record_failure(&mut self, e: Error) {
        if self.error.is_none() {
            self.error = Some(e);
        }
    }

    /// Places a completed value (scalar or just-popped container) into
    /// whatever the current context expects: a pending map value, the next
    /// list slot, or the document root.
    fn place_value(&mut self, value: Tree) {
        match self.stack.last_mut() {
            None => self.root = Some(value),
            Some(Frame::List { items, .. }) => items.push(value),
            Some(Frame::Map {
                entries,
                seen_keys,
                pending_key,
                awaiting_key,
                ..
            }) => {
                let key = pending_key.take().unwrap_or_default();
                if !seen_keys.insert(key.clone()) {
                    if self.strict_keys {
                        self.error = self.error.clone().or(Some(
                            Error::load(format!("duplicate key `{key}`")).push_hint(
                                "set SPARKWHEEL_STRICT_KEYS=0 to downgrade this to a warning",
                            ),
                        ));
                    } else {
                        log::warn!("duplicate key `{key}` in mapping, last value wins");
                    }
                    entries.retain(|(k, _)| k != &key);
                }
                entries.push((key, value));
                *awaiting_key = true;
            }
        }
    }

    fn start_container(&mut self, frame: Frame, mark: &Marker) {
        let id = frame.id().clone();
        let loc = self.location(id, mark);
        self.registry.register(loc.id.clone(), loc);
        self.stack.push(frame);
    }

    fn end_container(&mut self) {
        let Some(frame) = self.stack.pop() else {
            return;
        };
        let value = match frame {
            Frame::Map { entries, .. } => Tree::Map(IndexMap::from_iter(entries)),
            Frame::List { items, .. } => Tree::List(items),
        };
        self.place_value(value);
    }

    fn scalar_to_tree(value: String, style: TScalarStyle) -> Tree {
        if style != TScalarStyle::Plain {
            return Tree::String(value);
        }
        match value.as_str() {
            "~" | "null" | "Null" | "NULL" | "" => Tree::Null,
            "true" | "True" | "TRUE" => Tree::Bool(true),
            "false" | "False" | "FALSE" => Tree::Bool(false),
            _ => {
                if let Ok(i) = value.parse::<i64>() {
                    Tree::Int(i)
                } else if let Ok(f) = value.parse::<f64>() {
                    if value.chars().any(|c| c.is_ascii_digit()) {
                        Tree::Float(f)
                    } else {
                        Tree::String(value)
                    }
                } else {
                    Tree::String(value)
                }
            }
        }
    }
}

impl MarkedEventReceiver for Builder {
    fn on_event(&mut self, ev: Event, mark: Marker) {
        if self.error.is_some() {
            return;
        }
        match ev {
            Event::StreamStart
            | Event::StreamEnd
            | Event::DocumentStart
            | Event::DocumentEnd
            | Event::Nothing => {}
            Event::Alias(_) => {
                let id = self
                    .stack
                    .last()
                    .map(Frame::next_child_id)
                    .unwrap_or_else(Id::root);
                let loc = self.location(id, &mark);
                self.record_failure(
                    Error::load("YAML anchors/aliases are not supported").with_location(Some(loc)),
                );
            }
            Event::Scalar(value, style, ..) => {
                let is_key = matches!(
                    self.stack.last(),
                    Some(Frame::Map { awaiting_key: true, .. })
                );
                if is_key {
                    if let Some(Frame::Map {
                        pending_key,
                        awaiting_key,
                        ..
                    }) = self.stack.last_mut()
                    {
                        *pending_key = Some(value);
                        *awaiting_key = false;
                    }
                } else {
                    let tree = Builder::scalar_to_tree(value, style);
                    self.place_value(tree);
                }
            }
            Event::SequenceStart(..) => {
                let id = self
                    .stack
                    .last()
                    .map(Frame::next_child_id)
                    .unwrap_or_else(Id::root);
                self.start_container(Frame::List { id, items: Vec::new() }, &mark);
            }
            Event::SequenceEnd => self.end_container(),
            Event::MappingStart(..) => {
                let id = self
                    .stack
                    .last()
                    .map(Frame::next_child_id)
                    .unwrap_or_else(Id::root);
                self.start_container(
                    Frame::Map {
                        id,
                        entries: Vec::new(),
                        seen_keys: HashSet::new(),
                        pending_key: None,
                        awaiting_key: true,
                    },
                    &mark,
                );
            }
            Event::MappingEnd => self.end_container(),
        }
    }
}
