//! In-memory locale trees with per-leaf provenance.
//!
//! On disk a generated leaf is a string ending in [`SENTINEL`]; a leaf
//! without it was edited by hand. In memory the marker is stripped and the
//! provenance is kept alongside the text instead.

use std::collections::BTreeMap;

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

/// Trailing marker carried by generated strings in persisted locale files.
pub const SENTINEL: char = '\u{0}';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Generated,
    HandEdited,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LocaleNode {
    Text { text: String, provenance: Provenance },
    Branch(LocaleTree),
    /// A non-string leaf found in a persisted file; never touched.
    Opaque(Value),
}

impl LocaleNode {
    pub fn generated(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            provenance: Provenance::Generated,
        }
    }

    pub fn hand_edited(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            provenance: Provenance::HandEdited,
        }
    }

    /// Decodes a persisted value, reading provenance from the sentinel.
    pub fn from_persisted(value: Value) -> Self {
        match value {
            Value::String(mut text) => {
                if text.ends_with(SENTINEL) {
                    text.pop();
                    Self::generated(text)
                } else {
                    Self::hand_edited(text)
                }
            }
            Value::Object(map) => Self::Branch(LocaleTree::from_persisted(map)),
            other => Self::Opaque(other),
        }
    }

    /// True if this node is, or contains, anything a human wrote.
    pub fn has_hand_edits(&self) -> bool {
        match self {
            Self::Text { provenance, .. } => *provenance == Provenance::HandEdited,
            Self::Branch(tree) => tree.values().any(LocaleNode::has_hand_edits),
            Self::Opaque(_) => true,
        }
    }

    pub fn to_plain_value(&self) -> Value {
        match self {
            Self::Text { text, .. } => Value::String(text.clone()),
            Self::Branch(tree) => tree.to_plain_value(),
            Self::Opaque(value) => value.clone(),
        }
    }

    pub fn to_persisted_value(&self) -> Value {
        match self {
            Self::Text {
                text,
                provenance: Provenance::Generated,
            } => Value::String(format!("{text}{SENTINEL}")),
            Self::Text { text, .. } => Value::String(text.clone()),
            Self::Branch(tree) => tree.to_persisted_value(),
            Self::Opaque(value) => value.clone(),
        }
    }
}

/// A nested mapping of locale keys, ordered by key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocaleTree {
    entries: BTreeMap<String, LocaleNode>,
}

impl LocaleTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_persisted(map: serde_json::Map<String, Value>) -> Self {
        Self {
            entries: map
                .into_iter()
                .map(|(key, value)| (key, LocaleNode::from_persisted(value)))
                .collect(),
        }
    }

    /// Rebuilds a tree from plain strings (as seen by post-process hooks),
    /// re-attaching provenance from `known`.
    ///
    /// A string leaf is hand-edited only when `known` holds a hand-edited
    /// leaf with the same text at the same path; every other string is
    /// generated.
    pub fn from_plain(map: serde_json::Map<String, Value>, known: Option<&LocaleTree>) -> Self {
        let entries = map
            .into_iter()
            .map(|(key, value)| {
                let previous = known.and_then(|tree| tree.get(&key));
                let node = match value {
                    Value::String(text) => match previous {
                        Some(LocaleNode::Text {
                            text: known_text,
                            provenance: Provenance::HandEdited,
                        }) if *known_text == text => LocaleNode::hand_edited(text),
                        _ => LocaleNode::generated(text),
                    },
                    Value::Object(nested) => {
                        let known_branch = match previous {
                            Some(LocaleNode::Branch(tree)) => Some(tree),
                            _ => None,
                        };
                        LocaleNode::Branch(LocaleTree::from_plain(nested, known_branch))
                    }
                    other => LocaleNode::Opaque(other),
                };
                (key, node)
            })
            .collect();
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&LocaleNode> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut LocaleNode> {
        self.entries.get_mut(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, node: LocaleNode) -> Option<LocaleNode> {
        self.entries.insert(key.into(), node)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &LocaleNode)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &LocaleNode> {
        self.entries.values()
    }

    /// Removes every generated leaf, then every branch left empty by that.
    ///
    /// Branches that were already empty are kept.
    pub fn prune_generated(&mut self) {
        self.entries.retain(|_, node| match node {
            LocaleNode::Text { provenance, .. } => *provenance == Provenance::HandEdited,
            LocaleNode::Branch(tree) => {
                if tree.is_empty() {
                    return true;
                }
                tree.prune_generated();
                !tree.is_empty()
            }
            LocaleNode::Opaque(_) => true,
        });
    }

    /// Plain JSON with the sentinel stripped.
    pub fn to_plain_value(&self) -> Value {
        Value::Object(
            self.entries
                .iter()
                .map(|(key, node)| (key.clone(), node.to_plain_value()))
                .collect(),
        )
    }

    /// JSON in the on-disk format, generated strings sentinel-suffixed.
    pub fn to_persisted_value(&self) -> Value {
        Value::Object(
            self.entries
                .iter()
                .map(|(key, node)| (key.clone(), node.to_persisted_value()))
                .collect(),
        )
    }
}

/// Serializes in the persisted format.
impl Serialize for LocaleTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, node) in &self.entries {
            map.serialize_entry(key, &node.to_persisted_value())?;
        }
        map.end()
    }
}
