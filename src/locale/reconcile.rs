//! Marker-based merge of freshly collected locale strings into the
//! previously persisted, possibly hand-edited, locale trees.

use serde_json::Value;
use tracing::{info, warn};

use super::tree::{LocaleNode, LocaleTree, Provenance};
use crate::collect::Mapping;

/// Outcome of a reconciliation run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciled {
    pub tree: LocaleTree,
    /// Dotted paths of entries left alone because a human edited them.
    pub preserved: Vec<String>,
}

/// Merges `source` into `persisted`.
///
/// Stale generated leaves are pruned from `persisted` first. Then every
/// source string is written as a generated leaf unless the persisted entry
/// at that key holds hand-edited content, which is kept as is.
pub fn reconcile(source: &Mapping, mut persisted: LocaleTree) -> Reconciled {
    persisted.prune_generated();

    let mut preserved = Vec::new();
    let mut path = Vec::new();
    merge_level(&mut persisted, source, &mut path, &mut preserved);

    Reconciled {
        tree: persisted,
        preserved,
    }
}

fn merge_level(
    target: &mut LocaleTree,
    source: &Mapping,
    path: &mut Vec<String>,
    preserved: &mut Vec<String>,
) {
    for (key, value) in source {
        path.push(key.clone());
        match value {
            Value::String(text) => {
                if target.get(key).is_some_and(LocaleNode::has_hand_edits) {
                    preserve(path, preserved);
                } else {
                    target.insert(key.clone(), LocaleNode::generated(text.clone()));
                }
            }
            Value::Object(nested) => {
                let blocked = matches!(
                    target.get(key),
                    Some(LocaleNode::Text {
                        provenance: Provenance::HandEdited,
                        ..
                    }) | Some(LocaleNode::Opaque(_))
                );
                if blocked {
                    preserve(path, preserved);
                } else {
                    if !matches!(target.get(key), Some(LocaleNode::Branch(_))) {
                        target.insert(key.clone(), LocaleNode::Branch(LocaleTree::new()));
                    }
                    if let Some(LocaleNode::Branch(child)) = target.get_mut(key) {
                        merge_level(child, nested, path, preserved);
                    }
                }
            }
            other => {
                warn!(
                    event = "locale.source_value_ignored",
                    key = %path.join("."),
                    value = %other,
                    message = "locale values must be strings or objects"
                );
            }
        }
        path.pop();
    }
}

fn preserve(path: &[String], preserved: &mut Vec<String>) {
    let key = path.join(".");
    info!(event = "locale.hand_edit_preserved", key = %key);
    preserved.push(key);
}
