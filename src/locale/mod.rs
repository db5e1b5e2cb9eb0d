//! Locale reconciliation between collected source strings and persisted,
//! possibly hand-translated, locale files.

mod reconcile;
mod store;
mod tree;

pub use reconcile::{reconcile, Reconciled};
pub use store::LocaleStore;
pub use tree::{LocaleNode, LocaleTree, Provenance, SENTINEL};
