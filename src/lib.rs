pub mod collect;
pub mod composer;
mod error;
pub mod locale;
pub mod logging;
pub mod manifest;

pub use composer::{ComposeSummary, Composer, ComposerBuilder};
pub use error::Error;
pub use manifest::hook::{CommandHook, FnHook, HookError, HookOutcome, PostProcess, ScriptHook};
pub use manifest::Manifest;
