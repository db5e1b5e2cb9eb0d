//! Composition of a project's config folder into its manifest.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{info, warn};

use crate::collect::{Collected, Collector, Mapping, Mode};
use crate::locale::{self, LocaleNode, LocaleStore, LocaleTree};
use crate::manifest::hook::{HookOutcome, PostProcess, ScriptHook};
use crate::manifest::Manifest;
use crate::Error;

pub const MANIFEST_FILE: &str = "app.json";
pub const LOCALES_DIR: &str = "locales";
pub const DEFAULT_CONFIG_DIR: &str = "config";

/// What a compose run wrote and what it left alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComposeSummary {
    pub manifest_path: PathBuf,
    pub locale_files_written: Vec<PathBuf>,
    pub locale_files_removed: Vec<PathBuf>,
    /// Dotted paths (`<locale>.<key>...`) of hand-edited entries kept as found.
    pub preserved_hand_edits: Vec<String>,
}

/// A validated project, ready to compose.
///
/// Construction checks the project root and config directory and loads the
/// existing manifest; nothing is written until [`compose`](Self::compose).
///
/// ## Example
///
/// ```no_run
/// use app_composer::Composer;
///
/// let summary = Composer::builder()
///     .root("my-app")
///     .build()?
///     .compose()?;
/// println!("wrote {}", summary.manifest_path.display());
/// # Ok::<(), app_composer::Error>(())
/// ```
#[derive(Debug)]
pub struct Composer {
    root: PathBuf,
    manifest_path: PathBuf,
    manifest: Manifest,
    collector: Collector,
    locales: LocaleStore,
    hooks: Vec<Box<dyn PostProcess>>,
}

impl Composer {
    /// Creates a new composer builder.
    pub fn builder() -> ComposerBuilder {
        ComposerBuilder {
            root: None,
            config_dir: None,
            hooks: Vec::new(),
            discover_script: true,
        }
    }

    pub fn has_hooks(&self) -> bool {
        !self.hooks.is_empty()
    }

    /// Recomposes the manifest and locale files from the config folder.
    pub fn compose(self) -> Result<ComposeSummary, Error> {
        info!(
            event = "composer.compose_started",
            manifest = %self.manifest_path.display(),
            config_dir = %self.collector.config_dir().display()
        );

        let locales_source = self.collector.collect("locales", Mode::Object)?;
        let config = self.collector.collect("config", Mode::Object)?;
        let signals = self.collector.collect("signals", Mode::Object)?;

        let drivers = self.collector.collect("drivers", Mode::List)?;
        let triggers = self.collector.collect("flow/triggers", Mode::List)?;
        let conditions = self.collector.collect("flow/conditions", Mode::List)?;
        let actions = self.collector.collect("flow/actions", Mode::List)?;
        let screensavers = self.collector.collect("screensavers", Mode::List)?;
        let speech = self.collector.collect("speech", Mode::List)?;

        let mut manifest = self.manifest;
        let mut summary = ComposeSummary {
            manifest_path: self.manifest_path.clone(),
            ..ComposeSummary::default()
        };

        let source_tree = locales_source
            .and_then(|collected| mapping_or_warn(collected, "locales"))
            .unwrap_or_default();

        let reconciled = if !source_tree.is_empty() || !self.hooks.is_empty() {
            let persisted = self.locales.read()?;
            let result = locale::reconcile(&source_tree, persisted.clone());
            manifest.insert("locales", result.tree.to_plain_value());
            summary.preserved_hand_edits = result.preserved;
            Some(PreviousLocales {
                persisted,
                reconciled: result.tree,
            })
        } else {
            None
        };

        if let Some(map) = config.and_then(|collected| mapping_or_warn(collected, "config")) {
            manifest.merge_shallow(map);
        }

        manifest.attach(&["signals"], signals.map(Collected::into_value));
        manifest.attach(&["drivers"], drivers.map(Collected::into_value));

        manifest.ensure_object("flow");
        manifest.attach(&["flow", "triggers"], triggers.map(Collected::into_value));
        manifest.attach(&["flow", "conditions"], conditions.map(Collected::into_value));
        manifest.attach(&["flow", "actions"], actions.map(Collected::into_value));

        manifest.attach(&["screensavers"], screensavers.map(Collected::into_value));
        manifest.attach(&["speech"], speech.map(Collected::into_value));

        for (index, hook) in self.hooks.iter().enumerate() {
            info!(event = "composer.hook_started", index, hook = ?hook);
            match hook.apply(&mut manifest, &self.root)? {
                HookOutcome::Replace(replacement) => {
                    info!(event = "composer.hook_replaced_manifest", index);
                    manifest = replacement;
                }
                HookOutcome::NoChange => {}
            }
        }

        let final_locales = manifest.remove("locales");
        manifest.save(&self.manifest_path)?;
        info!(event = "composer.manifest_written", path = %self.manifest_path.display());

        write_locales(&self.locales, final_locales, reconciled, &mut summary)?;

        info!(
            event = "composer.compose_completed",
            locale_files = summary.locale_files_written.len(),
            preserved_hand_edits = summary.preserved_hand_edits.len()
        );
        Ok(summary)
    }
}

/// Locale state from before the hooks ran, needed to write locale files back.
struct PreviousLocales {
    persisted: LocaleTree,
    reconciled: LocaleTree,
}

fn mapping_or_warn(collected: Collected, folder: &str) -> Option<Mapping> {
    let mapping = collected.into_mapping();
    if mapping.is_none() {
        warn!(
            event = "composer.contribution_ignored",
            folder,
            message = "expected an object, found a list"
        );
    }
    mapping
}

fn write_locales(
    store: &LocaleStore,
    final_locales: Option<Value>,
    previous: Option<PreviousLocales>,
    summary: &mut ComposeSummary,
) -> Result<(), Error> {
    let ids = match final_locales {
        Some(Value::Object(ids)) => ids,
        Some(other) => {
            warn!(
                event = "composer.locales_ignored",
                value = %other,
                message = "locales must be an object keyed by locale id"
            );
            Mapping::new()
        }
        None => Mapping::new(),
    };

    let Some(previous) = previous else {
        for (id, value) in &ids {
            if value.is_object() {
                summary.locale_files_written.push(store.write(id, value)?);
            } else {
                warn_locale_not_object(id);
            }
        }
        return Ok(());
    };

    let final_tree = LocaleTree::from_plain(ids, Some(&previous.reconciled));
    for (id, node) in final_tree.iter() {
        match node {
            LocaleNode::Branch(tree) => summary.locale_files_written.push(store.write(id, tree)?),
            _ => warn_locale_not_object(id),
        }
    }

    // Files that only ever held generated strings go away with their locale.
    for (id, node) in previous.persisted.iter() {
        if !final_tree.contains_key(id) && !node.has_hand_edits() {
            summary.locale_files_removed.push(store.remove(id)?);
        }
    }
    Ok(())
}

fn warn_locale_not_object(id: &str) {
    warn!(
        event = "composer.locale_skipped",
        locale = id,
        message = "locale tree is not an object"
    );
}

/// Builder for a [`Composer`].
#[must_use = "builders do nothing until .build() is called"]
#[derive(Debug)]
pub struct ComposerBuilder {
    root: Option<PathBuf>,
    config_dir: Option<PathBuf>,
    hooks: Vec<Box<dyn PostProcess>>,
    discover_script: bool,
}

impl ComposerBuilder {
    /// Sets the project root. Defaults to the current working directory.
    pub fn root(mut self, path: impl AsRef<Path>) -> Self {
        self.root = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the config directory, resolved against the root. Defaults to `config`.
    pub fn config_dir(mut self, path: impl AsRef<Path>) -> Self {
        self.config_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Adds a post-process hook. Hooks run in the order they were added,
    /// before a discovered script.
    pub fn with_hook(mut self, hook: impl PostProcess + 'static) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }

    pub fn with_hooks(mut self, hooks: impl IntoIterator<Item = Box<dyn PostProcess>>) -> Self {
        self.hooks.extend(hooks);
        self
    }

    /// Whether to pick up `script.js` from the config directory. On by default.
    pub fn discover_script(mut self, enabled: bool) -> Self {
        self.discover_script = enabled;
        self
    }

    /// Validates the project layout and loads the manifest.
    pub fn build(self) -> Result<Composer, Error> {
        let root = match self.root {
            Some(root) => root,
            None => std::env::current_dir().map_err(|source| Error::Io {
                path: PathBuf::from("."),
                source,
            })?,
        };
        if !root.exists() {
            return Err(Error::RootNotFound(root));
        }
        if !root.is_dir() {
            return Err(Error::RootNotDirectory(root));
        }

        let config_dir = root.join(
            self.config_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_DIR)),
        );
        if !config_dir.exists() {
            return Err(Error::ConfigDirNotFound(config_dir));
        }
        if !config_dir.is_dir() {
            return Err(Error::ConfigDirNotDirectory(config_dir));
        }

        let manifest_path = root.join(MANIFEST_FILE);
        let manifest = Manifest::load(&manifest_path)?;

        let mut hooks = self.hooks;
        if self.discover_script {
            if let Some(script) = ScriptHook::discover(&config_dir) {
                info!(event = "composer.script_found", path = %script.path().display());
                hooks.push(Box::new(script));
            }
        }

        Ok(Composer {
            locales: LocaleStore::new(root.join(LOCALES_DIR)),
            collector: Collector::new(config_dir),
            root,
            manifest_path,
            manifest,
            hooks,
        })
    }
}
