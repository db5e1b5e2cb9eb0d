//! Post-process hooks run on the assembled manifest before it is written.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde_json::Value;
use thiserror::Error;

use super::Manifest;

/// What a hook did with the manifest it was handed.
#[derive(Debug, Clone, PartialEq)]
pub enum HookOutcome {
    /// Use this manifest from now on.
    Replace(Manifest),
    /// Keep the (possibly mutated in place) manifest.
    NoChange,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HookError {
    #[error("failed to run post-process script '{path}': {source}")]
    Spawn {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("post-process script '{path}' exited with {status}: {stderr}")]
    Failed {
        path: PathBuf,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("post-process script '{path}' printed invalid JSON: {source}")]
    InvalidOutput {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("post-process script '{path}' must print a JSON object")]
    NotAnObject { path: PathBuf },

    #[error("failed to encode manifest for post-process script: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("post-process hook failed: {0}")]
    Custom(String),
}

/// A step that may mutate or replace the manifest.
///
/// Closures of the form `Fn(&mut Manifest, &Path) -> Result<HookOutcome, HookError>`
/// implement this directly.
pub trait PostProcess: std::fmt::Debug {
    fn apply(&self, manifest: &mut Manifest, root: &Path) -> Result<HookOutcome, HookError>;
}

/// Adapts a closure into a [`PostProcess`] hook.
pub struct FnHook<F> {
    name: String,
    f: F,
}

impl<F> FnHook<F>
where
    F: Fn(&mut Manifest, &Path) -> Result<HookOutcome, HookError>,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> std::fmt::Debug for FnHook<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnHook").field("name", &self.name).finish()
    }
}

impl<F> PostProcess for FnHook<F>
where
    F: Fn(&mut Manifest, &Path) -> Result<HookOutcome, HookError>,
{
    fn apply(&self, manifest: &mut Manifest, root: &Path) -> Result<HookOutcome, HookError> {
        (self.f)(manifest, root)
    }
}

/// File name of the post-process script looked up in the config directory.
pub const SCRIPT_FILE: &str = "script.js";

/// Loads the script module, normalizes its export to a list of functions,
/// calls each with `(manifest, root)` and prints the resulting manifest.
const NODE_SHIM: &str = r#"
const [script, root] = process.argv.slice(-2);
let input = '';
process.stdin.setEncoding('utf8');
process.stdin.on('data', (chunk) => { input += chunk; });
process.stdin.on('end', () => {
  try {
    let manifest = JSON.parse(input);
    const exported = require(require('path').resolve(script));
    const hooks = Array.isArray(exported) ? exported : [exported];
    for (const hook of hooks) {
      if (typeof hook !== 'function') {
        throw new TypeError(`${script} exports a value that is not a function`);
      }
      const result = hook(manifest, root);
      if (result != null) manifest = result;
    }
    process.stdout.write(JSON.stringify(manifest));
  } catch (err) {
    process.stderr.write(String((err && err.stack) || err));
    process.exit(1);
  }
});
"#;

/// The project's `script.js`, exporting one function or an array of
/// functions `(manifest, rootPath) => manifest | undefined`, run under node.
#[derive(Debug, Clone)]
pub struct ScriptHook {
    path: PathBuf,
    node: PathBuf,
}

impl ScriptHook {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            node: PathBuf::from("node"),
        }
    }

    /// Uses a specific node binary instead of the one on `PATH`.
    pub fn with_node(mut self, node: impl AsRef<Path>) -> Self {
        self.node = node.as_ref().to_path_buf();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the hook for `<dir>/script.js` if that file exists.
    pub fn discover(dir: &Path) -> Option<Self> {
        let path = dir.join(SCRIPT_FILE);
        path.is_file().then(|| Self::new(path))
    }
}

impl PostProcess for ScriptHook {
    fn apply(&self, manifest: &mut Manifest, root: &Path) -> Result<HookOutcome, HookError> {
        let mut command = Command::new(&self.node);
        command
            .arg("-e")
            .arg(NODE_SHIM)
            .arg("--")
            .arg(&self.path)
            .arg(root);
        run_with_manifest(command, manifest, &self.path)
    }
}

/// Runs an arbitrary executable as a hook. Never discovered; register it
/// explicitly with the composer builder.
///
/// The executable gets the project root as its only argument and the manifest
/// as JSON on stdin. Blank stdout means no change; anything else must be a
/// JSON object that replaces the manifest.
#[derive(Debug, Clone)]
pub struct CommandHook {
    path: PathBuf,
}

impl CommandHook {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl PostProcess for CommandHook {
    fn apply(&self, manifest: &mut Manifest, root: &Path) -> Result<HookOutcome, HookError> {
        let mut command = Command::new(&self.path);
        command.arg(root);
        run_with_manifest(command, manifest, &self.path)
    }
}

/// Pipes the manifest into `command` and reads a replacement from its stdout.
fn run_with_manifest(
    mut command: Command,
    manifest: &Manifest,
    path: &Path,
) -> Result<HookOutcome, HookError> {
    let spawn_err = |source| HookError::Spawn {
        path: path.to_path_buf(),
        source,
    };
    let input = serde_json::to_vec(manifest).map_err(HookError::Encode)?;

    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(spawn_err)?;

    // Fed from a thread so a child that writes before reading cannot deadlock.
    let writer = child.stdin.take().map(|mut stdin| {
        std::thread::spawn(move || match stdin.write_all(&input) {
            Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => Err(e),
            _ => Ok(()),
        })
    });
    let output = child.wait_with_output().map_err(spawn_err)?;
    if let Some(Ok(Err(e))) = writer.map(|handle| handle.join()) {
        return Err(spawn_err(e));
    }

    if !output.status.success() {
        return Err(HookError::Failed {
            path: path.to_path_buf(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    if stdout.trim().is_empty() {
        return Ok(HookOutcome::NoChange);
    }

    let value: Value = serde_json::from_str(&stdout).map_err(|source| HookError::InvalidOutput {
        path: path.to_path_buf(),
        source,
    })?;
    match value {
        Value::Object(map) => Ok(HookOutcome::Replace(Manifest::from(map))),
        _ => Err(HookError::NotAnObject {
            path: path.to_path_buf(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_fn_hook_mutates_in_place() {
        let hook = FnHook::new("tag", |manifest: &mut Manifest, _root: &Path| {
            manifest.insert("tagged", json!(true));
            Ok(HookOutcome::NoChange)
        });
        let mut manifest = Manifest::new();
        let outcome = hook.apply(&mut manifest, Path::new(".")).unwrap();
        assert_eq!(outcome, HookOutcome::NoChange);
        assert_eq!(manifest.get("tagged"), Some(&json!(true)));
    }

    #[test]
    fn test_discover_only_matches_script_js() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("script.json"), "{}").unwrap();
        std::fs::write(dir.path().join("script.yaml"), "a: 1\n").unwrap();
        std::fs::write(dir.path().join("script.sh"), "").unwrap();
        assert!(ScriptHook::discover(dir.path()).is_none());

        std::fs::write(dir.path().join("script.js"), "module.exports = () => {};").unwrap();
        let hook = ScriptHook::discover(dir.path()).unwrap();
        assert_eq!(hook.path(), dir.path().join("script.js"));
    }

    fn node_available() -> bool {
        Command::new("node")
            .arg("--version")
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    #[test]
    fn test_script_runs_exported_functions_in_order() {
        if !node_available() {
            eprintln!("node not found, skipping");
            return;
        }
        let dir = TempDir::new().unwrap();
        let script = dir.path().join(SCRIPT_FILE);
        std::fs::write(
            &script,
            r#"
            const tag = (manifest) => { manifest.tagged = true; };
            const wrap = (manifest, root) => ({ inner: manifest, root });
            module.exports = [tag, wrap];
            "#,
        )
        .unwrap();

        let mut manifest = Manifest::new();
        manifest.insert("id", json!("app"));
        let outcome = ScriptHook::new(&script).apply(&mut manifest, dir.path()).unwrap();
        let HookOutcome::Replace(replaced) = outcome else {
            panic!("expected replacement");
        };
        assert_eq!(replaced.get("inner"), Some(&json!({"id": "app", "tagged": true})));
        assert_eq!(replaced.get("root"), Some(&json!(dir.path().display().to_string())));
    }

    #[test]
    fn test_script_single_function_export() {
        if !node_available() {
            eprintln!("node not found, skipping");
            return;
        }
        let dir = TempDir::new().unwrap();
        let script = dir.path().join(SCRIPT_FILE);
        std::fs::write(&script, "module.exports = (m) => { m.tagged = true; return m; };").unwrap();

        let mut manifest = Manifest::new();
        let outcome = ScriptHook::new(&script).apply(&mut manifest, dir.path()).unwrap();
        assert_eq!(
            outcome,
            HookOutcome::Replace(Manifest::from(json!({"tagged": true}).as_object().unwrap().clone()))
        );
    }

    #[test]
    fn test_script_error_is_hook_failure() {
        if !node_available() {
            eprintln!("node not found, skipping");
            return;
        }
        let dir = TempDir::new().unwrap();
        let script = dir.path().join(SCRIPT_FILE);
        std::fs::write(&script, "module.exports = [() => { throw new Error('boom'); }];").unwrap();

        let mut manifest = Manifest::new();
        let result = ScriptHook::new(&script).apply(&mut manifest, dir.path());
        assert!(matches!(result, Err(HookError::Failed { ref stderr, .. }) if stderr.contains("boom")));
    }

    #[test]
    fn test_missing_node_is_spawn_error() {
        let dir = TempDir::new().unwrap();
        let script = dir.path().join(SCRIPT_FILE);
        std::fs::write(&script, "module.exports = () => {};").unwrap();

        let mut manifest = Manifest::new();
        let result = ScriptHook::new(&script)
            .with_node("/nonexistent/bin/node")
            .apply(&mut manifest, dir.path());
        assert!(matches!(result, Err(HookError::Spawn { .. })));
    }

    #[cfg(unix)]
    fn executable(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("script.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn test_command_hook_replaces_manifest() {
        let dir = TempDir::new().unwrap();
        let path = executable(dir.path(), "cat > /dev/null\necho '{\"id\": \"replaced\"}'");

        let mut manifest = Manifest::new();
        let outcome = CommandHook::new(path).apply(&mut manifest, dir.path()).unwrap();
        let HookOutcome::Replace(replaced) = outcome else {
            panic!("expected replacement");
        };
        assert_eq!(replaced.get("id"), Some(&json!("replaced")));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_hook_blank_output_is_no_change() {
        let dir = TempDir::new().unwrap();
        let path = executable(dir.path(), "cat > /dev/null");

        let mut manifest = Manifest::new();
        let outcome = CommandHook::new(path).apply(&mut manifest, dir.path()).unwrap();
        assert_eq!(outcome, HookOutcome::NoChange);
    }

    #[cfg(unix)]
    #[test]
    fn test_command_hook_failure_is_error() {
        let dir = TempDir::new().unwrap();
        let path = executable(dir.path(), "cat > /dev/null\necho boom >&2\nexit 3");

        let mut manifest = Manifest::new();
        let result = CommandHook::new(path).apply(&mut manifest, dir.path());
        assert!(matches!(result, Err(HookError::Failed { ref stderr, .. }) if stderr == "boom"));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_hook_rejects_non_object() {
        let dir = TempDir::new().unwrap();
        let path = executable(dir.path(), "cat > /dev/null\necho '[1]'");

        let mut manifest = Manifest::new();
        let result = CommandHook::new(path).apply(&mut manifest, dir.path());
        assert!(matches!(result, Err(HookError::NotAnObject { .. })));
    }
}
