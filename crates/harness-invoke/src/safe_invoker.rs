//! C1: `SafeInvoker` — validate paths/executable names/arguments and spawn
//! external tools with a bounded allowlist (spec §4.1).
//!
//! All discipline checks (path traversal, filename metacharacters, allowlist
//! membership) run before any process is constructed; the resulting command
//! is piped on stdin/stdout/stderr with a kill-on-drop child lifetime.

use std::path::{Component, Path, PathBuf};
use std::process::Stdio;

use regex::Regex;
use tokio::process::{Child, Command};
use tracing::{info, warn};

use harness_types::error::{HarnessError, HarnessResult};

/// Shell metacharacters that are never allowed in an executable base name
/// or in an argument that looks like a path (spec §4.1).
const DANGEROUS_CHARS: &[char] = &[
    ';', '&', '|', '`', '$', '(', ')', '[', ']', '{', '}', '<', '>',
];

/// The fixed, small allowlist of external executables the engine may ever
/// invoke by name. This is the only place the coupling to specific tool
/// names appears (spec §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExternalTool {
    /// The language toolchain entry point (build/vet/fmt/mod subcommands).
    Toolchain,
    /// The style linter (golangci-lint-style "run" contract).
    StyleLinter,
    /// The security linter ("-fmt text" contract).
    SecurityLinter,
    /// The vulnerability checker.
    VulnChecker,
}

impl ExternalTool {
    #[must_use]
    pub fn default_binary_name(self) -> &'static str {
        match self {
            Self::Toolchain => "go",
            Self::StyleLinter => "golangci-lint",
            Self::SecurityLinter => "gosec",
            Self::VulnChecker => "govulncheck",
        }
    }
}

/// A validated, not-yet-started subprocess bound to a working directory.
pub struct PreparedCommand {
    command: Command,
    label: String,
}

impl PreparedCommand {
    /// Spawn the process with piped stdio. The returned child is owned
    /// exclusively by the caller, which must guarantee termination on all
    /// exit paths (spec §3 "Ownership").
    pub fn spawn(mut self) -> HarnessResult<Child> {
        self.command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        info!(label = %self.label, "spawning subprocess");
        self.command
            .spawn()
            .map_err(|e| HarnessError::ExternalToolFailure(format!("spawn {}: {e}", self.label)))
    }
}

/// Validates and constructs subprocesses under the discipline rules of
/// spec §4.1. Never partially starts a process: every rule is checked
/// before `Command` construction.
pub struct SafeInvoker {
    working_dir: PathBuf,
    tool_paths: std::collections::HashMap<String, PathBuf>,
}

impl SafeInvoker {
    /// Normalise and absolutise `working_dir`, rejecting it if it does not
    /// exist, is not a directory, or contains `..` after normalisation.
    pub fn new(
        working_dir: impl AsRef<Path>,
        tool_paths: std::collections::HashMap<String, PathBuf>,
    ) -> HarnessResult<Self> {
        let working_dir = normalize_working_dir(working_dir.as_ref())?;
        Ok(Self {
            working_dir,
            tool_paths,
        })
    }

    #[must_use]
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Prepare a command invoking one of the allowlisted external tools.
    pub fn prepare_tool(
        &self,
        tool: ExternalTool,
        args: &[String],
        is_compile_call: bool,
    ) -> HarnessResult<PreparedCommand> {
        let binary = self.resolve_tool_path(tool);
        self.validate_arguments(args)?;

        let mut command = Command::new(&binary);
        command.args(args).current_dir(&self.working_dir);
        if is_compile_call {
            // Spec §4.1: compile calls get CGO_ENABLED=0 added to the
            // inherited environment.
            command.env("CGO_ENABLED", "0");
        }

        Ok(PreparedCommand {
            command,
            label: format!("{binary:?} {args:?}"),
        })
    }

    /// Prepare a command invoking a binary freshly compiled inside the
    /// working directory (the server under test). Applies the stricter
    /// name discipline of spec §4.1.
    pub fn prepare_compiled_binary(
        &self,
        binary_name: &str,
        args: &[String],
    ) -> HarnessResult<PreparedCommand> {
        validate_compiled_binary_name(binary_name)?;
        self.validate_arguments(args)?;

        let candidate = self.working_dir.join(binary_name);
        let resolved = candidate.canonicalize().map_err(|e| {
            HarnessError::ValidationRefused(format!(
                "compiled binary {binary_name} does not exist: {e}"
            ))
        })?;

        if !resolved.starts_with(&self.working_dir) {
            return Err(HarnessError::ValidationRefused(format!(
                "compiled binary {binary_name} resolves outside the working directory"
            )));
        }

        ensure_executable(&resolved)?;

        let mut command = Command::new(&resolved);
        command.args(args).current_dir(&self.working_dir);

        Ok(PreparedCommand {
            command,
            label: format!("{resolved:?} {args:?}"),
        })
    }

    fn resolve_tool_path(&self, tool: ExternalTool) -> PathBuf {
        let key = match tool {
            ExternalTool::Toolchain => "toolchain",
            ExternalTool::StyleLinter => "style_linter",
            ExternalTool::SecurityLinter => "security_linter",
            ExternalTool::VulnChecker => "vuln_checker",
        };
        self.tool_paths
            .get(key)
            .cloned()
            .unwrap_or_else(|| PathBuf::from(tool.default_binary_name()))
    }

    fn validate_arguments(&self, args: &[String]) -> HarnessResult<()> {
        for arg in args {
            if arg.chars().any(|c| DANGEROUS_CHARS.contains(&c)) {
                return Err(HarnessError::ValidationRefused(format!(
                    "argument contains disallowed shell metacharacter: {arg}"
                )));
            }
            if looks_like_path(arg) && arg.contains("..") {
                return Err(HarnessError::ValidationRefused(format!(
                    "argument contains path-traversal sequence: {arg}"
                )));
            }
        }
        Ok(())
    }
}

fn looks_like_path(arg: &str) -> bool {
    arg.contains('/') || arg.contains('\\') || arg.starts_with('.')
}

fn normalize_working_dir(path: &Path) -> HarnessResult<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| HarnessError::ValidationRefused(format!("cwd unavailable: {e}")))?
            .join(path)
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::ParentDir => {
                return Err(HarnessError::ValidationRefused(format!(
                    "working directory contains a parent-dir traversal: {}",
                    path.display()
                )));
            }
            other => normalized.push(other.as_os_str()),
        }
    }

    if !normalized.exists() {
        return Err(HarnessError::ValidationRefused(format!(
            "working directory does not exist: {}",
            normalized.display()
        )));
    }
    if !normalized.is_dir() {
        return Err(HarnessError::ValidationRefused(format!(
            "working directory is not a directory: {}",
            normalized.display()
        )));
    }

    normalized
        .canonicalize()
        .map_err(|e| HarnessError::ValidationRefused(format!("canonicalizing working dir: {e}")))
}

fn validate_compiled_binary_name(name: &str) -> HarnessResult<()> {
    let pattern = Regex::new(r"^[A-Za-z0-9._-]+$").expect("static regex is valid");
    if !pattern.is_match(name) {
        return Err(HarnessError::ValidationRefused(format!(
            "compiled binary name fails character discipline: {name}"
        )));
    }
    if name.contains("..") {
        return Err(HarnessError::ValidationRefused(format!(
            "compiled binary name contains path traversal: {name}"
        )));
    }
    if name.chars().any(|c| DANGEROUS_CHARS.contains(&c)) {
        return Err(HarnessError::ValidationRefused(format!(
            "compiled binary name contains a shell metacharacter: {name}"
        )));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(HarnessError::ValidationRefused(format!(
            "compiled binary name contains a path separator: {name}"
        )));
    }
    Ok(())
}

#[cfg(unix)]
fn ensure_executable(path: &Path) -> HarnessResult<()> {
    use std::os::unix::fs::PermissionsExt;
    let metadata = std::fs::metadata(path)
        .map_err(|e| HarnessError::ValidationRefused(format!("stat compiled binary: {e}")))?;
    if metadata.permissions().mode() & 0o100 == 0 {
        return Err(HarnessError::ValidationRefused(
            "compiled binary is not user-executable".to_string(),
        ));
    }
    Ok(())
}

#[cfg(not(unix))]
fn ensure_executable(path: &Path) -> HarnessResult<()> {
    if !path.exists() {
        return Err(HarnessError::ValidationRefused(
            "compiled binary does not exist".to_string(),
        ));
    }
    Ok(())
}

/// Kill-and-wait a spawned child on every exit path, including the
/// diagnostic-unwind path (spec §9 "Subprocess lifetime"). Intended to be
/// used as a scope guard: hold this around the lifetime a child must stay
/// alive, and let `Drop` perform the best-effort kill if the caller did not
/// already call [`ChildGuard::stop`].
pub struct ChildGuard {
    child: Option<Child>,
}

impl ChildGuard {
    #[must_use]
    pub fn new(child: Child) -> Self {
        Self { child: Some(child) }
    }

    #[must_use]
    pub fn child_mut(&mut self) -> Option<&mut Child> {
        self.child.as_mut()
    }

    /// Kill and wait with a bounded timeout, consuming the guard.
    pub async fn stop(mut self, shutdown_timeout: std::time::Duration) {
        if let Some(mut child) = self.child.take() {
            let _ = child.start_kill();
            match tokio::time::timeout(shutdown_timeout, child.wait()).await {
                Ok(Ok(status)) => info!(%status, "child process exited"),
                Ok(Err(e)) => warn!(error = %e, "error waiting for child process"),
                Err(_) => {
                    warn!("child process shutdown timed out, forcing kill");
                    let _ = child.kill().await;
                }
            }
        }
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if let Some(child) = self.child.as_mut() {
            let _ = child.start_kill();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn rejects_nonexistent_working_dir() {
        let result = SafeInvoker::new("/does/not/exist/surely", HashMap::new());
        assert!(result.is_err());
    }

    #[test]
    fn accepts_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let invoker = SafeInvoker::new(dir.path(), HashMap::new()).unwrap();
        assert!(invoker.working_dir().is_absolute());
    }

    #[test]
    fn rejects_dangerous_argument() {
        let dir = tempfile::tempdir().unwrap();
        let invoker = SafeInvoker::new(dir.path(), HashMap::new()).unwrap();
        let result = invoker.prepare_tool(
            ExternalTool::Toolchain,
            &["build".to_string(), "; rm -rf /".to_string()],
            false,
        );
        assert!(result.is_err());
    }

    #[test]
    fn rejects_path_traversal_argument() {
        let dir = tempfile::tempdir().unwrap();
        let invoker = SafeInvoker::new(dir.path(), HashMap::new()).unwrap();
        let result =
            invoker.prepare_tool(ExternalTool::Toolchain, &["../../etc/passwd".to_string()], false);
        assert!(result.is_err());
    }

    #[test]
    fn validates_compiled_binary_name_characters() {
        assert!(validate_compiled_binary_name("server").is_ok());
        assert!(validate_compiled_binary_name("server-v2.test").is_ok());
        assert!(validate_compiled_binary_name("server; rm -rf /").is_err());
        assert!(validate_compiled_binary_name("../server").is_err());
        assert!(validate_compiled_binary_name("sub/server").is_err());
    }

    #[test]
    fn rejects_compiled_binary_outside_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let invoker = SafeInvoker::new(dir.path(), HashMap::new()).unwrap();
        let result = invoker.prepare_compiled_binary("server", &[]);
        assert!(result.is_err());
    }
}
