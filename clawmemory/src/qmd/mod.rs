//! Invocation of the external `qmd` indexing CLI.
//!
//! qmd is treated as an opaque tool: only its exit status decides success,
//! and captured output is kept verbatim for error reports.

pub mod refresh;

use async_trait::async_trait;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

/// Shown when the qmd binary cannot be found.
pub const TOOL_NOT_FOUND_HINT: &str = "Install with: bun install -g @anthropics/qmd
Then make sure qmd is on PATH, or point CLAWMEMORY_QMD_BIN at the binary.";

/// Captured result of one qmd invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalToolResult {
    /// `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ExternalToolResult {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpawnError {
    /// The binary does not exist. This is a setup problem, not a run failure.
    NotFound(String),
    Other(String),
}

impl std::fmt::Display for SpawnError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(program) => write!(f, "{} command not found", program),
            Self::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for SpawnError {}

#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Name used when describing commands in error messages.
    fn name(&self) -> &str;

    /// Run the tool with `args`, waiting for it to exit.
    async fn run(&self, args: &[&str]) -> Result<ExternalToolResult, SpawnError>;
}

/// The real qmd binary.
pub struct QmdCli {
    name: String,
    path: PathBuf,
}

impl QmdCli {
    /// Resolve `program` on PATH (or as a path) before anything runs.
    pub fn locate(program: &str) -> Result<Self, SpawnError> {
        let path = which::which(program).map_err(|e| {
            log::debug!("[QMD] Lookup of '{}' failed: {}", program, e);
            SpawnError::NotFound(program.to_string())
        })?;

        log::debug!("[QMD] Using {}", path.display());
        Ok(Self {
            name: program.to_string(),
            path,
        })
    }
}

#[async_trait]
impl ToolRunner for QmdCli {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, args: &[&str]) -> Result<ExternalToolResult, SpawnError> {
        log::debug!("[QMD] Running {} {}", self.name, args.join(" "));

        let output = Command::new(&self.path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == io::ErrorKind::NotFound {
                    SpawnError::NotFound(self.name.clone())
                } else {
                    SpawnError::Other(format!("Failed to spawn {}: {}", self.name, e))
                }
            })?;

        Ok(ExternalToolResult {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_missing_binary() {
        let err = QmdCli::locate("qmd-definitely-not-installed-7f3a").err().unwrap();
        assert_eq!(
            err,
            SpawnError::NotFound("qmd-definitely-not-installed-7f3a".to_string())
        );
        assert!(err.to_string().contains("command not found"));
    }

    #[test]
    fn test_missing_tool_hint_names_install_command() {
        assert!(TOOL_NOT_FOUND_HINT.contains("bun install -g @anthropics/qmd"));
        assert!(TOOL_NOT_FOUND_HINT.contains("CLAWMEMORY_QMD_BIN"));
    }

    #[test]
    fn test_success_requires_zero_exit() {
        let result = |code| ExternalToolResult {
            exit_code: code,
            stdout: String::new(),
            stderr: String::new(),
        };
        assert!(result(Some(0)).success());
        assert!(!result(Some(1)).success());
        assert!(!result(None).success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_runs_real_process_and_captures_output() {
        let sh = QmdCli::locate("sh").unwrap();

        let ok = sh.run(&["-c", "echo indexed; echo warn >&2"]).await.unwrap();
        assert!(ok.success());
        assert_eq!(ok.stdout.trim(), "indexed");
        assert_eq!(ok.stderr.trim(), "warn");

        let failed = sh.run(&["-c", "exit 3"]).await.unwrap();
        assert_eq!(failed.exit_code, Some(3));
    }
}
