//! Index refresh jobs: `qmd update` followed by `qmd embed`.
//!
//! `run_refresh` records every outcome in the job's state file so the
//! healthcheck can see failure streaks. `run_sync` does the same two steps
//! without touching state.

use super::{ExternalToolResult, SpawnError, ToolRunner};
use crate::state::{StateError, StateStore};
use crate::util::truncate_chars;
use clawmemory_types::RefreshState;
use std::fmt;

/// Recorded as `last_error` when the pre-flight finds no collection.
pub const NO_COLLECTION_ERROR: &str = "No collection found";

/// Printed after a failed pre-flight.
pub const NO_COLLECTION_HINT: &str = "Create one first:
  cd /path/to/your/workspace
  qmd collection add . --name workspace --mask \"**/*.md\"";

const MAX_ERROR_CHARS: usize = 500;

/// Steps of a refresh, in order.
const PIPELINE: [&[&str]; 2] = [&["update"], &["embed"]];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolFailure {
    /// The full command line, e.g. `qmd update`
    pub command: String,
    pub result: ExternalToolResult,
}

impl ToolFailure {
    /// Short description suitable for `last_error`.
    pub fn describe(&self) -> String {
        let mut description = match self.result.exit_code {
            Some(code) => format!(
                "Command '{}' returned non-zero exit status {}",
                self.command, code
            ),
            None => format!("Command '{}' was terminated by a signal", self.command),
        };

        let stderr = self.result.stderr.trim();
        if !stderr.is_empty() {
            description.push_str(": ");
            description.push_str(stderr);
        }

        truncate_chars(&description, MAX_ERROR_CHARS).to_string()
    }
}

/// An expected failure: recorded in state and reported through the exit code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunFailure {
    NoCollection,
    Subprocess(ToolFailure),
    /// qmd was found but could not be started (permissions, bad interpreter)
    Spawn(String),
}

impl RunFailure {
    pub fn describe(&self) -> String {
        match self {
            RunFailure::NoCollection => NO_COLLECTION_ERROR.to_string(),
            RunFailure::Subprocess(failure) => failure.describe(),
            RunFailure::Spawn(msg) => truncate_chars(msg, MAX_ERROR_CHARS).to_string(),
        }
    }
}

/// Fatal errors. `run_refresh` only returns these for problems that recording
/// a failure cannot fix: a missing binary or an unusable state file.
#[derive(Debug)]
pub enum RefreshError {
    ToolNotFound(String),
    Spawn(String),
    State(StateError),
}

impl fmt::Display for RefreshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ToolNotFound(program) => write!(f, "{} command not found", program),
            Self::Spawn(msg) => write!(f, "{}", msg),
            Self::State(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for RefreshError {}

impl From<StateError> for RefreshError {
    fn from(e: StateError) -> Self {
        RefreshError::State(e)
    }
}

impl From<SpawnError> for RefreshError {
    fn from(e: SpawnError) -> Self {
        match e {
            SpawnError::NotFound(program) => RefreshError::ToolNotFound(program),
            SpawnError::Other(msg) => RefreshError::Spawn(msg),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RefreshOptions {
    /// Check that qmd has at least one collection before refreshing
    pub preflight: bool,
}

impl Default for RefreshOptions {
    fn default() -> Self {
        Self { preflight: true }
    }
}

/// Outcome of one refresh run, after state has been saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshReport {
    pub state: RefreshState,
    pub failure: Option<RunFailure>,
}

impl RefreshReport {
    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }
}

/// Run a tracked refresh for `job` and persist the result.
pub async fn run_refresh(
    tool: &dyn ToolRunner,
    store: &StateStore,
    job: &str,
    options: &RefreshOptions,
) -> Result<RefreshReport, RefreshError> {
    let mut state = store.load_or_default(job)?;
    let now = chrono::Utc::now().to_rfc3339();

    let failure = match attempt(tool, options).await {
        Ok(failure) => failure,
        Err(SpawnError::NotFound(program)) => return Err(RefreshError::ToolNotFound(program)),
        Err(SpawnError::Other(msg)) => Some(RunFailure::Spawn(msg)),
    };

    match &failure {
        None => {
            state.record_success(now.as_str());
            log::info!("[QMD_REFRESH] Job '{}' completed at {}", job, now);
        }
        Some(f) => {
            state.record_failure(now.as_str(), f.describe());
            log::error!(
                "[QMD_REFRESH] Job '{}' failed ({} consecutive): {}",
                job,
                state.failures,
                f.describe()
            );
        }
    }

    store.save(job, &state)?;

    Ok(RefreshReport {
        state,
        failure,
    })
}

async fn attempt(
    tool: &dyn ToolRunner,
    options: &RefreshOptions,
) -> Result<Option<RunFailure>, SpawnError> {
    if options.preflight && !has_collection(tool).await? {
        return Ok(Some(RunFailure::NoCollection));
    }
    Ok(update_and_embed(tool).await?.map(RunFailure::Subprocess))
}

/// Untracked refresh. Returns the failing step, if any.
pub async fn run_sync(tool: &dyn ToolRunner) -> Result<Option<ToolFailure>, RefreshError> {
    let failure = update_and_embed(tool).await?;
    match &failure {
        None => log::info!("[QMD_SYNC] Full QMD index update and embed completed"),
        Some(f) => log::error!("[QMD_SYNC] QMD update/embed failed: {}", f.describe()),
    }
    Ok(failure)
}

/// Run each pipeline step in order, stopping at the first non-zero exit.
async fn update_and_embed(tool: &dyn ToolRunner) -> Result<Option<ToolFailure>, SpawnError> {
    for step in PIPELINE {
        let result = tool.run(step).await?;
        let command = format!("{} {}", tool.name(), step.join(" "));

        if !result.success() {
            return Ok(Some(ToolFailure { command, result }));
        }
        log::debug!("[QMD_REFRESH] '{}' finished", command);
    }
    Ok(None)
}

/// Whether qmd reports at least one registered collection.
async fn has_collection(tool: &dyn ToolRunner) -> Result<bool, SpawnError> {
    let result = tool.run(&["collection", "list"]).await?;

    let combined = format!("{}{}", result.stdout, result.stderr).to_lowercase();
    if combined.contains("no collections") || !result.success() {
        return Ok(false);
    }
    Ok(!result.stdout.trim().is_empty())
}
