//! Shared types for the qmd refresh jobs and the healthcheck that watches them.

use serde::{Deserialize, Serialize};

/// Job tracked when nothing else is configured. Its state file keeps the
/// historical `refresh_state.json` name.
pub const DEFAULT_JOB: &str = "refresh";

// =====================================================
// Run State
// =====================================================

/// Persisted run state for a single job.
///
/// Fields missing from an older record fall back to their defaults, so a file
/// written before `last_error` existed still loads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshState {
    /// Consecutive failures since the last successful run
    #[serde(default)]
    pub failures: u32,
    #[serde(default)]
    pub last_success: Option<String>,
    #[serde(default)]
    pub last_failure: Option<String>,
    /// Short description of the most recent failure
    #[serde(default)]
    pub last_error: Option<String>,
}

impl RefreshState {
    /// Mark a successful run: the failure streak ends and the error clears.
    pub fn record_success(&mut self, at: impl Into<String>) {
        self.failures = 0;
        self.last_success = Some(at.into());
        self.last_error = None;
    }

    /// Mark a failed run, extending the current streak by one.
    pub fn record_failure(&mut self, at: impl Into<String>, error: impl Into<String>) {
        self.failures = self.failures.saturating_add(1);
        self.last_failure = Some(at.into());
        self.last_error = Some(error.into());
    }

    pub fn is_alerting(&self, threshold: u32) -> bool {
        self.failures >= threshold
    }
}

/// Returns true if `name` can be used as a job identifier (and therefore as
/// part of a state file name).
pub fn is_valid_job_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
