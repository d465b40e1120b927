use crate::alert::{AlertBackend, TeamsConfig, WebhookConfig};
use clawmemory_types::{is_valid_job_name, DEFAULT_JOB};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_STATE_DIR: &str = "~/.clawmemory";
const DEFAULT_QMD_BIN: &str = "qmd";
const DEFAULT_FAIL_THRESHOLD: u32 = 2;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Settings every command needs, read once at start-up.
#[derive(Debug, Clone)]
pub struct Config {
    pub state_dir: PathBuf,
    pub qmd_bin: String,
    pub preflight: bool,
}

/// Settings only the healthcheck reads. Parsed when that command runs, so a
/// bad alert variable cannot stop a refresh from being recorded.
#[derive(Debug, Clone)]
pub struct HealthcheckConfig {
    /// Jobs the healthcheck watches
    pub jobs: Vec<String>,
    pub fail_threshold: u32,
    pub http_timeout: Duration,
    pub alert_backend: AlertBackend,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| non_blank(&lookup, key);

        Self {
            state_dir: expand_home(
                &var("CLAWMEMORY_STATE_DIR").unwrap_or_else(|| DEFAULT_STATE_DIR.to_string()),
                var("HOME"),
            ),
            qmd_bin: var("CLAWMEMORY_QMD_BIN").unwrap_or_else(|| DEFAULT_QMD_BIN.to_string()),
            preflight: !var("CLAWMEMORY_SKIP_PREFLIGHT")
                .map(|v| is_truthy(&v))
                .unwrap_or(false),
        }
    }
}

impl HealthcheckConfig {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| non_blank(&lookup, key);

        let jobs = match var("CLAWMEMORY_JOBS") {
            Some(raw) => parse_jobs(&raw)?,
            None => vec![DEFAULT_JOB.to_string()],
        };

        let fail_threshold = match var("FAIL_THRESHOLD") {
            Some(raw) => parse_positive(&raw, "FAIL_THRESHOLD")? as u32,
            None => DEFAULT_FAIL_THRESHOLD,
        };

        let http_timeout = match var("ALERT_HTTP_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(parse_positive(&raw, "ALERT_HTTP_TIMEOUT_SECS")?),
            None => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        };

        let alert_backend = AlertBackend::select(
            var("ALERT_BACKEND").as_deref(),
            WebhookConfig {
                url: var("ALERT_WEBHOOK_URL"),
            },
            TeamsConfig {
                tenant_id: var("TEAM_TENANT_ID"),
                client_id: var("TEAM_CLIENT_ID"),
                client_secret: var("TEAM_CLIENT_SECRET"),
                refresh_token: var("TEAM_REFRESH_TOKEN"),
                team_id: var("TEAM_ID"),
                channel_id: var("TEAM_CHANNEL_ID"),
            },
        );

        Ok(Self {
            jobs,
            fail_threshold,
            http_timeout,
            alert_backend,
        })
    }
}

fn non_blank<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn expand_home(path: &str, home: Option<String>) -> PathBuf {
    match (path.strip_prefix('~'), home) {
        (Some(""), Some(home)) => PathBuf::from(home),
        (Some(rest), Some(home)) if rest.starts_with('/') => {
            PathBuf::from(home).join(rest.trim_start_matches('/'))
        }
        _ => PathBuf::from(path),
    }
}

fn parse_jobs(raw: &str) -> Result<Vec<String>, String> {
    let mut jobs: Vec<String> = Vec::new();
    for job in raw.split(',').map(str::trim).filter(|j| !j.is_empty()) {
        if !is_valid_job_name(job) {
            return Err(format!(
                "CLAWMEMORY_JOBS: invalid job name '{}' (use letters, digits, '-' or '_')",
                job
            ));
        }
        if !jobs.iter().any(|j| j == job) {
            jobs.push(job.to_string());
        }
    }

    if jobs.is_empty() {
        jobs.push(DEFAULT_JOB.to_string());
    }
    Ok(jobs)
}

fn parse_positive(raw: &str, name: &str) -> Result<u64, String> {
    match raw.parse::<u64>() {
        Ok(0) => Err(format!("{} must be greater than zero", name)),
        Ok(n) if n <= u32::MAX as u64 => Ok(n),
        _ => Err(format!("{} must be a positive integer, got '{}'", name, raw)),
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
