//! Failure-threshold healthcheck over the jobs' run state.
//!
//! All jobs at or above the threshold are folded into a single alert so one
//! pass costs at most one delivery (and one Teams token exchange).

use crate::alert::{AlertBackend, AlertError};
use crate::http::HttpPoster;
use crate::state::{StateError, StateStore};
use clawmemory_types::RefreshState;

/// One job that has reached the failure threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobAlert {
    pub job: String,
    pub failures: u32,
    pub last_failure: Option<String>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    /// No job has ever written state.
    NoState,
    /// Every job with state is below the threshold: `(job, failures)`.
    Healthy { jobs: Vec<(String, u32)> },
    Alerting { alerts: Vec<JobAlert> },
}

impl Evaluation {
    pub fn is_alerting(&self) -> bool {
        matches!(self, Evaluation::Alerting { .. })
    }

    /// 1 when an alert-worthy condition was found, whatever became of the alert.
    pub fn exit_code(&self) -> u8 {
        if self.is_alerting() { 1 } else { 0 }
    }
}

/// Decide whether any job needs an alert. Jobs without state are skipped.
pub fn evaluate(jobs: &[(String, Option<RefreshState>)], threshold: u32) -> Evaluation {
    let tracked: Vec<(&String, &RefreshState)> = jobs
        .iter()
        .filter_map(|(job, state)| state.as_ref().map(|s| (job, s)))
        .collect();

    if tracked.is_empty() {
        return Evaluation::NoState;
    }

    let alerts: Vec<JobAlert> = tracked
        .iter()
        .filter(|(_, state)| state.is_alerting(threshold))
        .map(|(job, state)| JobAlert {
            job: job.to_string(),
            failures: state.failures,
            last_failure: state.last_failure.clone(),
            last_error: state.last_error.clone(),
        })
        .collect();

    if alerts.is_empty() {
        Evaluation::Healthy {
            jobs: tracked
                .iter()
                .map(|(job, state)| (job.to_string(), state.failures))
                .collect(),
        }
    } else {
        Evaluation::Alerting { alerts }
    }
}

/// Human-readable alert text covering every alerting job.
pub fn build_message(alerts: &[JobAlert]) -> String {
    let mut message = String::from("⚠️ **ClawMemory Alert**\n");

    for alert in alerts {
        message.push_str(&format!(
            "QMD job '{}' failed {} times consecutively.\n",
            alert.job, alert.failures
        ));
        message.push_str(&format!(
            "Last failure: {}\n",
            alert.last_failure.as_deref().unwrap_or("unknown")
        ));
        message.push_str(&format!(
            "Last error: {}\n",
            alert.last_error.as_deref().unwrap_or("unknown")
        ));
        message.push('\n');
    }

    message.push_str("Please check logs and run manually.");
    message
}

#[derive(Debug)]
pub struct HealthcheckReport {
    pub evaluation: Evaluation,
    /// Present only when an alert was attempted.
    pub delivery: Option<Result<(), AlertError>>,
}

impl HealthcheckReport {
    pub fn exit_code(&self) -> u8 {
        self.evaluation.exit_code()
    }
}

/// Load every job's state, evaluate, and send at most one alert.
///
/// A corrupt state file aborts the check before anything is sent.
pub async fn run_healthcheck(
    store: &StateStore,
    jobs: &[String],
    threshold: u32,
    backend: &AlertBackend,
    http: &dyn HttpPoster,
) -> Result<HealthcheckReport, StateError> {
    let mut states = Vec::with_capacity(jobs.len());
    for job in jobs {
        states.push((job.clone(), store.load(job)?));
    }

    let evaluation = evaluate(&states, threshold);

    let delivery = match &evaluation {
        Evaluation::NoState => {
            log::info!("[HEALTHCHECK] No state file found, skipping healthcheck");
            None
        }
        Evaluation::Healthy { jobs } => {
            for (job, failures) in jobs {
                log::info!(
                    "[HEALTHCHECK] Healthcheck passed for '{}' (failures: {}/{})",
                    job,
                    failures,
                    threshold
                );
            }
            None
        }
        Evaluation::Alerting { alerts } => {
            log::warn!(
                "[HEALTHCHECK] {} job(s) at or above {} consecutive failures, alerting via {}",
                alerts.len(),
                threshold,
                backend
            );
            let result = backend.send(http, &build_message(alerts)).await;
            match &result {
                Ok(()) => {}
                Err(e @ AlertError::NotConfigured(_)) => log::warn!("[ALERT] {}", e),
                Err(e) => log::error!("[ALERT] {}", e),
            }
            Some(result)
        }
    };

    Ok(HealthcheckReport {
        evaluation,
        delivery,
    })
}
