//! ClawMemory ops: scheduled qmd index refreshes and failure alerting.
//!
//! Each subcommand is a single short-lived run meant to be fired by cron or a
//! systemd timer. Exit code 0 means nothing needs attention; 1 means a failure
//! or an alert-worthy condition was found.

mod alert;
mod config;
mod healthcheck;
mod http;
mod qmd;
mod state;
mod util;

#[cfg(test)]
mod testing;

use clap::Parser;
use clawmemory_types::{is_valid_job_name, DEFAULT_JOB};
use config::{Config, HealthcheckConfig};
use http::ReqwestPoster;
use qmd::refresh::{self, RefreshError, RefreshOptions, RefreshReport, RunFailure};
use qmd::{QmdCli, SpawnError, TOOL_NOT_FOUND_HINT};
use state::StateStore;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "clawmemory", version, about = "Scheduled qmd refreshes and failure alerts")]
enum Cli {
    /// Run `qmd update` and `qmd embed`, recording the outcome for the healthcheck
    Refresh(RefreshArgs),
    /// Run `qmd update` and `qmd embed` without recording state
    Sync,
    /// Alert when a job has failed too many times in a row
    Healthcheck(HealthcheckArgs),
}

#[derive(clap::Args)]
struct RefreshArgs {
    /// Job name; selects the state file `<job>_state.json`
    #[arg(long, default_value = DEFAULT_JOB)]
    job: String,
    /// Skip the check that qmd has at least one collection
    #[arg(long)]
    skip_preflight: bool,
}

#[derive(clap::Args)]
struct HealthcheckArgs {
    /// Consecutive failures before alerting (overrides FAIL_THRESHOLD)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    threshold: Option<u32>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let config = Config::from_env();

    let code = match cli {
        Cli::Refresh(args) => run_refresh(&config, args).await,
        Cli::Sync => run_sync(&config).await,
        Cli::Healthcheck(args) => run_healthcheck(&config, args).await,
    };
    ExitCode::from(code)
}

fn locate_qmd(config: &Config) -> Option<QmdCli> {
    match QmdCli::locate(&config.qmd_bin) {
        Ok(tool) => Some(tool),
        Err(e) => {
            report_missing_tool(&e.to_string());
            None
        }
    }
}

fn report_missing_tool(error: &str) {
    log::error!("[QMD] {}", error);
    eprintln!("{}", TOOL_NOT_FOUND_HINT);
}

async fn run_refresh(config: &Config, args: RefreshArgs) -> u8 {
    if !is_valid_job_name(&args.job) {
        log::error!(
            "[QMD_REFRESH] Invalid job name '{}' (use letters, digits, '-' or '_')",
            args.job
        );
        return 1;
    }

    let Some(tool) = locate_qmd(config) else {
        return 1;
    };
    let store = StateStore::new(&config.state_dir);
    log::debug!("[QMD_REFRESH] State directory: {}", store.dir().display());
    let options = RefreshOptions {
        preflight: config.preflight && !args.skip_preflight,
    };

    let outcome = refresh::run_refresh(&tool, &store, &args.job, &options).await;
    report_refresh_outcome(&outcome);
    refresh_exit_code(&outcome)
}

/// 0 only when the refresh ran and succeeded.
fn refresh_exit_code(outcome: &Result<RefreshReport, RefreshError>) -> u8 {
    match outcome {
        Ok(report) if report.succeeded() => 0,
        _ => 1,
    }
}

fn report_refresh_outcome(outcome: &Result<RefreshReport, RefreshError>) {
    match outcome {
        Ok(RefreshReport {
            state,
            failure: Some(RunFailure::NoCollection),
        }) => {
            log::error!(
                "[QMD_REFRESH] No qmd collection found! (failures: {})",
                state.failures
            );
            eprintln!("{}", refresh::NO_COLLECTION_HINT);
        }
        Ok(_) => {}
        Err(RefreshError::ToolNotFound(program)) => {
            report_missing_tool(&SpawnError::NotFound(program.clone()).to_string());
        }
        Err(e) => log::error!("[QMD_REFRESH] {}", e),
    }
}

async fn run_sync(config: &Config) -> u8 {
    let Some(tool) = locate_qmd(config) else {
        return 1;
    };

    match refresh::run_sync(&tool).await {
        Ok(None) => 0,
        Ok(Some(_)) => 1,
        Err(RefreshError::ToolNotFound(program)) => {
            report_missing_tool(&SpawnError::NotFound(program).to_string());
            1
        }
        Err(e) => {
            log::error!("[QMD_SYNC] {}", e);
            1
        }
    }
}

async fn run_healthcheck(config: &Config, args: HealthcheckArgs) -> u8 {
    let checks = match HealthcheckConfig::from_env() {
        Ok(checks) => checks,
        Err(e) => {
            log::error!("[CONFIG] {}", e);
            return 1;
        }
    };
    let threshold = args.threshold.unwrap_or(checks.fail_threshold);
    let store = StateStore::new(&config.state_dir);

    let http = match ReqwestPoster::new(checks.http_timeout) {
        Ok(http) => http,
        Err(e) => {
            log::error!("[HEALTHCHECK] {}", e);
            return 1;
        }
    };

    match healthcheck::run_healthcheck(
        &store,
        &checks.jobs,
        threshold,
        &checks.alert_backend,
        &http,
    )
    .await
    {
        Ok(report) => {
            if let Some(delivery) = &report.delivery {
                log::debug!("[HEALTHCHECK] Alert delivered: {}", delivery.is_ok());
            }
            report.exit_code()
        }
        Err(e) => {
            log::error!("[HEALTHCHECK] {}", e);
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qmd::refresh::ToolFailure;
    use crate::testing::tool_exit;
    use clap::CommandFactory;
    use clawmemory_types::RefreshState;

    fn report(failure: Option<RunFailure>) -> Result<RefreshReport, RefreshError> {
        Ok(RefreshReport {
            state: RefreshState::default(),
            failure,
        })
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_refresh_args() {
        let Cli::Refresh(args) = Cli::parse_from(["clawmemory", "refresh"]) else {
            panic!("expected refresh");
        };
        assert_eq!(args.job, "refresh");
        assert!(!args.skip_preflight);

        let Cli::Refresh(args) =
            Cli::parse_from(["clawmemory", "refresh", "--job", "daily", "--skip-preflight"])
        else {
            panic!("expected refresh");
        };
        assert_eq!(args.job, "daily");
        assert!(args.skip_preflight);
    }

    #[test]
    fn test_healthcheck_threshold_must_be_positive() {
        assert!(Cli::try_parse_from(["clawmemory", "healthcheck", "--threshold", "0"]).is_err());

        let Cli::Healthcheck(args) =
            Cli::parse_from(["clawmemory", "healthcheck", "--threshold", "3"])
        else {
            panic!("expected healthcheck");
        };
        assert_eq!(args.threshold, Some(3));
    }

    #[test]
    fn test_refresh_exit_codes() {
        assert_eq!(refresh_exit_code(&report(None)), 0);
        assert_eq!(refresh_exit_code(&report(Some(RunFailure::NoCollection))), 1);
        assert_eq!(
            refresh_exit_code(&report(Some(RunFailure::Subprocess(ToolFailure {
                command: "qmd update".to_string(),
                result: tool_exit(1, "boom"),
            })))),
            1
        );
        assert_eq!(
            refresh_exit_code(&report(Some(RunFailure::Spawn(
                "Permission denied".to_string()
            )))),
            1
        );
        assert_eq!(
            refresh_exit_code(&Err(RefreshError::ToolNotFound("qmd".to_string()))),
            1
        );
        assert_eq!(
            refresh_exit_code(&Err(RefreshError::Spawn("exec format error".to_string()))),
            1
        );
    }
}
