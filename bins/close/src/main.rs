//! Monthend close CLI
//!
//! Runs, reviews and reopens month-end closes. Every command prints JSON to
//! stdout and exits 0 (closed), 1 (needs review or a rerun) or 2 (fatal
//! configuration or input error).

mod outbox;
mod store;

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use monthend_core::close::{CloseError, CloseRegistry, ExitStatus, ReviewOutcome};
use monthend_core::pipeline::{CloseRunError, CloseRunner, RunSummary};
use monthend_core::policy::ClosePolicy;
use monthend_core::posting::RetryPolicy;
use monthend_core::records::{JsonRecordsAdapter, SourceAdapter};
use monthend_shared::config::load_document;
use monthend_shared::types::{AccountingPeriod, ApproverId, DiscrepancyId, SourceSystem};
use monthend_shared::{AppConfig, AppError};

use crate::outbox::OutboxGateway;
use crate::store::StateStore;

#[derive(Parser)]
#[command(name = "monthend")]
#[command(about = "Month-end close: reconcile, review, generate and post", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run (or resume) the close for a period
    Run {
        /// Period to close (YYYY-MM)
        #[arg(long)]
        period: AccountingPeriod,

        /// Source records as SOURCE=FILE, e.g. ledger_actuals=ledger.json
        #[arg(long = "records", required = true, value_parser = parse_records_arg)]
        records: Vec<(SourceSystem, PathBuf)>,

        /// Close policy document (TOML, JSON or YAML)
        #[arg(long)]
        policy: PathBuf,
    },

    /// Approve a discrepancy awaiting review
    Approve {
        /// Period (YYYY-MM)
        #[arg(long)]
        period: AccountingPeriod,

        /// Discrepancy id
        #[arg(long)]
        discrepancy: DiscrepancyId,

        /// Approver id
        #[arg(long)]
        approver: ApproverId,
    },

    /// Decline a discrepancy; fails the close
    Decline {
        /// Period (YYYY-MM)
        #[arg(long)]
        period: AccountingPeriod,

        /// Discrepancy id
        #[arg(long)]
        discrepancy: DiscrepancyId,

        /// Approver id
        #[arg(long)]
        approver: ApproverId,

        /// Why the discrepancy is declined
        #[arg(long)]
        reason: String,
    },

    /// Reopen a closed period as a new version
    Reopen {
        /// Period (YYYY-MM)
        #[arg(long)]
        period: AccountingPeriod,

        /// Who reopens the period
        #[arg(long)]
        actor: ApproverId,

        /// Why the period is reopened
        #[arg(long)]
        reason: String,
    },

    /// Abandon an interrupted run; nothing from it will post
    Abandon {
        /// Period (YYYY-MM)
        #[arg(long)]
        period: AccountingPeriod,

        /// Why the run is abandoned
        #[arg(long)]
        reason: String,
    },

    /// Print the current state of a period
    Status {
        /// Period (YYYY-MM)
        #[arg(long)]
        period: AccountingPeriod,
    },
}

fn parse_records_arg(raw: &str) -> Result<(SourceSystem, PathBuf), String> {
    let (source, path) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected SOURCE=FILE, got '{raw}'"))?;
    let source =
        SourceSystem::parse(source.trim()).ok_or_else(|| format!("unknown source '{source}'"))?;
    Ok((source, PathBuf::from(path.trim())))
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Logs go to stderr; stdout carries the JSON result
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "monthend=info,monthend_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let status = match execute(cli).await {
        Ok(status) => status,
        Err(err) => {
            let status = classify(&err);
            error!(exit_code = status.code(), "{err:#}");
            status
        }
    };
    ExitCode::from(u8::try_from(status.code()).unwrap_or(2))
}

/// Maps a command error to its exit status.
fn classify(err: &anyhow::Error) -> ExitStatus {
    if let Some(err) = err.downcast_ref::<CloseRunError>() {
        return err.exit_status();
    }
    if let Some(err) = err.downcast_ref::<CloseError>() {
        return err.exit_status();
    }
    ExitStatus::Fatal
}

async fn execute(cli: Cli) -> anyhow::Result<ExitStatus> {
    let config = AppConfig::load().map_err(AppError::from)?;
    let store = StateStore::new(&config.close.state_dir);
    let now = Utc::now();

    let status = match cli.cmd {
        Commands::Run {
            period,
            records,
            policy,
        } => {
            let policy: ClosePolicy = load_document(&policy)
                .map_err(AppError::from)
                .with_context(|| format!("loading policy {}", policy.display()))?;
            let adapters = read_adapters(&records)?;
            let adapters: Vec<&dyn SourceAdapter> =
                adapters.iter().map(|a| a as &dyn SourceAdapter).collect();

            let runner = CloseRunner::new(
                policy,
                config.close.precision()?,
                config.close.required_sources.clone(),
                OutboxGateway::new(&config.close.outbox_dir),
                RetryPolicy::from(&config.posting),
            )?;
            let summary = run_close(&store, runner, period, &adapters).await?;
            info!(period = %period, status = %summary.status, "Run finished");
            report(&summary)?
        }
        Commands::Approve {
            period,
            discrepancy,
            approver,
        } => {
            let outcome = store
                .update(move |registry| {
                    registry
                        .approve(period, discrepancy, approver, now)
                        .map_err(anyhow::Error::from)
                })
                .await?;
            print_json(&outcome)?;
            match outcome {
                ReviewOutcome::Accepted { .. } => ExitStatus::Closed,
                ReviewOutcome::Rejected { .. } => ExitStatus::Fatal,
            }
        }
        Commands::Decline {
            period,
            discrepancy,
            approver,
            reason,
        } => {
            let summary = store
                .update(move |registry| {
                    registry.decline(period, discrepancy, approver, &reason, now)?;
                    Ok::<_, anyhow::Error>(summary_of(registry, period)?)
                })
                .await?;
            report(&summary)?
        }
        Commands::Reopen {
            period,
            actor,
            reason,
        } => {
            let context = store
                .update(move |registry| {
                    registry
                        .reopen(period, actor, &reason, now)
                        .map_err(anyhow::Error::from)
                })
                .await?;
            print_json(&serde_json::json!({ "reopened": context }))?;
            ExitStatus::Closed
        }
        Commands::Abandon { period, reason } => {
            let summary = store
                .update(move |registry| {
                    registry
                        .active_mut(period)
                        .ok_or(CloseError::UnknownPeriod { period })?
                        .abandon(&reason)?;
                    Ok::<_, anyhow::Error>(summary_of(registry, period)?)
                })
                .await?;
            report(&summary)?
        }
        Commands::Status { period } => {
            let registry = store.load().await?;
            report(&summary_of(&registry, period)?)?;
            ExitStatus::Closed
        }
    };
    Ok(status)
}

/// Runs `period` under its run lock, publishing progress to the store as
/// the run goes.
async fn run_close(
    store: &StateStore,
    runner: CloseRunner<OutboxGateway>,
    period: AccountingPeriod,
    adapters: &[&dyn SourceAdapter],
) -> anyhow::Result<RunSummary> {
    let Some(_run_lock) = store.lock_run(period)? else {
        return Err(CloseRunError::from(CloseError::RunInProgress { period }).into());
    };
    let mut registry = store
        .update(move |registry| {
            abandon_interrupted_run(registry, period)?;
            Ok::<_, anyhow::Error>(registry.clone())
        })
        .await?;
    let runner = runner.with_checkpoint(Arc::new(store.clone()));
    Ok(runner.run(&mut registry, period, adapters).await?)
}

/// Abandons a run whose process died while attached.
///
/// Only called under the period's run lock, so no live process owns it.
fn abandon_interrupted_run(
    registry: &mut CloseRegistry,
    period: AccountingPeriod,
) -> Result<(), CloseError> {
    let Some(close) = registry.active_mut(period) else {
        return Ok(());
    };
    if let Some(run_id) = close.active_run() {
        warn!(period = %period, run_id = %run_id, "Abandoning run left by an interrupted process");
        close.abandon(&format!("Run {run_id} was interrupted"))?;
    }
    Ok(())
}

fn read_adapters(records: &[(SourceSystem, PathBuf)]) -> anyhow::Result<Vec<JsonRecordsAdapter>> {
    records
        .iter()
        .map(|(source, path)| read_adapter(*source, path))
        .collect()
}

fn read_adapter(source: SourceSystem, path: &Path) -> anyhow::Result<JsonRecordsAdapter> {
    let file = File::open(path)
        .map_err(|e| AppError::Input(format!("{}: {e}", path.display())))?;
    JsonRecordsAdapter::from_reader(source, std::io::BufReader::new(file))
        .map_err(|e| AppError::Input(format!("{}: {e}", path.display())).into())
}

fn summary_of(registry: &CloseRegistry, period: AccountingPeriod) -> Result<RunSummary, CloseError> {
    let close = registry
        .active(period)
        .ok_or(CloseError::UnknownPeriod { period })?;
    Ok(RunSummary::from_close(None, close, None, Vec::new()))
}

/// Prints a period summary and returns its exit status.
fn report(summary: &RunSummary) -> anyhow::Result<ExitStatus> {
    print_json(summary)?;
    Ok(summary.exit_status)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
