//! lavado-batch - batch analysis CLI
//!
//! Drives one batch analysis end-to-end against the portal backend:
//! validate, price, confirm, submit, poll, and write the risk report.

use anyhow::{bail, Context, Result};
use clap::Parser;
use lavado_batch::config::BatchConfig;
use lavado_batch::events::AnalysisEvent;
use lavado_batch::models::{OrchestratorState, UploadedFile};
use lavado_batch::services::{BillingClient, ResultClient, SubmissionClient, ValidationClient};
use lavado_batch::BatchOrchestrator;
use lavado_common::config::TomlConfig;
use std::io::Write;
use std::path::PathBuf;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "lavado-batch",
    version,
    about = "Submit a transaction batch for risk analysis"
)]
struct Cli {
    /// Transaction batch file (CSV or Excel)
    file: PathBuf,

    /// TOML config path (defaults to the platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Analysis backend base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Bearer token for the analysis backend
    #[arg(long)]
    auth_token: Option<String>,

    /// Where to write the report (defaults to <file>.report)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Submit without asking for confirmation
    #[arg(short = 'y', long)]
    assume_yes: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let toml_config = TomlConfig::load(cli.config.as_deref())?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(toml_config.logging.level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting lavado-batch");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = BatchConfig::resolve(
        cli.base_url.as_deref(),
        cli.auth_token.as_deref(),
        &toml_config,
    )?;
    info!("Backend: {}", config.base_url);

    let http = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()
        .context("Failed to build HTTP client")?;

    let (event_tx, event_rx) = broadcast::channel(100);
    tokio::spawn(render_events(event_rx));

    let mut orchestrator = BatchOrchestrator::new(
        ValidationClient::new(http.clone(), &config),
        SubmissionClient::new(http.clone(), &config, event_tx.clone()),
        BillingClient::new(http.clone(), &config),
        ResultClient::new(http, &config),
        &config,
        event_tx,
    );

    let file = UploadedFile::from_path(&cli.file)?;
    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| cli.file.with_extension("report"));

    orchestrator
        .select_file(file)
        .await
        .context("File validation failed")?;

    print_estimate(&orchestrator);

    if let Some(block) = orchestrator.submission_block() {
        bail!("Cannot submit: {}", block);
    }

    if !cli.assume_yes && !confirm(&orchestrator)? {
        info!("Submission declined by user");
        return Ok(());
    }

    orchestrator.submit().await.context("Submission failed")?;
    orchestrator
        .wait_for_result()
        .await
        .context("Analysis did not complete")?;

    let payload = match orchestrator.state() {
        OrchestratorState::Results { result } => result.payload.clone(),
        _ => bail!("Workflow finished in an unexpected state"),
    };

    tokio::fs::write(&output, &payload)
        .await
        .with_context(|| format!("Failed to write report to {}", output.display()))?;
    info!("Report written to {}", output.display());

    Ok(())
}

/// Print the tier breakdown and balance for the validated batch.
fn print_estimate<V, S, B, R>(orchestrator: &BatchOrchestrator<V, S, B, R>)
where
    V: lavado_batch::services::ValidateFile,
    S: lavado_batch::services::SubmitAnalysis,
    B: lavado_batch::services::FetchBalance,
    R: lavado_batch::services::FetchResult,
{
    if let OrchestratorState::Validated { estimate, .. } = orchestrator.state() {
        info!(
            "Estimated cost for {} transactions:",
            estimate.transaction_count
        );
        for line in &estimate.tier_breakdown {
            info!(
                "  {}: {} x {} = {}",
                line.label, line.unit_count, line.unit_price, line.subtotal
            );
        }
        info!("  Total: {}", estimate.total_cost);
    }
    match orchestrator.balance() {
        Some(balance) => info!("Account balance: {}", balance),
        None => warn!("Account balance unavailable"),
    }
}

/// Ask the user to confirm submission at the estimated price.
fn confirm<V, S, B, R>(orchestrator: &BatchOrchestrator<V, S, B, R>) -> Result<bool>
where
    V: lavado_batch::services::ValidateFile,
    S: lavado_batch::services::SubmitAnalysis,
    B: lavado_batch::services::FetchBalance,
    R: lavado_batch::services::FetchResult,
{
    if let OrchestratorState::Validated { estimate, .. } = orchestrator.state() {
        print!("Submit for {}? [y/N] ", estimate.total_cost);
        std::io::stdout().flush()?;
        let mut answer = String::new();
        std::io::stdin().read_line(&mut answer)?;
        Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
    } else {
        Ok(false)
    }
}

/// Render workflow events as log lines.
async fn render_events(mut rx: broadcast::Receiver<AnalysisEvent>) {
    loop {
        match rx.recv().await {
            Ok(AnalysisEvent::SessionStarted { file_name, .. }) => {
                info!("Session started for {}", file_name);
            }
            Ok(AnalysisEvent::FileValidated {
                row_count,
                column_count,
                ..
            }) => {
                info!("Validated: {} rows, {} columns", row_count, column_count);
            }
            Ok(AnalysisEvent::CostEstimated { total_cost, .. }) => {
                info!("Estimated cost: {}", total_cost);
            }
            Ok(AnalysisEvent::UploadProgress { percent, .. }) => {
                if percent % 10 == 0 || percent == 100 {
                    info!("Upload: {}%", percent);
                }
            }
            Ok(AnalysisEvent::JobSubmitted { job_id, .. }) => {
                info!("Job accepted: {}", job_id);
            }
            Ok(AnalysisEvent::StageChanged {
                stage,
                progress_percent,
                ..
            }) => {
                info!("[{:>3}%] {}", progress_percent, stage.label());
            }
            Ok(AnalysisEvent::AnalysisCompleted { job_id, .. }) => {
                info!("Analysis complete: {}", job_id);
            }
            Ok(AnalysisEvent::AnalysisFailed { error, .. }) => {
                warn!("Analysis failed: {}", error);
            }
            Ok(AnalysisEvent::SessionReset { reason, .. }) => {
                info!("Session reset: {}", reason);
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Event renderer lagged, skipped {} events", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
