use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use actions_medic::config::AppConfig;
use actions_medic::correction::{ChatClient, CorrectionEngine};
use actions_medic::error::AppError;
use actions_medic::shutdown::{cancel_on_shutdown, cancel_pair};
use actions_medic::workflow::{Orchestrator, RemediationOutcome};

#[derive(Parser)]
#[command(
    name = "actions-medic",
    about = "Re-runs a GitHub Actions workflow and proposes an LLM-generated fix when it fails"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Trigger the workflow, wait for it and propose a fix if it fails
    Run,
    /// Fetch the workflow file and save the baseline copy only
    Snapshot,
    /// Ask the model to correct a local workflow file
    Correct {
        /// Workflow file to correct
        #[arg(long)]
        file: PathBuf,
        /// Where to write the correction (stdout when omitted)
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load configuration");
            return ExitCode::from(e.exit_code());
        }
    };

    match cli.command {
        Command::Run => run(config).await,
        Command::Snapshot => match snapshot(config).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => fail(e),
        },
        Command::Correct { file, output } => match correct(config, file, output).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => fail(e),
        },
    }
}

async fn run(config: AppConfig) -> ExitCode {
    tracing::info!(
        repo = %config.repo_full_name(),
        workflow = %config.github.workflow_path,
        git_ref = %config.github.git_ref,
        "Starting remediation attempt"
    );

    let orchestrator = match Orchestrator::from_config(config) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialise clients");
            return ExitCode::from(e.exit_code());
        }
    };

    let (handle, cancel) = cancel_pair();
    cancel_on_shutdown(handle);

    let report = orchestrator.run(&cancel).await;
    match &report.outcome {
        RemediationOutcome::NoFixNeeded { conclusion } => {
            tracing::info!(run_id = ?report.run_id, conclusion = ?conclusion, "Workflow healthy")
        }
        RemediationOutcome::FixProposed { pull_request } => tracing::info!(
            run_id = ?report.run_id,
            pr = pull_request.number,
            url = ?pull_request.html_url,
            "Fix proposed"
        ),
        RemediationOutcome::Aborted { error } => tracing::error!(
            state_trail = ?report.states,
            error = %error,
            "Remediation did not complete"
        ),
    }
    ExitCode::from(report.exit_code())
}

async fn snapshot(config: AppConfig) -> anyhow::Result<()> {
    let orchestrator = Orchestrator::from_config(config)?;
    let document = orchestrator.snapshot_only().await?;
    let path = document
        .backup_path
        .as_deref()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    println!("{path}");
    Ok(())
}

async fn correct(config: AppConfig, file: PathBuf, output: Option<PathBuf>) -> anyhow::Result<()> {
    let text = tokio::fs::read_to_string(&file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;

    let backend = Arc::new(ChatClient::new(&config.llm)?);
    let engine = CorrectionEngine::new(backend, &config.llm);
    let corrected = engine.correct(&text).await?;

    match output {
        Some(path) => {
            tokio::fs::write(&path, &corrected)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), "Correction written");
        }
        None => print!("{corrected}"),
    }
    Ok(())
}

fn fail(error: anyhow::Error) -> ExitCode {
    tracing::error!(error = %format!("{error:#}"), "Command failed");
    let code = error
        .downcast_ref::<AppError>()
        .map(AppError::exit_code)
        .unwrap_or(1);
    ExitCode::from(code)
}
