use std::process::ExitCode;

use clap::Parser;

use campaign_orchestrator::backup::BackupManager;
use campaign_orchestrator::cli::{init_logging, load_config, DeployCli, Display};
use campaign_orchestrator::error::{OrchestratorError, Result};
use campaign_orchestrator::health::{HealthVerifier, HttpProbe};
use campaign_orchestrator::process::CommandBackend;
use campaign_orchestrator::store::{DeploymentHistory, StateStore};
use campaign_orchestrator::types::Environment;
use campaign_orchestrator::workflow::{DeploymentPipeline, PipelineOptions};

/// Deployments listed by `--status`.
const STATUS_HISTORY_LIMIT: usize = 10;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = DeployCli::parse();

    init_logging(cli.verbose);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            Display::new().print_error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

/// `Ok(false)` when the pipeline ran and failed.
async fn run(cli: DeployCli) -> Result<bool> {
    let display = Display::new();
    let config = load_config(cli.config.as_deref()).await?;
    let store = StateStore::from_config(&config.state);

    if cli.status {
        let history: DeploymentHistory = store.load().await;
        display.print_history(&history, STATUS_HISTORY_LIMIT);
        return Ok(true);
    }

    let env: Environment = cli
        .environment
        .as_deref()
        .ok_or_else(|| OrchestratorError::Configuration("no environment given".into()))?
        .parse()?;
    let options = PipelineOptions {
        skip_tests: cli.skip_tests,
        skip_backup: cli.skip_backup,
        force: cli.force,
    };

    let backend = CommandBackend::from_config(&config.pipeline.commands);
    let health = HealthVerifier::from_config(HttpProbe::from_config(&config.health)?, &config.health);
    let backups = BackupManager::from_config(&config);
    let pipeline = DeploymentPipeline::new(&backend, &health, &store, &backups, &config);

    display.print_info(&format!("deploying to {}", env));
    let outcome = pipeline.run(env, options).await?;
    display.print_outcome(&outcome);

    if outcome.is_success() {
        display.print_success(&format!("{} deployment complete", env));
    }
    Ok(outcome.is_success())
}
