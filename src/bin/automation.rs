use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use campaign_orchestrator::backup::BackupManager;
use campaign_orchestrator::cli::{
    init_logging, load_config, AutomationCli, AutomationCommand, Display, StopSignal,
};
use campaign_orchestrator::config::OrchestratorConfig;
use campaign_orchestrator::error::Result;
use campaign_orchestrator::health::{HealthVerifier, HttpProbe};
use campaign_orchestrator::provider::ProviderBackend;
use campaign_orchestrator::scheduler::{Schedule, Scheduler};
use campaign_orchestrator::store::{StateStore, SyncStats};
use campaign_orchestrator::sync::{SyncOrchestrator, SyncReport};

/// How often a running scheduler looks for a stop request.
const STOP_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> ExitCode {
    let cli = AutomationCli::parse();

    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            Display::new().print_error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: AutomationCli) -> Result<()> {
    let display = Display::new();
    let config = load_config(cli.config.as_deref()).await?;
    let store = StateStore::from_config(&config.state);

    match cli.command {
        AutomationCommand::Start => cmd_start(&display, &config, store).await,
        AutomationCommand::Stop => cmd_stop(&display, &store).await,
        AutomationCommand::Sync => cmd_sync(&display, &config, store).await,
        AutomationCommand::Status => cmd_status(&display, &config, &store).await,
        AutomationCommand::Backup => cmd_backup(&display, &config).await,
    }
}

/// Health target for the heartbeat: the explicit pre-flight URL, else
/// the production site.
fn health_target(config: &OrchestratorConfig) -> String {
    config.pipeline.preflight_url.clone().unwrap_or_else(|| {
        config
            .environments
            .production
            .health_url(&config.health.path)
    })
}

async fn cmd_start(display: &Display, config: &OrchestratorConfig, store: StateStore) -> Result<()> {
    let stop = StopSignal::new(store.state_dir());
    if stop.clear().await? {
        info!("cleared stale stop request");
    }

    let backend = ProviderBackend::from_config(&config.provider)?;
    let sync = Arc::new(SyncOrchestrator::new(backend, store));
    let health = HealthVerifier::from_config(HttpProbe::from_config(&config.health)?, &config.health);
    let mut scheduler = Scheduler::new(
        sync,
        BackupManager::from_config(config),
        health,
        Some(health_target(config)),
        Schedule::from(&config.schedule),
    );

    scheduler.initialize().await;
    scheduler.start()?;
    display.print_success("automation started; `campaign-automation stop` or Ctrl-C to stop");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("interrupt received"),
        _ = stop.wait(STOP_POLL_INTERVAL) => info!("stop request received"),
    }

    scheduler.stop().await;
    display.print_sync_stats(&scheduler.sync().stats());
    display.print_success("automation stopped");
    Ok(())
}

async fn cmd_stop(display: &Display, store: &StateStore) -> Result<()> {
    let stop = StopSignal::new(store.state_dir());
    stop.request().await?;
    display.print_info(&format!(
        "stop requested ({}); a running scheduler exits within {}s",
        stop.path().display(),
        STOP_POLL_INTERVAL.as_secs()
    ));
    Ok(())
}

async fn cmd_sync(display: &Display, config: &OrchestratorConfig, store: StateStore) -> Result<()> {
    let backend = ProviderBackend::from_config(&config.provider)?;
    let sync = SyncOrchestrator::load(backend, store).await;

    let report = sync.run_full_sync().await?;
    display.print_sync_report(&report);
    if report.summary.failed > 0 {
        display.print_warning(&format!(
            "{} of {} sub-syncs failed",
            report.summary.failed, report.summary.total
        ));
    } else {
        display.print_success("sync complete");
    }
    Ok(())
}

async fn cmd_status(display: &Display, config: &OrchestratorConfig, store: &StateStore) -> Result<()> {
    let stats: SyncStats = store.load().await;
    display.print_sync_stats(&stats);

    match store.latest_report::<SyncReport>().await {
        Some(report) => display.print_sync_report(&report),
        None => display.print_info("no sync reports yet"),
    }

    match BackupManager::from_config(config).latest().await {
        Some(manifest) => display.print_latest_backup(&manifest),
        None => display.print_info("no backups yet"),
    }

    if StopSignal::new(store.state_dir()).is_requested().await {
        display.print_warning("a stop request is pending");
    }
    Ok(())
}

async fn cmd_backup(display: &Display, config: &OrchestratorConfig) -> Result<()> {
    let manifest = BackupManager::from_config(config).create_backup().await?;
    display.print_backup(&manifest);
    Ok(())
}
