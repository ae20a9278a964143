use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "campaign-automation")]
#[command(author, version, about = "Scheduled payment sync, backups and health checks", long_about = None)]
pub struct AutomationCli {
    #[command(subcommand)]
    pub command: AutomationCommand,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to orchestrator.toml (default: ./orchestrator.toml)
    #[arg(long, global = true, env = "CAMPAIGN_ORCHESTRATOR_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum AutomationCommand {
    /// Run the sync, backup and health timers until stopped
    Start,

    /// Ask a running `start` process to stop
    Stop,

    /// Run one full sync now
    Sync,

    /// Show sync statistics and the latest report
    Status,

    /// Take a configuration backup now
    Backup,
}

#[derive(Parser)]
#[command(name = "campaign-deploy")]
#[command(author, version, about = "Run the deployment pipeline for an environment", long_about = None)]
pub struct DeployCli {
    /// Target environment (development, staging, production)
    #[arg(required_unless_present = "status")]
    pub environment: Option<String>,

    /// Leave the test step out
    #[arg(long)]
    pub skip_tests: bool,

    /// Leave the backup step out (disables automatic rollback)
    #[arg(long)]
    pub skip_backup: bool,

    /// Deploy to environments that require approval
    #[arg(long)]
    pub force: bool,

    /// Show the last deployment and recent history instead of deploying
    #[arg(long)]
    pub status: bool,

    #[arg(short, long)]
    pub verbose: bool,

    /// Path to orchestrator.toml (default: ./orchestrator.toml)
    #[arg(long, env = "CAMPAIGN_ORCHESTRATOR_CONFIG")]
    pub config: Option<PathBuf>,
}
