use console::{style, Style};

use crate::backup::BackupManifest;
use crate::state::{StepOutcome, StepResult};
use crate::store::{DeploymentHistory, DeploymentRecord, RollbackEntry, SyncStats};
use crate::sync::SyncReport;
use crate::types::RunStatus;
use crate::workflow::PipelineOutcome;

pub struct Display;

impl Default for Display {
    fn default() -> Self {
        Self::new()
    }
}

impl Display {
    pub fn new() -> Self {
        Self
    }

    pub fn print_header(&self, text: &str) {
        println!();
        println!("{}", style(text).bold().cyan());
        println!("{}", style("═".repeat(60)).dim());
        println!();
    }

    pub fn print_success(&self, message: &str) {
        println!("{} {}", style("✓").green().bold(), message);
    }

    pub fn print_error(&self, message: &str) {
        eprintln!("{} {}", style("✗").red().bold(), message);
    }

    pub fn print_warning(&self, message: &str) {
        println!("{} {}", style("!").yellow().bold(), message);
    }

    pub fn print_info(&self, message: &str) {
        println!("{} {}", style("→").cyan(), message);
    }

    fn status_style(&self, status: RunStatus) -> Style {
        match status {
            RunStatus::Completed => Style::new().green(),
            RunStatus::Failed => Style::new().red(),
            RunStatus::Running => Style::new().yellow(),
            RunStatus::Idle => Style::new().dim(),
        }
    }

    pub fn print_step(&self, step: &StepResult) {
        let duration = step
            .duration_ms
            .map(|ms| format!("{}ms", ms))
            .unwrap_or_default();
        match &step.outcome {
            StepOutcome::Completed { output } => {
                let note = if output.get("skipped").and_then(|v| v.as_bool()) == Some(true) {
                    style(" (skipped)").yellow().to_string()
                } else {
                    String::new()
                };
                println!(
                    "  {} {:<16} {}{}",
                    style("✓").green(),
                    step.name,
                    style(duration).dim(),
                    note
                );
            }
            StepOutcome::Failed { error } => {
                println!(
                    "  {} {:<16} {}",
                    style("✗").red(),
                    step.name,
                    style(duration).dim()
                );
                println!("      {}", style(error).red());
            }
            StepOutcome::Running => {
                println!("  {} {:<16}", style("…").yellow(), step.name);
            }
        }
    }

    pub fn print_outcome(&self, outcome: &PipelineOutcome) {
        let state = &outcome.state;
        self.print_header(&format!("Deployment: {}", state.environment));

        for step in &state.steps {
            self.print_step(step);
        }
        println!();

        for warning in &state.warnings {
            self.print_warning(warning);
        }
        if let Some(rollback) = &outcome.rollback {
            self.print_rollback(rollback);
        }

        let status = self.status_style(state.status).apply_to(state.status.to_string());
        println!(
            "Status: {}  Duration: {}ms  Record: {}",
            status,
            outcome.record.duration_ms,
            style(&outcome.record.id).dim()
        );
        for error in &state.errors {
            self.print_error(error);
        }
    }

    fn print_record_line(&self, record: &DeploymentRecord) {
        let mark = if record.success {
            style("✓").green()
        } else {
            style("✗").red()
        };
        println!(
            "  {} {}  {:<12} {:>8}ms  {}",
            mark,
            record.timestamp.format("%Y-%m-%d %H:%M:%S"),
            record.environment,
            record.duration_ms,
            style(record.error.as_deref().unwrap_or("")).dim()
        );
    }

    fn print_rollback(&self, entry: &RollbackEntry) {
        if entry.result.is_success() {
            self.print_warning(&format!(
                "rolled back at {}: {}",
                entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                entry.reason
            ));
        } else {
            self.print_error(&format!(
                "rollback failed at {}: {}",
                entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                entry.reason
            ));
        }
    }

    pub fn print_history(&self, history: &DeploymentHistory, limit: usize) {
        self.print_header("Deployment Status");

        match &history.last_deployment {
            Some(last) => {
                println!("{}", style("Last deployment:").bold());
                self.print_record_line(last);
                for step in &last.steps {
                    self.print_step(step);
                }
            }
            None => self.print_info("No deployments recorded yet"),
        }
        println!();

        if history.deployments.len() > 1 {
            println!("{}", style("Recent:").bold());
            for record in history.recent(limit) {
                self.print_record_line(record);
            }
            println!();
        }

        if !history.rollbacks.is_empty() {
            println!("{}", style("Rollbacks:").bold());
            for entry in history.rollbacks.iter().rev().take(limit) {
                self.print_rollback(entry);
            }
            println!();
        }
    }

    pub fn print_sync_stats(&self, stats: &SyncStats) {
        self.print_header("Automation Status");
        println!("Total syncs:      {}", stats.total_syncs);
        println!(
            "Successful:       {}",
            style(stats.successful_syncs).green()
        );
        println!("Errors:           {}", style(stats.errors).red());
        match stats.last_sync {
            Some(at) => println!("Last sync:        {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
            None => println!("Last sync:        {}", style("never").dim()),
        }
        if let Some(error) = &stats.last_error {
            println!("Last error:       {}", style(error).red());
        }
        println!();
    }

    pub fn print_sync_report(&self, report: &SyncReport) {
        println!(
            "{} {} ({}ms)",
            style("Sync report").bold(),
            report.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            report.duration_ms
        );
        for (name, result) in &report.results {
            if result.success {
                println!("  {} {}", style("✓").green(), name);
            } else {
                println!(
                    "  {} {:<10} {}",
                    style("✗").red(),
                    name,
                    style(result.error.as_deref().unwrap_or("")).red()
                );
            }
        }
        println!(
            "  {}/{} sub-syncs succeeded",
            report.summary.successful, report.summary.total
        );
        println!();
    }

    pub fn print_backup(&self, manifest: &BackupManifest) {
        self.print_success(&format!(
            "backup {} ({} files) in {}",
            manifest.id,
            manifest.files.len(),
            manifest.directory.display()
        ));
        for missing in &manifest.missing {
            self.print_warning(&format!("not found: {}", missing.display()));
        }
    }

    pub fn print_latest_backup(&self, manifest: &BackupManifest) {
        self.print_info(&format!(
            "last backup {} at {} ({} files)",
            manifest.id,
            manifest.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            manifest.files.len()
        ));
    }
}
