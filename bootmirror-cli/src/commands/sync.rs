//! `bootmirror sync`: a single reconciliation pass.

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use bootmirror_core::Config;
use bootmirror_sync::ReconcileReport;

/// Arguments for `bootmirror sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Emit the reconciliation report as JSON.
    #[arg(long)]
    pub json: bool,
}

impl SyncArgs {
    pub fn run(self, config: Config) -> Result<()> {
        bootmirror_daemon::init_tracing(config.debug);
        let report = bootmirror_daemon::sync_once(&config).context("sync aborted")?;

        if self.json {
            let json = serde_json::to_string_pretty(&report).context("failed to encode report")?;
            println!("{json}");
        } else {
            print_summary(&report);
        }

        if report.failed > 0 {
            bail!("{} path(s) failed to sync", report.failed);
        }
        Ok(())
    }
}

fn print_summary(report: &ReconcileReport) {
    let prefix = if report.dry_run { "[dry-run] " } else { "" };
    println!(
        "{prefix}{} synced, {} removed, {} directories created, {} directories removed ({} ms)",
        report.synced,
        report.removed,
        report.created_dirs,
        report.removed_dirs,
        report.duration_ms
    );
    if report.failed > 0 {
        println!("{}", format!("{} failed", report.failed).red());
    }
}
