//! `bootmirror check`: mount availability without side effects.

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use serde_json::json;

use bootmirror_core::Config;
use bootmirror_daemon::{Availability, AvailabilityChecker};

/// Arguments for `bootmirror check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl CheckArgs {
    pub fn run(self, config: Config) -> Result<()> {
        let availability = AvailabilityChecker::from_config(&config).check_report();

        if self.json {
            let body = json!({
                "primary_root": config.primary_root,
                "backup_root": config.backup_root,
                "status": availability,
                "available": availability.is_available(),
            });
            let text = serde_json::to_string_pretty(&body).context("failed to encode status")?;
            println!("{text}");
        } else {
            print_lines(&config, availability);
        }

        if !availability.is_available() {
            bail!("mirror unavailable: {availability}");
        }
        Ok(())
    }
}

fn print_lines(config: &Config, availability: Availability) {
    let primary_ok = availability != Availability::PrimaryNotMounted;
    let backup_ok = availability.is_available();
    println!("{} primary {}", mark(primary_ok), config.primary_root.display());
    println!("{} backup  {}", mark(backup_ok), config.backup_root.display());
    if !backup_ok {
        println!("  {}", availability.to_string().yellow());
    }
}

fn mark(ok: bool) -> colored::ColoredString {
    if ok {
        "✓".green()
    } else {
        "✗".red()
    }
}
