//! bootmirror: keep a live replica of the boot volume on a second device.
//!
//! # Usage
//!
//! ```text
//! bootmirror [run]                 reconcile, then watch until stopped
//! bootmirror sync [--json]         one reconciliation pass and exit
//! bootmirror check [--json]        report mount availability
//! bootmirror config                print the effective configuration
//!
//! global: --config <file> --primary <dir> --backup <dir> --dry-run --debug
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use bootmirror_core::Config;
use commands::{check::CheckArgs, sync::SyncArgs};

#[derive(Parser, Debug)]
#[command(
    name = "bootmirror",
    version,
    about = "Mirror the boot volume to a backup device in real time",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Reconcile once, then apply filesystem changes as they happen (default).
    Run,

    /// Reconcile the backup tree once and exit.
    Sync(SyncArgs),

    /// Check that both roots are mounted.
    Check(CheckArgs),

    /// Print the effective configuration as YAML.
    Config,
}

/// Flags layered over the configuration file.
#[derive(Args, Debug, Default)]
pub struct Overrides {
    /// Configuration file to use instead of the default locations.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory to mirror.
    #[arg(long, global = true, value_name = "DIR")]
    pub primary: Option<PathBuf>,

    /// Directory receiving the replica.
    #[arg(long, global = true, value_name = "DIR")]
    pub backup: Option<PathBuf>,

    /// Log every mutation without touching the backup tree.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Enable debug logging.
    #[arg(long, global = true)]
    pub debug: bool,
}

impl Overrides {
    /// Load the config file and apply command-line flags on top.
    pub fn load(&self) -> Result<Config> {
        let mut config = Config::load(self.config.as_deref()).context("failed to load configuration")?;
        if let Some(primary) = &self.primary {
            config.primary_root = primary.clone();
        }
        if let Some(backup) = &self.backup {
            config.backup_root = backup.clone();
        }
        config.dry_run |= self.dry_run;
        config.debug |= self.debug;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.overrides.load()?;
    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => commands::run::run(config),
        Commands::Sync(args) => args.run(config),
        Commands::Check(args) => args.run(config),
        Commands::Config => commands::config::run(&config),
    }
}
