//! `bootmirror run`: the long-running mirror service.

use anyhow::{Context, Result};

use bootmirror_core::Config;

pub fn run(config: Config) -> Result<()> {
    bootmirror_daemon::start_blocking(config).context("mirror service stopped with an error")
}
