//! `bootmirror config`: show what the service would run with.

use anyhow::{Context, Result};

use bootmirror_core::Config;

pub fn run(config: &Config) -> Result<()> {
    let yaml = config.to_yaml().context("failed to render configuration")?;
    print!("{yaml}");
    if let Err(err) = config.validate() {
        eprintln!("warning: {err}");
    }
    Ok(())
}
