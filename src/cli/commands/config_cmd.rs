//! Configuration display.

use console::style;

use crate::config::{Config, Settings};

/// Print the resolved settings and where they came from.
pub async fn cmd_config_show(settings: &Settings, config: &Config) -> anyhow::Result<()> {
    match config.source_path {
        Some(ref path) => println!("{} Config file: {}", style("→").dim(), path.display()),
        None => println!("{} No config file found, using defaults", style("!").yellow()),
    }
    println!("{}", serde_json::to_string_pretty(settings)?);
    Ok(())
}
