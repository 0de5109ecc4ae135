//! Index rebuild command.

use console::style;

use crate::config::Settings;
use crate::persist::rebuild_index;

pub async fn cmd_reindex(settings: &Settings) -> anyhow::Result<()> {
    let records_dir = settings.records_dir();
    let index = rebuild_index(&records_dir)?;
    println!(
        "{} Indexed {} records in {}",
        style("✓").green(),
        index.total_count,
        records_dir.display()
    );
    Ok(())
}
