use anyhow::{Context, Result};
use tracing::info;

use crate::cli::Cli;

pub fn init(cli: &Cli) -> Result<()> {
    let config = super::load_config(cli)?;
    config.validate()?;

    for dir in [config.crosswalk_dir(), config.harmonized_dir()] {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("[init] Failed to create {}", dir.display()))?;
        info!("Created {}", dir.display());
    }
    for path in [config.timeseries_path(), config.county_aggregates_path()] {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("[init] Failed to create {}", parent.display()))?;
        }
    }

    info!(base_year = %config.base_year, crs = %config.crs, years = config.years().len(), "Configuration is valid");
    Ok(())
}
