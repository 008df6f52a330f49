use anyhow::Result;

use precinct_shifts::{build_timeseries_table, compute_and_save_metrics, county_aggregates};

use crate::cli::Cli;

pub fn metrics(cli: &Cli) -> Result<()> {
    let config = super::load_config(cli)?;
    compute_and_save_metrics(&config)?;
    Ok(())
}

/// Print county aggregates to stdout as JSON lines.
pub fn summary(cli: &Cli) -> Result<()> {
    let config = super::load_config(cli)?;
    let records = build_timeseries_table(&config)?;

    for aggregate in county_aggregates(&records) {
        println!("{}", serde_json::to_string(&aggregate)?);
    }
    Ok(())
}
