use anyhow::{Result, bail};
use tracing::info;

use crate::cli::{Cli, WeightArgs, YearArgs};

pub fn crosswalk(cli: &Cli, args: &YearArgs) -> Result<()> {
    let config = super::load_config(cli)?;
    let weight = super::weight_method(&config, &args.weight);

    let crosswalk = precinct_shifts::crosswalk_year(&args.year, &config, weight)?;
    info!(year = %args.year, method = %weight, rows = crosswalk.len(), "Crosswalk complete");
    Ok(())
}

pub fn harmonize(cli: &Cli, args: &YearArgs) -> Result<()> {
    let config = super::load_config(cli)?;
    let weight = super::weight_method(&config, &args.weight);

    let (table, _) = precinct_shifts::reallocate_votes_to_base(&args.year, &config, weight, true)?;
    let sums = table.rounded_sums();
    info!(year = %args.year, precincts = table.records().len(), d = sums.d, r = sums.r, "Harmonization complete");
    Ok(())
}

pub fn harmonize_all(cli: &Cli, args: &WeightArgs) -> Result<()> {
    let config = super::load_config(cli)?;
    let weight = super::weight_method(&config, args);

    let summary = precinct_shifts::harmonize_all(&config, weight)?;
    if !summary.failed.is_empty() && summary.succeeded.is_empty() {
        bail!("[harmonize-all] Every year failed: {}",
            summary.failed.iter().map(|(year, _)| year.as_str()).collect::<Vec<_>>().join(", "));
    }
    Ok(())
}
