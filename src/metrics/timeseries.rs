use std::path::PathBuf;

use anyhow::{Result, bail};
use tracing::{info, warn};

use crate::{config::ProjectConfig, harmonize::{HarmonizedRecord, HarmonizedTable}, io::csv};

use super::{CountyAggregate, MetricsTable, compute_two_party_metrics, county_aggregates, county_dataframe, pivot_to_wide};

/// Concatenate every configured year's harmonized table. Years that cannot be read are skipped.
pub fn build_timeseries_table(config: &ProjectConfig) -> Result<Vec<HarmonizedRecord>> {
    let id_field = config.id_field(&config.base_year)?;

    let mut records = Vec::new();
    let mut loaded = 0;
    for year in config.years() {
        let path = config.harmonized_path(&year);
        match HarmonizedTable::read_csv(&path, id_field) {
            Ok(table) => {
                loaded += 1;
                records.extend(table.into_records());
            }
            Err(e) => warn!("Failed to load harmonized table for {year}: {e:#}"),
        }
    }

    if loaded == 0 {
        bail!("No harmonized tables found in {}; run harmonize-all first", config.harmonized_dir().display());
    }
    info!("Built time-series table with {} precinct-year observations from {loaded} years", records.len());
    Ok(records)
}

/// Path of the wide table, beside the long one.
fn wide_path(long: &std::path::Path) -> PathBuf {
    let extension = long.extension().and_then(|ext| ext.to_str()).unwrap_or("csv");
    long.with_file_name(format!("timeseries_per_precinct_wide.{extension}"))
}

/// Compute metrics and write the long, wide and county tables configured in `output`.
pub fn compute_and_save_metrics(config: &ProjectConfig) -> Result<(MetricsTable, Vec<CountyAggregate>)> {
    let id_field = config.id_field(&config.base_year)?;
    let records = build_timeseries_table(config)?;

    let metrics = compute_two_party_metrics(&records, id_field);
    let long_path = config.timeseries_path();
    csv::write_table(&mut metrics.to_dataframe()?, &long_path)?;
    info!("Saved time-series table to {}", long_path.display());

    let wide = wide_path(&long_path);
    csv::write_table(&mut pivot_to_wide(&records, id_field)?, &wide)?;
    info!("Saved wide-format table to {}", wide.display());

    let county = county_aggregates(&records);
    let county_path = config.county_aggregates_path();
    csv::write_table(&mut county_dataframe(&county)?, &county_path)?;
    info!("Saved county aggregates to {}", county_path.display());

    log_summary(&metrics, &county);
    Ok((metrics, county))
}

fn mean_median_std(values: &mut [f64]) -> (f64, f64, f64) {
    let n = values.len();
    if n == 0 { return (0.0, 0.0, 0.0) }
    values.sort_by(f64::total_cmp);

    let mean = values.iter().sum::<f64>() / n as f64;
    let median = if n % 2 == 1 { values[n / 2] } else { (values[n / 2 - 1] + values[n / 2]) / 2.0 };
    let std = if n > 1 {
        (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt()
    } else { 0.0 };
    (mean, median, std)
}

/// Log county results per year and the distribution of precinct D_share per year.
pub fn log_summary(metrics: &MetricsTable, county: &[CountyAggregate]) {
    info!("County-wide results by year:");
    for c in county {
        match c.swing_yoy {
            Some(swing) => info!("  {}: D={:.1}%, turnout={}, swing={:+.1}%", c.year, c.d_share * 100.0, c.turnout, swing * 100.0),
            None => info!("  {}: D={:.1}%, turnout={}", c.year, c.d_share * 100.0, c.turnout),
        }
    }

    info!("Precinct-level statistics:");
    for c in county {
        let mut shares = metrics.records.iter()
            .filter(|m| m.record.year == c.year)
            .map(|m| m.record.d_share)
            .collect::<Vec<_>>();
        let n = shares.len();
        let (mean, median, std) = mean_median_std(&mut shares);
        info!("  {}: precincts={n}, mean D_share={:.1}%, median={:.1}%, std={:.1}%",
            c.year, mean * 100.0, median * 100.0, std * 100.0);
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    #[test]
    fn wide_table_sits_beside_long_table() {
        assert_eq!(wide_path(Path::new("out/ts.csv")), Path::new("out/timeseries_per_precinct_wide.csv"));
        assert_eq!(wide_path(Path::new("out/ts.parquet")), Path::new("out/timeseries_per_precinct_wide.parquet"));
    }

    #[test]
    fn sample_statistics() {
        let (mean, median, std) = mean_median_std(&mut [0.4, 0.6, 0.5, 0.7]);
        assert!((mean - 0.55).abs() < 1e-12);
        assert!((median - 0.55).abs() < 1e-12);
        assert!((std - (0.05f64 / 3.0).sqrt()).abs() < 1e-12);
    }
}
