//! CSV writing operations.

use std::{fs::File, path::Path};

use anyhow::{Context, Result};
use polars::{frame::DataFrame, io::SerWriter, prelude::CsvWriter};

use crate::common::ensure_parent_exists;

/// Write a DataFrame to a CSV file, creating the parent directory if needed.
pub(crate) fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    ensure_parent_exists(path)?;
    let file = File::create(path)
        .with_context(|| format!("[io::csv::write] Failed to create CSV file: {}", path.display()))?;
    CsvWriter::new(file)
        .finish(df)
        .with_context(|| format!("[io::csv::write] Failed to write CSV to {:?}", path))
}

/// Write a DataFrame as Parquet when `path` ends in `.parquet`, otherwise as CSV.
pub(crate) fn write_table(df: &mut DataFrame, path: &Path) -> Result<()> {
    let is_parquet = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("parquet"));
    if is_parquet { write_parquet(df, path) } else { write_csv(df, path) }
}

#[cfg(feature = "parquet")]
fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<()> {
    use polars::prelude::ParquetWriter;

    ensure_parent_exists(path)?;
    let file = File::create(path)
        .with_context(|| format!("[io::csv::write] Failed to create Parquet file: {}", path.display()))?;
    ParquetWriter::new(file)
        .finish(df)
        .with_context(|| format!("[io::csv::write] Failed to write Parquet to {:?}", path))?;
    Ok(())
}

#[cfg(not(feature = "parquet"))]
fn write_parquet(_df: &mut DataFrame, path: &Path) -> Result<()> {
    anyhow::bail!("[io::csv::write] Writing {} requires the `parquet` feature", path.display())
}
