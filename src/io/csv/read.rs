//! CSV reading operations.

use std::{fs::File, path::Path};

use anyhow::{Context, Result};
use polars::{frame::DataFrame, io::SerReader, prelude::CsvReadOptions};

use crate::{common::require_file_exists, error::HarmonizeError};

/// Reads a CSV file with a header row into a DataFrame, keeping every column as a string.
/// Identifiers keep their leading zeros and numeric coercion is left to the caller.
pub(crate) fn read_csv_strings(path: &Path) -> Result<DataFrame> {
    require_file_exists(path)?;
    let file = File::open(path)
        .with_context(|| format!("[io::csv::read] Failed to open CSV file: {}", path.display()))?;
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .into_reader_with_file_handle(file)
        .finish()
        .with_context(|| format!("[io::csv::read] Failed to read CSV from {:?}", path))
}

/// Error with `HarmonizeError::MissingColumns` unless every column in `required` is present.
pub(crate) fn require_columns(df: &DataFrame, required: &[&str], path: &Path) -> Result<()> {
    let available = df.get_column_names().iter()
        .map(|name| name.to_string())
        .collect::<Vec<_>>();

    let missing = required.iter()
        .filter(|name| !available.iter().any(|col| col == *name))
        .map(|name| name.to_string())
        .collect::<Vec<_>>();

    if !missing.is_empty() {
        return Err(HarmonizeError::MissingColumns { path: path.to_path_buf(), missing, available }.into());
    }
    Ok(())
}

/// Get a string column as owned optional values.
pub(crate) fn string_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    Ok(df.column(name)
        .with_context(|| format!("[io::csv::read] Missing column {name:?}"))?
        .str()
        .with_context(|| format!("[io::csv::read] Column {name:?} is not a string column"))?
        .into_iter()
        .map(|value| value.map(str::to_string))
        .collect())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn reads_everything_as_strings() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("results.csv");
        fs::write(&path, "PREC_ID,D_votes\n007,12\n").unwrap();

        let df = read_csv_strings(&path).unwrap();
        assert_eq!(string_column(&df, "PREC_ID").unwrap(), vec![Some("007".to_string())]);
        assert_eq!(string_column(&df, "D_votes").unwrap(), vec![Some("12".to_string())]);
    }

    #[test]
    fn missing_columns_are_reported_with_available_ones() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("results.csv");
        fs::write(&path, "PREC_ID,D_votes\nA,1\n").unwrap();

        let df = read_csv_strings(&path).unwrap();
        let err = require_columns(&df, &["PREC_ID", "R_votes"], &path).unwrap_err();
        match err.downcast_ref::<HarmonizeError>() {
            Some(HarmonizeError::MissingColumns { missing, available, .. }) => {
                assert_eq!(missing, &vec!["R_votes".to_string()]);
                assert_eq!(available.len(), 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_a_domain_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = read_csv_strings(&tmp.path().join("nope.csv")).unwrap_err();
        assert!(matches!(err.downcast_ref::<HarmonizeError>(), Some(HarmonizeError::FileNotFound(_))));
    }
}
