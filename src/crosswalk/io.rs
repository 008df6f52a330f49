use std::path::Path;

use anyhow::{Context, Result, anyhow};
use polars::{frame::DataFrame, prelude::Column};

use crate::{common::normalize_id, io::csv};

use super::{Crosswalk, CrosswalkEntry, WeightMethod};

const COLUMNS: [&str; 3] = ["past_id", "base_id", "frac"];

impl Crosswalk {
    /// Crosswalk rows as a DataFrame with columns `past_id, base_id, frac`.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        Ok(DataFrame::new(vec![
            Column::new(COLUMNS[0].into(), self.entries.iter().map(|e| e.past_id.as_str()).collect::<Vec<_>>()),
            Column::new(COLUMNS[1].into(), self.entries.iter().map(|e| e.base_id.as_str()).collect::<Vec<_>>()),
            Column::new(COLUMNS[2].into(), self.entries.iter().map(|e| e.frac).collect::<Vec<_>>()),
        ])?)
    }

    /// Write the crosswalk as CSV.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        csv::write_csv(&mut self.to_dataframe()?, path)
    }

    /// Read a crosswalk written by [`Crosswalk::write_csv`]. Malformed rows are an error.
    pub fn read_csv(path: &Path, method: WeightMethod, past_field: &str, base_field: &str) -> Result<Self> {
        let df = csv::read_csv_strings(path)?;
        csv::require_columns(&df, &COLUMNS, path)?;

        let past = csv::string_column(&df, COLUMNS[0])?;
        let base = csv::string_column(&df, COLUMNS[1])?;
        let frac = csv::string_column(&df, COLUMNS[2])?;

        let entries = past.into_iter().zip(base).zip(frac).enumerate()
            .map(|(row, ((past_id, base_id), frac))| {
                let malformed = || anyhow!("[Crosswalk::read_csv] Malformed row {} in {}", row + 1, path.display());
                let frac = frac.as_deref().ok_or_else(malformed)?.trim().parse::<f64>()
                    .with_context(malformed)?;
                if !(frac > 0.0 && frac <= 1.0 + 1e-9) { return Err(malformed()) }
                Ok(CrosswalkEntry {
                    past_id: normalize_id(&past_id.ok_or_else(malformed)?),
                    base_id: normalize_id(&base_id.ok_or_else(malformed)?),
                    frac,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Crosswalk::new(entries, method, past_field, base_field))
    }
}
