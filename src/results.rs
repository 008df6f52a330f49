//! Observed election results keyed by past precinct identifier.

use std::path::Path;

use ahash::AHashMap;
use anyhow::Result;
use tracing::{info, warn};

use crate::{common::normalize_id, io::csv};

/// Two-party vote counts for one precinct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultsRecord {
    pub id: String,
    pub d_votes: u64,
    pub r_votes: u64,
}

impl ResultsRecord {
    #[inline] pub fn total(&self) -> u64 { self.d_votes + self.r_votes }
}

/// Results for one election year, one record per normalized identifier.
#[derive(Debug, Clone, Default)]
pub struct ResultsTable {
    records: Vec<ResultsRecord>,
    index: AHashMap<String, usize>,
}

impl ResultsTable {
    /// Build a table from records, normalizing identifiers and summing duplicates.
    pub fn from_records(records: impl IntoIterator<Item = ResultsRecord>) -> Self {
        let mut table = Self::default();
        let mut duplicates = 0;

        for record in records {
            let id = normalize_id(&record.id);
            match table.index.get(&id) {
                Some(&i) => {
                    duplicates += 1;
                    table.records[i].d_votes += record.d_votes;
                    table.records[i].r_votes += record.r_votes;
                }
                None => {
                    table.index.insert(id.clone(), table.records.len());
                    table.records.push(ResultsRecord { id, ..record });
                }
            }
        }

        if duplicates > 0 {
            warn!("{duplicates} results rows repeat an earlier precinct identifier; their votes were summed");
        }
        table
    }

    #[inline] pub fn records(&self) -> &[ResultsRecord] { &self.records }
    #[inline] pub fn len(&self) -> usize { self.records.len() }
    #[inline] pub fn is_empty(&self) -> bool { self.records.is_empty() }

    /// Look up a precinct by (normalized) identifier.
    pub fn get(&self, id: &str) -> Option<&ResultsRecord> {
        self.index.get(id).map(|&i| &self.records[i])
    }

    pub fn total_d(&self) -> u64 { self.records.iter().map(|r| r.d_votes).sum() }
    pub fn total_r(&self) -> u64 { self.records.iter().map(|r| r.r_votes).sum() }
}

/// Parse a vote count; blanks, non-numbers and negatives become zero.
fn parse_count(value: Option<&str>) -> Option<u64> {
    let n = value?.trim().replace(',', "").parse::<f64>().ok()?;
    (n.is_finite() && n >= 0.0).then(|| n.round() as u64)
}

/// Load a results CSV with columns `[id_field, d_col, r_col]`.
pub fn load_results_csv(path: &Path, id_field: &str, d_col: &str, r_col: &str) -> Result<ResultsTable> {
    let df = csv::read_csv_strings(path)?;
    csv::require_columns(&df, &[id_field, d_col, r_col], path)?;

    let ids = csv::string_column(&df, id_field)?;
    let d = csv::string_column(&df, d_col)?;
    let r = csv::string_column(&df, r_col)?;

    let mut coerced = 0;
    let mut count = |value: Option<String>| parse_count(value.as_deref()).unwrap_or_else(|| { coerced += 1; 0 });

    let records = ids.into_iter().zip(d).zip(r)
        .map(|((id, d), r)| ResultsRecord {
            id: id.unwrap_or_default(),
            d_votes: count(d),
            r_votes: count(r),
        })
        .collect::<Vec<_>>();

    if coerced > 0 {
        warn!("{coerced} vote cells in {} were blank, non-numeric or negative; treated as 0", path.display());
    }

    let table = ResultsTable::from_records(records);
    info!(path = %path.display(), precincts = table.len(), d = table.total_d(), r = table.total_r(), "Loaded results");
    Ok(table)
}
