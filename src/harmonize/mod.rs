//! Reallocation of past-year votes onto the base geography.

mod io;
mod pipeline;

use ahash::{AHashMap, AHashSet};
use anyhow::Result;
use serde::Serialize;
use tracing::{info, warn};

use crate::{crosswalk::Crosswalk, error::HarmonizeError, results::ResultsTable};

pub use pipeline::{HarmonizeSummary, crosswalk_year, harmonize_all, reallocate_votes_to_base};

/// Votes of one base precinct in one election year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HarmonizedRecord {
    pub base_id: String,
    pub year: String,
    pub d_votes: i64,
    pub r_votes: i64,
    pub total: i64,
    pub d_share: f64,
}

impl HarmonizedRecord {
    fn new(base_id: String, year: &str, d_votes: i64, r_votes: i64, total: i64) -> Self {
        let d_share = if total > 0 { d_votes as f64 / total as f64 } else { 0.0 };
        Self { base_id, year: year.to_string(), d_votes, r_votes, total, d_share }
    }
}

/// Column sums of D, R and total votes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct VoteSums {
    pub d: f64,
    pub r: f64,
    pub total: f64,
}

/// One year's votes on the base geography, one record per base precinct in base order.
#[derive(Debug, Clone, PartialEq)]
pub struct HarmonizedTable {
    year: String,
    id_field: String,
    records: Vec<HarmonizedRecord>,
    fractional: VoteSums,
    zero_filled: usize,
}

impl HarmonizedTable {
    pub fn new(year: &str, id_field: &str, records: Vec<HarmonizedRecord>) -> Self {
        let fractional = records.iter().fold(VoteSums::default(), |acc, r| VoteSums {
            d: acc.d + r.d_votes as f64,
            r: acc.r + r.r_votes as f64,
            total: acc.total + r.total as f64,
        });
        Self { year: year.to_string(), id_field: id_field.to_string(), records, fractional, zero_filled: 0 }
    }

    #[inline] pub fn year(&self) -> &str { &self.year }
    #[inline] pub fn id_field(&self) -> &str { &self.id_field }
    #[inline] pub fn records(&self) -> &[HarmonizedRecord] { &self.records }
    #[inline] pub fn into_records(self) -> Vec<HarmonizedRecord> { self.records }
    #[inline] pub fn len(&self) -> usize { self.records.len() }
    #[inline] pub fn is_empty(&self) -> bool { self.records.is_empty() }

    /// Column sums before rounding.
    #[inline] pub fn fractional_sums(&self) -> VoteSums { self.fractional }

    /// Base precincts that received no votes and were filled with zeros. Always 0 for tables read from disk.
    #[inline] pub fn zero_filled(&self) -> usize { self.zero_filled }

    /// Column sums after rounding.
    pub fn rounded_sums(&self) -> VoteSums {
        self.records.iter().fold(VoteSums::default(), |acc, r| VoteSums {
            d: acc.d + r.d_votes as f64,
            r: acc.r + r.r_votes as f64,
            total: acc.total + r.total as f64,
        })
    }

    /// Rounded minus fractional sums, per column.
    pub fn rounding_drift(&self) -> VoteSums {
        let rounded = self.rounded_sums();
        VoteSums {
            d: rounded.d - self.fractional.d,
            r: rounded.r - self.fractional.r,
            total: rounded.total - self.fractional.total,
        }
    }
}

/// Distinct base identifiers in first-seen order.
fn unique_ids(base_ids: &[String]) -> Vec<&str> {
    let mut seen = AHashSet::new();
    base_ids.iter()
        .map(String::as_str)
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Distribute `results` of `year` onto base precincts through `crosswalk`.
///
/// Every base identifier in `base_ids` appears exactly once in the output, zero-filled when
/// nothing maps onto it. Vote columns are rounded to integers independently.
pub fn reallocate(
    year: &str,
    base_year: &str,
    crosswalk: &Crosswalk,
    results: &ResultsTable,
    base_ids: &[String],
) -> Result<HarmonizedTable> {
    if year == base_year {
        return Err(HarmonizeError::BaseYearSelfHarmonize(base_year.to_string()).into());
    }

    let base_ids = unique_ids(base_ids);
    let position = base_ids.iter().enumerate()
        .map(|(i, id)| (*id, i))
        .collect::<AHashMap<_, _>>();

    let mut sums = vec![VoteSums::default(); base_ids.len()];
    let mut contributed = vec![false; base_ids.len()];
    let mut missing_results = AHashSet::new();
    let mut unknown_base = AHashSet::new();

    for entry in crosswalk.entries() {
        let Some(&i) = position.get(entry.base_id.as_str()) else {
            unknown_base.insert(entry.base_id.as_str());
            continue;
        };
        let Some(record) = results.get(&entry.past_id) else {
            missing_results.insert(entry.past_id.as_str());
            continue;
        };
        contributed[i] = true;
        sums[i].d += record.d_votes as f64 * entry.frac;
        sums[i].r += record.r_votes as f64 * entry.frac;
        sums[i].total += record.total() as f64 * entry.frac;
    }

    if !missing_results.is_empty() {
        warn!("{} precincts from the {year} crosswalk are missing from results; treating as zero votes", missing_results.len());
    }
    if !unknown_base.is_empty() {
        warn!("{} crosswalk base precincts are not in the base geography; their rows were skipped", unknown_base.len());
    }

    let mapped = crosswalk.entries().iter().map(|e| e.past_id.as_str()).collect::<AHashSet<_>>();
    let unmapped = results.records().iter()
        .filter(|r| !mapped.contains(r.id.as_str()))
        .collect::<Vec<_>>();
    if !unmapped.is_empty() {
        warn!("{} results precincts of {year} have no crosswalk rows; dropping {} votes",
            unmapped.len(), unmapped.iter().map(|r| r.total()).sum::<u64>());
    }

    let zero_filled = contributed.iter().filter(|&&c| !c).count();
    if zero_filled > 0 {
        warn!("{zero_filled} base precincts have no data from {year}; filling with zeros");
    }

    let records = base_ids.iter().zip(&sums)
        .map(|(id, sum)| HarmonizedRecord::new(
            id.to_string(), year,
            sum.d.round() as i64, sum.r.round() as i64, sum.total.round() as i64,
        ))
        .collect();

    let fractional = sums.iter().fold(VoteSums::default(), |acc, s| VoteSums {
        d: acc.d + s.d, r: acc.r + s.r, total: acc.total + s.total,
    });
    let table = HarmonizedTable { year: year.to_string(), id_field: crosswalk.base_field().to_string(), records, fractional, zero_filled };

    let drift = table.rounding_drift();
    info!(
        year, base_year, precincts = table.len(),
        total = table.rounded_sums().total,
        drift_d = drift.d, drift_r = drift.r, drift_total = drift.total,
        "Harmonized votes"
    );
    Ok(table)
}

/// The base year's own results on its geography, joined directly by identifier.
pub fn base_year_table(base_year: &str, id_field: &str, results: &ResultsTable, base_ids: &[String]) -> HarmonizedTable {
    let base_ids = unique_ids(base_ids);

    let records = base_ids.iter()
        .map(|id| match results.get(id) {
            Some(r) => HarmonizedRecord::new(id.to_string(), base_year, r.d_votes as i64, r.r_votes as i64, r.total() as i64),
            None => HarmonizedRecord::new(id.to_string(), base_year, 0, 0, 0),
        })
        .collect::<Vec<_>>();

    let missing = base_ids.iter().filter(|id| results.get(id).is_none()).count();
    if missing > 0 {
        warn!("{missing} base precincts have no {base_year} results; filling with zeros");
    }
    let known = base_ids.iter().copied().collect::<AHashSet<_>>();
    let orphans = results.records().iter().filter(|r| !known.contains(r.id.as_str())).count();
    if orphans > 0 {
        warn!("{orphans} {base_year} results precincts are not in the base geography");
    }

    HarmonizedTable { zero_filled: missing, ..HarmonizedTable::new(base_year, id_field, records) }
}

#[cfg(test)]
mod tests {
    use crate::{crosswalk::{CrosswalkEntry, WeightMethod}, results::ResultsRecord};

    use super::*;

    fn crosswalk(rows: &[(&str, &str, f64)]) -> Crosswalk {
        Crosswalk::new(
            rows.iter().map(|&(p, b, frac)| CrosswalkEntry { past_id: p.into(), base_id: b.into(), frac }).collect(),
            WeightMethod::Area, "PRECINCT", "PREC_ID",
        )
    }

    fn results(rows: &[(&str, u64, u64)]) -> ResultsTable {
        ResultsTable::from_records(rows.iter().map(|&(id, d, r)| ResultsRecord { id: id.into(), d_votes: d, r_votes: r }))
    }

    fn ids(ids: &[&str]) -> Vec<String> { ids.iter().map(|s| s.to_string()).collect() }

    #[test]
    fn splits_votes_by_fraction() {
        let table = reallocate("2022", "2024",
            &crosswalk(&[("A", "X", 0.6), ("A", "Y", 0.4), ("B", "Y", 1.0)]),
            &results(&[("A", 100, 50), ("B", 10, 30)]),
            &ids(&["X", "Y"]),
        ).unwrap();

        assert_eq!(table.records()[0], HarmonizedRecord::new("X".into(), "2022", 60, 30, 90));
        assert_eq!(table.records()[1], HarmonizedRecord::new("Y".into(), "2022", 50, 50, 100));
        assert_eq!(table.id_field(), "PREC_ID");
    }

    #[test]
    fn base_year_onto_itself_fails() {
        let err = reallocate("2024", "2024", &crosswalk(&[]), &results(&[]), &[]).unwrap_err();
        assert!(matches!(err.downcast_ref::<HarmonizeError>(), Some(HarmonizeError::BaseYearSelfHarmonize(_))));
    }

    #[test]
    fn missing_results_contribute_zero_and_every_base_precinct_is_present() {
        let table = reallocate("2022", "2024",
            &crosswalk(&[("A", "X", 1.0), ("GHOST", "Y", 1.0)]),
            &results(&[("A", 7, 3)]),
            &ids(&["X", "Y", "Z"]),
        ).unwrap();

        let got = table.records().iter().map(|r| (r.base_id.as_str(), r.total, r.d_share)).collect::<Vec<_>>();
        assert_eq!(got, vec![("X", 10, 0.7), ("Y", 0, 0.0), ("Z", 0, 0.0)]);
        assert_eq!(table.zero_filled(), 2);
    }

    #[test]
    fn rounding_drift_is_bounded() {
        let thirds = [("A", "X", 1.0 / 3.0), ("A", "Y", 1.0 / 3.0), ("A", "Z", 1.0 / 3.0)];
        let table = reallocate("2022", "2024", &crosswalk(&thirds), &results(&[("A", 100, 100)]), &ids(&["X", "Y", "Z"])).unwrap();

        assert!((table.fractional_sums().total - 200.0).abs() < 1e-9);
        let drift = table.rounding_drift();
        for column in [drift.d, drift.r, drift.total] {
            assert!(column.abs() <= 0.5 * table.len() as f64);
        }
        for record in table.records() {
            assert!((0.0..=1.0).contains(&record.d_share));
        }
    }

    #[test]
    fn base_year_passthrough_zero_fills() {
        let table = base_year_table("2024", "PREC_ID", &results(&[("X", 3, 1)]), &ids(&["X", "Y"]));
        assert_eq!(table.records()[0], HarmonizedRecord::new("X".into(), "2024", 3, 1, 4));
        assert_eq!(table.records()[1], HarmonizedRecord::new("Y".into(), "2024", 0, 0, 0));
        assert_eq!(table.zero_filled(), 1);
        assert_eq!(table.rounding_drift(), VoteSums::default());
    }
}
