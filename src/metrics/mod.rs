//! Swings, turnout changes and county-wide aggregates over harmonized years.

mod timeseries;
mod wide;

use std::cmp::Ordering;

use ahash::AHashMap;
use anyhow::Result;
use polars::{frame::DataFrame, prelude::Column};
use serde::Serialize;
use tracing::info;

use crate::{common::compare_years, harmonize::HarmonizedRecord};

pub use timeseries::{build_timeseries_table, compute_and_save_metrics, log_summary};
pub use wide::pivot_to_wide;

/// A harmonized record with its change metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsRecord {
    #[serde(flatten)]
    pub record: HarmonizedRecord,
    /// D_share minus the previous observed year's, for the same base precinct.
    pub swing_yoy: Option<f64>,
    /// D_share minus the earliest year's, for the same base precinct.
    pub swing_vs_earliest: Option<f64>,
    /// D_share minus the latest year's, for the same base precinct.
    pub swing_vs_latest: Option<f64>,
    pub turnout: i64,
    pub turnout_change_yoy: Option<i64>,
    /// Turnout change relative to the previous turnout; None when that turnout was zero.
    pub turnout_change_yoy_pct: Option<f64>,
}

/// Metrics for every (base precinct, year), sorted by precinct then year.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsTable {
    pub id_field: String,
    pub earliest_year: String,
    pub latest_year: String,
    pub records: Vec<MetricsRecord>,
}

fn by_id_then_year(a: &HarmonizedRecord, b: &HarmonizedRecord) -> Ordering {
    a.base_id.cmp(&b.base_id).then_with(|| compare_years(&a.year, &b.year))
}

fn pct_change(change: i64, previous: i64) -> Option<f64> {
    (previous != 0).then(|| change as f64 / previous as f64)
}

/// Compute swings and turnout changes for concatenated harmonized records of several years.
pub fn compute_two_party_metrics(records: &[HarmonizedRecord], id_field: &str) -> MetricsTable {
    let mut sorted = records.to_vec();
    sorted.sort_by(by_id_then_year);

    let earliest = sorted.iter().map(|r| r.year.as_str()).min_by(|a, b| compare_years(a, b)).unwrap_or_default().to_string();
    let latest = sorted.iter().map(|r| r.year.as_str()).max_by(|a, b| compare_years(a, b)).unwrap_or_default().to_string();

    let share_in = |year: &str| sorted.iter()
        .filter(|r| r.year == year)
        .map(|r| (r.base_id.clone(), r.d_share))
        .collect::<AHashMap<_, _>>();
    let earliest_shares = share_in(&earliest);
    let latest_shares = share_in(&latest);

    let mut out = Vec::with_capacity(sorted.len());
    let mut previous: Option<&HarmonizedRecord> = None;
    for record in &sorted {
        let prev = previous.filter(|p| p.base_id == record.base_id);
        let turnout_change = prev.map(|p| record.total - p.total);

        out.push(MetricsRecord {
            swing_yoy: prev.map(|p| record.d_share - p.d_share),
            swing_vs_earliest: earliest_shares.get(&record.base_id).map(|s| record.d_share - s),
            swing_vs_latest: latest_shares.get(&record.base_id).map(|s| record.d_share - s),
            turnout: record.total,
            turnout_change_yoy: turnout_change,
            turnout_change_yoy_pct: prev.zip(turnout_change).and_then(|(p, change)| pct_change(change, p.total)),
            record: record.clone(),
        });
        previous = Some(record);
    }

    info!("Computed metrics for {} precinct-year observations", out.len());
    MetricsTable { id_field: id_field.to_string(), earliest_year: earliest, latest_year: latest, records: out }
}

impl MetricsTable {
    /// The long metrics table as a DataFrame. When the earliest and latest years coincide,
    /// a single `swing_vs_<year>` column is written.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let r = &self.records;
        let mut columns = vec![
            Column::new(self.id_field.as_str().into(), r.iter().map(|m| m.record.base_id.as_str()).collect::<Vec<_>>()),
            Column::new("year".into(), r.iter().map(|m| m.record.year.as_str()).collect::<Vec<_>>()),
            Column::new("D_votes".into(), r.iter().map(|m| m.record.d_votes).collect::<Vec<_>>()),
            Column::new("R_votes".into(), r.iter().map(|m| m.record.r_votes).collect::<Vec<_>>()),
            Column::new("total".into(), r.iter().map(|m| m.record.total).collect::<Vec<_>>()),
            Column::new("D_share".into(), r.iter().map(|m| m.record.d_share).collect::<Vec<_>>()),
            Column::new("swing_yoy".into(), r.iter().map(|m| m.swing_yoy).collect::<Vec<_>>()),
            Column::new(format!("swing_vs_{}", self.earliest_year).into(), r.iter().map(|m| m.swing_vs_earliest).collect::<Vec<_>>()),
        ];
        if self.latest_year != self.earliest_year {
            columns.push(Column::new(format!("swing_vs_{}", self.latest_year).into(), r.iter().map(|m| m.swing_vs_latest).collect::<Vec<_>>()));
        }
        columns.extend([
            Column::new("turnout".into(), r.iter().map(|m| m.turnout).collect::<Vec<_>>()),
            Column::new("turnout_change_yoy".into(), r.iter().map(|m| m.turnout_change_yoy).collect::<Vec<_>>()),
            Column::new("turnout_change_yoy_pct".into(), r.iter().map(|m| m.turnout_change_yoy_pct).collect::<Vec<_>>()),
        ]);
        Ok(DataFrame::new(columns)?)
    }
}

/// County-wide totals for one year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountyAggregate {
    pub year: String,
    pub d_votes: i64,
    pub r_votes: i64,
    pub total: i64,
    /// Vote-weighted two-party share; 0 when there were no votes.
    pub d_share: f64,
    pub swing_yoy: Option<f64>,
    pub turnout: i64,
    pub turnout_change_yoy: Option<i64>,
    pub turnout_change_yoy_pct: Option<f64>,
}

/// Sum votes over all base precincts per year, with county-level swing and turnout change.
pub fn county_aggregates(records: &[HarmonizedRecord]) -> Vec<CountyAggregate> {
    let mut sums: AHashMap<&str, (i64, i64, i64)> = AHashMap::new();
    for r in records {
        let (d, rep, total) = sums.entry(r.year.as_str()).or_default();
        *d += r.d_votes;
        *rep += r.r_votes;
        *total += r.total;
    }

    let mut years = sums.keys().copied().collect::<Vec<_>>();
    years.sort_by(|a, b| compare_years(a, b));

    let mut out: Vec<CountyAggregate> = Vec::with_capacity(years.len());
    for year in years {
        let (d_votes, r_votes, total) = sums.get(year).copied().unwrap_or_default();
        let d_share = if total > 0 { d_votes as f64 / total as f64 } else { 0.0 };
        let prev = out.last();
        let turnout_change = prev.map(|p| total - p.turnout);

        let aggregate = CountyAggregate {
            year: year.to_string(),
            d_votes, r_votes, total, d_share,
            swing_yoy: prev.map(|p| d_share - p.d_share),
            turnout: total,
            turnout_change_yoy: turnout_change,
            turnout_change_yoy_pct: prev.zip(turnout_change).and_then(|(p, change)| pct_change(change, p.turnout)),
        };
        out.push(aggregate);
    }

    info!("Computed aggregates for {} years", out.len());
    out
}

/// County aggregates as a DataFrame.
pub fn county_dataframe(aggregates: &[CountyAggregate]) -> Result<DataFrame> {
    let a = aggregates;
    Ok(DataFrame::new(vec![
        Column::new("year".into(), a.iter().map(|c| c.year.as_str()).collect::<Vec<_>>()),
        Column::new("D_votes".into(), a.iter().map(|c| c.d_votes).collect::<Vec<_>>()),
        Column::new("R_votes".into(), a.iter().map(|c| c.r_votes).collect::<Vec<_>>()),
        Column::new("total".into(), a.iter().map(|c| c.total).collect::<Vec<_>>()),
        Column::new("D_share".into(), a.iter().map(|c| c.d_share).collect::<Vec<_>>()),
        Column::new("swing_yoy".into(), a.iter().map(|c| c.swing_yoy).collect::<Vec<_>>()),
        Column::new("turnout".into(), a.iter().map(|c| c.turnout).collect::<Vec<_>>()),
        Column::new("turnout_change_yoy".into(), a.iter().map(|c| c.turnout_change_yoy).collect::<Vec<_>>()),
        Column::new("turnout_change_yoy_pct".into(), a.iter().map(|c| c.turnout_change_yoy_pct).collect::<Vec<_>>()),
    ])?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, year: &str, d: i64, r: i64) -> HarmonizedRecord {
        HarmonizedRecord {
            base_id: id.into(), year: year.into(), d_votes: d, r_votes: r, total: d + r,
            d_share: if d + r > 0 { d as f64 / (d + r) as f64 } else { 0.0 },
        }
    }

    fn close(a: Option<f64>, b: f64) -> bool { a.is_some_and(|a| (a - b).abs() < 1e-12) }

    #[test]
    fn swings_follow_each_precinct_through_time() {
        // Out of order on purpose; metrics sort by precinct then year.
        let records = vec![
            record("A", "2024", 60, 40),
            record("A", "2020", 50, 50),
            record("A", "2022", 45, 55),
            record("B", "2022", 30, 70),
        ];

        let table = compute_two_party_metrics(&records, "PREC_ID");
        assert_eq!(table.earliest_year, "2020");
        assert_eq!(table.latest_year, "2024");

        let a = &table.records[..3];
        assert_eq!(a.iter().map(|m| m.record.year.as_str()).collect::<Vec<_>>(), vec!["2020", "2022", "2024"]);
        assert_eq!(a[0].swing_yoy, None);
        assert!(close(a[1].swing_yoy, -0.05));
        assert!(close(a[2].swing_yoy, 0.15));
        assert!(close(a[0].swing_vs_earliest, 0.0));
        assert!(close(a[2].swing_vs_earliest, 0.10));
        assert!(close(a[0].swing_vs_latest, -0.10));
        assert!(close(a[2].swing_vs_latest, 0.0));

        // B has no record in either reference year.
        let b = &table.records[3];
        assert_eq!((b.swing_yoy, b.swing_vs_earliest, b.swing_vs_latest), (None, None, None));
    }

    #[test]
    fn turnout_changes() {
        let records = vec![record("A", "2020", 100, 50), record("A", "2022", 100, 80), record("A", "2024", 110, 100)];
        let table = compute_two_party_metrics(&records, "PREC_ID");

        let changes = table.records.iter().map(|m| m.turnout_change_yoy).collect::<Vec<_>>();
        assert_eq!(changes, vec![None, Some(30), Some(30)]);
        assert!(close(table.records[1].turnout_change_yoy_pct, 0.2));
    }

    #[test]
    fn turnout_pct_is_none_after_zero_turnout() {
        let records = vec![record("A", "2020", 0, 0), record("A", "2022", 10, 10)];
        let table = compute_two_party_metrics(&records, "PREC_ID");
        assert_eq!(table.records[1].turnout_change_yoy, Some(20));
        assert_eq!(table.records[1].turnout_change_yoy_pct, None);
    }

    #[test]
    fn county_aggregates_weight_by_votes() {
        let records = vec![
            record("A", "2022", 90, 10), record("B", "2022", 10, 90), record("C", "2022", 0, 0),
            record("A", "2020", 0, 0),
        ];

        let county = county_aggregates(&records);
        assert_eq!(county.len(), 2);
        assert_eq!(county[0].year, "2020");
        assert_eq!(county[0].d_share, 0.0);
        assert_eq!(county[1].total, 200);
        assert!((county[1].d_share - 0.5).abs() < 1e-12);
        assert!(close(county[1].swing_yoy, 0.5));
        assert_eq!(county[1].turnout_change_yoy, Some(200));
        assert_eq!(county[1].turnout_change_yoy_pct, None);
    }

    #[test]
    fn single_year_writes_one_reference_swing_column() {
        let table = compute_two_party_metrics(&[record("A", "2024", 1, 1)], "PREC_ID");
        let df = table.to_dataframe().unwrap();
        let names = df.get_column_names().iter().map(|n| n.to_string()).collect::<Vec<_>>();
        assert_eq!(names.iter().filter(|n| n.starts_with("swing_vs_")).count(), 1);
        assert!(names.contains(&"swing_vs_2024".to_string()));
    }
}
