use std::collections::BTreeSet;

use ahash::AHashMap;
use anyhow::Result;
use polars::{frame::DataFrame, prelude::Column};

use crate::{common::compare_years, harmonize::HarmonizedRecord};

/// One row per base precinct with `D_votes_<year>`, `R_votes_<year>`, `total_<year>` and
/// `D_share_<year>` columns. Years a precinct was not observed in are null.
pub fn pivot_to_wide(records: &[HarmonizedRecord], id_field: &str) -> Result<DataFrame> {
    let ids = records.iter().map(|r| r.base_id.as_str()).collect::<BTreeSet<_>>().into_iter().collect::<Vec<_>>();
    let mut years = records.iter().map(|r| r.year.as_str()).collect::<BTreeSet<_>>().into_iter().collect::<Vec<_>>();
    years.sort_by(|a, b| compare_years(a, b));

    let cell = records.iter()
        .map(|r| ((r.base_id.as_str(), r.year.as_str()), r))
        .collect::<AHashMap<_, _>>();
    let column = |year: &str, value: fn(&HarmonizedRecord) -> f64| -> Vec<Option<f64>> {
        ids.iter().map(|id| cell.get(&(*id, year)).map(|r| value(r))).collect()
    };

    let metrics: [(&str, fn(&HarmonizedRecord) -> f64); 4] = [
        ("D_votes", |r| r.d_votes as f64),
        ("R_votes", |r| r.r_votes as f64),
        ("total", |r| r.total as f64),
        ("D_share", |r| r.d_share),
    ];

    let mut columns = vec![Column::new(id_field.into(), ids.clone())];
    for (name, value) in metrics {
        for year in &years {
            let values = column(year, value);
            columns.push(if name == "D_share" {
                Column::new(format!("{name}_{year}").into(), values)
            } else {
                Column::new(format!("{name}_{year}").into(), values.into_iter().map(|v| v.map(|v| v as i64)).collect::<Vec<_>>())
            });
        }
    }

    Ok(DataFrame::new(columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, year: &str, d: i64, r: i64) -> HarmonizedRecord {
        HarmonizedRecord { base_id: id.into(), year: year.into(), d_votes: d, r_votes: r, total: d + r, d_share: d as f64 / (d + r) as f64 }
    }

    #[test]
    fn pivots_years_into_columns_with_nulls() {
        let df = pivot_to_wide(&[
            record("B", "2024", 3, 1),
            record("A", "2020", 1, 1),
            record("A", "2024", 2, 2),
        ], "PREC_ID").unwrap();

        assert_eq!(df.height(), 2);
        let names = df.get_column_names().iter().map(|n| n.to_string()).collect::<Vec<_>>();
        assert_eq!(names, vec![
            "PREC_ID", "D_votes_2020", "D_votes_2024", "R_votes_2020", "R_votes_2024",
            "total_2020", "total_2024", "D_share_2020", "D_share_2024",
        ]);

        let d_2020 = df.column("D_votes_2020").unwrap().i64().unwrap().into_iter().collect::<Vec<_>>();
        assert_eq!(d_2020, vec![Some(1), None]);
        let share_2024 = df.column("D_share_2024").unwrap().f64().unwrap().into_iter().collect::<Vec<_>>();
        assert_eq!(share_2024, vec![Some(0.5), Some(0.75)]);
    }
}
