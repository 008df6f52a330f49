use std::path::Path;

use ahash::AHashMap;
use anyhow::{Context, Result, anyhow};
use polars::{frame::DataFrame, prelude::Column};
use serde_json::json;

use crate::{collection::PolygonCollection, common::normalize_id, io::{csv, geojson}};

use super::{HarmonizedRecord, HarmonizedTable};

const VALUE_COLUMNS: [&str; 5] = ["year", "D_votes", "R_votes", "total", "D_share"];

impl HarmonizedTable {
    /// Records as a DataFrame with columns `[<id field>, year, D_votes, R_votes, total, D_share]`.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let records = &self.records;
        Ok(DataFrame::new(vec![
            Column::new(self.id_field.as_str().into(), records.iter().map(|r| r.base_id.as_str()).collect::<Vec<_>>()),
            Column::new("year".into(), records.iter().map(|r| r.year.as_str()).collect::<Vec<_>>()),
            Column::new("D_votes".into(), records.iter().map(|r| r.d_votes).collect::<Vec<_>>()),
            Column::new("R_votes".into(), records.iter().map(|r| r.r_votes).collect::<Vec<_>>()),
            Column::new("total".into(), records.iter().map(|r| r.total).collect::<Vec<_>>()),
            Column::new("D_share".into(), records.iter().map(|r| r.d_share).collect::<Vec<_>>()),
        ])?)
    }

    /// Write the table as CSV.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        csv::write_csv(&mut self.to_dataframe()?, path)
    }

    /// Read a table written by [`HarmonizedTable::write_csv`].
    pub fn read_csv(path: &Path, id_field: &str) -> Result<Self> {
        let df = csv::read_csv_strings(path)?;
        let mut required = vec![id_field];
        required.extend(VALUE_COLUMNS);
        csv::require_columns(&df, &required, path)?;

        let ids = csv::string_column(&df, id_field)?;
        let columns = VALUE_COLUMNS.iter()
            .map(|name| csv::string_column(&df, name))
            .collect::<Result<Vec<_>>>()?;

        let number = |row: usize, col: usize| -> Result<f64> {
            columns[col][row].as_deref()
                .and_then(|value| value.trim().parse::<f64>().ok())
                .ok_or_else(|| anyhow!("[HarmonizedTable::read_csv] Bad {} in row {} of {}", VALUE_COLUMNS[col], row + 1, path.display()))
        };

        let records = ids.into_iter().enumerate()
            .map(|(row, id)| Ok(HarmonizedRecord {
                base_id: normalize_id(&id.unwrap_or_default()),
                year: columns[0][row].clone().unwrap_or_default().trim().to_string(),
                d_votes: number(row, 1)?.round() as i64,
                r_votes: number(row, 2)?.round() as i64,
                total: number(row, 3)?.round() as i64,
                d_share: number(row, 4)?,
            }))
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("[HarmonizedTable::read_csv] Failed to parse {}", path.display()))?;

        let year = records.first().map(|r| r.year.clone()).unwrap_or_default();
        Ok(HarmonizedTable::new(&year, id_field, records))
    }

    /// Write the table joined onto base geometry as a GeoJSON layer.
    /// `base_ids` holds the normalized identifier of each base polygon, in collection order.
    pub fn write_geojson(&self, path: &Path, base: &PolygonCollection, base_ids: &[String]) -> Result<()> {
        let by_id = self.records.iter()
            .map(|r| (r.base_id.as_str(), r))
            .collect::<AHashMap<_, _>>();

        let features = base.geoms().shapes().iter().zip(base_ids)
            .map(|(shape, id)| {
                let mut properties = serde_json::Map::new();
                properties.insert(self.id_field.clone(), json!(id));
                properties.insert("year".into(), json!(self.year));
                if let Some(r) = by_id.get(id.as_str()) {
                    properties.insert("D_votes".into(), json!(r.d_votes));
                    properties.insert("R_votes".into(), json!(r.r_votes));
                    properties.insert("total".into(), json!(r.total));
                    properties.insert("D_share".into(), json!(r.d_share));
                }
                (shape, properties)
            });

        geojson::write_geojson(path, base.crs(), features)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn csv_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("harmonized_2022_on_2024.csv");
        let table = HarmonizedTable::new("2022", "PREC_ID", vec![
            HarmonizedRecord::new("A".into(), "2022", 60, 40, 100),
            HarmonizedRecord::new("B".into(), "2022", 0, 0, 0),
        ]);

        table.write_csv(&path).unwrap();
        let header = fs::read_to_string(&path).unwrap();
        assert!(header.starts_with("PREC_ID,year,D_votes,R_votes,total,D_share\n"));

        let read = HarmonizedTable::read_csv(&path, "PREC_ID").unwrap();
        assert_eq!(read.year(), "2022");
        assert_eq!(read.records(), table.records());
    }

    #[test]
    fn read_requires_id_column() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("h.csv");
        fs::write(&path, "OTHER,year,D_votes,R_votes,total,D_share\nA,2022,1,1,2,0.5\n").unwrap();
        assert!(HarmonizedTable::read_csv(&path, "PREC_ID").is_err());
    }
}
