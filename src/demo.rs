//! Synthetic three-election example on a 2000 x 2000 ft square.
//!
//! - 2024 (base): 2x2 grid of 1000 ft cells, `P1`..`P4`
//! - 2022: left half plus top-right and bottom-right cells
//! - 2020: top and bottom halves
//!
//! A 4x4 grid of census blocks with uneven population is included for population weighting.

use std::path::Path;

use anyhow::{Context, Result};
use geo::{MultiPolygon, polygon};
use polars::{frame::DataFrame, prelude::Column};
use serde_json::json;
use tracing::info;

use crate::{
    collection::{AttrValue, PolygonCollection},
    common::ensure_dir_exists,
    config::ProjectConfig,
    geom::Crs,
    io::csv,
};

const CRS: Crs = Crs::Epsg(3734);
const ID_FIELD: &str = "PREC_ID";

fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
    MultiPolygon::new(vec![polygon![
        (x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1), (x: x0, y: y0),
    ]])
}

/// Precincts with `PREC_ID` and `name` attributes.
fn precincts(cells: Vec<(&str, &str, MultiPolygon<f64>)>) -> Result<PolygonCollection> {
    let (records, shapes): (Vec<_>, Vec<_>) = cells.into_iter()
        .map(|(id, name, shape)| (vec![AttrValue::Text(id.into()), AttrValue::Text(name.into())], shape))
        .unzip();
    PolygonCollection::new(CRS, shapes, vec![ID_FIELD.into(), "name".into()], records)
}

fn write_results(path: &Path, ids: &[&str], d: &[i64], r: &[i64]) -> Result<()> {
    let mut df = DataFrame::new(vec![
        Column::new(ID_FIELD.into(), ids),
        Column::new("D_votes".into(), d),
        Column::new("R_votes".into(), r),
    ])?;
    csv::write_csv(&mut df, path)
}

/// Write the synthetic inputs and a `project.json` under `dir`, returning the loaded configuration.
pub fn generate_synthetic_example(dir: &Path) -> Result<ProjectConfig> {
    info!("Generating synthetic example data in {}", dir.display());
    let raw = dir.join("raw");
    ensure_dir_exists(&raw)?;

    precincts(vec![
        ("P1", "Cell_0", rect(0.0, 0.0, 1000.0, 1000.0)),
        ("P2", "Cell_1", rect(1000.0, 0.0, 2000.0, 1000.0)),
        ("P3", "Cell_2", rect(0.0, 1000.0, 1000.0, 2000.0)),
        ("P4", "Cell_3", rect(1000.0, 1000.0, 2000.0, 2000.0)),
    ])?.write_shapefile(&raw.join("precincts_2024/precincts_2024.shp"))?;
    write_results(&raw.join("results_2024.csv"), &["P1", "P2", "P3", "P4"], &[450, 550, 400, 600], &[350, 250, 400, 300])?;

    precincts(vec![
        ("P1", "Left", rect(0.0, 0.0, 1000.0, 2000.0)),
        ("P2", "TopRight", rect(1000.0, 0.0, 2000.0, 1000.0)),
        ("P3", "BottomRight", rect(1000.0, 1000.0, 2000.0, 2000.0)),
    ])?.write_shapefile(&raw.join("precincts_2022/precincts_2022.shp"))?;
    write_results(&raw.join("results_2022.csv"), &["P1", "P2", "P3"], &[800, 500, 550], &[700, 400, 350])?;

    precincts(vec![
        ("P1", "Top", rect(0.0, 0.0, 2000.0, 1000.0)),
        ("P2", "Bottom", rect(0.0, 1000.0, 2000.0, 2000.0)),
    ])?.write_shapefile(&raw.join("precincts_2020/precincts_2020.shp"))?;
    write_results(&raw.join("results_2020.csv"), &["P1", "P2"], &[900, 850], &[800, 850])?;

    // 4x4 blocks of 500 ft; population grows to the east.
    let (shapes, records): (Vec<_>, Vec<_>) = (0..16)
        .map(|k| {
            let (row, col) = ((k / 4) as f64, (k % 4) as f64);
            let shape = rect(col * 500.0, row * 500.0, (col + 1.0) * 500.0, (row + 1.0) * 500.0);
            let record = vec![AttrValue::Text(format!("B{k:02}")), AttrValue::Number(100.0 * (col + 1.0))];
            (shape, record)
        })
        .unzip();
    PolygonCollection::new(CRS, shapes, vec!["GEOID".into(), "POP".into()], records)?
        .write_shapefile(&raw.join("blocks/blocks.shp"))?;

    let years = ["2020", "2022", "2024"];
    let config = json!({
        "base_year": "2024",
        "crs": CRS.to_string(),
        "id_fields": years.iter().map(|y| (y.to_string(), json!(ID_FIELD))).collect::<serde_json::Map<_, _>>(),
        "paths": {
            "shapefiles": years.iter().map(|y| (y.to_string(), json!(format!("raw/precincts_{y}/precincts_{y}.shp")))).collect::<serde_json::Map<_, _>>(),
            "results_csv": years.iter().map(|y| (y.to_string(), json!(format!("raw/results_{y}.csv")))).collect::<serde_json::Map<_, _>>(),
        },
        "weights": { "blocks": "raw/blocks/blocks.shp", "block_pop_field": "POP" },
        "output": {
            "crosswalk_dir": "crosswalks",
            "harmonized_dir": "harmonized",
            "timeseries_csv": "timeseries.csv",
            "county_aggregates_csv": "county_aggregates.csv",
        },
        "options": {
            "sliver_tolerance": 1e-9,
            "overlap_warning_threshold": 0.98,
            "default_weight_method": "area",
        },
    });

    let config_path = dir.join("project.json");
    std::fs::write(&config_path, serde_json::to_string_pretty(&config)?)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    info!("  2024 (base): 4 precincts (2x2 grid)");
    info!("  2022: 3 precincts (different boundaries)");
    info!("  2020: 2 precincts (horizontal split)");
    ProjectConfig::load(&config_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_project_is_valid() {
        let tmp = tempfile::tempdir().unwrap();
        let config = generate_synthetic_example(tmp.path()).unwrap();

        config.validate().unwrap();
        assert_eq!(config.years(), vec!["2020", "2022", "2024"]);
        for year in config.years() {
            assert!(config.shapefile(&year).unwrap().exists());
            assert!(config.results_csv(&year).unwrap().exists());
        }
        assert!(config.resolve(&config.weights.as_ref().unwrap().blocks).exists());
    }
}
