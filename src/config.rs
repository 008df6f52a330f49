//! Project configuration, loaded from a JSON file.

use std::{collections::BTreeMap, fs, path::{Path, PathBuf}};

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};

use crate::{common::compare_years, crosswalk::{CrosswalkOptions, WeightMethod}, error::HarmonizeError, geom::Crs};

/// A year written either as a JSON string or a JSON number.
#[derive(Deserialize)]
#[serde(untagged)]
enum YearValue {
    Text(String),
    Number(i64),
}

fn deserialize_year<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match YearValue::deserialize(deserializer)? {
        YearValue::Text(year) => year.trim().to_string(),
        YearValue::Number(year) => year.to_string(),
    })
}

/// Input datasets per election year.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PathsConfig {
    /// Precinct polygons (shapefile or GeoJSON) per year.
    pub shapefiles: BTreeMap<String, PathBuf>,
    /// Results CSV per year.
    #[serde(default)]
    pub results_csv: BTreeMap<String, PathBuf>,
}

/// Names of the vote columns in results CSVs.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResultsColumns {
    #[serde(default = "default_d_column")]
    pub d: String,
    #[serde(default = "default_r_column")]
    pub r: String,
}

fn default_d_column() -> String { "D_votes".to_string() }
fn default_r_column() -> String { "R_votes".to_string() }

impl Default for ResultsColumns {
    fn default() -> Self {
        Self { d: default_d_column(), r: default_r_column() }
    }
}

/// Census blocks used for population weighting.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WeightsConfig {
    pub blocks: PathBuf,
    pub block_pop_field: String,
}

/// Where outputs are written.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub crosswalk_dir: PathBuf,
    pub harmonized_dir: PathBuf,
    pub timeseries_csv: PathBuf,
    pub county_aggregates_csv: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            crosswalk_dir: "data/interim".into(),
            harmonized_dir: "data/processed".into(),
            timeseries_csv: "data/processed/timeseries_per_precinct.csv".into(),
            county_aggregates_csv: "data/processed/county_aggregates.csv".into(),
        }
    }
}

/// Numeric tolerances and defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OptionsConfig {
    pub sliver_tolerance: f64,
    pub overlap_warning_threshold: f64,
    pub default_weight_method: WeightMethod,
}

impl Default for OptionsConfig {
    fn default() -> Self {
        let crosswalk = CrosswalkOptions::default();
        Self {
            sliver_tolerance: crosswalk.sliver_tolerance,
            overlap_warning_threshold: crosswalk.overlap_warning_threshold,
            default_weight_method: WeightMethod::Area,
        }
    }
}

/// Project configuration.
///
/// Relative paths are resolved against the directory of the configuration file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProjectConfig {
    #[serde(deserialize_with = "deserialize_year")]
    pub base_year: String,
    /// Planar CRS every collection is brought into.
    pub crs: Crs,
    /// Identifier field of the precinct polygons, per year.
    pub id_fields: BTreeMap<String, String>,
    pub paths: PathsConfig,
    #[serde(default)]
    pub results_columns: ResultsColumns,
    #[serde(default)]
    pub weights: Option<WeightsConfig>,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub options: OptionsConfig,
    #[serde(skip)]
    root: PathBuf,
}

impl ProjectConfig {
    /// Load a configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config = Self::from_json(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(config)
    }

    /// Parse a configuration from JSON text. Relative paths stay relative to the working directory.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse config JSON")
    }

    /// Write the configuration as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    /// Resolve a configured path against the configuration's directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() { path.to_path_buf() } else { self.root.join(path) }
    }

    /// Check the configuration for missing entries.
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| -> anyhow::Error { HarmonizeError::InvalidConfig(message).into() };
        let base = &self.base_year;

        if !self.paths.shapefiles.contains_key(base) {
            return Err(invalid(format!("base year {base} has no entry in paths.shapefiles")));
        }
        if !self.paths.results_csv.contains_key(base) {
            return Err(invalid(format!("base year {base} has no entry in paths.results_csv")));
        }
        if let Some(year) = self.paths.shapefiles.keys().find(|year| !self.id_fields.contains_key(*year)) {
            return Err(invalid(format!("year {year} has geometry but no entry in id_fields")));
        }
        if !(self.options.sliver_tolerance >= 0.0) {
            return Err(invalid("options.sliver_tolerance must be non-negative".into()));
        }
        if !(self.options.overlap_warning_threshold > 0.0 && self.options.overlap_warning_threshold <= 1.0) {
            return Err(invalid("options.overlap_warning_threshold must be in (0, 1]".into()));
        }
        if self.options.default_weight_method == WeightMethod::Pop && self.weights.is_none() {
            return Err(invalid("default_weight_method is \"pop\" but no weights section is configured".into()));
        }
        Ok(())
    }

    /// Every year with geometry, in chronological order.
    pub fn years(&self) -> Vec<String> {
        let mut years = self.paths.shapefiles.keys().cloned().collect::<Vec<_>>();
        years.sort_by(|a, b| compare_years(a, b));
        years
    }

    /// Every year except the base year, in chronological order.
    pub fn non_base_years(&self) -> Vec<String> {
        self.years().into_iter().filter(|year| year != &self.base_year).collect()
    }

    /// Identifier field of a year's polygons.
    pub fn id_field(&self, year: &str) -> Result<&str> {
        self.id_fields.get(year)
            .map(String::as_str)
            .ok_or_else(|| HarmonizeError::InvalidConfig(format!("year {year} has no entry in id_fields")).into())
    }

    /// Polygon path of a year.
    pub fn shapefile(&self, year: &str) -> Result<PathBuf> {
        self.paths.shapefiles.get(year)
            .map(|path| self.resolve(path))
            .ok_or_else(|| HarmonizeError::InvalidConfig(format!("year {year} has no entry in paths.shapefiles")).into())
    }

    /// Results CSV path of a year.
    pub fn results_csv(&self, year: &str) -> Result<PathBuf> {
        self.paths.results_csv.get(year)
            .map(|path| self.resolve(path))
            .ok_or_else(|| HarmonizeError::InvalidConfig(format!("year {year} has no entry in paths.results_csv")).into())
    }

    pub fn crosswalk_options(&self) -> CrosswalkOptions {
        CrosswalkOptions {
            sliver_tolerance: self.options.sliver_tolerance,
            overlap_warning_threshold: self.options.overlap_warning_threshold,
        }
    }

    pub fn crosswalk_dir(&self) -> PathBuf { self.resolve(&self.output.crosswalk_dir) }
    pub fn harmonized_dir(&self) -> PathBuf { self.resolve(&self.output.harmonized_dir) }
    pub fn timeseries_path(&self) -> PathBuf { self.resolve(&self.output.timeseries_csv) }
    pub fn county_aggregates_path(&self) -> PathBuf { self.resolve(&self.output.county_aggregates_csv) }

    /// `crosswalk_<year>_to_<base>.csv` in the crosswalk directory.
    pub fn crosswalk_path(&self, year: &str) -> PathBuf {
        self.crosswalk_dir().join(format!("crosswalk_{year}_to_{}.csv", self.base_year))
    }

    /// `harmonized_<year>_on_<base>.csv` in the harmonized directory.
    pub fn harmonized_path(&self, year: &str) -> PathBuf {
        self.harmonized_dir().join(format!("harmonized_{year}_on_{}.csv", self.base_year))
    }

    /// `yr_<year>_on_<base>.geojson` in the harmonized directory.
    pub fn harmonized_layer_path(&self, year: &str) -> PathBuf {
        self.harmonized_dir().join(format!("yr_{year}_on_{}.geojson", self.base_year))
    }
}
