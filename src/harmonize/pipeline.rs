use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{error, info};

use crate::{
    collection::{PolygonCollection, normalize},
    common::StagedFiles,
    config::ProjectConfig,
    crosswalk::{Crosswalk, PopulationWeights, WeightMethod, build_crosswalk, validate_crosswalk},
    error::HarmonizeError,
    results::load_results_csv,
};

use super::{HarmonizedTable, base_year_table, reallocate};

/// The base geography, loaded once and shared by every year.
struct BaseGeography {
    collection: PolygonCollection,
    ids: Vec<String>,
    id_field: String,
}

impl BaseGeography {
    fn load(config: &ProjectConfig) -> Result<Self> {
        let id_field = config.id_field(&config.base_year)?.to_string();
        let collection = normalize(&config.shapefile(&config.base_year)?, &config.crs)
            .with_context(|| format!("Failed to load base year {} polygons", config.base_year))?;
        let ids = collection.ids(&id_field)?;
        Ok(Self { collection, ids, id_field })
    }
}

/// Load the census blocks configured for population weighting.
fn load_blocks(config: &ProjectConfig, weight: WeightMethod) -> Result<Option<(PolygonCollection, String)>> {
    if weight != WeightMethod::Pop { return Ok(None) }

    let weights = config.weights.as_ref().ok_or(HarmonizeError::MissingWeightInputs)?;
    let blocks = normalize(&config.resolve(&weights.blocks), &config.crs)
        .context("Failed to load census blocks")?;
    blocks.field_index(&weights.block_pop_field)?;
    Ok(Some((blocks, weights.block_pop_field.clone())))
}

/// Build the crosswalk and harmonized table for one year, persisting them only when every step succeeded.
fn harmonize_year(
    year: &str,
    config: &ProjectConfig,
    weight: WeightMethod,
    base: &BaseGeography,
    blocks: Option<&(PolygonCollection, String)>,
    save_outputs: bool,
) -> Result<(HarmonizedTable, Crosswalk)> {
    if year == config.base_year {
        return Err(HarmonizeError::BaseYearSelfHarmonize(config.base_year.clone()).into());
    }
    info!("Harmonizing year {year} onto base year {}", config.base_year);

    let past_field = config.id_field(year)?;
    let past = normalize(&config.shapefile(year)?, &config.crs)?;
    let results = load_results_csv(&config.results_csv(year)?, past_field,
        &config.results_columns.d, &config.results_columns.r)?;

    let population = blocks.map(|(blocks, pop_field)| PopulationWeights { blocks, pop_field });
    let crosswalk = build_crosswalk(&past, &base.collection, past_field, &base.id_field,
        weight, population, &config.crosswalk_options())?;
    validate_crosswalk(&crosswalk, config.options.overlap_warning_threshold);

    let table = reallocate(year, &config.base_year, &crosswalk, &results, &base.ids)?;

    if save_outputs {
        let (crosswalk_path, csv_path, layer_path) =
            (config.crosswalk_path(year), config.harmonized_path(year), config.harmonized_layer_path(year));

        let mut staged = StagedFiles::new();
        crosswalk.write_csv(&staged.stage(&crosswalk_path))?;
        table.write_csv(&staged.stage(&csv_path))?;
        table.write_geojson(&staged.stage(&layer_path), &base.collection, &base.ids)?;
        staged.commit()?;

        info!("Saved crosswalk to {}", crosswalk_path.display());
        info!("Saved {} and {}", csv_path.display(), layer_path.display());
    }

    Ok((table, crosswalk))
}

/// Harmonize one year's results onto the base geography.
pub fn reallocate_votes_to_base(
    year: &str,
    config: &ProjectConfig,
    weight: WeightMethod,
    save_outputs: bool,
) -> Result<(HarmonizedTable, Crosswalk)> {
    if year == config.base_year {
        return Err(HarmonizeError::BaseYearSelfHarmonize(config.base_year.clone()).into());
    }
    let base = BaseGeography::load(config)?;
    let blocks = load_blocks(config, weight)?;
    harmonize_year(year, config, weight, &base, blocks.as_ref(), save_outputs)
}

/// Build and persist the crosswalk from one year's polygons to the base geography.
pub fn crosswalk_year(year: &str, config: &ProjectConfig, weight: WeightMethod) -> Result<Crosswalk> {
    if year == config.base_year {
        return Err(HarmonizeError::BaseYearSelfHarmonize(config.base_year.clone()).into());
    }
    let base = BaseGeography::load(config)?;
    let blocks = load_blocks(config, weight)?;

    let past_field = config.id_field(year)?;
    let past = normalize(&config.shapefile(year)?, &config.crs)?;
    let population = blocks.as_ref().map(|(blocks, pop_field)| PopulationWeights { blocks, pop_field });
    let crosswalk = build_crosswalk(&past, &base.collection, past_field, &base.id_field,
        weight, population, &config.crosswalk_options())?;
    validate_crosswalk(&crosswalk, config.options.overlap_warning_threshold);

    let path = config.crosswalk_path(year);
    let mut staged = StagedFiles::new();
    crosswalk.write_csv(&staged.stage(&path))?;
    staged.commit()?;
    info!("Saved crosswalk to {}", path.display());
    Ok(crosswalk)
}

/// Outcome of [`harmonize_all`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HarmonizeSummary {
    pub succeeded: Vec<String>,
    /// Failed years with their error message.
    pub failed: Vec<(String, String)>,
}

/// Harmonize every non-base year in parallel, then write the base year's own table.
///
/// A failing year is logged and skipped; the others still complete.
pub fn harmonize_all(config: &ProjectConfig, weight: WeightMethod) -> Result<HarmonizeSummary> {
    config.validate()?;
    let years = config.non_base_years();
    info!("Harmonizing {} years onto base year {}: {}", years.len(), config.base_year, years.join(", "));

    let base = BaseGeography::load(config)?;
    let blocks = load_blocks(config, weight)?;

    let outcomes = years.par_iter()
        .map(|year| (year, harmonize_year(year, config, weight, &base, blocks.as_ref(), true)))
        .collect::<Vec<_>>();

    let mut summary = HarmonizeSummary::default();
    for (year, outcome) in outcomes {
        match outcome {
            Ok(_) => summary.succeeded.push(year.clone()),
            Err(e) => {
                error!("Failed to harmonize year {year}: {e:#}");
                summary.failed.push((year.clone(), format!("{e:#}")));
            }
        }
    }

    let base_results = load_results_csv(&config.results_csv(&config.base_year)?, &base.id_field,
        &config.results_columns.d, &config.results_columns.r)?;
    let table = base_year_table(&config.base_year, &base.id_field, &base_results, &base.ids);
    let mut staged = StagedFiles::new();
    table.write_csv(&staged.stage(&config.harmonized_path(&config.base_year)))?;
    table.write_geojson(&staged.stage(&config.harmonized_layer_path(&config.base_year)), &base.collection, &base.ids)?;
    staged.commit()?;
    info!("Saved base year {} data", config.base_year);

    info!(succeeded = summary.succeeded.len(), failed = summary.failed.len(), "Harmonization complete");
    Ok(summary)
}
