//! Crosswalks: fractional mappings from one precinct layout ("past") onto another ("base").

mod area;
mod io;
mod population;
mod validate;

use std::{fmt, str::FromStr};

use ahash::AHashMap;
use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{collection::PolygonCollection, error::HarmonizeError};

pub use validate::{CrosswalkStats, validate_crosswalk};

/// How the share of a past precinct assigned to each base precinct is measured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightMethod {
    /// Share of the past precinct's area.
    #[default]
    Area,
    /// Share of the past precinct's population, estimated through census blocks.
    Pop,
}

impl fmt::Display for WeightMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WeightMethod::Area => "area",
            WeightMethod::Pop => "pop",
        })
    }
}

impl FromStr for WeightMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "area" => Ok(WeightMethod::Area),
            "pop" | "population" => Ok(WeightMethod::Pop),
            other => bail!("unknown weight method {other:?}; expected \"area\" or \"pop\""),
        }
    }
}

/// Tolerances used while building a crosswalk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrosswalkOptions {
    /// Intersection pieces with area at or below this (in CRS units squared) are discarded.
    pub sliver_tolerance: f64,
    /// Coverage below this fraction is reported as a warning.
    pub overlap_warning_threshold: f64,
}

impl Default for CrosswalkOptions {
    fn default() -> Self {
        Self { sliver_tolerance: 1e-9, overlap_warning_threshold: 0.98 }
    }
}

/// Blocks carrying population counts, used for population weighting.
#[derive(Debug, Clone, Copy)]
pub struct PopulationWeights<'a> {
    pub blocks: &'a PolygonCollection,
    pub pop_field: &'a str,
}

/// One row of a crosswalk.
#[derive(Debug, Clone, PartialEq)]
pub struct CrosswalkEntry {
    pub past_id: String,
    pub base_id: String,
    pub frac: f64,
}

/// A fractional mapping from past precinct identifiers to base precinct identifiers.
///
/// For every past identifier present, the fractions sum to 1.0. Past identifiers with no
/// overlap at all have no rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Crosswalk {
    entries: Vec<CrosswalkEntry>,
    method: WeightMethod,
    past_field: String,
    base_field: String,
}

impl Crosswalk {
    pub fn new(entries: Vec<CrosswalkEntry>, method: WeightMethod, past_field: &str, base_field: &str) -> Self {
        Self { entries, method, past_field: past_field.to_string(), base_field: base_field.to_string() }
    }

    #[inline] pub fn entries(&self) -> &[CrosswalkEntry] { &self.entries }
    #[inline] pub fn method(&self) -> WeightMethod { self.method }
    #[inline] pub fn past_field(&self) -> &str { &self.past_field }
    #[inline] pub fn base_field(&self) -> &str { &self.base_field }
    #[inline] pub fn len(&self) -> usize { self.entries.len() }
    #[inline] pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

/// Distinct identifiers of a collection in first-seen order, with each polygon's position among them.
/// Polygons sharing an identifier are treated as one unit.
#[derive(Debug)]
pub(crate) struct Units {
    pub(crate) ids: Vec<String>,
    pub(crate) unit_of: Vec<usize>,
}

impl Units {
    pub(crate) fn new(ids: Vec<String>) -> Self {
        let mut index = AHashMap::new();
        let mut unique = Vec::new();
        let unit_of = ids.into_iter()
            .map(|id| *index.entry(id.clone()).or_insert_with(|| { unique.push(id); unique.len() - 1 }))
            .collect::<Vec<_>>();

        Self { ids: unique, unit_of }
    }

    #[inline] pub(crate) fn len(&self) -> usize { self.ids.len() }
}

/// Weight flowing from each past unit to each base unit, plus each past unit's total weight.
#[derive(Debug, Default)]
pub(crate) struct Flows {
    pub(crate) pairs: AHashMap<(usize, usize), f64>,
    pub(crate) totals: Vec<f64>,
}

impl Flows {
    /// Total flow leaving each past unit.
    pub(crate) fn outflow(&self, n_past: usize) -> Vec<f64> {
        let mut outflow = vec![0.0; n_past];
        for (&(past, _), &flow) in &self.pairs { outflow[past] += flow }
        outflow
    }
}

/// Warn once for all past units whose coverage is below `threshold`.
fn warn_low_coverage(coverage: &[f64], threshold: f64, method: WeightMethod) {
    let low = coverage.iter().copied()
        .filter(|&c| c > 0.0 && c < threshold)
        .collect::<Vec<_>>();
    if let Some(min) = low.iter().copied().reduce(f64::min) {
        warn!("{} past precincts have {method} coverage below {threshold:.2} (minimum {min:.4})", low.len());
    }
}

/// Turn flows into normalized crosswalk rows, ordered by past unit then base unit.
fn normalize_flows(flows: &Flows, past: &Units, base: &Units) -> Vec<CrosswalkEntry> {
    let outflow = flows.outflow(past.len());

    let mut pairs = flows.pairs.iter()
        .filter(|&(&(p, _), &flow)| flow > 0.0 && outflow[p] > 0.0)
        .map(|(&key, &flow)| (key, flow))
        .collect::<Vec<_>>();
    pairs.sort_unstable_by_key(|&(key, _)| key);

    pairs.into_iter()
        .map(|((p, b), flow)| CrosswalkEntry {
            past_id: past.ids[p].clone(),
            base_id: base.ids[b].clone(),
            frac: flow / outflow[p],
        })
        .collect()
}

/// Build a crosswalk from `past` onto `base`.
///
/// Both collections must share one CRS. Population weighting requires `population`;
/// area weighting ignores it.
pub fn build_crosswalk(
    past: &PolygonCollection,
    base: &PolygonCollection,
    past_id_field: &str,
    base_id_field: &str,
    weight: WeightMethod,
    population: Option<PopulationWeights>,
    options: &CrosswalkOptions,
) -> Result<Crosswalk> {
    if past.crs() != base.crs() {
        return Err(HarmonizeError::CrsMismatch { left: past.crs().clone(), right: base.crs().clone() }.into());
    }

    let past_units = Units::new(past.ids(past_id_field)?);
    let base_units = Units::new(base.ids(base_id_field)?);
    if past_units.len() < past.len() {
        warn!("{} past polygons share an identifier with another; merging them", past.len() - past_units.len());
    }
    if base_units.len() < base.len() {
        warn!("{} base polygons share an identifier with another; merging them", base.len() - base_units.len());
    }

    let area_flows = area::area_flows(past, base, &past_units, &base_units, options.sliver_tolerance);

    let flows = match weight {
        WeightMethod::Area => area_flows,
        WeightMethod::Pop => {
            let Some(PopulationWeights { blocks, pop_field }) = population else {
                return Err(HarmonizeError::MissingWeightInputs.into());
            };
            if blocks.crs() != past.crs() {
                return Err(HarmonizeError::CrsMismatch { left: blocks.crs().clone(), right: past.crs().clone() }.into());
            }
            population::population_flows(past, base, &past_units, &base_units, blocks, pop_field, area_flows, options.sliver_tolerance)?
        }
    };

    let outflow = flows.outflow(past_units.len());
    let coverage = outflow.iter().zip(&flows.totals)
        .map(|(&out, &total)| if total > 0.0 { out / total } else { 0.0 })
        .collect::<Vec<_>>();
    warn_low_coverage(&coverage, options.overlap_warning_threshold, weight);

    let unmatched = outflow.iter().filter(|&&out| out <= 0.0).count();
    if unmatched > 0 {
        warn!("{unmatched} past precincts do not overlap any base precinct and have no crosswalk rows");
    }

    let entries = normalize_flows(&flows, &past_units, &base_units);
    info!(rows = entries.len(), past = past_units.len(), base = base_units.len(), method = %weight, "Built crosswalk");

    Ok(Crosswalk::new(entries, weight, past_id_field, base_id_field))
}
