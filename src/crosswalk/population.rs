use ahash::AHashMap;
use anyhow::Result;
use tracing::warn;

use crate::{collection::PolygonCollection, geom::Geometries};

use super::{Flows, Units};

/// Population of each block allocated to the units of `target`, by share of block area.
/// Returns, per block, the (unit, population) pairs it feeds.
fn allocate_blocks(
    blocks: &Geometries,
    population: &[f64],
    target: &Geometries,
    units: &Units,
    sliver_tolerance: f64,
) -> Vec<Vec<(usize, f64)>> {
    let block_areas = blocks.areas();
    let mut allocations: Vec<AHashMap<usize, f64>> = vec![AHashMap::new(); blocks.len()];

    for piece in blocks.overlay(target, sliver_tolerance) {
        let block_area = block_areas[piece.left];
        if block_area <= 0.0 { continue }
        *allocations[piece.left].entry(units.unit_of[piece.right]).or_default()
            += population[piece.left] * piece.area / block_area;
    }

    allocations.into_iter()
        .map(|allocation| {
            let mut pairs = allocation.into_iter().collect::<Vec<_>>();
            pairs.sort_unstable_by_key(|&(unit, _)| unit);
            pairs
        })
        .collect()
}

/// Population flowing from past units to base units through census blocks.
///
/// Each block's population is split across past and across base units by area; the flow
/// through a block between a past and a base unit is the smaller of the two allocations.
/// Past units that overlap base geometry but receive no block flow keep their area flows.
pub(crate) fn population_flows(
    past: &PolygonCollection,
    base: &PolygonCollection,
    past_units: &Units,
    base_units: &Units,
    blocks: &PolygonCollection,
    pop_field: &str,
    area_flows: Flows,
    sliver_tolerance: f64,
) -> Result<Flows> {
    let population = blocks.numeric(pop_field)?;

    let to_past = allocate_blocks(blocks.geoms(), &population, past.geoms(), past_units, sliver_tolerance);
    let to_base = allocate_blocks(blocks.geoms(), &population, base.geoms(), base_units, sliver_tolerance);

    let mut flows = Flows { totals: vec![0.0; past_units.len()], ..Default::default() };
    for (past_alloc, base_alloc) in to_past.iter().zip(&to_base) {
        for &(p, past_pop) in past_alloc {
            flows.totals[p] += past_pop;
            for &(b, base_pop) in base_alloc {
                let flow = past_pop.min(base_pop);
                if flow > 0.0 { *flows.pairs.entry((p, b)).or_default() += flow }
            }
        }
    }

    // Unpopulated past units fall back to area weighting so their votes are not dropped.
    let outflow = flows.outflow(past_units.len());
    let area_outflow = area_flows.outflow(past_units.len());
    let fallback = (0..past_units.len())
        .filter(|&p| outflow[p] <= 0.0 && area_outflow[p] > 0.0)
        .collect::<Vec<_>>();

    if !fallback.is_empty() {
        warn!("{} past precincts have no block population overlapping base precincts; using area weights for them",
            fallback.len());
        for &p in &fallback { flows.totals[p] = area_flows.totals[p] }
        flows.pairs.extend(area_flows.pairs.into_iter().filter(|&((p, _), _)| fallback.binary_search(&p).is_ok()));
    }

    Ok(flows)
}
