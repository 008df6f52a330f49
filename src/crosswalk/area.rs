use crate::collection::PolygonCollection;

use super::{Flows, Units};

/// Intersection area between every past unit and every base unit, with each past unit's area as its total.
pub(crate) fn area_flows(
    past: &PolygonCollection,
    base: &PolygonCollection,
    past_units: &Units,
    base_units: &Units,
    sliver_tolerance: f64,
) -> Flows {
    let mut flows = Flows { totals: vec![0.0; past_units.len()], ..Default::default() };

    for (i, area) in past.geoms().areas().into_iter().enumerate() {
        flows.totals[past_units.unit_of[i]] += area;
    }

    for piece in past.geoms().overlay(base.geoms(), sliver_tolerance) {
        let key = (past_units.unit_of[piece.left], base_units.unit_of[piece.right]);
        *flows.pairs.entry(key).or_default() += piece.area;
    }

    flows
}
