use geo::{Area, BooleanOps, BoundingRect};
use rayon::prelude::*;

use crate::geom::Geometries;

/// A non-sliver intersection between shape `left` of one collection and shape `right` of another.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Piece {
    pub(crate) left: usize,
    pub(crate) right: usize,
    pub(crate) area: f64,
}

impl Geometries {
    /// Intersect every shape with every overlapping shape of `other`.
    /// Candidate pairs are pruned with `other`'s R-tree; pieces with area <= `sliver_tolerance`
    /// are dropped. Output is ordered by `left`, then `right`.
    pub(crate) fn overlay(&self, other: &Geometries, sliver_tolerance: f64) -> Vec<Piece> {
        (0..self.len()).into_par_iter()
            .map(|left| {
                let shape = self.shape(left);
                let Some(rect) = shape.bounding_rect() else { return Vec::new() };
                other.candidates(&rect).into_iter()
                    .filter_map(|right| {
                        let area = shape.intersection(other.shape(right)).unsigned_area();
                        (area > sliver_tolerance).then_some(Piece { left, right, area })
                    })
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>()
            .into_iter()
            .flatten()
            .collect()
    }
}
