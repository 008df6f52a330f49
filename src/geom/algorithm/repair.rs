use geo::{BooleanOps, MultiPolygon, Validation};

use crate::geom::Geometries;

/// Outcome of a geometry repair pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct RepairReport {
    /// Shapes that were invalid on input.
    pub(crate) invalid: usize,
    /// Shapes still invalid after repair.
    pub(crate) unresolved: usize,
}

impl Geometries {
    /// Repair invalid shapes with a self-union, the planar equivalent of a zero-width buffer.
    /// Shapes that stay invalid are kept as repaired and counted.
    pub(crate) fn repair(self) -> (Geometries, RepairReport) {
        let mut report = RepairReport::default();

        let shapes = self.into_shapes().into_iter()
            .map(|shape| {
                if shape.is_valid() { return shape }
                report.invalid += 1;

                let fixed = shape.union(&MultiPolygon::new(vec![]));
                if !fixed.is_valid() { report.unresolved += 1 }
                fixed
            })
            .collect();

        (Geometries::new(shapes), report)
    }
}

#[cfg(test)]
mod tests {
    use geo::{Area, polygon};

    use super::*;

    #[test]
    fn bowtie_is_split_into_valid_lobes() {
        let bowtie = MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0), (x: 2.0, y: 2.0), (x: 2.0, y: 0.0), (x: 0.0, y: 2.0), (x: 0.0, y: 0.0),
        ]]);
        assert!(!bowtie.is_valid());

        let (repaired, report) = Geometries::new(vec![bowtie]).repair();
        assert_eq!(report.invalid, 1);
        assert!((repaired.shape(0).unsigned_area() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn valid_shapes_are_untouched() {
        let square = MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0), (x: 0.0, y: 0.0),
        ]]);

        let (repaired, report) = Geometries::new(vec![square.clone()]).repair();
        assert_eq!(report, RepairReport::default());
        assert_eq!(repaired.shape(0), &square);
    }
}
