use anyhow::{Context, Result, anyhow};
use geo::{Coord, MapCoords};
use proj4rs::{proj::Proj as Proj4, transform::transform};

use crate::geom::{Crs, Geometries};

/// Build a proj4rs projection for a CRS, failing if no definition is known.
fn build_proj(crs: &Crs) -> Result<Proj4> {
    let proj_string = crs.proj4()?;
    Proj4::from_proj_string(&proj_string)
        .map_err(|e| anyhow!("{e:?}"))
        .with_context(|| format!("failed to build PROJ.4: {proj_string}"))
}

impl Geometries {
    /// Reproject every coordinate from `from` to `to`, rebuilding the spatial index.
    /// Geographic systems are given and returned in degrees.
    pub(crate) fn reproject(&self, from: &Crs, to: &Crs) -> Result<Geometries> {
        if from == to { return Ok(self.clone()) }

        let source = build_proj(from)?;
        let target = build_proj(to)?;
        let (degrees_in, degrees_out) = (from.is_geographic(), to.is_geographic());

        let shapes = self.shapes().iter()
            .map(|shape| shape.try_map_coords(|coord: Coord<f64>| {
                let mut point = if degrees_in { (coord.x.to_radians(), coord.y.to_radians(), 0.0) }
                else { (coord.x, coord.y, 0.0) };

                transform(&source, &target, &mut point)
                    .map_err(|e| anyhow!("CRS transform failed at ({}, {}): {e:?}", coord.x, coord.y))?;

                Ok::<_, anyhow::Error>(if degrees_out { Coord { x: point.0.to_degrees(), y: point.1.to_degrees() } }
                else { Coord { x: point.0, y: point.1 } })
            }))
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("failed to reproject from {from} to {to}"))?;

        Ok(Geometries::new(shapes))
    }
}
