mod algorithm;
mod crs;
mod geom;

pub use crs::Crs;
pub use geom::Geometries;
