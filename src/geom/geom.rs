use geo::{Area, BoundingRect, Coord, MultiPolygon, Rect};
use rstar::{AABB, RTree, primitives::{GeomWithData, Rectangle}};

/// Bounding rectangle of a shape, tagged with the shape's index.
type IndexedRect = GeomWithData<Rectangle<[f64; 2]>, usize>;

/// Geometries represents a collection of non-overlapping MultiPolygons with a spatial index.
#[derive(Debug, Clone)]
pub struct Geometries {
    shapes: Vec<MultiPolygon<f64>>,
    rtree: RTree<IndexedRect>,
}

impl Geometries {
    /// Construct a Geometries object from a vector of MultiPolygons.
    /// Empty shapes keep their index but are left out of the R-tree.
    pub fn new(shapes: Vec<MultiPolygon<f64>>) -> Self {
        Self {
            rtree: RTree::bulk_load(
                shapes.iter().enumerate()
                    .filter_map(|(i, shape)| shape.bounding_rect().map(|rect| {
                        IndexedRect::new(Rectangle::from_corners(rect.min().into(), rect.max().into()), i)
                    }))
                    .collect()
            ),
            shapes,
        }
    }

    /// Get the number of MultiPolygons.
    #[inline] pub fn len(&self) -> usize { self.shapes.len() }

    /// Check if there are no MultiPolygons.
    #[inline] pub fn is_empty(&self) -> bool { self.shapes.is_empty() }

    /// Get a reference to the list of MultiPolygons.
    #[inline] pub fn shapes(&self) -> &[MultiPolygon<f64>] { &self.shapes }

    /// Get a single MultiPolygon by index.
    #[inline] pub fn shape(&self, idx: usize) -> &MultiPolygon<f64> { &self.shapes[idx] }

    /// Take ownership of the underlying MultiPolygons.
    #[inline] pub fn into_shapes(self) -> Vec<MultiPolygon<f64>> { self.shapes }

    /// Planar area of every MultiPolygon, in CRS units squared.
    pub fn areas(&self) -> Vec<f64> {
        self.shapes.iter().map(|shape| shape.unsigned_area()).collect()
    }

    /// Indices of shapes whose bounding boxes intersect `rect`, in ascending order.
    pub(crate) fn candidates(&self, rect: &Rect<f64>) -> Vec<usize> {
        let envelope = AABB::from_corners(rect.min().into(), rect.max().into());
        let mut found = self.rtree.locate_in_envelope_intersecting(&envelope)
            .map(|indexed| indexed.data)
            .collect::<Vec<_>>();
        found.sort_unstable();
        found
    }

    /// Compute the bounding rectangle of all MultiPolygons.
    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.shapes.iter()
            .filter_map(|shape| shape.bounding_rect())
            .reduce(|a, b| Rect::new(
                Coord {
                    x: a.min().x.min(b.min().x),
                    y: a.min().y.min(b.min().y),
                },
                Coord {
                    x: a.max().x.max(b.max().x),
                    y: a.max().y.max(b.max().y),
                }
            ))
    }
}
