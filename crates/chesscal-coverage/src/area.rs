use chesscal_core::{CornerSet, ImageSize};
use geo::{Area, BooleanOps, Coord, LineString, MultiPolygon, Polygon};
use log::trace;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Polygons thinner than this (in square pixels) carry no coverage.
const MIN_POLYGON_AREA: f64 = 1e-9;

/// Polygon spanned by the outer corner ring of `set`.
///
/// `None` for sets with fewer than 4 boundary points, non-finite corners or
/// a degenerate (zero-area) ring.
pub fn board_polygon(set: &CornerSet) -> Option<Polygon<f64>> {
    let ring = set.outer_boundary();
    if ring.len() < 4 {
        return None;
    }
    if ring.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
        return None;
    }

    let coords: Vec<Coord<f64>> = ring
        .iter()
        .map(|p| Coord {
            x: p.x as f64,
            y: p.y as f64,
        })
        .collect();
    let poly = Polygon::new(LineString::from(coords), vec![]);
    if poly.unsigned_area() < MIN_POLYGON_AREA {
        trace!("skipping degenerate board polygon");
        return None;
    }
    Some(poly)
}

/// Running union of board polygons.
#[derive(Clone, Debug)]
pub struct CoverageAccumulator {
    union: MultiPolygon<f64>,
    boards: usize,
}

impl Default for CoverageAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl CoverageAccumulator {
    pub fn new() -> Self {
        Self {
            union: MultiPolygon::new(Vec::new()),
            boards: 0,
        }
    }

    /// Number of polygons folded in so far.
    pub fn boards(&self) -> usize {
        self.boards
    }

    /// Area of the current union in square pixels.
    pub fn area(&self) -> f64 {
        self.union.unsigned_area()
    }

    /// Fold `set` into the union. Returns `false` if it has no usable polygon.
    pub fn add(&mut self, set: &CornerSet) -> bool {
        match board_polygon(set) {
            Some(poly) => {
                self.add_polygon(poly);
                true
            }
            None => false,
        }
    }

    pub fn add_polygon(&mut self, poly: Polygon<f64>) {
        self.union = self.union.union(&MultiPolygon::new(vec![poly]));
        self.boards += 1;
    }

    /// Area the union would have after adding `poly`, leaving `self` untouched.
    pub fn area_with(&self, poly: &Polygon<f64>) -> f64 {
        self.union
            .union(&MultiPolygon::new(vec![poly.clone()]))
            .unsigned_area()
    }
}

/// Area of the union of all board polygons in `sets`, in square pixels.
///
/// Sets without a usable outer ring are skipped; no usable set gives 0.
#[cfg_attr(feature = "tracing", instrument(level = "debug", skip(sets), fields(count = sets.len())))]
pub fn coverage_area(sets: &[CornerSet]) -> f64 {
    let mut acc = CoverageAccumulator::new();
    for set in sets {
        acc.add(set);
    }
    acc.area()
}

/// Covered share of an `image` sized frame, in percent.
///
/// Returns 0 for an empty image.
pub fn coverage_percent(sets: &[CornerSet], image: ImageSize) -> f64 {
    if image.is_empty() {
        return 0.0;
    }
    coverage_area(sets) / image.area() * 100.0
}
