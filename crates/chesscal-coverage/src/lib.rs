//! How much of the image plane a collection of chessboard detections covers,
//! and which subset of views covers it best.
//!
//! Each valid [`CornerSet`](chesscal_core::CornerSet) contributes the polygon
//! spanned by its outer corner ring. Polygons are merged by set union so
//! overlapping boards are never counted twice.

mod area;
mod select;

pub use area::{board_polygon, coverage_area, coverage_percent, CoverageAccumulator};
pub use select::select;
