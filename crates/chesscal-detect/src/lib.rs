//! Chessboard inner-corner detection.
//!
//! ## Quickstart
//!
//! ```no_run
//! use chesscal_detect::{CornerDetector, DetectorParams};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let img = image::open("frame.png")?;
//! let detector = CornerDetector::new(DetectorParams::default());
//! let corners = detector.detect(&img, 7, 6);
//! println!("detected: {}", corners.is_valid());
//! # Ok(())
//! # }
//! ```
//!
//! Pipeline:
//! 1. Convert to 8-bit grayscale and stretch contrast between the 1st and
//!    99th intensity percentiles.
//! 2. Extract ChESS saddle-point candidates (`chess-corners`) above a
//!    relative response threshold.
//! 3. Reject hopeless images early: fewer candidates than board corners.
//! 4. Grow a lattice from strong seeds by linear extrapolation and accept
//!    exactly one fully populated `width x height` window.
//! 5. Refine each corner to sub-pixel accuracy (gradient orthogonality).
//!
//! Failure is never an error: it yields an invalid [`CornerSet`].

mod board;
mod candidates;
mod detector;
mod grid;
mod params;
mod subpix;
pub mod synthetic;

pub use board::generate_board_image;
pub use detector::CornerDetector;
pub use params::{DetectorParams, SubPixParams};
pub use subpix::refine_corner;

pub use chesscal_core::{BoardSize, CornerSet, ImageSize};
