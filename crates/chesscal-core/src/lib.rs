//! Core types shared by the `chesscal-*` crates.
//!
//! This crate is intentionally small and purely geometric. It knows about
//! boards, detected corner sets and planar homographies, but not about any
//! concrete corner detector, image decoder or solver.

mod corners;
mod homography;
mod image;
mod logger;

pub use corners::{BoardSize, CornerSet, ImageSize};
pub use homography::{estimate_homography, Homography};
pub use image::{sample_bilinear, GrayImageView};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
