//! Pinhole camera calibration from chessboard corner sets.
//!
//! The camera model is a pinhole with three radial distortion terms
//! (`k1`, `k2`, `k3`); tangential distortion is not modelled.
//! Calibration never errors: missing or unusable input produces a
//! default [`CalibrationResult`] with `success == false`.
//!
//! ```no_run
//! use chesscal_calib::{calibrate, undistort};
//! # fn frames() -> Vec<chesscal_core::CornerSet> { Vec::new() }
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let result = calibrate(&frames(), Some(10));
//! if result.success {
//!     println!("fx = {:.1}, error = {:.3} px", result.intrinsics.fx(), result.reprojection_error);
//!     let frame = image::open("frame.png")?;
//!     undistort(&frame, &result).save("frame_undistorted.png")?;
//! }
//! # Ok(())
//! # }
//! ```

mod calibrator;
mod intrinsics;
mod lm;
mod params;
mod profile;
mod result;
mod undistort;
mod zhang;

pub use calibrator::{calibrate, calibrate_single, CameraCalibrator};
pub use intrinsics::{Intrinsics, RadialDistortion};
pub use params::{CalibrationParams, SolverOptions};
pub use profile::{CameraProfile, ProfileError};
pub use result::{CalibrationResult, ViewPose, DEFAULT_SENSOR_WIDTH_MM};
pub use undistort::{undistort, undistort_corner_set, Sample, UndistortMap};
