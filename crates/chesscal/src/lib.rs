//! High-level facade for the `chesscal-*` workspace.
//!
//! This crate provides:
//! - re-exports of the underlying crates and their most used types
//! - [`PipelineConfig`], a JSON-loadable description of a calibration job
//! - [`Pipeline`], which runs detection, coverage-driven view selection,
//!   calibration, undistortion and profile export end to end
//!
//! ## Quickstart
//!
//! ```no_run
//! use chesscal::{Pipeline, PipelineConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = Pipeline::new(PipelineConfig::load_json("calib.json")?);
//! let frames = Pipeline::load_images(["f000.png", "f001.png", "f002.png"])?;
//! let result = pipeline.run(&frames);
//! println!("error: {:.3} px", result.reprojection_error);
//! pipeline.profile(&result)?.write_file("camera.txt")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `chesscal::core`: boards, corner sets, homographies, logging.
//! - `chesscal::detect`: chessboard corner detection.
//! - `chesscal::coverage`: coverage area and greedy view selection.
//! - `chesscal::calib`: calibration, undistortion, camera profiles.

pub use chesscal_calib as calib;
pub use chesscal_core as core;
pub use chesscal_coverage as coverage;
pub use chesscal_detect as detect;

pub use chesscal_calib::{
    calibrate, calibrate_single, undistort, undistort_corner_set, CalibrationParams,
    CalibrationResult, CameraCalibrator, CameraProfile, Intrinsics, ProfileError,
    RadialDistortion, DEFAULT_SENSOR_WIDTH_MM,
};
pub use chesscal_core::{init_with_level, BoardSize, CornerSet, ImageSize};
pub use chesscal_coverage::{coverage_area, coverage_percent, select};
pub use chesscal_detect::{generate_board_image, CornerDetector, DetectorParams};

mod config;
mod pipeline;

pub use config::{ConfigError, PipelineConfig};
pub use pipeline::{Pipeline, PipelineError};
