use crate::intrinsics::Intrinsics;
use chesscal_core::{CornerSet, ImageSize};
use chesscal_coverage::coverage_percent;
use nalgebra::Vector3;
use serde::Serialize;
use std::f64::consts::PI;

/// Sensor width used when none is given: a full-frame 36 mm sensor.
pub const DEFAULT_SENSOR_WIDTH_MM: f64 = 36.0;

/// Board pose of one calibration view, board frame to camera frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ViewPose {
    /// Rotation vector (axis * angle, radians).
    pub rotation: Vector3<f64>,
    pub translation: Vector3<f64>,
}

/// Outcome of a calibration run.
///
/// A default value is the failed/empty result. All derived accessors
/// return 0 unless `success` is set.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CalibrationResult {
    pub intrinsics: Intrinsics,
    /// Mean of `per_view_errors`; `+inf` until a calibration succeeds.
    pub reprojection_error: f64,
    /// Per view: L2 norm of the residual vector divided by the point count.
    pub per_view_errors: Vec<f64>,
    pub poses: Vec<ViewPose>,
    /// The corner sets the model was fitted to.
    pub corner_sets: Vec<CornerSet>,
    pub source_image_size: ImageSize,
    pub success: bool,
}

impl Default for CalibrationResult {
    fn default() -> Self {
        Self {
            intrinsics: Intrinsics::default(),
            reprojection_error: f64::INFINITY,
            per_view_errors: Vec::new(),
            poses: Vec::new(),
            corner_sets: Vec::new(),
            source_image_size: ImageSize::default(),
            success: false,
        }
    }
}

impl CalibrationResult {
    /// `fx` divided by the image width.
    pub fn h_ratio(&self) -> f64 {
        if !self.success || self.source_image_size.width == 0 {
            return 0.0;
        }
        self.intrinsics.fx() / self.source_image_size.width as f64
    }

    /// Horizontal field of view, `2 * (100 / pi) * atan(1 / (2 * h_ratio))`.
    ///
    /// The `100 / pi` scale is kept as-is so exported numbers stay
    /// comparable with existing profiles.
    pub fn h_field_of_view(&self) -> f64 {
        if !self.success {
            return 0.0;
        }
        2.0 * (100.0 / PI) * (2.0 * self.h_ratio()).powi(-1).atan()
    }

    /// Focal length in the unit of `sensor_width`.
    pub fn focal_length(&self, sensor_width: f64) -> f64 {
        if !self.success {
            return 0.0;
        }
        self.h_ratio() * sensor_width
    }

    /// Percentage of the image covered by the fitted boards.
    pub fn solution_coverage(&self) -> f64 {
        if !self.success {
            return 0.0;
        }
        coverage_percent(&self.corner_sets, self.source_image_size)
    }
}
