//! Plain-text camera profile: one `key=value` pair per line.
//!
//! ```text
//! cam_name=studio-a
//! sensor_width=36
//! focal_length=45.1
//! sol_cov=62.5
//! avg_err=0.18
//! hfov=21.9
//! norm_fx=1.25
//! dist_k1=-0.12
//! dist_k2=0.03
//! dist_k3=0
//! ```

use crate::result::CalibrationResult;
use log::info;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

#[derive(thiserror::Error, Debug)]
pub enum ProfileError {
    #[error("profile I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("profile is missing key `{0}`")]
    MissingKey(&'static str),

    #[error("invalid value `{value}` for key `{key}`")]
    InvalidValue { key: &'static str, value: String },

    #[error("calibration was not successful, nothing to export")]
    NotCalibrated,

    #[error("camera name `{0}` cannot be stored on a single `key=value` line")]
    InvalidCameraName(String),
}

/// Exported camera description, as consumed by tracking software.
#[derive(Clone, Debug, PartialEq)]
pub struct CameraProfile {
    pub camera_name: String,
    pub sensor_width: f64,
    pub focal_length: f64,
    /// Image area covered by the calibration boards, percent.
    pub solution_coverage: f64,
    pub average_error: f64,
    pub h_field_of_view: f64,
    pub normalized_fx: f64,
    pub k1: f64,
    pub k2: f64,
    pub k3: f64,
}

impl CameraProfile {
    /// Build a profile from a successful calibration.
    ///
    /// Names containing `=` or a line break are rejected, since the
    /// profile format could not read them back.
    pub fn from_calibration(
        camera_name: impl Into<String>,
        sensor_width: f64,
        calibration: &CalibrationResult,
    ) -> Result<Self, ProfileError> {
        if !calibration.success {
            return Err(ProfileError::NotCalibrated);
        }
        let camera_name = camera_name.into();
        if camera_name.contains(['=', '\n', '\r']) {
            return Err(ProfileError::InvalidCameraName(camera_name));
        }
        let d = calibration.intrinsics.distortion;
        Ok(Self {
            camera_name,
            sensor_width,
            focal_length: calibration.focal_length(sensor_width),
            solution_coverage: calibration.solution_coverage(),
            average_error: calibration.reprojection_error,
            h_field_of_view: calibration.h_field_of_view(),
            normalized_fx: calibration.h_ratio(),
            k1: d.k1,
            k2: d.k2,
            k3: d.k3,
        })
    }

    pub fn write_to<W: Write>(&self, mut out: W) -> Result<(), ProfileError> {
        write!(out, "{self}")?;
        out.flush()?;
        Ok(())
    }

    pub fn write_file(&self, path: impl AsRef<Path>) -> Result<(), ProfileError> {
        let path = path.as_ref();
        let file = fs::File::create(path)?;
        self.write_to(io::BufWriter::new(file))?;
        info!("wrote camera profile {}", path.display());
        Ok(())
    }

    /// Parse profile text. Lines that are not a single `key=value` pair
    /// and unknown keys are ignored.
    pub fn parse(text: &str) -> Result<Self, ProfileError> {
        let pairs: HashMap<&str, &str> = text
            .lines()
            .filter_map(|line| {
                let mut parts = line.trim().split('=');
                match (parts.next(), parts.next(), parts.next()) {
                    (Some(k), Some(v), None) => Some((k, v)),
                    _ => None,
                }
            })
            .collect();

        let text_of = |key: &'static str| pairs.get(key).copied().ok_or(ProfileError::MissingKey(key));
        let number = |key: &'static str| -> Result<f64, ProfileError> {
            let raw = text_of(key)?;
            raw.trim().parse::<f64>().map_err(|_| ProfileError::InvalidValue {
                key,
                value: raw.to_string(),
            })
        };

        Ok(Self {
            camera_name: text_of("cam_name")?.to_string(),
            sensor_width: number("sensor_width")?,
            focal_length: number("focal_length")?,
            solution_coverage: number("sol_cov")?,
            average_error: number("avg_err")?,
            h_field_of_view: number("hfov")?,
            normalized_fx: number("norm_fx")?,
            k1: number("dist_k1")?,
            k2: number("dist_k2")?,
            k3: number("dist_k3")?,
        })
    }

    pub fn read_file(path: impl AsRef<Path>) -> Result<Self, ProfileError> {
        Self::parse(&fs::read_to_string(path)?)
    }
}

impl fmt::Display for CameraProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "cam_name={}", self.camera_name)?;
        writeln!(f, "sensor_width={}", self.sensor_width)?;
        writeln!(f, "focal_length={}", self.focal_length)?;
        writeln!(f, "sol_cov={}", self.solution_coverage)?;
        writeln!(f, "avg_err={}", self.average_error)?;
        writeln!(f, "hfov={}", self.h_field_of_view)?;
        writeln!(f, "norm_fx={}", self.normalized_fx)?;
        writeln!(f, "dist_k1={}", self.k1)?;
        writeln!(f, "dist_k2={}", self.k2)?;
        writeln!(f, "dist_k3={}", self.k3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intrinsics::{Intrinsics, RadialDistortion};
    use chesscal_core::ImageSize;

    fn profile() -> CameraProfile {
        CameraProfile {
            camera_name: "bench cam".into(),
            sensor_width: 36.0,
            focal_length: 45.0,
            solution_coverage: 61.25,
            average_error: 0.1875,
            h_field_of_view: 24.2,
            normalized_fx: 1.25,
            k1: -0.125,
            k2: 0.0625,
            k3: -0.5,
        }
    }

    #[test]
    fn written_profile_parses_back() {
        let text = profile().to_string();
        assert!(text.starts_with("cam_name=bench cam\n"));
        assert!(text.contains("dist_k3=-0.5\n"));
        assert_eq!(CameraProfile::parse(&text).expect("parse"), profile());
    }

    #[test]
    fn malformed_lines_are_ignored() {
        let text = format!("# exported\nnote=a=b\n\n{}", profile());
        assert_eq!(CameraProfile::parse(&text).expect("parse"), profile());
    }

    #[test]
    fn missing_and_invalid_values_are_reported() {
        let text = profile().to_string().replace("avg_err=0.1875\n", "");
        assert!(matches!(
            CameraProfile::parse(&text),
            Err(ProfileError::MissingKey("avg_err"))
        ));

        let text = profile().to_string().replace("hfov=24.2", "hfov=wide");
        assert!(matches!(
            CameraProfile::parse(&text),
            Err(ProfileError::InvalidValue { key: "hfov", .. })
        ));
    }

    #[test]
    fn failed_calibration_cannot_be_exported() {
        let r = CalibrationResult::default();
        assert!(matches!(
            CameraProfile::from_calibration("x", 36.0, &r),
            Err(ProfileError::NotCalibrated)
        ));
    }

    fn solved() -> CalibrationResult {
        CalibrationResult {
            intrinsics: Intrinsics::new(800.0, 800.0, 320.0, 240.0, RadialDistortion::new(0.1, -0.05, 0.02)),
            reprojection_error: 0.3,
            source_image_size: ImageSize::new(640, 480),
            success: true,
            ..Default::default()
        }
    }

    #[test]
    fn profile_carries_the_third_radial_coefficient() {
        let r = solved();
        let p = CameraProfile::from_calibration("cam", 36.0, &r).expect("profile");
        assert_eq!(p.k3, 0.02);
        assert_eq!(p.focal_length, 45.0);
        assert_eq!(p.normalized_fx, 1.25);
    }

    #[test]
    fn names_that_break_the_line_format_are_rejected() {
        let r = solved();
        for name in ["a=b", "two\nlines"] {
            assert!(matches!(
                CameraProfile::from_calibration(name, 36.0, &r),
                Err(ProfileError::InvalidCameraName(n)) if n == name
            ));
        }

        let p = CameraProfile::from_calibration("rig 2 (left)", 36.0, &r).expect("profile");
        assert_eq!(CameraProfile::parse(&p.to_string()).expect("parse"), p);
    }
}
