use crate::config::PipelineConfig;
use chesscal_calib::{undistort, CalibrationResult, CameraCalibrator, CameraProfile, ProfileError};
use chesscal_core::{BoardSize, CornerSet};
use chesscal_detect::{generate_board_image, CornerDetector};
use image::{DynamicImage, GrayImage};
use log::info;
use std::path::{Path, PathBuf};
use std::{fs, io};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Errors at the edges of the pipeline (files in, reports out).
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("failed to load image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Profile(#[from] ProfileError),
}

/// Detection → selection → calibration, configured once.
#[derive(Clone, Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    detector: CornerDetector,
    calibrator: CameraCalibrator,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let detector = CornerDetector::new(config.detector.clone());
        let calibrator = CameraCalibrator::new(config.calibration.clone());
        Self {
            config,
            detector,
            calibrator,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn board_size(&self) -> BoardSize {
        BoardSize::from_signed(self.config.board_width, self.config.board_height)
    }

    /// Decode every image at `paths`, in order.
    pub fn load_images<I, P>(paths: I) -> Result<Vec<DynamicImage>, PipelineError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        paths
            .into_iter()
            .map(|p| {
                let path = p.as_ref();
                image::open(path).map_err(|source| PipelineError::Image {
                    path: path.to_path_buf(),
                    source,
                })
            })
            .collect()
    }

    /// Corner sets for `images`, positionally.
    pub fn detect(&self, images: &[DynamicImage]) -> Vec<CornerSet> {
        self.detector
            .detect_batch(images, self.config.board_width, self.config.board_height)
    }

    pub fn calibrate(&self, corner_sets: &[CornerSet]) -> CalibrationResult {
        self.calibrator.calibrate(corner_sets)
    }

    /// Detect boards in `images` and calibrate from them.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip(self, images), fields(frames = images.len())))]
    pub fn run(&self, images: &[DynamicImage]) -> CalibrationResult {
        let sets = self.detect(images);
        let result = self.calibrate(&sets);
        info!(
            "pipeline: {} frames, {} boards, {} used, success={}",
            images.len(),
            sets.iter().filter(|s| s.is_valid()).count(),
            result.corner_sets.len(),
            result.success
        );
        result
    }

    pub fn undistort(&self, image: &DynamicImage, result: &CalibrationResult) -> DynamicImage {
        undistort(image, result)
    }

    /// Camera profile using the configured name and sensor width.
    pub fn profile(&self, result: &CalibrationResult) -> Result<CameraProfile, ProfileError> {
        CameraProfile::from_calibration(self.config.camera_name.clone(), self.config.sensor_width_mm, result)
    }

    /// Preview of the configured board, one pixel per square.
    pub fn board_preview(&self) -> GrayImage {
        generate_board_image(self.config.board_width, self.config.board_height)
    }

    /// Write `result` as pretty JSON.
    pub fn write_report_json(result: &CalibrationResult, path: impl AsRef<Path>) -> Result<(), PipelineError> {
        let json = serde_json::to_string_pretty(result)?;
        fs::write(path, json)?;
        Ok(())
    }
}
