use serde::{Deserialize, Serialize};

/// Iterative sub-pixel refinement settings.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SubPixParams {
    /// Half-size of the search window in pixels (window is `2r + 1` wide).
    pub window_radius: u32,
    /// Upper bound on refinement iterations per corner.
    pub max_iterations: usize,
    /// Stop once the corner moves less than this many pixels.
    pub epsilon: f32,
    /// Largest window radius as a fraction of the local grid spacing.
    pub max_spacing_fraction: f32,
}

impl Default for SubPixParams {
    fn default() -> Self {
        Self {
            window_radius: 11,
            max_iterations: 30,
            epsilon: 0.001,
            max_spacing_fraction: 0.45,
        }
    }
}

/// Parameters of the chessboard corner detector.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DetectorParams {
    /// ChESS response threshold relative to the strongest response.
    pub chess_threshold_rel: f32,
    /// ChESS non-maximum suppression radius in pixels.
    pub chess_nms_radius: u32,
    /// Stretch contrast to the full 8-bit range before corner extraction.
    pub normalize_image: bool,
    /// Accepted distance between a predicted and a found lattice corner,
    /// relative to the local grid step.
    pub growth_tolerance: f32,
    /// How many of the strongest candidates are tried as lattice seeds.
    pub max_seeds: usize,
    /// Radius in pixels of the intensity ring used to confirm that a
    /// candidate is an X-junction.
    pub saddle_radius: f32,
    pub subpix: SubPixParams,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            chess_threshold_rel: 0.2,
            chess_nms_radius: 2,
            normalize_image: true,
            growth_tolerance: 0.35,
            max_seeds: 16,
            saddle_radius: 4.0,
            subpix: SubPixParams::default(),
        }
    }
}
